//! # Session State
//!
//! Who is logged in, persisted as its own blob next to the cart.
//!
//! The push channel may only open when both a token and an owning-account
//! id are present; [`SessionState::stream_credentials`] is that check.

use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::RwLock;

/// The logged-in user as returned by the login endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionUser {
    pub id: i64,

    #[serde(default)]
    pub username: String,

    #[serde(default)]
    pub full_name: Option<String>,

    /// `ADMIN`, `OWNER`, `EMPLOYEE`…
    #[serde(default)]
    pub role: Option<String>,

    /// Account that owns the shop data; scopes the event stream.
    #[serde(default)]
    pub owner_id: Option<i64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionState {
    pub user: Option<SessionUser>,
    pub token: Option<String>,
}

impl SessionState {
    pub fn login(&mut self, user: SessionUser, token: impl Into<String>) {
        self.user = Some(user);
        self.token = Some(token.into());
    }

    pub fn logout(&mut self) {
        self.user = None;
        self.token = None;
    }

    pub fn is_authenticated(&self) -> bool {
        self.user.is_some() && self.token.as_deref().is_some_and(|t| !t.is_empty())
    }

    pub fn owner_id(&self) -> Option<i64> {
        self.user.as_ref().and_then(|u| u.owner_id)
    }

    /// Token and owner id, if the session may open the push channel.
    pub fn stream_credentials(&self) -> Option<(&str, i64)> {
        if !self.is_authenticated() {
            return None;
        }
        let token = self.token.as_deref()?;
        let owner_id = self.owner_id()?;
        Some((token, owner_id))
    }
}

/// Current bearer token, shared with every REST client.
pub type TokenCell = Arc<RwLock<Option<String>>>;

pub fn token_cell() -> TokenCell {
    Arc::new(RwLock::new(None))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(owner_id: Option<i64>) -> SessionUser {
        SessionUser {
            id: 7,
            username: "thu.ngan".to_string(),
            full_name: Some("Thu Ngân".to_string()),
            role: Some("EMPLOYEE".to_string()),
            owner_id,
        }
    }

    #[test]
    fn test_stream_credentials_need_token_and_owner() {
        let mut session = SessionState::default();
        assert!(session.stream_credentials().is_none());

        session.login(user(None), "tok");
        assert!(session.is_authenticated());
        assert!(session.stream_credentials().is_none());

        session.login(user(Some(3)), "");
        assert!(session.stream_credentials().is_none());

        session.login(user(Some(3)), "tok");
        assert_eq!(session.stream_credentials(), Some(("tok", 3)));

        session.logout();
        assert!(!session.is_authenticated());
        assert_eq!(session.owner_id(), None);
    }

    #[test]
    fn test_session_blob_shape() {
        let mut session = SessionState::default();
        session.login(user(Some(3)), "tok");

        let json = serde_json::to_value(&session).unwrap();
        assert_eq!(json["token"], "tok");
        assert_eq!(json["user"]["owner_id"], 3);

        let back: SessionState = serde_json::from_value(json).unwrap();
        assert_eq!(back, session);
    }
}
