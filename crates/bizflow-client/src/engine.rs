//! # Cart Engine
//!
//! The single shared cart of a session, mirrored to storage on every change.
//!
//! ## Mutation Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Cart Engine Mutation                                │
//! │                                                                         │
//! │  screen ──► engine.update_quantity(1, 3)                                │
//! │               │                                                         │
//! │               ├─ lock cart                                              │
//! │               ├─ Cart::update_quantity (pure, bizflow-core)             │
//! │               ├─ save_state("bizflow-pos", &cart)   ◄── before return   │
//! │               └─ unlock                                                 │
//! │                                                                         │
//! │  A reload that runs CartEngine::restore sees exactly the state the     │
//! │  last mutation left behind.                                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Thread Safety
//! The cart is wrapped in `Arc<Mutex<T>>`: cloning the engine hands another
//! screen the same cart, and the save happens under the same lock as the
//! change so two writers can never persist out of order.

use bizflow_core::{
    Cart, Money, PaymentMethod, Product, ProductId, ProductUnit, Quantity, SelectedCustomer,
    TaxRate,
};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tracing::{debug, warn};

use crate::error::ClientResult;
use crate::persistence::{load_state, save_state, BlobStore};

#[derive(Clone)]
pub struct CartEngine {
    cart: Arc<Mutex<Cart>>,
    store: Arc<dyn BlobStore>,
    blob: String,
}

impl std::fmt::Debug for CartEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartEngine").field("blob", &self.blob).finish()
    }
}

impl CartEngine {
    /// Creates an engine over an empty cart. Nothing is read from `store`
    /// until [`CartEngine::restore`] is called.
    pub fn new(store: Arc<dyn BlobStore>, blob: impl Into<String>) -> Self {
        CartEngine {
            cart: Arc::new(Mutex::new(Cart::new())),
            store,
            blob: blob.into(),
        }
    }

    /// Loads the persisted cart, replacing the in-memory one.
    ///
    /// Returns `Ok(false)` if nothing was persisted. On error the cart is
    /// left as it was (empty on startup).
    pub fn restore(&self) -> ClientResult<bool> {
        let restored: Option<Cart> = load_state(self.store.as_ref(), &self.blob)?;
        match restored {
            Some(mut cart) => {
                cart.normalize();
                debug!(items = cart.item_count(), "Restored cart");
                *self.lock() = cart;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    // =========================================================================
    // Access
    // =========================================================================

    /// Executes a function with read access to the cart.
    ///
    /// ## Usage
    /// ```rust,ignore
    /// let total = engine.with_cart(|cart| cart.total());
    /// ```
    pub fn with_cart<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&Cart) -> R,
    {
        let cart = self.lock();
        f(&cart)
    }

    /// Executes a mutation and persists the result before returning.
    ///
    /// A failed save is logged and the in-memory change kept; the next
    /// mutation writes the full state again.
    pub fn mutate<F, R>(&self, f: F) -> R
    where
        F: FnOnce(&mut Cart) -> R,
    {
        let mut cart = self.lock();
        let result = f(&mut cart);
        if let Err(e) = save_state(self.store.as_ref(), &self.blob, &*cart) {
            warn!(blob = %self.blob, ?e, "Failed to persist cart");
        }
        result
    }

    /// Copy of the current cart.
    pub fn snapshot(&self) -> Cart {
        self.with_cart(Cart::clone)
    }

    fn lock(&self) -> MutexGuard<'_, Cart> {
        // A panic inside a pure cart operation leaves the cart consistent.
        self.cart.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // =========================================================================
    // Cart Operations
    // =========================================================================

    pub fn add_item(&self, product: &Product, unit: &ProductUnit) {
        self.mutate(|cart| cart.add_item(product, unit))
    }

    /// Returns `false` if the line total would be out of range.
    pub fn update_quantity(&self, product_id: ProductId, quantity: Quantity) -> bool {
        self.mutate(|cart| cart.update_quantity(product_id, quantity))
    }

    /// Returns `false` if `input` is not a number; nothing is written then.
    pub fn update_quantity_input(&self, product_id: ProductId, input: &str) -> bool {
        match Quantity::parse(input) {
            Some(quantity) => self.update_quantity(product_id, quantity),
            None => {
                debug!(product_id, input, "Ignoring unparseable quantity");
                false
            }
        }
    }

    pub fn update_unit(&self, product_id: ProductId, unit: &ProductUnit) {
        self.mutate(|cart| cart.update_unit(product_id, unit))
    }

    /// Returns `false` for a negative or out-of-range price.
    pub fn update_price(&self, product_id: ProductId, price: Money) -> bool {
        self.mutate(|cart| cart.update_price(product_id, price))
    }

    /// Returns `false` if `input` is not a usable price.
    pub fn update_price_input(&self, product_id: ProductId, input: &str, decimals: u8) -> bool {
        match Money::parse_major(input, decimals) {
            Some(price) => self.update_price(product_id, price),
            None => {
                debug!(product_id, input, "Ignoring unparseable price");
                false
            }
        }
    }

    pub fn remove_item(&self, product_id: ProductId) {
        self.mutate(|cart| cart.remove_item(product_id))
    }

    pub fn clear_cart(&self) {
        self.mutate(Cart::clear_cart)
    }

    pub fn set_customer(&self, customer: Option<SelectedCustomer>) {
        self.mutate(|cart| cart.set_customer(customer))
    }

    pub fn set_payment_method(&self, method: PaymentMethod) {
        self.mutate(|cart| cart.set_payment_method(method))
    }

    pub fn set_paid_amount(&self, amount: Money) {
        self.mutate(|cart| cart.set_paid_amount(amount))
    }

    pub fn set_debt(&self, is_debt: bool) {
        self.mutate(|cart| cart.set_debt(is_debt))
    }

    pub fn set_notes(&self, notes: impl Into<String>) {
        let notes = notes.into();
        self.mutate(|cart| cart.set_notes(notes))
    }

    pub fn set_tax_rate(&self, rate: TaxRate) {
        self.mutate(|cart| cart.set_tax_rate(rate))
    }

    pub fn set_discount_amount(&self, amount: Money) {
        self.mutate(|cart| cart.set_discount_amount(amount))
    }

    // =========================================================================
    // Derived Totals
    // =========================================================================

    pub fn subtotal(&self) -> Money {
        self.with_cart(Cart::subtotal)
    }

    pub fn total(&self) -> Money {
        self.with_cart(Cart::total)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ClientError;
    use crate::persistence::MemoryStore;

    const BLOB: &str = "bizflow-pos";

    fn unit() -> ProductUnit {
        ProductUnit {
            unit_id: 1,
            unit_name: "Cái".to_string(),
            price: None,
            conversion_rate: None,
        }
    }

    fn product(id: ProductId, price: i64) -> Product {
        Product {
            id,
            name: format!("Product {}", id),
            sell_price: Some(Money::from_minor(price)),
            base_price: Money::from_minor(price),
            units: vec![unit()],
        }
    }

    /// Store whose writes always fail.
    struct BrokenStore;

    impl BlobStore for BrokenStore {
        fn load(&self, _name: &str) -> ClientResult<Option<String>> {
            Err(ClientError::StorageFailed("disk gone".into()))
        }
        fn save(&self, _name: &str, _contents: &str) -> ClientResult<()> {
            Err(ClientError::StorageFailed("disk gone".into()))
        }
        fn remove(&self, _name: &str) -> ClientResult<()> {
            Ok(())
        }
    }

    #[test]
    fn test_every_mutation_is_persisted() {
        let store = MemoryStore::new();
        let engine = CartEngine::new(Arc::new(store.clone()), BLOB);

        engine.add_item(&product(1, 100), &unit());
        let persisted: Cart = load_state(&store, BLOB).unwrap().unwrap();
        assert_eq!(persisted.subtotal().minor(), 100);

        engine.update_quantity(1, Quantity::from_units(3));
        let persisted: Cart = load_state(&store, BLOB).unwrap().unwrap();
        assert_eq!(persisted.subtotal().minor(), 300);
        assert_eq!(persisted.total().minor(), 330);
    }

    #[test]
    fn test_reload_observes_latest_cart() {
        let store = MemoryStore::new();
        let engine = CartEngine::new(Arc::new(store.clone()), BLOB);
        engine.add_item(&product(1, 100), &unit());
        engine.add_item(&product(2, 2_500), &unit());
        engine.update_quantity(2, Quantity::from_milli(1500));
        engine.set_notes("giao buổi chiều");
        engine.set_discount_amount(Money::from_minor(50));

        let reloaded = CartEngine::new(Arc::new(store), BLOB);
        assert!(reloaded.restore().unwrap());

        assert_eq!(reloaded.subtotal(), engine.subtotal());
        assert_eq!(reloaded.total(), engine.total());
        assert_eq!(reloaded.snapshot(), engine.snapshot());
    }

    #[test]
    fn test_restore_with_nothing_persisted() {
        let engine = CartEngine::new(Arc::new(MemoryStore::new()), BLOB);
        assert!(!engine.restore().unwrap());
        assert!(engine.with_cart(Cart::is_empty));
    }

    #[test]
    fn test_corrupt_blob_leaves_empty_cart() {
        let store = MemoryStore::new();
        store.save(BLOB, "garbage").unwrap();

        let engine = CartEngine::new(Arc::new(store), BLOB);
        assert!(engine.restore().is_err());
        assert!(engine.with_cart(Cart::is_empty));
    }

    #[test]
    fn test_failed_save_keeps_in_memory_change() {
        let engine = CartEngine::new(Arc::new(BrokenStore), BLOB);
        engine.add_item(&product(1, 100), &unit());
        assert_eq!(engine.subtotal().minor(), 100);
    }

    #[test]
    fn test_unparseable_input_writes_nothing() {
        let store = MemoryStore::new();
        let engine = CartEngine::new(Arc::new(store.clone()), BLOB);

        assert!(!engine.update_quantity_input(1, "abc"));
        assert_eq!(store.load(BLOB).unwrap(), None);

        engine.add_item(&product(1, 100), &unit());
        assert!(!engine.update_price_input(1, "một trăm", 0));
        assert!(!engine.update_price_input(1, "-5", 0));
        assert!(engine.update_price_input(1, "120", 0));
        assert_eq!(engine.subtotal().minor(), 120);
    }

    #[test]
    fn test_clones_share_one_cart() {
        let engine = CartEngine::new(Arc::new(MemoryStore::new()), BLOB);
        let other_screen = engine.clone();

        engine.add_item(&product(1, 100), &unit());
        other_screen.remove_item(1);
        assert!(engine.with_cart(Cart::is_empty));

        other_screen.clear_cart();
        other_screen.clear_cart();
        assert!(engine.with_cart(Cart::is_empty));
    }
}
