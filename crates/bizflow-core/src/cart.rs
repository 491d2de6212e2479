//! # Cart Engine
//!
//! The in-progress transaction and its derived totals.
//!
//! ## Cart Operations Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Operations                                      │
//! │                                                                         │
//! │  UI Action                Operation               State Change          │
//! │  ─────────                ─────────               ────────────          │
//! │                                                                         │
//! │  Click product ─────────► add_item() ──────────► push or qty += 1      │
//! │  Edit quantity ─────────► update_quantity() ───► qty = n               │
//! │  Pick unit ─────────────► update_unit() ───────► unit + price swap     │
//! │  Edit price ────────────► update_price() ──────► unit_price = p        │
//! │  Click remove ──────────► remove_item() ───────► items.remove(i)       │
//! │  Checkout done ─────────► clear_cart() ────────► back to empty         │
//! │                                                                         │
//! │  Every operation that touches quantity or price recomputes the         │
//! │  line total before returning: line_total == quantity × unit_price.    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Everything here is synchronous and pure. Mirroring the state to storage
//! is the job of the client crate's `CartEngine`, which wraps this type.

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::error::CheckoutError;
use crate::money::{Money, Quantity};
use crate::types::{PaymentMethod, Product, ProductId, ProductUnit, SelectedCustomer, TaxRate, UnitId};

// =============================================================================
// Cart Item
// =============================================================================

/// One line of the cart.
///
/// Fields are private so the line total can only change together with the
/// quantity or price it is derived from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct CartItem {
    product_id: ProductId,
    name: String,
    unit_id: UnitId,
    unit_name: String,
    quantity: Quantity,
    unit_price: Money,
    line_total: Money,
    /// Unit alternatives captured when the product entered the cart.
    #[serde(default)]
    units: Vec<ProductUnit>,
}

impl CartItem {
    /// Creates a line for `product` in `unit` with quantity 1, priced at the
    /// product's default price. The unit's own price only applies once the
    /// cashier switches units.
    pub fn new(product: &Product, unit: &ProductUnit) -> Self {
        let unit_price = product.default_price();
        CartItem {
            product_id: product.id,
            name: product.name.clone(),
            unit_id: unit.unit_id,
            unit_name: unit.unit_name.clone(),
            quantity: Quantity::ONE,
            unit_price,
            line_total: unit_price.multiply_quantity(Quantity::ONE),
            units: product.units.clone(),
        }
    }

    pub fn product_id(&self) -> ProductId {
        self.product_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn unit_id(&self) -> UnitId {
        self.unit_id
    }

    pub fn unit_name(&self) -> &str {
        &self.unit_name
    }

    pub fn quantity(&self) -> Quantity {
        self.quantity
    }

    pub fn unit_price(&self) -> Money {
        self.unit_price
    }

    pub fn line_total(&self) -> Money {
        self.line_total
    }

    /// Unit alternatives the cashier can switch between.
    pub fn units(&self) -> &[ProductUnit] {
        &self.units
    }

    /// Applies a new quantity and price together. Returns `false`, leaving
    /// the line untouched, if the line total would overflow.
    fn reprice(&mut self, quantity: Quantity, price: Money) -> bool {
        match price.checked_multiply_quantity(quantity) {
            Some(line_total) => {
                self.quantity = quantity;
                self.unit_price = price;
                self.line_total = line_total;
                true
            }
            None => false,
        }
    }

    fn recompute(&mut self) {
        self.line_total = self.unit_price.multiply_quantity(self.quantity);
    }
}

// =============================================================================
// Cart
// =============================================================================

/// The in-progress transaction.
///
/// ## Invariants
/// - Items keep insertion order
/// - Items are unique by `product_id` (adding the same product bumps quantity)
/// - Every item satisfies `line_total == quantity × unit_price`
///
/// ## Not Invariants
/// Quantities may be fractional, zero or negative, and the total may go
/// negative when the discount exceeds subtotal plus tax. The engine allows
/// all of it; [`Cart::validate_for_checkout`] is where it gets rejected.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct Cart {
    items: Vec<CartItem>,
    customer: Option<SelectedCustomer>,
    #[ts(as = "String")]
    payment_method: PaymentMethod,
    paid_amount: Money,
    is_debt: bool,
    notes: String,
    tax_rate: TaxRate,
    discount_amount: Money,
}

impl Default for Cart {
    fn default() -> Self {
        Cart {
            items: Vec::new(),
            customer: None,
            payment_method: PaymentMethod::Cash,
            paid_amount: Money::zero(),
            is_debt: false,
            notes: String::new(),
            tax_rate: TaxRate::default(),
            discount_amount: Money::zero(),
        }
    }
}

impl Cart {
    /// Creates a new empty cart (CASH, 10% tax, no discount).
    pub fn new() -> Self {
        Self::default()
    }

    // =========================================================================
    // Line Operations
    // =========================================================================

    /// Adds a product to the cart or bumps its quantity by one.
    ///
    /// ## Behavior
    /// - Product already in cart: quantity += 1, unit and price untouched
    /// - Product not in cart: appended with quantity 1 in `unit`, priced at
    ///   `sell_price` (or `base_price`), capturing every unit alternative
    pub fn add_item(&mut self, product: &Product, unit: &ProductUnit) {
        if let Some(item) = self.find_mut(product.id) {
            let quantity = item.quantity + Quantity::ONE;
            item.reprice(quantity, item.unit_price);
            return;
        }

        self.items.push(CartItem::new(product, unit));
    }

    /// Sets the quantity of a line. No clamping: zero and negative values are
    /// stored as given.
    ///
    /// Returns `false` if the new line total does not fit, leaving the line
    /// as it was. A product not in the cart is a no-op.
    pub fn update_quantity(&mut self, product_id: ProductId, quantity: Quantity) -> bool {
        match self.find_mut(product_id) {
            Some(item) => item.reprice(quantity, item.unit_price),
            None => true,
        }
    }

    /// Sets the quantity from text typed into the cart table.
    ///
    /// Returns `false` and leaves the cart untouched if the text is not a
    /// number or the line total would be out of range.
    pub fn update_quantity_input(&mut self, product_id: ProductId, input: &str) -> bool {
        match Quantity::parse(input) {
            Some(quantity) => self.update_quantity(product_id, quantity),
            None => false,
        }
    }

    /// Swaps the active unit of a line and reprices it at the current quantity.
    ///
    /// A unit without its own price keeps the line's current unit price. A
    /// unit priced out of range leaves the line unchanged.
    pub fn update_unit(&mut self, product_id: ProductId, unit: &ProductUnit) {
        if let Some(item) = self.find_mut(product_id) {
            let price = match unit.price {
                Some(price) if !price.is_zero() => price,
                _ => item.unit_price,
            };
            if item.reprice(item.quantity, price) {
                item.unit_id = unit.unit_id;
                item.unit_name = unit.unit_name.clone();
            }
        }
    }

    /// Overrides the unit price of a line.
    ///
    /// Returns `false` for a negative price (a unit price is never below
    /// zero) or one whose line total does not fit; the line is left as it
    /// was. A product not in the cart is a no-op.
    pub fn update_price(&mut self, product_id: ProductId, price: Money) -> bool {
        if price.is_negative() {
            return false;
        }
        match self.find_mut(product_id) {
            Some(item) => item.reprice(item.quantity, price),
            None => true,
        }
    }

    /// Overrides the unit price from text typed in major units.
    ///
    /// Returns `false` and leaves the cart untouched if the text is not a
    /// number, is negative, or prices the line out of range.
    pub fn update_price_input(&mut self, product_id: ProductId, input: &str, decimals: u8) -> bool {
        match Money::parse_major(input, decimals) {
            Some(price) => self.update_price(product_id, price),
            None => false,
        }
    }

    /// Removes a line. No-op if absent.
    pub fn remove_item(&mut self, product_id: ProductId) {
        self.items.retain(|i| i.product_id != product_id);
    }

    /// Resets the transaction after checkout or on explicit reset.
    ///
    /// Clears items, customer, paid amount, debt flag, notes and discount.
    /// Payment method and tax rate are register settings and survive.
    pub fn clear_cart(&mut self) {
        self.items.clear();
        self.customer = None;
        self.paid_amount = Money::zero();
        self.is_debt = false;
        self.notes.clear();
        self.discount_amount = Money::zero();
    }

    // =========================================================================
    // Checkout Fields
    // =========================================================================

    pub fn set_customer(&mut self, customer: Option<SelectedCustomer>) {
        self.customer = customer;
    }

    pub fn set_payment_method(&mut self, method: PaymentMethod) {
        self.payment_method = method;
    }

    pub fn set_paid_amount(&mut self, amount: Money) {
        self.paid_amount = amount;
    }

    pub fn set_debt(&mut self, is_debt: bool) {
        self.is_debt = is_debt;
    }

    pub fn set_notes(&mut self, notes: impl Into<String>) {
        self.notes = notes.into();
    }

    pub fn set_tax_rate(&mut self, rate: TaxRate) {
        self.tax_rate = rate;
    }

    pub fn set_discount_amount(&mut self, amount: Money) {
        self.discount_amount = amount;
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn item(&self, product_id: ProductId) -> Option<&CartItem> {
        self.items.iter().find(|i| i.product_id == product_id)
    }

    pub fn customer(&self) -> Option<&SelectedCustomer> {
        self.customer.as_ref()
    }

    pub fn payment_method(&self) -> &PaymentMethod {
        &self.payment_method
    }

    pub fn paid_amount(&self) -> Money {
        self.paid_amount
    }

    pub fn is_debt(&self) -> bool {
        self.is_debt
    }

    pub fn notes(&self) -> &str {
        &self.notes
    }

    pub fn tax_rate(&self) -> TaxRate {
        self.tax_rate
    }

    pub fn discount_amount(&self) -> Money {
        self.discount_amount
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Number of distinct lines.
    pub fn item_count(&self) -> usize {
        self.items.len()
    }

    /// Sum of all line quantities.
    pub fn total_quantity(&self) -> Quantity {
        self.items
            .iter()
            .fold(Quantity::default(), |acc, i| acc + i.quantity)
    }

    // =========================================================================
    // Derived Totals
    // =========================================================================

    /// Sum of all line totals.
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(|i| i.line_total).sum()
    }

    /// Tax on the subtotal at the cart's rate.
    pub fn tax_amount(&self) -> Money {
        self.subtotal().calculate_tax(self.tax_rate)
    }

    /// `subtotal × (1 + tax_rate) − discount`. May be negative; saturates
    /// at the i64 bounds.
    pub fn total(&self) -> Money {
        self.subtotal() + self.tax_amount() - self.discount_amount
    }

    /// Change to hand back (positive) or balance still owed (negative).
    pub fn change_due(&self) -> Money {
        self.paid_amount - self.total()
    }

    /// Checks the rules the engine itself does not enforce.
    ///
    /// ## Rules
    /// - At least one line, every line with a positive quantity
    /// - Total not negative
    /// - Underpayment only when the sale is flagged as debt
    /// - Debt sales name a customer
    pub fn validate_for_checkout(&self) -> Result<(), CheckoutError> {
        if self.items.is_empty() {
            return Err(CheckoutError::EmptyCart);
        }

        if let Some(item) = self.items.iter().find(|i| i.quantity.is_non_positive()) {
            return Err(CheckoutError::NonPositiveQuantity {
                product_id: item.product_id,
            });
        }

        let total = self.total();
        if total.is_negative() {
            return Err(CheckoutError::NegativeTotal { total });
        }

        if self.is_debt {
            if self.customer.is_none() {
                return Err(CheckoutError::DebtWithoutCustomer);
            }
        } else if self.paid_amount < total {
            return Err(CheckoutError::Underpaid {
                paid: self.paid_amount,
                total,
            });
        }

        Ok(())
    }

    /// Re-derives every line total and drops duplicate product lines.
    ///
    /// Called on state restored from storage, which may have been written by
    /// an older client or edited by hand.
    pub fn normalize(&mut self) {
        let mut seen = std::collections::HashSet::new();
        self.items.retain(|i| seen.insert(i.product_id));
        for item in &mut self.items {
            item.recompute();
        }
    }

    fn find_mut(&mut self, product_id: ProductId) -> Option<&mut CartItem> {
        self.items.iter_mut().find(|i| i.product_id == product_id)
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn unit(id: UnitId, name: &str, price: Option<i64>) -> ProductUnit {
        ProductUnit {
            unit_id: id,
            unit_name: name.to_string(),
            price: price.map(Money::from_minor),
            conversion_rate: None,
        }
    }

    fn test_product(id: ProductId, price: i64) -> Product {
        Product {
            id,
            name: format!("Product {}", id),
            sell_price: Some(Money::from_minor(price)),
            base_price: Money::from_minor(price),
            units: vec![unit(1, "Cái", None), unit(2, "Hộp", Some(price * 10))],
        }
    }

    fn assert_consistent(cart: &Cart) {
        let mut sum = Money::zero();
        for item in cart.items() {
            assert_eq!(item.line_total(), item.unit_price().multiply_quantity(item.quantity()));
            sum += item.line_total();
        }
        assert_eq!(cart.subtotal(), sum);
    }

    #[test]
    fn test_add_item_appends_with_quantity_one() {
        let mut cart = Cart::new();
        cart.add_item(&test_product(1, 100), &unit(1, "Cái", None));

        assert_eq!(cart.item_count(), 1);
        let item = &cart.items()[0];
        assert_eq!(item.quantity(), Quantity::ONE);
        assert_eq!(item.line_total().minor(), 100);
        assert_eq!(item.units().len(), 2);
        assert_eq!(cart.subtotal().minor(), 100);
    }

    #[test]
    fn test_add_same_product_increases_quantity() {
        let mut cart = Cart::new();
        let product = test_product(1, 100);
        cart.add_item(&product, &unit(1, "Cái", None));
        cart.add_item(&product, &unit(2, "Hộp", Some(1000)));

        assert_eq!(cart.item_count(), 1);
        let item = &cart.items()[0];
        assert_eq!(item.quantity(), Quantity::from_units(2));
        // Unit is not switched by a repeat add
        assert_eq!(item.unit_id(), 1);
        assert_eq!(item.line_total().minor(), 200);
    }

    #[test]
    fn test_add_item_seeds_sell_price_for_any_unit() {
        let mut cart = Cart::new();
        cart.add_item(&test_product(1, 100), &unit(2, "Hộp", Some(1000)));

        let item = &cart.items()[0];
        assert_eq!(item.unit_id(), 2);
        assert_eq!(item.unit_price().minor(), 100);
        assert_eq!(item.line_total().minor(), 100);

        let mut base_only = test_product(2, 70);
        base_only.sell_price = None;
        cart.add_item(&base_only, &unit(2, "Hộp", Some(700)));
        assert_eq!(cart.item(2).unwrap().unit_price().minor(), 70);
    }

    #[test]
    fn test_insertion_order_is_kept() {
        let mut cart = Cart::new();
        for id in [3, 1, 2] {
            cart.add_item(&test_product(id, 100), &unit(1, "Cái", None));
        }
        cart.add_item(&test_product(1, 100), &unit(1, "Cái", None));

        let ids: Vec<_> = cart.items().iter().map(|i| i.product_id()).collect();
        assert_eq!(ids, vec![3, 1, 2]);
    }

    #[test]
    fn test_update_quantity_and_total_with_tax() {
        let mut cart = Cart::new();
        cart.add_item(&test_product(1, 100), &unit(1, "Cái", None));
        cart.update_quantity(1, Quantity::from_units(3));

        assert_eq!(cart.items()[0].line_total().minor(), 300);
        assert_eq!(cart.subtotal().minor(), 300);

        cart.set_tax_rate(TaxRate::from_percentage(10.0));
        cart.set_discount_amount(Money::zero());
        assert_eq!(cart.total().minor(), 330);
    }

    #[test]
    fn test_update_quantity_accepts_fractional_and_negative() {
        let mut cart = Cart::new();
        cart.add_item(&test_product(1, 15_000), &unit(1, "kg", None));

        cart.update_quantity(1, Quantity::from_milli(2500));
        assert_eq!(cart.items()[0].line_total().minor(), 37_500);

        cart.update_quantity(1, Quantity::from_units(-2));
        assert_eq!(cart.items()[0].line_total().minor(), -30_000);
        assert_consistent(&cart);
    }

    #[test]
    fn test_unparseable_input_is_a_no_op() {
        let mut cart = Cart::new();
        cart.add_item(&test_product(1, 100), &unit(1, "Cái", None));
        let before = cart.clone();

        assert!(!cart.update_quantity_input(1, "abc"));
        assert!(!cart.update_quantity_input(1, ""));
        assert!(!cart.update_price_input(1, "12a", 0));
        assert!(!cart.update_price_input(1, "-5", 0));
        assert_eq!(cart, before);

        assert!(cart.update_quantity_input(1, "4"));
        assert!(cart.update_price_input(1, "250", 0));
        assert_eq!(cart.items()[0].line_total().minor(), 1000);
    }

    #[test]
    fn test_out_of_range_input_is_a_no_op() {
        let mut cart = Cart::new();
        cart.add_item(&test_product(1, 100), &unit(1, "Cái", None));

        assert!(cart.update_price_input(1, "9223372036854775807", 0));
        let before = cart.clone();

        assert!(!cart.update_quantity_input(1, "2"));
        assert!(!cart.update_quantity(1, Quantity::from_units(-3)));
        assert!(!cart.update_price_input(1, "99999999999999999999", 0));
        cart.add_item(&test_product(1, 100), &unit(1, "Cái", None));
        assert_eq!(cart, before);
        assert_consistent(&cart);

        // A second huge line saturates the totals instead of wrapping
        cart.add_item(&test_product(2, 100), &unit(1, "Cái", None));
        assert!(cart.update_price(2, Money::from_minor(i64::MAX)));
        assert_eq!(cart.subtotal().minor(), i64::MAX);
        assert_eq!(cart.total().minor(), i64::MAX);
        assert!(cart.total() > Money::zero());
    }

    #[test]
    fn test_update_unit_reprices_at_current_quantity() {
        let mut cart = Cart::new();
        cart.add_item(&test_product(1, 100), &unit(1, "Cái", None));
        cart.update_quantity(1, Quantity::from_units(3));

        cart.update_unit(1, &unit(2, "Hộp", Some(1000)));
        let item = &cart.items()[0];
        assert_eq!(item.unit_id(), 2);
        assert_eq!(item.unit_name(), "Hộp");
        assert_eq!(item.line_total().minor(), 3000);

        // A unit without a price keeps the current price
        cart.update_unit(1, &unit(1, "Cái", None));
        assert_eq!(cart.items()[0].unit_price().minor(), 1000);
        assert_consistent(&cart);
    }

    #[test]
    fn test_update_price() {
        let mut cart = Cart::new();
        cart.add_item(&test_product(1, 100), &unit(1, "Cái", None));
        cart.update_quantity(1, Quantity::from_units(2));

        cart.update_price(1, Money::from_minor(80));
        assert_eq!(cart.items()[0].line_total().minor(), 160);

        cart.update_price(1, Money::from_minor(-1));
        assert_eq!(cart.items()[0].unit_price().minor(), 80);
    }

    #[test]
    fn test_remove_item_on_empty_cart() {
        let mut cart = Cart::new();
        cart.remove_item(1);
        assert!(cart.is_empty());
    }

    #[test]
    fn test_mutations_on_missing_product_are_no_ops() {
        let mut cart = Cart::new();
        cart.add_item(&test_product(1, 100), &unit(1, "Cái", None));
        let before = cart.clone();

        cart.update_quantity(9, Quantity::from_units(5));
        cart.update_price(9, Money::from_minor(1));
        cart.update_unit(9, &unit(2, "Hộp", Some(1)));
        cart.remove_item(9);
        assert_eq!(cart, before);
    }

    #[test]
    fn test_clear_cart_is_idempotent() {
        let mut cart = Cart::new();
        cart.add_item(&test_product(1, 100), &unit(1, "Cái", None));
        cart.set_customer(Some(SelectedCustomer {
            id: 5,
            full_name: "Nguyễn Văn A".to_string(),
            phone: None,
        }));
        cart.set_payment_method(PaymentMethod::Card);
        cart.set_paid_amount(Money::from_minor(50));
        cart.set_debt(true);
        cart.set_notes("giao sau");
        cart.set_discount_amount(Money::from_minor(10));

        cart.clear_cart();
        let once = cart.clone();
        cart.clear_cart();

        assert_eq!(cart, once);
        assert!(cart.is_empty());
        assert!(cart.customer().is_none());
        assert!(!cart.is_debt());
        assert_eq!(cart.notes(), "");
        assert_eq!(cart.paid_amount(), Money::zero());
        assert_eq!(cart.discount_amount(), Money::zero());
        // Register settings survive a reset
        assert_eq!(cart.payment_method(), &PaymentMethod::Card);
        assert_eq!(cart.tax_rate(), TaxRate::default());
    }

    #[test]
    fn test_total_may_go_negative() {
        let mut cart = Cart::new();
        cart.add_item(&test_product(1, 100), &unit(1, "Cái", None));
        cart.set_discount_amount(Money::from_minor(500));

        assert_eq!(cart.total().minor(), 110 - 500);
        assert_eq!(
            cart.validate_for_checkout(),
            Err(CheckoutError::NegativeTotal {
                total: Money::from_minor(-390)
            })
        );
    }

    #[test]
    fn test_validate_for_checkout() {
        let mut cart = Cart::new();
        assert_eq!(cart.validate_for_checkout(), Err(CheckoutError::EmptyCart));

        cart.add_item(&test_product(1, 100), &unit(1, "Cái", None));
        cart.set_paid_amount(Money::from_minor(100));
        assert!(matches!(
            cart.validate_for_checkout(),
            Err(CheckoutError::Underpaid { .. })
        ));

        cart.set_debt(true);
        assert_eq!(
            cart.validate_for_checkout(),
            Err(CheckoutError::DebtWithoutCustomer)
        );

        cart.set_customer(Some(SelectedCustomer {
            id: 5,
            full_name: "Trần Thị B".to_string(),
            phone: Some("0900000000".to_string()),
        }));
        assert_eq!(cart.validate_for_checkout(), Ok(()));
        assert_eq!(cart.change_due().minor(), -10);

        cart.update_quantity(1, Quantity::from_units(0));
        assert_eq!(
            cart.validate_for_checkout(),
            Err(CheckoutError::NonPositiveQuantity { product_id: 1 })
        );
    }

    #[test]
    fn test_serialized_round_trip_keeps_totals() {
        let mut cart = Cart::new();
        cart.add_item(&test_product(1, 100), &unit(1, "Cái", None));
        cart.add_item(&test_product(2, 15_000), &unit(1, "kg", None));
        cart.update_quantity(2, Quantity::from_milli(1250));
        cart.set_discount_amount(Money::from_minor(7));

        let json = serde_json::to_string(&cart).unwrap();
        let restored: Cart = serde_json::from_str(&json).unwrap();

        assert_eq!(restored.subtotal(), cart.subtotal());
        assert_eq!(restored.total(), cart.total());
        assert_eq!(restored, cart);
    }

    #[test]
    fn test_normalize_repairs_restored_state() {
        let json = r#"{
            "items": [
                {"product_id": 1, "name": "A", "unit_id": 1, "unit_name": "Cái",
                 "quantity": 2000, "unit_price": 100, "line_total": 999},
                {"product_id": 1, "name": "A", "unit_id": 1, "unit_name": "Cái",
                 "quantity": 1000, "unit_price": 100, "line_total": 100}
            ],
            "customer": null,
            "paymentMethod": "CASH",
            "paidAmount": 0,
            "isDebt": false,
            "notes": "",
            "taxRate": 1000,
            "discountAmount": 0
        }"#;
        let mut cart: Cart = serde_json::from_str(json).unwrap();
        cart.normalize();

        assert_eq!(cart.item_count(), 1);
        assert_eq!(cart.items()[0].line_total().minor(), 200);
        assert_consistent(&cart);
    }
}
