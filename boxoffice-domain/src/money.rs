//! Money arithmetic for order totals.
//!
//! All amounts are `rust_decimal::Decimal` held at 2 decimal places.
//! Rounding is half-away-from-zero, applied when the tax is computed.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::{Deserialize, Serialize};

/// Round an amount to 2 decimal places, half-away-from-zero.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Subtotal, tax, and total for an order.
///
/// # Invariants
/// - `total = subtotal + tax`
/// - `tax = round(subtotal * tax_rate, 2)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderTotals {
    /// Sum of seat prices
    pub subtotal: Decimal,
    /// Tax on the subtotal, rounded to 2 decimal places
    pub tax: Decimal,
    /// Amount charged to the user
    pub total: Decimal,
}

impl OrderTotals {
    /// Compute totals from seat prices at the given tax rate.
    pub fn calculate(seat_prices: impl IntoIterator<Item = Decimal>, tax_rate: Decimal) -> Self {
        let subtotal = round_money(seat_prices.into_iter().sum());
        let tax = round_money(subtotal * tax_rate);
        let total = subtotal + tax;

        Self { subtotal, tax, total }
    }
}
