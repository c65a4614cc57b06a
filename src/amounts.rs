use rust_decimal::Decimal;

// Pure balance arithmetic for a table's order. All persistence-aware
// callers live in db_interaction; nothing here touches the store.

// One cart line as the calculator sees it: unit price and quantity.
#[derive(Debug, Clone, Copy)]
pub struct CartLine {
    pub price: Decimal,
    pub quantity: i32,
}

pub fn order_total(lines: &[CartLine]) -> Decimal {
    lines
        .iter()
        .map(|line| line.price * Decimal::from(line.quantity))
        .sum::<Decimal>()
        .round_dp(2)
}

// Remaining balance after the accepted payments so far. Payment totals
// include tips; the result is clamped at zero, never negative.
pub fn amount_left_to_pay(order_total: Decimal, payment_totals: &[Decimal]) -> Decimal {
    let settled: Decimal = payment_totals.iter().sum();
    let left = order_total - settled;

    left.max(Decimal::ZERO).round_dp(2)
}

pub fn tip_from_percentage(amount: Decimal, percentage: Decimal) -> Decimal {
    (amount * percentage / Decimal::from(100)).round_dp(2)
}
