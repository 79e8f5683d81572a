//! Integer-pence money helpers.

use crate::types::Pence;

/// Render an amount in pence as pounds, e.g. `6900` -> `£69.00`.
pub fn format_pence(amount: Pence) -> String {
    let sign = if amount < 0 { "-" } else { "" };
    let abs = amount.unsigned_abs();
    format!("{sign}£{}.{:02}", abs / 100, abs % 100)
}

/// `percent` of `amount`, rounded half up to the nearest penny.
pub fn percent_of(amount: Pence, percent: i64) -> Pence {
    (amount * percent + 50).div_euclid(100)
}
