use agrirent_core::BookingError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Fee percentages applied on top of the rental subtotal.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct FeeSchedule {
    /// Marketplace cut, percent of subtotal.
    pub platform_fee_percent: i64,
    /// Tax surcharge, percent of subtotal.
    pub gst_percent: i64,
}

impl Default for FeeSchedule {
    fn default() -> Self {
        Self {
            platform_fee_percent: 5,
            gst_percent: 18,
        }
    }
}

/// Cost breakdown for a rental window. All amounts in whole currency units.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Quote {
    pub hours: i64,
    pub price_per_hour: i64,
    pub subtotal: i64,
    pub platform_fee: i64,
    pub gst: i64,
    pub total: i64,
}

/// Compute the cost breakdown for a rental window.
///
/// Pure and deterministic: this one function backs both the client-facing
/// quote preview and the authoritative snapshot taken at booking creation,
/// so the two always agree bit-for-bit.
///
/// Duration is billed in whole hours, rounded up, with a minimum of one
/// hour. Each fee is rounded half-up to the nearest whole currency unit
/// independently; the total is the exact sum of the three components.
pub fn compute_quote(
    start: DateTime<Utc>,
    end: DateTime<Utc>,
    price_per_hour: i64,
    fees: &FeeSchedule,
) -> Result<Quote, BookingError> {
    if end <= start {
        return Err(BookingError::InvalidInterval);
    }
    if price_per_hour <= 0 {
        return Err(BookingError::Validation(
            "price per hour must be positive".to_string(),
        ));
    }

    let seconds = (end - start).num_seconds();
    let hours = ((seconds + 3599) / 3600).max(1);

    let subtotal = hours
        .checked_mul(price_per_hour)
        .ok_or_else(amount_overflow)?;
    let platform_fee = round_percent(subtotal, fees.platform_fee_percent)?;
    let gst = round_percent(subtotal, fees.gst_percent)?;
    let total = subtotal
        .checked_add(platform_fee)
        .and_then(|t| t.checked_add(gst))
        .ok_or_else(amount_overflow)?;

    Ok(Quote {
        hours,
        price_per_hour,
        subtotal,
        platform_fee,
        gst,
        total,
    })
}

/// `amount * percent / 100`, rounded half-up. Integer arithmetic only, so
/// there is no floating-point currency drift between call sites.
fn round_percent(amount: i64, percent: i64) -> Result<i64, BookingError> {
    amount
        .checked_mul(percent)
        .and_then(|v| v.checked_add(50))
        .map(|v| v / 100)
        .ok_or_else(amount_overflow)
}

fn amount_overflow() -> BookingError {
    BookingError::Validation("rental amount exceeds the representable range".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn at(h: u32, m: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, 1, h, m, 0).unwrap()
    }

    #[test]
    fn test_scenario_a_breakdown() {
        // ₹100/hr from 08:00 to 11:30 -> 4 billable hours
        let quote = compute_quote(at(8, 0), at(11, 30), 100, &FeeSchedule::default()).unwrap();

        assert_eq!(quote.hours, 4);
        assert_eq!(quote.subtotal, 400);
        assert_eq!(quote.platform_fee, 20);
        assert_eq!(quote.gst, 72);
        assert_eq!(quote.total, 492);
    }

    #[test]
    fn test_minimum_one_hour() {
        let quote = compute_quote(at(8, 0), at(8, 20), 100, &FeeSchedule::default()).unwrap();
        assert_eq!(quote.hours, 1);
        assert_eq!(quote.subtotal, 100);
    }

    #[test]
    fn test_rejects_inverted_interval() {
        let err = compute_quote(at(11, 0), at(8, 0), 100, &FeeSchedule::default()).unwrap_err();
        assert!(matches!(err, BookingError::InvalidInterval));

        let err = compute_quote(at(8, 0), at(8, 0), 100, &FeeSchedule::default()).unwrap_err();
        assert!(matches!(err, BookingError::InvalidInterval));
    }

    #[test]
    fn test_rejects_overflowing_amounts() {
        // A rate near i64::MAX passes the positivity check but cannot be
        // billed over a multi-hour window without wrapping.
        let err =
            compute_quote(at(8, 0), at(12, 0), i64::MAX / 2, &FeeSchedule::default()).unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));

        // One hour at i64::MAX overflows in the fee step instead.
        let err =
            compute_quote(at(8, 0), at(9, 0), i64::MAX, &FeeSchedule::default()).unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
    }

    #[test]
    fn test_rejects_non_positive_rate() {
        let err = compute_quote(at(8, 0), at(9, 0), 0, &FeeSchedule::default()).unwrap_err();
        assert!(matches!(err, BookingError::Validation(_)));
    }

    #[test]
    fn test_fees_round_half_up_independently() {
        // subtotal 30: 5% = 1.5 -> 2, 18% = 5.4 -> 5
        let quote = compute_quote(at(8, 0), at(9, 0), 30, &FeeSchedule::default()).unwrap();
        assert_eq!(quote.platform_fee, 2);
        assert_eq!(quote.gst, 5);
        assert_eq!(quote.total, 37);
    }

    #[test]
    fn test_deterministic_and_reconciled() {
        let fees = FeeSchedule::default();
        let a = compute_quote(at(6, 0), at(17, 45), 137, &fees).unwrap();
        let b = compute_quote(at(6, 0), at(17, 45), 137, &fees).unwrap();

        assert_eq!(a, b);
        assert_eq!(a.total, a.subtotal + a.platform_fee + a.gst);
    }
}
