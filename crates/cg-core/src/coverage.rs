//! # Coverage window
//!
//! Expiry derivation and the "currently within coverage" classifier.
//! Dates are civil calendar dates with no time-of-day component; the
//! coverage window is a pure day increment, not month-aware.

use chrono::{Days, FixedOffset, NaiveDate, Utc};

use crate::error::{AppError, Result};
use crate::models::{WarrantyRegistration, WarrantyStatus};

/// Coverage runs for 180 calendar days from the purchase date.
pub const COVERAGE_DAYS: u64 = 180;

/// Registrations and claims are displayed in a fixed regional zone so
/// staff in different locales see consistent timestamps.
pub fn display_offset() -> FixedOffset {
    FixedOffset::east_opt(8 * 3600).expect("fixed +08:00 offset")
}

/// Today's civil date in the display zone.
pub fn today_civil() -> NaiveDate {
    Utc::now().with_timezone(&display_offset()).date_naive()
}

/// Parses a wire-format civil date (`YYYY-MM-DD`), tolerating a trailing
/// time component as historical exports sometimes carry one.
pub fn parse_civil_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.trim();
    let head: String = trimmed.chars().take(10).collect();
    NaiveDate::parse_from_str(&head, "%Y-%m-%d").ok()
}

/// Effective expiry date per the coverage rules: an explicit expiry wins
/// verbatim; otherwise purchase date + [`COVERAGE_DAYS`]. With neither
/// date available the calculation cannot proceed — that is a validation
/// failure, never a default of "now".
pub fn effective_expiry(
    purchase: Option<NaiveDate>,
    explicit: Option<NaiveDate>,
) -> Result<NaiveDate> {
    if let Some(expiry) = explicit {
        return Ok(expiry);
    }
    purchase
        .and_then(|date| date.checked_add_days(Days::new(COVERAGE_DAYS)))
        .ok_or_else(|| AppError::Validation("purchase date is missing or invalid".to_string()))
}

/// Whether a registration is currently claimable: never while Claimed,
/// otherwise while `today` has not passed the effective expiry
/// (stored expiry first, else recomputed from the purchase date).
pub fn within_coverage(reg: &WarrantyRegistration, today: NaiveDate) -> bool {
    if reg.status == WarrantyStatus::Claimed {
        return false;
    }
    match reg
        .expiry_date
        .or_else(|| effective_expiry(reg.purchase_date, None).ok())
    {
        Some(expiry) => today <= expiry,
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn registration(status: WarrantyStatus, expiry: Option<&str>) -> WarrantyRegistration {
        WarrantyRegistration {
            id: 1,
            name: "Lena Ho".into(),
            email: "lena@example.com".into(),
            phone_model: "Pixel 9".into(),
            mobile: "+6590001111".into(),
            country: "Singapore".into(),
            product_type: "X-Buffer Clear".into(),
            purchase_date: Some(date("2024-01-01")),
            expiry_date: expiry.map(date),
            product_code: "1234567890123456".into(),
            status,
            created_at: Utc.with_ymd_and_hms(2024, 1, 1, 4, 0, 0).unwrap(),
            claimed_at: None,
            claimed_by: None,
        }
    }

    #[test]
    fn computed_expiry_is_purchase_plus_180_days() {
        let expiry = effective_expiry(Some(date("2024-01-01")), None).unwrap();
        assert_eq!(expiry, date("2024-06-29"));
        let expiry = effective_expiry(Some(date("2024-03-01")), None).unwrap();
        assert_eq!(expiry, date("2024-08-28"));
    }

    #[test]
    fn explicit_expiry_always_wins() {
        let expiry = effective_expiry(Some(date("2024-01-01")), Some(date("2030-12-31"))).unwrap();
        assert_eq!(expiry, date("2030-12-31"));
        // ...even without a purchase date.
        let expiry = effective_expiry(None, Some(date("2025-05-05"))).unwrap();
        assert_eq!(expiry, date("2025-05-05"));
    }

    #[test]
    fn missing_purchase_date_is_a_validation_error() {
        let err = effective_expiry(None, None).unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[test]
    fn parse_tolerates_datetime_suffix() {
        assert_eq!(parse_civil_date(" 2024-03-01 "), Some(date("2024-03-01")));
        assert_eq!(
            parse_civil_date("2024-03-01 15:04:05"),
            Some(date("2024-03-01"))
        );
        assert_eq!(parse_civil_date("01/03/2024"), None);
        assert_eq!(parse_civil_date(""), None);
    }

    #[test]
    fn claimed_registrations_are_never_within_coverage() {
        let reg = registration(WarrantyStatus::Claimed, Some("2999-01-01"));
        assert!(!within_coverage(&reg, date("2024-02-01")));
    }

    #[test]
    fn coverage_is_inclusive_of_the_expiry_day() {
        let reg = registration(WarrantyStatus::Active, Some("2024-06-29"));
        assert!(within_coverage(&reg, date("2024-06-29")));
        assert!(!within_coverage(&reg, date("2024-06-30")));
    }

    #[test]
    fn coverage_recomputes_from_purchase_when_expiry_is_absent() {
        let reg = registration(WarrantyStatus::Active, None);
        assert!(within_coverage(&reg, date("2024-06-29")));
        assert!(!within_coverage(&reg, date("2024-06-30")));
    }

    #[test]
    fn no_dates_at_all_means_not_within_coverage() {
        let mut reg = registration(WarrantyStatus::Active, None);
        reg.purchase_date = None;
        assert!(!within_coverage(&reg, date("2024-01-01")));
    }
}
