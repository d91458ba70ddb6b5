//! caseguard/crates/cg-core/src/lib.rs
//!
//! The central domain logic and interface definitions for CaseGuard:
//! product-code validation, warranty coverage rules, and the registration
//! lifecycle, behind store/auth ports that plugins implement.

pub mod codes;
pub mod coverage;
pub mod error;
pub mod models;
pub mod service;
pub mod traits;

// Re-exporting for easier access in other crates
pub use codes::*;
pub use coverage::*;
pub use error::*;
pub use models::*;
pub use service::WarrantyService;
pub use traits::*;

#[cfg(test)]
mod tests {
    use super::models::*;
    use chrono::Utc;

    #[test]
    fn status_parse_accepts_historical_spellings() {
        assert_eq!(WarrantyStatus::parse("Claimed"), WarrantyStatus::Claimed);
        assert_eq!(WarrantyStatus::parse("claimed "), WarrantyStatus::Claimed);
        assert_eq!(WarrantyStatus::parse("Not claimed"), WarrantyStatus::Active);
        assert_eq!(WarrantyStatus::parse("Active"), WarrantyStatus::Active);
        assert_eq!(WarrantyStatus::parse(""), WarrantyStatus::Active);
    }

    #[test]
    fn registration_round_trips_through_serde() {
        let reg = WarrantyRegistration {
            id: 7,
            name: "Mei Tan".to_string(),
            email: "mei@example.com".to_string(),
            phone_model: "iPhone 15 Pro".to_string(),
            mobile: "+6598765432".to_string(),
            country: "Singapore".to_string(),
            product_type: "Dream Case".to_string(),
            purchase_date: None,
            expiry_date: None,
            product_code: "8899000011112222".to_string(),
            status: WarrantyStatus::Active,
            created_at: Utc::now(),
            claimed_at: None,
            claimed_by: None,
        };
        let json = serde_json::to_string(&reg).unwrap();
        let back: WarrantyRegistration = serde_json::from_str(&json).unwrap();
        assert_eq!(back.id, reg.id);
        assert_eq!(back.status, reg.status);
    }
}
