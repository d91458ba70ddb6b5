//! # Domain Models
//!
//! These structs represent the core entities of CaseGuard: the product-code
//! inventory and the warranty registrations bound to it. Identifiers are
//! store-assigned integers, matching the historical data.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// A manufacturer-issued code from the inventory, in its stored form.
///
/// Historical rows may carry internal spacing ("1234 5678 ...") or hyphen
/// grouping; comparisons always go through the normalized form.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductCode {
    pub id: i64,
    pub code: String,
    pub product_type: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// One row of a bulk inventory upload. A matching id or code replaces the
/// stored row (upsert); otherwise a new row is created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeUpsert {
    pub id: Option<i64>,
    pub code: String,
    pub product_type: Option<String>,
    pub created_at: Option<DateTime<Utc>>,
}

/// Claim state of a registration.
///
/// `Active` is also rendered as "Not claimed" in historical exports; both
/// spellings parse back to `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WarrantyStatus {
    Active,
    Claimed,
}

impl WarrantyStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            WarrantyStatus::Active => "Active",
            WarrantyStatus::Claimed => "Claimed",
        }
    }

    /// Lenient parse for stored/imported values. Anything that is not
    /// exactly "Claimed" (case-insensitive) counts as not claimed.
    pub fn parse(raw: &str) -> Self {
        if raw.trim().eq_ignore_ascii_case("claimed") {
            WarrantyStatus::Claimed
        } else {
            WarrantyStatus::Active
        }
    }
}

/// A customer's warranty registration for one product code.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarrantyRegistration {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone_model: String,
    pub mobile: String,
    pub country: String,
    pub product_type: String,
    pub purchase_date: Option<NaiveDate>,
    pub expiry_date: Option<NaiveDate>,
    /// Canonical (normalized) product code; the foreign reference is by
    /// value, not by inventory id.
    pub product_code: String,
    pub status: WarrantyStatus,
    pub created_at: DateTime<Utc>,
    pub claimed_at: Option<DateTime<Utc>>,
    pub claimed_by: Option<String>,
}

/// A registration submission as received from a customer, dates still in
/// their wire form so the core owns the parse-or-reject decision.
#[derive(Debug, Clone, Default)]
pub struct RegistrationRequest {
    pub name: String,
    pub email: String,
    pub phone_model: String,
    pub mobile: String,
    pub country: String,
    pub product_type: String,
    pub purchase_date: String,
    pub expiry_date: Option<String>,
    pub product_code: String,
}

/// A validated registration ready for insertion.
#[derive(Debug, Clone)]
pub struct NewRegistration {
    pub name: String,
    pub email: String,
    pub phone_model: String,
    pub mobile: String,
    pub country: String,
    pub product_type: String,
    pub purchase_date: NaiveDate,
    pub expiry_date: NaiveDate,
    pub product_code: String,
    pub status: WarrantyStatus,
    pub created_at: DateTime<Utc>,
}

/// Outcome of the code-check operation, mirrored onto the wire as-is.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CodeCheck {
    pub exists: bool,
    pub product_type: Option<String>,
    pub length: usize,
    pub length_ok: bool,
    pub valid_product_type: bool,
    pub begins_reserved_prefix: bool,
}

/// One page of a listing.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub items: Vec<T>,
}

/// Staff roles. Partners can search and claim; admins additionally manage
/// the inventory and registrations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StaffRole {
    Admin,
    Partner,
}

/// The resolved identity of an authenticated staff caller. The claim
/// transition records `email`; it is never taken from a request payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaffIdentity {
    pub email: String,
    pub role: StaffRole,
}

/// A live login session.
#[derive(Debug, Clone)]
pub struct Session {
    pub token: String,
    pub identity: StaffIdentity,
}
