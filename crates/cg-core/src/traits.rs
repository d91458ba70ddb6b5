//! # Core Traits (Ports)
//!
//! Any plugin must implement these traits to be used by the binary.
//! Store methods return `anyhow::Result`; the service layer maps failures
//! into the `AppError` taxonomy so callers see distinguishable outcomes.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::models::{
    CodeUpsert, NewRegistration, Page, ProductCode, Session, StaffIdentity, WarrantyRegistration,
};

/// Result of attempting to insert a registration.
///
/// The storage layer carries a uniqueness constraint on the code, so the
/// check-then-insert race surfaces here as `DuplicateCode` instead of an
/// opaque driver error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InsertOutcome {
    Created(i64),
    DuplicateCode,
}

/// Timestamp and identity recorded by a claim. Passing `None` to
/// [`WarrantyStore::set_claim`] clears both and reverts the status.
#[derive(Debug, Clone)]
pub struct ClaimStamp {
    pub claimed_at: DateTime<Utc>,
    pub claimed_by: String,
}

/// Product-code inventory contract. Lookup is exact-match only; the
/// spacing-variant probe lives in the service layer.
#[async_trait]
pub trait CodeInventory: Send + Sync {
    async fn find(&self, code: &str) -> anyhow::Result<Option<ProductCode>>;
    async fn list(&self, filter: &str, page: i64, page_size: i64)
        -> anyhow::Result<Page<ProductCode>>;
    /// Bulk upsert keyed on code; returns the number of rows written.
    async fn upsert(&self, rows: Vec<CodeUpsert>) -> anyhow::Result<u64>;
    async fn delete(&self, id: i64) -> anyhow::Result<bool>;
    async fn clear(&self) -> anyhow::Result<()>;
}

/// Registration store contract.
#[async_trait]
pub trait WarrantyStore: Send + Sync {
    async fn insert(&self, reg: NewRegistration) -> anyhow::Result<InsertOutcome>;
    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<WarrantyRegistration>>;
    /// First registration whose stored code equals any of the given forms.
    async fn find_by_codes(&self, codes: &[String])
        -> anyhow::Result<Option<WarrantyRegistration>>;
    /// Claim (`Some`) or unclaim (`None`); false when the id is unknown.
    async fn set_claim(&self, id: i64, stamp: Option<ClaimStamp>) -> anyhow::Result<bool>;
    async fn list(&self, code_filter: &str, page: i64, page_size: i64)
        -> anyhow::Result<Page<WarrantyRegistration>>;
    /// Substring search across customer and product fields.
    async fn search(&self, q: &str, page: i64, page_size: i64)
        -> anyhow::Result<Page<WarrantyRegistration>>;
    async fn find_by_email(&self, email: &str) -> anyhow::Result<Vec<WarrantyRegistration>>;
    async fn delete(&self, id: i64) -> anyhow::Result<bool>;
    async fn clear(&self) -> anyhow::Result<()>;
}

/// Identity and session contract for staff callers.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Verifies username-or-email + password; `None` means bad credentials.
    async fn login(&self, identifier: &str, password: &str) -> anyhow::Result<Option<Session>>;

    /// Resolves a bearer token to the identity it was issued for.
    async fn resolve(&self, token: &str) -> Option<StaffIdentity>;

    /// Invalidates a token; false when it was not live.
    async fn logout(&self, token: &str) -> bool;
}
