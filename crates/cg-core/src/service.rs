//! # WarrantyService
//!
//! Orchestrates the validation pipeline and the registration lifecycle on
//! top of the store ports. This is the single home of the rules: the HTTP
//! handlers, admin screens, and bulk import all call through here.

use std::sync::Arc;

use chrono::Utc;

use crate::codes::{
    check_format, normalize_code, storage_variants, RESERVED_PREFIX, RESERVED_PRODUCT_TYPE,
};
use crate::coverage::{effective_expiry, parse_civil_date};
use crate::error::{AppError, Result};
use crate::models::{
    CodeCheck, CodeUpsert, NewRegistration, Page, ProductCode, RegistrationRequest, StaffIdentity,
    WarrantyRegistration, WarrantyStatus,
};
use crate::traits::{ClaimStamp, CodeInventory, InsertOutcome, WarrantyStore};

fn dependency(err: anyhow::Error) -> AppError {
    AppError::Dependency(format!("{err:#}"))
}

pub struct WarrantyService {
    codes: Arc<dyn CodeInventory>,
    store: Arc<dyn WarrantyStore>,
}

impl WarrantyService {
    pub fn new(codes: Arc<dyn CodeInventory>, store: Arc<dyn WarrantyStore>) -> Self {
        Self { codes, store }
    }

    /// Looks a normalized code up in the inventory, probing the historical
    /// spacing variants in priority order. A lookup failure is treated as
    /// not-found: registration must fail closed rather than accept a code
    /// it cannot verify.
    pub async fn resolve_code(&self, normalized: &str) -> Option<ProductCode> {
        for variant in storage_variants(normalized) {
            match self.codes.find(&variant).await {
                Ok(Some(row)) => return Some(row),
                Ok(None) => continue,
                Err(err) => {
                    log::warn!("code lookup failed, treating {normalized} as unknown: {err:#}");
                    return None;
                }
            }
        }
        None
    }

    /// The check-code operation behind the registration form: format flags
    /// plus existence and the inventory's stored product type.
    pub async fn check_code(&self, raw: &str) -> CodeCheck {
        let code = normalize_code(raw);
        let row = self.resolve_code(&code).await;
        let stored_type = row.as_ref().and_then(|r| r.product_type.as_deref());
        let mut check = check_format(&code, stored_type);
        check.exists = row.is_some();
        check
    }

    /// Registers a warranty. Pipeline: normalize → format → existence →
    /// reserved-prefix cross-checks → expiry derivation → duplicate probe →
    /// insert. Each rejection keeps its own error kind so callers can show
    /// the specific reason.
    pub async fn register(&self, req: RegistrationRequest) -> Result<i64> {
        let required = [
            ("name", &req.name),
            ("email", &req.email),
            ("phone model", &req.phone_model),
            ("mobile", &req.mobile),
            ("country", &req.country),
            ("product type", &req.product_type),
            ("purchase date", &req.purchase_date),
        ];
        for (field, value) in required {
            if value.trim().is_empty() {
                return Err(AppError::Validation(format!("{field} is required")));
            }
        }

        let code = normalize_code(&req.product_code);
        let asserted = req.product_type.trim();
        let check = check_format(&code, Some(asserted));
        if !check.length_ok {
            return Err(AppError::Validation(format!(
                "invalid product code length: {}",
                check.length
            )));
        }

        let inventory_row = self
            .resolve_code(&code)
            .await
            .ok_or_else(|| AppError::NotFound("product code".to_string(), code.clone()))?;

        // The reserved-prefix rule cuts both ways: an 8899 code belongs to
        // the Dream Case line, and a Dream Case registration needs an 8899
        // code. The stored inventory type must agree as well.
        if check.begins_reserved_prefix {
            if !check.valid_product_type {
                return Err(AppError::Validation(
                    "code is valid only with the Dream Case product".to_string(),
                ));
            }
            let stored = check_format(&code, inventory_row.product_type.as_deref());
            if !stored.valid_product_type {
                return Err(AppError::Validation(
                    "code is not issued for this product type".to_string(),
                ));
            }
        } else if asserted == RESERVED_PRODUCT_TYPE {
            return Err(AppError::Validation(
                "code is not valid for the Dream Case product".to_string(),
            ));
        }

        let purchase = parse_civil_date(&req.purchase_date)
            .ok_or_else(|| AppError::Validation("purchase date is missing or invalid".to_string()))?;
        let explicit = req.expiry_date.as_deref().and_then(parse_civil_date);
        let expiry = effective_expiry(Some(purchase), explicit)?;

        // Advisory duplicate probe first for a precise reason; the store's
        // uniqueness constraint closes the remaining race window.
        let duplicate = self
            .store
            .find_by_codes(&storage_variants(&code))
            .await
            .map_err(dependency)?;
        if duplicate.is_some() {
            return Err(AppError::Conflict(
                "product code already registered".to_string(),
            ));
        }

        let outcome = self
            .store
            .insert(NewRegistration {
                name: req.name.trim().to_string(),
                email: req.email.trim().to_string(),
                phone_model: req.phone_model.trim().to_string(),
                mobile: req.mobile.trim().to_string(),
                country: req.country.trim().to_string(),
                product_type: asserted.to_string(),
                purchase_date: purchase,
                expiry_date: expiry,
                product_code: code,
                status: WarrantyStatus::Active,
                created_at: Utc::now(),
            })
            .await
            .map_err(dependency)?;

        match outcome {
            InsertOutcome::Created(id) => Ok(id),
            InsertOutcome::DuplicateCode => Err(AppError::Conflict(
                "product code already registered".to_string(),
            )),
        }
    }

    pub async fn registration(&self, id: i64) -> Result<WarrantyRegistration> {
        self.store
            .find_by_id(id)
            .await
            .map_err(dependency)?
            .ok_or_else(|| AppError::NotFound("registration".to_string(), id.to_string()))
    }

    /// Marks a registration claimed by the authenticated staff caller.
    /// Claimant identity comes from the resolved session, never a payload.
    /// Expired registrations are still claimable server-side; clients use
    /// the coverage classifier to discourage it.
    pub async fn claim(&self, id: i64, claimant: &StaffIdentity) -> Result<()> {
        self.registration(id).await?;
        let stamp = ClaimStamp {
            claimed_at: Utc::now(),
            claimed_by: claimant.email.clone(),
        };
        let updated = self
            .store
            .set_claim(id, Some(stamp))
            .await
            .map_err(dependency)?;
        if !updated {
            return Err(AppError::NotFound("registration".to_string(), id.to_string()));
        }
        Ok(())
    }

    /// Administrative revert: clears claimant and timestamp, returning the
    /// registration to the not-claimed state.
    pub async fn unclaim(&self, id: i64) -> Result<()> {
        self.registration(id).await?;
        let updated = self.store.set_claim(id, None).await.map_err(dependency)?;
        if !updated {
            return Err(AppError::NotFound("registration".to_string(), id.to_string()));
        }
        Ok(())
    }

    pub async fn delete_registration(&self, id: i64) -> Result<()> {
        let deleted = self.store.delete(id).await.map_err(dependency)?;
        if !deleted {
            return Err(AppError::NotFound("registration".to_string(), id.to_string()));
        }
        Ok(())
    }

    pub async fn reset_registrations(&self) -> Result<()> {
        self.store.clear().await.map_err(dependency)
    }

    pub async fn registrations(
        &self,
        code_filter: &str,
        page: i64,
        page_size: i64,
    ) -> Result<Page<WarrantyRegistration>> {
        self.store
            .list(code_filter, page, page_size)
            .await
            .map_err(dependency)
    }

    pub async fn search_registrations(
        &self,
        q: &str,
        page: i64,
        page_size: i64,
    ) -> Result<Page<WarrantyRegistration>> {
        self.store.search(q, page, page_size).await.map_err(dependency)
    }

    pub async fn registrations_by_email(&self, email: &str) -> Result<Vec<WarrantyRegistration>> {
        self.store.find_by_email(email.trim()).await.map_err(dependency)
    }

    pub async fn codes(
        &self,
        filter: &str,
        page: i64,
        page_size: i64,
    ) -> Result<Page<ProductCode>> {
        self.codes.list(filter, page, page_size).await.map_err(dependency)
    }

    /// Bulk inventory upload. Codes are stored in canonical form on every
    /// write going forward; the read-side variant probe only exists for
    /// rows that predate this. Untyped reserved-prefix codes default to
    /// the Dream Case label, as the historical import did.
    pub async fn upload_codes(&self, rows: Vec<CodeUpsert>) -> Result<u64> {
        let now = Utc::now();
        let prepared: Vec<CodeUpsert> = rows
            .into_iter()
            .filter_map(|row| {
                let code = normalize_code(&row.code);
                if code.is_empty() {
                    return None;
                }
                let product_type = row
                    .product_type
                    .map(|t| t.trim().to_string())
                    .filter(|t| !t.is_empty())
                    .or_else(|| {
                        code.starts_with(RESERVED_PREFIX)
                            .then(|| RESERVED_PRODUCT_TYPE.to_string())
                    });
                Some(CodeUpsert {
                    id: row.id,
                    code,
                    product_type,
                    created_at: row.created_at.or(Some(now)),
                })
            })
            .collect();
        if prepared.is_empty() {
            return Err(AppError::Validation("no usable code rows in upload".to_string()));
        }
        self.codes.upsert(prepared).await.map_err(dependency)
    }

    pub async fn delete_code(&self, id: i64) -> Result<()> {
        let deleted = self.codes.delete(id).await.map_err(dependency)?;
        if !deleted {
            return Err(AppError::NotFound("product code".to_string(), id.to_string()));
        }
        Ok(())
    }

    pub async fn reset_codes(&self) -> Result<()> {
        self.codes.clear().await.map_err(dependency)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::StaffRole;
    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::sync::Mutex;

    // In-memory ports mimicking the stores' exact-match semantics.

    #[derive(Default)]
    struct MemoryInventory {
        rows: Mutex<Vec<ProductCode>>,
        fail: bool,
    }

    impl MemoryInventory {
        fn with_codes(codes: &[(&str, Option<&str>)]) -> Arc<Self> {
            let rows = codes
                .iter()
                .enumerate()
                .map(|(i, (code, ty))| ProductCode {
                    id: i as i64 + 1,
                    code: code.to_string(),
                    product_type: ty.map(str::to_string),
                    created_at: Utc::now(),
                })
                .collect();
            Arc::new(Self { rows: Mutex::new(rows), fail: false })
        }

        fn failing() -> Arc<Self> {
            Arc::new(Self { rows: Mutex::new(Vec::new()), fail: true })
        }
    }

    #[async_trait]
    impl CodeInventory for MemoryInventory {
        async fn find(&self, code: &str) -> anyhow::Result<Option<ProductCode>> {
            if self.fail {
                return Err(anyhow!("inventory offline"));
            }
            Ok(self.rows.lock().unwrap().iter().find(|r| r.code == code).cloned())
        }

        async fn list(&self, _: &str, page: i64, page_size: i64) -> anyhow::Result<Page<ProductCode>> {
            let rows = self.rows.lock().unwrap();
            Ok(Page { total: rows.len() as i64, page, page_size, items: rows.clone() })
        }

        async fn upsert(&self, incoming: Vec<CodeUpsert>) -> anyhow::Result<u64> {
            let mut rows = self.rows.lock().unwrap();
            let count = incoming.len() as u64;
            for up in incoming {
                if let Some(row) = rows.iter_mut().find(|r| r.code == up.code) {
                    row.product_type = up.product_type;
                } else {
                    let id = rows.len() as i64 + 1;
                    rows.push(ProductCode {
                        id: up.id.unwrap_or(id),
                        code: up.code,
                        product_type: up.product_type,
                        created_at: up.created_at.unwrap_or_else(Utc::now),
                    });
                }
            }
            Ok(count)
        }

        async fn delete(&self, id: i64) -> anyhow::Result<bool> {
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|r| r.id != id);
            Ok(rows.len() < before)
        }

        async fn clear(&self) -> anyhow::Result<()> {
            self.rows.lock().unwrap().clear();
            Ok(())
        }
    }

    #[derive(Default)]
    struct MemoryStore {
        rows: Mutex<Vec<WarrantyRegistration>>,
    }

    #[async_trait]
    impl WarrantyStore for MemoryStore {
        async fn insert(&self, reg: NewRegistration) -> anyhow::Result<InsertOutcome> {
            let mut rows = self.rows.lock().unwrap();
            if rows.iter().any(|r| r.product_code == reg.product_code) {
                return Ok(InsertOutcome::DuplicateCode);
            }
            let id = rows.iter().map(|r| r.id).max().unwrap_or(0) + 1;
            rows.push(WarrantyRegistration {
                id,
                name: reg.name,
                email: reg.email,
                phone_model: reg.phone_model,
                mobile: reg.mobile,
                country: reg.country,
                product_type: reg.product_type,
                purchase_date: Some(reg.purchase_date),
                expiry_date: Some(reg.expiry_date),
                product_code: reg.product_code,
                status: reg.status,
                created_at: reg.created_at,
                claimed_at: None,
                claimed_by: None,
            });
            Ok(InsertOutcome::Created(id))
        }

        async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<WarrantyRegistration>> {
            Ok(self.rows.lock().unwrap().iter().find(|r| r.id == id).cloned())
        }

        async fn find_by_codes(
            &self,
            codes: &[String],
        ) -> anyhow::Result<Option<WarrantyRegistration>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .find(|r| codes.contains(&r.product_code))
                .cloned())
        }

        async fn set_claim(&self, id: i64, stamp: Option<ClaimStamp>) -> anyhow::Result<bool> {
            let mut rows = self.rows.lock().unwrap();
            let Some(row) = rows.iter_mut().find(|r| r.id == id) else {
                return Ok(false);
            };
            match stamp {
                Some(stamp) => {
                    row.status = WarrantyStatus::Claimed;
                    row.claimed_at = Some(stamp.claimed_at);
                    row.claimed_by = Some(stamp.claimed_by);
                }
                None => {
                    row.status = WarrantyStatus::Active;
                    row.claimed_at = None;
                    row.claimed_by = None;
                }
            }
            Ok(true)
        }

        async fn list(
            &self,
            _: &str,
            page: i64,
            page_size: i64,
        ) -> anyhow::Result<Page<WarrantyRegistration>> {
            let rows = self.rows.lock().unwrap();
            Ok(Page { total: rows.len() as i64, page, page_size, items: rows.clone() })
        }

        async fn search(
            &self,
            _: &str,
            page: i64,
            page_size: i64,
        ) -> anyhow::Result<Page<WarrantyRegistration>> {
            self.list("", page, page_size).await
        }

        async fn find_by_email(&self, email: &str) -> anyhow::Result<Vec<WarrantyRegistration>> {
            Ok(self
                .rows
                .lock()
                .unwrap()
                .iter()
                .filter(|r| r.email.eq_ignore_ascii_case(email))
                .cloned()
                .collect())
        }

        async fn delete(&self, id: i64) -> anyhow::Result<bool> {
            let mut rows = self.rows.lock().unwrap();
            let before = rows.len();
            rows.retain(|r| r.id != id);
            Ok(rows.len() < before)
        }

        async fn clear(&self) -> anyhow::Result<()> {
            self.rows.lock().unwrap().clear();
            Ok(())
        }
    }

    fn service_with(codes: &[(&str, Option<&str>)]) -> WarrantyService {
        WarrantyService::new(MemoryInventory::with_codes(codes), Arc::new(MemoryStore::default()))
    }

    fn request(code: &str, product_type: &str, purchase: &str) -> RegistrationRequest {
        RegistrationRequest {
            name: "Mei Tan".into(),
            email: "mei@example.com".into(),
            phone_model: "iPhone 15 Pro".into(),
            mobile: "+6598765432".into(),
            country: "Singapore".into(),
            product_type: product_type.into(),
            purchase_date: purchase.into(),
            expiry_date: None,
            product_code: code.into(),
        }
    }

    fn staff(email: &str) -> StaffIdentity {
        StaffIdentity { email: email.into(), role: StaffRole::Partner }
    }

    #[tokio::test]
    async fn check_code_finds_space_grouped_inventory_rows() {
        let svc = service_with(&[("1234 5678 9012 3456", Some("X-Buffer Clear"))]);
        let check = svc.check_code("1234567890123456").await;
        assert!(check.exists);
        assert!(check.length_ok);
        assert!(check.valid_product_type);
        assert_eq!(check.product_type.as_deref(), Some("X-Buffer Clear"));
    }

    #[tokio::test]
    async fn check_code_fails_closed_when_the_inventory_errors() {
        let svc = WarrantyService::new(MemoryInventory::failing(), Arc::new(MemoryStore::default()));
        let check = svc.check_code("1234567890123456").await;
        assert!(!check.exists);
    }

    #[tokio::test]
    async fn register_dream_case_end_to_end() {
        let svc = service_with(&[("8899000011112222", Some("Dream Case"))]);
        let id = svc
            .register(request("8899 0000 1111 2222", "Dream Case", "2024-03-01"))
            .await
            .unwrap();
        let reg = svc.registration(id).await.unwrap();
        assert_eq!(reg.status, WarrantyStatus::Active);
        assert_eq!(reg.product_code, "8899000011112222");
        assert_eq!(
            reg.expiry_date,
            Some(NaiveDate::from_ymd_opt(2024, 8, 28).unwrap())
        );
        assert!(reg.claimed_at.is_none() && reg.claimed_by.is_none());
    }

    #[tokio::test]
    async fn register_rejects_reserved_code_with_wrong_type() {
        let svc = service_with(&[("8899000011112222", Some("Dream Case"))]);
        let err = svc
            .register(request("8899000011112222", "X-Buffer Clear", "2024-03-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)), "got {err:?}");
        // Nothing was persisted.
        assert!(svc.registrations("", 1, 20).await.unwrap().items.is_empty());
    }

    #[tokio::test]
    async fn register_rejects_dream_case_on_an_unreserved_code() {
        let svc = service_with(&[("1234567890123456", None)]);
        let err = svc
            .register(request("1234567890123456", "Dream Case", "2024-03-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn register_cross_checks_the_stored_inventory_type() {
        // An 8899 code that was uploaded under a different label is a
        // data-integrity error and must not be registered.
        let svc = service_with(&[("8899000011112222", Some("X-Armor"))]);
        let err = svc
            .register(request("8899000011112222", "Dream Case", "2024-03-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn register_rejects_unknown_codes_as_not_found() {
        let svc = service_with(&[]);
        let err = svc
            .register(request("1234567890123456", "X-Buffer Clear", "2024-03-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_, _)));
    }

    #[tokio::test]
    async fn register_rejects_bad_lengths_before_touching_the_stores() {
        let svc = service_with(&[]);
        let err = svc
            .register(request("12345", "X-Buffer Clear", "2024-03-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn register_rejects_unparsable_purchase_dates() {
        let svc = service_with(&[("1234567890123456", None)]);
        let err = svc
            .register(request("1234567890123456", "X-Buffer Clear", "soon"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }

    #[tokio::test]
    async fn duplicate_registration_is_a_conflict_not_a_generic_error() {
        let svc = service_with(&[("1234567890123456", None)]);
        svc.register(request("1234567890123456", "X-Buffer Clear", "2024-03-01"))
            .await
            .unwrap();
        let err = svc
            .register(request("1234-5678-9012-3456", "X-Buffer Clear", "2024-04-01"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Conflict(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn explicit_expiry_wins_over_the_computed_window() {
        let svc = service_with(&[("1234567890123456", None)]);
        let mut req = request("1234567890123456", "X-Buffer Clear", "2024-01-01");
        req.expiry_date = Some("2026-01-01".into());
        let id = svc.register(req).await.unwrap();
        let reg = svc.registration(id).await.unwrap();
        assert_eq!(
            reg.expiry_date,
            Some(NaiveDate::from_ymd_opt(2026, 1, 1).unwrap())
        );
    }

    #[tokio::test]
    async fn claim_then_unclaim_restores_the_never_claimed_state() {
        let svc = service_with(&[("1234567890123456", None)]);
        let id = svc
            .register(request("1234567890123456", "X-Buffer Clear", "2024-03-01"))
            .await
            .unwrap();
        let fresh = svc.registration(id).await.unwrap();

        svc.claim(id, &staff("partner@example.com")).await.unwrap();
        let claimed = svc.registration(id).await.unwrap();
        assert_eq!(claimed.status, WarrantyStatus::Claimed);
        assert_eq!(claimed.claimed_by.as_deref(), Some("partner@example.com"));
        assert!(claimed.claimed_at.is_some());

        svc.unclaim(id).await.unwrap();
        let reverted = svc.registration(id).await.unwrap();
        assert_eq!(reverted.status, WarrantyStatus::Active);
        assert!(reverted.claimed_at.is_none() && reverted.claimed_by.is_none());
        assert_eq!(reverted.id, fresh.id);
        assert_eq!(reverted.created_at, fresh.created_at);
    }

    #[tokio::test]
    async fn claim_of_an_unknown_id_is_not_found() {
        let svc = service_with(&[]);
        let err = svc.claim(41, &staff("partner@example.com")).await.unwrap_err();
        assert!(matches!(err, AppError::NotFound(_, _)));
    }

    #[tokio::test]
    async fn upload_defaults_reserved_codes_to_dream_case() {
        let svc = service_with(&[]);
        let written = svc
            .upload_codes(vec![
                CodeUpsert {
                    id: None,
                    code: "8899 1111 2222 3333".into(),
                    product_type: None,
                    created_at: None,
                },
                CodeUpsert {
                    id: None,
                    code: "4444555566667777".into(),
                    product_type: Some("X-Buffer Clear".into()),
                    created_at: None,
                },
            ])
            .await
            .unwrap();
        assert_eq!(written, 2);
        let check = svc.check_code("8899111122223333").await;
        assert!(check.exists);
        assert_eq!(check.product_type.as_deref(), Some("Dream Case"));
        assert!(check.valid_product_type);
    }

    #[tokio::test]
    async fn upload_with_no_usable_rows_is_a_validation_error() {
        let svc = service_with(&[]);
        let err = svc
            .upload_codes(vec![CodeUpsert {
                id: None,
                code: "  ".into(),
                product_type: None,
                created_at: None,
            }])
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
