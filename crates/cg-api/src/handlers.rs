//! # cg-api Handlers
//!
//! This module coordinates the flow between HTTP requests and the core
//! service: JSON in, JSON out, with every core error kind mapped to its
//! own status code so callers can show the specific reason.

use std::fmt;
use std::sync::Arc;

use actix_web::http::{header, StatusCode};
use actix_web::{web, HttpRequest, HttpResponse, ResponseError};
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

use cg_core::coverage::{display_offset, today_civil, within_coverage};
use cg_core::error::AppError;
use cg_core::models::{
    CodeUpsert, Page, ProductCode, RegistrationRequest, StaffIdentity, StaffRole,
    WarrantyRegistration,
};
use cg_core::traits::AuthProvider;
use cg_core::WarrantyService;

/// State shared across all workers.
pub struct AppState {
    pub service: WarrantyService,
    pub auth: Arc<dyn AuthProvider>,
}

/// Wire wrapper around [`AppError`] carrying the HTTP mapping.
#[derive(Debug)]
pub struct ApiError(pub AppError);

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        Self(err)
    }
}

impl ResponseError for ApiError {
    fn status_code(&self) -> StatusCode {
        match self.0 {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_, _) => StatusCode::NOT_FOUND,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Dependency(_) => StatusCode::BAD_GATEWAY,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn error_response(&self) -> HttpResponse {
        HttpResponse::build(self.status_code()).json(json!({ "error": self.0.to_string() }))
    }
}

fn bearer_token(req: &HttpRequest) -> Option<&str> {
    req.headers()
        .get(header::AUTHORIZATION)?
        .to_str()
        .ok()?
        .strip_prefix("Bearer ")
}

/// Resolves the caller's session and checks the route's role list. The
/// claimant identity used downstream comes from here, never the payload.
async fn require_role(
    state: &AppState,
    req: &HttpRequest,
    allowed: &[StaffRole],
) -> Result<StaffIdentity, ApiError> {
    let token = bearer_token(req)
        .ok_or_else(|| AppError::Unauthorized("missing bearer token".to_string()))?;
    let identity = state
        .auth
        .resolve(token)
        .await
        .ok_or_else(|| AppError::Unauthorized("unknown or expired session".to_string()))?;
    if !allowed.contains(&identity.role) {
        return Err(AppError::Forbidden("insufficient role".to_string()).into());
    }
    Ok(identity)
}

// ── Wire DTOs ────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
pub struct LoginPayload {
    pub identifier: String,
    pub password: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RegisterPayload {
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

impl From<RegisterPayload> for RegistrationRequest {
    fn from(p: RegisterPayload) -> Self {
        RegistrationRequest {
            name: p.name,
            email: p.email,
            phone_model: p.phone_model,
            mobile: p.mobile,
            country: p.country,
            product_type: p.product_type,
            purchase_date: p.purchase_date,
            expiry_date: p.expiry_date,
            product_code: p.product_code,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct UploadPayload {
    pub codes: Vec<UploadCode>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadCode {
    #[serde(default)]
    pub id: Option<i64>,
    pub code: String,
    #[serde(default)]
    pub product_type: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageQuery {
    #[serde(default)]
    pub q: Option<String>,
    #[serde(default)]
    pub page: Option<i64>,
    #[serde(default)]
    pub page_size: Option<i64>,
}

impl PageQuery {
    fn sanitized(&self) -> (String, i64, i64) {
        let filter = self.q.clone().unwrap_or_default();
        let page = self.page.unwrap_or(1).max(1);
        let page_size = self.page_size.unwrap_or(20).clamp(1, 100);
        (filter, page, page_size)
    }
}

#[derive(Debug, Deserialize)]
pub struct EmailQuery {
    pub email: String,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CodeCheckResponse {
    pub exists: bool,
    pub product_type: Option<String>,
    pub length: usize,
    pub length_ok: bool,
    pub valid_product_type: bool,
    #[serde(rename = "begins8899")]
    pub begins_8899: bool,
}

fn fmt_date(date: NaiveDate) -> String {
    date.format("%Y-%m-%d").to_string()
}

/// Audit timestamps are rendered in the fixed display zone so staff in
/// different locales see the same wall-clock values.
fn fmt_timestamp(ts: DateTime<Utc>) -> String {
    ts.with_timezone(&display_offset())
        .format("%Y-%m-%d, %H:%M:%S")
        .to_string()
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarrantyView {
    pub id: i64,
    pub name: String,
    pub email: String,
    pub phone_model: String,
    pub mobile: String,
    pub country: String,
    pub product_type: String,
    pub purchase_date: Option<String>,
    pub expiry_date: Option<String>,
    pub product_code: String,
    pub status: &'static str,
    pub created_at: String,
    pub claimed_at: Option<String>,
    pub claimed_by: Option<String>,
    /// Claim-eligibility hint for UIs; not enforced server-side.
    pub within_coverage: bool,
}

impl From<WarrantyRegistration> for WarrantyView {
    fn from(reg: WarrantyRegistration) -> Self {
        let active = within_coverage(&reg, today_civil());
        WarrantyView {
            id: reg.id,
            name: reg.name,
            email: reg.email,
            phone_model: reg.phone_model,
            mobile: reg.mobile,
            country: reg.country,
            product_type: reg.product_type,
            purchase_date: reg.purchase_date.map(fmt_date),
            expiry_date: reg.expiry_date.map(fmt_date),
            product_code: reg.product_code,
            status: reg.status.as_str(),
            created_at: fmt_timestamp(reg.created_at),
            claimed_at: reg.claimed_at.map(fmt_timestamp),
            claimed_by: reg.claimed_by,
            within_coverage: active,
        }
    }
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductCodeView {
    pub id: i64,
    pub code: String,
    pub product_type: Option<String>,
    pub created_at: String,
}

impl From<ProductCode> for ProductCodeView {
    fn from(code: ProductCode) -> Self {
        ProductCodeView {
            id: code.id,
            code: code.code,
            product_type: code.product_type,
            created_at: fmt_timestamp(code.created_at),
        }
    }
}

fn map_page<T, V: From<T>>(page: Page<T>) -> Page<V> {
    Page {
        total: page.total,
        page: page.page,
        page_size: page.page_size,
        items: page.items.into_iter().map(V::from).collect(),
    }
}

// ── Session handlers ─────────────────────────────────────────────────────────

pub async fn login(
    state: web::Data<AppState>,
    payload: web::Json<LoginPayload>,
) -> Result<HttpResponse, ApiError> {
    let session = state
        .auth
        .login(&payload.identifier, &payload.password)
        .await
        .map_err(|err| AppError::Dependency(format!("{err:#}")))?
        .ok_or_else(|| AppError::Unauthorized("invalid credentials".to_string()))?;
    Ok(HttpResponse::Ok().json(json!({
        "token": session.token,
        "email": session.identity.email,
        "role": session.identity.role,
    })))
}

pub async fn logout(state: web::Data<AppState>, req: HttpRequest) -> HttpResponse {
    if let Some(token) = bearer_token(&req) {
        state.auth.logout(token).await;
    }
    HttpResponse::Ok().json(json!({ "ok": true }))
}

// ── Public handlers ──────────────────────────────────────────────────────────

pub async fn check_code(state: web::Data<AppState>, path: web::Path<String>) -> HttpResponse {
    let check = state.service.check_code(&path.into_inner()).await;
    HttpResponse::Ok().json(CodeCheckResponse {
        exists: check.exists,
        product_type: check.product_type,
        length: check.length,
        length_ok: check.length_ok,
        valid_product_type: check.valid_product_type,
        begins_8899: check.begins_reserved_prefix,
    })
}

pub async fn register(
    state: web::Data<AppState>,
    payload: web::Json<RegisterPayload>,
) -> Result<HttpResponse, ApiError> {
    let id = state.service.register(payload.into_inner().into()).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "id": id })))
}

pub async fn by_email(
    state: web::Data<AppState>,
    query: web::Query<EmailQuery>,
) -> Result<HttpResponse, ApiError> {
    if query.email.trim().is_empty() {
        return Err(AppError::Validation("email is required".to_string()).into());
    }
    let items: Vec<WarrantyView> = state
        .service
        .registrations_by_email(&query.email)
        .await?
        .into_iter()
        .map(WarrantyView::from)
        .collect();
    Ok(HttpResponse::Ok().json(json!({ "count": items.len(), "items": items })))
}

// ── Partner/admin handlers ───────────────────────────────────────────────────

pub async fn search_warranties(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    require_role(&state, &req, &[StaffRole::Partner, StaffRole::Admin]).await?;
    let (q, page, page_size) = query.sanitized();
    let result = state.service.search_registrations(&q, page, page_size).await?;
    Ok(HttpResponse::Ok().json(map_page::<_, WarrantyView>(result)))
}

pub async fn claim(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    let identity = require_role(&state, &req, &[StaffRole::Partner, StaffRole::Admin]).await?;
    state.service.claim(path.into_inner(), &identity).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}

// ── Admin handlers ───────────────────────────────────────────────────────────

pub async fn list_warranties(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    require_role(&state, &req, &[StaffRole::Admin]).await?;
    let (q, page, page_size) = query.sanitized();
    let result = state.service.registrations(&q, page, page_size).await?;
    Ok(HttpResponse::Ok().json(map_page::<_, WarrantyView>(result)))
}

pub async fn unclaim(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    require_role(&state, &req, &[StaffRole::Admin]).await?;
    state.service.unclaim(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}

pub async fn delete_warranty(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    require_role(&state, &req, &[StaffRole::Admin]).await?;
    state.service.delete_registration(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}

pub async fn reset_warranties(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    require_role(&state, &req, &[StaffRole::Admin]).await?;
    state.service.reset_registrations().await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}

pub async fn list_codes(
    state: web::Data<AppState>,
    req: HttpRequest,
    query: web::Query<PageQuery>,
) -> Result<HttpResponse, ApiError> {
    require_role(&state, &req, &[StaffRole::Admin]).await?;
    let (q, page, page_size) = query.sanitized();
    let result = state.service.codes(&q, page, page_size).await?;
    Ok(HttpResponse::Ok().json(map_page::<_, ProductCodeView>(result)))
}

pub async fn upload_codes(
    state: web::Data<AppState>,
    req: HttpRequest,
    payload: web::Json<UploadPayload>,
) -> Result<HttpResponse, ApiError> {
    require_role(&state, &req, &[StaffRole::Admin]).await?;
    let rows = payload
        .into_inner()
        .codes
        .into_iter()
        .map(|c| CodeUpsert {
            id: c.id,
            code: c.code,
            product_type: c.product_type,
            created_at: c.created_at,
        })
        .collect();
    let written = state.service.upload_codes(rows).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true, "count": written })))
}

pub async fn delete_code(
    state: web::Data<AppState>,
    req: HttpRequest,
    path: web::Path<i64>,
) -> Result<HttpResponse, ApiError> {
    require_role(&state, &req, &[StaffRole::Admin]).await?;
    state.service.delete_code(path.into_inner()).await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}

pub async fn reset_codes(
    state: web::Data<AppState>,
    req: HttpRequest,
) -> Result<HttpResponse, ApiError> {
    require_role(&state, &req, &[StaffRole::Admin]).await?;
    state.service.reset_codes().await?;
    Ok(HttpResponse::Ok().json(json!({ "ok": true })))
}
