//! # cg-db-sqlite Implementation
//!
//! This module implements the data mapping between the SQLite relational
//! model and the `cg-core` domain models: the product-code inventory and
//! the warranty-registration store.
//!
//! The `warranty_registrations.product_code` column carries a UNIQUE
//! constraint, so the check-then-insert race on registration resolves to a
//! `DuplicateCode` outcome here rather than a second row.

use async_trait::async_trait;
use cg_core::models::{CodeUpsert, NewRegistration, Page, ProductCode, WarrantyRegistration};
use cg_core::models::WarrantyStatus;
use cg_core::traits::{ClaimStamp, CodeInventory, InsertOutcome, WarrantyStore};
use chrono::{DateTime, NaiveDate, Utc};
use sqlx::sqlite::{SqlitePool, SqlitePoolOptions, SqliteRow};
use sqlx::Row;

const SCHEMA: &[&str] = &[
    "CREATE TABLE IF NOT EXISTS product_codes (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        code TEXT NOT NULL UNIQUE,
        product_type TEXT,
        created_at TEXT NOT NULL
    )",
    "CREATE TABLE IF NOT EXISTS warranty_registrations (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        email TEXT NOT NULL,
        phone_model TEXT NOT NULL DEFAULT '',
        mobile TEXT NOT NULL DEFAULT '',
        country TEXT NOT NULL DEFAULT '',
        product_type TEXT NOT NULL DEFAULT '',
        purchase_date TEXT,
        expiry_date TEXT,
        product_code TEXT NOT NULL UNIQUE,
        status TEXT NOT NULL,
        created_at TEXT NOT NULL,
        claimed_at TEXT,
        claimed_by TEXT
    )",
    "CREATE INDEX IF NOT EXISTS idx_warranty_registrations_email
        ON warranty_registrations (email)",
];

/// Opens (or creates) the database and ensures the schema exists.
///
/// # Developer Note
/// A single connection is plenty at this write volume, and it keeps
/// `sqlite::memory:` databases coherent across the pool.
pub async fn connect(url: &str) -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect(url)
        .await?;
    for statement in SCHEMA {
        sqlx::query(statement).execute(&pool).await?;
    }
    Ok(pool)
}

pub struct SqliteCodeInventory {
    pool: SqlitePool,
}

impl SqliteCodeInventory {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn map_code(row: &SqliteRow) -> ProductCode {
    ProductCode {
        id: row.get("id"),
        code: row.get("code"),
        product_type: row.get("product_type"),
        created_at: row.get("created_at"),
    }
}

#[async_trait]
impl CodeInventory for SqliteCodeInventory {
    /// Exact-match lookup; the spacing-variant probe happens in the core.
    async fn find(&self, code: &str) -> anyhow::Result<Option<ProductCode>> {
        let row = sqlx::query("SELECT id, code, product_type, created_at FROM product_codes WHERE code = ?")
            .bind(code)
            .fetch_optional(&self.pool)
            .await?;
        Ok(row.as_ref().map(map_code))
    }

    async fn list(
        &self,
        filter: &str,
        page: i64,
        page_size: i64,
    ) -> anyhow::Result<Page<ProductCode>> {
        let like = format!("%{}%", filter.to_uppercase());
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM product_codes WHERE upper(code) LIKE ?",
        )
        .bind(&like)
        .fetch_one(&self.pool)
        .await?;

        let rows = sqlx::query(
            "SELECT id, code, product_type, created_at FROM product_codes
             WHERE upper(code) LIKE ? ORDER BY id ASC LIMIT ? OFFSET ?",
        )
        .bind(&like)
        .bind(page_size)
        .bind((page - 1) * page_size)
        .fetch_all(&self.pool)
        .await?;

        Ok(Page {
            total,
            page,
            page_size,
            items: rows.iter().map(map_code).collect(),
        })
    }

    /// Bulk upsert keyed on code, atomically.
    async fn upsert(&self, rows: Vec<CodeUpsert>) -> anyhow::Result<u64> {
        let mut tx = self.pool.begin().await?;
        let written = rows.len() as u64;
        for row in rows {
            sqlx::query(
                "INSERT INTO product_codes (id, code, product_type, created_at)
                 VALUES (?, ?, ?, ?)
                 ON CONFLICT(code) DO UPDATE SET
                     product_type = excluded.product_type,
                     created_at = excluded.created_at",
            )
            .bind(row.id)
            .bind(&row.code)
            .bind(&row.product_type)
            .bind(row.created_at.unwrap_or_else(Utc::now))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(written)
    }

    async fn delete(&self, id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM product_codes WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM product_codes")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

pub struct SqliteWarrantyStore {
    pool: SqlitePool,
}

impl SqliteWarrantyStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn map_registration(row: &SqliteRow) -> WarrantyRegistration {
    let status: String = row.get("status");
    WarrantyRegistration {
        id: row.get("id"),
        name: row.get("name"),
        email: row.get("email"),
        phone_model: row.get("phone_model"),
        mobile: row.get("mobile"),
        country: row.get("country"),
        product_type: row.get("product_type"),
        purchase_date: row.get::<Option<NaiveDate>, _>("purchase_date"),
        expiry_date: row.get::<Option<NaiveDate>, _>("expiry_date"),
        product_code: row.get("product_code"),
        status: WarrantyStatus::parse(&status),
        created_at: row.get("created_at"),
        claimed_at: row.get::<Option<DateTime<Utc>>, _>("claimed_at"),
        claimed_by: row.get("claimed_by"),
    }
}

const REGISTRATION_COLUMNS: &str = "id, name, email, phone_model, mobile, country, product_type, \
     purchase_date, expiry_date, product_code, status, created_at, claimed_at, claimed_by";

#[async_trait]
impl WarrantyStore for SqliteWarrantyStore {
    async fn insert(&self, reg: NewRegistration) -> anyhow::Result<InsertOutcome> {
        let result = sqlx::query(
            "INSERT INTO warranty_registrations
                (name, email, phone_model, mobile, country, product_type,
                 purchase_date, expiry_date, product_code, status, created_at)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(&reg.name)
        .bind(&reg.email)
        .bind(&reg.phone_model)
        .bind(&reg.mobile)
        .bind(&reg.country)
        .bind(&reg.product_type)
        .bind(reg.purchase_date)
        .bind(reg.expiry_date)
        .bind(&reg.product_code)
        .bind(reg.status.as_str())
        .bind(reg.created_at)
        .execute(&self.pool)
        .await;

        match result {
            Ok(done) => Ok(InsertOutcome::Created(done.last_insert_rowid())),
            Err(sqlx::Error::Database(db))
                if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
            {
                Ok(InsertOutcome::DuplicateCode)
            }
            Err(err) => Err(err.into()),
        }
    }

    async fn find_by_id(&self, id: i64) -> anyhow::Result<Option<WarrantyRegistration>> {
        let sql = format!("SELECT {REGISTRATION_COLUMNS} FROM warranty_registrations WHERE id = ?");
        let row = sqlx::query(&sql).bind(id).fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(map_registration))
    }

    async fn find_by_codes(
        &self,
        codes: &[String],
    ) -> anyhow::Result<Option<WarrantyRegistration>> {
        if codes.is_empty() {
            return Ok(None);
        }
        let placeholders = vec!["?"; codes.len()].join(", ");
        let sql = format!(
            "SELECT {REGISTRATION_COLUMNS} FROM warranty_registrations
             WHERE product_code IN ({placeholders}) LIMIT 1"
        );
        let mut query = sqlx::query(&sql);
        for code in codes {
            query = query.bind(code);
        }
        let row = query.fetch_optional(&self.pool).await?;
        Ok(row.as_ref().map(map_registration))
    }

    async fn set_claim(&self, id: i64, stamp: Option<ClaimStamp>) -> anyhow::Result<bool> {
        let (status, claimed_at, claimed_by) = match stamp {
            Some(stamp) => (
                WarrantyStatus::Claimed,
                Some(stamp.claimed_at),
                Some(stamp.claimed_by),
            ),
            None => (WarrantyStatus::Active, None, None),
        };
        let result = sqlx::query(
            "UPDATE warranty_registrations
             SET status = ?, claimed_at = ?, claimed_by = ? WHERE id = ?",
        )
        .bind(status.as_str())
        .bind(claimed_at)
        .bind(claimed_by)
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list(
        &self,
        code_filter: &str,
        page: i64,
        page_size: i64,
    ) -> anyhow::Result<Page<WarrantyRegistration>> {
        let like = format!("%{}%", code_filter.to_uppercase());
        let total: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM warranty_registrations WHERE upper(product_code) LIKE ?",
        )
        .bind(&like)
        .fetch_one(&self.pool)
        .await?;

        let sql = format!(
            "SELECT {REGISTRATION_COLUMNS} FROM warranty_registrations
             WHERE upper(product_code) LIKE ? ORDER BY id ASC LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query(&sql)
            .bind(&like)
            .bind(page_size)
            .bind((page - 1) * page_size)
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            total,
            page,
            page_size,
            items: rows.iter().map(map_registration).collect(),
        })
    }

    async fn search(
        &self,
        q: &str,
        page: i64,
        page_size: i64,
    ) -> anyhow::Result<Page<WarrantyRegistration>> {
        let like = format!("%{}%", q.to_lowercase());
        let condition = "lower(name) LIKE ?1 OR lower(email) LIKE ?1 OR lower(mobile) LIKE ?1
             OR lower(phone_model) LIKE ?1 OR lower(country) LIKE ?1
             OR lower(product_type) LIKE ?1 OR lower(product_code) LIKE ?1";

        let count_sql = format!("SELECT COUNT(*) FROM warranty_registrations WHERE {condition}");
        let total: i64 = sqlx::query_scalar(&count_sql)
            .bind(&like)
            .fetch_one(&self.pool)
            .await?;

        let sql = format!(
            "SELECT {REGISTRATION_COLUMNS} FROM warranty_registrations
             WHERE {condition} ORDER BY id ASC LIMIT ?2 OFFSET ?3"
        );
        let rows = sqlx::query(&sql)
            .bind(&like)
            .bind(page_size)
            .bind((page - 1) * page_size)
            .fetch_all(&self.pool)
            .await?;

        Ok(Page {
            total,
            page,
            page_size,
            items: rows.iter().map(map_registration).collect(),
        })
    }

    async fn find_by_email(&self, email: &str) -> anyhow::Result<Vec<WarrantyRegistration>> {
        let sql = format!(
            "SELECT {REGISTRATION_COLUMNS} FROM warranty_registrations
             WHERE lower(email) = lower(?) ORDER BY id ASC"
        );
        let rows = sqlx::query(&sql).bind(email).fetch_all(&self.pool).await?;
        Ok(rows.iter().map(map_registration).collect())
    }

    async fn delete(&self, id: i64) -> anyhow::Result<bool> {
        let result = sqlx::query("DELETE FROM warranty_registrations WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn clear(&self) -> anyhow::Result<()> {
        sqlx::query("DELETE FROM warranty_registrations")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
