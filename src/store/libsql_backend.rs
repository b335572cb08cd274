//! libSQL backend: async `Database` trait implementation.
//!
//! Code sets and id lists are JSON arrays in TEXT columns, dates are
//! `YYYY-MM-DD` TEXT, salaries REAL and prices decimal TEXT. Company
//! filters live in `f_`-prefixed columns, ranges split into `_left` and
//! `_right`.

use std::path::Path;
use std::str::FromStr;
use std::sync::{Arc, LazyLock};

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use libsql::{Connection, Database as LibSqlDatabase, Value};
use rust_decimal::Decimal;
use rust_decimal::prelude::{FromPrimitive, ToPrimitive};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::channels::MessageRef;
use crate::error::DatabaseError;
use crate::form::{
    CompanyFilter, DriverProfile, FILTER_FIELDS, FieldKind, FieldName, FieldValue,
};
use crate::matching::{MatchQuery, SqlParam};
use crate::payments::model::{Payment, PaymentKind, PaymentStatus};
use crate::store::migrations;
use crate::store::traits::{
    CompanyRecord, Database, DriverRecord, DriverStatus, NewDriver, ProviderRefs,
};

const DATE_FORMAT: &str = "%Y-%m-%d";

/// libSQL database backend.
///
/// Stores a single connection that is reused for all operations.
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlBackend {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlBackend {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, DatabaseError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                DatabaseError::Pool(format!("Failed to create database directory: {e}"))
            })?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| DatabaseError::Pool(format!("Failed to open libSQL database: {e}")))?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        info!(path = %path.display(), "Database opened");
        Ok(backend)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, DatabaseError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| {
                DatabaseError::Pool(format!("Failed to create in-memory database: {e}"))
            })?;

        let backend = Self::from_database(db)?;
        backend.run_migrations().await?;
        Ok(backend)
    }

    fn from_database(db: LibSqlDatabase) -> Result<Self, DatabaseError> {
        let conn = db
            .connect()
            .map_err(|e| DatabaseError::Pool(format!("Failed to create connection: {e}")))?;
        Ok(Self {
            db: Arc::new(db),
            conn,
        })
    }

    fn conn(&self) -> &Connection {
        &self.conn
    }

    async fn execute(&self, context: &str, sql: &str, params: Vec<Value>) -> Result<u64, DatabaseError> {
        self.conn()
            .execute(sql, params)
            .await
            .map_err(|e| DatabaseError::from_libsql(context, e))
    }

    async fn query_rows<T>(
        &self,
        context: &str,
        sql: &str,
        params: Vec<Value>,
        map: fn(&libsql::Row) -> Result<T, DatabaseError>,
    ) -> Result<Vec<T>, DatabaseError> {
        let mut rows = self
            .conn()
            .query(sql, params)
            .await
            .map_err(|e| DatabaseError::from_libsql(context, e))?;

        let mut out = Vec::new();
        loop {
            match rows.next().await {
                Ok(Some(row)) => out.push(map(&row)?),
                Ok(None) => break,
                Err(e) => return Err(DatabaseError::from_libsql(context, e)),
            }
        }
        Ok(out)
    }

    async fn query_one<T>(
        &self,
        context: &str,
        sql: &str,
        params: Vec<Value>,
        map: fn(&libsql::Row) -> Result<T, DatabaseError>,
    ) -> Result<Option<T>, DatabaseError> {
        Ok(self.query_rows(context, sql, params, map).await?.into_iter().next())
    }

    async fn query_count(&self, context: &str, sql: &str, params: Vec<Value>) -> Result<i64, DatabaseError> {
        Ok(self
            .query_one(context, sql, params, |row| row.get::<i64>(0).map_err(row_err))
            .await?
            .unwrap_or(0))
    }
}

// ── Helper functions ────────────────────────────────────────────────

fn row_err(e: libsql::Error) -> DatabaseError {
    DatabaseError::Serialization(format!("row parse: {e}"))
}

/// Parse an RFC 3339 or SQLite datetime string into DateTime<Utc>.
fn parse_datetime(s: &str) -> DateTime<Utc> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.with_timezone(&Utc);
    }
    if let Ok(ndt) = chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return ndt.and_utc();
    }
    DateTime::<Utc>::MIN_UTC
}

fn opt_text(s: Option<&str>) -> Value {
    match s {
        Some(s) => Value::Text(s.to_string()),
        None => Value::Null,
    }
}

fn text(s: impl Into<String>) -> Value {
    Value::Text(s.into())
}

fn real(d: Decimal) -> Value {
    Value::Real(d.to_f64().unwrap_or_default())
}

fn json_text<T: serde::Serialize>(v: &T) -> Value {
    match serde_json::to_string(v) {
        Ok(s) => Value::Text(s),
        Err(_) => Value::Null,
    }
}

fn ids_from_json(raw: Option<String>) -> Vec<i64> {
    raw.and_then(|s| serde_json::from_str(&s).ok())
        .unwrap_or_default()
}

fn decimal_from(value: &Value) -> Option<Decimal> {
    match value {
        Value::Real(f) => Decimal::from_f64(*f).map(|d| d.normalize()),
        Value::Integer(i) => Some(Decimal::from(*i)),
        Value::Text(s) => Decimal::from_str(s).ok(),
        _ => None,
    }
}

fn date_from(value: &Value) -> Option<NaiveDate> {
    match value {
        Value::Text(s) => NaiveDate::parse_from_str(s, DATE_FORMAT).ok(),
        _ => None,
    }
}

fn int_from(value: &Value) -> Option<i64> {
    match value {
        Value::Integer(i) => Some(*i),
        _ => None,
    }
}

fn sql_value(param: SqlParam) -> Value {
    match param {
        SqlParam::Int(i) => Value::Integer(i),
        SqlParam::Real(f) => Value::Real(f),
        SqlParam::Text(s) => Value::Text(s),
    }
}

/// Storage form of a driver field value.
fn encode_driver_value(value: &FieldValue) -> Value {
    match value {
        FieldValue::Text(s) => text(s.as_str()),
        FieldValue::Int(i) => Value::Integer(i64::from(*i)),
        FieldValue::Number(d) => real(*d),
        FieldValue::Date(d) => text(d.format(DATE_FORMAT).to_string()),
        FieldValue::Codes(c) => json_text(c),
        FieldValue::YearRange(..) | FieldValue::DateRange(..) | FieldValue::NumberRange(..) => {
            Value::Null
        }
    }
}

fn decode_driver_value(field: FieldName, value: &Value) -> Option<FieldValue> {
    match field.kind() {
        FieldKind::Text | FieldKind::Single => match value {
            Value::Text(s) => Some(FieldValue::Text(s.clone())),
            _ => None,
        },
        FieldKind::Year => int_from(value).map(|y| FieldValue::Int(y as i32)),
        FieldKind::Date => date_from(value).map(FieldValue::Date),
        FieldKind::Salary => decimal_from(value).map(FieldValue::Number),
        FieldKind::Multi => match value {
            Value::Text(s) => serde_json::from_str(s).ok().map(FieldValue::Codes),
            _ => None,
        },
    }
}

// ── Column layouts ──────────────────────────────────────────────────

/// Index of the first profile column in `DRIVER_COLUMNS`.
const DRIVER_FIELDS_AT: i32 = 4;

static DRIVER_COLUMNS: LazyLock<String> = LazyLock::new(|| {
    let mut cols = vec!["id", "user_id", "lang", "status"];
    cols.extend(FieldName::ALL.iter().map(|f| f.as_str()));
    cols.extend([
        "form_price",
        "opens_count",
        "provider_product_id",
        "provider_price_id",
        "created_at",
    ]);
    cols.join(", ")
});

/// Storage columns of one filter field.
fn filter_columns(field: FieldName) -> Vec<String> {
    if field.is_range_filter() {
        vec![format!("f_{field}_left"), format!("f_{field}_right")]
    } else {
        vec![format!("f_{field}")]
    }
}

static COMPANY_COLUMNS: LazyLock<String> = LazyLock::new(|| {
    let mut cols: Vec<String> = ["id", "user_id", "lang"].map(String::from).to_vec();
    cols.extend(FILTER_FIELDS.into_iter().flat_map(filter_columns));
    cols.extend(
        [
            "viewed_drivers",
            "saved_drivers",
            "open_drivers",
            "paid_subscription",
            "provider_customer_id",
            "provider_product_id",
            "provider_price_id",
            "created_at",
        ]
        .map(String::from),
    );
    cols.join(", ")
});

const PAYMENT_COLUMNS: &str = "id, creator_id, kind, driver_id, amount, status, invoice_id, invoice_url, due_at, message_chat_id, message_id, created_at";

fn row_to_driver(row: &libsql::Row) -> Result<DriverRecord, DatabaseError> {
    let mut profile = DriverProfile::default();
    for (i, field) in FieldName::ALL.into_iter().enumerate() {
        let raw = row.get_value(DRIVER_FIELDS_AT + i as i32).map_err(row_err)?;
        if let Some(value) = decode_driver_value(field, &raw)
            && let Err(e) = profile.set(field, value)
        {
            warn!(field = %field, "Skipping stored driver value: {e}");
        }
    }

    let mut idx = DRIVER_FIELDS_AT + FieldName::ALL.len() as i32;
    let mut next = || {
        let v = row.get_value(idx);
        idx += 1;
        v.map_err(row_err)
    };
    let form_price = decimal_from(&next()?).unwrap_or_default();
    let opens_count = int_from(&next()?).unwrap_or_default();
    let provider_product_id = row_text(next()?);
    let provider_price_id = row_text(next()?);
    let created_at = row_text(next()?).map(|s| parse_datetime(&s)).unwrap_or(DateTime::<Utc>::MIN_UTC);

    Ok(DriverRecord {
        id: row.get(0).map_err(row_err)?,
        user_id: row.get(1).map_err(row_err)?,
        lang: row.get(2).map_err(row_err)?,
        status: DriverStatus::from_i64(row.get(3).map_err(row_err)?),
        profile,
        form_price,
        opens_count,
        provider_product_id,
        provider_price_id,
        created_at,
    })
}

fn row_text(value: Value) -> Option<String> {
    match value {
        Value::Text(s) => Some(s),
        _ => None,
    }
}

fn row_to_company(row: &libsql::Row) -> Result<CompanyRecord, DatabaseError> {
    let mut idx: i32 = 3;
    let mut next = || {
        let v = row.get_value(idx);
        idx += 1;
        v.map_err(row_err)
    };

    let mut filter = CompanyFilter::default();
    for field in FILTER_FIELDS {
        if field.is_range_filter() {
            let (left, right) = (next()?, next()?);
            let value = match field {
                FieldName::BirthYear => int_from(&left)
                    .zip(int_from(&right))
                    .map(|(l, r)| FieldValue::YearRange(l as i32, r as i32)),
                FieldName::DateStartWork => date_from(&left)
                    .zip(date_from(&right))
                    .map(|(l, r)| FieldValue::DateRange(l, r)),
                _ => decimal_from(&left)
                    .zip(decimal_from(&right))
                    .map(|(l, r)| FieldValue::NumberRange(l, r)),
            };
            if let Some(value) = value {
                let _ = filter.set(field, value);
            }
        } else if let Some(raw) = row_text(next()?)
            && let Ok(codes) = serde_json::from_str::<Vec<String>>(&raw)
        {
            let _ = filter.set_codes(field, codes);
        }
    }

    let viewed_drivers = ids_from_json(row_text(next()?));
    let saved_drivers = ids_from_json(row_text(next()?));
    let open_drivers = ids_from_json(row_text(next()?));
    let paid_subscription = int_from(&next()?).unwrap_or_default();
    let provider = ProviderRefs {
        customer_id: row_text(next()?),
        product_id: row_text(next()?),
        price_id: row_text(next()?),
    };
    let created_at = row_text(next()?).map(|s| parse_datetime(&s)).unwrap_or(DateTime::<Utc>::MIN_UTC);

    Ok(CompanyRecord {
        id: row.get(0).map_err(row_err)?,
        user_id: row.get(1).map_err(row_err)?,
        lang: row.get(2).map_err(row_err)?,
        filter,
        viewed_drivers,
        saved_drivers,
        open_drivers,
        paid_subscription,
        provider,
        created_at,
    })
}

fn row_to_payment(row: &libsql::Row) -> Result<Payment, DatabaseError> {
    let id: String = row.get(0).map_err(row_err)?;
    let kind: String = row.get(2).map_err(row_err)?;
    let due_at: String = row.get(8).map_err(row_err)?;
    let created_at: String = row.get(11).map_err(row_err)?;
    let chat_id = int_from(&row.get_value(9).map_err(row_err)?);
    let message_id = int_from(&row.get_value(10).map_err(row_err)?);

    Ok(Payment {
        id: Uuid::parse_str(&id)
            .map_err(|e| DatabaseError::Serialization(format!("payment id {id}: {e}")))?,
        creator_id: row.get(1).map_err(row_err)?,
        kind: PaymentKind::parse(&kind)
            .ok_or_else(|| DatabaseError::Serialization(format!("payment kind {kind}")))?,
        driver_id: int_from(&row.get_value(3).map_err(row_err)?),
        amount: row.get(4).map_err(row_err)?,
        status: PaymentStatus::from_i64(row.get(5).map_err(row_err)?),
        invoice_id: row.get(6).map_err(row_err)?,
        invoice_url: row.get(7).map_err(row_err)?,
        due_at: parse_datetime(&due_at),
        message: chat_id.zip(message_id).map(|(chat_id, message_id)| MessageRef {
            chat_id,
            message_id,
        }),
        created_at: parse_datetime(&created_at),
    })
}

// ── Trait implementation ────────────────────────────────────────────

#[async_trait]
impl Database for LibSqlBackend {
    async fn run_migrations(&self) -> Result<(), DatabaseError> {
        migrations::run_migrations(self.conn()).await
    }

    async fn cleanup(&self) -> Result<(), DatabaseError> {
        self.conn()
            .execute_batch("DELETE FROM payments; DELETE FROM companies; DELETE FROM drivers;")
            .await
            .map_err(|e| DatabaseError::Query(format!("cleanup: {e}")))?;
        info!("Domain tables wiped");
        Ok(())
    }

    // ── Drivers ─────────────────────────────────────────────────────

    async fn create_driver(&self, driver: &NewDriver) -> Result<i64, DatabaseError> {
        let patch = driver.profile.to_patch();
        let mut cols = vec!["user_id", "lang", "status", "form_price", "opens_count", "created_at"];
        let mut params = vec![
            Value::Integer(driver.user_id),
            text(driver.lang.as_str()),
            Value::Integer(DriverStatus::ActivelySeeking.as_i64()),
            text(driver.price.normalize().to_string()),
            Value::Integer(0),
            text(Utc::now().to_rfc3339()),
        ];
        for (field, value) in &patch {
            cols.push(field.as_str());
            params.push(encode_driver_value(value));
        }
        let marks: Vec<String> = (1..=cols.len()).map(|i| format!("?{i}")).collect();
        let sql = format!(
            "INSERT INTO drivers ({}) VALUES ({}) RETURNING id",
            cols.join(", "),
            marks.join(", ")
        );

        let id = self
            .query_one("create_driver", &sql, params, |row| row.get::<i64>(0).map_err(row_err))
            .await?
            .ok_or_else(|| DatabaseError::Query("create_driver: no id returned".into()))?;
        debug!(driver_id = id, user_id = driver.user_id, "Driver inserted into DB");
        Ok(id)
    }

    async fn get_driver(&self, id: i64) -> Result<Option<DriverRecord>, DatabaseError> {
        self.query_one(
            "get_driver",
            &format!("SELECT {} FROM drivers WHERE id = ?1", *DRIVER_COLUMNS),
            vec![Value::Integer(id)],
            row_to_driver,
        )
        .await
    }

    async fn get_driver_by_user(&self, user_id: i64) -> Result<Option<DriverRecord>, DatabaseError> {
        self.query_one(
            "get_driver_by_user",
            &format!("SELECT {} FROM drivers WHERE user_id = ?1", *DRIVER_COLUMNS),
            vec![Value::Integer(user_id)],
            row_to_driver,
        )
        .await
    }

    async fn get_drivers(&self, ids: &[i64]) -> Result<Vec<DriverRecord>, DatabaseError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let marks = vec!["?"; ids.len()].join(", ");
        let found = self
            .query_rows(
                "get_drivers",
                &format!("SELECT {} FROM drivers WHERE id IN ({marks})", *DRIVER_COLUMNS),
                ids.iter().map(|id| Value::Integer(*id)).collect(),
                row_to_driver,
            )
            .await?;
        Ok(ids
            .iter()
            .filter_map(|id| found.iter().find(|d| d.id == *id).cloned())
            .collect())
    }

    async fn update_driver_field(
        &self,
        user_id: i64,
        field: FieldName,
        value: &FieldValue,
        price: Decimal,
    ) -> Result<(), DatabaseError> {
        let sql = format!(
            "UPDATE drivers SET {} = ?1, form_price = ?2, opens_count = 0 WHERE user_id = ?3",
            field.as_str()
        );
        let changed = self
            .execute(
                "update_driver_field",
                &sql,
                vec![
                    encode_driver_value(value),
                    text(price.normalize().to_string()),
                    Value::Integer(user_id),
                ],
            )
            .await?;
        if changed == 0 {
            return Err(DatabaseError::NotFound {
                entity: "driver".into(),
                id: user_id.to_string(),
            });
        }
        debug!(user_id, field = %field, "Driver field updated in DB");
        Ok(())
    }

    async fn set_driver_status(&self, user_id: i64, status: DriverStatus) -> Result<(), DatabaseError> {
        self.execute(
            "set_driver_status",
            "UPDATE drivers SET status = ?1 WHERE user_id = ?2",
            vec![Value::Integer(status.as_i64()), Value::Integer(user_id)],
        )
        .await?;
        Ok(())
    }

    async fn set_driver_lang(&self, user_id: i64, lang: &str) -> Result<(), DatabaseError> {
        self.execute(
            "set_driver_lang",
            "UPDATE drivers SET lang = ?1 WHERE user_id = ?2",
            vec![text(lang), Value::Integer(user_id)],
        )
        .await?;
        Ok(())
    }

    async fn set_driver_provider_refs(
        &self,
        driver_id: i64,
        product_id: Option<&str>,
        price_id: Option<&str>,
    ) -> Result<(), DatabaseError> {
        self.execute(
            "set_driver_provider_refs",
            "UPDATE drivers SET provider_product_id = ?1, provider_price_id = ?2 WHERE id = ?3",
            vec![opt_text(product_id), opt_text(price_id), Value::Integer(driver_id)],
        )
        .await?;
        Ok(())
    }

    async fn increment_driver_opens(&self, driver_id: i64) -> Result<(), DatabaseError> {
        self.execute(
            "increment_driver_opens",
            "UPDATE drivers SET opens_count = opens_count + 1 WHERE id = ?1",
            vec![Value::Integer(driver_id)],
        )
        .await?;
        Ok(())
    }

    async fn delete_driver(&self, user_id: i64) -> Result<bool, DatabaseError> {
        let n = self
            .execute(
                "delete_driver",
                "DELETE FROM drivers WHERE user_id = ?1",
                vec![Value::Integer(user_id)],
            )
            .await?;
        Ok(n > 0)
    }

    async fn count_active_drivers(&self) -> Result<i64, DatabaseError> {
        self.query_count(
            "count_active_drivers",
            "SELECT COUNT(*) FROM drivers WHERE status = ?1",
            vec![Value::Integer(DriverStatus::ActivelySeeking.as_i64())],
        )
        .await
    }

    // ── Companies ───────────────────────────────────────────────────

    async fn create_company(&self, user_id: i64, lang: &str) -> Result<i64, DatabaseError> {
        let id = self
            .query_one(
                "create_company",
                "INSERT INTO companies (user_id, lang, created_at) VALUES (?1, ?2, ?3) RETURNING id",
                vec![Value::Integer(user_id), text(lang), text(Utc::now().to_rfc3339())],
                |row| row.get::<i64>(0).map_err(row_err),
            )
            .await?
            .ok_or_else(|| DatabaseError::Query("create_company: no id returned".into()))?;
        debug!(company_id = id, user_id, "Company inserted into DB");
        Ok(id)
    }

    async fn get_company(&self, id: i64) -> Result<Option<CompanyRecord>, DatabaseError> {
        self.query_one(
            "get_company",
            &format!("SELECT {} FROM companies WHERE id = ?1", *COMPANY_COLUMNS),
            vec![Value::Integer(id)],
            row_to_company,
        )
        .await
    }

    async fn get_company_by_user(&self, user_id: i64) -> Result<Option<CompanyRecord>, DatabaseError> {
        self.query_one(
            "get_company_by_user",
            &format!("SELECT {} FROM companies WHERE user_id = ?1", *COMPANY_COLUMNS),
            vec![Value::Integer(user_id)],
            row_to_company,
        )
        .await
    }

    async fn update_company_filter(
        &self,
        user_id: i64,
        field: FieldName,
        value: Option<&FieldValue>,
    ) -> Result<(), DatabaseError> {
        if !field.is_filterable() {
            return Err(DatabaseError::Query(format!("{field} is not a company filter")));
        }
        let values: Vec<Value> = match value {
            None => vec![Value::Null; filter_columns(field).len()],
            Some(FieldValue::YearRange(l, r)) => {
                vec![Value::Integer(i64::from(*l)), Value::Integer(i64::from(*r))]
            }
            Some(FieldValue::DateRange(l, r)) => vec![
                text(l.format(DATE_FORMAT).to_string()),
                text(r.format(DATE_FORMAT).to_string()),
            ],
            Some(FieldValue::NumberRange(l, r)) => vec![real(*l), real(*r)],
            Some(FieldValue::Codes(c)) if c.is_empty() => vec![Value::Null],
            Some(FieldValue::Codes(c)) => vec![json_text(c)],
            Some(other) => {
                return Err(DatabaseError::Serialization(format!(
                    "{field} filter cannot store {other:?}"
                )));
            }
        };
        let cols = filter_columns(field);
        if cols.len() != values.len() {
            return Err(DatabaseError::Serialization(format!(
                "{field} filter expects {} values",
                cols.len()
            )));
        }

        let sets: Vec<String> = cols
            .iter()
            .enumerate()
            .map(|(i, c)| format!("{c} = ?{}", i + 1))
            .collect();
        let sql = format!(
            "UPDATE companies SET {} WHERE user_id = ?{}",
            sets.join(", "),
            cols.len() + 1
        );
        let mut params = values;
        params.push(Value::Integer(user_id));
        self.execute("update_company_filter", &sql, params).await?;
        debug!(user_id, field = %field, "Company filter updated in DB");
        Ok(())
    }

    async fn reset_company_filters(&self, user_id: i64) -> Result<(), DatabaseError> {
        let sets: Vec<String> = FILTER_FIELDS
            .into_iter()
            .flat_map(filter_columns)
            .map(|c| format!("{c} = NULL"))
            .collect();
        self.execute(
            "reset_company_filters",
            &format!("UPDATE companies SET {} WHERE user_id = ?1", sets.join(", ")),
            vec![Value::Integer(user_id)],
        )
        .await?;
        Ok(())
    }

    async fn set_company_lang(&self, user_id: i64, lang: &str) -> Result<(), DatabaseError> {
        self.execute(
            "set_company_lang",
            "UPDATE companies SET lang = ?1 WHERE user_id = ?2",
            vec![text(lang), Value::Integer(user_id)],
        )
        .await?;
        Ok(())
    }

    async fn set_viewed_drivers(&self, company_id: i64, ids: &[i64]) -> Result<(), DatabaseError> {
        self.execute(
            "set_viewed_drivers",
            "UPDATE companies SET viewed_drivers = ?1 WHERE id = ?2",
            vec![json_text(&ids), Value::Integer(company_id)],
        )
        .await?;
        Ok(())
    }

    async fn set_saved_drivers(&self, company_id: i64, ids: &[i64]) -> Result<(), DatabaseError> {
        self.execute(
            "set_saved_drivers",
            "UPDATE companies SET saved_drivers = ?1 WHERE id = ?2",
            vec![json_text(&ids), Value::Integer(company_id)],
        )
        .await?;
        Ok(())
    }

    async fn open_driver(
        &self,
        company_id: i64,
        driver_id: i64,
        use_credit: bool,
    ) -> Result<bool, DatabaseError> {
        let cost = i64::from(use_credit);
        let changed = self
            .execute(
                "open_driver",
                "UPDATE companies SET
                    open_drivers = CASE
                        WHEN EXISTS (SELECT 1 FROM json_each(open_drivers) WHERE value = ?2)
                        THEN open_drivers
                        ELSE json_insert(open_drivers, '$[#]', ?2)
                    END,
                    saved_drivers = (
                        SELECT json_group_array(value) FROM json_each(saved_drivers) WHERE value != ?2
                    ),
                    paid_subscription = paid_subscription - ?3
                 WHERE id = ?1 AND paid_subscription >= ?3",
                vec![
                    Value::Integer(company_id),
                    Value::Integer(driver_id),
                    Value::Integer(cost),
                ],
            )
            .await?;
        debug!(company_id, driver_id, use_credit, opened = changed > 0, "Driver open recorded");
        Ok(changed > 0)
    }

    async fn add_company_credit(&self, company_id: i64, credit: i64) -> Result<(), DatabaseError> {
        self.execute(
            "add_company_credit",
            "UPDATE companies SET paid_subscription = paid_subscription + ?1 WHERE id = ?2",
            vec![Value::Integer(credit), Value::Integer(company_id)],
        )
        .await?;
        Ok(())
    }

    async fn set_company_provider_refs(
        &self,
        company_id: i64,
        refs: &ProviderRefs,
    ) -> Result<(), DatabaseError> {
        self.execute(
            "set_company_provider_refs",
            "UPDATE companies SET provider_customer_id = ?1, provider_product_id = ?2, provider_price_id = ?3 WHERE id = ?4",
            vec![
                opt_text(refs.customer_id.as_deref()),
                opt_text(refs.product_id.as_deref()),
                opt_text(refs.price_id.as_deref()),
                Value::Integer(company_id),
            ],
        )
        .await?;
        Ok(())
    }

    async fn delete_company(&self, user_id: i64) -> Result<bool, DatabaseError> {
        let n = self
            .execute(
                "delete_company",
                "DELETE FROM companies WHERE user_id = ?1",
                vec![Value::Integer(user_id)],
            )
            .await?;
        Ok(n > 0)
    }

    // ── Matching ────────────────────────────────────────────────────

    async fn find_next_match(
        &self,
        filter: &CompanyFilter,
        excluded: &[i64],
    ) -> Result<Option<DriverRecord>, DatabaseError> {
        let q = MatchQuery::build(filter, excluded);
        self.query_one(
            "find_next_match",
            &format!(
                "SELECT {} FROM drivers WHERE {} ORDER BY id LIMIT 1",
                *DRIVER_COLUMNS,
                q.where_clause()
            ),
            q.params.into_iter().map(sql_value).collect(),
            row_to_driver,
        )
        .await
    }

    async fn count_matches(
        &self,
        filter: &CompanyFilter,
        excluded: &[i64],
    ) -> Result<i64, DatabaseError> {
        let q = MatchQuery::build(filter, excluded);
        self.query_count(
            "count_matches",
            &format!("SELECT COUNT(*) FROM drivers WHERE {}", q.where_clause()),
            q.params.into_iter().map(sql_value).collect(),
        )
        .await
    }

    // ── Payments ────────────────────────────────────────────────────

    async fn insert_payment(&self, payment: &Payment) -> Result<(), DatabaseError> {
        self.execute(
            "insert_payment",
            &format!(
                "INSERT INTO payments ({PAYMENT_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
            ),
            vec![
                text(payment.id.to_string()),
                Value::Integer(payment.creator_id),
                text(payment.kind.as_str()),
                payment.driver_id.map_or(Value::Null, Value::Integer),
                Value::Integer(payment.amount),
                Value::Integer(payment.status.as_i64()),
                text(payment.invoice_id.as_str()),
                text(payment.invoice_url.as_str()),
                text(payment.due_at.to_rfc3339()),
                payment.message.map_or(Value::Null, |m| Value::Integer(m.chat_id)),
                payment.message.map_or(Value::Null, |m| Value::Integer(m.message_id)),
                text(payment.created_at.to_rfc3339()),
            ],
        )
        .await?;
        debug!(payment_id = %payment.id, "Payment inserted into DB");
        Ok(())
    }

    async fn get_payment(&self, id: Uuid) -> Result<Option<Payment>, DatabaseError> {
        self.query_one(
            "get_payment",
            &format!("SELECT {PAYMENT_COLUMNS} FROM payments WHERE id = ?1"),
            vec![text(id.to_string())],
            row_to_payment,
        )
        .await
    }

    async fn get_pending_payments(&self) -> Result<Vec<Payment>, DatabaseError> {
        self.query_rows(
            "get_pending_payments",
            &format!(
                "SELECT {PAYMENT_COLUMNS} FROM payments WHERE status = ?1 ORDER BY created_at ASC"
            ),
            vec![Value::Integer(PaymentStatus::Pending.as_i64())],
            row_to_payment,
        )
        .await
    }

    async fn get_pending_payment_for(&self, creator_id: i64) -> Result<Option<Payment>, DatabaseError> {
        self.query_one(
            "get_pending_payment_for",
            &format!(
                "SELECT {PAYMENT_COLUMNS} FROM payments WHERE creator_id = ?1 AND status = ?2 ORDER BY created_at DESC LIMIT 1"
            ),
            vec![
                Value::Integer(creator_id),
                Value::Integer(PaymentStatus::Pending.as_i64()),
            ],
            row_to_payment,
        )
        .await
    }

    async fn settle_payment(&self, id: Uuid, status: PaymentStatus) -> Result<bool, DatabaseError> {
        if !PaymentStatus::Pending.can_transition_to(status) {
            return Ok(false);
        }
        let changed = self
            .execute(
                "settle_payment",
                "UPDATE payments SET status = ?1 WHERE id = ?2 AND status = ?3",
                vec![
                    Value::Integer(status.as_i64()),
                    text(id.to_string()),
                    Value::Integer(PaymentStatus::Pending.as_i64()),
                ],
            )
            .await?;
        debug!(payment_id = %id, status = ?status, won = changed > 0, "Payment settle attempted");
        Ok(changed > 0)
    }

    async fn set_payment_message(
        &self,
        id: Uuid,
        message: Option<MessageRef>,
    ) -> Result<(), DatabaseError> {
        self.execute(
            "set_payment_message",
            "UPDATE payments SET message_chat_id = ?1, message_id = ?2 WHERE id = ?3",
            vec![
                message.map_or(Value::Null, |m| Value::Integer(m.chat_id)),
                message.map_or(Value::Null, |m| Value::Integer(m.message_id)),
                text(id.to_string()),
            ],
        )
        .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use chrono::Duration;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::form::Edges;

    async fn backend() -> LibSqlBackend {
        LibSqlBackend::new_memory().await.unwrap()
    }

    fn profile() -> DriverProfile {
        DriverProfile {
            name: Some("Jan Kowalski".into()),
            birth_year: Some(1985),
            car_types: Some(vec!["B".into(), "C".into()]),
            date_start_work: NaiveDate::from_ymd_opt(2026, 11, 2),
            expected_salary: Some(dec!(2500.5)),
            crew: Some("single".into()),
            ..Default::default()
        }
    }

    async fn new_driver(db: &LibSqlBackend, user_id: i64) -> i64 {
        db.create_driver(&NewDriver {
            user_id,
            lang: "en".into(),
            profile: profile(),
            price: dec!(183),
        })
        .await
        .unwrap()
    }

    #[tokio::test]
    async fn driver_roundtrip() {
        let db = backend().await;
        let id = new_driver(&db, 42).await;

        let d = db.get_driver_by_user(42).await.unwrap().unwrap();
        assert_eq!(d.id, id);
        assert_eq!(d.profile, profile());
        assert_eq!(d.form_price, dec!(183));
        assert_eq!(d.status, DriverStatus::ActivelySeeking);
        assert_eq!(d.opens_count, 0);
        assert_eq!(db.count_active_drivers().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_driver_is_a_constraint_error() {
        let db = backend().await;
        new_driver(&db, 42).await;
        let err = db
            .create_driver(&NewDriver {
                user_id: 42,
                lang: "en".into(),
                profile: DriverProfile::default(),
                price: dec!(1),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, DatabaseError::Constraint(_)));
    }

    #[tokio::test]
    async fn field_update_resets_opens_and_price() {
        let db = backend().await;
        let id = new_driver(&db, 42).await;
        db.increment_driver_opens(id).await.unwrap();

        db.update_driver_field(42, FieldName::CarTypes, &FieldValue::Codes(vec!["CE".into()]), dec!(150))
            .await
            .unwrap();
        let d = db.get_driver(id).await.unwrap().unwrap();
        assert_eq!(d.profile.car_types, Some(vec!["CE".to_string()]));
        assert_eq!(d.form_price, dec!(150));
        assert_eq!(d.opens_count, 0);

        let missing = db
            .update_driver_field(7, FieldName::Name, &FieldValue::Text("X".into()), dec!(1))
            .await;
        assert!(matches!(missing, Err(DatabaseError::NotFound { .. })));
    }

    #[tokio::test]
    async fn company_filters_roundtrip_and_reset() {
        let db = backend().await;
        db.create_company(9, "pl").await.unwrap();
        db.update_company_filter(9, FieldName::BirthYear, Some(&FieldValue::YearRange(1970, 1990)))
            .await
            .unwrap();
        db.update_company_filter(
            9,
            FieldName::ExpectedSalary,
            Some(&FieldValue::NumberRange(dec!(1000), dec!(3000))),
        )
        .await
        .unwrap();
        db.update_company_filter(9, FieldName::Crew, Some(&FieldValue::Codes(vec!["single".into()])))
            .await
            .unwrap();

        let c = db.get_company_by_user(9).await.unwrap().unwrap();
        assert_eq!(c.lang, "pl");
        assert_eq!(c.filter.birth_year, Some(Edges::ordered(1970, 1990)));
        assert_eq!(c.filter.expected_salary, Some(Edges::ordered(dec!(1000), dec!(3000))));
        assert_eq!(c.filter.crew, Some(vec!["single".to_string()]));

        db.update_company_filter(9, FieldName::Crew, None).await.unwrap();
        assert!(db.get_company_by_user(9).await.unwrap().unwrap().filter.crew.is_none());

        db.reset_company_filters(9).await.unwrap();
        assert!(db.get_company_by_user(9).await.unwrap().unwrap().filter.is_empty());

        assert!(matches!(
            db.create_company(9, "en").await,
            Err(DatabaseError::Constraint(_))
        ));
    }

    #[tokio::test]
    async fn open_driver_moves_saved_and_spends_credit() {
        let db = backend().await;
        let company = db.create_company(9, "en").await.unwrap();
        db.set_saved_drivers(company, &[3, 4]).await.unwrap();

        assert!(!db.open_driver(company, 3, true).await.unwrap());

        db.add_company_credit(company, 2).await.unwrap();
        assert!(db.open_driver(company, 3, true).await.unwrap());
        assert!(db.open_driver(company, 3, false).await.unwrap());

        let c = db.get_company(company).await.unwrap().unwrap();
        assert_eq!(c.open_drivers, vec![3]);
        assert_eq!(c.saved_drivers, vec![4]);
        assert_eq!(c.paid_subscription, 1);
    }

    #[tokio::test]
    async fn matching_honours_ranges_and_exclusions() {
        let db = backend().await;
        let a = new_driver(&db, 1).await;
        let b = new_driver(&db, 2).await;
        db.set_driver_status(2, DriverStatus::Hidden).await.unwrap();

        let filter = CompanyFilter {
            birth_year: Some(Edges::ordered(1980, 1990)),
            date_start_work: Some(Edges::ordered(
                NaiveDate::from_ymd_opt(2026, 11, 1).unwrap(),
                NaiveDate::from_ymd_opt(2026, 11, 30).unwrap(),
            )),
            expected_salary: Some(Edges::ordered(dec!(2000), dec!(3000))),
            crew: Some(vec!["single".into(), "double".into()]),
            ..Default::default()
        };
        let found = db.find_next_match(&filter, &[]).await.unwrap().unwrap();
        assert_eq!(found.id, a);
        assert_eq!(db.count_matches(&filter, &[]).await.unwrap(), 1);
        assert!(db.find_next_match(&filter, &[a]).await.unwrap().is_none());

        db.set_driver_status(2, DriverStatus::ActivelySeeking).await.unwrap();
        assert_eq!(db.find_next_match(&filter, &[a]).await.unwrap().unwrap().id, b);

        let too_old = CompanyFilter {
            birth_year: Some(Edges::ordered(1990, 2000)),
            ..Default::default()
        };
        assert_eq!(db.count_matches(&too_old, &[]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn payments_settle_once() {
        let db = backend().await;
        let payment = Payment {
            id: Uuid::new_v4(),
            creator_id: 9,
            kind: PaymentKind::PayForDriver,
            driver_id: Some(1),
            amount: 18300,
            status: PaymentStatus::Pending,
            invoice_id: "in_1".into(),
            invoice_url: "https://pay".into(),
            due_at: Utc::now() + Duration::days(1),
            message: None,
            created_at: Utc::now(),
        };
        db.insert_payment(&payment).await.unwrap();
        db.set_payment_message(payment.id, Some(MessageRef { chat_id: 9, message_id: 77 }))
            .await
            .unwrap();

        let stored = db.get_pending_payment_for(9).await.unwrap().unwrap();
        assert_eq!(stored.message, Some(MessageRef { chat_id: 9, message_id: 77 }));
        assert_eq!(stored.driver_id, Some(1));

        assert!(db.settle_payment(payment.id, PaymentStatus::Paid).await.unwrap());
        assert!(!db.settle_payment(payment.id, PaymentStatus::Closed).await.unwrap());
        assert_eq!(
            db.get_payment(payment.id).await.unwrap().unwrap().status,
            PaymentStatus::Paid
        );
        assert!(db.get_pending_payments().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn cleanup_wipes_domain_rows() {
        let db = backend().await;
        new_driver(&db, 1).await;
        db.create_company(2, "en").await.unwrap();
        db.cleanup().await.unwrap();
        assert!(db.get_driver_by_user(1).await.unwrap().is_none());
        assert!(db.get_company_by_user(2).await.unwrap().is_none());
    }
}
