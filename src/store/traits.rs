//! Unified `Database` trait: one async interface for drivers, companies,
//! matching and payments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use uuid::Uuid;

use crate::channels::MessageRef;
use crate::error::DatabaseError;
use crate::form::{CompanyFilter, DriverProfile, FieldName, FieldValue};
use crate::payments::model::{Payment, PaymentStatus};

/// Whether a driver's form is offered to companies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DriverStatus {
    Hidden,
    ActivelySeeking,
}

impl DriverStatus {
    pub fn as_i64(self) -> i64 {
        match self {
            DriverStatus::Hidden => 0,
            DriverStatus::ActivelySeeking => 1,
        }
    }

    pub fn from_i64(v: i64) -> Self {
        if v == 1 {
            DriverStatus::ActivelySeeking
        } else {
            DriverStatus::Hidden
        }
    }

    pub fn toggled(self) -> Self {
        match self {
            DriverStatus::Hidden => DriverStatus::ActivelySeeking,
            DriverStatus::ActivelySeeking => DriverStatus::Hidden,
        }
    }
}

/// A driver about to be persisted.
#[derive(Debug, Clone)]
pub struct NewDriver {
    pub user_id: i64,
    pub lang: String,
    pub profile: DriverProfile,
    pub price: Decimal,
}

/// A persisted driver.
#[derive(Debug, Clone, PartialEq)]
pub struct DriverRecord {
    pub id: i64,
    pub user_id: i64,
    pub lang: String,
    pub status: DriverStatus,
    pub profile: DriverProfile,
    pub form_price: Decimal,
    pub opens_count: i64,
    pub provider_product_id: Option<String>,
    pub provider_price_id: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Provider-side references a company's subscription fee relies on.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProviderRefs {
    pub customer_id: Option<String>,
    pub product_id: Option<String>,
    pub price_id: Option<String>,
}

/// A persisted company with its filters and browsing state.
#[derive(Debug, Clone, PartialEq)]
pub struct CompanyRecord {
    pub id: i64,
    pub user_id: i64,
    pub lang: String,
    pub filter: CompanyFilter,
    pub viewed_drivers: Vec<i64>,
    pub saved_drivers: Vec<i64>,
    pub open_drivers: Vec<i64>,
    /// Remaining subscription opens.
    pub paid_subscription: i64,
    pub provider: ProviderRefs,
    pub created_at: DateTime<Utc>,
}

impl CompanyRecord {
    /// Drivers never offered again while browsing.
    pub fn excluded_drivers(&self) -> Vec<i64> {
        let mut ids = self.viewed_drivers.clone();
        ids.extend(self.open_drivers.iter().filter(|id| !self.viewed_drivers.contains(*id)));
        ids
    }
}

/// Backend-agnostic database trait.
#[async_trait]
pub trait Database: Send + Sync {
    /// Run all pending schema migrations.
    async fn run_migrations(&self) -> Result<(), DatabaseError>;

    /// Delete every driver, company and payment row.
    async fn cleanup(&self) -> Result<(), DatabaseError>;

    // ── Drivers ─────────────────────────────────────────────────────

    /// Insert a driver with status "actively seeking" and no opens.
    /// Returns the new id.
    async fn create_driver(&self, driver: &NewDriver) -> Result<i64, DatabaseError>;

    async fn get_driver(&self, id: i64) -> Result<Option<DriverRecord>, DatabaseError>;

    async fn get_driver_by_user(&self, user_id: i64) -> Result<Option<DriverRecord>, DatabaseError>;

    /// Drivers by id, in the order given. Unknown ids are skipped.
    async fn get_drivers(&self, ids: &[i64]) -> Result<Vec<DriverRecord>, DatabaseError>;

    /// Patch one field, store the new price and reset the open counter.
    async fn update_driver_field(
        &self,
        user_id: i64,
        field: FieldName,
        value: &FieldValue,
        price: Decimal,
    ) -> Result<(), DatabaseError>;

    async fn set_driver_status(&self, user_id: i64, status: DriverStatus) -> Result<(), DatabaseError>;

    async fn set_driver_lang(&self, user_id: i64, lang: &str) -> Result<(), DatabaseError>;

    async fn set_driver_provider_refs(
        &self,
        driver_id: i64,
        product_id: Option<&str>,
        price_id: Option<&str>,
    ) -> Result<(), DatabaseError>;

    async fn increment_driver_opens(&self, driver_id: i64) -> Result<(), DatabaseError>;

    /// Returns whether a row was deleted.
    async fn delete_driver(&self, user_id: i64) -> Result<bool, DatabaseError>;

    async fn count_active_drivers(&self) -> Result<i64, DatabaseError>;

    // ── Companies ───────────────────────────────────────────────────

    /// Insert a company. A second company for the same user is a
    /// `DatabaseError::Constraint`.
    async fn create_company(&self, user_id: i64, lang: &str) -> Result<i64, DatabaseError>;

    async fn get_company(&self, id: i64) -> Result<Option<CompanyRecord>, DatabaseError>;

    async fn get_company_by_user(&self, user_id: i64) -> Result<Option<CompanyRecord>, DatabaseError>;

    /// Set (or with `None`, clear) one filter.
    async fn update_company_filter(
        &self,
        user_id: i64,
        field: FieldName,
        value: Option<&FieldValue>,
    ) -> Result<(), DatabaseError>;

    /// Clear every filter.
    async fn reset_company_filters(&self, user_id: i64) -> Result<(), DatabaseError>;

    async fn set_company_lang(&self, user_id: i64, lang: &str) -> Result<(), DatabaseError>;

    async fn set_viewed_drivers(&self, company_id: i64, ids: &[i64]) -> Result<(), DatabaseError>;

    async fn set_saved_drivers(&self, company_id: i64, ids: &[i64]) -> Result<(), DatabaseError>;

    /// Add `driver_id` to the opened list and drop it from the saved
    /// list in one statement. With `use_credit`, one subscription credit
    /// is spent as part of the same statement; returns `false` when no
    /// credit was left.
    async fn open_driver(
        &self,
        company_id: i64,
        driver_id: i64,
        use_credit: bool,
    ) -> Result<bool, DatabaseError>;

    async fn add_company_credit(&self, company_id: i64, credit: i64) -> Result<(), DatabaseError>;

    async fn set_company_provider_refs(
        &self,
        company_id: i64,
        refs: &ProviderRefs,
    ) -> Result<(), DatabaseError>;

    async fn delete_company(&self, user_id: i64) -> Result<bool, DatabaseError>;

    // ── Matching ────────────────────────────────────────────────────

    /// First actively seeking driver, by id, that satisfies `filter` and
    /// is not in `excluded`.
    async fn find_next_match(
        &self,
        filter: &CompanyFilter,
        excluded: &[i64],
    ) -> Result<Option<DriverRecord>, DatabaseError>;

    async fn count_matches(
        &self,
        filter: &CompanyFilter,
        excluded: &[i64],
    ) -> Result<i64, DatabaseError>;

    // ── Payments ────────────────────────────────────────────────────

    async fn insert_payment(&self, payment: &Payment) -> Result<(), DatabaseError>;

    async fn get_payment(&self, id: Uuid) -> Result<Option<Payment>, DatabaseError>;

    async fn get_pending_payments(&self) -> Result<Vec<Payment>, DatabaseError>;

    async fn get_pending_payment_for(&self, creator_id: i64) -> Result<Option<Payment>, DatabaseError>;

    /// Move a pending payment to `status`. Returns `false` when the row
    /// was no longer pending, i.e. another actor already settled it.
    async fn settle_payment(&self, id: Uuid, status: PaymentStatus) -> Result<bool, DatabaseError>;

    async fn set_payment_message(
        &self,
        id: Uuid,
        message: Option<MessageRef>,
    ) -> Result<(), DatabaseError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exclusion_is_viewed_union_opened() {
        let company = CompanyRecord {
            id: 1,
            user_id: 10,
            lang: "en".into(),
            filter: CompanyFilter::default(),
            viewed_drivers: vec![1, 2],
            saved_drivers: vec![9],
            open_drivers: vec![2, 3],
            paid_subscription: 0,
            provider: ProviderRefs::default(),
            created_at: Utc::now(),
        };
        assert_eq!(company.excluded_drivers(), vec![1, 2, 3]);
    }

    #[test]
    fn driver_status_codes() {
        assert_eq!(DriverStatus::from_i64(1), DriverStatus::ActivelySeeking);
        assert_eq!(DriverStatus::from_i64(0), DriverStatus::Hidden);
        assert_eq!(DriverStatus::Hidden.toggled().as_i64(), 1);
    }
}
