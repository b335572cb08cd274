//! Payment provider contract.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::ProviderError;

/// Provider-side invoice state as far as the poller cares.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvoiceStatus {
    Paid,
    Open,
    /// Voided, uncollectible or otherwise no longer payable.
    Closed,
}

/// A finalized invoice ready to be paid.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Invoice {
    pub id: String,
    /// Hosted payment page.
    pub url: String,
    pub due_at: DateTime<Utc>,
}

/// What an invoice is for.
#[derive(Debug, Clone)]
pub struct InvoiceRequest<'a> {
    pub customer_id: &'a str,
    pub price_id: &'a str,
    pub description: &'a str,
    pub days_until_due: i64,
}

/// Hosted-invoice payment provider.
///
/// Calls referring to a customer, product or price that no longer exists
/// (or is inactive) fail with [`ProviderError::StaleReference`] naming
/// the resource, so callers can recreate it.
#[async_trait]
pub trait PaymentProvider: Send + Sync {
    fn name(&self) -> &str;

    async fn create_customer(&self, description: &str) -> Result<String, ProviderError>;

    async fn create_product(&self, name: &str) -> Result<String, ProviderError>;

    /// Create a price of `amount` minor units on `product_id`.
    async fn create_price(&self, product_id: &str, amount: i64) -> Result<String, ProviderError>;

    async fn deactivate_price(&self, price_id: &str) -> Result<(), ProviderError>;

    /// Create, itemize and finalize an invoice.
    async fn create_invoice(&self, request: &InvoiceRequest<'_>) -> Result<Invoice, ProviderError>;

    async fn invoice_status(&self, invoice_id: &str) -> Result<InvoiceStatus, ProviderError>;

    async fn void_invoice(&self, invoice_id: &str) -> Result<(), ProviderError>;
}
