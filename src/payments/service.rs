//! Payment creation, cancellation and settlement.
//!
//! Every status change goes through `Database::settle_payment`, which only
//! moves rows that are still pending. Whoever loses that race (the poller
//! or a cancelling company) does nothing further.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::channels::MessageRef;
use crate::error::{DatabaseError, PaymentError, ProviderError};
use crate::payments::model::{
    INVOICE_DAYS_UNTIL_DUE, Payment, PaymentKind, PaymentStatus, SUBSCRIPTION_AMOUNT,
    SUBSCRIPTION_CREDIT, to_minor_units,
};
use crate::payments::provider::{Invoice, InvoiceRequest, InvoiceStatus, PaymentProvider};
use crate::store::{CompanyRecord, Database, DriverRecord, ProviderRefs};

/// Result of checking one pending payment.
#[derive(Debug, Clone, PartialEq)]
pub enum Settlement {
    /// Still waiting for the company.
    Pending,
    /// Marked paid and granted.
    Paid(Payment),
    /// Marked closed after its due time (or closed provider-side).
    Expired(Payment),
    /// Someone else settled the row first.
    Lost,
}

#[derive(Debug, Clone, PartialEq)]
pub enum CancelOutcome {
    Cancelled(Payment),
    /// The poller settled the payment first.
    AlreadySettled,
}

/// Provider references used to build one invoice.
#[derive(Debug, Clone, Default)]
struct InvoiceRefs {
    customer: Option<String>,
    product: Option<String>,
    price: Option<String>,
}

impl InvoiceRefs {
    fn forget(&mut self, resource: &str) {
        match resource {
            "customer" => self.customer = None,
            "product" => {
                self.product = None;
                self.price = None;
            }
            _ => self.price = None,
        }
    }
}

/// Open `driver_id` for a company and count the open on the driver.
///
/// With `use_credit` one subscription credit is spent; returns `false`
/// when none was left.
pub async fn grant_open(
    db: &dyn Database,
    company_id: i64,
    driver_id: i64,
    use_credit: bool,
) -> Result<bool, DatabaseError> {
    if !db.open_driver(company_id, driver_id, use_credit).await? {
        return Ok(false);
    }
    db.increment_driver_opens(driver_id).await?;
    Ok(true)
}

pub struct PaymentService {
    db: Arc<dyn Database>,
    provider: Arc<dyn PaymentProvider>,
}

impl PaymentService {
    pub fn new(db: Arc<dyn Database>, provider: Arc<dyn PaymentProvider>) -> Self {
        Self { db, provider }
    }

    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Invoice a company for opening one driver's form.
    pub async fn create_driver_payment(
        &self,
        company: &CompanyRecord,
        driver: &DriverRecord,
    ) -> Result<Payment, PaymentError> {
        let amount = to_minor_units(driver.form_price);
        let mut refs = InvoiceRefs {
            customer: company.provider.customer_id.clone(),
            product: driver.provider_product_id.clone(),
            price: driver.provider_price_id.clone(),
        };
        let result = self
            .invoice(
                &mut refs,
                company.user_id,
                &format!("Driver form #{}", driver.id),
                amount,
            )
            .await;

        let company_refs = ProviderRefs {
            customer_id: refs.customer.clone(),
            ..company.provider.clone()
        };
        self.db.set_company_provider_refs(company.id, &company_refs).await?;
        self.db
            .set_driver_provider_refs(driver.id, refs.product.as_deref(), refs.price.as_deref())
            .await?;

        let invoice = result?;
        self.record(company.user_id, PaymentKind::PayForDriver, Some(driver.id), amount, invoice)
            .await
    }

    /// Invoice a company for a block of subscription opens.
    pub async fn create_subscription_payment(
        &self,
        company: &CompanyRecord,
    ) -> Result<Payment, PaymentError> {
        let mut refs = InvoiceRefs {
            customer: company.provider.customer_id.clone(),
            product: company.provider.product_id.clone(),
            price: company.provider.price_id.clone(),
        };
        let result = self
            .invoice(&mut refs, company.user_id, "Subscription", SUBSCRIPTION_AMOUNT)
            .await;

        let company_refs = ProviderRefs {
            customer_id: refs.customer,
            product_id: refs.product,
            price_id: refs.price,
        };
        self.db.set_company_provider_refs(company.id, &company_refs).await?;

        let invoice = result?;
        self.record(company.user_id, PaymentKind::SubscriptionFee, None, SUBSCRIPTION_AMOUNT, invoice)
            .await
    }

    /// Create missing references, then the invoice. A stale reference is
    /// recreated and the invoice retried once.
    async fn invoice(
        &self,
        refs: &mut InvoiceRefs,
        user_id: i64,
        description: &str,
        amount: i64,
    ) -> Result<Invoice, ProviderError> {
        let mut retried = false;
        loop {
            let customer = match &refs.customer {
                Some(id) => id.clone(),
                None => {
                    let id = self.provider.create_customer(&format!("user {user_id}")).await?;
                    refs.customer = Some(id.clone());
                    id
                }
            };
            let product = match &refs.product {
                Some(id) => id.clone(),
                None => {
                    let id = self.provider.create_product(description).await?;
                    refs.product = Some(id.clone());
                    refs.price = None;
                    id
                }
            };
            let price = match &refs.price {
                Some(id) => id.clone(),
                None => {
                    let id = self.provider.create_price(&product, amount).await?;
                    refs.price = Some(id.clone());
                    id
                }
            };

            let request = InvoiceRequest {
                customer_id: &customer,
                price_id: &price,
                description,
                days_until_due: INVOICE_DAYS_UNTIL_DUE,
            };
            match self.provider.create_invoice(&request).await {
                Ok(invoice) => return Ok(invoice),
                Err(ProviderError::StaleReference { resource, id }) if !retried => {
                    warn!(resource, id = %id, "Stale provider reference; recreating");
                    refs.forget(resource);
                    retried = true;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn record(
        &self,
        creator_id: i64,
        kind: PaymentKind,
        driver_id: Option<i64>,
        amount: i64,
        invoice: Invoice,
    ) -> Result<Payment, PaymentError> {
        let payment = Payment {
            id: Uuid::new_v4(),
            creator_id,
            kind,
            driver_id,
            amount,
            status: PaymentStatus::Pending,
            invoice_id: invoice.id,
            invoice_url: invoice.url,
            due_at: invoice.due_at,
            message: None,
            created_at: Utc::now(),
        };
        self.db.insert_payment(&payment).await?;
        info!(payment_id = %payment.id, user_id = creator_id, kind = kind.as_str(), "Payment created");
        Ok(payment)
    }

    /// Remember the invoice message so it can be removed on settlement.
    pub async fn attach_message(&self, id: Uuid, message: MessageRef) -> Result<(), PaymentError> {
        self.db.set_payment_message(id, Some(message)).await?;
        Ok(())
    }

    /// Cancel the company's pending payment and void its invoice.
    pub async fn cancel(&self, creator_id: i64) -> Result<CancelOutcome, PaymentError> {
        let payment = self
            .db
            .get_pending_payment_for(creator_id)
            .await?
            .ok_or(PaymentError::NoPending(creator_id))?;

        if !self.db.settle_payment(payment.id, PaymentStatus::Closed).await? {
            return Ok(CancelOutcome::AlreadySettled);
        }
        if let Err(e) = self.provider.void_invoice(&payment.invoice_id).await {
            error!(payment_id = %payment.id, "Failed to void invoice: {e}");
        }
        info!(payment_id = %payment.id, user_id = creator_id, "Payment cancelled");
        Ok(CancelOutcome::Cancelled(payment))
    }

    /// Check one pending payment against the provider and settle it.
    pub async fn settle(
        &self,
        payment: &Payment,
        now: DateTime<Utc>,
    ) -> Result<Settlement, PaymentError> {
        match self.provider.invoice_status(&payment.invoice_id).await? {
            InvoiceStatus::Paid => {
                if !self.db.settle_payment(payment.id, PaymentStatus::Paid).await? {
                    return Ok(Settlement::Lost);
                }
                self.grant(payment).await?;
                info!(payment_id = %payment.id, "Payment paid");
                Ok(Settlement::Paid(payment.clone()))
            }
            InvoiceStatus::Open if !payment.is_overdue(now) => Ok(Settlement::Pending),
            status => {
                if !self.db.settle_payment(payment.id, PaymentStatus::Closed).await? {
                    return Ok(Settlement::Lost);
                }
                if status == InvoiceStatus::Open
                    && let Err(e) = self.provider.void_invoice(&payment.invoice_id).await
                {
                    warn!(payment_id = %payment.id, "Failed to void expired invoice: {e}");
                }
                info!(payment_id = %payment.id, "Payment expired");
                Ok(Settlement::Expired(payment.clone()))
            }
        }
    }

    async fn grant(&self, payment: &Payment) -> Result<(), PaymentError> {
        let company = self
            .db
            .get_company_by_user(payment.creator_id)
            .await?
            .ok_or_else(|| DatabaseError::NotFound {
                entity: "company".into(),
                id: payment.creator_id.to_string(),
            })?;
        match (payment.kind, payment.driver_id) {
            (PaymentKind::PayForDriver, Some(driver_id)) => {
                grant_open(self.db.as_ref(), company.id, driver_id, false).await?;
            }
            (PaymentKind::SubscriptionFee, _) => {
                self.db.add_company_credit(company.id, SUBSCRIPTION_CREDIT).await?;
            }
            (PaymentKind::PayForDriver, None) => {
                warn!(payment_id = %payment.id, "Driver payment without a driver");
            }
        }
        Ok(())
    }

    /// After a price change, retire the driver's old provider price and
    /// create one for the new price on the existing product.
    pub async fn refresh_driver_price(&self, user_id: i64) -> Result<(), PaymentError> {
        let Some(driver) = self.db.get_driver_by_user(user_id).await? else {
            return Ok(());
        };
        if let Some(price_id) = &driver.provider_price_id {
            match self.provider.deactivate_price(price_id).await {
                Ok(()) | Err(ProviderError::StaleReference { .. }) => {}
                Err(e) => return Err(e.into()),
            }
        }
        let Some(product_id) = &driver.provider_product_id else {
            self.db.set_driver_provider_refs(driver.id, None, None).await?;
            return Ok(());
        };
        let amount = to_minor_units(driver.form_price);
        match self.provider.create_price(product_id, amount).await {
            Ok(price_id) => {
                self.db
                    .set_driver_provider_refs(driver.id, Some(product_id), Some(&price_id))
                    .await?;
            }
            Err(ProviderError::StaleReference { .. }) => {
                self.db.set_driver_provider_refs(driver.id, None, None).await?;
            }
            Err(e) => return Err(e.into()),
        }
        info!(driver_id = driver.id, "Driver price refreshed");
        Ok(())
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::Mutex;

    use async_trait::async_trait;
    use chrono::{Duration, Utc};

    use crate::error::ProviderError;
    use crate::payments::provider::{Invoice, InvoiceRequest, InvoiceStatus, PaymentProvider};

    /// In-process provider recording every call.
    #[derive(Default)]
    pub struct StubProvider {
        pub calls: Mutex<Vec<String>>,
        /// Reject the next invoice with a stale reference to this resource.
        pub stale_once: Mutex<Option<&'static str>>,
        pub status: Mutex<Option<InvoiceStatus>>,
        counter: Mutex<u32>,
    }

    impl StubProvider {
        fn next_id(&self, prefix: &str) -> String {
            let mut n = self.counter.lock().unwrap();
            *n += 1;
            format!("{prefix}_{n}")
        }

        fn log(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl PaymentProvider for StubProvider {
        fn name(&self) -> &str {
            "stub"
        }

        async fn create_customer(&self, _description: &str) -> Result<String, ProviderError> {
            let id = self.next_id("cus");
            self.log(format!("customer {id}"));
            Ok(id)
        }

        async fn create_product(&self, _name: &str) -> Result<String, ProviderError> {
            let id = self.next_id("prod");
            self.log(format!("product {id}"));
            Ok(id)
        }

        async fn create_price(&self, product_id: &str, amount: i64) -> Result<String, ProviderError> {
            let id = self.next_id("price");
            self.log(format!("price {id} {product_id} {amount}"));
            Ok(id)
        }

        async fn deactivate_price(&self, price_id: &str) -> Result<(), ProviderError> {
            self.log(format!("deactivate {price_id}"));
            Ok(())
        }

        async fn create_invoice(&self, request: &InvoiceRequest<'_>) -> Result<Invoice, ProviderError> {
            if let Some(resource) = self.stale_once.lock().unwrap().take() {
                self.log(format!("stale {resource}"));
                return Err(ProviderError::StaleReference {
                    resource,
                    id: "gone".into(),
                });
            }
            let id = self.next_id("in");
            self.log(format!("invoice {id} {} {}", request.customer_id, request.price_id));
            Ok(Invoice {
                url: format!("https://pay.example/{id}"),
                id,
                due_at: Utc::now() + Duration::days(request.days_until_due),
            })
        }

        async fn invoice_status(&self, _invoice_id: &str) -> Result<InvoiceStatus, ProviderError> {
            Ok(self.status.lock().unwrap().unwrap_or(InvoiceStatus::Open))
        }

        async fn void_invoice(&self, invoice_id: &str) -> Result<(), ProviderError> {
            self.log(format!("void {invoice_id}"));
            Ok(())
        }
    }
}
