//! Background payment poller.
//!
//! Every tick it loads pending payments, asks the provider for each
//! invoice's state, settles what changed and tells the people involved.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use chrono::Utc;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::channels::UiChannel;
use crate::form::render_summary;
use crate::localization::Catalog;
use crate::payments::model::{Payment, PaymentKind};
use crate::payments::service::{PaymentService, Settlement};
use crate::store::Database;

/// Collaborators the poller needs.
#[derive(Clone)]
pub struct PaymentPoller {
    pub service: Arc<PaymentService>,
    pub db: Arc<dyn Database>,
    pub channel: Arc<dyn UiChannel>,
    pub catalog: Arc<Catalog>,
}

impl PaymentPoller {
    /// Spawn the poll loop. Set the returned flag to stop it.
    pub fn spawn(self, interval: Duration) -> (JoinHandle<()>, Arc<AtomicBool>) {
        let shutdown = Arc::new(AtomicBool::new(false));
        let shutdown_flag = Arc::clone(&shutdown);

        let handle = tokio::spawn(async move {
            info!(
                "Payment poller started, polling {} every {}s",
                self.service.provider_name(),
                interval.as_secs()
            );
            let mut tick = tokio::time::interval(interval);

            loop {
                tick.tick().await;

                if shutdown.load(Ordering::Relaxed) {
                    info!("Payment poller shutting down");
                    return;
                }

                self.poll_once().await;
            }
        });

        (handle, shutdown_flag)
    }

    /// Run one poll cycle over every pending payment.
    pub async fn poll_once(&self) {
        let pending = match self.db.get_pending_payments().await {
            Ok(p) => p,
            Err(e) => {
                error!("Failed to load pending payments: {e}");
                return;
            }
        };
        if pending.is_empty() {
            return;
        }
        debug!("Checking {} pending payments", pending.len());

        let now = Utc::now();
        for payment in &pending {
            match self.service.settle(payment, now).await {
                Ok(Settlement::Paid(p)) => self.announce_paid(&p).await,
                Ok(Settlement::Expired(p)) => self.announce_expired(&p).await,
                Ok(Settlement::Pending) => {}
                Ok(Settlement::Lost) => {
                    debug!(payment_id = %payment.id, "Payment settled elsewhere");
                }
                Err(e) => {
                    error!(payment_id = %payment.id, "Payment check failed: {e}");
                }
            }
        }
    }

    async fn company_lang(&self, user_id: i64) -> String {
        match self.db.get_company_by_user(user_id).await {
            Ok(Some(c)) => c.lang,
            _ => self.catalog.default_lang().to_string(),
        }
    }

    async fn remove_invoice_message(&self, payment: &Payment) {
        if let Some(message) = &payment.message
            && let Err(e) = self.channel.delete(message).await
        {
            debug!(payment_id = %payment.id, "Invoice message already gone: {e}");
        }
    }

    async fn send(&self, user_id: i64, text: &str) {
        if let Err(e) = self.channel.render(user_id, text, None).await {
            warn!(user_id, "Failed to deliver payment notice: {e}");
        }
    }

    async fn announce_paid(&self, payment: &Payment) {
        self.remove_invoice_message(payment).await;
        let lang = self.company_lang(payment.creator_id).await;

        match (payment.kind, payment.driver_id) {
            (PaymentKind::PayForDriver, Some(driver_id)) => {
                self.send(payment.creator_id, &self.catalog.text(&lang, "pay_for_driver_success"))
                    .await;
                let driver = match self.db.get_driver(driver_id).await {
                    Ok(Some(d)) => d,
                    Ok(None) => return,
                    Err(e) => {
                        error!(driver_id, "Failed to load opened driver: {e}");
                        return;
                    }
                };
                let title = self.catalog.text(&lang, "form_title");
                let summary = render_summary(&driver.profile, &title, &lang, &self.catalog, false);
                self.send(payment.creator_id, &summary).await;
                self.send(
                    driver.user_id,
                    &self.catalog.text(&driver.lang, "msg_to_driver_after_open"),
                )
                .await;
            }
            _ => {
                self.send(
                    payment.creator_id,
                    &self.catalog.text(&lang, "pay_for_subscription_success"),
                )
                .await;
            }
        }
    }

    async fn announce_expired(&self, payment: &Payment) {
        self.remove_invoice_message(payment).await;
        let lang = self.company_lang(payment.creator_id).await;
        self.send(payment.creator_id, &self.catalog.text(&lang, "payment_due_time"))
            .await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::CliChannel;
    use crate::localization::test_support::bundled_catalog;
    use crate::payments::service::test_support::StubProvider;
    use crate::store::LibSqlBackend;

    #[tokio::test]
    async fn shutdown_flag_stops_the_loop() {
        let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
        let service = Arc::new(PaymentService::new(
            Arc::clone(&db),
            Arc::new(StubProvider::default()),
        ));
        let poller = PaymentPoller {
            service,
            db,
            channel: Arc::new(CliChannel::new(1, None)),
            catalog: Arc::new(bundled_catalog()),
        };

        let (handle, shutdown) = poller.spawn(Duration::from_millis(10));
        tokio::time::sleep(Duration::from_millis(30)).await;
        assert!(!handle.is_finished());

        shutdown.store(true, Ordering::Relaxed);
        tokio::time::timeout(Duration::from_secs(1), handle)
            .await
            .expect("poller stops within a tick")
            .unwrap();
    }
}
