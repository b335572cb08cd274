//! Stripe provider over the REST API.
//!
//! Requests are form-encoded and authenticated with the secret key as a
//! bearer token; responses are read as loose JSON.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;

use crate::error::ProviderError;
use crate::payments::model::CURRENCY;
use crate::payments::provider::{Invoice, InvoiceRequest, InvoiceStatus, PaymentProvider};

const API_BASE: &str = "https://api.stripe.com/v1";

/// Stripe hosted-invoice provider.
pub struct StripeProvider {
    secret_key: SecretString,
    base_url: String,
    client: reqwest::Client,
}

impl StripeProvider {
    pub fn new(secret_key: SecretString) -> Self {
        Self {
            secret_key,
            base_url: API_BASE.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Point the provider at another API host (mock servers).
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    fn api_url(&self, path: &str) -> String {
        format!("{}/{path}", self.base_url)
    }

    async fn post(&self, path: &str, params: &[(&str, String)]) -> Result<Value, ProviderError> {
        let resp = self
            .client
            .post(self.api_url(path))
            .bearer_auth(self.secret_key.expose_secret())
            .form(params)
            .send()
            .await
            .map_err(|e| ProviderError::Request(format!("POST {path}: {e}")))?;
        read_body(path, resp).await
    }

    async fn get(&self, path: &str) -> Result<Value, ProviderError> {
        let resp = self
            .client
            .get(self.api_url(path))
            .bearer_auth(self.secret_key.expose_secret())
            .send()
            .await
            .map_err(|e| ProviderError::Request(format!("GET {path}: {e}")))?;
        read_body(path, resp).await
    }
}

async fn read_body(path: &str, resp: reqwest::Response) -> Result<Value, ProviderError> {
    let status = resp.status();
    let body: Value = resp
        .json()
        .await
        .map_err(|e| ProviderError::InvalidResponse(format!("{path}: {e}")))?;
    if status.is_success() {
        Ok(body)
    } else {
        tracing::warn!(status = ?status, path, "Stripe request rejected");
        Err(classify_error(status.as_u16(), &body))
    }
}

/// Map a Stripe error body to a provider error. Missing or inactive
/// customers, products and prices become `StaleReference`.
fn classify_error(status: u16, body: &Value) -> ProviderError {
    let error = &body["error"];
    let code = error["code"].as_str().unwrap_or_default();
    let message = error["message"].as_str().unwrap_or_default();
    let param = error["param"].as_str().unwrap_or_default();

    let resource = match param {
        "customer" => Some("customer"),
        "product" => Some("product"),
        "price" => Some("price"),
        _ => None,
    };
    let stale = code == "resource_missing" || message.contains("inactive");
    match resource {
        Some(resource) if stale => ProviderError::StaleReference {
            resource,
            id: message.to_string(),
        },
        _ => ProviderError::Request(format!("HTTP {status}: {code} {message}")),
    }
}

fn string_field(body: &Value, key: &str) -> Result<String, ProviderError> {
    body[key]
        .as_str()
        .map(str::to_string)
        .ok_or_else(|| ProviderError::InvalidResponse(format!("missing {key}")))
}

fn parse_invoice(body: &Value, days_until_due: i64) -> Result<Invoice, ProviderError> {
    let due_at = body["due_date"]
        .as_i64()
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .unwrap_or_else(|| Utc::now() + Duration::days(days_until_due));
    Ok(Invoice {
        id: string_field(body, "id")?,
        url: string_field(body, "hosted_invoice_url")?,
        due_at,
    })
}

fn parse_status(body: &Value) -> Result<InvoiceStatus, ProviderError> {
    match body["status"].as_str() {
        Some("paid") => Ok(InvoiceStatus::Paid),
        Some("open" | "draft") => Ok(InvoiceStatus::Open),
        Some(_) => Ok(InvoiceStatus::Closed),
        None => Err(ProviderError::InvalidResponse("missing status".into())),
    }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
    fn name(&self) -> &str {
        "stripe"
    }

    async fn create_customer(&self, description: &str) -> Result<String, ProviderError> {
        let body = self
            .post("customers", &[("description", description.to_string())])
            .await?;
        string_field(&body, "id")
    }

    async fn create_product(&self, name: &str) -> Result<String, ProviderError> {
        let body = self.post("products", &[("name", name.to_string())]).await?;
        string_field(&body, "id")
    }

    async fn create_price(&self, product_id: &str, amount: i64) -> Result<String, ProviderError> {
        let body = self
            .post(
                "prices",
                &[
                    ("product", product_id.to_string()),
                    ("unit_amount", amount.to_string()),
                    ("currency", CURRENCY.to_string()),
                ],
            )
            .await?;
        string_field(&body, "id")
    }

    async fn deactivate_price(&self, price_id: &str) -> Result<(), ProviderError> {
        self.post(&format!("prices/{price_id}"), &[("active", "false".to_string())])
            .await?;
        Ok(())
    }

    async fn create_invoice(&self, request: &InvoiceRequest<'_>) -> Result<Invoice, ProviderError> {
        let draft = self
            .post(
                "invoices",
                &[
                    ("customer", request.customer_id.to_string()),
                    ("collection_method", "send_invoice".to_string()),
                    ("days_until_due", request.days_until_due.to_string()),
                    ("description", request.description.to_string()),
                    ("pending_invoice_items_behavior", "exclude".to_string()),
                ],
            )
            .await?;
        let invoice_id = string_field(&draft, "id")?;

        self.post(
            "invoiceitems",
            &[
                ("customer", request.customer_id.to_string()),
                ("invoice", invoice_id.clone()),
                ("price", request.price_id.to_string()),
            ],
        )
        .await?;

        let finalized = self
            .post(&format!("invoices/{invoice_id}/finalize"), &[])
            .await?;
        let invoice = parse_invoice(&finalized, request.days_until_due)?;
        tracing::info!(invoice_id = %invoice.id, "Stripe invoice finalized");
        Ok(invoice)
    }

    async fn invoice_status(&self, invoice_id: &str) -> Result<InvoiceStatus, ProviderError> {
        let body = self.get(&format!("invoices/{invoice_id}")).await?;
        parse_status(&body)
    }

    async fn void_invoice(&self, invoice_id: &str) -> Result<(), ProviderError> {
        self.post(&format!("invoices/{invoice_id}/void"), &[]).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn missing_resources_are_stale() {
        let body = json!({"error": {
            "code": "resource_missing",
            "param": "price",
            "message": "No such price: 'price_1'"
        }});
        assert!(matches!(
            classify_error(400, &body),
            ProviderError::StaleReference { resource: "price", .. }
        ));

        let inactive = json!({"error": {
            "param": "price",
            "message": "The price specified is inactive."
        }});
        assert!(matches!(
            classify_error(400, &inactive),
            ProviderError::StaleReference { resource: "price", .. }
        ));
    }

    #[test]
    fn other_errors_are_request_failures() {
        let body = json!({"error": {"code": "api_key_expired", "message": "Expired"}});
        let err = classify_error(401, &body);
        assert!(matches!(err, ProviderError::Request(ref m) if m.contains("401")));
    }

    #[test]
    fn invoice_parsing() {
        let body = json!({
            "id": "in_1",
            "hosted_invoice_url": "https://invoice.stripe.com/i/1",
            "due_date": 1_800_000_000
        });
        let inv = parse_invoice(&body, 1).unwrap();
        assert_eq!(inv.id, "in_1");
        assert_eq!(inv.due_at.timestamp(), 1_800_000_000);

        assert!(parse_invoice(&json!({"id": "in_2"}), 1).is_err());
    }

    #[test]
    fn status_mapping() {
        assert_eq!(parse_status(&json!({"status": "paid"})).unwrap(), InvoiceStatus::Paid);
        assert_eq!(parse_status(&json!({"status": "open"})).unwrap(), InvoiceStatus::Open);
        assert_eq!(parse_status(&json!({"status": "void"})).unwrap(), InvoiceStatus::Closed);
        assert!(parse_status(&json!({})).is_err());
    }

    #[test]
    fn api_urls() {
        let p = StripeProvider::new(SecretString::from("sk_test")).with_base_url("http://localhost:1");
        assert_eq!(p.api_url("prices/p_1"), "http://localhost:1/prices/p_1");
        assert_eq!(p.name(), "stripe");
    }
}
