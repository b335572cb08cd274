//! Paid access: payment rows, the provider contract, the Stripe
//! provider, the payment service and the settlement poller.

pub mod model;
pub mod poller;
pub mod provider;
pub mod service;
pub mod stripe;

pub use model::{Payment, PaymentKind, PaymentStatus};
pub use poller::PaymentPoller;
pub use provider::{Invoice, InvoiceRequest, InvoiceStatus, PaymentProvider};
pub use service::{CancelOutcome, PaymentService, Settlement, grant_open};
pub use stripe::StripeProvider;
