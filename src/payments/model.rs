//! Payment rows and their state machine.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal::prelude::ToPrimitive;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::channels::MessageRef;

/// Subscription fee in minor units.
pub const SUBSCRIPTION_AMOUNT: i64 = 100_000;

/// Opens granted by one subscription payment.
pub const SUBSCRIPTION_CREDIT: i64 = 20;

/// Currency every provider price is created in.
pub const CURRENCY: &str = "pln";

/// Days an invoice stays payable.
pub const INVOICE_DAYS_UNTIL_DUE: i64 = 1;

/// What a payment buys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PaymentKind {
    /// Open one driver's full form.
    PayForDriver,
    /// Buy a block of opens.
    SubscriptionFee,
}

impl PaymentKind {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentKind::PayForDriver => "pay_for_driver",
            PaymentKind::SubscriptionFee => "subscription_fee",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pay_for_driver" => Some(PaymentKind::PayForDriver),
            "subscription_fee" => Some(PaymentKind::SubscriptionFee),
            _ => None,
        }
    }
}

/// Payment lifecycle: `Pending` moves to exactly one of the others.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentStatus {
    Pending,
    Paid,
    /// Cancelled by the company or expired past its due time.
    Closed,
}

impl PaymentStatus {
    pub fn as_i64(self) -> i64 {
        match self {
            PaymentStatus::Pending => 0,
            PaymentStatus::Paid => 1,
            PaymentStatus::Closed => 2,
        }
    }

    pub fn from_i64(v: i64) -> Self {
        match v {
            0 => PaymentStatus::Pending,
            1 => PaymentStatus::Paid,
            _ => PaymentStatus::Closed,
        }
    }

    pub fn can_transition_to(self, target: PaymentStatus) -> bool {
        self == PaymentStatus::Pending && target != PaymentStatus::Pending
    }
}

/// A payment created by a company.
#[derive(Debug, Clone, PartialEq)]
pub struct Payment {
    pub id: Uuid,
    /// Company user that created the payment.
    pub creator_id: i64,
    pub kind: PaymentKind,
    /// Driver being opened, for `PayForDriver`.
    pub driver_id: Option<i64>,
    /// Minor currency units.
    pub amount: i64,
    pub status: PaymentStatus,
    pub invoice_id: String,
    pub invoice_url: String,
    pub due_at: DateTime<Utc>,
    /// Invoice message to remove once the payment settles.
    pub message: Option<MessageRef>,
    pub created_at: DateTime<Utc>,
}

impl Payment {
    pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
        now > self.due_at
    }

    /// Amount in major units for display.
    pub fn major_amount(&self) -> Decimal {
        Decimal::new(self.amount, 2)
    }
}

/// Minor units for a major-unit price, rounded to the cent.
pub fn to_minor_units(price: Decimal) -> i64 {
    (price * Decimal::ONE_HUNDRED)
        .round()
        .to_i64()
        .unwrap_or_default()
}
