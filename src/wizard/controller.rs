//! Wizard controller: applies step results, persists terminal outcomes
//! and keeps the prompt message on screen in sync.

use std::sync::Arc;

use rust_decimal::Decimal;
use tracing::{debug, error, info, warn};

use crate::channels::UiChannel;
use crate::config::BotConfig;
use crate::error::Result;
use crate::form::{FieldName, FieldValue, RuleTable, compute_price};
use crate::localization::Catalog;
use crate::payments::PaymentService;
use crate::store::{Database, NewDriver};
use crate::wizard::context::{Form, WizardContext};
use crate::wizard::flow::{self, StepEnv, StepResult, WizardInput};
use crate::wizard::step::Mode;

/// Message shown when a terminal write fails.
const PERSISTENCE_ERROR: &str = "persistence_error";

/// Where the wizard ended up after one input.
#[derive(Debug, Clone, PartialEq)]
pub enum WizardOutcome {
    /// Still collecting.
    Active,
    /// The user backed out of the first step (or out of a single-step run).
    Left,
    Registered { driver_id: i64, price: Decimal },
    FieldUpdated(FieldName),
    FilterUpdated(FieldName),
}

pub struct WizardController {
    catalog: Arc<Catalog>,
    rules: Arc<RuleTable>,
    config: Arc<BotConfig>,
    db: Arc<dyn Database>,
    channel: Arc<dyn UiChannel>,
    payments: Option<Arc<PaymentService>>,
}

impl WizardController {
    pub fn new(
        catalog: Arc<Catalog>,
        rules: Arc<RuleTable>,
        config: Arc<BotConfig>,
        db: Arc<dyn Database>,
        channel: Arc<dyn UiChannel>,
        payments: Option<Arc<PaymentService>>,
    ) -> Self {
        Self {
            catalog,
            rules,
            config,
            db,
            channel,
            payments,
        }
    }

    fn env(&self) -> StepEnv<'_> {
        StepEnv {
            catalog: &self.catalog,
            rules: &self.rules,
            base_price: self.config.base_form_price,
            salary_min: self.config.salary_min,
            salary_max: self.config.salary_max,
            today: self.config.today(),
        }
    }

    /// Show the current step of a fresh context.
    pub async fn start(&self, user_id: i64, ctx: &mut WizardContext) -> Result<()> {
        debug!(user_id, step = ?ctx.step, status = ctx.mode.status(), "Wizard started");
        self.show(user_id, ctx).await
    }

    /// Feed one input to the wizard.
    pub async fn handle(
        &self,
        user_id: i64,
        ctx: &mut WizardContext,
        input: &WizardInput,
    ) -> Result<WizardOutcome> {
        let result = match flow::process(ctx, input, &self.env()) {
            Ok(result) => result,
            Err(e) => {
                match e.message_key() {
                    Some(key) => {
                        debug!(user_id, step = ?ctx.step, "Rejected input: {e}");
                        self.notify(user_id, &ctx.lang, key).await?;
                        self.show(user_id, ctx).await?;
                    }
                    None => debug!(user_id, step = ?ctx.step, "Ignoring stale action: {e}"),
                }
                return Ok(WizardOutcome::Active);
            }
        };

        match result {
            StepResult::Unchanged => Ok(WizardOutcome::Active),
            StepResult::Redraw => {
                self.redraw(user_id, ctx).await?;
                Ok(WizardOutcome::Active)
            }
            StepResult::Reprompt => {
                self.reprompt(user_id, ctx).await?;
                Ok(WizardOutcome::Active)
            }
            StepResult::Back => self.back(user_id, ctx).await,
            StepResult::Patch { field, value } => self.apply(user_id, ctx, field, value).await,
            StepResult::RangePatch { field, left, right } => match range_value(left, right) {
                Some(value) => self.apply(user_id, ctx, field, value).await,
                None => {
                    warn!(user_id, field = %field, "Range edges of different kinds");
                    Ok(WizardOutcome::Active)
                }
            },
            StepResult::Confirm => self.confirm(user_id, ctx).await,
        }
    }

    async fn back(&self, user_id: i64, ctx: &mut WizardContext) -> Result<WizardOutcome> {
        if let Some(field) = ctx.field() {
            ctx.form.clear(field);
        }
        match ctx.step.prev(ctx.mode) {
            Some(prev) => {
                ctx.enter(prev);
                self.show(user_id, ctx).await?;
                Ok(WizardOutcome::Active)
            }
            None => {
                self.dismiss(ctx).await;
                Ok(WizardOutcome::Left)
            }
        }
    }

    async fn apply(
        &self,
        user_id: i64,
        ctx: &mut WizardContext,
        field: FieldName,
        value: FieldValue,
    ) -> Result<WizardOutcome> {
        if let Err(e) = ctx.form.set(field, value.clone()) {
            error!(user_id, field = %field, "Captured value does not fit the form: {e}");
            return Ok(WizardOutcome::Active);
        }

        match ctx.mode {
            Mode::Registration => {
                if let Some(next) = ctx.step.next(ctx.mode) {
                    ctx.enter(next);
                }
                self.show(user_id, ctx).await?;
                Ok(WizardOutcome::Active)
            }
            Mode::EditField => {
                let Form::Driver(profile) = &ctx.form else {
                    return Ok(WizardOutcome::Active);
                };
                let price = compute_price(profile, &self.rules, self.config.base_form_price, &self.catalog);
                if let Err(e) = self.db.update_driver_field(user_id, field, &value, price).await {
                    error!(user_id, field = %field, "Failed to update driver field: {e}");
                    self.notify(user_id, &ctx.lang, PERSISTENCE_ERROR).await?;
                    return Ok(WizardOutcome::Active);
                }
                if let Some(payments) = &self.payments
                    && let Err(e) = payments.refresh_driver_price(user_id).await
                {
                    error!(user_id, "Failed to refresh provider price: {e}");
                }
                info!(user_id, field = %field, price = %price, "Driver field updated");
                self.dismiss(ctx).await;
                Ok(WizardOutcome::FieldUpdated(field))
            }
            Mode::CompanyFilter => {
                let stored = ctx.form.value(field);
                if let Err(e) = self.db.update_company_filter(user_id, field, stored.as_ref()).await {
                    error!(user_id, field = %field, "Failed to update company filter: {e}");
                    self.notify(user_id, &ctx.lang, PERSISTENCE_ERROR).await?;
                    return Ok(WizardOutcome::Active);
                }
                info!(user_id, field = %field, "Company filter updated");
                self.dismiss(ctx).await;
                Ok(WizardOutcome::FilterUpdated(field))
            }
        }
    }

    async fn confirm(&self, user_id: i64, ctx: &mut WizardContext) -> Result<WizardOutcome> {
        let Form::Driver(profile) = &ctx.form else {
            return Ok(WizardOutcome::Active);
        };
        if !profile.is_complete() {
            warn!(user_id, "Confirmation reached with unanswered fields");
            self.show(user_id, ctx).await?;
            return Ok(WizardOutcome::Active);
        }
        let price = compute_price(profile, &self.rules, self.config.base_form_price, &self.catalog);
        let driver = NewDriver {
            user_id,
            lang: ctx.lang.clone(),
            profile: profile.clone(),
            price,
        };
        match self.db.create_driver(&driver).await {
            Ok(driver_id) => {
                info!(user_id, driver_id, price = %price, "Driver registered");
                self.dismiss(ctx).await;
                Ok(WizardOutcome::Registered { driver_id, price })
            }
            Err(e) => {
                error!(user_id, "Failed to register driver: {e}");
                self.notify(user_id, &ctx.lang, PERSISTENCE_ERROR).await?;
                Ok(WizardOutcome::Active)
            }
        }
    }

    // ── Screen ──────────────────────────────────────────────────────

    /// Replace the prompt message with a fresh one for the current step.
    async fn show(&self, user_id: i64, ctx: &mut WizardContext) -> Result<()> {
        self.dismiss(ctx).await;
        let env = self.env();
        let text = flow::prompt_text(ctx, &env);
        let keyboard = flow::keyboard(ctx, &env);
        let message = self.channel.render(user_id, &text, Some(&keyboard)).await?;
        ctx.message = Some(message);
        Ok(())
    }

    async fn redraw(&self, user_id: i64, ctx: &mut WizardContext) -> Result<()> {
        let Some(message) = ctx.message else {
            return self.show(user_id, ctx).await;
        };
        let keyboard = flow::keyboard(ctx, &self.env());
        if let Err(e) = self.channel.edit_buttons(&message, &keyboard).await {
            debug!(user_id, "Button edit failed, sending a new prompt: {e}");
            return self.show(user_id, ctx).await;
        }
        Ok(())
    }

    async fn reprompt(&self, user_id: i64, ctx: &mut WizardContext) -> Result<()> {
        let Some(message) = ctx.message else {
            return self.show(user_id, ctx).await;
        };
        let env = self.env();
        let text = flow::prompt_text(ctx, &env);
        let keyboard = flow::keyboard(ctx, &env);
        if let Err(e) = self.channel.edit_message(&message, &text, Some(&keyboard)).await {
            debug!(user_id, "Message edit failed, sending a new prompt: {e}");
            return self.show(user_id, ctx).await;
        }
        Ok(())
    }

    /// Remove the prompt message, if any.
    async fn dismiss(&self, ctx: &mut WizardContext) {
        if let Some(message) = ctx.message.take()
            && let Err(e) = self.channel.delete(&message).await
        {
            debug!("Prompt already gone: {e}");
        }
    }

    async fn notify(&self, user_id: i64, lang: &str, key: &str) -> Result<()> {
        let text = self.catalog.text(lang, key);
        self.channel.render(user_id, &text, None).await?;
        Ok(())
    }
}

/// Combine two ordered edges into one range value.
fn range_value(left: FieldValue, right: FieldValue) -> Option<FieldValue> {
    match (left, right) {
        (FieldValue::Int(l), FieldValue::Int(r)) => Some(FieldValue::YearRange(l, r)),
        (FieldValue::Date(l), FieldValue::Date(r)) => Some(FieldValue::DateRange(l, r)),
        (FieldValue::Number(l), FieldValue::Number(r)) => Some(FieldValue::NumberRange(l, r)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use super::*;

    #[test]
    fn range_values_follow_edge_kind() {
        assert_eq!(
            range_value(FieldValue::Int(1970), FieldValue::Int(1990)),
            Some(FieldValue::YearRange(1970, 1990))
        );
        let d = NaiveDate::from_ymd_opt(2026, 11, 1).unwrap();
        assert_eq!(
            range_value(FieldValue::Date(d), FieldValue::Date(d)),
            Some(FieldValue::DateRange(d, d))
        );
        assert_eq!(
            range_value(FieldValue::Number(dec!(1)), FieldValue::Number(dec!(2))),
            Some(FieldValue::NumberRange(dec!(1), dec!(2)))
        );
        assert_eq!(range_value(FieldValue::Int(1), FieldValue::Number(dec!(2))), None);
    }
}
