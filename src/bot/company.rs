//! Company screens: filters, browsing, opening forms and payments.

use rust_decimal::Decimal;
use tracing::{debug, error, info};

use super::{Bot, BotAction, Session, field_grid, lang, price_text, with_driver_id};
use crate::channels::{Button, Keyboard};
use crate::error::{DatabaseError, PaymentError, Result};
use crate::form::{DriverProfile, FILTER_FIELDS, FieldName, FieldValue, FormView, render_summary};
use crate::matching::{Browse, next_match};
use crate::payments::model::{SUBSCRIPTION_AMOUNT, SUBSCRIPTION_CREDIT};
use crate::payments::{CancelOutcome, Payment, PaymentService, grant_open};
use crate::store::{CompanyRecord, DriverRecord};
use crate::wizard::WizardContext;

/// Filter buttons on the first filter page; the rest go on the second.
const FILTERS_FIRST_PAGE: usize = 10;

const FILTER_PAGES: usize = 2;

const OPENED_PER_PAGE: usize = 3;

/// Everything a company may see before paying.
const PREVIEW_FIELDS: [FieldName; 19] = [
    FieldName::BirthYear,
    FieldName::CarTypes,
    FieldName::Citizenships,
    FieldName::BasisOfStay,
    FieldName::Availability95Code,
    FieldName::DateStartWork,
    FieldName::LanguageSkills,
    FieldName::JobExperience,
    FieldName::NeedInternship,
    FieldName::UnsuitableCountries,
    FieldName::DangerousGoods,
    FieldName::ExpectedSalary,
    FieldName::CategoriesAvailability,
    FieldName::CountryDrivingLicence,
    FieldName::CountryCurrentLive,
    FieldName::WorkType,
    FieldName::Cadence,
    FieldName::Crew,
    FieldName::DriverGender,
];

/// A driver profile with contact fields withheld.
struct Preview<'a>(&'a DriverProfile);

impl FormView for Preview<'_> {
    fn fields(&self) -> &'static [FieldName] {
        &PREVIEW_FIELDS
    }

    fn value(&self, field: FieldName) -> Option<FieldValue> {
        if PREVIEW_FIELDS.contains(&field) {
            self.0.value(field)
        } else {
            None
        }
    }
}

fn filter_page_fields(page: usize) -> &'static [FieldName] {
    if page == 0 {
        &FILTER_FIELDS[..FILTERS_FIRST_PAGE]
    } else {
        &FILTER_FIELDS[FILTERS_FIRST_PAGE..]
    }
}

/// Page navigation row: previous, position, next.
fn pager(page: usize, pages: usize, to_page: impl Fn(usize) -> BotAction) -> Vec<Button> {
    let mut row = Vec::new();
    if page > 0 {
        row.push(Button::new("«", to_page(page - 1).to_string()));
    }
    row.push(Button::inert(format!("{}/{}", page + 1, pages)));
    if page + 1 < pages {
        row.push(Button::new("»", to_page(page + 1).to_string()));
    }
    row
}

impl Bot {
    /// Register the user as a company, then show the filters.
    pub(super) async fn company_start(&self, user_id: i64, session: &mut Session) -> Result<()> {
        let lang = lang(session);
        match self.db().create_company(user_id, &lang).await {
            Ok(id) => {
                info!(user_id, company_id = id, "Company registered");
                self.filters(user_id, session, 0).await
            }
            Err(DatabaseError::Constraint(_)) => {
                self.notify(user_id, &lang, "company_exists").await?;
                self.company_menu(user_id, session).await
            }
            Err(e) => self.persistence_failed(user_id, &lang, e).await,
        }
    }

    async fn company(&self, user_id: i64) -> Result<Option<CompanyRecord>> {
        Ok(self.db().get_company_by_user(user_id).await?)
    }

    pub(super) async fn company_menu(&self, user_id: i64, session: &mut Session) -> Result<()> {
        let Some(company) = self.company(user_id).await? else {
            return self.show_languages(user_id, session).await;
        };
        let lang = lang(session);
        let text = self
            .catalog()
            .text(&lang, "company_menu")
            .replace("%credit%", &company.paid_subscription.to_string());
        let keyboard = self.menu(user_id, &lang, "company_menu");
        self.show(user_id, session, &text, keyboard).await
    }

    // ── Filters ─────────────────────────────────────────────────────

    pub(super) async fn filters(
        &self,
        user_id: i64,
        session: &mut Session,
        page: usize,
    ) -> Result<()> {
        let Some(company) = self.company(user_id).await? else {
            return self.show_languages(user_id, session).await;
        };
        let page = page.min(FILTER_PAGES - 1);
        session.filter_page = page;
        let lang = lang(session);
        let catalog = self.catalog();

        let title = catalog.text(&lang, "filters_title");
        let mut text = render_summary(&company.filter, &title, &lang, catalog, false);
        if company.filter.is_empty() {
            text.push('\n');
            text.push_str(&catalog.text(&lang, "filters_empty"));
        }

        let buttons = filter_page_fields(page)
            .iter()
            .map(|&f| self.field_button(&lang, f, BotAction::Filter(f)))
            .collect();
        let mut keyboard = field_grid(buttons);
        keyboard.push(pager(page, FILTER_PAGES, BotAction::Filters));
        keyboard.extend(self.menu(user_id, &lang, "filters_controls"));

        self.show(user_id, session, &text, keyboard).await
    }

    pub(super) async fn edit_filter(
        &self,
        user_id: i64,
        session: &mut Session,
        field: FieldName,
    ) -> Result<()> {
        let Some(company) = self.company(user_id).await? else {
            return self.show_languages(user_id, session).await;
        };
        self.clear_screen(session).await;
        let mut ctx = WizardContext::company_filter(company.filter, field, &lang(session));
        self.wizard.start(user_id, &mut ctx).await?;
        session.wizard = Some(ctx);
        Ok(())
    }

    pub(super) async fn reset_filters(&self, user_id: i64, session: &mut Session) -> Result<()> {
        let lang = lang(session);
        if let Err(e) = self.db().reset_company_filters(user_id).await {
            return self.persistence_failed(user_id, &lang, e).await;
        }
        info!(user_id, "Company filters reset");
        self.notify(user_id, &lang, "filters_reset").await?;
        let page = session.filter_page;
        self.filters(user_id, session, page).await
    }

    // ── Browsing ────────────────────────────────────────────────────

    /// Show the next unseen driver matching the company's filters.
    ///
    /// Once every match has been seen the viewed list is cleared and the
    /// walk starts over.
    pub(super) async fn browse(&self, user_id: i64, session: &mut Session) -> Result<()> {
        let Some(mut company) = self.company(user_id).await? else {
            return self.show_languages(user_id, session).await;
        };
        let lang = lang(session);

        let mut outcome = next_match(self.db(), &company.filter, &company.excluded_drivers()).await?;
        if outcome == Browse::Exhausted && !company.viewed_drivers.is_empty() {
            self.notify(user_id, &lang, "end_of_list").await?;
            company.viewed_drivers.clear();
            self.db().set_viewed_drivers(company.id, &[]).await?;
            outcome = next_match(self.db(), &company.filter, &company.excluded_drivers()).await?;
        }

        match outcome {
            Browse::Found { driver, remaining } => {
                company.viewed_drivers.push(driver.id);
                self.db()
                    .set_viewed_drivers(company.id, &company.viewed_drivers)
                    .await?;
                debug!(user_id, driver_id = driver.id, remaining, "Showing driver");
                self.show_driver_card(user_id, session, &driver, remaining - 1)
                    .await
            }
            Browse::Exhausted | Browse::NoMatches => {
                self.notify(user_id, &lang, "no_drivers").await?;
                self.company_menu(user_id, session).await
            }
        }
    }

    async fn show_driver_card(
        &self,
        user_id: i64,
        session: &mut Session,
        driver: &DriverRecord,
        others: i64,
    ) -> Result<()> {
        let lang = lang(session);
        let catalog = self.catalog();
        let title = catalog
            .text(&lang, "driver_card")
            .replace("%form_price%", &price_text(driver.form_price))
            .replace("%drivers_count%", &others.max(0).to_string());
        let text = render_summary(&Preview(&driver.profile), &title, &lang, catalog, false);
        let keyboard = with_driver_id(self.menu(user_id, &lang, "browse_controls"), driver.id);
        self.show(user_id, session, &text, keyboard).await
    }

    /// Step back to the driver shown before the current one.
    pub(super) async fn previous_driver(&self, user_id: i64, session: &mut Session) -> Result<()> {
        let Some(company) = self.company(user_id).await? else {
            return self.show_languages(user_id, session).await;
        };
        let lang = lang(session);
        let viewed = &company.viewed_drivers;
        if viewed.len() <= 1 {
            return self.notify(user_id, &lang, "no_previous_driver").await;
        }
        let kept = &viewed[..viewed.len() - 2];
        self.db().set_viewed_drivers(company.id, kept).await?;
        self.browse(user_id, session).await
    }

    pub(super) async fn save_driver(
        &self,
        user_id: i64,
        session: &mut Session,
        driver_id: i64,
    ) -> Result<()> {
        let Some(mut company) = self.company(user_id).await? else {
            return self.show_languages(user_id, session).await;
        };
        let lang = lang(session);
        if company.saved_drivers.contains(&driver_id) {
            return self.notify(user_id, &lang, "already_saved").await;
        }
        company.saved_drivers.push(driver_id);
        if let Err(e) = self
            .db()
            .set_saved_drivers(company.id, &company.saved_drivers)
            .await
        {
            return self.persistence_failed(user_id, &lang, e).await;
        }
        info!(user_id, driver_id, "Driver saved");
        self.notify(user_id, &lang, "driver_saved").await
    }

    // ── Opening forms ───────────────────────────────────────────────

    pub(super) async fn open_driver(
        &self,
        user_id: i64,
        session: &mut Session,
        driver_id: i64,
    ) -> Result<()> {
        let Some(company) = self.company(user_id).await? else {
            return self.show_languages(user_id, session).await;
        };
        let lang = lang(session);
        let Some(driver) = self.db().get_driver(driver_id).await? else {
            return self.notify(user_id, &lang, "driver_not_found").await;
        };

        if company.open_drivers.contains(&driver_id) {
            return self.send_full_form(user_id, &lang, &driver).await;
        }
        if company.paid_subscription > 0 {
            let text = self
                .catalog()
                .text(&lang, "open_confirm")
                .replace("%credit%", &company.paid_subscription.to_string());
            let keyboard = with_driver_id(self.menu(user_id, &lang, "open_confirm"), driver_id);
            return self.show(user_id, session, &text, keyboard).await;
        }
        self.pay_for_driver(user_id, session, &company, &driver).await
    }

    /// Spend one subscription credit on a driver.
    pub(super) async fn open_driver_confirm(
        &self,
        user_id: i64,
        session: &mut Session,
        driver_id: i64,
    ) -> Result<()> {
        let Some(company) = self.company(user_id).await? else {
            return self.show_languages(user_id, session).await;
        };
        let lang = lang(session);
        let Some(driver) = self.db().get_driver(driver_id).await? else {
            return self.notify(user_id, &lang, "driver_not_found").await;
        };
        if company.open_drivers.contains(&driver_id) {
            return self.send_full_form(user_id, &lang, &driver).await;
        }

        if !grant_open(self.db(), company.id, driver_id, true).await? {
            debug!(user_id, driver_id, "No subscription credit left");
            return self.pay_for_driver(user_id, session, &company, &driver).await;
        }
        info!(user_id, driver_id, "Driver opened with subscription credit");
        self.clear_screen(session).await;
        self.send_full_form(user_id, &lang, &driver).await?;
        let notice = self.catalog().text(&driver.lang, "msg_to_driver_after_open");
        if let Err(e) = self.send(driver.user_id, &notice).await {
            error!(driver_id, "Failed to notify driver: {e}");
        }
        self.company_menu(user_id, session).await
    }

    async fn send_full_form(&self, user_id: i64, lang: &str, driver: &DriverRecord) -> Result<()> {
        let title = self.catalog().text(lang, "form_title");
        let text = render_summary(&driver.profile, &title, lang, self.catalog(), false);
        self.send(user_id, &text).await
    }

    pub(super) async fn saved_drivers(&self, user_id: i64, session: &mut Session) -> Result<()> {
        let Some(company) = self.company(user_id).await? else {
            return self.show_languages(user_id, session).await;
        };
        let lang = lang(session);
        let drivers = self.db().get_drivers(&company.saved_drivers).await?;
        if drivers.is_empty() {
            self.notify(user_id, &lang, "no_saved_drivers").await?;
            return self.company_menu(user_id, session).await;
        }

        let catalog = self.catalog();
        for driver in &drivers {
            let title = catalog
                .text(&lang, "saved_driver")
                .replace("%form_price%", &price_text(driver.form_price));
            let text = render_summary(&Preview(&driver.profile), &title, &lang, catalog, false);
            let keyboard = with_driver_id(self.menu(user_id, &lang, "saved_controls"), driver.id);
            self.channel().render(user_id, &text, Some(&keyboard)).await?;
        }
        self.company_menu(user_id, session).await
    }

    pub(super) async fn opened_drivers(
        &self,
        user_id: i64,
        session: &mut Session,
        page: usize,
    ) -> Result<()> {
        let Some(company) = self.company(user_id).await? else {
            return self.show_languages(user_id, session).await;
        };
        let lang = lang(session);
        if company.open_drivers.is_empty() {
            self.notify(user_id, &lang, "no_opened_drivers").await?;
            return self.company_menu(user_id, session).await;
        }

        let pages = company.open_drivers.len().div_ceil(OPENED_PER_PAGE);
        let page = page.min(pages - 1);
        let start = page * OPENED_PER_PAGE;
        let end = (start + OPENED_PER_PAGE).min(company.open_drivers.len());
        let drivers = self.db().get_drivers(&company.open_drivers[start..end]).await?;

        let catalog = self.catalog();
        let title = catalog.text(&lang, "form_title");
        let text = drivers
            .iter()
            .map(|d| render_summary(&d.profile, &title, &lang, catalog, false))
            .collect::<Vec<_>>()
            .join("\n\n");

        let mut keyboard: Keyboard = Vec::new();
        if pages > 1 {
            keyboard.push(pager(page, pages, BotAction::Opened));
        }
        keyboard.push(vec![Button::new(
            catalog.text(&lang, "button_back"),
            BotAction::CompanyMenu.to_string(),
        )]);
        self.show(user_id, session, &text, keyboard).await
    }

    // ── Subscription and payments ───────────────────────────────────

    pub(super) async fn subscription(&self, user_id: i64, session: &mut Session) -> Result<()> {
        let Some(company) = self.company(user_id).await? else {
            return self.show_languages(user_id, session).await;
        };
        let lang = lang(session);
        if company.paid_subscription > 0 {
            let text = self
                .catalog()
                .text(&lang, "subscription_active")
                .replace("%credit%", &company.paid_subscription.to_string());
            return self.send(user_id, &text).await;
        }
        let text = self
            .catalog()
            .text(&lang, "subscription_offer")
            .replace("%amount%", &price_text(Decimal::new(SUBSCRIPTION_AMOUNT, 2)))
            .replace("%credit%", &SUBSCRIPTION_CREDIT.to_string());
        let keyboard = self.menu(user_id, &lang, "subscription_offer");
        self.show(user_id, session, &text, keyboard).await
    }

    pub(super) async fn buy_subscription(&self, user_id: i64, session: &mut Session) -> Result<()> {
        let Some(company) = self.company(user_id).await? else {
            return self.show_languages(user_id, session).await;
        };
        let lang = lang(session);
        let Some(payments) = self.payments_ready(user_id, &lang).await? else {
            return Ok(());
        };
        self.clear_screen(session).await;
        match payments.create_subscription_payment(&company).await {
            Ok(payment) => {
                let reason = self.catalog().text(&lang, "subscription_reason");
                self.send_invoice(user_id, &lang, &payment, &reason).await
            }
            Err(e) => self.payment_failed(user_id, &lang, e).await,
        }
    }

    async fn pay_for_driver(
        &self,
        user_id: i64,
        session: &mut Session,
        company: &CompanyRecord,
        driver: &DriverRecord,
    ) -> Result<()> {
        let lang = lang(session);
        let Some(payments) = self.payments_ready(user_id, &lang).await? else {
            return Ok(());
        };
        self.clear_screen(session).await;
        match payments.create_driver_payment(company, driver).await {
            Ok(payment) => {
                let reason = self
                    .catalog()
                    .text(&lang, "driver_reason")
                    .replace("%id%", &driver.id.to_string());
                self.send_invoice(user_id, &lang, &payment, &reason).await
            }
            Err(e) => self.payment_failed(user_id, &lang, e).await,
        }
    }

    /// The payment service, when one is configured and the company has no
    /// invoice waiting. Tells the user otherwise.
    async fn payments_ready(
        &self,
        user_id: i64,
        lang: &str,
    ) -> Result<Option<&PaymentService>> {
        let Some(payments) = self.deps.payments.as_deref() else {
            self.notify(user_id, lang, "payments_unavailable").await?;
            return Ok(None);
        };
        if self.db().get_pending_payment_for(user_id).await?.is_some() {
            self.notify(user_id, lang, "payment_pending").await?;
            return Ok(None);
        }
        Ok(Some(payments))
    }

    async fn send_invoice(
        &self,
        user_id: i64,
        lang: &str,
        payment: &Payment,
        reason: &str,
    ) -> Result<()> {
        let text = self
            .catalog()
            .text(lang, "payment_invoice")
            .replace("%reason%", reason)
            .replace("%amount%", &price_text(payment.major_amount()))
            .replace("%url%", &payment.invoice_url);
        let keyboard = self.menu(user_id, lang, "payment_controls");
        let message = self.channel().render(user_id, &text, Some(&keyboard)).await?;
        if let Some(payments) = &self.deps.payments
            && let Err(e) = payments.attach_message(payment.id, message).await
        {
            error!(payment_id = %payment.id, "Failed to remember invoice message: {e}");
        }
        Ok(())
    }

    async fn payment_failed(&self, user_id: i64, lang: &str, e: PaymentError) -> Result<()> {
        error!(user_id, "Payment creation failed: {e}");
        self.notify(user_id, lang, "payment_create_error").await
    }

    pub(super) async fn cancel_payment(&self, user_id: i64, session: &mut Session) -> Result<()> {
        let lang = lang(session);
        let text = self.catalog().text(&lang, "payment_cancel_confirmation");
        let keyboard = self.menu(user_id, &lang, "payment_cancel_confirmation");
        self.show(user_id, session, &text, keyboard).await
    }

    pub(super) async fn cancel_payment_confirm(
        &self,
        user_id: i64,
        session: &mut Session,
    ) -> Result<()> {
        let lang = lang(session);
        self.clear_screen(session).await;
        let Some(payments) = self.deps.payments.as_deref() else {
            return self.notify(user_id, &lang, "payments_unavailable").await;
        };
        match payments.cancel(user_id).await {
            Ok(CancelOutcome::Cancelled(payment)) => {
                if let Some(message) = payment.message {
                    self.delete_quietly(&message).await;
                }
                self.notify(user_id, &lang, "payment_cancel_complete").await?;
            }
            Ok(CancelOutcome::AlreadySettled) | Err(PaymentError::NoPending(_)) => {
                self.notify(user_id, &lang, "payment_already_settled").await?;
            }
            Err(e) => {
                error!(user_id, "Payment cancellation failed: {e}");
                self.notify(user_id, &lang, "persistence_error").await?;
            }
        }
        self.company_menu(user_id, session).await
    }

    // ── Profile removal ─────────────────────────────────────────────

    pub(super) async fn remove_profile(&self, user_id: i64, session: &mut Session) -> Result<()> {
        let lang = lang(session);
        let text = self.catalog().text(&lang, "remove_profile_confirm");
        let keyboard = self.menu(user_id, &lang, "remove_profile_confirm");
        self.show(user_id, session, &text, keyboard).await
    }

    pub(super) async fn remove_profile_confirm(
        &self,
        user_id: i64,
        session: &mut Session,
    ) -> Result<()> {
        let lang = lang(session);
        match self.db().delete_company(user_id).await {
            Ok(_) => info!(user_id, "Company profile removed"),
            Err(e) => return self.persistence_failed(user_id, &lang, e).await,
        }
        self.clear_screen(session).await;
        self.notify(user_id, &lang, "profile_removed").await?;
        self.show_roles(user_id, session).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn preview_withholds_contacts() {
        let profile = DriverProfile {
            name: Some("Jan".into()),
            phone_number: Some("48600100200".into()),
            birth_year: Some(1990),
            ..Default::default()
        };
        let preview = Preview(&profile);
        assert_eq!(preview.value(FieldName::Name), None);
        assert_eq!(preview.value(FieldName::PhoneNumber), None);
        assert_eq!(preview.value(FieldName::BirthYear), Some(FieldValue::Int(1990)));
        assert!(!preview.fields().contains(&FieldName::Messangers));
    }

    #[test]
    fn filter_pages_cover_every_filter_once() {
        let mut all: Vec<FieldName> = filter_page_fields(0).to_vec();
        all.extend_from_slice(filter_page_fields(1));
        assert_eq!(all, FILTER_FIELDS.to_vec());
        assert_eq!(filter_page_fields(1).len(), 9);
    }

    #[test]
    fn pager_hides_unreachable_sides() {
        let first = pager(0, 2, BotAction::Filters);
        assert_eq!(first.len(), 2);
        assert_eq!(first[1].action, "@filters:1");
        let last = pager(1, 2, BotAction::Filters);
        assert_eq!(last[0].action, "@filters:0");
        assert_eq!(last[1].text, "2/2");
    }
}
