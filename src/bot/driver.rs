//! Driver screens: intro, menu, own form, edits and visibility.

use tracing::{info, warn};

use super::{Bot, BotAction, Session, field_grid, lang, price_text};
use crate::channels::Button;
use crate::error::Result;
use crate::form::{FieldName, render_summary};
use crate::store::DriverStatus;
use crate::wizard::WizardContext;

impl Bot {
    pub(super) async fn show_driver_intro(
        &self,
        user_id: i64,
        session: &mut Session,
    ) -> Result<()> {
        let lang = lang(session);
        let text = self.catalog().text(&lang, "driver_intro");
        let keyboard = self.menu(user_id, &lang, "driver_intro");
        self.show(user_id, session, &text, keyboard).await
    }

    /// Begin registration, or go to the menu of an existing driver.
    pub(super) async fn driver_start(&self, user_id: i64, session: &mut Session) -> Result<()> {
        if self.db().get_driver_by_user(user_id).await?.is_some() {
            return self.driver_menu(user_id, session).await;
        }
        self.clear_screen(session).await;
        let mut ctx = WizardContext::registration(&lang(session));
        self.wizard.start(user_id, &mut ctx).await?;
        session.wizard = Some(ctx);
        Ok(())
    }

    pub(super) async fn driver_menu(&self, user_id: i64, session: &mut Session) -> Result<()> {
        let Some(driver) = self.db().get_driver_by_user(user_id).await? else {
            return self.show_languages(user_id, session).await;
        };
        let lang = lang(session);
        let active = self.db().count_active_drivers().await?;
        let text = self
            .catalog()
            .text(&lang, "driver_menu")
            .replace("%forms_count%", &active.to_string())
            .replace("%form_opens%", &driver.opens_count.to_string());
        let keyboard = self.menu(user_id, &lang, "driver_menu");
        self.show(user_id, session, &text, keyboard).await
    }

    pub(super) async fn my_form(&self, user_id: i64, session: &mut Session) -> Result<()> {
        let Some(driver) = self.db().get_driver_by_user(user_id).await? else {
            return self.show_languages(user_id, session).await;
        };
        let lang = lang(session);
        let catalog = self.catalog();

        let status_key = match driver.status {
            DriverStatus::ActivelySeeking => "form_status_active",
            DriverStatus::Hidden => "form_status_hidden",
        };
        let title = catalog.text(&lang, "my_form_title");
        let mut text = render_summary(&driver.profile, &title, &lang, catalog, false);
        text.push_str("\n\n");
        text.push_str(
            &catalog
                .text(&lang, "form_price_line")
                .replace("%form_price%", &price_text(driver.form_price)),
        );
        text.push('\n');
        text.push_str(&catalog.text(&lang, status_key));

        let keyboard = self.menu(user_id, &lang, "my_form");
        self.show(user_id, session, &text, keyboard).await
    }

    pub(super) async fn edit_form(&self, user_id: i64, session: &mut Session) -> Result<()> {
        let lang = lang(session);
        let buttons = FieldName::ALL
            .iter()
            .map(|&f| self.field_button(&lang, f, BotAction::EditField(f)))
            .collect();
        let mut keyboard = field_grid(buttons);
        keyboard.push(vec![Button::new(
            self.catalog().text(&lang, "button_back"),
            BotAction::MyForm.to_string(),
        )]);

        let text = self.catalog().text(&lang, "choose_field");
        self.show(user_id, session, &text, keyboard).await
    }

    pub(super) async fn edit_field(
        &self,
        user_id: i64,
        session: &mut Session,
        field: FieldName,
    ) -> Result<()> {
        let Some(driver) = self.db().get_driver_by_user(user_id).await? else {
            return self.show_languages(user_id, session).await;
        };
        self.clear_screen(session).await;
        let mut ctx = WizardContext::edit_field(driver.profile, field, &lang(session));
        self.wizard.start(user_id, &mut ctx).await?;
        session.wizard = Some(ctx);
        Ok(())
    }

    pub(super) async fn reset_form(&self, user_id: i64, session: &mut Session) -> Result<()> {
        let lang = lang(session);
        let text = self.catalog().text(&lang, "reset_form_confirm");
        let keyboard = self.menu(user_id, &lang, "reset_form_confirm");
        self.show(user_id, session, &text, keyboard).await
    }

    /// Delete the driver and send them back to the role choice.
    pub(super) async fn reset_form_confirm(
        &self,
        user_id: i64,
        session: &mut Session,
    ) -> Result<()> {
        let lang = lang(session);
        match self.db().delete_driver(user_id).await {
            Ok(true) => info!(user_id, "Driver form deleted"),
            Ok(false) => warn!(user_id, "No driver form to delete"),
            Err(e) => return self.persistence_failed(user_id, &lang, e).await,
        }
        self.clear_screen(session).await;
        self.notify(user_id, &lang, "form_deleted").await?;
        self.show_roles(user_id, session).await
    }

    pub(super) async fn toggle_status(&self, user_id: i64, session: &mut Session) -> Result<()> {
        let Some(driver) = self.db().get_driver_by_user(user_id).await? else {
            return self.show_languages(user_id, session).await;
        };
        let lang = lang(session);
        let status = driver.status.toggled();
        if let Err(e) = self.db().set_driver_status(user_id, status).await {
            return self.persistence_failed(user_id, &lang, e).await;
        }
        info!(user_id, status = ?status, "Driver visibility changed");

        let key = match status {
            DriverStatus::ActivelySeeking => "form_status_active",
            DriverStatus::Hidden => "form_status_hidden",
        };
        self.notify(user_id, &lang, key).await?;
        self.driver_menu(user_id, session).await
    }
}
