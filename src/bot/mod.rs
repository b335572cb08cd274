//! Screen router around the wizard: entry, menus, browsing and payments.
//!
//! `Bot::run` consumes the channel's event stream and handles events one
//! at a time. Each event locks the user's session, then either feeds the
//! running wizard or dispatches a menu action.

pub mod action;
mod company;
mod driver;
pub mod session;

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use rust_decimal::Decimal;
use tracing::{debug, error, info};

use crate::channels::{Button, EventKind, IncomingEvent, Keyboard, MessageRef, UiChannel};
use crate::config::BotConfig;
use crate::error::{DatabaseError, Result};
use crate::form::{FieldName, RuleTable};
use crate::localization::Catalog;
use crate::payments::PaymentService;
use crate::store::Database;
use crate::wizard::{Mode, WizardController, WizardInput, WizardOutcome};

pub use action::{BotAction, Command, Role};
pub use session::{Session, SessionStore};

/// How long an untouched session is kept in memory.
const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

const SESSION_PRUNE_INTERVAL: Duration = Duration::from_secs(600);

/// Shared collaborators of the router.
///
/// Bundles the shared components to reduce argument count.
pub struct BotDeps {
    pub config: Arc<BotConfig>,
    pub catalog: Arc<Catalog>,
    pub rules: Arc<RuleTable>,
    pub db: Arc<dyn Database>,
    pub channel: Arc<dyn UiChannel>,
    /// `None` when no payment provider is configured.
    pub payments: Option<Arc<PaymentService>>,
}

/// The chat bot: session store, wizard controller and menu screens.
pub struct Bot {
    deps: BotDeps,
    wizard: WizardController,
    sessions: Arc<SessionStore>,
}

impl Bot {
    pub fn new(deps: BotDeps) -> Self {
        let wizard = WizardController::new(
            Arc::clone(&deps.catalog),
            Arc::clone(&deps.rules),
            Arc::clone(&deps.config),
            Arc::clone(&deps.db),
            Arc::clone(&deps.channel),
            deps.payments.clone(),
        );
        Self {
            deps,
            wizard,
            sessions: Arc::new(SessionStore::new()),
        }
    }

    // ── Convenience accessors ───────────────────────────────────────

    fn db(&self) -> &dyn Database {
        self.deps.db.as_ref()
    }

    fn catalog(&self) -> &Catalog {
        &self.deps.catalog
    }

    fn channel(&self) -> &dyn UiChannel {
        self.deps.channel.as_ref()
    }

    pub fn sessions(&self) -> &SessionStore {
        &self.sessions
    }

    // ── Main loop ───────────────────────────────────────────────────

    /// Run until Ctrl+C or until the channel stream ends.
    pub async fn run(self) -> Result<()> {
        let mut events = self.channel().start().await?;

        let sessions = Arc::clone(&self.sessions);
        let pruning_handle = tokio::spawn(async move {
            let mut interval = tokio::time::interval(SESSION_PRUNE_INTERVAL);
            interval.tick().await; // Skip immediate first tick
            loop {
                interval.tick().await;
                sessions.prune_stale(SESSION_IDLE_TIMEOUT).await;
            }
        });

        info!("Bot ready on {} channel", self.channel().name());

        loop {
            let event = tokio::select! {
                biased;
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl+C received, shutting down...");
                    break;
                }
                event = events.next() => match event {
                    Some(e) => e,
                    None => {
                        info!("Channel stream ended, shutting down...");
                        break;
                    }
                }
            };

            let user_id = event.user_id;
            if let Err(e) = self.handle_event(event).await {
                error!(user_id, "Error handling event: {e}");
            }
        }

        pruning_handle.abort();
        Ok(())
    }

    // ── Event dispatch ──────────────────────────────────────────────

    /// Handle one inbound event under the user's session lock.
    pub async fn handle_event(&self, event: IncomingEvent) -> Result<()> {
        let user_id = event.user_id;
        debug!(user_id, kind = ?event.kind, "Handler called");

        let slot = self.sessions.get(user_id).await;
        let mut session = slot.lock().await;
        session.touch();
        if session.lang.is_none() {
            session.lang = Some(self.initial_lang(user_id, event.language_code.as_deref()).await?);
        }

        match event.kind {
            EventKind::Command(name) => match Command::parse(&name) {
                Command::Start => self.start(user_id, &mut session).await,
                Command::Support => self.support(user_id, &session).await,
                Command::Unknown(name) => {
                    debug!(user_id, command = %name, "Unknown command");
                    self.notify(user_id, &lang(&session), "unknown_command").await
                }
            },
            EventKind::Text(text) => {
                if session.wizard.is_some() {
                    self.drive_wizard(user_id, &mut session, WizardInput::Text(text))
                        .await
                } else {
                    self.notify(user_id, &lang(&session), "use_buttons").await
                }
            }
            EventKind::Action { data, .. } => {
                if let Some(action) = BotAction::parse(&data) {
                    self.abandon_wizard(&mut session).await;
                    self.dispatch(user_id, &mut session, action).await
                } else if session.wizard.is_some() {
                    self.drive_wizard(user_id, &mut session, WizardInput::Action(data))
                        .await
                } else {
                    debug!(user_id, data = %data, "Ignoring stale action");
                    Ok(())
                }
            }
        }
    }

    async fn dispatch(&self, user_id: i64, session: &mut Session, action: BotAction) -> Result<()> {
        debug!(user_id, action = %action, "Menu action");
        match action {
            BotAction::Lang(code) => self.choose_lang(user_id, session, &code).await,
            BotAction::Role(role) => self.choose_role(user_id, session, role).await,
            BotAction::Support => self.support(user_id, session).await,
            BotAction::Stats => self.stats(user_id, session).await,
            BotAction::ChangeLang => self.show_languages(user_id, session).await,

            BotAction::DriverStart => self.driver_start(user_id, session).await,
            BotAction::DriverMenu => self.driver_menu(user_id, session).await,
            BotAction::MyForm => self.my_form(user_id, session).await,
            BotAction::EditForm => self.edit_form(user_id, session).await,
            BotAction::EditField(field) => self.edit_field(user_id, session, field).await,
            BotAction::ResetForm => self.reset_form(user_id, session).await,
            BotAction::ResetFormConfirm => self.reset_form_confirm(user_id, session).await,
            BotAction::ToggleStatus => self.toggle_status(user_id, session).await,

            BotAction::CompanyStart => self.company_start(user_id, session).await,
            BotAction::CompanyMenu => self.company_menu(user_id, session).await,
            BotAction::Filters(page) => self.filters(user_id, session, page).await,
            BotAction::Filter(field) => self.edit_filter(user_id, session, field).await,
            BotAction::ResetFilters => self.reset_filters(user_id, session).await,
            BotAction::FindDriver | BotAction::NextDriver => {
                self.browse(user_id, session).await
            }
            BotAction::PrevDriver => self.previous_driver(user_id, session).await,
            BotAction::SaveDriver(id) => self.save_driver(user_id, session, id).await,
            BotAction::OpenDriver(id) => self.open_driver(user_id, session, id).await,
            BotAction::OpenConfirm(id) => self.open_driver_confirm(user_id, session, id).await,
            BotAction::Saved => self.saved_drivers(user_id, session).await,
            BotAction::Opened(page) => self.opened_drivers(user_id, session, page).await,
            BotAction::Subscription => self.subscription(user_id, session).await,
            BotAction::BuySubscription => self.buy_subscription(user_id, session).await,
            BotAction::CancelPayment => self.cancel_payment(user_id, session).await,
            BotAction::CancelPaymentConfirm => self.cancel_payment_confirm(user_id, session).await,
            BotAction::KeepPayment => {
                self.clear_screen(session).await;
                Ok(())
            }
            BotAction::RemoveProfile => self.remove_profile(user_id, session).await,
            BotAction::RemoveProfileConfirm => {
                self.remove_profile_confirm(user_id, session).await
            }
        }
    }

    // ── Wizard ──────────────────────────────────────────────────────

    async fn drive_wizard(
        &self,
        user_id: i64,
        session: &mut Session,
        input: WizardInput,
    ) -> Result<()> {
        let Some(mut ctx) = session.wizard.take() else {
            return Ok(());
        };
        let outcome = match self.wizard.handle(user_id, &mut ctx, &input).await {
            Ok(outcome) => outcome,
            Err(e) => {
                session.wizard = Some(ctx);
                return Err(e);
            }
        };
        let lang = ctx.lang.clone();

        match outcome {
            WizardOutcome::Active => {
                session.wizard = Some(ctx);
                Ok(())
            }
            WizardOutcome::Left => match ctx.mode {
                Mode::Registration => self.show_driver_intro(user_id, session).await,
                Mode::EditField => self.my_form(user_id, session).await,
                Mode::CompanyFilter => {
                    let page = session.filter_page;
                    self.filters(user_id, session, page).await
                }
            },
            WizardOutcome::Registered { driver_id, price } => {
                info!(user_id, driver_id, price = %price, "Registration finished");
                self.notify(user_id, &lang, "driver_registered").await?;
                self.driver_menu(user_id, session).await
            }
            WizardOutcome::FieldUpdated(_) => {
                self.notify(user_id, &lang, "field_updated").await?;
                self.my_form(user_id, session).await
            }
            WizardOutcome::FilterUpdated(_) => {
                let page = session.filter_page;
                self.filters(user_id, session, page).await
            }
        }
    }

    /// Drop a running wizard and its prompt.
    async fn abandon_wizard(&self, session: &mut Session) {
        if let Some(ctx) = session.wizard.take() {
            debug!(step = ?ctx.step, "Wizard abandoned");
            if let Some(message) = ctx.message {
                self.delete_quietly(&message).await;
            }
        }
    }

    // ── Entry ───────────────────────────────────────────────────────

    async fn initial_lang(&self, user_id: i64, reported: Option<&str>) -> Result<String> {
        if let Some(driver) = self.db().get_driver_by_user(user_id).await? {
            return Ok(driver.lang);
        }
        if let Some(company) = self.db().get_company_by_user(user_id).await? {
            return Ok(company.lang);
        }
        let catalog = self.catalog();
        Ok(catalog.resolve_lang(reported.unwrap_or_default()).to_string())
    }

    async fn start(&self, user_id: i64, session: &mut Session) -> Result<()> {
        self.abandon_wizard(session).await;
        if self.db().get_driver_by_user(user_id).await?.is_some() {
            return self.driver_menu(user_id, session).await;
        }
        if self.db().get_company_by_user(user_id).await?.is_some() {
            return self.company_menu(user_id, session).await;
        }
        self.show_languages(user_id, session).await
    }

    async fn show_languages(&self, user_id: i64, session: &mut Session) -> Result<()> {
        let catalog = self.catalog();
        let keyboard: Keyboard = catalog
            .languages()
            .into_iter()
            .map(|code| {
                vec![Button::new(
                    catalog.text(code, "language_name"),
                    BotAction::Lang(code.to_string()).to_string(),
                )]
            })
            .collect();
        let text = catalog.text(&lang(session), "choose_lang");
        self.show(user_id, session, &text, keyboard).await
    }

    async fn choose_lang(&self, user_id: i64, session: &mut Session, code: &str) -> Result<()> {
        let code = self.catalog().resolve_lang(code).to_string();
        session.lang = Some(code.clone());

        if self.db().get_driver_by_user(user_id).await?.is_some() {
            self.db().set_driver_lang(user_id, &code).await?;
            info!(user_id, lang = %code, "Driver language changed");
            self.notify(user_id, &code, "lang_changed").await?;
            return self.driver_menu(user_id, session).await;
        }
        if self.db().get_company_by_user(user_id).await?.is_some() {
            self.db().set_company_lang(user_id, &code).await?;
            info!(user_id, lang = %code, "Company language changed");
            self.notify(user_id, &code, "lang_changed").await?;
            return self.company_menu(user_id, session).await;
        }
        self.show_roles(user_id, session).await
    }

    async fn show_roles(&self, user_id: i64, session: &mut Session) -> Result<()> {
        let lang = lang(session);
        let text = self.catalog().text(&lang, "choose_role");
        let keyboard = self.menu(user_id, &lang, "choose_role");
        self.show(user_id, session, &text, keyboard).await
    }

    async fn choose_role(&self, user_id: i64, session: &mut Session, role: Role) -> Result<()> {
        match role {
            Role::Driver => {
                if self.db().get_driver_by_user(user_id).await?.is_some() {
                    return self.driver_menu(user_id, session).await;
                }
                self.show_driver_intro(user_id, session).await
            }
            Role::Company => {
                if self.db().get_company_by_user(user_id).await?.is_some() {
                    return self.company_menu(user_id, session).await;
                }
                let lang = lang(session);
                let text = self.catalog().text(&lang, "company_intro");
                let keyboard = self.menu(user_id, &lang, "company_intro");
                self.show(user_id, session, &text, keyboard).await
            }
        }
    }

    async fn support(&self, user_id: i64, session: &Session) -> Result<()> {
        self.notify(user_id, &lang(session), "support").await
    }

    async fn stats(&self, user_id: i64, session: &Session) -> Result<()> {
        if !self.deps.config.is_admin(user_id) {
            debug!(user_id, "Stats requested by non-admin");
            return Ok(());
        }
        let forms = self.db().count_active_drivers().await?;
        let sessions = self.sessions.len().await;
        let text = self
            .catalog()
            .text(&lang(session), "admin_stats")
            .replace("%forms_count%", &forms.to_string())
            .replace("%sessions%", &sessions.to_string());
        self.send(user_id, &text).await
    }

    // ── Screen helpers ──────────────────────────────────────────────

    /// Menu markup resolved for this viewer.
    fn menu(&self, user_id: i64, lang: &str, key: &str) -> Keyboard {
        self.catalog()
            .markup_for(lang, key, self.deps.config.is_admin(user_id))
    }

    /// Replace the current screen with a new one.
    async fn show(
        &self,
        user_id: i64,
        session: &mut Session,
        text: &str,
        keyboard: Keyboard,
    ) -> Result<()> {
        self.clear_screen(session).await;
        let message = self.channel().render(user_id, text, Some(&keyboard)).await?;
        session.screen = Some(message);
        Ok(())
    }

    async fn clear_screen(&self, session: &mut Session) {
        if let Some(message) = session.screen.take() {
            self.delete_quietly(&message).await;
        }
    }

    async fn delete_quietly(&self, message: &MessageRef) {
        if let Err(e) = self.channel().delete(message).await {
            debug!("Message already gone: {e}");
        }
    }

    /// Send a localized notice.
    async fn notify(&self, user_id: i64, lang: &str, key: &str) -> Result<()> {
        let text = self.catalog().text(lang, key);
        self.send(user_id, &text).await
    }

    async fn send(&self, user_id: i64, text: &str) -> Result<()> {
        self.channel().render(user_id, text, None).await?;
        Ok(())
    }

    /// Log a store failure and tell the user in generic terms.
    async fn persistence_failed(&self, user_id: i64, lang: &str, e: DatabaseError) -> Result<()> {
        error!(user_id, "Store operation failed: {e}");
        self.notify(user_id, lang, "persistence_error").await
    }

    /// Button label for a field, without the summary colon.
    fn field_button(&self, lang: &str, field: FieldName, action: BotAction) -> Button {
        let label = self.catalog().label(lang, field.as_str());
        Button::new(label.trim_end_matches(':').trim(), action.to_string())
    }
}

/// Session language, falling back to English before anything is known.
fn lang(session: &Session) -> String {
    session.lang.clone().unwrap_or_else(|| "en".to_string())
}

/// Price as shown to users.
fn price_text(price: Decimal) -> String {
    price.round_dp(2).normalize().to_string()
}

/// Replace the driver id placeholder in every action of a markup.
fn with_driver_id(keyboard: Keyboard, driver_id: i64) -> Keyboard {
    let id = driver_id.to_string();
    keyboard
        .into_iter()
        .map(|row| {
            row.into_iter()
                .map(|b| Button::new(b.text, b.action.replace(action::ID_PLACEHOLDER, &id)))
                .collect()
        })
        .collect()
}

/// Fields laid out two per row as menu buttons.
fn field_grid(buttons: Vec<Button>) -> Keyboard {
    buttons.chunks(2).map(<[Button]>::to_vec).collect()
}
