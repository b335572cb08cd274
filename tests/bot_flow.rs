//! End-to-end bot flows over an in-memory database and a recording channel.
//!
//! Drives `Bot::handle_event` the way a chat transport would and checks
//! what reaches the database and the screen.

use std::path::Path;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use chrono::{Duration, Utc};

use driver_hub::bot::{Bot, BotDeps};
use driver_hub::channels::{EventStream, IncomingEvent, Keyboard, MessageRef, UiChannel};
use driver_hub::config::BotConfig;
use driver_hub::error::{ChannelError, ProviderError};
use driver_hub::form::RuleTable;
use driver_hub::localization::Catalog;
use driver_hub::payments::{Invoice, InvoiceRequest, InvoiceStatus, PaymentProvider, PaymentService, PaymentStatus};
use driver_hub::store::{Database, DriverStatus, LibSqlBackend};
use driver_hub::wizard::{Form, StepId};
use rust_decimal_macros::dec;

const DRIVER: i64 = 100;
const COMPANY: i64 = 200;

// ── Recording channel ───────────────────────────────────────────────

#[derive(Debug, Clone)]
struct Sent {
    user_id: i64,
    text: String,
    keyboard: Option<Keyboard>,
    message: MessageRef,
    deleted: bool,
}

#[derive(Default)]
struct RecordingChannel {
    sent: Mutex<Vec<Sent>>,
    next_id: AtomicI64,
}

impl RecordingChannel {
    fn texts(&self, user_id: i64) -> Vec<String> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|s| s.user_id == user_id)
            .map(|s| s.text.clone())
            .collect()
    }

    fn last_text(&self, user_id: i64) -> String {
        self.texts(user_id).pop().unwrap_or_default()
    }

    /// Buttons of the newest message still on screen that has any.
    fn last_keyboard(&self, user_id: i64) -> Keyboard {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|s| s.user_id == user_id && !s.deleted && s.keyboard.is_some())
            .and_then(|s| s.keyboard.clone())
            .unwrap_or_default()
    }

    fn actions(&self, user_id: i64) -> Vec<String> {
        self.last_keyboard(user_id)
            .into_iter()
            .flatten()
            .map(|b| b.action)
            .collect()
    }

    fn has_action(&self, user_id: i64, action: &str) -> bool {
        self.actions(user_id).iter().any(|a| a == action)
    }

    fn find_action(&self, user_id: i64, pred: impl Fn(&str) -> bool) -> String {
        self.actions(user_id)
            .into_iter()
            .find(|a| pred(a))
            .unwrap_or_else(|| panic!("no matching button for user {user_id}"))
    }

    fn update(&self, message: &MessageRef, apply: impl FnOnce(&mut Sent)) -> Result<(), ChannelError> {
        let mut sent = self.sent.lock().unwrap();
        match sent.iter_mut().find(|s| s.message == *message && !s.deleted) {
            Some(entry) => {
                apply(entry);
                Ok(())
            }
            None => Err(ChannelError::SendFailed {
                name: "recording".into(),
                reason: "message is gone".into(),
            }),
        }
    }
}

#[async_trait]
impl UiChannel for RecordingChannel {
    fn name(&self) -> &str {
        "recording"
    }

    async fn start(&self) -> Result<EventStream, ChannelError> {
        Ok(Box::pin(futures::stream::empty()))
    }

    async fn render(
        &self,
        user_id: i64,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<MessageRef, ChannelError> {
        let message = MessageRef {
            chat_id: user_id,
            message_id: self.next_id.fetch_add(1, Ordering::SeqCst) + 1,
        };
        self.sent.lock().unwrap().push(Sent {
            user_id,
            text: text.to_string(),
            keyboard: keyboard.cloned(),
            message,
            deleted: false,
        });
        Ok(message)
    }

    async fn edit_buttons(&self, message: &MessageRef, keyboard: &Keyboard) -> Result<(), ChannelError> {
        self.update(message, |s| s.keyboard = Some(keyboard.clone()))
    }

    async fn edit_message(
        &self,
        message: &MessageRef,
        text: &str,
        keyboard: Option<&Keyboard>,
    ) -> Result<(), ChannelError> {
        self.update(message, |s| {
            s.text = text.to_string();
            s.keyboard = keyboard.cloned();
        })
    }

    async fn delete(&self, message: &MessageRef) -> Result<(), ChannelError> {
        self.update(message, |s| s.deleted = true)
    }
}

// ── Stub provider ───────────────────────────────────────────────────

#[derive(Default)]
struct StubProvider {
    counter: AtomicI64,
    voided: Mutex<Vec<String>>,
}

impl StubProvider {
    fn next(&self, prefix: &str) -> String {
        format!("{prefix}_{}", self.counter.fetch_add(1, Ordering::SeqCst))
    }
}

#[async_trait]
impl PaymentProvider for StubProvider {
    fn name(&self) -> &str {
        "stub"
    }

    async fn create_customer(&self, _description: &str) -> Result<String, ProviderError> {
        Ok(self.next("cus"))
    }

    async fn create_product(&self, _name: &str) -> Result<String, ProviderError> {
        Ok(self.next("prod"))
    }

    async fn create_price(&self, _product_id: &str, _amount: i64) -> Result<String, ProviderError> {
        Ok(self.next("price"))
    }

    async fn deactivate_price(&self, _price_id: &str) -> Result<(), ProviderError> {
        Ok(())
    }

    async fn create_invoice(&self, _request: &InvoiceRequest<'_>) -> Result<Invoice, ProviderError> {
        let id = self.next("in");
        Ok(Invoice {
            url: format!("https://pay.example/{id}"),
            id,
            due_at: Utc::now() + Duration::days(1),
        })
    }

    async fn invoice_status(&self, _invoice_id: &str) -> Result<InvoiceStatus, ProviderError> {
        Ok(InvoiceStatus::Open)
    }

    async fn void_invoice(&self, invoice_id: &str) -> Result<(), ProviderError> {
        self.voided.lock().unwrap().push(invoice_id.to_string());
        Ok(())
    }
}

// ── Setup ───────────────────────────────────────────────────────────

struct Harness {
    bot: Bot,
    channel: Arc<RecordingChannel>,
    db: Arc<dyn Database>,
    catalog: Arc<Catalog>,
    provider: Option<Arc<StubProvider>>,
}

async fn harness(with_payments: bool) -> Harness {
    let root = Path::new(env!("CARGO_MANIFEST_DIR"));
    let catalog = Arc::new(Catalog::load_dir(&root.join("locales"), "en").unwrap());
    let rules = Arc::new(RuleTable::load(&root.join("data/pricing.json")).unwrap());
    let db: Arc<dyn Database> = Arc::new(LibSqlBackend::new_memory().await.unwrap());
    let channel = Arc::new(RecordingChannel::default());

    let (provider, payments) = if with_payments {
        let provider = Arc::new(StubProvider::default());
        let service = Arc::new(PaymentService::new(
            Arc::clone(&db),
            Arc::clone(&provider) as Arc<dyn PaymentProvider>,
        ));
        (Some(provider), Some(service))
    } else {
        (None, None)
    };

    let bot = Bot::new(BotDeps {
        config: Arc::new(BotConfig::default()),
        catalog: Arc::clone(&catalog),
        rules,
        db: Arc::clone(&db),
        channel: Arc::clone(&channel) as Arc<dyn UiChannel>,
        payments,
    });

    Harness {
        bot,
        channel,
        db,
        catalog,
        provider,
    }
}

impl Harness {
    async fn press(&self, user_id: i64, action: &str) {
        self.bot
            .handle_event(IncomingEvent::action(user_id, action))
            .await
            .unwrap();
    }

    async fn type_text(&self, user_id: i64, text: &str) {
        self.bot
            .handle_event(IncomingEvent::text(user_id, text))
            .await
            .unwrap();
    }

    async fn press_all(&self, user_id: i64, actions: &[&str]) {
        for action in actions {
            self.press(user_id, action).await;
        }
    }

    /// Walk the whole registration wizard with plausible answers.
    async fn register_driver(&self, user_id: i64) {
        self.press_all(user_id, &["@lang:en", "@role:driver", "@driver_start"]).await;

        let year = self
            .channel
            .find_action(user_id, |a| a.len() == 4 && a.chars().all(|c| c.is_ascii_digit()));
        self.press(user_id, &year).await;

        self.press_all(user_id, &["telegram", "confirm"]).await;
        self.press_all(user_id, &["B", "C+E", "confirm"]).await;
        self.press_all(user_id, &["cont:europe", "pl", "confirm"]).await;
        self.press(user_id, "citizen").await;
        self.press(user_id, "yes").await;

        let day = self
            .channel
            .find_action(user_id, |a| !a.contains(':') && a.matches('.').count() == 2);
        self.press(user_id, &day).await;

        self.press_all(user_id, &["de:b2", "en:b1", "pl:a2", "confirm"]).await;
        self.press_all(user_id, &["ce:5", "b:3", "c:1", "confirm"]).await;
        self.press(user_id, "no").await;
        self.press_all(user_id, &["cont:europe", "de", "confirm"]).await;
        self.press_all(user_id, &["adr_basic", "confirm"]).await;
        self.type_text(user_id, "3200").await;
        self.press_all(user_id, &["CE", "confirm"]).await;
        self.press_all(user_id, &["cont:europe", "pl"]).await;
        self.press_all(user_id, &["cont:europe", "pl"]).await;
        self.press(user_id, "international").await;
        self.press_all(user_id, &["any", "confirm"]).await;
        self.press(user_id, "solo").await;
        self.press(user_id, "male").await;
        self.type_text(user_id, "+48123456789").await;
        self.type_text(user_id, "Jan Kowalski").await;
        self.press(user_id, "confirm").await;
    }

    async fn register_company(&self, user_id: i64) {
        self.press_all(user_id, &["@lang:en", "@role:company", "@company_start"]).await;
    }
}

// ── Tests ───────────────────────────────────────────────────────────

#[tokio::test]
async fn start_offers_every_language() {
    let h = harness(false).await;
    h.bot
        .handle_event(IncomingEvent::command(DRIVER, "start"))
        .await
        .unwrap();

    assert!(h.channel.has_action(DRIVER, "@lang:en"));
    assert!(h.channel.has_action(DRIVER, "@lang:pl"));
}

#[tokio::test]
async fn platform_language_picks_the_session_language() {
    let h = harness(false).await;
    h.bot
        .handle_event(IncomingEvent::command(DRIVER, "start").with_language("pl"))
        .await
        .unwrap();

    let session = h.bot.sessions().get(DRIVER).await;
    assert_eq!(session.lock().await.lang.as_deref(), Some("pl"));
}

#[tokio::test]
async fn registration_walk_stores_the_driver() {
    let h = harness(false).await;
    h.register_driver(DRIVER).await;

    let driver = h
        .db
        .get_driver_by_user(DRIVER)
        .await
        .unwrap()
        .expect("driver registered");
    assert_eq!(driver.status, DriverStatus::ActivelySeeking);
    assert_eq!(driver.profile.phone_number.as_deref(), Some("48123456789"));
    assert_eq!(driver.profile.name.as_deref(), Some("Jan Kowalski"));
    assert_eq!(
        driver.profile.car_types,
        Some(vec!["B".to_string(), "C+E".to_string()])
    );
    assert_eq!(driver.profile.country_current_live.as_deref(), Some("pl"));
    assert!(driver.form_price > BotConfig::default().base_form_price);

    let registered = h.catalog.text("en", "driver_registered");
    assert!(h.channel.texts(DRIVER).contains(&registered));
    assert!(h.channel.has_action(DRIVER, "@my_form"));
}

#[tokio::test]
async fn typed_text_outside_a_wizard_points_at_the_buttons() {
    let h = harness(false).await;
    h.type_text(DRIVER, "hello").await;

    assert_eq!(h.channel.last_text(DRIVER), h.catalog.text("en", "use_buttons"));
}

#[tokio::test]
async fn text_on_a_button_step_is_ignored() {
    let h = harness(false).await;
    h.press_all(DRIVER, &["@lang:en", "@role:driver", "@driver_start"]).await;

    let before = h.channel.actions(DRIVER);
    h.type_text(DRIVER, "not a year").await;
    assert_eq!(h.channel.actions(DRIVER), before);
    assert!(h.db.get_driver_by_user(DRIVER).await.unwrap().is_none());
}

#[tokio::test]
async fn hidden_driver_is_not_offered_to_companies() {
    let h = harness(false).await;
    h.register_driver(DRIVER).await;
    h.press(DRIVER, "@toggle_status").await;
    let driver = h.db.get_driver_by_user(DRIVER).await.unwrap().unwrap();
    assert_eq!(driver.status, DriverStatus::Hidden);

    h.register_company(COMPANY).await;
    h.press(COMPANY, "@find_driver").await;

    let texts = h.channel.texts(COMPANY);
    assert!(texts.contains(&h.catalog.text("en", "no_drivers")));
}

#[tokio::test]
async fn company_browses_saves_and_opens_with_credit() {
    let h = harness(false).await;
    h.register_driver(DRIVER).await;
    let driver = h.db.get_driver_by_user(DRIVER).await.unwrap().unwrap();

    h.register_company(COMPANY).await;
    let company = h.db.get_company_by_user(COMPANY).await.unwrap().unwrap();

    h.press(COMPANY, "@find_driver").await;
    let open = format!("@open:{}", driver.id);
    assert!(h.channel.has_action(COMPANY, &open));
    // The preview withholds the contact details.
    assert!(!h.channel.last_text(COMPANY).contains("48123456789"));

    h.press(COMPANY, &format!("@save:{}", driver.id)).await;
    let company = h.db.get_company(company.id).await.unwrap().unwrap();
    assert_eq!(company.saved_drivers, vec![driver.id]);

    h.db.add_company_credit(company.id, 2).await.unwrap();
    h.press(COMPANY, &open).await;
    let confirm = format!("@open_yes:{}", driver.id);
    assert!(h.channel.has_action(COMPANY, &confirm));

    h.press(COMPANY, &confirm).await;
    let company = h.db.get_company(company.id).await.unwrap().unwrap();
    assert_eq!(company.open_drivers, vec![driver.id]);
    assert!(company.saved_drivers.is_empty());
    assert_eq!(company.paid_subscription, 1);
    assert!(
        h.channel
            .texts(COMPANY)
            .iter()
            .any(|t| t.contains("48123456789"))
    );

    let driver = h.db.get_driver(driver.id).await.unwrap().unwrap();
    assert_eq!(driver.opens_count, 1);
    let notice = h.catalog.text("en", "msg_to_driver_after_open");
    assert!(h.channel.texts(DRIVER).contains(&notice));
}

#[tokio::test]
async fn paid_open_without_provider_reports_unavailable() {
    let h = harness(false).await;
    h.register_driver(DRIVER).await;
    let driver = h.db.get_driver_by_user(DRIVER).await.unwrap().unwrap();
    h.register_company(COMPANY).await;

    h.press(COMPANY, &format!("@open:{}", driver.id)).await;

    let texts = h.channel.texts(COMPANY);
    assert!(texts.contains(&h.catalog.text("en", "payments_unavailable")));
}

#[tokio::test]
async fn invoice_can_be_cancelled() {
    let h = harness(true).await;
    h.register_driver(DRIVER).await;
    let driver = h.db.get_driver_by_user(DRIVER).await.unwrap().unwrap();
    h.register_company(COMPANY).await;

    h.press(COMPANY, &format!("@open:{}", driver.id)).await;
    let pending = h
        .db
        .get_pending_payment_for(COMPANY)
        .await
        .unwrap()
        .expect("invoice created");
    assert!(h.channel.texts(COMPANY).iter().any(|t| t.contains(&pending.invoice_url)));
    assert!(h.channel.has_action(COMPANY, "@cancel_payment"));

    // A second purchase while one is pending is refused.
    h.press(COMPANY, "@buy_subscription").await;
    assert!(
        h.channel
            .texts(COMPANY)
            .contains(&h.catalog.text("en", "payment_pending"))
    );

    h.press_all(COMPANY, &["@cancel_payment", "@cancel_payment_yes"]).await;

    assert!(h.db.get_pending_payment_for(COMPANY).await.unwrap().is_none());
    let voided = h.provider.as_ref().unwrap().voided.lock().unwrap().clone();
    assert_eq!(voided, vec![pending.invoice_id.clone()]);
    assert!(
        h.channel
            .texts(COMPANY)
            .contains(&h.catalog.text("en", "payment_cancel_complete"))
    );

    let payment = h.db.get_payment(pending.id).await.unwrap().unwrap();
    assert_eq!(payment.status, PaymentStatus::Closed);
}

#[tokio::test]
async fn removing_the_company_returns_to_role_choice() {
    let h = harness(false).await;
    h.register_company(COMPANY).await;
    assert!(h.db.get_company_by_user(COMPANY).await.unwrap().is_some());

    h.press_all(COMPANY, &["@remove_profile", "@remove_profile_yes"]).await;

    assert!(h.db.get_company_by_user(COMPANY).await.unwrap().is_none());
    assert!(h.channel.has_action(COMPANY, "@role:driver"));
}

#[tokio::test]
async fn back_clears_only_the_current_step() {
    let h = harness(false).await;
    h.press_all(DRIVER, &["@lang:en", "@role:driver", "@driver_start"]).await;
    let year = h
        .channel
        .find_action(DRIVER, |a| a.len() == 4 && a.chars().all(|c| c.is_ascii_digit()));
    h.press(DRIVER, &year).await;
    h.press_all(DRIVER, &["telegram", "confirm", "B", "back"]).await;

    let slot = h.bot.sessions().get(DRIVER).await;
    let session = slot.lock().await;
    let ctx = session.wizard.as_ref().expect("wizard still running");
    assert_eq!(ctx.step, StepId::Messangers);
    assert_eq!(ctx.buffers.selection, vec!["telegram".to_string()]);

    let Form::Driver(profile) = &ctx.form else {
        panic!("registration collects a driver profile");
    };
    assert_eq!(profile.birth_year, year.parse().ok());
    assert_eq!(profile.messangers, Some(vec!["telegram".to_string()]));
    assert_eq!(profile.car_types, None);
}

#[tokio::test]
async fn exhausted_list_starts_over() {
    let h = harness(false).await;
    h.register_driver(DRIVER).await;
    let driver = h.db.get_driver_by_user(DRIVER).await.unwrap().unwrap();
    h.register_company(COMPANY).await;

    h.press(COMPANY, "@find_driver").await;
    let company = h.db.get_company_by_user(COMPANY).await.unwrap().unwrap();
    assert_eq!(company.viewed_drivers, vec![driver.id]);

    h.press(COMPANY, "@next_driver").await;

    let end = h.catalog.text("en", "end_of_list");
    assert!(h.channel.texts(COMPANY).contains(&end));
    let company = h.db.get_company(company.id).await.unwrap().unwrap();
    assert_eq!(company.viewed_drivers, vec![driver.id]);
    assert!(h.channel.has_action(COMPANY, &format!("@open:{}", driver.id)));
}

#[tokio::test]
async fn editing_a_field_reprices_and_resets_opens() {
    let h = harness(false).await;
    h.register_driver(DRIVER).await;
    let before = h.db.get_driver_by_user(DRIVER).await.unwrap().unwrap();
    h.db.increment_driver_opens(before.id).await.unwrap();

    // Leaving the edit with back stores nothing.
    h.press_all(DRIVER, &["@edit:car_types", "D", "back"]).await;
    let untouched = h.db.get_driver(before.id).await.unwrap().unwrap();
    assert_eq!(untouched.profile.car_types, before.profile.car_types);
    assert_eq!(untouched.opens_count, 1);
    assert!(h.channel.has_action(DRIVER, "@edit_form"));

    h.press_all(DRIVER, &["@edit:car_types", "D", "confirm"]).await;
    let after = h.db.get_driver(before.id).await.unwrap().unwrap();
    assert_eq!(
        after.profile.car_types,
        Some(vec!["B".to_string(), "C+E".to_string(), "D".to_string()])
    );
    assert_eq!(after.form_price, before.form_price + dec!(15));
    assert_eq!(after.opens_count, 0);
    assert!(
        h.channel
            .texts(DRIVER)
            .contains(&h.catalog.text("en", "field_updated"))
    );
}
