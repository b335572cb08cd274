use std::sync::Arc;
use std::sync::atomic::Ordering;

use anyhow::Context;
use secrecy::{ExposeSecret, SecretString};

use driver_hub::bot::{Bot, BotDeps};
use driver_hub::channels::{CliChannel, TelegramChannel, UiChannel};
use driver_hub::config::BotConfig;
use driver_hub::form::RuleTable;
use driver_hub::localization::Catalog;
use driver_hub::payments::{PaymentPoller, PaymentService, StripeProvider};
use driver_hub::store::{Database, LibSqlBackend};

/// User id the CLI channel acts as.
const CLI_USER_ID: i64 = 1;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = BotConfig::from_env().context("Failed to read configuration")?;

    // Initialize tracing. The guard flushes the file writer on exit.
    let env_filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"))
    };
    let _log_guard = match &config.log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "driver-hub.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_target(false)
                .with_ansi(false)
                .with_writer(writer)
                .init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt()
                .with_env_filter(env_filter())
                .with_target(false)
                .init();
            None
        }
    };

    eprintln!("🚛 Driver Hub v{}", env!("CARGO_PKG_VERSION"));

    // ── Reference data ───────────────────────────────────────────────────
    let catalog = Arc::new(
        Catalog::load_dir(&config.locales_dir, &config.default_lang)
            .context("Failed to load locales")?,
    );
    let rules = Arc::new(RuleTable::load(&config.pricing_rules).context("Failed to load pricing rules")?);
    eprintln!("   Languages: {}", catalog.languages().join(", "));

    // ── Database ─────────────────────────────────────────────────────────
    let db: Arc<dyn Database> = Arc::new(
        LibSqlBackend::new_local(&config.database_path)
            .await
            .with_context(|| format!("Failed to open database at {}", config.database_path.display()))?,
    );
    if config.database_cleanup {
        db.cleanup().await.context("Failed to clean up database")?;
        eprintln!("   Database: cleaned up");
    }
    eprintln!("   Database: {}", config.database_path.display());

    // ── Channel ──────────────────────────────────────────────────────────
    let channel: Arc<dyn UiChannel> = match &config.bot_token {
        Some(token) if !token.expose_secret().is_empty() => {
            eprintln!("   Channel: telegram");
            Arc::new(TelegramChannel::new(SecretString::from(token.expose_secret())))
        }
        _ => {
            eprintln!("   Channel: cli (user {CLI_USER_ID}). /cmd sends a command, !code presses a button.");
            Arc::new(CliChannel::new(CLI_USER_ID, Some(config.default_lang.clone())))
        }
    };

    // ── Payments ─────────────────────────────────────────────────────────
    let (payments, poller) = match &config.stripe_secret_key {
        Some(key) => {
            let provider = Arc::new(StripeProvider::new(SecretString::from(key.expose_secret())));
            let service = Arc::new(PaymentService::new(Arc::clone(&db), provider));
            let poller = PaymentPoller {
                service: Arc::clone(&service),
                db: Arc::clone(&db),
                channel: Arc::clone(&channel),
                catalog: Arc::clone(&catalog),
            };
            let poller = poller.spawn(config.payment_poll_interval);
            eprintln!(
                "   Payments: stripe (polling every {}s)",
                config.payment_poll_interval.as_secs()
            );
            (Some(service), Some(poller))
        }
        None => {
            eprintln!("   Payments: disabled");
            (None, None)
        }
    };

    eprintln!();

    let bot = Bot::new(BotDeps {
        config: Arc::new(config),
        catalog,
        rules,
        db,
        channel,
        payments,
    });
    bot.run().await?;

    // The poller exits on its next tick once the flag is set.
    if let Some((handle, shutdown)) = poller {
        shutdown.store(true, Ordering::Relaxed);
        if let Err(e) = handle.await {
            tracing::warn!("Payment poller ended abnormally: {e}");
        }
    }

    Ok(())
}
