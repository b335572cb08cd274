//! Configuration types.

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use chrono::{FixedOffset, NaiveDate, Offset, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use secrecy::SecretString;

use crate::error::ConfigError;

/// Bot configuration, read once at startup.
#[derive(Debug, Clone)]
pub struct BotConfig {
    /// Telegram bot token. `None` runs the bot on the local CLI channel.
    pub bot_token: Option<SecretString>,
    /// User ids allowed to see admin-only buttons.
    pub admins: Vec<i64>,
    /// Fixed offset used for "today" in calendars and the year window.
    pub timezone: FixedOffset,
    /// Fallback language for every catalog lookup.
    pub default_lang: String,
    /// Lower bound for expected salary (inclusive).
    pub salary_min: Decimal,
    /// Upper bound for expected salary (inclusive).
    pub salary_max: Decimal,
    /// Starting point for every form price.
    pub base_form_price: Decimal,
    /// Payment provider secret. `None` disables paid flows.
    pub stripe_secret_key: Option<SecretString>,
    pub database_path: PathBuf,
    /// Wipe domain tables at startup.
    pub database_cleanup: bool,
    pub locales_dir: PathBuf,
    pub pricing_rules: PathBuf,
    pub payment_poll_interval: Duration,
    pub log_dir: Option<PathBuf>,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            admins: Vec::new(),
            timezone: Utc.fix(),
            default_lang: "en".to_string(),
            salary_min: dec!(0),
            salary_max: dec!(100000),
            base_form_price: dec!(100),
            stripe_secret_key: None,
            database_path: PathBuf::from("./data/driver-hub.db"),
            database_cleanup: false,
            locales_dir: PathBuf::from("./locales"),
            pricing_rules: PathBuf::from("./data/pricing.json"),
            payment_poll_interval: Duration::from_secs(5),
            log_dir: None,
        }
    }
}

impl BotConfig {
    /// Read configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary variable lookup.
    pub fn from_vars<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| {
            lookup(key)
                .map(|v| v.trim().to_string())
                .filter(|v| !v.is_empty())
        };
        let defaults = Self::default();

        let admins = match get("ADMINS") {
            Some(raw) => raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<i64>().map_err(|e| ConfigError::InvalidValue {
                        key: "ADMINS".into(),
                        message: format!("{s}: {e}"),
                    })
                })
                .collect::<Result<Vec<_>, _>>()?,
            None => Vec::new(),
        };

        let timezone = match get("TIMEZONE_OFFSET_HOURS") {
            Some(raw) => {
                let hours: i32 = parse_value("TIMEZONE_OFFSET_HOURS", &raw)?;
                FixedOffset::east_opt(hours * 3600).ok_or_else(|| ConfigError::InvalidValue {
                    key: "TIMEZONE_OFFSET_HOURS".into(),
                    message: format!("offset out of range: {hours}"),
                })?
            }
            None => defaults.timezone,
        };

        let salary_min = opt_parse(&get, "SALARY_MIN")?.unwrap_or(defaults.salary_min);
        let salary_max = opt_parse(&get, "SALARY_MAX")?.unwrap_or(defaults.salary_max);
        if salary_min > salary_max {
            return Err(ConfigError::InvalidValue {
                key: "SALARY_MIN".into(),
                message: format!("{salary_min} is greater than SALARY_MAX {salary_max}"),
            });
        }

        let poll_secs: u64 = opt_parse(&get, "PAYMENT_POLL_SECS")?.unwrap_or(5);

        Ok(Self {
            bot_token: get("BOT_TOKEN").map(SecretString::from),
            admins,
            timezone,
            default_lang: get("DEFAULT_LANG").unwrap_or(defaults.default_lang),
            salary_min,
            salary_max,
            base_form_price: opt_parse(&get, "BASE_FORM_PRICE")?
                .unwrap_or(defaults.base_form_price),
            stripe_secret_key: get("STRIPE_SECRET_KEY").map(SecretString::from),
            database_path: get("DATABASE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.database_path),
            database_cleanup: get("DATABASE_CLEANUP").is_some_and(|v| v == "1"),
            locales_dir: get("LOCALES_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.locales_dir),
            pricing_rules: get("PRICING_RULES")
                .map(PathBuf::from)
                .unwrap_or(defaults.pricing_rules),
            payment_poll_interval: Duration::from_secs(poll_secs.max(1)),
            log_dir: get("LOG_DIR").map(PathBuf::from),
        })
    }

    /// Today's date in the configured timezone.
    pub fn today(&self) -> NaiveDate {
        Utc::now().with_timezone(&self.timezone).date_naive()
    }

    pub fn is_admin(&self, user_id: i64) -> bool {
        self.admins.contains(&user_id)
    }
}

fn parse_value<T>(key: &str, raw: &str) -> Result<T, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse::<T>().map_err(|e| ConfigError::InvalidValue {
        key: key.to_string(),
        message: format!("{raw}: {e}"),
    })
}

fn opt_parse<T, G>(get: &G, key: &str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    get(key).map(|raw| parse_value(key, &raw)).transpose()
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    fn vars(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn defaults_when_environment_is_empty() {
        let cfg = BotConfig::from_vars(vars(&[])).unwrap();
        assert!(cfg.bot_token.is_none());
        assert_eq!(cfg.default_lang, "en");
        assert_eq!(cfg.payment_poll_interval, Duration::from_secs(5));
        assert!(!cfg.database_cleanup);
    }

    #[test]
    fn reads_all_values() {
        let cfg = BotConfig::from_vars(vars(&[
            ("BOT_TOKEN", " 123:abc "),
            ("ADMINS", "1, 2,3"),
            ("TIMEZONE_OFFSET_HOURS", "2"),
            ("DEFAULT_LANG", "pl"),
            ("SALARY_MIN", "500"),
            ("SALARY_MAX", "5000.5"),
            ("BASE_FORM_PRICE", "49.99"),
            ("DATABASE_CLEANUP", "1"),
            ("PAYMENT_POLL_SECS", "10"),
        ]))
        .unwrap();

        assert_eq!(cfg.bot_token.as_ref().unwrap().expose_secret(), "123:abc");
        assert_eq!(cfg.admins, vec![1, 2, 3]);
        assert!(cfg.is_admin(2));
        assert_eq!(cfg.timezone.local_minus_utc(), 7200);
        assert_eq!(cfg.default_lang, "pl");
        assert_eq!(cfg.salary_min, dec!(500));
        assert_eq!(cfg.salary_max, dec!(5000.5));
        assert_eq!(cfg.base_form_price, dec!(49.99));
        assert!(cfg.database_cleanup);
        assert_eq!(cfg.payment_poll_interval, Duration::from_secs(10));
    }

    #[test]
    fn rejects_inverted_salary_bounds() {
        let err = BotConfig::from_vars(vars(&[("SALARY_MIN", "10"), ("SALARY_MAX", "5")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { key, .. } if key == "SALARY_MIN"));
    }

    #[test]
    fn rejects_garbage_numbers() {
        assert!(BotConfig::from_vars(vars(&[("BASE_FORM_PRICE", "cheap")])).is_err());
        assert!(BotConfig::from_vars(vars(&[("ADMINS", "1,x")])).is_err());
    }
}
