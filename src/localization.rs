//! Locale catalogs: message texts, button markups, summary labels,
//! calendar names and the country catalog grouped by continent.
//!
//! One JSON file per language (`<lang>.json`) in the locales directory.
//! Every lookup falls back to the default language when the requested
//! language or key is absent.

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;
use tracing::{info, warn};

use crate::channels::{Button, Keyboard};
use crate::error::LocalizationError;

/// Prefix marking buttons visible only to admins.
pub const ADMIN_ONLY_PREFIX: &str = "&a|";

#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
enum MessageText {
    Line(String),
    Lines(Vec<String>),
}

impl MessageText {
    fn joined(&self) -> String {
        match self {
            MessageText::Line(s) => s.clone(),
            MessageText::Lines(lines) => lines.join("\n"),
        }
    }
}

/// One country entry: display label and 2-letter code.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Country {
    pub text: String,
    pub code: String,
}

/// A continent with its ordered country list.
#[derive(Debug, Clone, Deserialize)]
pub struct Continent {
    pub key: String,
    pub label: String,
    pub countries: Vec<Country>,
}

#[derive(Debug, Clone, Default, Deserialize)]
struct CalendarNames {
    #[serde(default)]
    weekdays: Vec<String>,
    #[serde(default)]
    months: Vec<String>,
}

/// A single language's catalog.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Locale {
    #[serde(default)]
    messages: HashMap<String, MessageText>,
    #[serde(default)]
    markups: HashMap<String, Keyboard>,
    #[serde(default)]
    labels: HashMap<String, String>,
    #[serde(default)]
    calendar: CalendarNames,
    #[serde(default)]
    continents: Vec<Continent>,
}

impl Locale {
    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }
}

/// All loaded locales plus the default language.
#[derive(Debug, Clone)]
pub struct Catalog {
    locales: HashMap<String, Locale>,
    default_lang: String,
}

impl Catalog {
    /// Build a catalog from already-parsed locales.
    pub fn new(
        locales: HashMap<String, Locale>,
        default_lang: &str,
    ) -> Result<Self, LocalizationError> {
        if !locales.contains_key(default_lang) {
            return Err(LocalizationError::MissingDefault(default_lang.to_string()));
        }
        Ok(Self {
            locales,
            default_lang: default_lang.to_string(),
        })
    }

    /// Load every `<lang>.json` file in `dir`.
    pub fn load_dir(dir: &Path, default_lang: &str) -> Result<Self, LocalizationError> {
        let entries = std::fs::read_dir(dir).map_err(|e| LocalizationError::Read {
            path: dir.display().to_string(),
            reason: e.to_string(),
        })?;

        let mut locales = HashMap::new();
        for entry in entries.flatten() {
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let Some(lang) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let raw = std::fs::read_to_string(&path).map_err(|e| LocalizationError::Read {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            let locale = Locale::from_json(&raw).map_err(|e| LocalizationError::Parse {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
            locales.insert(lang.to_string(), locale);
        }

        info!(count = locales.len(), dir = %dir.display(), "Locales loaded");
        Self::new(locales, default_lang)
    }

    pub fn default_lang(&self) -> &str {
        &self.default_lang
    }

    /// Resolve a requested language to one that is loaded.
    pub fn resolve_lang<'a>(&'a self, lang: &'a str) -> &'a str {
        if self.locales.contains_key(lang) {
            lang
        } else {
            &self.default_lang
        }
    }

    /// Codes of every loaded language, sorted.
    pub fn languages(&self) -> Vec<&str> {
        let mut langs: Vec<&str> = self.locales.keys().map(String::as_str).collect();
        langs.sort_unstable();
        langs
    }

    fn locale(&self, lang: &str) -> &Locale {
        self.locales
            .get(lang)
            .or_else(|| self.locales.get(&self.default_lang))
            .unwrap_or_else(|| empty_locale())
    }

    fn default_locale(&self) -> &Locale {
        self.locale(&self.default_lang)
    }

    /// Message text by key. Missing keys render as the key itself.
    pub fn text(&self, lang: &str, key: &str) -> String {
        if let Some(msg) = self.locale(lang).messages.get(key) {
            return msg.joined();
        }
        if let Some(msg) = self.default_locale().messages.get(key) {
            return msg.joined();
        }
        warn!(lang, key, "Missing message key");
        key.to_string()
    }

    /// Button rows for a markup key.
    pub fn markup(&self, lang: &str, key: &str) -> Keyboard {
        self.locale(lang)
            .markups
            .get(key)
            .or_else(|| self.default_locale().markups.get(key))
            .cloned()
            .unwrap_or_else(|| {
                warn!(lang, key, "Missing markup key");
                Vec::new()
            })
    }

    /// Button rows with admin-only buttons resolved for this viewer.
    pub fn markup_for(&self, lang: &str, key: &str, is_admin: bool) -> Keyboard {
        self.markup(lang, key)
            .into_iter()
            .map(|row| {
                row.into_iter()
                    .filter_map(|b| match b.action.strip_prefix(ADMIN_ONLY_PREFIX) {
                        Some(action) if is_admin => Some(Button::new(b.text, action)),
                        Some(_) => None,
                        None => Some(b),
                    })
                    .collect::<Vec<_>>()
            })
            .filter(|row| !row.is_empty())
            .collect()
    }

    /// Flat ordered `(label, action)` list for a markup key.
    pub fn buttons(&self, lang: &str, key: &str) -> Vec<(String, String)> {
        self.markup(lang, key)
            .into_iter()
            .flatten()
            .map(|b| (b.text, b.action))
            .collect()
    }

    /// Label of a coded value inside a markup.
    pub fn code_label(&self, lang: &str, markup_key: &str, code: &str) -> Option<String> {
        self.markup(lang, markup_key)
            .into_iter()
            .flatten()
            .find(|b| b.action == code)
            .map(|b| b.text)
    }

    /// Summary label for a field.
    pub fn label(&self, lang: &str, field: &str) -> String {
        self.locale(lang)
            .labels
            .get(field)
            .or_else(|| self.default_locale().labels.get(field))
            .cloned()
            .unwrap_or_else(|| field.to_string())
    }

    pub fn continents(&self, lang: &str) -> &[Continent] {
        let own = &self.locale(lang).continents;
        if own.is_empty() {
            &self.default_locale().continents
        } else {
            own
        }
    }

    pub fn continent(&self, lang: &str, key: &str) -> Option<&Continent> {
        self.continents(lang).iter().find(|c| c.key == key)
    }

    /// Display label of a country code, searched across all continents.
    pub fn country_label(&self, lang: &str, code: &str) -> Option<String> {
        self.continents(lang)
            .iter()
            .flat_map(|c| c.countries.iter())
            .find(|c| c.code == code)
            .map(|c| c.text.clone())
    }

    /// Continent key holding `code` in the default-language catalog.
    pub fn continent_of(&self, code: &str) -> Option<&str> {
        self.default_locale()
            .continents
            .iter()
            .find(|c| c.countries.iter().any(|country| country.code == code))
            .map(|c| c.key.as_str())
    }

    pub fn weekdays(&self, lang: &str) -> Vec<String> {
        let own = &self.locale(lang).calendar.weekdays;
        if own.len() == 7 {
            own.clone()
        } else {
            self.default_locale().calendar.weekdays.clone()
        }
    }

    /// Month name for 1-based `month`.
    pub fn month_name(&self, lang: &str, month: u32) -> String {
        let idx = month.saturating_sub(1) as usize;
        self.locale(lang)
            .calendar
            .months
            .get(idx)
            .or_else(|| self.default_locale().calendar.months.get(idx))
            .cloned()
            .unwrap_or_else(|| month.to_string())
    }
}

fn empty_locale() -> &'static Locale {
    static EMPTY: std::sync::OnceLock<Locale> = std::sync::OnceLock::new();
    EMPTY.get_or_init(Locale::default)
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    /// Catalog built from the bundled English locale.
    pub fn bundled_catalog() -> Catalog {
        let en = Locale::from_json(include_str!("../locales/en.json")).unwrap();
        let mut locales = HashMap::new();
        locales.insert("en".to_string(), en);
        Catalog::new(locales, "en").unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PL: &str = r#"{
        "messages": {"hello": ["Cześć", "świecie"]},
        "markups": {"yes_no": [[{"text": "Tak", "action": "yes"}, {"text": "Nie", "action": "no"}]]},
        "labels": {"name": "Imię:"}
    }"#;

    const EN: &str = r#"{
        "messages": {"hello": "Hello", "only_en": "English only"},
        "markups": {
            "yes_no": [[{"text": "Yes", "action": "yes"}, {"text": "No", "action": "no"}]],
            "roles": [[{"text": "Driver", "action": "driver"}], [{"text": "Admin", "action": "&a|admin_panel"}]]
        },
        "labels": {"name": "Name:"},
        "calendar": {"weekdays": ["Mo","Tu","We","Th","Fr","Sa","Su"], "months": ["January","February"]},
        "continents": [
            {"key": "europe", "label": "Europe", "countries": [{"text": "Poland", "code": "pl"}, {"text": "Germany", "code": "de"}]},
            {"key": "asia", "label": "Asia", "countries": [{"text": "Georgia", "code": "ge"}]}
        ]
    }"#;

    fn catalog() -> Catalog {
        let mut locales = HashMap::new();
        locales.insert("en".to_string(), Locale::from_json(EN).unwrap());
        locales.insert("pl".to_string(), Locale::from_json(PL).unwrap());
        Catalog::new(locales, "en").unwrap()
    }

    #[test]
    fn text_joins_lines_and_falls_back() {
        let c = catalog();
        assert_eq!(c.text("pl", "hello"), "Cześć\nświecie");
        assert_eq!(c.text("pl", "only_en"), "English only");
        assert_eq!(c.text("de", "hello"), "Hello");
        assert_eq!(c.text("en", "nope"), "nope");
    }

    #[test]
    fn buttons_keep_order() {
        let c = catalog();
        assert_eq!(
            c.buttons("pl", "yes_no"),
            vec![
                ("Tak".to_string(), "yes".to_string()),
                ("Nie".to_string(), "no".to_string())
            ]
        );
    }

    #[test]
    fn admin_buttons_hidden_for_regular_users() {
        let c = catalog();
        let regular = c.markup_for("en", "roles", false);
        assert_eq!(regular.len(), 1);
        let admin = c.markup_for("en", "roles", true);
        assert_eq!(admin[1][0].action, "admin_panel");
    }

    #[test]
    fn countries_fall_back_to_default_catalog() {
        let c = catalog();
        assert_eq!(c.country_label("pl", "de").as_deref(), Some("Germany"));
        assert_eq!(c.continent_of("ge"), Some("asia"));
        assert_eq!(c.continent_of("zz"), None);
    }

    #[test]
    fn calendar_names() {
        let c = catalog();
        assert_eq!(c.weekdays("pl").len(), 7);
        assert_eq!(c.month_name("pl", 2), "February");
        assert_eq!(c.month_name("en", 11), "11");
    }

    #[test]
    fn missing_default_is_rejected() {
        let mut locales = HashMap::new();
        locales.insert("pl".to_string(), Locale::from_json(PL).unwrap());
        assert!(matches!(
            Catalog::new(locales, "en"),
            Err(LocalizationError::MissingDefault(_))
        ));
    }

    #[test]
    fn load_dir_reads_json_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("en.json"), EN).unwrap();
        std::fs::write(dir.path().join("pl.json"), PL).unwrap();
        std::fs::write(dir.path().join("README.txt"), "ignored").unwrap();

        let c = Catalog::load_dir(dir.path(), "en").unwrap();
        assert_eq!(c.languages(), vec!["en", "pl"]);
        assert_eq!(c.resolve_lang("uk"), "en");
    }

    #[test]
    fn bundled_locale_parses() {
        let c = test_support::bundled_catalog();
        assert!(!c.continents("en").is_empty());
        assert!(!c.markup("en", "car_types").is_empty());
    }
}
