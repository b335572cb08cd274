//! Form pricing: a base price plus rule-table adjustments.
//!
//! The rule table maps a field name to `value -> adjustment` entries.
//! Special keys:
//! - `%least_one%:<col>` on grid fields matches every selection whose
//!   column is `<col>`, once per matching selection
//! - `%unselected%` on `unsuitable_countries` applies when the set is empty
//! - `min-max` on `expected_salary` is an inclusive bucket
//! - `cont:<continent>` on `country_current_live` matches by continent

use std::collections::HashMap;
use std::path::Path;
use std::str::FromStr;

use rust_decimal::Decimal;
use tracing::{debug, warn};

use crate::error::LocalizationError;
use crate::form::model::{FieldName, FieldValue, FormView};
use crate::localization::Catalog;

pub const UNSELECTED_KEY: &str = "%unselected%";
pub const AT_LEAST_ONE_PREFIX: &str = "%least_one%";
pub const CONTINENT_PREFIX: &str = "cont:";

/// Fields priced by summing one adjustment per selected code.
const SET_FIELDS: [FieldName; 6] = [
    FieldName::CarTypes,
    FieldName::DangerousGoods,
    FieldName::LanguageSkills,
    FieldName::JobExperience,
    FieldName::CategoriesAvailability,
    FieldName::Cadence,
];

/// Fields priced by their single code.
const SCALAR_FIELDS: [FieldName; 4] = [
    FieldName::BasisOfStay,
    FieldName::Availability95Code,
    FieldName::NeedInternship,
    FieldName::WorkType,
];

/// Static `field -> value -> adjustment` mapping.
#[derive(Debug, Clone, Default)]
pub struct RuleTable {
    rules: HashMap<String, HashMap<String, Decimal>>,
}

impl RuleTable {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        Ok(Self {
            rules: serde_json::from_str(raw)?,
        })
    }

    pub fn load(path: &Path) -> Result<Self, LocalizationError> {
        let raw = std::fs::read_to_string(path).map_err(|e| LocalizationError::Read {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        Self::from_json(&raw).map_err(|e| LocalizationError::Parse {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }

    fn field(&self, field: FieldName) -> Option<&HashMap<String, Decimal>> {
        self.rules.get(field.as_str())
    }
}

/// Compute the price of a form.
///
/// Pure accumulation over populated fields; no adjustment depends on any
/// other field.
pub fn compute_price(
    form: &dyn FormView,
    rules: &RuleTable,
    base: Decimal,
    catalog: &Catalog,
) -> Decimal {
    let mut price = base;

    for field in SET_FIELDS {
        let (Some(table), Some(FieldValue::Codes(selected))) = (rules.field(field), form.value(field))
        else {
            continue;
        };
        for code in &selected {
            price += if field.is_grid() {
                grid_adjustment(table, code)
            } else {
                table.get(code).copied().unwrap_or_default()
            };
        }
    }

    for field in SCALAR_FIELDS {
        if let (Some(table), Some(FieldValue::Text(code))) = (rules.field(field), form.value(field)) {
            price += table.get(&code).copied().unwrap_or_default();
        }
    }

    if let (Some(table), Some(FieldValue::Codes(countries))) = (
        rules.field(FieldName::UnsuitableCountries),
        form.value(FieldName::UnsuitableCountries),
    ) {
        if countries.is_empty() {
            price += table.get(UNSELECTED_KEY).copied().unwrap_or_default();
        }
    }

    if let (Some(table), Some(FieldValue::Number(salary))) = (
        rules.field(FieldName::ExpectedSalary),
        form.value(FieldName::ExpectedSalary),
    ) {
        price += salary_adjustment(table, salary);
    }

    if let (Some(table), Some(FieldValue::Text(country))) = (
        rules.field(FieldName::CountryCurrentLive),
        form.value(FieldName::CountryCurrentLive),
    ) {
        if let Some(continent) = catalog.continent_of(&country) {
            let key = format!("{CONTINENT_PREFIX}{continent}");
            price += table.get(&key).copied().unwrap_or_default();
        }
    }

    debug!(%price, "Form price computed");
    price
}

/// Exact `row:col` entries plus every `%least_one%:<col>` wildcard whose
/// column matches.
fn grid_adjustment(table: &HashMap<String, Decimal>, code: &str) -> Decimal {
    let col = code.split_once(':').map(|(_, c)| c);
    table
        .iter()
        .map(|(key, value)| {
            if key == code {
                return *value;
            }
            match (key.strip_prefix(AT_LEAST_ONE_PREFIX), col) {
                (Some(rest), Some(col)) if rest.strip_prefix(':') == Some(col) => *value,
                _ => Decimal::ZERO,
            }
        })
        .sum()
}

fn salary_adjustment(table: &HashMap<String, Decimal>, salary: Decimal) -> Decimal {
    for (key, value) in table {
        let Some((min, max)) = key.split_once('-') else {
            warn!(key, "Salary rule key is not a min-max range");
            continue;
        };
        let (Ok(min), Ok(max)) = (Decimal::from_str(min.trim()), Decimal::from_str(max.trim()))
        else {
            warn!(key, "Salary rule key has non-numeric edges");
            continue;
        };
        if min <= salary && salary <= max {
            return *value;
        }
    }
    Decimal::ZERO
}
