//! Country browser: continent list, then a paginated country page.

use crate::channels::{Button, Keyboard};
use crate::error::WizardError;
use crate::form::{FieldName, FieldValue};
use crate::localization::{Catalog, Continent};
use crate::wizard::action::{self, Action};
use crate::wizard::context::{CountryCursor, StepBuffers};
use crate::wizard::flow::StepResult;
use crate::wizard::keyboard::{checked, control};
use crate::wizard::step::{Mode, StepDefinition, StepId};

pub const PAGE_SIZE: usize = 12;
const PER_ROW: usize = 2;

/// Continent with enough countries to warrant bulk actions in driver mode.
const BULK_CONTINENT: &str = "asia";

/// Continents not offered when a driver lists unsuitable countries.
const NOT_UNSUITABLE: [&str; 4] = ["north_america", "south_america", "africa", "oceania"];

/// Continents shown for this step.
pub fn continents<'a>(catalog: &'a Catalog, lang: &str, step: StepId, mode: Mode) -> Vec<&'a Continent> {
    catalog
        .continents(lang)
        .iter()
        .filter(|c| {
            mode.is_filter()
                || step != StepId::UnsuitableCountries
                || !NOT_UNSUITABLE.contains(&c.key.as_str())
        })
        .collect()
}

fn page_count(continent: &Continent) -> usize {
    continent.countries.len().div_ceil(PAGE_SIZE).max(1)
}

/// Keyboard for the current browser position, without the footer.
pub fn keyboard(
    catalog: &Catalog,
    lang: &str,
    def: &StepDefinition,
    mode: Mode,
    buffers: &StepBuffers,
) -> Keyboard {
    let shown = continents(catalog, lang, def.id, mode);
    let cursor = buffers
        .cursor
        .as_ref()
        .and_then(|cur| shown.iter().find(|c| c.key == cur.continent).map(|c| (*c, cur.page)));

    let Some((continent, page)) = cursor else {
        let buttons: Vec<Button> = shown
            .iter()
            .map(|c| Button::new(c.label.clone(), format!("cont:{}", c.key)))
            .collect();
        return buttons.chunks(PER_ROW).map(<[Button]>::to_vec).collect();
    };

    let multi = !def.single_country;
    let buttons: Vec<Button> = continent
        .countries
        .iter()
        .skip(page * PAGE_SIZE)
        .take(PAGE_SIZE)
        .map(|country| {
            let text = if multi && buffers.selection.contains(&country.code) {
                checked(&country.text)
            } else {
                country.text.clone()
            };
            Button::new(text, country.code.clone())
        })
        .collect();
    let mut rows: Keyboard = buttons.chunks(PER_ROW).map(<[Button]>::to_vec).collect();

    let total = page_count(continent);
    let prev = if page > 0 {
        Button::new("⬅️", format!("prev_page:{}", page - 1))
    } else {
        Button::inert(" ")
    };
    let next = if page + 1 < total {
        Button::new("➡️", format!("next_page:{}", page + 1))
    } else {
        Button::inert(" ")
    };
    rows.push(vec![prev, Button::inert(format!("{}/{total}", page + 1)), next]);

    if multi && (mode.is_filter() || continent.key == BULK_CONTINENT) {
        rows.push(vec![
            control(catalog, lang, action::CHECK_CONTINENT),
            control(catalog, lang, action::UNCHECK_CONTINENT),
        ]);
    }
    rows.push(vec![control(catalog, lang, action::TO_CONTINENTS)]);
    rows
}

fn current<'a>(
    catalog: &'a Catalog,
    lang: &str,
    def: &StepDefinition,
    mode: Mode,
    buffers: &StepBuffers,
) -> Result<&'a Continent, WizardError> {
    let cursor = buffers
        .cursor
        .as_ref()
        .ok_or_else(|| WizardError::StaleSelection("no continent open".into()))?;
    continents(catalog, lang, def.id, mode)
        .into_iter()
        .find(|c| c.key == cursor.continent)
        .ok_or_else(|| WizardError::StaleSelection(format!("continent {}", cursor.continent)))
}

pub fn handle(
    action: Action,
    def: &StepDefinition,
    field: FieldName,
    mode: Mode,
    catalog: &Catalog,
    lang: &str,
    buffers: &mut StepBuffers,
) -> Result<StepResult, WizardError> {
    match action {
        Action::Continent(key) => {
            if !continents(catalog, lang, def.id, mode).iter().any(|c| c.key == key) {
                return Err(WizardError::StaleSelection(format!("continent {key}")));
            }
            buffers.cursor = Some(CountryCursor {
                continent: key,
                page: 0,
            });
            Ok(StepResult::Redraw)
        }
        Action::PrevPage(page) | Action::NextPage(page) => {
            let continent = current(catalog, lang, def, mode, buffers)?;
            if page >= page_count(continent) {
                return Err(WizardError::StaleSelection(format!("page {page}")));
            }
            if let Some(cursor) = buffers.cursor.as_mut() {
                cursor.page = page;
            }
            Ok(StepResult::Redraw)
        }
        Action::ToContinents => {
            buffers.cursor = None;
            Ok(StepResult::Redraw)
        }
        Action::Choice(code) => {
            let continent = current(catalog, lang, def, mode, buffers)?;
            if !continent.countries.iter().any(|c| c.code == code) {
                return Err(WizardError::StaleSelection(format!("country {code}")));
            }
            if def.single_country {
                return Ok(StepResult::Patch {
                    field,
                    value: FieldValue::Text(code),
                });
            }
            if let Some(pos) = buffers.selection.iter().position(|c| *c == code) {
                buffers.selection.remove(pos);
            } else {
                buffers.selection.push(code);
            }
            Ok(StepResult::Redraw)
        }
        Action::CheckContinent | Action::UncheckContinent if !def.single_country => {
            let continent = current(catalog, lang, def, mode, buffers)?;
            let codes = continent.countries.iter().map(|c| &c.code);
            if action == Action::CheckContinent {
                for code in codes {
                    if !buffers.selection.contains(code) {
                        buffers.selection.push(code.clone());
                    }
                }
            } else {
                let removed: Vec<&String> = codes.collect();
                buffers.selection.retain(|c| !removed.contains(&c));
            }
            Ok(StepResult::Redraw)
        }
        Action::Skip if def.skip => Ok(StepResult::Patch {
            field,
            value: FieldValue::Codes(Vec::new()),
        }),
        Action::Confirm if !def.single_country => {
            if buffers.selection.is_empty() && !mode.is_filter() {
                return Err(WizardError::Confirmation { key: "wrong_confirm" });
            }
            Ok(StepResult::Patch {
                field,
                value: FieldValue::Codes(buffers.selection.clone()),
            })
        }
        other => Err(WizardError::StaleSelection(format!("{other:?} on countries"))),
    }
}
