//! Free-text validators plus the year window and calendar surfaces.

use std::str::FromStr;
use std::sync::LazyLock;

use chrono::{Datelike, Months, NaiveDate};
use regex::Regex;
use rust_decimal::Decimal;

use crate::channels::{Button, Keyboard};
use crate::error::WizardError;
use crate::localization::Catalog;
use crate::wizard::action::{day_code, month_next_code, month_prev_code};

static NAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[A-Za-z\s']+$").expect("static regex"));
static NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^-?\d+(\.\d+)?$").expect("static regex"));

pub fn validate_name(text: &str) -> Result<String, WizardError> {
    let name = text.trim();
    if NAME_RE.is_match(name) {
        Ok(name.to_string())
    } else {
        Err(WizardError::Validation {
            key: "wrong_name_format",
        })
    }
}

/// Returns the number without its leading `+`.
pub fn validate_phone(text: &str) -> Result<String, WizardError> {
    let trimmed = text.trim();
    let digits = trimmed.strip_prefix('+').unwrap_or(trimmed);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(WizardError::Validation {
            key: "wrong_phone_number_format",
        });
    }
    if !(10..=15).contains(&digits.len()) {
        return Err(WizardError::Validation {
            key: "phone_number_range_limit",
        });
    }
    Ok(digits.to_string())
}

fn parse_number(text: &str) -> Result<Decimal, WizardError> {
    let text = text.trim();
    if !NUMBER_RE.is_match(text) {
        return Err(WizardError::Validation { key: "wrong_number" });
    }
    Decimal::from_str(text).map_err(|_| WizardError::Validation { key: "wrong_number" })
}

/// A single salary within `[min, max]`.
pub fn validate_salary(text: &str, min: Decimal, max: Decimal) -> Result<Decimal, WizardError> {
    let value = parse_number(text)?;
    if value < Decimal::ZERO || value < min || value > max {
        return Err(WizardError::Validation {
            key: "wrong_salary_value_range",
        });
    }
    Ok(value)
}

/// A `min-max` salary range, returned ordered.
pub fn validate_salary_range(
    text: &str,
    min: Decimal,
    max: Decimal,
) -> Result<(Decimal, Decimal), WizardError> {
    let text = text.trim();
    if text.matches('-').count() != 1 {
        return Err(WizardError::Validation {
            key: "wrong_salary_format",
        });
    }
    let (left, right) = text.split_once('-').ok_or(WizardError::Validation {
        key: "wrong_salary_format",
    })?;
    let left = validate_salary(left, min, max)?;
    let right = validate_salary(right, min, max)?;
    Ok(if left <= right {
        (left, right)
    } else {
        (right, left)
    })
}

// ── Year window ─────────────────────────────────────────────────────

pub const YEAR_WINDOW: i32 = 25;
const YEARS_PER_ROW: usize = 5;
const MIN_YEAR: i32 = 1950;
const DEFAULT_AGE_OFFSET: i32 = 42;
const MIN_AGE: i32 = 18;

/// A 25-year window of selectable birth years.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct YearWindow {
    pub from: i32,
    current_year: i32,
}

impl YearWindow {
    pub fn anchored(current_year: i32) -> Self {
        Self {
            from: current_year - DEFAULT_AGE_OFFSET,
            current_year,
        }
    }

    pub fn starting_at(from: i32, current_year: i32) -> Self {
        Self { from, current_year }
    }

    /// The window 25 years earlier, unless the current one already
    /// starts before 1950.
    pub fn pan_left(self) -> Option<Self> {
        let from = self.from - YEAR_WINDOW;
        (from + YEAR_WINDOW >= MIN_YEAR).then_some(Self { from, ..self })
    }

    /// The window 25 years later, unless it would start past the
    /// youngest allowed birth year.
    pub fn pan_right(self) -> Option<Self> {
        let from = self.from + YEAR_WINDOW;
        (from <= self.current_year - MIN_AGE).then_some(Self { from, ..self })
    }

    /// Years a button could legitimately carry.
    pub fn accepts(&self, year: i32) -> bool {
        year >= MIN_YEAR - YEAR_WINDOW && year <= self.current_year
    }

    pub fn keyboard(&self) -> Keyboard {
        let years: Vec<Button> = (self.from..self.from + YEAR_WINDOW)
            .map(|y| Button::new(y.to_string(), y.to_string()))
            .collect();
        let mut rows: Keyboard = years.chunks(YEARS_PER_ROW).map(<[Button]>::to_vec).collect();
        rows.push(vec![
            Button::new("⬅️", format!("left:{}", self.from)),
            Button::new("➡️", format!("right:{}", self.from)),
        ]);
        rows
    }
}

// ── Calendar ────────────────────────────────────────────────────────

pub fn first_of_month(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// Month grid for `month` (any day in it). Days before `today` in the
/// current month are inert, as is the previous-month arrow there.
pub fn calendar_keyboard(month: NaiveDate, today: NaiveDate, catalog: &Catalog, lang: &str) -> Keyboard {
    let first = first_of_month(month);
    let this_month = first_of_month(today);
    let mut rows: Keyboard = vec![catalog.weekdays(lang).into_iter().map(Button::inert).collect()];

    let lead = first.weekday().num_days_from_monday() as usize;
    let mut cells: Vec<Button> = vec![Button::inert(" "); lead];
    let mut day = first;
    while day.month() == first.month() {
        if first == this_month && day < today {
            cells.push(Button::inert(" "));
        } else {
            cells.push(Button::new(day.day().to_string(), day_code(day)));
        }
        match day.succ_opt() {
            Some(next) => day = next,
            None => break,
        }
    }
    while cells.len() % 7 != 0 {
        cells.push(Button::inert(" "));
    }
    rows.extend(cells.chunks(7).map(<[Button]>::to_vec));

    let left = match first.checked_sub_months(Months::new(1)) {
        Some(prev) if first > this_month => Button::new("🔙", month_prev_code(prev)),
        _ => Button::inert("🔙"),
    };
    let right = match first.checked_add_months(Months::new(1)) {
        Some(next) => Button::new("🔜", month_next_code(next)),
        None => Button::inert("🔜"),
    };
    let label = Button::inert(format!(
        "{} {}",
        catalog.month_name(lang, first.month()),
        first.year()
    ));
    rows.push(vec![left, label, right]);
    rows
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;
    use crate::channels::NOOP_ACTION;
    use crate::localization::test_support::bundled_catalog;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn names() {
        assert_eq!(validate_name("  Jan O'Brien ").unwrap(), "Jan O'Brien");
        assert!(validate_name("Jan3").is_err());
        assert!(validate_name("").is_err());
    }

    #[test]
    fn phones() {
        assert_eq!(validate_phone("+48123456789").unwrap(), "48123456789");
        assert_eq!(
            validate_phone("12345").unwrap_err(),
            WizardError::Validation {
                key: "phone_number_range_limit"
            }
        );
        assert_eq!(
            validate_phone("+48 123 456 789").unwrap_err(),
            WizardError::Validation {
                key: "wrong_phone_number_format"
            }
        );
        assert!(validate_phone("1234567890123456").is_err());
    }

    #[test]
    fn salary_bounds() {
        let (min, max) = (dec!(500), dec!(5000));
        assert_eq!(validate_salary("2500.50", min, max).unwrap(), dec!(2500.50));
        assert!(validate_salary("499", min, max).is_err());
        assert!(validate_salary("5001", min, max).is_err());
        assert_eq!(
            validate_salary("abc", min, max).unwrap_err(),
            WizardError::Validation { key: "wrong_number" }
        );
        assert!(validate_salary("-5", dec!(-10), max).is_err());
    }

    #[test]
    fn salary_ranges_are_ordered() {
        let (min, max) = (dec!(0), dec!(1000));
        assert_eq!(
            validate_salary_range("120-60", min, max).unwrap(),
            (dec!(60), dec!(120))
        );
        assert_eq!(
            validate_salary_range("60-1001", min, max).unwrap_err(),
            WizardError::Validation {
                key: "wrong_salary_value_range"
            }
        );
        assert!(validate_salary_range("1-2-3", min, max).is_err());
        assert!(validate_salary_range("100", min, max).is_err());
    }

    #[test]
    fn year_window_pans_within_limits() {
        let w = YearWindow::anchored(2026);
        assert_eq!(w.from, 1984);
        assert!(w.pan_right().is_none());

        let left = w.pan_left().unwrap();
        assert_eq!(left.from, 1959);
        let further = left.pan_left().unwrap();
        assert_eq!(further.from, 1934);
        assert!(further.pan_left().is_none());
        assert_eq!(further.pan_right().unwrap().from, 1959);
    }

    #[test]
    fn year_keyboard_layout() {
        let kb = YearWindow::anchored(2026).keyboard();
        assert_eq!(kb.len(), 6);
        assert!(kb[..5].iter().all(|row| row.len() == 5));
        assert_eq!(kb[0][0].action, "1984");
        assert_eq!(kb[4][4].action, "2008");
        assert_eq!(kb[5][0].action, "left:1984");
    }

    #[test]
    fn calendar_hides_past_days_in_current_month() {
        let catalog = bundled_catalog();
        let today = date(2026, 10, 19);
        let kb = calendar_keyboard(today, today, &catalog, "en");

        assert_eq!(kb[0].len(), 7);
        let days: Vec<&Button> = kb[1..kb.len() - 1].iter().flatten().collect();
        assert!(days.iter().all(|b| b.action != "18.10.2026"));
        assert!(days.iter().any(|b| b.action == "19.10.2026"));

        let nav = kb.last().unwrap();
        assert_eq!(nav[0].action, NOOP_ACTION);
        assert_eq!(nav[2].action, "r:1.11.2026");
    }

    #[test]
    fn calendar_pads_to_weekday() {
        let catalog = bundled_catalog();
        let today = date(2026, 10, 19);
        // November 2026 starts on a Sunday.
        let kb = calendar_keyboard(date(2026, 11, 1), today, &catalog, "en");
        assert_eq!(kb[1][5].action, NOOP_ACTION);
        assert_eq!(kb[1][6].action, "1.11.2026");
        assert!(kb[1..kb.len() - 1].iter().all(|row| row.len() == 7));
    }

    #[test]
    fn calendar_wraps_years() {
        let catalog = bundled_catalog();
        let today = date(2026, 10, 19);
        let kb = calendar_keyboard(date(2026, 12, 1), today, &catalog, "en");
        let nav = kb.last().unwrap();
        assert_eq!(nav[0].action, "l:1.11.2026");
        assert_eq!(nav[2].action, "r:1.1.2027");
        assert!(nav[1].text.ends_with("2026"));

        let kb = calendar_keyboard(date(2027, 1, 1), today, &catalog, "en");
        assert_eq!(kb.last().unwrap()[0].action, "l:1.12.2026");
        assert!(kb[1..kb.len() - 1].iter().flatten().any(|b| b.action == "1.1.2027"));
    }
}
