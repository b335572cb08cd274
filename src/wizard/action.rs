//! Callback action codes understood by the wizard.
//!
//! Buttons carry short string codes. They are parsed once into a closed
//! enum and every surface matches on that enum; codes that are not a
//! control action fall through to [`Action::Choice`].

use chrono::NaiveDate;

use crate::channels::NOOP_ACTION;

pub const BACK: &str = "back";
pub const CONFIRM: &str = "confirm";
pub const CHECK_ALL: &str = "check_all";
pub const UNCHECK_ALL: &str = "uncheck_all";
pub const SKIP: &str = "skip";
pub const TOGGLE_HIDDEN: &str = "hid_or_open_form";
pub const TO_CONTINENTS: &str = "to_continents";
pub const CHECK_CONTINENT: &str = "check_cont";
pub const UNCHECK_CONTINENT: &str = "uncheck_cont";
pub const BACK_TO_MENU: &str = "back_to_menu";
pub const SET_VALUE: &str = "set_value";

/// A parsed button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Noop,
    Back,
    Confirm,
    CheckAll,
    UncheckAll,
    Skip,
    ToggleHidden,
    /// Pan the year window left from the given start year.
    YearLeft(i32),
    /// Pan the year window right from the given start year.
    YearRight(i32),
    /// Show the month starting at the given date.
    MonthPrev(NaiveDate),
    MonthNext(NaiveDate),
    Day(NaiveDate),
    PrevPage(usize),
    NextPage(usize),
    ToContinents,
    Continent(String),
    CheckContinent,
    UncheckContinent,
    /// Open the column view for a selector row.
    GridRow(String),
    /// Pick a column for a selector row.
    GridPick { row: String, col: String },
    BackToMenu,
    /// Any other code: a choice, a checklist item, a country or a year.
    Choice(String),
}

impl Action {
    pub fn parse(data: &str) -> Self {
        match data {
            NOOP_ACTION => return Action::Noop,
            BACK => return Action::Back,
            CONFIRM => return Action::Confirm,
            CHECK_ALL => return Action::CheckAll,
            UNCHECK_ALL => return Action::UncheckAll,
            SKIP => return Action::Skip,
            TOGGLE_HIDDEN => return Action::ToggleHidden,
            TO_CONTINENTS => return Action::ToContinents,
            CHECK_CONTINENT => return Action::CheckContinent,
            UNCHECK_CONTINENT => return Action::UncheckContinent,
            BACK_TO_MENU => return Action::BackToMenu,
            _ => {}
        }

        if let Some((prefix, rest)) = data.split_once(':') {
            match prefix {
                "left" | "right" => {
                    if let Ok(from) = rest.parse() {
                        return if prefix == "left" {
                            Action::YearLeft(from)
                        } else {
                            Action::YearRight(from)
                        };
                    }
                }
                "l" | "r" => {
                    if let Some(date) = parse_dotted_date(rest) {
                        return if prefix == "l" {
                            Action::MonthPrev(date)
                        } else {
                            Action::MonthNext(date)
                        };
                    }
                }
                "prev_page" | "next_page" => {
                    if let Ok(page) = rest.parse() {
                        return if prefix == "prev_page" {
                            Action::PrevPage(page)
                        } else {
                            Action::NextPage(page)
                        };
                    }
                }
                "cont" => return Action::Continent(rest.to_string()),
                _ => {}
            }
            if !prefix.is_empty() && !rest.is_empty() {
                return if rest == SET_VALUE {
                    Action::GridRow(prefix.to_string())
                } else {
                    Action::GridPick {
                        row: prefix.to_string(),
                        col: rest.to_string(),
                    }
                };
            }
        }

        if let Some(date) = parse_dotted_date(data) {
            return Action::Day(date);
        }

        Action::Choice(data.to_string())
    }
}

/// `d.m.yyyy` without zero padding.
pub fn parse_dotted_date(s: &str) -> Option<NaiveDate> {
    let mut parts = s.split('.');
    let day = parts.next()?.parse().ok()?;
    let month = parts.next()?.parse().ok()?;
    let year = parts.next()?.parse().ok()?;
    if parts.next().is_some() {
        return None;
    }
    NaiveDate::from_ymd_opt(year, month, day)
}

pub fn day_code(date: NaiveDate) -> String {
    use chrono::Datelike;
    format!("{}.{}.{}", date.day(), date.month(), date.year())
}

pub fn month_prev_code(first: NaiveDate) -> String {
    format!("l:{}", day_code(first))
}

pub fn month_next_code(first: NaiveDate) -> String {
    format!("r:{}", day_code(first))
}

pub fn grid_row_code(row: &str) -> String {
    format!("{row}:{SET_VALUE}")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn control_codes() {
        assert_eq!(Action::parse("0"), Action::Noop);
        assert_eq!(Action::parse("back"), Action::Back);
        assert_eq!(Action::parse("hid_or_open_form"), Action::ToggleHidden);
        assert_eq!(Action::parse("check_cont"), Action::CheckContinent);
    }

    #[test]
    fn navigation_codes() {
        assert_eq!(Action::parse("left:1984"), Action::YearLeft(1984));
        assert_eq!(Action::parse("right:1959"), Action::YearRight(1959));
        assert_eq!(Action::parse("r:1.1.2027"), Action::MonthNext(date(2027, 1, 1)));
        assert_eq!(Action::parse("l:1.12.2026"), Action::MonthPrev(date(2026, 12, 1)));
        assert_eq!(Action::parse("next_page:2"), Action::NextPage(2));
        assert_eq!(Action::parse("cont:asia"), Action::Continent("asia".into()));
    }

    #[test]
    fn grid_codes() {
        assert_eq!(Action::parse("de:set_value"), Action::GridRow("de".into()));
        assert_eq!(
            Action::parse("de:b2"),
            Action::GridPick {
                row: "de".into(),
                col: "b2".into()
            }
        );
    }

    #[test]
    fn days_and_plain_choices() {
        assert_eq!(Action::parse("5.3.2026"), Action::Day(date(2026, 3, 5)));
        assert_eq!(Action::parse("31.2.2026"), Action::Choice("31.2.2026".into()));
        assert_eq!(Action::parse("1984"), Action::Choice("1984".into()));
        assert_eq!(Action::parse("3/1"), Action::Choice("3/1".into()));
    }

    #[test]
    fn codes_roundtrip_through_builders() {
        let d = date(2026, 11, 1);
        assert_eq!(Action::parse(&month_next_code(d)), Action::MonthNext(d));
        assert_eq!(Action::parse(&day_code(d)), Action::Day(d));
        assert_eq!(Action::parse(&grid_row_code("en")), Action::GridRow("en".into()));
    }
}
