//! Localized form summaries.

use rust_decimal::Decimal;

use crate::form::model::{FieldName, FieldValue, FormView};
use crate::localization::Catalog;

const DATE_FORMAT: &str = "%d.%m.%Y";

/// Escape text for Telegram's HTML parse mode.
pub fn escape_html(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
}

/// Render the non-null fields of `form` under `title`, in summary order.
///
/// With `hidden` set, only head fields are rendered; the rest stay behind
/// the reveal toggle.
pub fn render_summary(
    form: &dyn FormView,
    title: &str,
    lang: &str,
    catalog: &Catalog,
    hidden: bool,
) -> String {
    let mut lines = vec![format!("{title}\n")];

    for &field in form.fields() {
        if hidden && !field.is_head() {
            continue;
        }
        let Some(value) = form.value(field) else {
            continue;
        };
        let label = escape_html(&catalog.label(lang, field.as_str()));

        if field.is_grid() {
            if let FieldValue::Codes(codes) = &value {
                lines.push(format!("<b><code>{label}</code></b>"));
                lines.extend(
                    grid_labels(catalog, lang, field, codes)
                        .into_iter()
                        .map(|l| format!("<b>{}</b>", escape_html(&l))),
                );
                continue;
            }
        }

        let shown = format_value(catalog, lang, field, &value);
        lines.push(format!("<b><code>{label}</code> {}</b>", escape_html(&shown)));
    }

    lines.join("\n")
}

fn format_value(catalog: &Catalog, lang: &str, field: FieldName, value: &FieldValue) -> String {
    match value {
        FieldValue::Text(code) if field.is_country() => catalog
            .country_label(lang, code)
            .unwrap_or_else(|| code.clone()),
        FieldValue::Text(code) if field.markup_key().is_some() => code_label(catalog, lang, field, code),
        FieldValue::Text(text) => text.clone(),
        FieldValue::Int(n) => n.to_string(),
        FieldValue::Number(n) => money(*n),
        FieldValue::Date(d) => d.format(DATE_FORMAT).to_string(),
        FieldValue::Codes(codes) => codes
            .iter()
            .map(|c| {
                if field.is_country() {
                    catalog.country_label(lang, c).unwrap_or_else(|| c.clone())
                } else {
                    code_label(catalog, lang, field, c)
                }
            })
            .collect::<Vec<_>>()
            .join(", "),
        FieldValue::YearRange(a, b) => format!("{a} - {b}"),
        FieldValue::DateRange(a, b) => {
            format!("{} - {}", a.format(DATE_FORMAT), b.format(DATE_FORMAT))
        }
        FieldValue::NumberRange(a, b) => format!("{} - {}", money(*a), money(*b)),
    }
}

fn code_label(catalog: &Catalog, lang: &str, field: FieldName, code: &str) -> String {
    if code.is_empty() {
        return catalog.text(lang, "value_skipped");
    }
    field
        .markup_key()
        .and_then(|key| catalog.code_label(lang, key, code))
        .unwrap_or_else(|| code.to_string())
}

fn money(amount: Decimal) -> String {
    format!("€{}", amount.normalize())
}

/// `row:col` codes rendered as "Row: Column" using the grid markup's
/// `row:<id>` and `col:<id>` buttons.
pub fn grid_labels(catalog: &Catalog, lang: &str, field: FieldName, codes: &[String]) -> Vec<String> {
    let Some(key) = field.markup_key() else {
        return codes.to_vec();
    };
    let buttons = catalog.buttons(lang, key);
    let find = |prefix: &str, id: &str| {
        buttons
            .iter()
            .find(|(_, action)| action.strip_prefix(prefix) == Some(id))
            .map(|(text, _)| text.clone())
            .unwrap_or_else(|| id.to_string())
    };

    codes
        .iter()
        .map(|code| match code.split_once(':') {
            Some((row, col)) => format!("{}: {}", find("row:", row), find("col:", col)),
            None => code.clone(),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    use super::*;
    use crate::form::model::{CompanyFilter, DriverProfile};
    use crate::localization::test_support::bundled_catalog;

    fn profile() -> DriverProfile {
        DriverProfile {
            name: Some("Jan <Kowalski>".into()),
            birth_year: Some(1985),
            car_types: Some(vec!["B".into(), "C".into()]),
            citizenships: Some(vec!["pl".into()]),
            date_start_work: NaiveDate::from_ymd_opt(2026, 3, 1),
            language_skills: Some(vec!["de:b2".into()]),
            expected_salary: Some(dec!(2500.00)),
            work_type: Some(String::new()),
            ..Default::default()
        }
    }

    #[test]
    fn renders_set_fields_only() {
        let catalog = bundled_catalog();
        let text = render_summary(&profile(), "Form", "en", &catalog, false);
        assert!(text.starts_with("Form\n"));
        assert!(text.contains("Jan &lt;Kowalski&gt;"));
        assert!(text.contains("1985"));
        assert!(text.contains("01.03.2026"));
        assert!(text.contains("€2500"));
        assert!(text.contains("Poland"));
        assert!(text.contains("German: B2"));
        assert!(!text.contains(&catalog.label("en", "crew")));
    }

    #[test]
    fn hidden_mode_keeps_head_fields() {
        let catalog = bundled_catalog();
        let text = render_summary(&profile(), "Form", "en", &catalog, true);
        assert!(text.contains("1985"));
        assert!(!text.contains("01.03.2026"));
        assert!(!text.contains("Poland"));
    }

    #[test]
    fn filter_ranges_render_both_edges() {
        let catalog = bundled_catalog();
        let mut f = CompanyFilter::default();
        f.set_range(FieldName::BirthYear, FieldValue::Int(1990), FieldValue::Int(1970))
            .unwrap();
        let text = render_summary(&f, "Filters", "en", &catalog, false);
        assert!(text.contains("1970 - 1990"));
    }

    #[test]
    fn rendering_is_deterministic() {
        let catalog = bundled_catalog();
        let p = profile();
        assert_eq!(
            render_summary(&p, "T", "en", &catalog, false),
            render_summary(&p, "T", "en", &catalog, false)
        );
    }
}
