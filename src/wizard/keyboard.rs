//! Shared button helpers for wizard surfaces.

use crate::channels::{Button, Keyboard};
use crate::localization::Catalog;
use crate::wizard::action;

/// Markup holding the labels of the wizard's control buttons.
pub const CONTROLS_MARKUP: &str = "wizard_controls";

const CHECK_MARK: &str = "✅";

/// A control button labelled from the controls markup.
pub fn control(catalog: &Catalog, lang: &str, code: &str) -> Button {
    let label = catalog
        .code_label(lang, CONTROLS_MARKUP, code)
        .unwrap_or_else(|| code.to_string());
    Button::new(label, code)
}

pub fn checked(text: &str) -> String {
    format!("{CHECK_MARK} {text}")
}

/// Copy `markup`, marking every button whose action is in `selection`.
pub fn mark_selected(markup: &Keyboard, selection: &[String]) -> Keyboard {
    markup
        .iter()
        .map(|row| {
            row.iter()
                .map(|b| {
                    if selection.contains(&b.action) {
                        Button::new(checked(&b.text), b.action.clone())
                    } else {
                        b.clone()
                    }
                })
                .collect()
        })
        .collect()
}

/// Action codes of a markup, in order.
pub fn codes(markup: &Keyboard) -> Vec<String> {
    markup.iter().flatten().map(|b| b.action.clone()).collect()
}

/// Which control rows close a step keyboard.
#[derive(Debug, Clone, Copy, Default)]
pub struct Footer {
    pub skip: bool,
    pub confirm: bool,
    pub hide_toggle: bool,
}

impl Footer {
    pub fn rows(self, catalog: &Catalog, lang: &str) -> Keyboard {
        let mut rows = Vec::new();
        if self.skip {
            rows.push(vec![control(catalog, lang, action::SKIP)]);
        }
        if self.confirm {
            rows.push(vec![control(catalog, lang, action::CONFIRM)]);
        }
        if self.hide_toggle {
            rows.push(vec![control(catalog, lang, action::TOGGLE_HIDDEN)]);
        }
        rows.push(vec![control(catalog, lang, action::BACK)]);
        rows
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::localization::test_support::bundled_catalog;

    #[test]
    fn marks_only_selected() {
        let markup = vec![vec![Button::new("B", "B"), Button::new("C", "C")]];
        let marked = mark_selected(&markup, &["C".to_string()]);
        assert_eq!(marked[0][0].text, "B");
        assert_eq!(marked[0][1].text, "✅ C");
        assert_eq!(marked[0][1].action, "C");
    }

    #[test]
    fn footer_always_ends_with_back() {
        let catalog = bundled_catalog();
        let rows = Footer {
            skip: true,
            confirm: true,
            hide_toggle: false,
        }
        .rows(&catalog, "en");
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[0][0].action, "skip");
        assert_eq!(rows[2][0].action, "back");
        assert_ne!(rows[2][0].text, "back");
    }
}
