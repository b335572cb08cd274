//! Single-choice and multi-choice lists backed by a markup.

use crate::channels::Keyboard;
use crate::error::WizardError;
use crate::form::{FieldName, FieldValue};
use crate::wizard::action::Action;
use crate::wizard::context::StepBuffers;
use crate::wizard::flow::StepResult;
use crate::wizard::keyboard::{codes, mark_selected};
use crate::wizard::step::{Mode, StepDefinition};

/// Checklist buttons with the current selection marked.
pub fn keyboard(markup: &Keyboard, buffers: &StepBuffers) -> Keyboard {
    mark_selected(markup, &buffers.selection)
}

/// Toggle, bulk-check or confirm a set of codes.
pub fn handle(
    action: Action,
    def: &StepDefinition,
    field: FieldName,
    mode: Mode,
    markup: &Keyboard,
    buffers: &mut StepBuffers,
) -> Result<StepResult, WizardError> {
    let known = codes(markup);
    match action {
        Action::Choice(code) if known.contains(&code) => {
            if let Some(pos) = buffers.selection.iter().position(|c| *c == code) {
                buffers.selection.remove(pos);
            } else {
                buffers.selection.push(code);
            }
            Ok(StepResult::Redraw)
        }
        Action::CheckAll => {
            buffers.selection = known;
            Ok(StepResult::Redraw)
        }
        Action::UncheckAll => {
            if buffers.selection.is_empty() {
                return Ok(StepResult::Unchanged);
            }
            buffers.selection.clear();
            Ok(StepResult::Redraw)
        }
        Action::Skip if def.skip => Ok(StepResult::Patch {
            field,
            value: FieldValue::Codes(Vec::new()),
        }),
        Action::Confirm => {
            // An empty filter is a valid answer: it removes the filter.
            if buffers.selection.is_empty() && !mode.is_filter() {
                return Err(WizardError::Confirmation { key: "wrong_confirm" });
            }
            Ok(StepResult::Patch {
                field,
                value: FieldValue::Codes(buffers.selection.clone()),
            })
        }
        other => Err(WizardError::StaleSelection(format!("{other:?} on checklist"))),
    }
}

/// One press captures one code.
pub fn handle_choice(
    action: Action,
    def: &StepDefinition,
    field: FieldName,
    markup: &Keyboard,
) -> Result<StepResult, WizardError> {
    match action {
        Action::Choice(code) if codes(markup).contains(&code) => Ok(StepResult::Patch {
            field,
            value: FieldValue::Text(code),
        }),
        Action::Skip if def.skip => Ok(StepResult::Patch {
            field,
            value: FieldValue::Text(String::new()),
        }),
        other => Err(WizardError::StaleSelection(format!("{other:?} on choice"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channels::Button;
    use crate::wizard::step::StepId;

    fn markup() -> Keyboard {
        vec![
            vec![Button::new("B", "B"), Button::new("C", "C")],
            vec![Button::new("D", "D")],
        ]
    }

    fn run(mode: Mode, buffers: &mut StepBuffers, action: Action) -> Result<StepResult, WizardError> {
        let def = StepId::CarTypes.definition(mode);
        handle(action, &def, FieldName::CarTypes, mode, &markup(), buffers)
    }

    #[test]
    fn toggle_and_confirm() {
        let mut b = StepBuffers::default();
        run(Mode::Registration, &mut b, Action::Choice("C".into())).unwrap();
        run(Mode::Registration, &mut b, Action::Choice("B".into())).unwrap();
        run(Mode::Registration, &mut b, Action::Choice("C".into())).unwrap();
        assert_eq!(b.selection, vec!["B".to_string()]);

        let result = run(Mode::Registration, &mut b, Action::Confirm).unwrap();
        assert_eq!(
            result,
            StepResult::Patch {
                field: FieldName::CarTypes,
                value: FieldValue::Codes(vec!["B".into()])
            }
        );
    }

    #[test]
    fn bulk_actions() {
        let mut b = StepBuffers::default();
        run(Mode::Registration, &mut b, Action::CheckAll).unwrap();
        assert_eq!(b.selection.len(), 3);
        let kb = keyboard(&markup(), &b);
        assert!(kb.iter().flatten().all(|btn| btn.text.starts_with('✅')));

        run(Mode::Registration, &mut b, Action::UncheckAll).unwrap();
        assert!(b.selection.is_empty());
        assert_eq!(
            run(Mode::Registration, &mut b, Action::UncheckAll).unwrap(),
            StepResult::Unchanged
        );
    }

    #[test]
    fn empty_confirm_depends_on_mode() {
        let mut b = StepBuffers::default();
        assert_eq!(
            run(Mode::EditField, &mut b, Action::Confirm).unwrap_err(),
            WizardError::Confirmation { key: "wrong_confirm" }
        );
        assert_eq!(
            run(Mode::CompanyFilter, &mut b, Action::Confirm).unwrap(),
            StepResult::Patch {
                field: FieldName::CarTypes,
                value: FieldValue::Codes(Vec::new())
            }
        );
    }

    #[test]
    fn unknown_codes_are_stale() {
        let mut b = StepBuffers::default();
        assert!(matches!(
            run(Mode::Registration, &mut b, Action::Choice("Z".into())),
            Err(WizardError::StaleSelection(_))
        ));
        assert!(b.selection.is_empty());
    }

    #[test]
    fn choice_captures_and_skips() {
        let def = StepId::WorkType.definition(Mode::Registration);
        let markup = vec![vec![Button::new("Full", "full")]];
        assert_eq!(
            handle_choice(Action::Choice("full".into()), &def, FieldName::WorkType, &markup).unwrap(),
            StepResult::Patch {
                field: FieldName::WorkType,
                value: FieldValue::Text("full".into())
            }
        );
        assert_eq!(
            handle_choice(Action::Skip, &def, FieldName::WorkType, &markup).unwrap(),
            StepResult::Patch {
                field: FieldName::WorkType,
                value: FieldValue::Text(String::new())
            }
        );

        let crew = StepId::Crew.definition(Mode::Registration);
        assert!(handle_choice(Action::Skip, &crew, FieldName::Crew, &markup).is_err());
    }
}
