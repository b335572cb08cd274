//! Row-by-column selector grid (languages by level, experience by years).
//!
//! The grid markup lists its rows as `row:<id>` buttons and its columns
//! as `col:<id>` buttons. Selections are stored as `<row>:<col>` codes,
//! at most one per row.

use crate::channels::{Button, Keyboard};
use crate::error::WizardError;
use crate::form::{FieldName, FieldValue};
use crate::localization::Catalog;
use crate::wizard::action::{self, Action, grid_row_code};
use crate::wizard::context::StepBuffers;
use crate::wizard::flow::StepResult;
use crate::wizard::keyboard::{checked, control};
use crate::wizard::step::Mode;

/// Distinct rows a driver must fill before confirming.
pub const MIN_ROWS: usize = 3;

const ROWS_PER_LINE: usize = 2;
const COLS_PER_LINE: usize = 3;

/// Row and column labels of one grid.
#[derive(Debug, Clone, Default)]
pub struct Grid {
    rows: Vec<(String, String)>,
    cols: Vec<(String, String)>,
}

impl Grid {
    pub fn from_markup(markup: &Keyboard) -> Self {
        let mut grid = Self::default();
        for b in markup.iter().flatten() {
            if let Some(id) = b.action.strip_prefix("row:") {
                grid.rows.push((id.to_string(), b.text.clone()));
            } else if let Some(id) = b.action.strip_prefix("col:") {
                grid.cols.push((id.to_string(), b.text.clone()));
            }
        }
        grid
    }

    fn has_row(&self, id: &str) -> bool {
        self.rows.iter().any(|(r, _)| r == id)
    }

    fn has_col(&self, id: &str) -> bool {
        self.cols.iter().any(|(c, _)| c == id)
    }

    fn col_label<'a>(&'a self, id: &'a str) -> &'a str {
        self.cols
            .iter()
            .find(|(c, _)| c == id)
            .map_or(id, |(_, label)| label.as_str())
    }

    /// One button per row; filled rows show their column.
    pub fn overview(&self, selection: &[String]) -> Keyboard {
        let buttons: Vec<Button> = self
            .rows
            .iter()
            .map(|(id, label)| {
                let text = match selected_col(selection, id) {
                    Some(col) => format!("🟢 {label}: {}", self.col_label(col)),
                    None => label.clone(),
                };
                Button::new(text, grid_row_code(id))
            })
            .collect();
        buttons.chunks(ROWS_PER_LINE).map(<[Button]>::to_vec).collect()
    }

    /// Column choices for one row.
    pub fn row_view(&self, row: &str, selection: &[String], catalog: &Catalog, lang: &str) -> Keyboard {
        let current = selected_col(selection, row);
        let buttons: Vec<Button> = self
            .cols
            .iter()
            .map(|(id, label)| {
                let text = if current == Some(id.as_str()) {
                    checked(label)
                } else {
                    label.clone()
                };
                Button::new(text, format!("{row}:{id}"))
            })
            .collect();
        let mut rows: Keyboard = buttons.chunks(COLS_PER_LINE).map(<[Button]>::to_vec).collect();
        rows.push(vec![control(catalog, lang, action::BACK_TO_MENU)]);
        rows
    }
}

fn selected_col<'a>(selection: &'a [String], row: &str) -> Option<&'a str> {
    selection
        .iter()
        .filter_map(|code| code.split_once(':'))
        .find(|(r, _)| *r == row)
        .map(|(_, c)| c)
}

fn too_few_rows(field: FieldName) -> WizardError {
    let key = match field {
        FieldName::JobExperience => "wrong_job_experience",
        _ => "wrong_language_skills",
    };
    WizardError::Confirmation { key }
}

pub fn handle(
    action: Action,
    field: FieldName,
    mode: Mode,
    grid: &Grid,
    buffers: &mut StepBuffers,
) -> Result<StepResult, WizardError> {
    match action {
        Action::GridRow(row) if grid.has_row(&row) => {
            buffers.grid_row = Some(row);
            Ok(StepResult::Redraw)
        }
        Action::GridPick { row, col } if grid.has_row(&row) && grid.has_col(&col) => {
            let code = format!("{row}:{col}");
            let already = buffers.selection.contains(&code);
            buffers
                .selection
                .retain(|c| c.split_once(':').map(|(r, _)| r) != Some(row.as_str()));
            if !already {
                buffers.selection.push(code);
            }
            buffers.grid_row = None;
            Ok(StepResult::Redraw)
        }
        Action::BackToMenu if buffers.grid_row.is_some() => {
            buffers.grid_row = None;
            Ok(StepResult::Redraw)
        }
        Action::Confirm => {
            if !mode.is_filter() && buffers.selection.len() < MIN_ROWS {
                return Err(too_few_rows(field));
            }
            Ok(StepResult::Patch {
                field,
                value: FieldValue::Codes(buffers.selection.clone()),
            })
        }
        other => Err(WizardError::StaleSelection(format!("{other:?} on selector"))),
    }
}
