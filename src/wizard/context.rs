//! Per-session wizard state.

use chrono::NaiveDate;

use crate::channels::MessageRef;
use crate::error::FormError;
use crate::form::{CompanyFilter, DriverProfile, FieldName, FieldValue, FormView};
use crate::wizard::step::{Mode, StepId};

/// The form being assembled.
#[derive(Debug, Clone, PartialEq)]
pub enum Form {
    Driver(DriverProfile),
    Filter(CompanyFilter),
}

impl Form {
    pub fn view(&self) -> &dyn FormView {
        match self {
            Form::Driver(p) => p,
            Form::Filter(f) => f,
        }
    }

    pub fn value(&self, field: FieldName) -> Option<FieldValue> {
        self.view().value(field)
    }

    pub fn set(&mut self, field: FieldName, value: FieldValue) -> Result<(), FormError> {
        match self {
            Form::Driver(p) => p.set(field, value),
            Form::Filter(f) => f.set(field, value),
        }
    }

    pub fn clear(&mut self, field: FieldName) {
        match self {
            Form::Driver(p) => p.clear(field),
            Form::Filter(f) => f.clear(field),
        }
    }

    pub fn as_driver(&self) -> Option<&DriverProfile> {
        match self {
            Form::Driver(p) => Some(p),
            Form::Filter(_) => None,
        }
    }
}

/// Where the country browser is.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CountryCursor {
    pub continent: String,
    pub page: usize,
}

/// Transient selection state of the current step. Reset whenever the
/// wizard moves to another step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StepBuffers {
    /// Checked codes (checklists, countries, selector entries).
    pub selection: Vec<String>,
    /// Selector row whose columns are shown.
    pub grid_row: Option<String>,
    /// `None` shows the continent list.
    pub cursor: Option<CountryCursor>,
    /// First year of the visible window.
    pub year_from: Option<i32>,
    /// Month shown by the calendar.
    pub month: Option<NaiveDate>,
    /// First edge of a two-pick range.
    pub left_edge: Option<FieldValue>,
}

impl StepBuffers {
    /// Buffers for a step about to render, seeded from the value the form
    /// already holds.
    pub fn seeded(form: &Form, step: StepId) -> Self {
        let selection = step
            .field()
            .and_then(|f| form.value(f))
            .and_then(|v| v.as_codes().map(<[String]>::to_vec))
            .unwrap_or_default();
        Self {
            selection,
            ..Self::default()
        }
    }
}

/// Everything the wizard knows about one user's run.
#[derive(Debug, Clone)]
pub struct WizardContext {
    pub mode: Mode,
    pub step: StepId,
    pub form: Form,
    pub lang: String,
    /// Collapse the summary to head fields.
    pub hidden: bool,
    pub buffers: StepBuffers,
    /// Prompt message currently on screen.
    pub message: Option<MessageRef>,
}

impl WizardContext {
    /// Full registration from the first step.
    pub fn registration(lang: &str) -> Self {
        Self::at(
            Mode::Registration,
            StepId::BirthYear,
            Form::Driver(DriverProfile::default()),
            lang,
        )
    }

    /// Re-collect one field of an existing profile.
    pub fn edit_field(profile: DriverProfile, field: FieldName, lang: &str) -> Self {
        Self::at(
            Mode::EditField,
            StepId::for_field(field),
            Form::Driver(profile),
            lang,
        )
    }

    /// Collect one company filter.
    pub fn company_filter(filter: CompanyFilter, field: FieldName, lang: &str) -> Self {
        Self::at(
            Mode::CompanyFilter,
            StepId::for_field(field),
            Form::Filter(filter),
            lang,
        )
    }

    fn at(mode: Mode, step: StepId, form: Form, lang: &str) -> Self {
        let buffers = StepBuffers::seeded(&form, step);
        Self {
            mode,
            step,
            form,
            lang: lang.to_string(),
            hidden: false,
            buffers,
            message: None,
        }
    }

    /// Move to `step` with fresh buffers.
    pub fn enter(&mut self, step: StepId) {
        self.step = step;
        self.buffers = StepBuffers::seeded(&self.form, step);
    }

    /// Field the current step collects.
    pub fn field(&self) -> Option<FieldName> {
        self.step.field()
    }
}
