//! Pure step transitions and prompt rendering.
//!
//! `process` interprets one input against the current step and returns a
//! [`StepResult`]; it never performs I/O. The controller applies results.

use chrono::{Datelike, NaiveDate};
use rust_decimal::Decimal;

use crate::channels::Keyboard;
use crate::error::WizardError;
use crate::form::{FieldName, FieldValue, RuleTable, compute_price, render_summary};
use crate::localization::Catalog;
use crate::wizard::action::{self, Action};
use crate::wizard::context::WizardContext;
use crate::wizard::input::{
    YearWindow, calendar_keyboard, first_of_month, validate_name, validate_phone, validate_salary,
    validate_salary_range,
};
use crate::wizard::keyboard::{Footer, control};
use crate::wizard::step::{StepDefinition, Surface, TextInput};
use crate::wizard::{checklist, countries, selector};

/// Placeholder replaced by the computed price on the confirmation step.
pub const PRICE_PLACEHOLDER: &str = "%form_price%";

/// Read-only inputs a step needs besides the context.
#[derive(Clone, Copy)]
pub struct StepEnv<'a> {
    pub catalog: &'a Catalog,
    pub rules: &'a RuleTable,
    pub base_price: Decimal,
    pub salary_min: Decimal,
    pub salary_max: Decimal,
    pub today: NaiveDate,
}

/// User input routed to the wizard.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WizardInput {
    Text(String),
    Action(String),
}

/// What a step decided.
#[derive(Debug, Clone, PartialEq)]
pub enum StepResult {
    /// Nothing to do.
    Unchanged,
    /// Selection changed; refresh the buttons in place.
    Redraw,
    /// Prompt text changed; refresh text and buttons.
    Reprompt,
    /// Leave this step for the previous one.
    Back,
    Patch {
        field: FieldName,
        value: FieldValue,
    },
    RangePatch {
        field: FieldName,
        left: FieldValue,
        right: FieldValue,
    },
    /// Confirmation step accepted.
    Confirm,
}

/// Interpret one input against the current step.
pub fn process(
    ctx: &mut WizardContext,
    input: &WizardInput,
    env: &StepEnv<'_>,
) -> Result<StepResult, WizardError> {
    let def = ctx.step.definition(ctx.mode);

    let data = match input {
        WizardInput::Text(text) => {
            return match def.surface {
                Surface::Text(kind) => capture_text(kind, text, ctx, env),
                _ => Ok(StepResult::Unchanged),
            };
        }
        WizardInput::Action(data) => data,
    };

    match Action::parse(data) {
        Action::Noop => Ok(StepResult::Unchanged),
        Action::Back => {
            // Back inside a two-pick range only drops the first pick.
            if ctx.buffers.left_edge.take().is_some() {
                ctx.buffers.year_from = None;
                ctx.buffers.month = None;
                return Ok(StepResult::Reprompt);
            }
            Ok(StepResult::Back)
        }
        Action::ToggleHidden => {
            if !ctx.step.offers_hide_toggle(ctx.mode) {
                return Err(WizardError::StaleSelection("hide toggle".into()));
            }
            ctx.hidden = !ctx.hidden;
            Ok(StepResult::Reprompt)
        }
        action => dispatch(action, &def, ctx, env),
    }
}

fn dispatch(
    action: Action,
    def: &StepDefinition,
    ctx: &mut WizardContext,
    env: &StepEnv<'_>,
) -> Result<StepResult, WizardError> {
    let lang = ctx.lang.as_str();
    let field = def.field;

    match (def.surface, field) {
        (Surface::Confirmation, _) => match action {
            Action::Confirm => Ok(StepResult::Confirm),
            other => Err(stale(&other)),
        },
        (Surface::Choice, Some(field)) => {
            let markup = field_markup(env.catalog, lang, field);
            checklist::handle_choice(action, def, field, &markup)
        }
        (Surface::Checklist, Some(field)) => {
            let markup = field_markup(env.catalog, lang, field);
            checklist::handle(action, def, field, ctx.mode, &markup, &mut ctx.buffers)
        }
        (Surface::Selector, Some(field)) => {
            let grid = selector::Grid::from_markup(&field_markup(env.catalog, lang, field));
            selector::handle(action, field, ctx.mode, &grid, &mut ctx.buffers)
        }
        (Surface::Countries, Some(field)) => countries::handle(
            action,
            def,
            field,
            ctx.mode,
            env.catalog,
            lang,
            &mut ctx.buffers,
        ),
        (Surface::YearPicker, Some(field)) => pick_year(action, def, field, ctx, env),
        (Surface::Calendar, Some(field)) => pick_day(action, def, field, ctx, env),
        _ => Err(stale(&action)),
    }
}

fn stale(action: &Action) -> WizardError {
    WizardError::StaleSelection(format!("{action:?}"))
}

fn field_markup(catalog: &Catalog, lang: &str, field: FieldName) -> Keyboard {
    field
        .markup_key()
        .map(|key| catalog.markup(lang, key))
        .unwrap_or_default()
}

fn capture_text(
    kind: TextInput,
    text: &str,
    ctx: &WizardContext,
    env: &StepEnv<'_>,
) -> Result<StepResult, WizardError> {
    match kind {
        TextInput::Name => Ok(StepResult::Patch {
            field: FieldName::Name,
            value: FieldValue::Text(validate_name(text)?),
        }),
        TextInput::Phone => Ok(StepResult::Patch {
            field: FieldName::PhoneNumber,
            value: FieldValue::Text(validate_phone(text)?),
        }),
        TextInput::Salary if ctx.mode.is_filter() => {
            let (left, right) = validate_salary_range(text, env.salary_min, env.salary_max)?;
            Ok(StepResult::RangePatch {
                field: FieldName::ExpectedSalary,
                left: FieldValue::Number(left),
                right: FieldValue::Number(right),
            })
        }
        TextInput::Salary => Ok(StepResult::Patch {
            field: FieldName::ExpectedSalary,
            value: FieldValue::Number(validate_salary(text, env.salary_min, env.salary_max)?),
        }),
    }
}

/// Capture a single value, or one edge of a two-pick range.
fn capture_pick(
    def: &StepDefinition,
    field: FieldName,
    ctx: &mut WizardContext,
    value: FieldValue,
) -> StepResult {
    if !def.two_picks {
        return StepResult::Patch { field, value };
    }
    match ctx.buffers.left_edge.take() {
        None => {
            ctx.buffers.left_edge = Some(value);
            ctx.buffers.year_from = None;
            ctx.buffers.month = None;
            StepResult::Reprompt
        }
        Some(first) => {
            let (left, right) = ordered(first, value);
            StepResult::RangePatch { field, left, right }
        }
    }
}

fn ordered(a: FieldValue, b: FieldValue) -> (FieldValue, FieldValue) {
    let swap = match (&a, &b) {
        (FieldValue::Int(x), FieldValue::Int(y)) => x > y,
        (FieldValue::Date(x), FieldValue::Date(y)) => x > y,
        (FieldValue::Number(x), FieldValue::Number(y)) => x > y,
        _ => false,
    };
    if swap { (b, a) } else { (a, b) }
}

fn year_window(ctx: &WizardContext, env: &StepEnv<'_>) -> YearWindow {
    let current = env.today.year();
    match ctx.buffers.year_from {
        Some(from) => YearWindow::starting_at(from, current),
        None => YearWindow::anchored(current),
    }
}

fn pick_year(
    action: Action,
    def: &StepDefinition,
    field: FieldName,
    ctx: &mut WizardContext,
    env: &StepEnv<'_>,
) -> Result<StepResult, WizardError> {
    let current = env.today.year();
    match action {
        Action::YearLeft(from) | Action::YearRight(from) => {
            let window = YearWindow::starting_at(from, current);
            let panned = if matches!(action, Action::YearLeft(_)) {
                window.pan_left()
            } else {
                window.pan_right()
            };
            // A pan past the limits leaves the window where it is.
            let Some(panned) = panned else {
                return Ok(StepResult::Unchanged);
            };
            ctx.buffers.year_from = Some(panned.from);
            Ok(StepResult::Redraw)
        }
        Action::Choice(code) => {
            let year: i32 = code.parse().map_err(|_| stale(&Action::Choice(code.clone())))?;
            if !year_window(ctx, env).accepts(year) {
                return Err(WizardError::StaleSelection(format!("year {year}")));
            }
            Ok(capture_pick(def, field, ctx, FieldValue::Int(year)))
        }
        other => Err(stale(&other)),
    }
}

fn pick_day(
    action: Action,
    def: &StepDefinition,
    field: FieldName,
    ctx: &mut WizardContext,
    env: &StepEnv<'_>,
) -> Result<StepResult, WizardError> {
    match action {
        Action::Day(day) if day >= env.today => {
            Ok(capture_pick(def, field, ctx, FieldValue::Date(day)))
        }
        Action::MonthPrev(month) | Action::MonthNext(month)
            if first_of_month(month) >= first_of_month(env.today) =>
        {
            ctx.buffers.month = Some(first_of_month(month));
            Ok(StepResult::Redraw)
        }
        other => Err(stale(&other)),
    }
}

// ── Rendering ───────────────────────────────────────────────────────

/// Prompt text for the current step: the localized prompt, above the
/// form summary outside filter mode.
pub fn prompt_text(ctx: &WizardContext, env: &StepEnv<'_>) -> String {
    let second_pick = ctx.buffers.left_edge.is_some();
    let mut prompt = env
        .catalog
        .text(&ctx.lang, &ctx.step.prompt_key(ctx.mode, second_pick));

    if ctx.step.definition(ctx.mode).surface == Surface::Confirmation {
        if let Some(profile) = ctx.form.as_driver() {
            let price = compute_price(profile, env.rules, env.base_price, env.catalog);
            prompt = prompt.replace(PRICE_PLACEHOLDER, &price.normalize().to_string());
        }
    }

    if ctx.mode.is_filter() {
        prompt
    } else {
        render_summary(ctx.form.view(), &prompt, &ctx.lang, env.catalog, ctx.hidden)
    }
}

/// Buttons for the current step and buffers.
pub fn keyboard(ctx: &WizardContext, env: &StepEnv<'_>) -> Keyboard {
    let def = ctx.step.definition(ctx.mode);
    let lang = ctx.lang.as_str();
    let catalog = env.catalog;
    let hide_toggle = ctx.step.offers_hide_toggle(ctx.mode);
    let footer = |skip: bool, confirm: bool| {
        Footer {
            skip,
            confirm,
            hide_toggle,
        }
        .rows(catalog, lang)
    };

    let Some(field) = def.field else {
        return footer(false, true);
    };

    let mut rows = match def.surface {
        Surface::Text(_) | Surface::Confirmation => Vec::new(),
        Surface::Choice => field_markup(catalog, lang, field),
        Surface::Checklist => {
            let mut rows = checklist::keyboard(&field_markup(catalog, lang, field), &ctx.buffers);
            rows.push(vec![
                control(catalog, lang, action::CHECK_ALL),
                control(catalog, lang, action::UNCHECK_ALL),
            ]);
            rows
        }
        Surface::Selector => {
            let grid = selector::Grid::from_markup(&field_markup(catalog, lang, field));
            if let Some(row) = &ctx.buffers.grid_row {
                // The column view has its own way out.
                return grid.row_view(row, &ctx.buffers.selection, catalog, lang);
            }
            grid.overview(&ctx.buffers.selection)
        }
        Surface::Countries => countries::keyboard(catalog, lang, &def, ctx.mode, &ctx.buffers),
        Surface::YearPicker => year_window(ctx, env).keyboard(),
        Surface::Calendar => {
            let month = ctx.buffers.month.unwrap_or(env.today);
            calendar_keyboard(month, env.today, catalog, lang)
        }
    };

    let confirm = match def.surface {
        Surface::Checklist | Surface::Selector => true,
        Surface::Countries => !def.single_country,
        _ => false,
    };
    rows.extend(footer(def.skip, confirm));
    rows
}
