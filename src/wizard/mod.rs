//! Step wizard shared by driver registration, single-field edits and
//! company filters.
//!
//! `step` holds the registry, `flow` the pure transitions, the surface
//! modules (`checklist`, `selector`, `countries`, `input`) the per-kind
//! keyboards and captures, and `controller` the I/O around them.

pub mod action;
pub mod checklist;
pub mod context;
pub mod controller;
pub mod countries;
pub mod flow;
pub mod input;
pub mod keyboard;
pub mod selector;
pub mod step;

pub use context::{Form, WizardContext};
pub use controller::{WizardController, WizardOutcome};
pub use flow::{StepEnv, StepResult, WizardInput};
pub use step::{Mode, StepId};
