//! Driver Hub: a chat bot matching truck drivers with hiring companies.

pub mod bot;
pub mod channels;
pub mod config;
pub mod error;
pub mod form;
pub mod localization;
pub mod matching;
pub mod payments;
pub mod store;
pub mod wizard;
