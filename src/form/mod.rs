//! Answer model, summaries and pricing.

pub mod model;
pub mod pricing;
pub mod render;

pub use model::{
    CompanyFilter, DriverProfile, Edges, FILTER_FIELDS, FieldKind, FieldName, FieldValue, FormView,
};
pub use pricing::{RuleTable, compute_price};
pub use render::render_summary;
