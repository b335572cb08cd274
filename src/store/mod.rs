//! Persistence layer: libSQL-backed storage for drivers, companies and payments.

pub mod libsql_backend;
pub mod migrations;
pub mod traits;

pub use libsql_backend::LibSqlBackend;
pub use traits::{CompanyRecord, Database, DriverRecord, DriverStatus, NewDriver, ProviderRefs};
