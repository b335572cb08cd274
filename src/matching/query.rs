//! Company filter to SQL predicate translation.
//!
//! Set-valued driver columns hold JSON arrays; containment and membership
//! are expressed with `json_each`, so each filter contributes exactly one
//! clause and one bound parameter.

use rust_decimal::prelude::ToPrimitive;

use crate::form::{CompanyFilter, FieldName};

/// Driver columns holding code sets. A filter on one of these requires the
/// driver's set to contain every filter code.
pub const CONTAINMENT_FIELDS: [FieldName; 7] = [
    FieldName::CarTypes,
    FieldName::Citizenships,
    FieldName::LanguageSkills,
    FieldName::JobExperience,
    FieldName::CategoriesAvailability,
    FieldName::Cadence,
    FieldName::DangerousGoods,
];

/// Driver columns holding one code. A filter on one of these requires the
/// driver's code to be one of the filter codes.
pub const MEMBERSHIP_FIELDS: [FieldName; 8] = [
    FieldName::BasisOfStay,
    FieldName::Availability95Code,
    FieldName::NeedInternship,
    FieldName::CountryDrivingLicence,
    FieldName::CountryCurrentLive,
    FieldName::WorkType,
    FieldName::Crew,
    FieldName::DriverGender,
];

/// Status value of drivers offered to companies.
const ACTIVELY_SEEKING: i64 = 1;

/// A bound query parameter.
#[derive(Debug, Clone, PartialEq)]
pub enum SqlParam {
    Int(i64),
    Real(f64),
    Text(String),
}

/// AND-combined predicates over the `drivers` table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchQuery {
    pub clauses: Vec<String>,
    pub params: Vec<SqlParam>,
}

impl MatchQuery {
    /// Predicates for drivers matching `filter` and not in `excluded`.
    pub fn build(filter: &CompanyFilter, excluded: &[i64]) -> Self {
        let mut q = Self::default();

        q.push("status = ?", vec![SqlParam::Int(ACTIVELY_SEEKING)]);

        if !excluded.is_empty() {
            let marks = vec!["?"; excluded.len()].join(", ");
            q.push(
                &format!("id NOT IN ({marks})"),
                excluded.iter().map(|id| SqlParam::Int(*id)).collect(),
            );
        }

        if let Some(e) = filter.birth_year {
            q.push(
                "birth_year BETWEEN ? AND ?",
                vec![SqlParam::Int(e.left.into()), SqlParam::Int(e.right.into())],
            );
        }
        if let Some(e) = filter.date_start_work {
            q.push(
                "date_start_work BETWEEN ? AND ?",
                vec![
                    SqlParam::Text(e.left.format("%Y-%m-%d").to_string()),
                    SqlParam::Text(e.right.format("%Y-%m-%d").to_string()),
                ],
            );
        }
        if let Some(e) = filter.expected_salary {
            q.push(
                "expected_salary BETWEEN ? AND ?",
                vec![
                    SqlParam::Real(e.left.to_f64().unwrap_or_default()),
                    SqlParam::Real(e.right.to_f64().unwrap_or_default()),
                ],
            );
        }

        for field in CONTAINMENT_FIELDS {
            if let Some(codes) = filter.codes(field).filter(|c| !c.is_empty()) {
                let col = field.as_str();
                q.push(
                    &format!(
                        "NOT EXISTS (SELECT 1 FROM json_each(?) AS wanted \
                         WHERE wanted.value NOT IN (SELECT value FROM json_each(drivers.{col})))"
                    ),
                    vec![json_codes(codes)],
                );
            }
        }

        for field in MEMBERSHIP_FIELDS {
            if let Some(codes) = filter.codes(field).filter(|c| !c.is_empty()) {
                let col = field.as_str();
                q.push(
                    &format!("{col} IN (SELECT value FROM json_each(?))"),
                    vec![json_codes(codes)],
                );
            }
        }

        q
    }

    fn push(&mut self, clause: &str, params: Vec<SqlParam>) {
        self.clauses.push(clause.to_string());
        self.params.extend(params);
    }

    /// Clauses joined for a `WHERE`.
    pub fn where_clause(&self) -> String {
        self.clauses.join(" AND ")
    }
}

fn json_codes(codes: &[String]) -> SqlParam {
    SqlParam::Text(serde_json::to_string(codes).unwrap_or_else(|_| "[]".to_string()))
}
