//! Answer model: the driver profile, the company filter and the field
//! contract they share.

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use rust_decimal::Decimal;

use crate::error::FormError;

/// Every field the wizard can collect, in summary order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum FieldName {
    Name,
    BirthYear,
    PhoneNumber,
    Messangers,
    CarTypes,
    Citizenships,
    BasisOfStay,
    Availability95Code,
    DateStartWork,
    LanguageSkills,
    JobExperience,
    NeedInternship,
    UnsuitableCountries,
    DangerousGoods,
    ExpectedSalary,
    CategoriesAvailability,
    CountryDrivingLicence,
    CountryCurrentLive,
    WorkType,
    Cadence,
    Crew,
    DriverGender,
}

/// How a driver-side value is shaped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Text,
    Year,
    Date,
    Salary,
    /// One code from a fixed list.
    Single,
    /// A set of codes.
    Multi,
}

impl FieldName {
    pub const ALL: [FieldName; 22] = [
        FieldName::Name,
        FieldName::BirthYear,
        FieldName::PhoneNumber,
        FieldName::Messangers,
        FieldName::CarTypes,
        FieldName::Citizenships,
        FieldName::BasisOfStay,
        FieldName::Availability95Code,
        FieldName::DateStartWork,
        FieldName::LanguageSkills,
        FieldName::JobExperience,
        FieldName::NeedInternship,
        FieldName::UnsuitableCountries,
        FieldName::DangerousGoods,
        FieldName::ExpectedSalary,
        FieldName::CategoriesAvailability,
        FieldName::CountryDrivingLicence,
        FieldName::CountryCurrentLive,
        FieldName::WorkType,
        FieldName::Cadence,
        FieldName::Crew,
        FieldName::DriverGender,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FieldName::Name => "name",
            FieldName::BirthYear => "birth_year",
            FieldName::PhoneNumber => "phone_number",
            FieldName::Messangers => "messangers",
            FieldName::CarTypes => "car_types",
            FieldName::Citizenships => "citizenships",
            FieldName::BasisOfStay => "basis_of_stay",
            FieldName::Availability95Code => "availability_95_code",
            FieldName::DateStartWork => "date_start_work",
            FieldName::LanguageSkills => "language_skills",
            FieldName::JobExperience => "job_experience",
            FieldName::NeedInternship => "need_internship",
            FieldName::UnsuitableCountries => "unsuitable_countries",
            FieldName::DangerousGoods => "dangerous_goods",
            FieldName::ExpectedSalary => "expected_salary",
            FieldName::CategoriesAvailability => "categories_availability",
            FieldName::CountryDrivingLicence => "country_driving_licence",
            FieldName::CountryCurrentLive => "country_current_live",
            FieldName::WorkType => "work_type",
            FieldName::Cadence => "cadence",
            FieldName::Crew => "crew",
            FieldName::DriverGender => "driver_gender",
        }
    }

    pub fn kind(self) -> FieldKind {
        match self {
            FieldName::Name | FieldName::PhoneNumber => FieldKind::Text,
            FieldName::BirthYear => FieldKind::Year,
            FieldName::DateStartWork => FieldKind::Date,
            FieldName::ExpectedSalary => FieldKind::Salary,
            FieldName::BasisOfStay
            | FieldName::Availability95Code
            | FieldName::NeedInternship
            | FieldName::CountryDrivingLicence
            | FieldName::CountryCurrentLive
            | FieldName::WorkType
            | FieldName::Crew
            | FieldName::DriverGender => FieldKind::Single,
            FieldName::Messangers
            | FieldName::CarTypes
            | FieldName::Citizenships
            | FieldName::LanguageSkills
            | FieldName::JobExperience
            | FieldName::UnsuitableCountries
            | FieldName::DangerousGoods
            | FieldName::CategoriesAvailability
            | FieldName::Cadence => FieldKind::Multi,
        }
    }

    /// Markup whose buttons label this field's codes. Country fields use
    /// the country catalog instead and return `None`.
    pub fn markup_key(self) -> Option<&'static str> {
        match self {
            FieldName::Messangers => Some("messangers"),
            FieldName::CarTypes => Some("car_types"),
            FieldName::BasisOfStay => Some("basis_of_stay"),
            FieldName::Availability95Code => Some("availability_95_code"),
            FieldName::LanguageSkills => Some("language_skills"),
            FieldName::JobExperience => Some("job_experience"),
            FieldName::NeedInternship => Some("need_internship"),
            FieldName::DangerousGoods => Some("dangerous_goods"),
            FieldName::CategoriesAvailability => Some("categories_availability"),
            FieldName::WorkType => Some("work_types"),
            FieldName::Cadence => Some("cadence"),
            FieldName::Crew => Some("crew"),
            FieldName::DriverGender => Some("genders"),
            _ => None,
        }
    }

    pub fn is_country(self) -> bool {
        matches!(
            self,
            FieldName::Citizenships
                | FieldName::UnsuitableCountries
                | FieldName::CountryDrivingLicence
                | FieldName::CountryCurrentLive
        )
    }

    /// Row-by-column selector fields (`row:col` codes).
    pub fn is_grid(self) -> bool {
        matches!(self, FieldName::LanguageSkills | FieldName::JobExperience)
    }

    /// Fields still shown when the summary is collapsed.
    pub fn is_head(self) -> bool {
        matches!(
            self,
            FieldName::Name | FieldName::BirthYear | FieldName::PhoneNumber
        )
    }

    /// Fields a company filters by a `[left, right]` range.
    pub fn is_range_filter(self) -> bool {
        matches!(
            self,
            FieldName::BirthYear | FieldName::DateStartWork | FieldName::ExpectedSalary
        )
    }

    /// Fields that exist on the company filter.
    pub fn is_filterable(self) -> bool {
        !matches!(
            self,
            FieldName::Name | FieldName::PhoneNumber | FieldName::Messangers
        )
    }
}

impl fmt::Display for FieldName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldName {
    type Err = FormError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldName::ALL
            .into_iter()
            .find(|f| f.as_str() == s)
            .ok_or_else(|| FormError::UnknownField(s.to_string()))
    }
}

/// A captured value.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldValue {
    Text(String),
    Int(i32),
    Number(Decimal),
    Date(NaiveDate),
    Codes(Vec<String>),
    YearRange(i32, i32),
    DateRange(NaiveDate, NaiveDate),
    NumberRange(Decimal, Decimal),
}

impl FieldValue {
    fn kind_name(&self) -> &'static str {
        match self {
            FieldValue::Text(_) => "text",
            FieldValue::Int(_) => "integer",
            FieldValue::Number(_) => "number",
            FieldValue::Date(_) => "date",
            FieldValue::Codes(_) => "code list",
            FieldValue::YearRange(..) | FieldValue::DateRange(..) | FieldValue::NumberRange(..) => {
                "range"
            }
        }
    }

    pub fn as_codes(&self) -> Option<&[String]> {
        match self {
            FieldValue::Codes(c) => Some(c),
            _ => None,
        }
    }
}

/// A pair of range edges with `left <= right`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Edges<T> {
    pub left: T,
    pub right: T,
}

impl<T: PartialOrd> Edges<T> {
    /// Build edges from two captures in any order.
    pub fn ordered(a: T, b: T) -> Self {
        if a <= b {
            Self { left: a, right: b }
        } else {
            Self { left: b, right: a }
        }
    }
}

/// Read access shared by both form kinds. The summary renderer and the
/// pricing engine only see forms through this trait.
pub trait FormView {
    /// Fields this form carries, in summary order.
    fn fields(&self) -> &'static [FieldName];

    /// Current value of `field`, `None` when unset.
    fn value(&self, field: FieldName) -> Option<FieldValue>;
}

fn mismatch(field: FieldName, value: &FieldValue) -> FormError {
    FormError::TypeMismatch {
        field: field.to_string(),
        kind: value.kind_name(),
    }
}

// ── Driver profile ──────────────────────────────────────────────────

/// A driver's answers.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DriverProfile {
    pub name: Option<String>,
    pub birth_year: Option<i32>,
    pub phone_number: Option<String>,
    pub messangers: Option<Vec<String>>,
    pub car_types: Option<Vec<String>>,
    pub citizenships: Option<Vec<String>>,
    pub basis_of_stay: Option<String>,
    pub availability_95_code: Option<String>,
    pub date_start_work: Option<NaiveDate>,
    pub language_skills: Option<Vec<String>>,
    pub job_experience: Option<Vec<String>>,
    pub need_internship: Option<String>,
    pub unsuitable_countries: Option<Vec<String>>,
    pub dangerous_goods: Option<Vec<String>>,
    pub expected_salary: Option<Decimal>,
    pub categories_availability: Option<Vec<String>>,
    pub country_driving_licence: Option<String>,
    pub country_current_live: Option<String>,
    pub work_type: Option<String>,
    pub cadence: Option<Vec<String>>,
    pub crew: Option<String>,
    pub driver_gender: Option<String>,
}

impl DriverProfile {
    fn single_mut(&mut self, field: FieldName) -> Option<&mut Option<String>> {
        match field {
            FieldName::Name => Some(&mut self.name),
            FieldName::PhoneNumber => Some(&mut self.phone_number),
            FieldName::BasisOfStay => Some(&mut self.basis_of_stay),
            FieldName::Availability95Code => Some(&mut self.availability_95_code),
            FieldName::NeedInternship => Some(&mut self.need_internship),
            FieldName::CountryDrivingLicence => Some(&mut self.country_driving_licence),
            FieldName::CountryCurrentLive => Some(&mut self.country_current_live),
            FieldName::WorkType => Some(&mut self.work_type),
            FieldName::Crew => Some(&mut self.crew),
            FieldName::DriverGender => Some(&mut self.driver_gender),
            _ => None,
        }
    }

    fn codes_mut(&mut self, field: FieldName) -> Option<&mut Option<Vec<String>>> {
        match field {
            FieldName::Messangers => Some(&mut self.messangers),
            FieldName::CarTypes => Some(&mut self.car_types),
            FieldName::Citizenships => Some(&mut self.citizenships),
            FieldName::LanguageSkills => Some(&mut self.language_skills),
            FieldName::JobExperience => Some(&mut self.job_experience),
            FieldName::UnsuitableCountries => Some(&mut self.unsuitable_countries),
            FieldName::DangerousGoods => Some(&mut self.dangerous_goods),
            FieldName::CategoriesAvailability => Some(&mut self.categories_availability),
            FieldName::Cadence => Some(&mut self.cadence),
            _ => None,
        }
    }

    fn single(&self, field: FieldName) -> Option<&Option<String>> {
        match field {
            FieldName::Name => Some(&self.name),
            FieldName::PhoneNumber => Some(&self.phone_number),
            FieldName::BasisOfStay => Some(&self.basis_of_stay),
            FieldName::Availability95Code => Some(&self.availability_95_code),
            FieldName::NeedInternship => Some(&self.need_internship),
            FieldName::CountryDrivingLicence => Some(&self.country_driving_licence),
            FieldName::CountryCurrentLive => Some(&self.country_current_live),
            FieldName::WorkType => Some(&self.work_type),
            FieldName::Crew => Some(&self.crew),
            FieldName::DriverGender => Some(&self.driver_gender),
            _ => None,
        }
    }

    fn codes(&self, field: FieldName) -> Option<&Option<Vec<String>>> {
        match field {
            FieldName::Messangers => Some(&self.messangers),
            FieldName::CarTypes => Some(&self.car_types),
            FieldName::Citizenships => Some(&self.citizenships),
            FieldName::LanguageSkills => Some(&self.language_skills),
            FieldName::JobExperience => Some(&self.job_experience),
            FieldName::UnsuitableCountries => Some(&self.unsuitable_countries),
            FieldName::DangerousGoods => Some(&self.dangerous_goods),
            FieldName::CategoriesAvailability => Some(&self.categories_availability),
            FieldName::Cadence => Some(&self.cadence),
            _ => None,
        }
    }

    /// Store a captured value. The value shape must match the field.
    pub fn set(&mut self, field: FieldName, value: FieldValue) -> Result<(), FormError> {
        match (field, value) {
            (FieldName::BirthYear, FieldValue::Int(y)) => self.birth_year = Some(y),
            (FieldName::DateStartWork, FieldValue::Date(d)) => self.date_start_work = Some(d),
            (FieldName::ExpectedSalary, FieldValue::Number(n)) => self.expected_salary = Some(n),
            (f, FieldValue::Text(t)) if self.single(f).is_some() => {
                if let Some(slot) = self.single_mut(f) {
                    *slot = Some(t);
                }
            }
            (f, FieldValue::Codes(c)) if self.codes(f).is_some() => {
                if let Some(slot) = self.codes_mut(f) {
                    *slot = Some(c);
                }
            }
            (f, v) => return Err(mismatch(f, &v)),
        }
        Ok(())
    }

    pub fn clear(&mut self, field: FieldName) {
        match field {
            FieldName::BirthYear => self.birth_year = None,
            FieldName::DateStartWork => self.date_start_work = None,
            FieldName::ExpectedSalary => self.expected_salary = None,
            f => {
                if let Some(slot) = self.single_mut(f) {
                    *slot = None;
                } else if let Some(slot) = self.codes_mut(f) {
                    *slot = None;
                }
            }
        }
    }

    /// Non-null fields as a persistable patch, in summary order.
    pub fn to_patch(&self) -> Vec<(FieldName, FieldValue)> {
        FieldName::ALL
            .into_iter()
            .filter_map(|f| self.value(f).map(|v| (f, v)))
            .collect()
    }

    /// Every field has been answered.
    pub fn is_complete(&self) -> bool {
        FieldName::ALL.into_iter().all(|f| self.value(f).is_some())
    }
}

impl FormView for DriverProfile {
    fn fields(&self) -> &'static [FieldName] {
        &FieldName::ALL
    }

    fn value(&self, field: FieldName) -> Option<FieldValue> {
        match field {
            FieldName::BirthYear => self.birth_year.map(FieldValue::Int),
            FieldName::DateStartWork => self.date_start_work.map(FieldValue::Date),
            FieldName::ExpectedSalary => self.expected_salary.map(FieldValue::Number),
            f => {
                if let Some(slot) = self.single(f) {
                    slot.clone().map(FieldValue::Text)
                } else {
                    self.codes(f)
                        .and_then(|slot| slot.clone())
                        .map(FieldValue::Codes)
                }
            }
        }
    }
}

// ── Company filter ──────────────────────────────────────────────────

/// Filterable fields, in summary order.
pub const FILTER_FIELDS: [FieldName; 19] = [
    FieldName::BirthYear,
    FieldName::CarTypes,
    FieldName::Citizenships,
    FieldName::BasisOfStay,
    FieldName::Availability95Code,
    FieldName::DateStartWork,
    FieldName::LanguageSkills,
    FieldName::JobExperience,
    FieldName::NeedInternship,
    FieldName::UnsuitableCountries,
    FieldName::DangerousGoods,
    FieldName::ExpectedSalary,
    FieldName::CategoriesAvailability,
    FieldName::CountryDrivingLicence,
    FieldName::CountryCurrentLive,
    FieldName::WorkType,
    FieldName::Cadence,
    FieldName::Crew,
    FieldName::DriverGender,
];

/// A company's search filters. Ranges for numeric and date fields,
/// "any of" / "all of" code lists for the rest.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompanyFilter {
    pub birth_year: Option<Edges<i32>>,
    pub date_start_work: Option<Edges<NaiveDate>>,
    pub expected_salary: Option<Edges<Decimal>>,
    pub car_types: Option<Vec<String>>,
    pub citizenships: Option<Vec<String>>,
    pub basis_of_stay: Option<Vec<String>>,
    pub availability_95_code: Option<Vec<String>>,
    pub language_skills: Option<Vec<String>>,
    pub job_experience: Option<Vec<String>>,
    pub need_internship: Option<Vec<String>>,
    pub unsuitable_countries: Option<Vec<String>>,
    pub dangerous_goods: Option<Vec<String>>,
    pub categories_availability: Option<Vec<String>>,
    pub country_driving_licence: Option<Vec<String>>,
    pub country_current_live: Option<Vec<String>>,
    pub work_type: Option<Vec<String>>,
    pub cadence: Option<Vec<String>>,
    pub crew: Option<Vec<String>>,
    pub driver_gender: Option<Vec<String>>,
}

impl CompanyFilter {
    fn codes_slot(&mut self, field: FieldName) -> Option<&mut Option<Vec<String>>> {
        match field {
            FieldName::CarTypes => Some(&mut self.car_types),
            FieldName::Citizenships => Some(&mut self.citizenships),
            FieldName::BasisOfStay => Some(&mut self.basis_of_stay),
            FieldName::Availability95Code => Some(&mut self.availability_95_code),
            FieldName::LanguageSkills => Some(&mut self.language_skills),
            FieldName::JobExperience => Some(&mut self.job_experience),
            FieldName::NeedInternship => Some(&mut self.need_internship),
            FieldName::UnsuitableCountries => Some(&mut self.unsuitable_countries),
            FieldName::DangerousGoods => Some(&mut self.dangerous_goods),
            FieldName::CategoriesAvailability => Some(&mut self.categories_availability),
            FieldName::CountryDrivingLicence => Some(&mut self.country_driving_licence),
            FieldName::CountryCurrentLive => Some(&mut self.country_current_live),
            FieldName::WorkType => Some(&mut self.work_type),
            FieldName::Cadence => Some(&mut self.cadence),
            FieldName::Crew => Some(&mut self.crew),
            FieldName::DriverGender => Some(&mut self.driver_gender),
            _ => None,
        }
    }

    /// Code list for a set-valued filter.
    pub fn codes(&self, field: FieldName) -> Option<&[String]> {
        let slot = match field {
            FieldName::CarTypes => &self.car_types,
            FieldName::Citizenships => &self.citizenships,
            FieldName::BasisOfStay => &self.basis_of_stay,
            FieldName::Availability95Code => &self.availability_95_code,
            FieldName::LanguageSkills => &self.language_skills,
            FieldName::JobExperience => &self.job_experience,
            FieldName::NeedInternship => &self.need_internship,
            FieldName::UnsuitableCountries => &self.unsuitable_countries,
            FieldName::DangerousGoods => &self.dangerous_goods,
            FieldName::CategoriesAvailability => &self.categories_availability,
            FieldName::CountryDrivingLicence => &self.country_driving_licence,
            FieldName::CountryCurrentLive => &self.country_current_live,
            FieldName::WorkType => &self.work_type,
            FieldName::Cadence => &self.cadence,
            FieldName::Crew => &self.crew,
            FieldName::DriverGender => &self.driver_gender,
            _ => return None,
        };
        slot.as_deref()
    }

    /// Store a code-list filter. An empty list clears the filter.
    pub fn set_codes(&mut self, field: FieldName, codes: Vec<String>) -> Result<(), FormError> {
        let slot = self
            .codes_slot(field)
            .ok_or_else(|| FormError::UnsupportedField(field.to_string()))?;
        *slot = if codes.is_empty() { None } else { Some(codes) };
        Ok(())
    }

    /// Store a range from two captures in any order.
    pub fn set_range(
        &mut self,
        field: FieldName,
        a: FieldValue,
        b: FieldValue,
    ) -> Result<(), FormError> {
        match (field, a, b) {
            (FieldName::BirthYear, FieldValue::Int(a), FieldValue::Int(b)) => {
                self.birth_year = Some(Edges::ordered(a, b));
            }
            (FieldName::DateStartWork, FieldValue::Date(a), FieldValue::Date(b)) => {
                self.date_start_work = Some(Edges::ordered(a, b));
            }
            (FieldName::ExpectedSalary, FieldValue::Number(a), FieldValue::Number(b)) => {
                self.expected_salary = Some(Edges::ordered(a, b));
            }
            (f, a, _) => return Err(mismatch(f, &a)),
        }
        Ok(())
    }

    /// Store any filter value: code lists or already-ordered ranges.
    pub fn set(&mut self, field: FieldName, value: FieldValue) -> Result<(), FormError> {
        match value {
            FieldValue::Codes(c) => self.set_codes(field, c),
            FieldValue::YearRange(a, b) => {
                self.set_range(field, FieldValue::Int(a), FieldValue::Int(b))
            }
            FieldValue::DateRange(a, b) => {
                self.set_range(field, FieldValue::Date(a), FieldValue::Date(b))
            }
            FieldValue::NumberRange(a, b) => {
                self.set_range(field, FieldValue::Number(a), FieldValue::Number(b))
            }
            other => Err(mismatch(field, &other)),
        }
    }

    pub fn clear(&mut self, field: FieldName) {
        match field {
            FieldName::BirthYear => self.birth_year = None,
            FieldName::DateStartWork => self.date_start_work = None,
            FieldName::ExpectedSalary => self.expected_salary = None,
            f => {
                if let Some(slot) = self.codes_slot(f) {
                    *slot = None;
                }
            }
        }
    }

    /// No filter is set.
    pub fn is_empty(&self) -> bool {
        FILTER_FIELDS.into_iter().all(|f| self.value(f).is_none())
    }
}

impl FormView for CompanyFilter {
    fn fields(&self) -> &'static [FieldName] {
        &FILTER_FIELDS
    }

    fn value(&self, field: FieldName) -> Option<FieldValue> {
        match field {
            FieldName::BirthYear => self
                .birth_year
                .map(|e| FieldValue::YearRange(e.left, e.right)),
            FieldName::DateStartWork => self
                .date_start_work
                .map(|e| FieldValue::DateRange(e.left, e.right)),
            FieldName::ExpectedSalary => self
                .expected_salary
                .map(|e| FieldValue::NumberRange(e.left, e.right)),
            f => self.codes(f).map(|c| FieldValue::Codes(c.to_vec())),
        }
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal_macros::dec;

    use super::*;

    fn codes(items: &[&str]) -> FieldValue {
        FieldValue::Codes(items.iter().map(|s| s.to_string()).collect())
    }

    #[test]
    fn field_names_roundtrip_through_str() {
        for f in FieldName::ALL {
            assert_eq!(f.as_str().parse::<FieldName>().unwrap(), f);
        }
        assert!("salary".parse::<FieldName>().is_err());
    }

    #[test]
    fn filter_fields_are_the_filterable_ones() {
        let expected: Vec<FieldName> = FieldName::ALL
            .into_iter()
            .filter(|f| f.is_filterable())
            .collect();
        assert_eq!(expected, FILTER_FIELDS.to_vec());
    }

    #[test]
    fn driver_set_and_clear() {
        let mut p = DriverProfile::default();
        p.set(FieldName::BirthYear, FieldValue::Int(1990)).unwrap();
        p.set(FieldName::CarTypes, codes(&["B", "C"])).unwrap();
        p.set(FieldName::Crew, FieldValue::Text("solo".into())).unwrap();
        assert_eq!(p.birth_year, Some(1990));
        assert_eq!(p.value(FieldName::CarTypes), Some(codes(&["B", "C"])));

        p.clear(FieldName::CarTypes);
        assert!(p.car_types.is_none());
        assert_eq!(p.birth_year, Some(1990));
    }

    #[test]
    fn driver_rejects_wrong_shape() {
        let mut p = DriverProfile::default();
        assert!(p.set(FieldName::BirthYear, FieldValue::Text("x".into())).is_err());
        assert!(p.set(FieldName::CarTypes, FieldValue::Text("B".into())).is_err());
        assert!(p.set(FieldName::Crew, codes(&["solo"])).is_err());
    }

    #[test]
    fn patch_contains_only_set_fields_in_order() {
        let mut p = DriverProfile::default();
        p.set(FieldName::Name, FieldValue::Text("Jan".into())).unwrap();
        p.set(FieldName::ExpectedSalary, FieldValue::Number(dec!(80))).unwrap();
        p.set(FieldName::UnsuitableCountries, codes(&[])).unwrap();

        let fields: Vec<FieldName> = p.to_patch().into_iter().map(|(f, _)| f).collect();
        assert_eq!(
            fields,
            vec![
                FieldName::Name,
                FieldName::UnsuitableCountries,
                FieldName::ExpectedSalary
            ]
        );
        assert!(!p.is_complete());
    }

    #[test]
    fn range_edges_are_reordered() {
        let mut f = CompanyFilter::default();
        f.set_range(FieldName::BirthYear, FieldValue::Int(1999), FieldValue::Int(1970))
            .unwrap();
        assert_eq!(f.birth_year, Some(Edges { left: 1970, right: 1999 }));

        f.set_range(
            FieldName::ExpectedSalary,
            FieldValue::Number(dec!(120)),
            FieldValue::Number(dec!(60)),
        )
        .unwrap();
        assert_eq!(
            f.value(FieldName::ExpectedSalary),
            Some(FieldValue::NumberRange(dec!(60), dec!(120)))
        );
    }

    #[test]
    fn empty_code_list_clears_filter() {
        let mut f = CompanyFilter::default();
        f.set_codes(FieldName::CarTypes, vec!["B".into()]).unwrap();
        assert!(!f.is_empty());
        f.set_codes(FieldName::CarTypes, Vec::new()).unwrap();
        assert!(f.is_empty());
    }

    #[test]
    fn filter_rejects_driver_only_fields() {
        let mut f = CompanyFilter::default();
        assert!(f.set_codes(FieldName::Messangers, vec!["tg".into()]).is_err());
        assert!(f.set(FieldName::Name, FieldValue::Text("x".into())).is_err());
    }
}
