//! Step registry: which steps exist, how they are ordered, what they
//! collect and which input surface they use in each mode.

use std::fmt;

use crate::form::{FieldKind, FieldName};

/// What the wizard is being used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    /// Collect every field and persist a new driver.
    Registration,
    /// Re-collect one driver field and patch the stored profile.
    EditField,
    /// Collect one company filter and patch the stored filters.
    CompanyFilter,
}

impl Mode {
    /// Numeric status discriminator used in logs.
    pub fn status(self) -> u8 {
        match self {
            Mode::Registration => 0,
            Mode::EditField => 1,
            Mode::CompanyFilter => 2,
        }
    }

    pub fn is_filter(self) -> bool {
        self == Mode::CompanyFilter
    }
}

/// One wizard step. Declared in registration order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum StepId {
    BirthYear,
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
    PhoneNumber,
    Name,
    Confirmation,
}

/// Registration walks these in order.
pub const REGISTRATION_ORDER: [StepId; 23] = [
    StepId::BirthYear,
    StepId::Messangers,
    StepId::CarTypes,
    StepId::Citizenships,
    StepId::BasisOfStay,
    StepId::Availability95Code,
    StepId::DateStartWork,
    StepId::LanguageSkills,
    StepId::JobExperience,
    StepId::NeedInternship,
    StepId::UnsuitableCountries,
    StepId::DangerousGoods,
    StepId::ExpectedSalary,
    StepId::CategoriesAvailability,
    StepId::CountryDrivingLicence,
    StepId::CountryCurrentLive,
    StepId::WorkType,
    StepId::Cadence,
    StepId::Crew,
    StepId::DriverGender,
    StepId::PhoneNumber,
    StepId::Name,
    StepId::Confirmation,
];

/// Free-text inputs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TextInput {
    Name,
    Phone,
    Salary,
}

/// How a step collects its value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    Text(TextInput),
    /// Pick exactly one code; the press captures immediately.
    Choice,
    /// Toggle any number of codes, then confirm.
    Checklist,
    /// Row-by-column grid, one column per row.
    Selector,
    /// Continent, then a paginated country list.
    Countries,
    YearPicker,
    Calendar,
    /// Final summary with the computed price.
    Confirmation,
}

/// Static description of a step in a given mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StepDefinition {
    pub id: StepId,
    pub field: Option<FieldName>,
    pub surface: Surface,
    /// A skip button captures an empty value.
    pub skip: bool,
    /// Country steps: capture one country on press.
    pub single_country: bool,
    /// Filter ranges taken as two picks.
    pub two_picks: bool,
}

impl StepId {
    pub fn field(self) -> Option<FieldName> {
        Some(match self {
            StepId::BirthYear => FieldName::BirthYear,
            StepId::Messangers => FieldName::Messangers,
            StepId::CarTypes => FieldName::CarTypes,
            StepId::Citizenships => FieldName::Citizenships,
            StepId::BasisOfStay => FieldName::BasisOfStay,
            StepId::Availability95Code => FieldName::Availability95Code,
            StepId::DateStartWork => FieldName::DateStartWork,
            StepId::LanguageSkills => FieldName::LanguageSkills,
            StepId::JobExperience => FieldName::JobExperience,
            StepId::NeedInternship => FieldName::NeedInternship,
            StepId::UnsuitableCountries => FieldName::UnsuitableCountries,
            StepId::DangerousGoods => FieldName::DangerousGoods,
            StepId::ExpectedSalary => FieldName::ExpectedSalary,
            StepId::CategoriesAvailability => FieldName::CategoriesAvailability,
            StepId::CountryDrivingLicence => FieldName::CountryDrivingLicence,
            StepId::CountryCurrentLive => FieldName::CountryCurrentLive,
            StepId::WorkType => FieldName::WorkType,
            StepId::Cadence => FieldName::Cadence,
            StepId::Crew => FieldName::Crew,
            StepId::DriverGender => FieldName::DriverGender,
            StepId::PhoneNumber => FieldName::PhoneNumber,
            StepId::Name => FieldName::Name,
            StepId::Confirmation => return None,
        })
    }

    /// Step that collects `field`.
    pub fn for_field(field: FieldName) -> StepId {
        REGISTRATION_ORDER
            .into_iter()
            .find(|s| s.field() == Some(field))
            .unwrap_or(StepId::Confirmation)
    }

    pub fn as_str(self) -> &'static str {
        self.field().map_or("confirmation", FieldName::as_str)
    }

    fn position(self) -> usize {
        REGISTRATION_ORDER
            .iter()
            .position(|s| *s == self)
            .unwrap_or(0)
    }

    /// Following step. Only registration moves forward; the other modes
    /// finish after one capture.
    pub fn next(self, mode: Mode) -> Option<StepId> {
        match mode {
            Mode::Registration => REGISTRATION_ORDER.get(self.position() + 1).copied(),
            Mode::EditField | Mode::CompanyFilter => None,
        }
    }

    /// Preceding step. `None` leaves the wizard.
    pub fn prev(self, mode: Mode) -> Option<StepId> {
        match mode {
            Mode::Registration => self
                .position()
                .checked_sub(1)
                .and_then(|i| REGISTRATION_ORDER.get(i).copied()),
            Mode::EditField | Mode::CompanyFilter => None,
        }
    }

    /// The hide/reveal toggle is offered once the form has grown long.
    pub fn offers_hide_toggle(self, mode: Mode) -> bool {
        mode == Mode::Registration && self > StepId::Citizenships
    }

    /// Localization key of the prompt. Filter ranges picked in two steps
    /// get a `_left` / `_right` suffix.
    pub fn prompt_key(self, mode: Mode, second_pick: bool) -> String {
        let def = self.definition(mode);
        match mode {
            Mode::CompanyFilter if def.two_picks => {
                let side = if second_pick { "right" } else { "left" };
                format!("filter_{self}_{side}")
            }
            Mode::CompanyFilter => format!("filter_{self}"),
            Mode::Registration | Mode::EditField => format!("driver_{self}"),
        }
    }

    pub fn definition(self, mode: Mode) -> StepDefinition {
        let field = self.field();
        let filter = mode.is_filter();

        let surface = match self {
            StepId::Confirmation => Surface::Confirmation,
            StepId::Name => Surface::Text(TextInput::Name),
            StepId::PhoneNumber => Surface::Text(TextInput::Phone),
            StepId::ExpectedSalary => Surface::Text(TextInput::Salary),
            StepId::BirthYear => Surface::YearPicker,
            StepId::DateStartWork => Surface::Calendar,
            StepId::LanguageSkills | StepId::JobExperience => Surface::Selector,
            StepId::Citizenships
            | StepId::UnsuitableCountries
            | StepId::CountryDrivingLicence
            | StepId::CountryCurrentLive => Surface::Countries,
            _ => match field.map(FieldName::kind) {
                Some(FieldKind::Single) if !filter => Surface::Choice,
                _ => Surface::Checklist,
            },
        };

        let skip = !filter && matches!(self, StepId::UnsuitableCountries | StepId::WorkType);
        let single_country = !filter
            && matches!(
                self,
                StepId::CountryDrivingLicence | StepId::CountryCurrentLive
            );
        let two_picks = filter && matches!(self, StepId::BirthYear | StepId::DateStartWork);

        StepDefinition {
            id: self,
            field,
            surface,
            skip,
            single_country,
            two_picks,
        }
    }
}

impl fmt::Display for StepId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn registration_is_a_doubly_linked_chain() {
        let mut step = StepId::BirthYear;
        let mut walked = vec![step];
        while let Some(next) = step.next(Mode::Registration) {
            assert_eq!(next.prev(Mode::Registration), Some(step));
            walked.push(next);
            step = next;
        }
        assert_eq!(walked, REGISTRATION_ORDER.to_vec());
        assert_eq!(StepId::BirthYear.prev(Mode::Registration), None);
    }

    #[test]
    fn single_field_modes_are_terminal() {
        for mode in [Mode::EditField, Mode::CompanyFilter] {
            assert_eq!(StepId::CarTypes.next(mode), None);
            assert_eq!(StepId::CarTypes.prev(mode), None);
        }
    }

    #[test]
    fn every_field_has_a_step() {
        for field in FieldName::ALL {
            assert_eq!(StepId::for_field(field).field(), Some(field));
        }
    }

    #[test]
    fn surfaces_depend_on_mode() {
        assert_eq!(StepId::Crew.definition(Mode::Registration).surface, Surface::Choice);
        assert_eq!(StepId::Crew.definition(Mode::CompanyFilter).surface, Surface::Checklist);
        assert!(StepId::CountryCurrentLive.definition(Mode::EditField).single_country);
        assert!(!StepId::CountryCurrentLive.definition(Mode::CompanyFilter).single_country);
        assert!(StepId::UnsuitableCountries.definition(Mode::Registration).skip);
        assert!(!StepId::UnsuitableCountries.definition(Mode::CompanyFilter).skip);
    }

    #[test]
    fn prompt_keys() {
        assert_eq!(StepId::Name.prompt_key(Mode::Registration, false), "driver_name");
        assert_eq!(StepId::Name.prompt_key(Mode::EditField, false), "driver_name");
        assert_eq!(
            StepId::BirthYear.prompt_key(Mode::CompanyFilter, true),
            "filter_birth_year_right"
        );
        assert_eq!(
            StepId::ExpectedSalary.prompt_key(Mode::CompanyFilter, false),
            "filter_expected_salary"
        );
        assert_eq!(StepId::Confirmation.prompt_key(Mode::Registration, false), "driver_confirmation");
    }

    #[test]
    fn hide_toggle_starts_after_citizenships() {
        assert!(!StepId::Citizenships.offers_hide_toggle(Mode::Registration));
        assert!(StepId::BasisOfStay.offers_hide_toggle(Mode::Registration));
        assert!(!StepId::BasisOfStay.offers_hide_toggle(Mode::EditField));
    }
}
