//! Menu action codes handled by the router.
//!
//! Every menu button carries a code starting with `@`, which keeps them
//! apart from the wizard's own codes. Codes are parsed into a closed enum
//! once; unknown `@` codes are dropped as stale.

use std::fmt;

use crate::form::FieldName;

/// Prefix of every router action code.
pub const MENU_PREFIX: char = '@';

/// Placeholder for a driver id inside markup action codes.
pub const ID_PLACEHOLDER: &str = "%id%";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Driver,
    Company,
}

/// A parsed menu button press.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BotAction {
    Lang(String),
    Role(Role),
    Support,
    Stats,

    // driver
    DriverStart,
    DriverMenu,
    MyForm,
    EditForm,
    EditField(FieldName),
    ResetForm,
    ResetFormConfirm,
    ToggleStatus,
    ChangeLang,

    // company
    CompanyStart,
    CompanyMenu,
    Filters(usize),
    Filter(FieldName),
    ResetFilters,
    FindDriver,
    NextDriver,
    PrevDriver,
    SaveDriver(i64),
    OpenDriver(i64),
    OpenConfirm(i64),
    Saved,
    Opened(usize),
    Subscription,
    BuySubscription,
    CancelPayment,
    CancelPaymentConfirm,
    KeepPayment,
    RemoveProfile,
    RemoveProfileConfirm,
}

impl BotAction {
    /// Parse a callback code. `None` for codes that are not menu actions
    /// or carry a malformed argument.
    pub fn parse(data: &str) -> Option<Self> {
        let code = data.strip_prefix(MENU_PREFIX)?;

        let simple = match code {
            "role:driver" => Some(BotAction::Role(Role::Driver)),
            "role:company" => Some(BotAction::Role(Role::Company)),
            "support" => Some(BotAction::Support),
            "stats" => Some(BotAction::Stats),
            "driver_start" => Some(BotAction::DriverStart),
            "driver_menu" => Some(BotAction::DriverMenu),
            "my_form" => Some(BotAction::MyForm),
            "edit_form" => Some(BotAction::EditForm),
            "reset_form" => Some(BotAction::ResetForm),
            "reset_form_yes" => Some(BotAction::ResetFormConfirm),
            "toggle_status" => Some(BotAction::ToggleStatus),
            "change_lang" => Some(BotAction::ChangeLang),
            "company_start" => Some(BotAction::CompanyStart),
            "company_menu" => Some(BotAction::CompanyMenu),
            "reset_filters" => Some(BotAction::ResetFilters),
            "find_driver" => Some(BotAction::FindDriver),
            "next_driver" => Some(BotAction::NextDriver),
            "prev_driver" => Some(BotAction::PrevDriver),
            "saved" => Some(BotAction::Saved),
            "subscription" => Some(BotAction::Subscription),
            "buy_subscription" => Some(BotAction::BuySubscription),
            "cancel_payment" => Some(BotAction::CancelPayment),
            "cancel_payment_yes" => Some(BotAction::CancelPaymentConfirm),
            "keep_payment" => Some(BotAction::KeepPayment),
            "remove_profile" => Some(BotAction::RemoveProfile),
            "remove_profile_yes" => Some(BotAction::RemoveProfileConfirm),
            _ => None,
        };
        if simple.is_some() {
            return simple;
        }

        let (head, arg) = code.split_once(':')?;
        match head {
            "lang" if !arg.is_empty() => Some(BotAction::Lang(arg.to_string())),
            "edit" => arg.parse().ok().map(BotAction::EditField),
            "filter" => arg
                .parse::<FieldName>()
                .ok()
                .filter(|f| f.is_filterable())
                .map(BotAction::Filter),
            "filters" => arg.parse().ok().map(BotAction::Filters),
            "opened" => arg.parse().ok().map(BotAction::Opened),
            "save" => arg.parse().ok().map(BotAction::SaveDriver),
            "open" => arg.parse().ok().map(BotAction::OpenDriver),
            "open_yes" => arg.parse().ok().map(BotAction::OpenConfirm),
            _ => None,
        }
    }
}

impl fmt::Display for BotAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let code = match self {
            BotAction::Lang(lang) => return write!(f, "@lang:{lang}"),
            BotAction::Role(Role::Driver) => "role:driver",
            BotAction::Role(Role::Company) => "role:company",
            BotAction::Support => "support",
            BotAction::Stats => "stats",
            BotAction::DriverStart => "driver_start",
            BotAction::DriverMenu => "driver_menu",
            BotAction::MyForm => "my_form",
            BotAction::EditForm => "edit_form",
            BotAction::EditField(field) => return write!(f, "@edit:{field}"),
            BotAction::ResetForm => "reset_form",
            BotAction::ResetFormConfirm => "reset_form_yes",
            BotAction::ToggleStatus => "toggle_status",
            BotAction::ChangeLang => "change_lang",
            BotAction::CompanyStart => "company_start",
            BotAction::CompanyMenu => "company_menu",
            BotAction::Filters(page) => return write!(f, "@filters:{page}"),
            BotAction::Filter(field) => return write!(f, "@filter:{field}"),
            BotAction::ResetFilters => "reset_filters",
            BotAction::FindDriver => "find_driver",
            BotAction::NextDriver => "next_driver",
            BotAction::PrevDriver => "prev_driver",
            BotAction::SaveDriver(id) => return write!(f, "@save:{id}"),
            BotAction::OpenDriver(id) => return write!(f, "@open:{id}"),
            BotAction::OpenConfirm(id) => return write!(f, "@open_yes:{id}"),
            BotAction::Saved => "saved",
            BotAction::Opened(page) => return write!(f, "@opened:{page}"),
            BotAction::Subscription => "subscription",
            BotAction::BuySubscription => "buy_subscription",
            BotAction::CancelPayment => "cancel_payment",
            BotAction::CancelPaymentConfirm => "cancel_payment_yes",
            BotAction::KeepPayment => "keep_payment",
            BotAction::RemoveProfile => "remove_profile",
            BotAction::RemoveProfileConfirm => "remove_profile_yes",
        };
        write!(f, "{MENU_PREFIX}{code}")
    }
}

/// Slash commands.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Start,
    Support,
    Unknown(String),
}

impl Command {
    pub fn parse(name: &str) -> Self {
        match name {
            "start" | "menu" => Command::Start,
            "support" | "help" => Command::Support,
            other => Command::Unknown(other.to_string()),
        }
    }
}
