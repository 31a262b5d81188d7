use chrono::NaiveDate;
use famtree_types::Gender;

/// Day-first date format used in every prompt.
pub const DATE_FORMAT: &str = "%d-%m-%Y";

/// Rejected user input. The message is shown verbatim as the re-prompt.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum InputError {
    #[error("Invalid date format. Please use DD-MM-YYYY.")]
    InvalidDate,
    #[error("Invalid gender. Please enter Male, Female, or Other.")]
    InvalidGender,
    #[error("Invalid ID. Please enter a number.")]
    InvalidId,
    #[error("Invalid choice. Enter {0}.")]
    InvalidChoice(&'static str),
    #[error("Please enter a phone number, e.g. +1234567890.")]
    MissingPhone,
    #[error("Please enter a name.")]
    EmptyName,
    #[error("Please enter an event type.")]
    EmptyEventType,
}

/// Strict `DD-MM-YYYY`: two-digit day and month, four-digit year.
pub fn validate_dob(input: &str) -> Result<NaiveDate, InputError> {
    let input = input.trim();
    let bytes = input.as_bytes();
    let shape_ok = bytes.len() == 10
        && bytes[2] == b'-'
        && bytes[5] == b'-'
        && bytes
            .iter()
            .enumerate()
            .all(|(i, b)| i == 2 || i == 5 || b.is_ascii_digit());
    if !shape_ok {
        return Err(InputError::InvalidDate);
    }
    NaiveDate::parse_from_str(input, DATE_FORMAT).map_err(|_| InputError::InvalidDate)
}

pub fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}

pub fn validate_gender(input: &str) -> Result<Gender, InputError> {
    match input.trim().to_lowercase().as_str() {
        "male" | "m" => Ok(Gender::Male),
        "female" | "f" => Ok(Gender::Female),
        "other" | "o" => Ok(Gender::Other),
        _ => Err(InputError::InvalidGender),
    }
}

pub fn parse_id(input: &str) -> Result<i64, InputError> {
    input.trim().parse().map_err(|_| InputError::InvalidId)
}

/// Keep digits and `+`, and make sure the result starts with `+`.
/// Only presence is checked, not the numbering plan.
pub fn normalize_phone(input: &str) -> Result<String, InputError> {
    let digits: String = input.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return Err(InputError::MissingPhone);
    }
    Ok(format!("+{}", digits))
}

/// Case-insensitive match against the literal `skip`.
pub fn is_skip(input: &str) -> bool {
    input.trim().eq_ignore_ascii_case("skip")
}
