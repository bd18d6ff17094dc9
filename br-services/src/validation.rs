//! Field validation rules shared by repositories and state controllers.
//!
//! Every validator is pure and returns `Err(message)` describing the first
//! problem found. Controllers run them on each input change; repositories
//! run them again before writing.

use chrono::NaiveDate;
use lazy_static::lazy_static;
use regex::Regex;

use br_core::constants::{account_limits, incident_limits};
use br_core::error::{BrError, BrResult};

/// Result of validating one field.
pub type FieldResult = Result<(), String>;

lazy_static! {
    // Letters (any script, accents included) separated by single spaces.
    static ref NAME: Regex = Regex::new(r"^\p{L}+(?: \p{L}+)*$").unwrap();

    static ref EMAIL: Regex = Regex::new(
        r"^[A-Za-z0-9._%+\-]+@[A-Za-z0-9\-]+(?:\.[A-Za-z0-9\-]+)*\.[A-Za-z]{2,}$"
    ).unwrap();

    static ref DIGITS: Regex = Regex::new(r"^[0-9]+$").unwrap();

    // http(s) URLs with a host, file URIs with an absolute path, or
    // content provider URIs handed out by a device picker.
    static ref URL: Regex =
        Regex::new(r"^(?:https?://[^\s/$.?#][^\s]*|file:///[^\s]+|content://[^\s/]+/[^\s]*)$").unwrap();

    static ref DECIMAL: Regex = Regex::new(r"^-?[0-9]+(?:\.[0-9]+)?$").unwrap();
}

/// Convert a field result into a typed validation error.
pub fn require(field: &'static str, result: FieldResult) -> BrResult<()> {
    result.map_err(|message| BrError::validation(field, message))
}

fn char_len(value: &str) -> usize {
    value.trim().chars().count()
}

fn length_between(value: &str, (min, max): (usize, usize), label: &str) -> FieldResult {
    let len = char_len(value);
    if len < min || len > max {
        return Err(format!("{label} must be between {min} and {max} characters"));
    }
    Ok(())
}

// ─── Account fields ─────────────────────────────────────────────────────────

/// Letters and single spaces only.
pub fn name(value: &str) -> FieldResult {
    let value = value.trim();
    if value.is_empty() {
        return Err("name is required".into());
    }
    if !NAME.is_match(value) {
        return Err("name may only contain letters".into());
    }
    Ok(())
}

pub fn username(value: &str) -> FieldResult {
    if value.chars().any(char::is_whitespace) {
        return Err("username cannot contain spaces".into());
    }
    if value.chars().count() < account_limits::USERNAME_MIN {
        return Err(format!("username must have at least {} characters", account_limits::USERNAME_MIN));
    }
    Ok(())
}

pub fn email(value: &str) -> FieldResult {
    let value = value.trim();
    if value.is_empty() {
        return Err("email is required".into());
    }
    if !EMAIL.is_match(value) {
        return Err("email is not valid".into());
    }
    Ok(())
}

/// Digits only, 8 to 15 of them.
pub fn phone(value: &str) -> FieldResult {
    let value = value.trim();
    if !DIGITS.is_match(value) {
        return Err("phone may only contain digits".into());
    }
    let (min, max) = account_limits::PHONE;
    if value.len() < min || value.len() > max {
        return Err(format!("phone must have between {min} and {max} digits"));
    }
    Ok(())
}

/// At least 8 characters with upper, lower, digit and symbol, and no spaces.
pub fn password(value: &str) -> FieldResult {
    if value.chars().any(char::is_whitespace) {
        return Err("password cannot contain spaces".into());
    }
    if value.chars().count() < account_limits::PASSWORD_MIN {
        return Err(format!("password must have at least {} characters", account_limits::PASSWORD_MIN));
    }
    if !value.chars().any(|c| c.is_uppercase()) {
        return Err("password needs an uppercase letter".into());
    }
    if !value.chars().any(|c| c.is_lowercase()) {
        return Err("password needs a lowercase letter".into());
    }
    if !value.chars().any(|c| c.is_ascii_digit()) {
        return Err("password needs a digit".into());
    }
    if !value.chars().any(|c| !c.is_alphanumeric()) {
        return Err("password needs a symbol".into());
    }
    Ok(())
}

pub fn password_confirmation(password: &str, confirmation: &str) -> FieldResult {
    if password != confirmation {
        return Err("passwords do not match".into());
    }
    Ok(())
}

// ─── National id ────────────────────────────────────────────────────────────

/// Digits of a national id number, with thousands separators removed.
fn run_digits(run: &str) -> String {
    run.trim().chars().filter(|c| *c != '.').collect()
}

pub fn run(value: &str) -> FieldResult {
    let digits = run_digits(value);
    if digits.is_empty() {
        return Err("RUN is required".into());
    }
    if !DIGITS.is_match(&digits) {
        return Err("RUN may only contain digits".into());
    }
    if digits.len() < 7 || digits.len() > 8 {
        return Err("RUN must have 7 or 8 digits".into());
    }
    Ok(())
}

/// Modulus-11 check digit of a national id number.
///
/// Digits are weighted 2..=7 (repeating) from the least significant one.
/// Remainder 0 maps to `'0'`, remainder 1 to `'K'`, anything else to
/// `11 - remainder`. Returns `None` when `run` is not numeric.
pub fn compute_check_digit(run: &str) -> Option<char> {
    let digits = run_digits(run);
    if digits.is_empty() || !DIGITS.is_match(&digits) {
        return None;
    }

    let sum: u32 = digits
        .chars()
        .rev()
        .filter_map(|c| c.to_digit(10))
        .zip((2..=7).cycle())
        .map(|(digit, weight)| digit * weight)
        .sum();

    match sum % 11 {
        0 => Some('0'),
        1 => Some('K'),
        r => char::from_digit(11 - r, 10),
    }
}

/// Compare a supplied check character against the computed one, ignoring case.
pub fn check_digit(run: &str, dv: &str) -> FieldResult {
    let mut supplied = dv.trim().chars();
    let (Some(given), None) = (supplied.next(), supplied.next()) else {
        return Err("check digit must be a single character".into());
    };
    match compute_check_digit(run) {
        Some(expected) if expected.eq_ignore_ascii_case(&given) => Ok(()),
        Some(_) => Err("check digit does not match the RUN".into()),
        None => Err("RUN is not valid".into()),
    }
}

// ─── Formats ────────────────────────────────────────────────────────────────

pub fn url(value: &str) -> FieldResult {
    if !URL.is_match(value.trim()) {
        return Err("not a valid URL".into());
    }
    Ok(())
}

/// Calendar date in `YYYY-MM-DD` form.
pub fn date(value: &str) -> FieldResult {
    parse_date(value)
        .map(|_| ())
        .ok_or_else(|| "date must use the YYYY-MM-DD format".to_string())
}

pub fn parse_date(value: &str) -> Option<NaiveDate> {
    NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").ok()
}

/// Milliseconds since the epoch at UTC midnight starting `value`.
pub fn date_start_millis(value: &str) -> Option<i64> {
    parse_date(value)?
        .and_hms_opt(0, 0, 0)
        .map(|start| start.and_utc().timestamp_millis())
}

// ─── Incident fields ────────────────────────────────────────────────────────

pub fn incident_title(value: &str) -> FieldResult {
    length_between(value, incident_limits::TITLE, "title")
}

pub fn incident_detail(value: &str) -> FieldResult {
    length_between(value, incident_limits::DETAIL, "detail")
}

/// Optional: empty input is accepted.
pub fn incident_comuna(value: &str) -> FieldResult {
    if value.trim().is_empty() {
        return Ok(());
    }
    length_between(value, incident_limits::COMUNA, "comuna")
}

/// Optional: empty input is accepted.
pub fn incident_address(value: &str) -> FieldResult {
    if value.trim().is_empty() {
        return Ok(());
    }
    length_between(value, incident_limits::ADDRESS, "address")
}

/// Optional decimal coordinate of at most 15 characters.
pub fn coordinate(value: &str) -> FieldResult {
    let value = value.trim();
    if value.is_empty() {
        return Ok(());
    }
    if value.chars().count() > incident_limits::COORDINATE_MAX_CHARS {
        return Err(format!(
            "coordinate must have at most {} characters",
            incident_limits::COORDINATE_MAX_CHARS
        ));
    }
    if !DECIMAL.is_match(value) || value.parse::<f64>().is_err() {
        return Err("coordinate must be a decimal number".into());
    }
    Ok(())
}

/// Parse an already validated optional coordinate.
pub fn parse_coordinate(value: &str) -> Option<f64> {
    let value = value.trim();
    if value.is_empty() {
        None
    } else {
        value.parse().ok()
    }
}
