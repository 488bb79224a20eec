//! Input validation utilities

use chrono::NaiveDate;
use regex::Regex;
use std::sync::OnceLock;

/// Validate username
pub fn validate_username(username: &str) -> Result<(), String> {
    if username.is_empty() {
        return Err("Username is required".to_string());
    }

    if username.len() < 3 {
        return Err("Username must be at least 3 characters long".to_string());
    }

    if username.len() > 32 {
        return Err("Username must be at most 32 characters long".to_string());
    }

    static USERNAME_REGEX: OnceLock<Regex> = OnceLock::new();
    let regex = USERNAME_REGEX
        .get_or_init(|| Regex::new(r"^[a-zA-Z0-9_]+$").expect("Failed to compile username regex"));

    if !regex.is_match(username) {
        return Err("Username can only contain letters, numbers, and underscores".to_string());
    }

    Ok(())
}

/// Validate password
pub fn validate_password(password: &str) -> Result<(), String> {
    if password.is_empty() {
        return Err("Password is required".to_string());
    }

    let length = password.chars().count();
    if length < 8 {
        return Err("Password must be at least 8 characters long".to_string());
    }

    if length > 128 {
        return Err("Password must be at most 128 characters long".to_string());
    }

    Ok(())
}

/// Validate display name
pub fn validate_display_name(display_name: &str) -> Result<(), String> {
    if display_name.trim().is_empty() {
        return Err("Display name is required".to_string());
    }

    if display_name.chars().count() > 64 {
        return Err("Display name must be at most 64 characters long".to_string());
    }

    Ok(())
}

/// Excluded days come as one flag per weekday
pub fn validate_excluded_days(days: &[bool]) -> Result<(), String> {
    if days.len() != 7 {
        return Err(format!(
            "excludedDays must have exactly 7 entries, got {}",
            days.len()
        ));
    }

    Ok(())
}

/// Longest accepted estimate, in days
pub const MAX_DURATION_DAYS: f64 = 100_000.0;

/// Durations are counted in days
pub fn validate_duration(field: &str, days: f64) -> Result<(), String> {
    if !days.is_finite() || days < 0.0 {
        return Err(format!("{} must be a non-negative number of days", field));
    }

    if days > MAX_DURATION_DAYS {
        return Err(format!(
            "{} must be at most {} days",
            field, MAX_DURATION_DAYS
        ));
    }

    Ok(())
}

pub fn validate_completion(completion: f64) -> Result<(), String> {
    if !(0.0..=1.0).contains(&completion) {
        return Err("completion must be between 0 and 1".to_string());
    }

    Ok(())
}

pub fn validate_date_range(start: NaiveDate, end: NaiveDate) -> Result<(), String> {
    if start > end {
        return Err("startDate must not be after endDate".to_string());
    }

    Ok(())
}
