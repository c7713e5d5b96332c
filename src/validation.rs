use crate::model::User;
use chrono::{Local, NaiveDate};
use std::borrow::Cow;
use validator::ValidationError;

/// The first public film screening; nothing can be released earlier.
pub fn cinema_birthday() -> NaiveDate {
    NaiveDate::from_ymd_opt(1895, 12, 28).unwrap_or(NaiveDate::MIN)
}

fn violation(code: &'static str, message: &'static str) -> ValidationError {
    ValidationError::new(code).with_message(Cow::Borrowed(message))
}

pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(violation("blank", "must not be blank"));
    }
    Ok(())
}

pub fn email_with_at(value: &str) -> Result<(), ValidationError> {
    not_blank(value)?;
    if !value.contains('@') {
        return Err(violation("email", "must contain the @ symbol"));
    }
    Ok(())
}

pub fn login_without_whitespace(value: &str) -> Result<(), ValidationError> {
    not_blank(value)?;
    if value.chars().any(char::is_whitespace) {
        return Err(violation("whitespace", "must not contain whitespace"));
    }
    Ok(())
}

pub fn released_after_cinema_birthday(date: &NaiveDate) -> Result<(), ValidationError> {
    if *date < cinema_birthday() {
        return Err(violation(
            "release_date",
            "must not be earlier than 28 December 1895",
        ));
    }
    Ok(())
}

pub fn not_in_future(date: &NaiveDate) -> Result<(), ValidationError> {
    if *date > Local::now().date_naive() {
        return Err(violation("future", "must not be in the future"));
    }
    Ok(())
}

/// Blank or missing display names fall back to the login.
pub fn normalize_user(user: &mut User) {
    let blank = user.name.as_deref().map_or(true, |n| n.trim().is_empty());
    if blank {
        user.name = Some(user.login.clone());
    }
}
