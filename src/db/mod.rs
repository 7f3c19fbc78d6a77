//! SQL access, one module per aggregate. Functions that issue a single
//! statement take any executor; multi-statement ones take a connection so
//! callers can run them inside a transaction.

pub mod categories;
pub mod companies;
pub mod events;
pub mod orders;
pub mod organizers;
pub mod otp;
pub mod participants;
pub mod tokens;
pub mod users;

use crate::utils::error::AppError;

/// `23505 unique_violation`.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|e| e.code())
        .is_some_and(|code| code == "23505")
}

/// Turns a unique-key violation into `Conflict(message)`; other errors pass through.
pub fn conflict_on_duplicate(err: sqlx::Error, message: &str) -> AppError {
    if is_unique_violation(&err) {
        AppError::Conflict(message.to_string())
    } else {
        AppError::DatabaseError(err)
    }
}

/// `23503 foreign_key_violation`.
pub fn is_foreign_key_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|e| e.code())
        .is_some_and(|code| code == "23503")
}

/// `%term%` for `ILIKE`, with the pattern characters of `term` matched literally.
pub fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.trim().chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}
