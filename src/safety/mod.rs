//! SQL safety gate.
//!
//! A deliberately conservative classifier: a statement is safe only if it
//! starts with `SELECT` and no forbidden keyword appears anywhere in its text.
//! Matching is by substring on the upper-cased statement, so a keyword inside a
//! string literal or identifier (e.g. `LIKE '%INSERT%'`, `created_at`) also
//! rejects the statement. That false positive is accepted behaviour.

/// Keywords whose presence anywhere in a statement makes it unsafe.
pub const FORBIDDEN_KEYWORDS: [&str; 9] = [
    "INSERT", "UPDATE", "DELETE", "DROP", "ALTER", "TRUNCATE", "CREATE", "EXEC", "EXECUTE",
];

/// Returns true if `statement` may be executed.
pub fn is_safe(statement: &str) -> bool {
    let normalized = normalize(statement);
    normalized.starts_with("SELECT") && first_forbidden(&normalized).is_none()
}

/// Returns the first forbidden keyword found in `statement`, if any.
///
/// Keywords are checked in [`FORBIDDEN_KEYWORDS`] order.
pub fn find_forbidden_keyword(statement: &str) -> Option<&'static str> {
    first_forbidden(&normalize(statement))
}

fn normalize(statement: &str) -> String {
    statement.trim().to_uppercase()
}

fn first_forbidden(normalized: &str) -> Option<&'static str> {
    FORBIDDEN_KEYWORDS
        .iter()
        .copied()
        .find(|keyword| normalized.contains(keyword))
}
