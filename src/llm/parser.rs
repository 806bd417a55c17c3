//! Response parsing for generator outputs.
//!
//! Models are asked for bare SQL but sometimes wrap it in a markdown fence.

use regex::Regex;
use std::sync::OnceLock;

fn fence_pattern() -> Option<&'static Regex> {
    static FENCE: OnceLock<Option<Regex>> = OnceLock::new();
    FENCE
        .get_or_init(|| Regex::new(r"(?is)```(?:sql)?[ \t]*\r?\n?(.*?)```").ok())
        .as_ref()
}

/// Extracts the SQL statement from a model reply.
///
/// Returns the content of the first ```` ```sql ```` (or bare ```` ``` ````)
/// block when present, otherwise the trimmed reply. An unterminated opening
/// fence is dropped.
pub fn extract_sql(response: &str) -> String {
    if let Some(captures) = fence_pattern().and_then(|re| re.captures(response)) {
        if let Some(body) = captures.get(1) {
            return body.as_str().trim().to_string();
        }
    }

    let trimmed = response.trim();
    let unterminated = trimmed
        .strip_prefix("```sql")
        .or_else(|| trimmed.strip_prefix("```SQL"))
        .or_else(|| trimmed.strip_prefix("```"));
    match unterminated {
        Some(rest) => rest.trim().to_string(),
        None => trimmed.to_string(),
    }
}
