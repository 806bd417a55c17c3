//! Prompt construction for SQL generation.
//!
//! Builds a single user prompt holding the schema, the generation rules,
//! a handful of worked examples and the question.

use crate::db::Schema;

/// Prompt template for the SQL generator.
const PROMPT_TEMPLATE: &str = r#"You are an SQL expert. Convert the question to an SQL query using the tables provided below.

SCHEMA:
{schema}

INSTRUCTIONS:
- Use the correct tables based on context.
- For questions containing 'full', 'all', or implying complete data from ai_service_usage or ai_projects (e.g., usage reports, user activity, token usage, client-related queries like countries or projects), use LEFT JOIN to include all records from the primary table (ai_service_usage or ai_projects), even if service_id or client_id is NULL.
- For fields from joined tables that may be NULL (e.g., s.model, s.name, p.client_name, p.country), use COALESCE to return 'Unknown' instead of NULL.
- For other questions, use INNER JOIN unless specified otherwise.
- Return ONLY the SQL query (no explanation, no comments, no Markdown).
- Date format is YYYY-MM-DD.
- Ensure the query is compatible with PostgreSQL.

EXAMPLES:
{examples}

QUESTION: {question}
SQL:"#;

/// Worked question/SQL pairs shown to the model.
const FEW_SHOT_EXAMPLES: [(&str, &str); 5] = [
    (
        "Full usage report for all services and users",
        "SELECT u.prompt_tokens, u.completion_tokens, u.usage_date, COALESCE(s.name, 'Unknown') AS service_name, u.user_name, COALESCE(p.client_name, 'Unknown') AS client_name, COALESCE(p.country, 'Unknown') AS country\nFROM ai_service_usage u\nLEFT JOIN ai_services s ON u.service_id = s.id\nLEFT JOIN ai_projects p ON u.client_id = p.id;",
    ),
    (
        "All active user by total token usage",
        "SELECT u.user_name, SUM(u.prompt_tokens + u.completion_tokens) AS total_tokens\nFROM ai_service_usage u\nLEFT JOIN ai_services s ON u.service_id = s.id\nWHERE s.available = TRUE OR s.available IS NULL\nGROUP BY u.user_name;",
    ),
    (
        "How many times each model was used?",
        "SELECT COALESCE(s.model, 'Unknown') AS model, COUNT(u.id) AS usage_count\nFROM ai_service_usage u\nLEFT JOIN ai_services s ON u.service_id = s.id\nGROUP BY s.model;",
    ),
    (
        "All countries where clients have used any service",
        "SELECT DISTINCT COALESCE(p.country, 'Unknown') AS country\nFROM ai_projects p\nLEFT JOIN ai_service_usage u ON p.id = u.client_id;",
    ),
    (
        "Show usages where no project is associated",
        "SELECT u.* FROM ai_service_usage u WHERE u.client_id IS NULL;",
    ),
];

fn format_examples() -> String {
    FEW_SHOT_EXAMPLES
        .iter()
        .map(|(question, sql)| format!("Question: {question}\nSQL: {sql}"))
        .collect::<Vec<_>>()
        .join("\n\n")
}

/// Builds the generation prompt for `question` against `schema`.
pub fn build_prompt(schema: &Schema, question: &str) -> String {
    PROMPT_TEMPLATE
        .replace("{schema}", &schema.format_for_prompt())
        .replace("{examples}", &format_examples())
        .replace("{question}", question)
}
