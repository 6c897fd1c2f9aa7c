//! Create-script rewriting.

const CREATE_TABLE: &str = "CREATE TABLE";
const CREATE_OR_REPLACE_TABLE: &str = "CREATE OR REPLACE TABLE";

/// Rewrite the first `CREATE TABLE` to `CREATE OR REPLACE TABLE`.
pub fn create_or_replace(script: &str) -> String {
    script.replacen(CREATE_TABLE, CREATE_OR_REPLACE_TABLE, 1)
}
