//! Credential file loading
//!
//! A single JSON file carries both the provider login and the database login.
//! Absence or malformed content is a fatal startup error; nothing here is
//! retried or defaulted.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;
use std::path::Path;

/// Stored credentials for one deployment. Never logged and never persisted
/// anywhere but the file they came from.
#[derive(Clone, Debug, Deserialize)]
pub struct Credentials {
    pub auth_user: String,
    pub auth_pass: String,
    pub client_id: String,
    pub client_secret: String,
    pub sql_username: String,
    pub sql_password: String,
}

impl Credentials {
    /// Load credentials from a JSON file
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials file: {}", path.display()))?;

        let credentials: Credentials = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse credentials file: {}", path.display()))?;

        Ok(credentials)
    }

    /// Fill the SQL credential placeholders in a database URL template.
    /// A URL without placeholders (an embedded SQLite file) passes through
    /// unchanged.
    pub fn database_url(&self, template: &str) -> String {
        template
            .replace("{sql_username}", &self.sql_username)
            .replace("{sql_password}", &self.sql_password)
    }
}
