//! Connection settings.

use std::str::FromStr;
use std::time::Duration;

use clap::{ArgAction, Args};
use sqlx::sqlite::SqliteConnectOptions;

/// Settings for opening a SQLite database.
///
/// Usable as flattened command-line arguments or built in code.
#[derive(Debug, Clone, PartialEq, Eq, Args)]
pub struct SqliteConfig {
    /// Database URL (`sqlite:path` or `sqlite::memory:`).
    #[arg(short, long, env = "DATABASE_URL", default_value = "sqlite::memory:")]
    pub database: String,

    /// Create the database file if it does not exist.
    #[arg(long)]
    pub create_if_missing: bool,

    /// Enforce foreign key constraints.
    #[arg(long, default_value_t = true, action = ArgAction::Set)]
    pub foreign_keys: bool,

    /// How long to wait on a locked database, in milliseconds.
    #[arg(long, default_value_t = 5000)]
    pub busy_timeout_ms: u64,
}

impl Default for SqliteConfig {
    fn default() -> Self {
        Self {
            database: String::from("sqlite::memory:"),
            create_if_missing: false,
            foreign_keys: true,
            busy_timeout_ms: 5000,
        }
    }
}

impl SqliteConfig {
    /// Settings for `database` with defaults elsewhere.
    pub fn new(database: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            ..Self::default()
        }
    }

    /// Creates the file when missing.
    #[must_use]
    pub const fn create_if_missing(mut self, yes: bool) -> Self {
        self.create_if_missing = yes;
        self
    }

    /// Toggles foreign key enforcement.
    #[must_use]
    pub const fn foreign_keys(mut self, yes: bool) -> Self {
        self.foreign_keys = yes;
        self
    }

    /// Translates the settings into driver options.
    pub fn connect_options(&self) -> Result<SqliteConnectOptions, sqlx::Error> {
        Ok(SqliteConnectOptions::from_str(&self.database)?
            .create_if_missing(self.create_if_missing)
            .foreign_keys(self.foreign_keys)
            .busy_timeout(Duration::from_millis(self.busy_timeout_ms)))
    }
}
