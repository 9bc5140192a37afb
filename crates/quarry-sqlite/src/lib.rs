//! # quarry-sqlite
//!
//! SQLite backend for quarry.
//!
//! [`SqliteConnection`] implements [`quarry_orm::Connection`] on top of
//! sqlx. Named `:placeholders` are rewritten to positional parameters by
//! [`bind_named`] before the statement reaches the driver.
//!
//! ## Example
//!
//! ```rust
//! use quarry_orm::{Condition, Connection, Entity, FilterSpec, Repository, Schema, TransactionManager};
//! use quarry_sqlite::SqliteConnection;
//!
//! let mut conn = SqliteConnection::open_in_memory().unwrap();
//! conn.exec_raw("CREATE TABLE users (id INTEGER PRIMARY KEY, name TEXT)").unwrap();
//! conn.exec_raw("INSERT INTO users (name) VALUES ('Ann'), ('Bob')").unwrap();
//!
//! let schema = Schema::from_entities([
//!     Entity::new("User", "users", "id").with_column("name"),
//! ]).unwrap();
//! let mut session = TransactionManager::new(conn);
//! let mut users = Repository::new(&mut session, &schema, "User").unwrap();
//!
//! let found = users.find(&FilterSpec::new().filter(Condition::eq("name", "Bob"))).unwrap();
//! assert_eq!(found[0].get_as::<i64>("id"), Some(2));
//! ```

mod config;
mod connection;

pub use config::SqliteConfig;
pub use connection::{bind_named, SqliteConnection};
