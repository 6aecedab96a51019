//! CLI command implementations.
//!
//! # Commands
//!
//! | Command | Description |
//! |---------|-------------|
//! | `select` | Read records from a table, collection or key |
//! | `insert` | Write one record or value |
//! | `update` | Update matching records |
//! | `delete` | Delete matching records or a key |
//! | `ping` | Check that the backend accepts a connection |
//!
//! The connection comes from `--url` / `POLYSTORE_URL` or a TOML file
//! passed with `--config` (see [`crate::config::ConfigFile`]).

mod config;
mod crud;

pub use config::load_client_config;
pub use crud::CrudCommand;
