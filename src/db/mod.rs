//! SQLite persistence for drill points. All access goes through a single
//! worker thread owning the connection.

mod connection;
mod helpers;
mod migrations;
mod repositories;

pub use connection::Database;
