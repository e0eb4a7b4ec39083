//! SQLite access for the user store.
//!
//! - [`migrate::run`] applies the embedded Diesel migrations (creates `users`).
//! - [`connection::build_pool`] opens an r2d2 pool whose connections get
//!   `foreign_keys=ON` and a 5000ms `busy_timeout`.
//!
//! ```no_run
//! use nepse_today::db::{connection, migrate};
//!
//! migrate::run("site.db").expect("migrations");
//! let _pool = connection::build_pool("site.db").expect("pool");
//! ```

pub mod connection;
pub mod migrate;
