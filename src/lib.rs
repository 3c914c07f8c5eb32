//! Attendance-code issuance and redemption for a classroom-management app.
//!
//! Instructors open a time-boxed poll for a class session and get an 8-digit
//! code; enrolled students redeem it to be marked present. Redemption is safe
//! under concurrent load: at most one record per student and session, no
//! credit after expiry or early close, no credit across classes.
//!
//! # Layout
//! - [`poll::PollManager`] creates, looks up and closes polls.
//! - [`submission::SubmissionCoordinator`] redeems codes.
//! - [`store`] defines the persistence traits; [`db::PgStore`] and
//!   [`memory::MemoryStore`] implement them.
//! - [`routes`] and [`handlers`] expose everything over HTTP.
//!
//! # Setup
//!
//! ```sh
//! export DATABASE_URL=postgres://localhost/attendance
//! cargo run
//! ```
//!
//! Migrations in `migrations/` are applied on startup.

pub mod auth;
pub mod clock;
pub mod code;
pub mod config;
pub mod db;
pub mod error;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod poll;
pub mod roster;
pub mod routes;
pub mod state;
pub mod store;
pub mod submission;

pub use error::{AttendanceError, StoreError};
pub use models::{AttendanceRecord, Poll, Session};
pub use poll::PollManager;
pub use submission::SubmissionCoordinator;
