//! A small backend for a personal expense tracker.
//!
//! Entries live as rows of an `Entries` tab in a Google Sheet and receipt images are filed in
//! Google Drive. The `serve` command exposes them over HTTP:
//! - `GET` lists every entry, newest first.
//! - `POST` adds an entry, archiving its receipt image if one was sent, or deletes one by id.

mod api;
pub mod args;
mod clock;
pub mod commands;
mod config;
mod error;
pub mod model;
pub mod receipt;
pub mod server;
pub mod store;
mod utils;


pub use api::{
    Drive, DriveFile, Mode, Sheet, TestDrive, TestDriveState, TestSheet, TestSheetState, ENTRIES,
};
pub use clock::TIMEZONE;
pub use config::Config;
pub use error::{Error, ErrorType, Result};
