//! Utility functions shared across the mailer crates.

pub mod formatting;

pub use formatting::{non_blank, truncate_id};
