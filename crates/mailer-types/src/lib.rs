//! Common types module for the mail-order lifecycle service.
//!
//! This module defines the core data types shared by every mailer crate:
//! tenants, orders, proofs, status history, principals, notifications and
//! the HTTP request/response shapes. Keeping them in one place ensures the
//! storage, core and service layers agree on a single `Order` entity.

/// API types for HTTP endpoints and request/response structures.
pub mod api;
/// Status history records and their structured metadata.
pub mod history;
/// Notification requests emitted after a committed transition.
pub mod notification;
/// Orders, order statuses and practices.
pub mod order;
/// Caller identity claims supplied by the identity provider.
pub mod principal;
/// Proof rounds attached to an order.
pub mod proof;
/// Implementation registry trait for pluggable backends.
pub mod registry;
/// Secure string type for tokens and credentials.
pub mod secret_string;
/// Storage namespaces.
pub mod storage;
/// Utility functions for formatting and validation.
pub mod utils;
/// Configuration validation types for ensuring type-safe configurations.
pub mod validation;

// Re-export all types for convenient access
pub use api::*;
pub use history::*;
pub use notification::*;
pub use order::*;
pub use principal::*;
pub use proof::*;
pub use registry::ImplementationRegistry;
pub use secret_string::SecretString;
pub use storage::*;
pub use utils::{non_blank, truncate_id};
pub use validation::*;
