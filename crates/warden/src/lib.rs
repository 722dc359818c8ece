//! Account maintenance for the user document store.
//!
//! Two platform-triggered handlers:
//! - a daily scheduled job that zeroes each user's view counter
//! - a write-triggered watcher that deactivates heavily-blocked accounts
//!
//! Trigger declarations live in [`registry`]; process wiring in [`daemon`].

pub mod daemon;
pub mod handlers;
pub mod registry;
