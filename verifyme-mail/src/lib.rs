//! VerifyMe Mail Layer
//!
//! Provides access to a disposable inbox on the mail.tm API:
//! - HTTP client with timeouts and retry on transient failures
//! - Account provisioning (random address and password, bearer token)
//! - Message listing and full-body fetches
//! - The [`Mailbox`] seam the poller reads through

pub mod client;
pub mod models;
pub mod mailbox;

pub use client::*;
pub use models::*;
pub use mailbox::*;
