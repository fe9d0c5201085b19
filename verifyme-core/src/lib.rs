//! VerifyMe Core - Email content classifier
//!
//! This crate provides the one piece of VerifyMe with real decision logic:
//! - Body normalization (string or multi-part bodies, visible HTML text)
//! - One-time code detection through an ordered rule list
//! - Confirmation link ranking with keyword scoring
//! - Keyword lists and weights as configuration

pub mod types;
pub mod config;
pub mod normalize;
pub mod classifier;

pub use types::*;
pub use config::*;
pub use normalize::*;
pub use classifier::*;

/// Shortest accepted one-time code
pub const MIN_OTP_DIGITS: usize = 4;

/// Longest accepted one-time code
pub const MAX_OTP_DIGITS: usize = 8;

/// Preferred one-time code length, checked before everything else
pub const PREFERRED_OTP_DIGITS: usize = 6;
