//! Core types for Momtazchem.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod language;
pub mod money;
pub mod order_number;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use language::{Language, LanguageError};
pub use money::{Currency, Money, round_money};
pub use order_number::OrderNumber;
pub use status::*;
