//! Momtazchem Core - Shared domain types.
//!
//! This crate provides the types shared by every Momtazchem component:
//! - `server` - Storefront and back-office JSON API
//! - `cli` - Command-line tools for migrations, seeding and barcodes
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no database
//! access, no HTTP clients. Database encoding is opt-in via the `postgres`
//! feature.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, emails, money, languages and order statuses
//! - [`barcode`] - EAN-13 check digits, parsing, generation and SVG rendering

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod barcode;
pub mod types;

pub use barcode::{Ean13, Ean13Error};
pub use types::*;
