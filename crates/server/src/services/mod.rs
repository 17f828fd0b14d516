//! Business services layered over the repositories.

pub mod ai;
pub mod auth;
pub mod barcode;
pub mod documents;
pub mod email;
pub mod notifications;
pub mod order_flow;
pub mod placeholders;
pub mod pricing;
pub mod sms;
pub mod storage;
pub mod sweeper;
pub mod vehicle;
