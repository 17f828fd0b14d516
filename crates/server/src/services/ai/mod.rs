//! AI-assisted SEO tooling over OpenAI-compatible chat completions.
//!
//! The provider (OpenAI or DeepSeek) and key come from the environment; when
//! no key is set the endpoints answer `503`.

mod client;
mod error;
pub mod seo;

pub use client::{AiClient, Sampling};
pub use error::AiError;
pub use seo::{SeoError, SeoService};
