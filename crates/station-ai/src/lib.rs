//! Asset provider clients.
//!
//! - [`TextGenerator`]: chat-completion call returning a [`station_models::CreativeConcept`]
//! - [`ImageGenerator`]: text-to-image call returning raw image bytes

pub mod config;
pub mod error;
pub mod image;
pub mod prompt;
pub mod text;

pub use config::{AiConfig, MarketingLinks};
pub use error::{AiError, AiResult};
pub use image::ImageGenerator;
pub use text::TextGenerator;
