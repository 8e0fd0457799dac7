pub mod config;
pub mod logging;
pub mod lsp;
pub mod parsers;
pub mod serde_helpers;
pub mod source_handler;

pub use config::{ConfigOverrides, ServerConfig};
pub use lsp::backend::CobolBackend;
