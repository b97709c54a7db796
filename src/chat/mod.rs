//! The chat turn request path.

pub mod prompt;
pub mod relay;
pub mod service;
pub mod title;

pub use prompt::{RequestGeo, build_system_prompt};
pub use relay::DEFAULT_STREAM_BUFFER;
pub use service::{ChatService, TurnFlags, TurnOutcome, TurnRequest};
pub use title::TitleSynthesizer;

/// Output ceiling applied to every generation, including titles.
pub const MAX_OUTPUT_TOKENS: usize = 2048;
