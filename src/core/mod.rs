pub mod config;
pub mod fetch;
pub mod generation;
pub mod matching;

pub use config::{Config, DisplayConfig, EngineConfig, LlmConfig, MergeConfig, ProviderKind};
pub use fetch::{SnapshotFetcher, TextFetcher};
pub use generation::{
    generate_json, Generation, GenerationRequest, JsonGenerationError, LlmError, TextGenerator,
};
pub use matching::LinkMatcher;
