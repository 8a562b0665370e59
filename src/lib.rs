pub mod browser;
pub mod core;
pub mod dom;
pub mod errors;
pub mod llm;
pub mod merge;
pub mod testing;
pub mod types;

pub use browser::{FetchOrchestrator, LynxTextFetcher, PageSession};
pub use crate::core::{Config, LinkMatcher, SnapshotFetcher, TextFetcher, TextGenerator};
pub use dom::{ElementKind, SnapshotElement, SnapshotResult};
pub use errors::{Leg, Result, TextViewError};
pub use merge::Merger;
pub use types::*;
