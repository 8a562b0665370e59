#[cfg(feature = "chrome")]
pub mod chrome;
pub mod lynx;
pub mod orchestrator;
pub mod session;

#[cfg(feature = "chrome")]
pub use chrome::ChromeSnapshotFetcher;
pub use lynx::{parse_link_list, LynxTextFetcher};
pub use orchestrator::FetchOrchestrator;
pub use session::PageSession;
