pub mod element;
pub mod processor;
pub mod state;

pub use element::{ElementKind, ElementPosition, SnapshotElement};
pub use processor::SnapshotProcessor;
pub use state::{FormInfo, FormInput, ImageInfo, SnapshotResult};
