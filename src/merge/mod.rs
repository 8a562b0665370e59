//! Reconciliation of the text rendering and the element snapshot.

pub mod advisor;
pub mod classifier;
pub mod fallback;
pub mod injector;
pub mod matcher;
pub mod merger;

pub use advisor::{MarkerPosition, PlacementAdvisor, PlacementDecision, Placements};
pub use classifier::{categorize, classify, find_unplaced, Bucket};
pub use fallback::{markup_to_text, snapshot_only_view, FallbackOptions};
pub use injector::{inject, render_marker, Injection, LineArena};
pub use matcher::{match_links, ExactUrlMatcher, MatchOutcome, NormalizedUrlMatcher};
pub use merger::Merger;
