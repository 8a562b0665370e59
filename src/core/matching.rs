use crate::dom::SnapshotElement;

/// Decides whether a numbered text-source link and a snapshot element refer
/// to the same thing. The matcher is the only join between the two numbering
/// spaces, so stricter or fuzzier strategies plug in here.
pub trait LinkMatcher: Send + Sync {
    fn matches(&self, link_url: &str, element: &SnapshotElement) -> bool;
}
