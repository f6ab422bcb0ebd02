//! Bounded catalog walks producing flat sequences of leaf candidates.
//!
//! Two shapes: [`directory`] for index-of-indexes sites and [`category`] for
//! category → product → panel portals. [`expand`] holds the click-to-reveal
//! protocol used by portal panels.

pub mod category;
pub mod directory;
pub mod expand;

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum NodeKind {
    Container,
    LeafCandidate,
    Skip,
}

/// One entry seen while expanding a container. `parent` is the label of the
/// container that produced it; nodes never outlive the walk.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CatalogNode<H> {
    pub handle: H,
    pub label: String,
    pub kind: NodeKind,
    pub parent: Option<String>,
}

/// A download candidate plus the container path it was found under.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LeafCandidate<L> {
    pub path: Vec<String>,
    pub item: L,
}

impl<L> LeafCandidate<L> {
    /// Top-level container label, used as the record's product type.
    pub fn top_level(&self) -> Option<&str> {
        self.path.first().map(String::as_str)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct WalkStats {
    pub categories: usize,
    pub expansion_failures: usize,
    pub skipped_items: usize,
    pub leaves: usize,
}

pub(crate) fn cap_reached(cap: Option<usize>, produced: usize) -> bool {
    cap.is_some_and(|max| produced >= max)
}
