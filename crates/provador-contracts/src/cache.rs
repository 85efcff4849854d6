use indexmap::IndexMap;

use crate::assets::ImageAsset;
use crate::poses::Pose;

/// Generated results for the current (person, clothing) pair, keyed by pose.
///
/// Entries are replaced whole; nothing is edited in place.
#[derive(Debug, Clone, Default)]
pub struct PoseCache {
    entries: IndexMap<Pose, ImageAsset>,
}

impl PoseCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, pose: Pose) -> Option<&ImageAsset> {
        self.entries.get(&pose)
    }

    pub fn contains(&self, pose: Pose) -> bool {
        self.entries.contains_key(&pose)
    }

    /// Stores `asset` for `pose`, returning the entry it replaced.
    pub fn insert(&mut self, pose: Pose, asset: ImageAsset) -> Option<ImageAsset> {
        self.entries.insert(pose, asset)
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Poses in the order they were first generated.
    pub fn poses(&self) -> Vec<Pose> {
        self.entries.keys().copied().collect()
    }
}
