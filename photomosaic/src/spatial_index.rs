use crate::error::{MosaicError, Result};
use crate::feature_vector::FeatureVector;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::hash::Hash;

/// Version tag written into index snapshots.
const SNAPSHOT_FORMAT: u32 = 1;

/// A node of the index tree. Children are positions in the index arena.
#[derive(Debug, Clone)]
struct IndexNode<K> {
    vector: FeatureVector,
    asset: K,
    left: Option<usize>,
    right: Option<usize>,
}

/// The best candidate found by [`SpatialIndex::nearest_match`].
#[derive(Debug, Clone, PartialEq)]
pub struct NearestMatch<K> {
    /// The library asset whose descriptor is closest to the query.
    pub asset: K,
    /// Squared Euclidean distance between the query and that descriptor. `0.0` is a perfect fit.
    pub score: f32,
}

/// A binary space-partitioning tree over [`FeatureVector`]s for nearest-neighbour search.
///
/// Each tree level splits on a single descriptor component chosen by
/// [`axis_cycle::axis`](crate::axis_cycle::axis): values less than the node's go left,
/// everything else (ties included) goes right. The tree is never rebalanced, so its
/// shape depends only on insertion order.
///
/// Nodes live in an arena in insertion order; the first node is the root. A separate
/// membership set answers [`is_member`](SpatialIndex::is_member) without walking the tree.
///
/// The index is meant to be filled once and then shared read-only, typically behind an
/// `Arc`, by any number of concurrent searches.
#[derive(Debug, Clone)]
pub struct SpatialIndex<K> {
    nodes: Vec<IndexNode<K>>,
    members: HashSet<K>,
}

/// A subtree still to be searched, with a lower bound on the squared distance of anything in it.
struct Pending {
    node: usize,
    level: usize,
    bound: f32,
}

#[derive(Serialize, Deserialize)]
struct SnapshotEntry<K> {
    asset: K,
    vector: FeatureVector,
}

#[derive(Serialize, Deserialize)]
struct IndexSnapshot<K> {
    format: u32,
    entries: Vec<SnapshotEntry<K>>,
}

impl<K> Default for SpatialIndex<K> {
    fn default() -> Self {
        SpatialIndex {
            nodes: Vec::new(),
            members: HashSet::new(),
        }
    }
}

impl<K: Clone + Eq + Hash> SpatialIndex<K> {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of inserted descriptors, duplicates included.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Adds `vector` as a new leaf and records `asset` as a member.
    ///
    /// Identical vectors are accepted and form a chain down the right-hand side. A vector
    /// with a NaN or infinite component is refused with
    /// [`NonFiniteDescriptor`](MosaicError::NonFiniteDescriptor) and leaves the index unchanged.
    pub fn insert(&mut self, asset: K, vector: FeatureVector) -> Result<()> {
        if !vector.is_finite() {
            return Err(MosaicError::NonFiniteDescriptor);
        }
        let new_node = self.nodes.len();

        if !self.nodes.is_empty() {
            let mut current = 0;
            let mut level = 0;
            loop {
                let node = &mut self.nodes[current];
                let child = if vector.at_level(level) < node.vector.at_level(level) {
                    &mut node.left
                } else {
                    &mut node.right
                };
                match *child {
                    Some(next) => {
                        current = next;
                        level += 1;
                    }
                    None => {
                        *child = Some(new_node);
                        break;
                    }
                }
            }
        }

        self.members.insert(asset.clone());
        self.nodes.push(IndexNode {
            vector,
            asset,
            left: None,
            right: None,
        });
        Ok(())
    }

    /// Builds an index by inserting `entries` in order, stopping at the first rejected one.
    pub fn from_entries<I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (K, FeatureVector)>,
    {
        let mut index = SpatialIndex::new();
        for (asset, vector) in entries {
            index.insert(asset, vector)?;
        }
        Ok(index)
    }

    /// Whether `asset` has been inserted.
    pub fn is_member(&self, asset: &K) -> bool {
        self.members.contains(asset)
    }

    /// Finds the inserted descriptor closest to `query` by squared Euclidean distance.
    ///
    /// Returns `None` for an empty index and for a query with a non-finite component,
    /// which has no meaningful distance to anything. The search follows the insertion comparator
    /// down to a leaf, scoring every node it passes with the full 27-component distance.
    /// A sibling subtree is searched only when the squared single-axis gap at its split
    /// is smaller than the best distance found so far, since nothing on the far side of
    /// the split can be closer than that gap. When several descriptors are equally
    /// close, the first one reached wins.
    pub fn nearest_match(&self, query: &FeatureVector) -> Option<NearestMatch<K>> {
        if self.nodes.is_empty() || !query.is_finite() {
            return None;
        }

        let mut best: Option<(usize, f32)> = None;
        let mut pending = vec![Pending { node: 0, level: 0, bound: 0.0 }];

        while let Some(Pending { node, level, bound }) = pending.pop() {
            if best.is_some_and(|(_, best_distance)| bound >= best_distance) {
                continue;
            }

            let current = &self.nodes[node];
            let distance = query.squared_distance(&current.vector);
            if best.map_or(true, |(_, best_distance)| distance < best_distance) {
                best = Some((node, distance));
            }

            let gap = query.at_level(level) - current.vector.at_level(level);
            let (near, far) = if gap < 0.0 {
                (current.left, current.right)
            } else {
                (current.right, current.left)
            };

            // Near side goes on top so it is searched first.
            if let Some(far) = far {
                pending.push(Pending { node: far, level: level + 1, bound: gap * gap });
            }
            if let Some(near) = near {
                pending.push(Pending { node: near, level: level + 1, bound: 0.0 });
            }
        }

        best.map(|(node, score)| NearestMatch {
            asset: self.nodes[node].asset.clone(),
            score,
        })
    }

    /// Length of the longest root-to-leaf path, counted in nodes.
    pub fn depth(&self) -> usize {
        if self.nodes.is_empty() {
            return 0;
        }
        let mut deepest = 0;
        let mut stack = vec![(0usize, 1usize)];
        while let Some((node, depth)) = stack.pop() {
            deepest = deepest.max(depth);
            let current = &self.nodes[node];
            for child in [current.left, current.right].into_iter().flatten() {
                stack.push((child, depth + 1));
            }
        }
        deepest
    }

    /// Inserted `(asset, vector)` pairs in insertion order.
    pub fn entries(&self) -> impl Iterator<Item = (&K, &FeatureVector)> + '_ {
        self.nodes.iter().map(|node| (&node.asset, &node.vector))
    }

    /// Encodes the index as a JSON snapshot of its entries in insertion order.
    pub fn serialize(&self) -> Result<String>
    where
        K: Serialize,
    {
        let snapshot = IndexSnapshot {
            format: SNAPSHOT_FORMAT,
            entries: self
                .nodes
                .iter()
                .map(|node| SnapshotEntry {
                    asset: &node.asset,
                    vector: node.vector,
                })
                .collect(),
        };
        Ok(serde_json::to_string(&snapshot)?)
    }

    /// Rebuilds an index from a snapshot made by [`serialize`](SpatialIndex::serialize).
    ///
    /// Entries are re-inserted in their original order, which reproduces the original
    /// tree exactly.
    pub fn deserialize(snapshot: &str) -> Result<Self>
    where
        K: DeserializeOwned,
    {
        let snapshot: IndexSnapshot<K> = serde_json::from_str(snapshot)?;
        if snapshot.format != SNAPSHOT_FORMAT {
            return Err(MosaicError::Serialization(serde::de::Error::custom(format!(
                "unsupported snapshot format {}",
                snapshot.format
            ))));
        }
        Self::from_entries(
            snapshot
                .entries
                .into_iter()
                .map(|entry| (entry.asset, entry.vector)),
        )
    }
}
