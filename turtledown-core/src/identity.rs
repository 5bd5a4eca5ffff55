//! Small integer identities for sources and tile nodes.
//!
//! Opaque source identifiers (the strings naming an image + metadata pair)
//! are interned into [`SourceId`]s. Materialized tiles live in the
//! [`TileTree`](crate::tree::TileTree) arena and are addressed by
//! [`NodeId`]. A grid cell holds either one or the other.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Interned opaque source identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SourceId(u32);

impl SourceId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Index of a materialized tile in the tree arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NodeId(pub(crate) u32);

impl NodeId {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Content of one grid cell.
///
/// A cell starts `Unvisited` when its tile is generated and is upgraded in
/// place to `Visited` the first time the tree descends into it. It never
/// reverts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Cell {
    Unvisited(SourceId),
    Visited(NodeId),
}

/// Bidirectional map between opaque source strings and [`SourceId`]s.
#[derive(Debug, Default)]
pub struct SourceTable {
    names: Vec<Arc<str>>,
    ids: HashMap<Arc<str>, SourceId>,
}

impl SourceTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Id for `name`, allocating a fresh one the first time it is seen.
    pub fn intern(&mut self, name: &str) -> SourceId {
        if let Some(&id) = self.ids.get(name) {
            return id;
        }
        let id = SourceId(self.names.len() as u32);
        let name: Arc<str> = Arc::from(name);
        self.names.push(Arc::clone(&name));
        self.ids.insert(name, id);
        id
    }

    pub fn get(&self, name: &str) -> Option<SourceId> {
        self.ids.get(name).copied()
    }

    pub fn name(&self, id: SourceId) -> &str {
        &self.names[id.index()]
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
