//! Live-node registry.
//!
//! The kernel keeps inodes alive on its side for as long as it pleases and
//! may present one in a request long after this side believes the entry is
//! gone. [`NodeTracker`] records which nodes are currently live so that an
//! externally supplied inode can be asserted valid before it is used; a
//! request naming a destroyed node is a protocol violation on the caller's
//! side, and the assertion turns what would be a use-after-free into an
//! immediate, diagnosable failure.
//!
//! One tracker exists per filesystem instance and is guarded by the same
//! lock as the tree it describes, so tracker membership and tree state can
//! never be observed out of step.

use std::collections::HashSet;

use tracing::debug;

use crate::node::NodeId;

/// Registry of the nodes currently live in one tree instance.
#[derive(Debug)]
pub struct NodeTracker {
    enabled: bool,
    active: HashSet<NodeId>,
}

impl NodeTracker {
    /// Creates a tracker. When `enabled` is false all operations are no-ops,
    /// mirroring a build with inode tracking compiled out.
    pub fn new(enabled: bool) -> Self {
        Self { enabled, active: HashSet::new() }
    }

    /// Records a newly created node. Registering an id that is already
    /// tracked means two live nodes share an identity; that is tree
    /// corruption and fatal.
    pub fn node_created(&mut self, id: NodeId) {
        if self.enabled {
            debug!(inode = id.to_inode(), "node created");
            assert!(self.active.insert(id), "node {:?} created twice", id);
        }
    }

    /// Removes a node at destruction. Deleting an untracked id is fatal for
    /// the same reason.
    pub fn node_deleted(&mut self, id: NodeId) {
        if self.enabled {
            debug!(inode = id.to_inode(), "node deleted");
            assert!(self.active.remove(&id), "node {:?} deleted but not tracked", id);
        }
    }

    /// Asserts that `id` refers to a live node. Called before any externally
    /// supplied inode is trusted.
    pub fn check_tracked(&self, id: NodeId) {
        if self.enabled {
            assert!(
                self.active.contains(&id),
                "inode {} does not refer to a live node",
                id.to_inode()
            );
        }
    }

    /// Number of live nodes currently registered.
    pub fn len(&self) -> usize {
        self.active.len()
    }

    /// True if no nodes are registered.
    pub fn is_empty(&self) -> bool {
        self.active.is_empty()
    }
}
