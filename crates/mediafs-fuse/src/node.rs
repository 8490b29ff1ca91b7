//! The directory tree and node lifecycle.
//!
//! Every path component ever revealed to the kernel gets a [`NodeId`] whose
//! packed form is the inode the kernel sees. The FUSE lookup-count contract
//! rides on each node's reference count: a reference is taken when the node
//! is created or looked up with `acquire`, and the node is destroyed
//! synchronously the moment a [`NodeTree::release`] drives the count to
//! zero - detaching it from its parent, closing its handles and
//! unregistering it from the tracker in one step, so the inode stops
//! resolving at exactly the point the kernel has balanced its lookups.
//!
//! Nodes live in a generation-counted slot arena, so the inode mapping is
//! O(1) in both directions with no auxiliary table, and reuse is
//! detectable: vacating a slot bumps its generation, so an inode captured
//! before the node died can never resolve to the slot's next occupant.

use std::sync::atomic::{AtomicU64, Ordering};

use parking_lot::Mutex;
use tracing::error;

use mediafs_core::redaction::sanitize_segment;

use crate::config::FsOptions;
use crate::handles::{DirHandle, FileHandle, HandleId};
use crate::tracker::NodeTracker;

/// Generation-counted identity of a node within one tree instance.
///
/// Packs into the external u64 inode: slot index in the low 32 bits, slot
/// generation in the high 32 bits. Generations start at 1, so no valid id
/// packs to inode 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeId {
    index: u32,
    generation: u32,
}

impl NodeId {
    /// The externally visible inode for this node.
    pub fn to_inode(self) -> u64 {
        (u64::from(self.generation) << 32) | u64::from(self.index)
    }

    /// Unpacks an inode presented by the kernel.
    ///
    /// The result is not yet trusted: [`NodeTree::from_inode`] validates it
    /// against the live-node registry before handing it out.
    pub fn from_inode(inode: u64) -> Self {
        Self {
            index: inode as u32,
            generation: (inode >> 32) as u32,
        }
    }
}

/// One filesystem entry revealed to the kernel.
#[derive(Debug)]
struct Node {
    /// Single path segment, or the absolute root path for the root node.
    /// Mutable: renames update it in place.
    name: String,
    /// Containing directory, none for the root.
    parent: Option<NodeId>,
    /// Unordered children; each holds a back-reference to this node.
    children: Vec<NodeId>,
    /// The FUSE lookup count. The node dies when this reaches zero.
    refcount: u32,
    /// Logically deleted: invisible to name lookup, still parented so
    /// outstanding references can resolve parent and path.
    deleted: bool,
    /// Open-file sessions owned by this node.
    handles: Vec<(HandleId, FileHandle)>,
    /// Open-directory sessions owned by this node.
    dirhandles: Vec<(HandleId, DirHandle)>,
}

impl Node {
    fn new(name: String) -> Self {
        Self {
            name,
            parent: None,
            children: Vec::new(),
            refcount: 0,
            deleted: false,
            handles: Vec::new(),
            dirhandles: Vec::new(),
        }
    }
}

#[derive(Debug)]
struct Slot {
    generation: u32,
    node: Option<Node>,
}

/// Growable slot arena. Vacating a slot bumps its generation.
#[derive(Debug, Default)]
struct Arena {
    slots: Vec<Slot>,
    free: Vec<u32>,
}

impl Arena {
    fn insert(&mut self, node: Node) -> NodeId {
        if let Some(index) = self.free.pop() {
            let slot = &mut self.slots[index as usize];
            debug_assert!(slot.node.is_none());
            slot.node = Some(node);
            NodeId { index, generation: slot.generation }
        } else {
            let index = u32::try_from(self.slots.len()).expect("node arena exhausted");
            self.slots.push(Slot { generation: 1, node: Some(node) });
            NodeId { index, generation: 1 }
        }
    }

    fn remove(&mut self, id: NodeId) -> Node {
        let slot = self.slot_mut(id);
        let node = slot.node.take().expect("live slot without a node");
        slot.generation = slot.generation.wrapping_add(1);
        self.free.push(id.index);
        node
    }

    fn get(&self, id: NodeId) -> &Node {
        let slot = self
            .slots
            .get(id.index as usize)
            .unwrap_or_else(|| panic!("inode {} was never allocated", id.to_inode()));
        assert_eq!(
            slot.generation,
            id.generation,
            "inode {} refers to a destroyed node",
            id.to_inode()
        );
        slot.node.as_ref().expect("live slot without a node")
    }

    fn get_mut(&mut self, id: NodeId) -> &mut Node {
        self.slot_mut(id).node.as_mut().expect("live slot without a node")
    }

    fn slot_mut(&mut self, id: NodeId) -> &mut Slot {
        let slot = self
            .slots
            .get_mut(id.index as usize)
            .unwrap_or_else(|| panic!("inode {} was never allocated", id.to_inode()));
        assert_eq!(
            slot.generation,
            id.generation,
            "inode {} refers to a destroyed node",
            id.to_inode()
        );
        slot
    }

    fn live(&self) -> usize {
        self.slots.len() - self.free.len()
    }
}

/// Everything guarded by the tree lock.
#[derive(Debug)]
struct TreeState {
    arena: Arena,
    tracker: NodeTracker,
    safe_root: String,
}

impl TreeState {
    /// Allocation, tracking and the initial reference are one atomic unit;
    /// the caller links the node to a parent under the same acquisition.
    fn alloc(&mut self, name: String) -> NodeId {
        let id = self.arena.insert(Node::new(name));
        self.tracker.node_created(id);
        self.acquire(id);
        id
    }

    fn acquire(&mut self, id: NodeId) {
        self.arena.get_mut(id).refcount += 1;
    }

    fn release(&mut self, id: NodeId, count: u32) -> bool {
        let node = self.arena.get_mut(id);
        if node.refcount >= count {
            node.refcount -= count;
            if node.refcount == 0 {
                self.destroy(id);
                return true;
            }
        } else {
            let refcount = node.refcount;
            error!(
                inode = id.to_inode(),
                refcount, count, "mismatched reference count release"
            );
        }
        false
    }

    /// Synchronous node death: unlink, close handles, unregister, vacate.
    fn destroy(&mut self, id: NodeId) {
        self.remove_from_parent(id);
        // Dropping the node closes every descriptor its handles still own.
        let node = self.arena.remove(id);
        self.tracker.node_deleted(id);
        drop(node);
    }

    fn add_to_parent(&mut self, id: NodeId, parent: NodeId) {
        let node = self.arena.get_mut(id);
        assert!(
            node.parent.is_none(),
            "inode {} is already parented",
            id.to_inode()
        );
        node.parent = Some(parent);
        self.arena.get_mut(parent).children.push(id);
        // A child holds one reference on its parent.
        self.acquire(parent);
    }

    fn remove_from_parent(&mut self, id: NodeId) {
        let node = self.arena.get_mut(id);
        let Some(parent) = node.parent.take() else {
            return;
        };
        let parent_node = self.arena.get_mut(parent);
        let position = parent_node
            .children
            .iter()
            .position(|&child| child == id)
            .unwrap_or_else(|| {
                panic!("inode {} missing from its parent's children", id.to_inode())
            });
        parent_node.children.remove(position);
        self.release(parent, 1);
    }

    fn lookup_child_by_name(
        &mut self,
        parent: NodeId,
        name: &str,
        acquire: bool,
    ) -> Option<NodeId> {
        let parent_node = self.arena.get(parent);
        let mut found = None;
        for &child in &parent_node.children {
            let node = self.arena.get(child);
            if !node.deleted && node.name.eq_ignore_ascii_case(name) {
                found = Some(child);
                break;
            }
        }
        let child = found?;
        if acquire {
            self.acquire(child);
        }
        Some(child)
    }

    fn delete_tree(&mut self, id: NodeId) {
        // Copy out the child list: destroying a child edits it under us.
        let children = self.arena.get(id).children.clone();
        for child in children {
            self.delete_tree(child);
        }
        assert!(
            self.arena.get(id).children.is_empty(),
            "subtree at inode {} still has children after deletion",
            id.to_inode()
        );
        self.destroy(id);
    }

    fn build_path(&self, id: NodeId, safe: bool) -> String {
        let mut chain = Vec::new();
        let mut current = Some(id);
        while let Some(node_id) = current {
            chain.push(node_id);
            current = self.arena.get(node_id).parent;
        }

        let mut path = String::new();
        for (depth, &node_id) in chain.iter().rev().enumerate() {
            let node = self.arena.get(node_id);
            if depth == 0 {
                // The chain root carries an absolute path as its name; the
                // safe rendering swaps it for the configured placeholder.
                path.push_str(if safe { &self.safe_root } else { &node.name });
            } else {
                path.push('/');
                if safe {
                    path.push_str(&sanitize_segment(&node.name));
                } else {
                    path.push_str(&node.name);
                }
            }
        }
        path
    }
}

/// The directory tree of one mounted filesystem instance.
///
/// All operations are synchronous and bounded; worker threads of the
/// dispatch loop call them concurrently and serialize on the internal lock.
#[derive(Debug)]
pub struct NodeTree {
    state: Mutex<TreeState>,
    /// Handle ids start at 1; 0 is reserved for "no handle".
    next_handle_id: AtomicU64,
}

impl NodeTree {
    /// Creates an empty tree with default options.
    pub fn new() -> Self {
        Self::with_options(FsOptions::default())
    }

    /// Creates an empty tree with the given options.
    pub fn with_options(options: FsOptions) -> Self {
        Self {
            state: Mutex::new(TreeState {
                arena: Arena::default(),
                tracker: NodeTracker::new(options.node_tracking),
                safe_root: options.safe_root,
            }),
            next_handle_id: AtomicU64::new(1),
        }
    }

    /// Creates a node named `name` under `parent`.
    ///
    /// The node starts with one reference (the caller's lookup), and the
    /// parent gains one reference from the linkage. Creation, tracking and
    /// parent-linking happen atomically under the tree lock.
    pub fn create(&self, parent: NodeId, name: impl Into<String>) -> NodeId {
        let mut state = self.state.lock();
        let id = state.alloc(name.into());
        state.add_to_parent(id, parent);
        id
    }

    /// Creates a root node. Roots have no parent and their `name` is an
    /// absolute path rather than a single segment.
    ///
    /// The root carries one extra reference so ordinary release traffic can
    /// never collect it; its refcount is 2 on return.
    pub fn create_root(&self, path: impl Into<String>) -> NodeId {
        let mut state = self.state.lock();
        let id = state.alloc(path.into());
        state.acquire(id);
        id
    }

    /// Resolves an inode presented by the kernel.
    ///
    /// Panics if the inode does not name a currently live node: a request
    /// for a destroyed inode is a lookup-count protocol violation, and
    /// failing fast here is what keeps it from corrupting unrelated state.
    pub fn from_inode(&self, inode: u64) -> NodeId {
        let id = NodeId::from_inode(inode);
        self.state.lock().tracker.check_tracked(id);
        id
    }

    /// Releases `count` references. Returns true iff this release drove the
    /// refcount to zero and destroyed the node; the id must not be used
    /// again once that happens.
    ///
    /// Releasing more references than are held is logged and ignored: the
    /// caller is confused, but destroying the node on its say-so would
    /// invalidate every other holder's references.
    pub fn release(&self, id: NodeId, count: u32) -> bool {
        self.state.lock().release(id, count)
    }

    /// Looks up a direct child of `parent` by name, case-insensitively,
    /// skipping children marked deleted. With `acquire`, takes a reference
    /// on the match before returning it.
    pub fn lookup_child_by_name(
        &self,
        parent: NodeId,
        name: &str,
        acquire: bool,
    ) -> Option<NodeId> {
        self.state.lock().lookup_child_by_name(parent, name, acquire)
    }

    /// Resolves `absolute_path` from `root`, segment by segment. Empty
    /// segments (repeated or trailing `/`) are skipped. Returns a
    /// non-owning id: callers that keep it must acquire separately.
    pub fn lookup_absolute_path(&self, root: NodeId, absolute_path: &str) -> Option<NodeId> {
        let mut guard = self.state.lock();
        let state = &mut *guard;
        let root_name = state.arena.get(root).name.clone();
        let rest = absolute_path.strip_prefix(root_name.as_str())?;
        let mut current = root;
        for segment in rest.split('/').filter(|s| !s.is_empty()) {
            current = state.lookup_child_by_name(current, segment, false)?;
        }
        Some(current)
    }

    /// Renames the node in place; if `new_parent` differs from the current
    /// parent, atomically moves the node, releasing one reference on the
    /// old parent and acquiring one on the new.
    pub fn rename(&self, id: NodeId, new_name: impl Into<String>, new_parent: NodeId) {
        let mut state = self.state.lock();
        state.arena.get_mut(id).name = new_name.into();
        if state.arena.get(id).parent != Some(new_parent) {
            state.remove_from_parent(id);
            state.add_to_parent(id, new_parent);
        }
    }

    /// Marks the node deleted: invisible to name lookup from now on, but
    /// still parented and alive until its references drain.
    pub fn set_deleted(&self, id: NodeId) {
        self.state.lock().arena.get_mut(id).deleted = true;
    }

    /// Destroys the whole subtree rooted at `root`, children first,
    /// regardless of outstanding references. Used for bulk teardown at
    /// unmount.
    pub fn delete_tree(&self, root: NodeId) {
        self.state.lock().delete_tree(root);
    }

    /// The full path of this node, from the root's absolute path down.
    pub fn build_path(&self, id: NodeId) -> String {
        self.state.lock().build_path(id, false)
    }

    /// The PII-safe rendering of [`build_path`](Self::build_path): the root
    /// segment becomes the configured placeholder and every other segment
    /// is sanitized by the redaction collaborator. Safe to log.
    pub fn build_safe_path(&self, id: NodeId) -> String {
        self.state.lock().build_path(id, true)
    }

    /// The node's current name.
    pub fn name(&self, id: NodeId) -> String {
        self.state.lock().arena.get(id).name.clone()
    }

    /// The node's current parent, none for roots.
    pub fn parent(&self, id: NodeId) -> Option<NodeId> {
        self.state.lock().arena.get(id).parent
    }

    /// The node's current reference count. Diagnostic.
    pub fn refcount(&self, id: NodeId) -> u32 {
        self.state.lock().arena.get(id).refcount
    }

    /// Number of live nodes in the tree.
    pub fn node_count(&self) -> usize {
        self.state.lock().arena.live()
    }

    /// Number of nodes registered with the live-node tracker. Zero when
    /// tracking is disabled.
    pub fn tracked_count(&self) -> usize {
        self.state.lock().tracker.len()
    }

    /// Attaches an open-file session to the node and returns its id.
    pub fn add_handle(&self, id: NodeId, handle: FileHandle) -> HandleId {
        let handle_id = HandleId(self.next_handle_id.fetch_add(1, Ordering::Relaxed));
        self.state.lock().arena.get_mut(id).handles.push((handle_id, handle));
        handle_id
    }

    /// Detaches and drops an open-file session, closing its descriptor.
    ///
    /// Panics if the handle is not attached to this node; passing a foreign
    /// or already-destroyed handle is a caller bug.
    pub fn destroy_handle(&self, id: NodeId, handle: HandleId) {
        let mut state = self.state.lock();
        let node = state.arena.get_mut(id);
        let position = node
            .handles
            .iter()
            .position(|&(handle_id, _)| handle_id == handle)
            .unwrap_or_else(|| {
                panic!(
                    "handle {} is not attached to inode {}",
                    handle.raw(),
                    id.to_inode()
                )
            });
        node.handles.remove(position);
    }

    /// True iff any attached file handle has kernel page caching enabled.
    pub fn has_cached_handle(&self, id: NodeId) -> bool {
        self.state
            .lock()
            .arena
            .get(id)
            .handles
            .iter()
            .any(|(_, handle)| handle.is_cached())
    }

    /// Runs `f` on an attached file handle, or returns `None` if no such
    /// handle is attached to the node.
    ///
    /// The tree lock is held for the duration of `f`; `f` must not call
    /// back into the tree.
    pub fn with_handle<R>(
        &self,
        id: NodeId,
        handle: HandleId,
        f: impl FnOnce(&mut FileHandle) -> R,
    ) -> Option<R> {
        let mut state = self.state.lock();
        let node = state.arena.get_mut(id);
        node.handles
            .iter_mut()
            .find(|entry| entry.0 == handle)
            .map(|entry| f(&mut entry.1))
    }

    /// Attaches an open-directory session to the node and returns its id.
    pub fn add_dir_handle(&self, id: NodeId, handle: DirHandle) -> HandleId {
        let handle_id = HandleId(self.next_handle_id.fetch_add(1, Ordering::Relaxed));
        self.state
            .lock()
            .arena
            .get_mut(id)
            .dirhandles
            .push((handle_id, handle));
        handle_id
    }

    /// Detaches and drops an open-directory session, closing its stream.
    ///
    /// Panics if the handle is not attached to this node.
    pub fn destroy_dir_handle(&self, id: NodeId, handle: HandleId) {
        let mut state = self.state.lock();
        let node = state.arena.get_mut(id);
        let position = node
            .dirhandles
            .iter()
            .position(|&(handle_id, _)| handle_id == handle)
            .unwrap_or_else(|| {
                panic!(
                    "dir handle {} is not attached to inode {}",
                    handle.raw(),
                    id.to_inode()
                )
            });
        node.dirhandles.remove(position);
    }

    /// Runs `f` on an attached directory handle, or returns `None` if no
    /// such handle is attached to the node.
    ///
    /// The tree lock is held for the duration of `f`; `f` must not call
    /// back into the tree.
    pub fn with_dir_handle<R>(
        &self,
        id: NodeId,
        handle: HandleId,
        f: impl FnOnce(&mut DirHandle) -> R,
    ) -> Option<R> {
        let mut state = self.state.lock();
        let node = state.arena.get_mut(id);
        node.dirhandles
            .iter_mut()
            .find(|entry| entry.0 == handle)
            .map(|entry| f(&mut entry.1))
    }
}

impl Default for NodeTree {
    fn default() -> Self {
        Self::new()
    }
}
