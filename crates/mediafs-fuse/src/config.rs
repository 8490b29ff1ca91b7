//! Options for a tree instance.

/// Configuration for a [`NodeTree`](crate::NodeTree) instance.
///
/// One `FsOptions` is fixed per mounted filesystem instance at construction
/// time; nothing here is reconfigurable after mount.
#[derive(Debug, Clone)]
pub struct FsOptions {
    /// Whether to maintain the live-node registry consulted by
    /// [`NodeTree::from_inode`](crate::NodeTree::from_inode).
    ///
    /// When enabled, resolving an inode whose node was already destroyed
    /// fails fast with a diagnostic instead of proceeding on a dead entry.
    /// Disabling skips only that registry; a stale inode that aliases a
    /// recycled slot is still caught by the slot's generation check.
    /// Default: `true`.
    pub node_tracking: bool,

    /// Placeholder substituted for the root's absolute path by
    /// [`NodeTree::build_safe_path`](crate::NodeTree::build_safe_path).
    ///
    /// The real root path embeds volume- and user-specific components that
    /// must not reach log output. Default: `"/storage"`.
    pub safe_root: String,
}

impl Default for FsOptions {
    fn default() -> Self {
        Self {
            node_tracking: true,
            safe_root: "/storage".to_string(),
        }
    }
}

impl FsOptions {
    /// Enables or disables the live-node registry.
    #[must_use]
    pub fn node_tracking(mut self, enabled: bool) -> Self {
        self.node_tracking = enabled;
        self
    }

    /// Sets the placeholder used for the root segment of safe paths.
    #[must_use]
    pub fn safe_root(mut self, safe_root: impl Into<String>) -> Self {
        self.safe_root = safe_root.into();
        self
    }
}
