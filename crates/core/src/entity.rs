//! Records with a stable identity.

/// A record that keeps its identity across snapshots: two values with the same
/// id describe the same product, sale event or issue, possibly in different states.
pub trait Entity {
    type Id: Copy + Ord + core::hash::Hash + core::fmt::Debug + core::fmt::Display;

    fn id(&self) -> &Self::Id;
}
