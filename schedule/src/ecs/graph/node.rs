use std::fmt::{self, Debug};

/// Identifier of a node in the schedule graphs.
///
/// Systems and sets live in separate dense arrays; the tag says which array the index points
/// into. Two ids are equal only when both tag and index match.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum NodeId {
    /// Index into the system array.
    System(usize),
    /// Index into the set array.
    Set(usize),
}

impl NodeId {
    /// The dense index, regardless of kind.
    #[inline]
    pub const fn index(&self) -> usize {
        match self {
            NodeId::System(index) | NodeId::Set(index) => *index,
        }
    }

    /// Whether this identifies a system.
    #[inline]
    pub const fn is_system(&self) -> bool {
        matches!(self, NodeId::System(_))
    }

    /// Whether this identifies a set.
    #[inline]
    pub const fn is_set(&self) -> bool {
        matches!(self, NodeId::Set(_))
    }

    /// The index when this is a system.
    #[inline]
    pub const fn as_system(&self) -> Option<usize> {
        match self {
            NodeId::System(index) => Some(*index),
            NodeId::Set(_) => None,
        }
    }

    /// The index when this is a set.
    #[inline]
    pub const fn as_set(&self) -> Option<usize> {
        match self {
            NodeId::Set(index) => Some(*index),
            NodeId::System(_) => None,
        }
    }

    /// "system" or "set", used in diagnostics.
    pub const fn kind(&self) -> &'static str {
        match self {
            NodeId::System(_) => "system",
            NodeId::Set(_) => "system set",
        }
    }
}

impl Debug for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeId::System(index) => write!(f, "System({index})"),
            NodeId::Set(index) => write!(f, "Set({index})"),
        }
    }
}
