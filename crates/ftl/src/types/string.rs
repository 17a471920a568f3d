//! String value storage.

use crate::heap::HeapId;

/// Backing storage for a `string` value.
///
/// Variants mirror a "copied, constant, allocated-but-writable, substring"
/// taxonomy. `Constant` covers both "borrowed static" data and, once
/// allocated, any buffer the interpreter itself owns but never mutates in
/// place (the copied/allocated-but-writable distinction matters in a
/// manually-managed heap; in Rust both are just an owned `Vec<u8>`).
pub(crate) enum StrData {
    /// Owned, independently allocated bytes (covers both "copied" and
    /// "allocated-but-writable").
    Owned(Vec<u8>),
    /// Borrowed static data (string/command help text, literals).
    Constant(&'static [u8]),
    /// A view into a parent string's storage, sharing rather than
    /// duplicating it. `parent` must stay reachable as long as this value
    /// is (enforced by `mark_children`).
    Substring { parent: HeapId, offset: usize, len: usize },
}

impl StrData {
    pub(crate) fn substring_parent(&self) -> Option<HeapId> {
        match self {
            Self::Substring { parent, .. } => Some(*parent),
            _ => None,
        }
    }

    /// Resolves to the raw bytes, following a substring's parent link.
    ///
    /// `heap` is needed because substrings share a parent's storage rather
    /// than duplicating it.
    pub(crate) fn bytes<'a>(&'a self, heap: &'a crate::heap::Heap) -> &'a [u8] {
        match self {
            Self::Owned(b) => b,
            Self::Constant(b) => b,
            Self::Substring { parent, offset, len } => {
                let crate::heap::HeapData::Str(parent_data) = heap.get(*parent) else {
                    unreachable!("substring parent must be a string")
                };
                let parent_bytes = parent_data.bytes(heap);
                &parent_bytes[*offset..*offset + *len]
            }
        }
    }
}
