//! The directory abstraction: a uniform associative container with seven
//! concrete shapes.
//!
//! Rather than a trait object per shape, this follows the pattern-matching
//! alternative: one sum type (`DirKind`) dispatched by `match`. `Value`
//! itself already follows the same shape.

use crate::heap::HeapId;
use crate::value::Value;

/// A normalized, hashable representation of a directory key.
///
/// Any value is allowed as a key; this crate restricts hashable identity to
/// primitives plus address-identity for everything else, which covers every
/// case the grammar and generic commands actually produce.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub(crate) enum DirKey {
    Null,
    Int(i64),
    Str(String),
    /// Anything else is keyed by heap address identity.
    Identity(HeapId),
}

impl DirKey {
    pub(crate) fn from_value(v: &Value, heap: &crate::heap::Heap) -> Self {
        match v {
            Value::Null => Self::Null,
            Value::Int(n) => Self::Int(*n),
            Value::Str(id) => {
                let crate::heap::HeapData::Str(s) = heap.get(*id) else { unreachable!() };
                Self::Str(String::from_utf8_lossy(s.bytes(heap)).into_owned())
            }
            other => Self::Identity(other.heap_id().expect("non-ref value must be Null/Int/Str")),
        }
    }
}

/// One field of a `struct`/`array` directory: a getter/setter pair closing
/// over host memory.
pub(crate) struct StructField {
    pub name: String,
    pub get: Box<dyn Fn() -> Value>,
    pub set: Option<Box<dyn FnMut(Value)>>,
}

/// The seven concrete directory shapes.
pub(crate) enum DirKind {
    /// Insertion-ordered string/primitive-keyed map.
    Id(indexmap::IndexMap<DirKey, Value>),
    /// Dense, integer-indexed vector; resizes on assignment past the end.
    Vec(Vec<Value>),
    /// Virtual `(first, inc, last)` integer sequence; never materialized.
    Series { first: i64, inc: i64, last: i64 },
    /// Bridges to the process environment (`std::env`).
    SysEnv,
    /// Host memory treated as a keyed set of fields.
    Struct(Vec<StructField>),
    /// Host memory treated as an indexed set of elements, all of one shape.
    Array { get: Box<dyn Fn(usize) -> Option<Value>>, set: Option<Box<dyn FnMut(usize, Value)>>, len: usize },
    /// Composes an index directory with a value directory: looks up twice.
    Join { index: HeapId, values: HeapId },
    /// An ordered list of directories; lookup stops before the first
    /// `env_end` marker (that is not the top itself).
    Stack(Vec<(HeapId, bool)>),
    /// Delegates `get`/`set`/`getall`/`count` to user-supplied closure values.
    Dyn { get: Value, set: Option<Value>, getall: Option<Value>, count: Option<Value> },
}

/// A directory value: one of the seven [`DirKind`] shapes plus a lock token.
pub(crate) struct DirData {
    pub kind: DirKind,
    /// Locking: `Some` rejects `add` of new keys but allows updates/reads.
    /// The token's identity (not value) is what matters.
    pub lock_token: Option<Value>,
}

impl DirData {
    pub(crate) fn new(kind: DirKind) -> Self {
        Self { kind, lock_token: None }
    }

    pub(crate) fn is_locked(&self) -> bool {
        self.lock_token.is_some()
    }

    pub(crate) fn mark_children(&self, out: &mut Vec<HeapId>) {
        match &self.kind {
            DirKind::Id(map) => {
                for v in map.values() {
                    if let Some(id) = v.heap_id() {
                        out.push(id);
                    }
                }
            }
            DirKind::Vec(items) => {
                for v in items {
                    if let Some(id) = v.heap_id() {
                        out.push(id);
                    }
                }
            }
            DirKind::Series { .. } | DirKind::SysEnv => {}
            DirKind::Struct(_) | DirKind::Array { .. } => {
                // Host-memory backed: getters/setters close over host state
                // that is not part of this heap. The host must guarantee the
                // backing pointer outlives the directory.
            }
            DirKind::Join { index, values } => {
                out.push(*index);
                out.push(*values);
            }
            DirKind::Stack(dirs) => {
                for (id, _env_end) in dirs {
                    out.push(*id);
                }
            }
            DirKind::Dyn { get, set, getall, count } => {
                for v in [Some(get), set.as_ref(), getall.as_ref(), count.as_ref()].into_iter().flatten() {
                    if let Some(id) = v.heap_id() {
                        out.push(id);
                    }
                }
            }
        }
    }
}
