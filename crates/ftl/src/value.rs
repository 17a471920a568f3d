//! The universal runtime datum.
//!
//! Rather than a refcounted value, this enum is a plain `Copy` type: the
//! mark-sweep collection strategy means cloning a reference no longer needs
//! to touch a refcount, so there is nothing stopping `#[derive(Clone,
//! Copy)]` here. Heap-backed variants carry a [`HeapId`]; identity for those
//! is address identity.

use std::cmp::Ordering;

use crate::coroutine::CoroutineId;
use crate::heap::{Heap, HeapData, HeapId};
use crate::types::{DirKind, IpAddr4, MacAddr};

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Value {
    Null,
    Int(i64),
    Real(f64),
    Str(HeapId),
    Code(HeapId),
    Dir(HeapId),
    Closure(HeapId),
    Env(HeapId),
    Stream(HeapId),
    Command(HeapId),
    Function(HeapId),
    Coroutine(CoroutineId),
    Ip(IpAddr4),
    Mac(MacAddr),
}

impl Value {
    /// Integer constructor.
    pub fn new_int(n: i64) -> Self {
        Self::Int(n)
    }

    /// `uint_new`: constructs from an unsigned 64-bit value,
    /// wrapping into the signed representation (the interpreter has no
    /// separate unsigned variant; callers that need unsigned semantics
    /// reinterpret the bits with `number_unsigned`).
    pub fn uint_new(n: u64) -> Self {
        Self::Int(n as i64)
    }

    /// `number`: extracts the `i64`, or `None` if not an int.
    pub fn number(&self) -> Option<i64> {
        match self {
            Self::Int(n) => Some(*n),
            _ => None,
        }
    }

    pub fn number_unsigned(&self) -> Option<u64> {
        self.number().map(|n| n as u64)
    }

    /// The `HeapId` backing this value, if it is heap-allocated.
    pub(crate) fn heap_id(&self) -> Option<HeapId> {
        match self {
            Self::Str(id)
            | Self::Code(id)
            | Self::Dir(id)
            | Self::Closure(id)
            | Self::Env(id)
            | Self::Stream(id)
            | Self::Command(id)
            | Self::Function(id) => Some(*id),
            Self::Null | Self::Int(_) | Self::Real(_) | Self::Coroutine(_) | Self::Ip(_) | Self::Mac(_) => None,
        }
    }

    /// `type_name`.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Int(_) => "int",
            Self::Real(_) => "real",
            Self::Str(_) => "string",
            Self::Code(_) => "code",
            Self::Dir(_) => "directory",
            Self::Closure(_) => "closure",
            Self::Env(_) => "environment",
            Self::Stream(_) => "stream",
            Self::Command(_) => "command",
            Self::Function(_) => "function",
            Self::Coroutine(_) => "coroutine",
            Self::Ip(_) => "ip",
            Self::Mac(_) => "mac",
        }
    }

    /// `equal_type`.
    pub fn equal_type(&self, kind: &str) -> bool {
        self.type_name() == kind
    }

    /// Truthiness used by `if`/`while`/logical operators: null and zero are
    /// false, everything else is true. Strings/directories are true even
    /// when empty, keeping the simplest rule consistent across all types
    /// rather than special-casing emptiness.
    pub fn truthy(&self) -> bool {
        !matches!(self, Self::Null | Self::Int(0))
    }

    /// `print`: renders the value as source-ish text.
    pub fn print(&self, heap: &Heap) -> String {
        match self {
            Self::Null => "null".to_string(),
            Self::Int(n) => n.to_string(),
            Self::Real(r) => format!("{r}"),
            Self::Str(id) => {
                let HeapData::Str(s) = heap.get(*id) else { unreachable!() };
                String::from_utf8_lossy(s.bytes(heap)).into_owned()
            }
            Self::Code(id) => {
                let HeapData::Code(c) = heap.get(*id) else { unreachable!() };
                format!("{{{}}}", c.body)
            }
            Self::Dir(id) => print_dir(*id, heap),
            Self::Closure(_) => "<closure>".to_string(),
            Self::Env(_) => "<environment>".to_string(),
            Self::Stream(_) => "<stream>".to_string(),
            Self::Command(id) => {
                let HeapData::Command(c) = heap.get(*id) else { unreachable!() };
                format!("<command {}>", c.name)
            }
            Self::Function(id) => {
                let HeapData::Function(f) = heap.get(*id) else { unreachable!() };
                format!("<function {}>", f.name)
            }
            Self::Coroutine(id) => format!("<coroutine {id:?}>"),
            Self::Ip(ip) => ip.to_string(),
            Self::Mac(mac) => mac.to_string(),
        }
    }

    /// `fprint_detail`: same as `print` for scalars, but for directories
    /// optionally includes per-entry detail instead of a summary.
    pub fn fprint_detail(&self, heap: &Heap, detailed: bool) -> String {
        if !detailed {
            return self.print(heap);
        }
        match self {
            Self::Dir(id) => {
                let HeapData::Dir(d) = heap.get(*id) else { unreachable!() };
                match &d.kind {
                    DirKind::Id(map) => {
                        let parts: Vec<String> =
                            map.iter().map(|(k, v)| format!("{k:?}={}", v.print(heap))).collect();
                        format!("[{}]", parts.join(", "))
                    }
                    DirKind::Vec(items) => {
                        let parts: Vec<String> = items.iter().map(|v| v.print(heap)).collect();
                        format!("<{}>", parts.join(", "))
                    }
                    _ => self.print(heap),
                }
            }
            _ => self.print(heap),
        }
    }
}

fn print_dir(id: HeapId, heap: &Heap) -> String {
    let HeapData::Dir(d) = heap.get(id) else { unreachable!() };
    match &d.kind {
        DirKind::Id(map) => format!("[dir {} entries]", map.len()),
        DirKind::Vec(items) => format!("<{} elements>", items.len()),
        DirKind::Series { first, inc, last } => format!("series({first},{inc},{last})"),
        DirKind::SysEnv => "<sysenv>".to_string(),
        DirKind::Struct(fields) => format!("<struct {} fields>", fields.len()),
        DirKind::Array { len, .. } => format!("<array {len} elements>"),
        DirKind::Join { .. } => "<join>".to_string(),
        DirKind::Stack(dirs) => format!("<stack {} frames>", dirs.len()),
        DirKind::Dyn { .. } => "<dyn>".to_string(),
    }
}

/// `cmp`: type-first by a stable rank, then by content.
pub fn cmp_values(a: &Value, b: &Value, heap: &Heap) -> Ordering {
    fn rank(v: &Value) -> u8 {
        match v {
            Value::Null => 0,
            Value::Int(_) => 1,
            Value::Real(_) => 2,
            Value::Str(_) => 3,
            Value::Ip(_) => 4,
            Value::Mac(_) => 5,
            _ => 10,
        }
    }
    let (ra, rb) = (rank(a), rank(b));
    if ra != rb {
        return ra.cmp(&rb);
    }
    match (a, b) {
        (Value::Null, Value::Null) => Ordering::Equal,
        (Value::Int(x), Value::Int(y)) => x.cmp(y),
        (Value::Real(x), Value::Real(y)) => x.partial_cmp(y).unwrap_or(Ordering::Equal),
        (Value::Str(x), Value::Str(y)) => {
            let HeapData::Str(sx) = heap.get(*x) else { unreachable!() };
            let HeapData::Str(sy) = heap.get(*y) else { unreachable!() };
            sx.bytes(heap).cmp(sy.bytes(heap))
        }
        (Value::Ip(x), Value::Ip(y)) => x.cmp(y),
        (Value::Mac(x), Value::Mac(y)) => x.cmp(y),
        _ => {
            let (ia, ib) = (a.heap_id(), b.heap_id());
            ia.cmp(&ib)
        }
    }
}

pub(crate) fn values_equal(a: &Value, b: &Value, heap: &Heap) -> bool {
    cmp_values(a, b, heap) == Ordering::Equal
}
