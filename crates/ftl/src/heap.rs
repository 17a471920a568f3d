//! The value heap and its mark-sweep garbage collector.
//!
//! Every heap-allocated value lives in a slot of the arena below, addressed
//! by a stable [`HeapId`]. Unlike a textbook intrusive linked list, the arena
//! doubles as the "global heap list": sweeping simply walks every slot.
//! What *is* kept as an honest intrusive doubly-linked list is the
//! per-coroutine "locals" chain, since that needs O(1) arbitrary removal on
//! `unlocal`.

use crate::types::{ClosureData, CommandData, DirData, EnvData, FunctionData, StreamData};

/// Opaque handle to a heap-allocated value. Identity is the slot index;
/// equality on `HeapId` is address equality.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HeapId(u32);

impl HeapId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// The concrete payload behind a heap-allocated [`crate::value::Value`].
///
/// Mirrors `Value`'s variant list minus the immediate values (null, int)
/// which `Value` stores inline.
pub(crate) enum HeapData {
    Str(crate::types::StrData),
    Code(crate::types::CodeData),
    Dir(DirData),
    Closure(ClosureData),
    Env(EnvData),
    Stream(StreamData),
    Command(CommandData),
    Function(FunctionData),
}

impl HeapData {
    pub(crate) fn type_name(&self) -> &'static str {
        match self {
            Self::Str(_) => "string",
            Self::Code(_) => "code",
            Self::Dir(_) => "directory",
            Self::Closure(_) => "closure",
            Self::Env(_) => "environment",
            Self::Stream(_) => "stream",
            Self::Command(_) => "command",
            Self::Function(_) => "function",
        }
    }

    /// Pushes onto `out` every `HeapId` this value directly references.
    ///
    /// The per-type mark hook: the mark phase calls it transitively starting
    /// from every root.
    pub(crate) fn mark_children(&self, out: &mut Vec<HeapId>) {
        match self {
            Self::Str(s) => {
                if let Some(parent) = s.substring_parent() {
                    out.push(parent);
                }
            }
            Self::Code(_) => {}
            Self::Dir(d) => d.mark_children(out),
            Self::Closure(c) => c.mark_children(out),
            Self::Env(e) => e.mark_children(out),
            Self::Stream(s) => s.mark_children(out),
            Self::Command(c) => c.mark_children(out),
            Self::Function(f) => f.mark_children(out),
        }
    }
}

/// One arena slot: the payload plus GC bookkeeping.
struct Slot {
    data: HeapData,
    /// Last `heap_version` this slot was marked live in.
    mark: u64,
    /// Static/global values (e.g. registered types) are never swept.
    on_heap: bool,
    /// Intrusive doubly-linked "locals" chain, or `None` if this slot has
    /// been `unlocal`'d (committed into a rooted container) or was never local.
    locals_prev: Option<HeapId>,
    locals_next: Option<HeapId>,
}

/// The global value heap: a slot arena plus a monotonic mark-phase counter.
pub struct Heap {
    slots: Vec<Option<Slot>>,
    free_list: Vec<HeapId>,
    heap_version: u64,
}

impl Heap {
    pub(crate) fn new() -> Self {
        Self { slots: Vec::new(), free_list: Vec::new(), heap_version: 1 }
    }

    /// Allocates `data` as a fresh value with no locals-list membership yet.
    /// Callers place it on a coroutine's locals list via [`Heap::local_push`]
    /// immediately, since freshly-allocated values are local by convention
    /// until something roots them elsewhere.
    pub(crate) fn alloc(&mut self, data: HeapData) -> HeapId {
        let slot = Slot { data, mark: 0, on_heap: true, locals_prev: None, locals_next: None };
        if let Some(id) = self.free_list.pop() {
            self.slots[id.index()] = Some(slot);
            id
        } else {
            let id = HeapId(self.slots.len() as u32);
            self.slots.push(Some(slot));
            id
        }
    }

    /// Allocates a static value that the sweeper must never free (type
    /// descriptors, the null/int singletons).
    pub(crate) fn alloc_static(&mut self, data: HeapData) -> HeapId {
        let id = self.alloc(data);
        self.slots[id.index()].as_mut().expect("just allocated").on_heap = false;
        id
    }

    pub(crate) fn get(&self, id: HeapId) -> &HeapData {
        &self.slots[id.index()].as_ref().expect("use of freed heap value").data
    }

    pub(crate) fn get_mut(&mut self, id: HeapId) -> &mut HeapData {
        &mut self.slots[id.index()].as_mut().expect("use of freed heap value").data
    }

    /// Appends `id` to the head of the locals list rooted at `*head`.
    pub(crate) fn local_push(&mut self, head: &mut Option<HeapId>, id: HeapId) {
        if let Some(old_head) = *head {
            self.slots[old_head.index()].as_mut().expect("live").locals_prev = Some(id);
        }
        let slot = self.slots[id.index()].as_mut().expect("live");
        slot.locals_next = *head;
        slot.locals_prev = None;
        *head = Some(id);
    }

    /// Removes `id` from whatever locals list it is on (O(1)) — the
    /// commitment point where a value stops being a root by virtue of the
    /// locals list and must already be reachable some other way. Safe to
    /// call on an already unlocalled value (no-op).
    pub(crate) fn unlocal(&mut self, head: &mut Option<HeapId>, id: HeapId) {
        let (prev, next) = {
            let slot = self.slots[id.index()].as_mut().expect("live");
            if slot.locals_prev.is_none() && *head != Some(id) {
                // Not on this list (or already unlocalled); nothing to do.
                return;
            }
            (slot.locals_prev, slot.locals_next)
        };
        match prev {
            Some(p) => self.slots[p.index()].as_mut().expect("live").locals_next = next,
            None => *head = next,
        }
        if let Some(n) = next {
            self.slots[n.index()].as_mut().expect("live").locals_prev = prev;
        }
        let slot = self.slots[id.index()].as_mut().expect("live");
        slot.locals_prev = None;
        slot.locals_next = None;
    }

    /// Walks a locals list from `head`, collecting every member.
    pub(crate) fn local_ids(&self, head: Option<HeapId>) -> Vec<HeapId> {
        let mut out = Vec::new();
        let mut cur = head;
        while let Some(id) = cur {
            out.push(id);
            cur = self.slots[id.index()].as_ref().expect("live").locals_next;
        }
        out
    }

    /// Marks `id` and everything transitively reachable from it, skipping
    /// already-marked slots. The core of `collect`'s mark phase.
    fn mark_from(&mut self, roots: Vec<HeapId>) {
        let mut work = roots;
        while let Some(id) = work.pop() {
            let Some(slot) = self.slots.get_mut(id.index()).and_then(|s| s.as_mut()) else {
                continue;
            };
            if slot.mark == self.heap_version {
                continue;
            }
            slot.mark = self.heap_version;
            slot.data.mark_children(&mut work);
        }
    }

    /// Runs one full mark-sweep cycle rooted at `roots`. Any heap slot with
    /// `on_heap == true` not reached from `roots` is freed.
    pub(crate) fn collect(&mut self, roots: Vec<HeapId>) -> usize {
        self.heap_version += 1;
        self.mark_from(roots);

        let mut freed = 0;
        for (idx, slot_opt) in self.slots.iter_mut().enumerate() {
            let should_free = matches!(slot_opt, Some(slot) if slot.on_heap && slot.mark != self.heap_version);
            if should_free {
                *slot_opt = None;
                self.free_list.push(HeapId(idx as u32));
                freed += 1;
            }
        }
        freed
    }

    pub(crate) fn live_count(&self) -> usize {
        self.slots.iter().filter(|s| s.is_some()).count()
    }
}

impl std::fmt::Debug for HeapId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "HeapId({})", self.0)
    }
}
