//! Parser state / coroutine.
//!
//! Every running or suspended parse is itself a value
//! ("each parser-state value IS a coroutine"). Embedding a self-referential
//! value — one that needs `&mut Heap` while conceptually living inside that
//! same heap — does not translate cleanly into Rust's ownership model, so
//! coroutines instead live in `Runtime::coroutines`, addressed by the plain
//! index `CoroutineId`. `Value::Coroutine(CoroutineId)` is the cheap `Copy`
//! reference scripts hold; see `DESIGN.md` for the tradeoff.

use crate::charsource::CharSource;
use crate::error::{FtlError, ResourceError};
use crate::exception::CatchFrame;
use crate::heap::{Heap, HeapId};
use crate::io::{EchoSink, StdEchoSink};
use crate::linesource::LineSource;
use crate::value::Value;

/// Index into `Runtime::coroutines`. Cheap, `Copy`, and the value scripts see
/// when they hold a `coroutine`-typed value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct CoroutineId(pub(crate) u32);

impl CoroutineId {
    pub(crate) fn index(self) -> usize {
        self.0 as usize
    }
}

/// One running (or suspended) parse: its input stream, its lexical
/// environment stack, its locals list, and its throw/catch frames.
///
/// Owns the `state_new`, `free`, `env_push`, `env_push_at_pos`,
/// `env_return`, and `builtin_arg` operations.
pub struct Coroutine {
    id: CoroutineId,
    pub(crate) lines: LineSource,
    /// Mirrors `EnvData::stack` shape: `(dir, env_end)` frames, top-of-stack
    /// last. Lookup stops before the first `env_end` marker that is not the
    /// top itself.
    pub(crate) env: Vec<(HeapId, bool)>,
    /// Head of this coroutine's locals list.
    locals_head: Option<HeapId>,
    catch_frames: Vec<CatchFrame>,
    error_count: u32,
    /// Whether evaluated top-level results are echoed.
    pub(crate) echo: bool,
    /// Positional arguments available to the command currently executing,
    /// for commands that want arguments without going through closure
    /// binding.
    builtin_args: Vec<Value>,
    max_depth: usize,
    /// `write` and uncaught-error reporting go through this rather than
    /// `println!`/`eprintln!` directly, so embedders can capture or
    /// redirect a coroutine's output.
    echo_sink: Box<dyn EchoSink>,
}

impl Coroutine {
    /// A coroutine starts with its vocabulary directory (generic
    /// commands/functions) as the bottom of its environment stack, with the
    /// process-wide root directory stacked on top as the default (writable,
    /// shared) scope `set`/`def` land in. Neither frame is marked
    /// `env_end`: the bottom frame is always reachable, and lookup should
    /// fall all the way through to it rather than stopping one frame short.
    pub(crate) fn new(id: CoroutineId, op_defs: HeapId, root: HeapId, max_depth: usize) -> Self {
        Self {
            id,
            lines: LineSource::new(),
            env: vec![(op_defs, false), (root, false)],
            locals_head: None,
            catch_frames: Vec::new(),
            error_count: 0,
            echo: false,
            builtin_args: Vec::new(),
            max_depth,
            echo_sink: Box::new(StdEchoSink),
        }
    }

    pub fn id(&self) -> CoroutineId {
        self.id
    }

    /// Redirects this coroutine's `write` output and diagnostics, replacing
    /// the default stdout/stderr sink.
    pub fn set_echo_sink(&mut self, sink: Box<dyn EchoSink>) {
        self.echo_sink = sink;
    }

    /// The sink `write` and front ends route output/diagnostics through.
    pub fn echo_sink_mut(&mut self) -> &mut dyn EchoSink {
        self.echo_sink.as_mut()
    }

    pub fn push_source(&mut self, source: Box<dyn CharSource>, origin: impl Into<String>) {
        self.lines.push_source(source, origin);
    }

    pub fn push_string(&mut self, text: impl Into<String>, origin: impl Into<String>) {
        self.lines.push_string(text, origin);
    }

    pub fn is_exhausted(&self) -> bool {
        self.lines.is_empty()
    }

    /// Reads one logical line from this coroutine's source stack, for a CLI
    /// front end's REPL loop.
    pub fn next_line(&mut self) -> Option<String> {
        self.lines.next_line()
    }

    pub fn set_echo(&mut self, echo: bool) {
        self.echo = echo;
    }

    pub fn echo(&self) -> bool {
        self.echo
    }

    pub fn error_count(&self) -> u32 {
        self.error_count
    }

    // --- throw/catch plumbing required by `crate::exception` ---

    pub(crate) fn env_depth(&self) -> usize {
        self.env.len()
    }

    pub(crate) fn push_catch_frame(&mut self, frame: CatchFrame) {
        self.catch_frames.push(frame);
    }

    pub(crate) fn pop_catch_frame(&mut self) -> Option<CatchFrame> {
        self.catch_frames.pop()
    }

    pub(crate) fn has_catch_frame(&self) -> bool {
        !self.catch_frames.is_empty()
    }

    pub(crate) fn note_error(&mut self) {
        self.error_count += 1;
    }

    pub(crate) fn env_truncate(&mut self, pos: usize) {
        self.env.truncate(pos);
    }

    // --- environment-stack operations ---

    /// `env_push`: pushes a new top frame, enforcing the configured
    /// recursion-depth limit.
    pub(crate) fn env_push(&mut self, dir: HeapId, env_end: bool) -> Result<usize, FtlError> {
        if self.env.len() >= self.max_depth {
            return Err(ResourceError::Recursion { limit: self.max_depth, depth: self.env.len() }.into());
        }
        let pos = self.env.len();
        self.env.push((dir, env_end));
        Ok(pos)
    }

    /// `env_push_at_pos`: inserts a frame at a specific stack position,
    /// shifting later frames up. Used when restoring a previously captured
    /// lexical position exactly rather than always stacking on top.
    pub(crate) fn env_push_at_pos(&mut self, pos: usize, dir: HeapId, env_end: bool) -> usize {
        let pos = pos.min(self.env.len());
        self.env.insert(pos, (dir, env_end));
        pos
    }

    /// `env_return`: pops back to a previously saved depth.
    pub(crate) fn env_return(&mut self, pos: usize) {
        self.env.truncate(pos);
    }

    // --- locals protocol, coroutine side ---

    pub(crate) fn localize(&mut self, heap: &mut Heap, id: HeapId) {
        heap.local_push(&mut self.locals_head, id);
    }

    pub(crate) fn commit(&mut self, heap: &mut Heap, id: HeapId) {
        heap.unlocal(&mut self.locals_head, id);
    }

    /// Every value still on this coroutine's locals list, plus its live
    /// environment frames: the two root sets for a single coroutine.
    pub(crate) fn gc_roots(&self, heap: &Heap) -> Vec<HeapId> {
        let mut roots = heap.local_ids(self.locals_head);
        roots.extend(self.env.iter().map(|(id, _)| *id));
        roots
    }

    // --- `builtin_arg` ---

    pub(crate) fn set_builtin_args(&mut self, args: Vec<Value>) {
        self.builtin_args = args;
    }

    pub fn builtin_arg(&self, index: usize) -> Value {
        self.builtin_args.get(index).copied().unwrap_or(Value::Null)
    }

    pub(crate) fn builtin_arg_count(&self) -> usize {
        self.builtin_args.len()
    }
}

/// Name lookup across the environment stack, honoring the stack-dir's
/// env-end stopping rule: the top frame is always checked, and the walk
/// stops right after checking the first non-top `env_end` frame.
pub(crate) fn env_lookup(heap: &mut Heap, co: &mut Coroutine, name: &str) -> Option<Value> {
    let frames = co.env.clone();
    let top = frames.len().checked_sub(1)?;
    if let Some(v) = crate::dirops::lookup_name(heap, co, frames[top].0, name) {
        return Some(v);
    }
    let mut idx = top;
    while idx > 0 {
        idx -= 1;
        if frames[idx].1 {
            break;
        }
        if let Some(v) = crate::dirops::lookup_name(heap, co, frames[idx].0, name) {
            return Some(v);
        }
    }
    None
}
