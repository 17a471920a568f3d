//! The explicit, process-wide `Runtime` object: the heap, the root
//! directory, the coroutine registry, and resource limits, passed around
//! instead of kept as module singletons.

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::SeedableRng;

use crate::coroutine::{Coroutine, CoroutineId};
use crate::error::FtlResult;
use crate::heap::{Heap, HeapData};
use crate::printf::FormatTable;
use crate::types::{DirData, DirKey, DirKind};
use crate::value::Value;

/// Resource limits: the hardcoded `MAXDEPTH`-style constants of a typical C
/// interpreter, made configurable instead.
#[derive(Debug, Clone, Copy)]
pub struct Limits {
    /// Maximum environment-stack depth before a coroutine's `env_push`
    /// reports a fatal `Recursion` error.
    pub max_env_depth: usize,
    /// Heap live-value count past which the embedder is expected to call
    /// `Runtime::collect_all` before the next allocation; advisory only —
    /// nothing in this crate enforces it automatically, since allocation
    /// happens throughout the interpreter and a hard cap would need every
    /// call site to check it.
    pub gc_hint_threshold: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Self { max_env_depth: 2048, gc_hint_threshold: 100_000 }
    }
}

/// The embeddable interpreter instance: one heap, one root directory, N
/// coroutines, process-wide limits and RNG state (`rand` backs the `-r SEED`
/// CLI option and any script-visible randomness commands).
pub struct Runtime {
    pub(crate) heap: Heap,
    pub(crate) root: crate::heap::HeapId,
    op_defs: crate::heap::HeapId,
    coroutines: Vec<Coroutine>,
    format_table: FormatTable,
    json_dir: crate::heap::HeapId,
    pub limits: Limits,
    pub rng: StdRng,
}

impl Runtime {
    pub fn new(limits: Limits) -> Self {
        let mut heap = Heap::new();
        let op_defs = crate::commands::build_op_defs(&mut heap);
        let root = heap.alloc_static(HeapData::Dir(DirData::new(DirKind::Id(IndexMap::new()))));
        let json_dir = crate::modules::json::build_module(&mut heap);

        let mut format_table = FormatTable::new();
        crate::modules::json::register_formatters(&mut format_table);

        {
            let HeapData::Dir(d) = heap.get_mut(root) else { unreachable!() };
            let DirKind::Id(map) = &mut d.kind else { unreachable!("root is always an id-dir") };
            map.insert(crate::types::DirKey::Str("json".to_string()), Value::Dir(json_dir));
        }

        Self { heap, root, op_defs, coroutines: Vec::new(), format_table, json_dir, limits, rng: StdRng::from_entropy() }
    }

    pub fn with_seed(limits: Limits, seed: u64) -> Self {
        let mut rt = Self::new(limits);
        rt.rng = StdRng::seed_from_u64(seed);
        rt
    }

    /// `state_new`: allocates a fresh coroutine slot.
    pub fn spawn_coroutine(&mut self) -> CoroutineId {
        let id = CoroutineId(self.coroutines.len() as u32);
        let co = Coroutine::new(id, self.op_defs, self.root, self.limits.max_env_depth);
        self.coroutines.push(co);
        id
    }

    pub fn coroutine_mut(&mut self, id: CoroutineId) -> &mut Coroutine {
        &mut self.coroutines[id.index()]
    }

    pub fn coroutine(&self, id: CoroutineId) -> &Coroutine {
        &self.coroutines[id.index()]
    }

    /// `free`: drops a coroutine's state. Implemented as a tombstone rather
    /// than a `Vec::remove` so existing `CoroutineId`s referencing later
    /// coroutines stay valid.
    pub fn free_coroutine(&mut self, id: CoroutineId) {
        self.coroutines[id.index()] = Coroutine::new(id, self.op_defs, self.root, self.limits.max_env_depth);
    }

    /// Runs one line of source through `id`'s parser state. An uncaught
    /// `throw` (no enclosing `catch` frame) counts as a fatal error for the
    /// caller, same as the `Value` it carries printed to stderr by the CLI
    /// front ends; a value thrown into a live `catch` never reaches here.
    pub fn eval_line(&mut self, id: CoroutineId, line: &str) -> FtlResult<crate::value::Value> {
        let co = &mut self.coroutines[id.index()];
        match crate::parser::eval_line(&mut self.heap, co, line) {
            Ok(v) => Ok(v),
            Err(crate::exception::EvalError::Fatal(fe)) => Err(fe),
            Err(crate::exception::EvalError::Thrown(v)) => {
                let msg = v.print(&self.heap);
                co.note_error();
                Err(crate::error::FtlError::UncaughtThrow(msg))
            }
        }
    }

    /// `collect`: marks from the root directory and every known coroutine's
    /// locals + environment stack, then sweeps.
    pub fn collect_all(&mut self) -> usize {
        let mut roots = vec![self.root, self.op_defs];
        for co in &self.coroutines {
            roots.extend(co.gc_roots(&self.heap));
        }
        self.heap.collect(roots)
    }

    pub fn live_count(&self) -> usize {
        self.heap.live_count()
    }

    /// Renders `fmt` through the process-wide format table.
    pub fn format(&self, fmt: &str, args: &[Value]) -> String {
        self.format_table.render(&self.heap, fmt, args)
    }

    pub fn format_help(&self) -> Vec<String> {
        self.format_table.help_lines()
    }

    pub(crate) fn json_dir(&self) -> crate::heap::HeapId {
        self.json_dir
    }

    /// `print`, exposed for front ends that need to render a result without
    /// reaching into the heap directly.
    pub fn print_value(&self, v: Value) -> String {
        v.print(&self.heap)
    }

    /// Binds `name` directly into the process root directory — the CLI
    /// front ends' way of exposing `argv` as a script-visible vector.
    pub fn bind_global(&mut self, name: &str, value: Value) {
        let HeapData::Dir(d) = self.heap.get_mut(self.root) else { unreachable!() };
        let DirKind::Id(map) = &mut d.kind else { unreachable!("root is always an id-dir") };
        map.insert(crate::types::DirKey::Str(name.to_string()), value);
    }

    /// Every string-valued binding directly in the root directory, as
    /// `(name, text)` pairs — the `penv` front end's view of "the simple
    /// persistent variables", since only those round-trip cleanly through
    /// the `key SP value NL` persistent env file format.
    pub fn root_string_bindings(&self) -> Vec<(String, String)> {
        let HeapData::Dir(d) = self.heap.get(self.root) else { return Vec::new() };
        let DirKind::Id(map) = &d.kind else { return Vec::new() };
        map.iter()
            .filter_map(|(k, v)| match (k, v) {
                (DirKey::Str(name), Value::Str(_)) => Some((name.clone(), v.print(&self.heap))),
                _ => None,
            })
            .collect()
    }

    /// Binds a plain string into the root directory, localized onto `co_id`
    /// so the allocation survives until the assignment commits it.
    pub fn bind_global_string(&mut self, co_id: CoroutineId, name: &str, text: &str) {
        let v = crate::dirops::alloc_str(&mut self.heap, &mut self.coroutines[co_id.index()], text.to_string());
        self.bind_global(name, v);
    }

    /// Builds a `vec`-dir of string values, localized onto `co_id`'s locals
    /// list so it survives until bound or otherwise rooted.
    pub fn make_string_vector(&mut self, co_id: CoroutineId, items: &[String]) -> Value {
        let heap = &mut self.heap;
        let co = &mut self.coroutines[co_id.index()];
        let mut values = Vec::with_capacity(items.len());
        for s in items {
            values.push(crate::dirops::alloc_str(heap, co, s.clone()));
        }
        let dir_id = heap.alloc(HeapData::Dir(DirData::new(DirKind::Vec(values))));
        co.localize(heap, dir_id);
        Value::Dir(dir_id)
    }
}
