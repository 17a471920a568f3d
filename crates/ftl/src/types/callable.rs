//! Commands and functions: the two shapes of native vocabulary the
//! host/generic-commands module adds to the interpreter.

use crate::coroutine::Coroutine;
use crate::exception::EvalResult;
use crate::heap::{Heap, HeapId};
use crate::parser::Cursor;
use crate::value::Value;

/// A parser-level primitive that consumes the rest of the current line
/// directly, rather than receiving pre-evaluated arguments. `Cursor` itself
/// carries the heap borrow, so the signature does not repeat it.
pub(crate) type CommandFn = fn(&mut Cursor<'_>, &mut Coroutine) -> EvalResult;

pub(crate) struct CommandData {
    pub name: String,
    pub help: &'static str,
    pub func: CommandFn,
}

impl CommandData {
    pub(crate) fn mark_children(&self, _out: &mut Vec<HeapId>) {}
}

/// A native function: arity-declared, called once the closure machinery has
/// collected all of its arguments.
pub(crate) type NativeFn = fn(&mut Heap, &mut Coroutine, &[Value]) -> EvalResult;

pub(crate) struct FunctionData {
    pub name: String,
    pub help: &'static str,
    pub arity: usize,
    /// Arguments already bound via partial application before this
    /// `Function` value was produced.
    pub implicit_args: Vec<Value>,
    pub func: NativeFn,
}

impl FunctionData {
    pub(crate) fn mark_children(&self, out: &mut Vec<HeapId>) {
        for v in &self.implicit_args {
            if let Some(id) = v.heap_id() {
                out.push(id);
            }
        }
    }
}
