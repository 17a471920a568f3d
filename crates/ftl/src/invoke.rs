//! Closure binding/invocation and native-function application.

use indexmap::IndexMap;

use crate::coroutine::Coroutine;
use crate::dirops::alloc_str;
use crate::exception::{throw, EvalResult};
use crate::heap::{Heap, HeapData};
use crate::types::{ClosureData, DirData, DirKey, DirKind, EnvData, FunctionData};
use crate::value::Value;

/// `bind`: consumes the next unbound formal argument name, producing a new
/// closure over an environment extended with a one-entry directory binding
/// `name -> arg`. The original closure is untouched, so the same
/// partially-applied closure can be reused for multiple calls.
fn bind(heap: &mut Heap, co: &mut Coroutine, closure_id: crate::heap::HeapId, arg: Value) -> EvalResult {
    let HeapData::Closure(c) = heap.get(closure_id) else { unreachable!() };
    let (code, env_id, autorun) = (c.code, c.env, c.autorun);
    let HeapData::Env(e) = heap.get(env_id) else { unreachable!() };
    let mut stack = e.stack.clone();
    let mut unbound = e.unbound.clone();

    let Some(name) = (!unbound.is_empty()).then(|| unbound.remove(0)) else {
        let msg = alloc_str(heap, co, "too many arguments applied to closure");
        return throw(co, msg);
    };

    let mut map = IndexMap::new();
    map.insert(DirKey::Str(name), arg);
    let frame_dir = heap.alloc(HeapData::Dir(DirData::new(DirKind::Id(map))));
    co.localize(heap, frame_dir);
    stack.push((frame_dir, false));

    let new_env_id = heap.alloc(HeapData::Env(EnvData { stack, unbound }));
    co.localize(heap, new_env_id);
    // frame_dir is now reachable through new_env_id's stack.
    co.commit(heap, frame_dir);

    let new_closure_id = heap.alloc(HeapData::Closure(ClosureData { code, env: new_env_id, autorun }));
    co.localize(heap, new_closure_id);
    // new_env_id is now reachable through new_closure_id's env field.
    co.commit(heap, new_env_id);
    Ok(Value::Closure(new_closure_id))
}

/// `invoke`: runs a fully-bound closure's code body with its captured
/// environment as the active one, restoring the caller's environment stack
/// afterward regardless of outcome.
pub(crate) fn invoke(heap: &mut Heap, co: &mut Coroutine, closure_id: crate::heap::HeapId) -> EvalResult {
    let HeapData::Closure(c) = heap.get(closure_id) else { unreachable!() };
    let (code_id, env_id) = (c.code, c.env);
    let HeapData::Env(e) = heap.get(env_id) else { unreachable!() };
    let captured = e.stack.clone();

    let saved = std::mem::replace(&mut co.env, captured);
    let result = crate::parser::eval_code(heap, co, code_id);
    co.env = saved;
    result
}

fn is_fully_bound(heap: &Heap, closure_id: crate::heap::HeapId) -> bool {
    let HeapData::Closure(c) = heap.get(closure_id) else { unreachable!() };
    let HeapData::Env(e) = heap.get(c.env) else { unreachable!() };
    e.unbound.is_empty()
}

fn closure_autorun(heap: &Heap, closure_id: crate::heap::HeapId) -> bool {
    let HeapData::Closure(c) = heap.get(closure_id) else { unreachable!() };
    c.autorun
}

/// Calls a native function, splicing any already-bound implicit arguments
/// ahead of the supplied ones. Partial application (fewer args than arity)
/// yields a new `Function` value capturing what was supplied so far,
/// mirroring closure currying for native code.
fn call_function(heap: &mut Heap, co: &mut Coroutine, id: crate::heap::HeapId, args: &[Value]) -> EvalResult {
    let HeapData::Function(f) = heap.get(id) else { unreachable!() };
    let mut all_args = f.implicit_args.clone();
    all_args.extend_from_slice(args);
    let (name, help, arity, func) = (f.name.clone(), f.help, f.arity, f.func);

    if all_args.len() < arity {
        let new_id = heap.alloc(HeapData::Function(FunctionData {
            name,
            help,
            arity,
            implicit_args: all_args,
            func,
        }));
        co.localize(heap, new_id);
        return Ok(Value::Function(new_id));
    }
    if all_args.len() > arity {
        let msg = alloc_str(heap, co, format!("too many arguments to {name}"));
        return throw(co, msg);
    }
    func(heap, co, &all_args)
}

/// `!`: forces invocation of a fully-bound closure with zero arguments; a
/// no-op on anything else (identity), so writing `!` after an
/// already-evaluated native function call is harmless.
pub(crate) fn force(heap: &mut Heap, co: &mut Coroutine, value: Value) -> EvalResult {
    match value {
        Value::Closure(id) if is_fully_bound(heap, id) => invoke(heap, co, id),
        other => Ok(other),
    }
}

/// The uniform "call this value with these arguments" application, used by
/// the `[args]` grammar, the `!` force operator (zero args), and dyn-dir
/// delegation.
pub(crate) fn apply(heap: &mut Heap, co: &mut Coroutine, callee: Value, args: Vec<Value>) -> EvalResult {
    match callee {
        Value::Function(id) => call_function(heap, co, id, &args),
        Value::Closure(mut id) => {
            if args.is_empty() {
                return if is_fully_bound(heap, id) { invoke(heap, co, id) } else { Ok(Value::Closure(id)) };
            }
            let mut result = Value::Closure(id);
            for arg in args {
                let Value::Closure(bound_id) = bind(heap, co, id, arg)? else { unreachable!("bind always returns a closure or throws") };
                id = bound_id;
                result = Value::Closure(id);
                if is_fully_bound(heap, id) && closure_autorun(heap, id) {
                    result = invoke(heap, co, id)?;
                    if let Value::Closure(next_id) = result {
                        id = next_id;
                    }
                }
            }
            Ok(result)
        }
        other if args.is_empty() => Ok(other),
        other => {
            let msg = alloc_str(heap, co, format!("value of type {} is not callable", other.type_name()));
            throw(co, msg)
        }
    }
}
