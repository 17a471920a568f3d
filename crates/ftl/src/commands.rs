//! The baseline vocabulary, the generic commands module every coroutine
//! starts with: `set`/`def`, `if`/`while`/`forall`, `catch`, `collect`,
//! plus the introspection commands/functions `help`, `len`, `type`, `write`.

use indexmap::IndexMap;

use crate::coroutine::Coroutine;
use crate::dirops::{alloc_str, dir_add, dir_count, dir_forall, dir_lock};
use crate::exception::{throw, EvalResult};
use crate::heap::{Heap, HeapData};
use crate::invoke::{apply, force};
use crate::parser::{eval_code, parse_expr, run_catch, take_code_block, Cursor};
use crate::types::{CommandData, DirData, DirKey, DirKind, FunctionData};
use crate::value::Value;

/// Registers a command into a module directory.
pub(crate) fn smod_add(heap: &mut Heap, dir_id: crate::heap::HeapId, name: &str, help: &'static str, func: crate::types::CommandFn) {
    let cmd_id = heap.alloc_static(HeapData::Command(CommandData { name: name.to_string(), help, func }));
    dir_force_insert(heap, dir_id, name, Value::Command(cmd_id));
}

/// Registers a native function into a module directory.
pub(crate) fn smod_addfn(
    heap: &mut Heap,
    dir_id: crate::heap::HeapId,
    name: &str,
    help: &'static str,
    arity: usize,
    func: crate::types::NativeFn,
) {
    let fn_id = heap.alloc_static(HeapData::Function(FunctionData {
        name: name.to_string(),
        help,
        arity,
        implicit_args: Vec::new(),
        func,
    }));
    dir_force_insert(heap, dir_id, name, Value::Function(fn_id));
}

fn dir_force_insert(heap: &mut Heap, dir_id: crate::heap::HeapId, name: &str, value: Value) {
    let HeapData::Dir(d) = heap.get_mut(dir_id) else { unreachable!() };
    let DirKind::Id(map) = &mut d.kind else { unreachable!("op-defs is always an id-dir") };
    map.insert(DirKey::Str(name.to_string()), value);
}

/// Builds the op-defs directory: the root vocabulary every fresh coroutine
/// starts with at the bottom of its environment stack.
pub(crate) fn build_op_defs(heap: &mut Heap) -> crate::heap::HeapId {
    let dir_id = heap.alloc_static(HeapData::Dir(DirData::new(DirKind::Id(IndexMap::new()))));

    smod_add(heap, dir_id, "set", "set name val -- bind name in the innermost scope", cmd_set);
    smod_add(heap, dir_id, "def", "def name val -- alias for set", cmd_set);
    smod_add(heap, dir_id, "if", "if cond { then } [else { ... }]", cmd_if);
    smod_add(heap, dir_id, "while", "while cond { body }", cmd_while);
    smod_add(heap, dir_id, "forall", "forall dir [k,v]:{ body }", cmd_forall);
    smod_add(heap, dir_id, "catch", "catch { body } handler -- run body, invoking handler on throw", cmd_catch);
    smod_add(heap, dir_id, "throw", "throw expr -- raise expr as a catchable exception", cmd_throw);
    smod_add(heap, dir_id, "collect", "collect -- force a GC cycle, printing values freed", cmd_collect);
    smod_add(heap, dir_id, "lock", "lock dir -- marks dir locked against new keys", cmd_lock);
    smod_add(heap, dir_id, "unlock", "unlock dir -- clears a directory's lock token", cmd_unlock);
    smod_add(heap, dir_id, "help", "help [name] -- list or describe vocabulary", cmd_help);
    smod_add(heap, dir_id, "write", "write expr... -- print values separated by spaces", cmd_write);

    smod_addfn(heap, dir_id, "len", "len dir -- number of entries", 1, fn_len);
    smod_addfn(heap, dir_id, "type", "type v -- the type name of v", 1, fn_type);
    smod_addfn(heap, dir_id, "print", "print v -- render v as text", 1, fn_print);

    dir_id
}

fn cmd_set(cur: &mut Cursor<'_>, co: &mut Coroutine) -> EvalResult {
    let name = parse_cmd_name(cur, co)?;
    let value = parse_expr(cur, co)?;
    let Some(&(top, _)) = co.env.last() else {
        let msg = alloc_str(cur.heap, co, "set: empty environment stack");
        return throw(co, msg);
    };
    let key = alloc_str(cur.heap, co, name);
    dir_add(cur.heap, co, top, key, value);
    if let Some(id) = key.heap_id() {
        co.commit(cur.heap, id);
    }
    Ok(value)
}

fn parse_cmd_name(cur: &mut Cursor<'_>, co: &mut Coroutine) -> Result<String, crate::exception::EvalError> {
    cur.skip_space();
    cur.take_id().ok_or_else(|| crate::exception::EvalError::Thrown(alloc_str(cur.heap, co, "expected a name")))
}

fn cmd_if(cur: &mut Cursor<'_>, co: &mut Coroutine) -> EvalResult {
    let cond = parse_expr(cur, co)?;
    cur.skip_space();
    let then_body = take_code_block(cur, co)?;
    cur.skip_space();
    let else_body = if cur.take_keyword("else") {
        cur.skip_space();
        Some(take_code_block(cur, co)?)
    } else {
        None
    };
    if cond.truthy() {
        eval_code(cur.heap, co, then_body)
    } else if let Some(else_id) = else_body {
        eval_code(cur.heap, co, else_id)
    } else {
        Ok(Value::Null)
    }
}

fn cmd_while(cur: &mut Cursor<'_>, co: &mut Coroutine) -> EvalResult {
    cur.skip_space();
    let cond_start = cur.save_pos();
    let mut cond_val = parse_expr(cur, co)?;
    let cond_end = cur.save_pos();
    let cond_text = cur.slice(cond_start, cond_end).to_string();
    cur.skip_space();
    let body_id = take_code_block(cur, co)?;

    let mut last = Value::Null;
    while cond_val.truthy() {
        last = eval_code(cur.heap, co, body_id)?;
        let mut probe = Cursor::new(cur.heap, &cond_text);
        cond_val = parse_expr(&mut probe, co)?;
    }
    Ok(last)
}

fn cmd_forall(cur: &mut Cursor<'_>, co: &mut Coroutine) -> EvalResult {
    let target = parse_expr(cur, co)?;
    cur.skip_space();
    let handler = parse_expr(cur, co)?;
    let Value::Dir(dir_id) = target else {
        let msg = alloc_str(cur.heap, co, format!("forall: expected a directory, got {}", target.type_name()));
        return throw(co, msg);
    };
    let mut last = Value::Null;
    let mut pending_err = None;
    dir_forall(cur.heap, co, dir_id, &mut |heap, co, k, v| {
        if pending_err.is_some() {
            return;
        }
        // `[args]:{...}` closures are not autorun, so a fully-bound handler
        // still needs `force` to actually execute the body per element.
        match apply(heap, co, handler, vec![k, v]).and_then(|v| force(heap, co, v)) {
            Ok(v) => last = v,
            Err(e) => pending_err = Some(e),
        }
    });
    if let Some(e) = pending_err {
        return Err(e);
    }
    Ok(last)
}

fn cmd_catch(cur: &mut Cursor<'_>, co: &mut Coroutine) -> EvalResult {
    cur.skip_space();
    let code_id = take_code_block(cur, co)?;
    cur.skip_space();
    let handler = parse_expr(cur, co)?;
    run_catch(cur.heap, co, code_id, handler)
}

fn cmd_throw(cur: &mut Cursor<'_>, co: &mut Coroutine) -> EvalResult {
    let v = parse_expr(cur, co)?;
    throw(co, v)
}

fn cmd_collect(cur: &mut Cursor<'_>, co: &mut Coroutine) -> EvalResult {
    let roots = co.gc_roots(cur.heap);
    let freed = cur.heap.collect(roots);
    Ok(Value::Int(freed as i64))
}

fn cmd_lock(cur: &mut Cursor<'_>, co: &mut Coroutine) -> EvalResult {
    let v = parse_expr(cur, co)?;
    let Value::Dir(id) = v else {
        let msg = alloc_str(cur.heap, co, "lock: expected a directory");
        return throw(co, msg);
    };
    dir_lock(cur.heap, id, Some(Value::Int(1)));
    Ok(v)
}

fn cmd_unlock(cur: &mut Cursor<'_>, co: &mut Coroutine) -> EvalResult {
    let v = parse_expr(cur, co)?;
    let Value::Dir(id) = v else {
        let msg = alloc_str(cur.heap, co, "unlock: expected a directory");
        return throw(co, msg);
    };
    dir_lock(cur.heap, id, None);
    Ok(v)
}

fn cmd_help(cur: &mut Cursor<'_>, co: &mut Coroutine) -> EvalResult {
    cur.skip_space();
    if cur.at_statement_end() {
        let Some(&(top, _)) = co.env.first() else { return Ok(Value::Null) };
        let mut lines = Vec::new();
        dir_forall(cur.heap, co, top, &mut |heap, _co, k, v| {
            lines.push(format!("{}: {}", k.print(heap), describe(heap, v)));
        });
        lines.sort();
        return Ok(alloc_str(cur.heap, co, lines.join("\n")));
    }
    let name = parse_cmd_name(cur, co)?;
    let Some(&(top, _)) = co.env.first() else { return Ok(Value::Null) };
    let value = crate::dirops::lookup_name(cur.heap, co, top, &name).unwrap_or(Value::Null);
    Ok(alloc_str(cur.heap, co, describe(cur.heap, value)))
}

fn describe(heap: &Heap, v: Value) -> String {
    match v {
        Value::Command(id) => {
            let HeapData::Command(c) = heap.get(id) else { unreachable!() };
            c.help.to_string()
        }
        Value::Function(id) => {
            let HeapData::Function(f) = heap.get(id) else { unreachable!() };
            f.help.to_string()
        }
        other => other.type_name().to_string(),
    }
}

fn cmd_write(cur: &mut Cursor<'_>, co: &mut Coroutine) -> EvalResult {
    let mut parts = Vec::new();
    loop {
        cur.skip_space();
        if cur.at_statement_end() {
            break;
        }
        let v = parse_expr(cur, co)?;
        parts.push(v.print(cur.heap));
    }
    co.echo_sink_mut().write_line(&parts.join(" "));
    Ok(Value::Null)
}

fn fn_len(heap: &mut Heap, co: &mut Coroutine, args: &[Value]) -> EvalResult {
    let Value::Dir(id) = args[0] else {
        let msg = alloc_str(heap, co, format!("len: expected a directory, got {}", args[0].type_name()));
        return throw(co, msg);
    };
    Ok(Value::Int(dir_count(heap, co, id) as i64))
}

fn fn_type(heap: &mut Heap, co: &mut Coroutine, args: &[Value]) -> EvalResult {
    Ok(alloc_str(heap, co, args[0].type_name()))
}

fn fn_print(heap: &mut Heap, co: &mut Coroutine, args: &[Value]) -> EvalResult {
    let text = args[0].print(heap);
    Ok(alloc_str(heap, co, text))
}
