//! The five-operation directory contract (`get`/`add`/`count`/`forall`/
//! lock), dispatched by `match` over [`DirKind`] rather than a trait object
//! (see the module doc on `types::directory`).

use crate::coroutine::Coroutine;
use crate::heap::{Heap, HeapData, HeapId};
use crate::invoke::apply;
use crate::types::{DirKey, DirKind};
use crate::value::Value;

fn key_str(key: &Value, heap: &Heap) -> Option<String> {
    match key {
        Value::Str(id) => {
            let HeapData::Str(s) = heap.get(*id) else { unreachable!() };
            Some(String::from_utf8_lossy(s.bytes(heap)).into_owned())
        }
        _ => None,
    }
}

/// Reads a key out of any directory shape, or `None` if absent.
pub(crate) fn dir_get(heap: &mut Heap, co: &mut Coroutine, dir_id: HeapId, key: &Value) -> Option<Value> {
    let HeapData::Dir(d) = heap.get(dir_id) else { unreachable!() };
    match &d.kind {
        DirKind::Id(map) => map.get(&DirKey::from_value(key, heap)).copied(),
        DirKind::Vec(items) => {
            let idx = key.number()?;
            usize::try_from(idx).ok().and_then(|i| items.get(i)).copied()
        }
        DirKind::Series { first, inc, last } => {
            let idx = key.number()?;
            let v = first + inc * idx;
            let in_range = if *inc >= 0 { v <= *last } else { v >= *last };
            in_range.then_some(Value::Int(v))
        }
        DirKind::SysEnv => {
            let name = key_str(key, heap)?;
            let val = std::env::var(&name).ok()?;
            Some(alloc_str(heap, co, val))
        }
        DirKind::Struct(fields) => {
            let name = key_str(key, heap)?;
            fields.iter().find(|f| f.name == name).map(|f| (f.get)())
        }
        DirKind::Array { get, len, .. } => {
            let idx = key.number()?;
            if idx < 0 || idx as usize >= *len {
                return None;
            }
            get(idx as usize)
        }
        DirKind::Join { index, values } => {
            let (index, values) = (*index, *values);
            let idx_val = dir_get(heap, co, index, key)?;
            dir_get(heap, co, values, &idx_val)
        }
        DirKind::Stack(dirs) => {
            // Honor the env-end stopping rule even when addressed directly
            // as a plain directory (not via coroutine lookup).
            if dirs.is_empty() {
                return None;
            }
            let top = dirs.len() - 1;
            if let Some(v) = dir_get(heap, co, dirs[top].0, key) {
                return Some(v);
            }
            let mut idx = top;
            while idx > 0 {
                idx -= 1;
                if dirs[idx].1 {
                    break;
                }
                if let Some(v) = dir_get(heap, co, dirs[idx].0, key) {
                    return Some(v);
                }
            }
            None
        }
        DirKind::Dyn { get, .. } => {
            let get = *get;
            match apply(heap, co, get, vec![*key]) {
                Ok(Value::Null) => None,
                Ok(v) => Some(v),
                Err(_) => None,
            }
        }
    }
}

/// Fast path for identifier lookup during evaluation: avoids allocating a
/// heap string for every name probed against an `Id`-dir.
pub(crate) fn lookup_name(heap: &mut Heap, co: &mut Coroutine, dir_id: HeapId, name: &str) -> Option<Value> {
    let HeapData::Dir(d) = heap.get(dir_id) else { unreachable!() };
    match &d.kind {
        DirKind::Id(map) => map.get(&DirKey::Str(name.to_string())).copied(),
        DirKind::SysEnv => std::env::var(name).ok().map(|v| alloc_str(heap, co, v)),
        DirKind::Struct(fields) => fields.iter().find(|f| f.name == name).map(|f| (f.get)()),
        DirKind::Join { index, values } => {
            let (index, values) = (*index, *values);
            let idx_val = lookup_name(heap, co, index, name)?;
            dir_get(heap, co, values, &idx_val)
        }
        DirKind::Stack(dirs) => {
            let dirs = dirs.clone();
            if dirs.is_empty() {
                return None;
            }
            let top = dirs.len() - 1;
            if let Some(v) = lookup_name(heap, co, dirs[top].0, name) {
                return Some(v);
            }
            let mut idx = top;
            while idx > 0 {
                idx -= 1;
                if dirs[idx].1 {
                    break;
                }
                if let Some(v) = lookup_name(heap, co, dirs[idx].0, name) {
                    return Some(v);
                }
            }
            None
        }
        DirKind::Dyn { get, .. } => {
            let get = *get;
            let key = alloc_str(heap, co, name.to_string());
            match apply(heap, co, get, vec![key]) {
                Ok(Value::Null) | Err(_) => None,
                Ok(v) => Some(v),
            }
        }
        // Vec/Series/Array are integer-keyed; not meaningful by name.
        DirKind::Vec(_) | DirKind::Series { .. } | DirKind::Array { .. } => None,
    }
}

/// Inserts a brand new key. Locked directories reject this for keys they
/// do not already contain.
pub(crate) fn dir_add(heap: &mut Heap, co: &mut Coroutine, dir_id: HeapId, key: Value, value: Value) -> bool {
    let dkey = DirKey::from_value(&key, heap);
    let HeapData::Dir(d) = heap.get_mut(dir_id) else { unreachable!() };
    if d.is_locked() {
        let already_present = matches!(&d.kind, DirKind::Id(map) if map.contains_key(&dkey));
        if !already_present {
            return false;
        }
    }
    let stored = match &mut d.kind {
        DirKind::Id(map) => {
            map.insert(dkey, value);
            true
        }
        DirKind::Vec(items) => {
            if let Some(idx) = key.number().and_then(|n| usize::try_from(n).ok()) {
                if idx >= items.len() {
                    items.resize(idx + 1, Value::Null);
                }
                items[idx] = value;
                true
            } else {
                false
            }
        }
        _ => return dir_set(heap, co, dir_id, key, value),
    };
    if stored {
        if let Some(id) = value.heap_id() {
            co.commit(heap, id);
        }
    }
    stored
}

/// Insert/update for an existing key: unlike `add`, locking never blocks
/// this.
pub(crate) fn dir_set(heap: &mut Heap, co: &mut Coroutine, dir_id: HeapId, key: Value, value: Value) -> bool {
    let dkey = DirKey::from_value(&key, heap);
    let HeapData::Dir(d) = heap.get_mut(dir_id) else { unreachable!() };
    let stored = match &mut d.kind {
        DirKind::Id(map) => {
            map.insert(dkey, value);
            true
        }
        DirKind::Vec(items) => {
            let Some(idx) = key.number().and_then(|n| usize::try_from(n).ok()) else { return false };
            if idx >= items.len() {
                items.resize(idx + 1, Value::Null);
            }
            items[idx] = value;
            true
        }
        DirKind::SysEnv => {
            let Some(name) = key_str(&key, heap) else { return false };
            let text = value.print(heap);
            std::env::set_var(name, text);
            return true;
        }
        DirKind::Struct(fields) => {
            let Some(name) = key_str(&key, heap) else { return false };
            return if let Some(field) = fields.iter_mut().find(|f| f.name == name) {
                match &mut field.set {
                    Some(setter) => {
                        setter(value);
                        true
                    }
                    // A missing setter is a silent no-op, not an error.
                    None => false,
                }
            } else {
                false
            };
        }
        DirKind::Array { set, len, .. } => {
            let Some(idx) = key.number() else { return false };
            if idx < 0 || idx as usize >= *len {
                return false;
            }
            return match set {
                Some(setter) => {
                    setter(idx as usize, value);
                    true
                }
                None => false,
            };
        }
        DirKind::Join { values, .. } => {
            let values = *values;
            return dir_set(heap, co, values, key, value);
        }
        DirKind::Stack(dirs) => {
            let Some(&(top, _)) = dirs.last() else { return false };
            return dir_set(heap, co, top, key, value);
        }
        DirKind::Dyn { set, .. } => {
            // With no `set` closure supplied, this is a silent no-op
            // (returns `false` without raising a diagnostic).
            let Some(set) = *set else { return false };
            return apply(heap, co, set, vec![key, value]).is_ok();
        }
        DirKind::Series { .. } => return false,
    };
    // Only Id/Vec actually retain `value` in heap-visible storage that
    // `mark_children` walks; once stored there it no longer needs to be
    // rooted by the locals list.
    if stored {
        if let Some(id) = value.heap_id() {
            co.commit(heap, id);
        }
    }
    stored
}

/// Number of entries in any directory shape.
pub(crate) fn dir_count(heap: &mut Heap, co: &mut Coroutine, dir_id: HeapId) -> usize {
    let HeapData::Dir(d) = heap.get(dir_id) else { unreachable!() };
    match &d.kind {
        DirKind::Id(map) => map.len(),
        DirKind::Vec(items) => items.len(),
        DirKind::Series { first, inc, last } => {
            if *inc == 0 {
                0
            } else {
                (((*last - *first) / *inc) + 1).max(0) as usize
            }
        }
        DirKind::SysEnv => std::env::vars().count(),
        DirKind::Struct(fields) => fields.len(),
        DirKind::Array { len, .. } => *len,
        DirKind::Join { values, .. } => {
            let values = *values;
            dir_count(heap, co, values)
        }
        DirKind::Stack(dirs) => dirs.last().map_or(0, |&(id, _)| dir_count(heap, co, id)),
        DirKind::Dyn { count, .. } => {
            let Some(count) = *count else { return 0 };
            match apply(heap, co, count, vec![]) {
                Ok(v) => v.number().unwrap_or(0).max(0) as usize,
                Err(_) => 0,
            }
        }
    }
}

/// Visits every `(key, value)` pair in any directory shape.
pub(crate) fn dir_forall(
    heap: &mut Heap,
    co: &mut Coroutine,
    dir_id: HeapId,
    visitor: &mut dyn FnMut(&mut Heap, &mut Coroutine, Value, Value),
) {
    let HeapData::Dir(d) = heap.get(dir_id) else { unreachable!() };
    match &d.kind {
        DirKind::Id(map) => {
            let entries: Vec<(DirKey, Value)> = map.iter().map(|(k, v)| (k.clone(), *v)).collect();
            for (k, v) in entries {
                let key_val = match k {
                    DirKey::Null => Value::Null,
                    DirKey::Int(n) => Value::Int(n),
                    DirKey::Str(s) => alloc_str(heap, co, s),
                    DirKey::Identity(id) => Value::Dir(id),
                };
                visitor(heap, co, key_val, v);
            }
        }
        DirKind::Vec(items) => {
            let items = items.clone();
            for (i, v) in items.into_iter().enumerate() {
                visitor(heap, co, Value::Int(i as i64), v);
            }
        }
        DirKind::Series { first, inc, last } => {
            let (first, inc, last) = (*first, *inc, *last);
            let mut i = 0i64;
            loop {
                let v = first + inc * i;
                let in_range = if inc >= 0 { v <= last } else { v >= last };
                if !in_range {
                    break;
                }
                visitor(heap, co, Value::Int(i), Value::Int(v));
                i += 1;
            }
        }
        DirKind::SysEnv => {
            let vars: Vec<(String, String)> = std::env::vars().collect();
            for (k, v) in vars {
                let kv = alloc_str(heap, co, k);
                let vv = alloc_str(heap, co, v);
                visitor(heap, co, kv, vv);
            }
        }
        DirKind::Struct(fields) => {
            let names: Vec<String> = fields.iter().map(|f| f.name.clone()).collect();
            for name in names {
                let HeapData::Dir(d) = heap.get(dir_id) else { unreachable!() };
                let DirKind::Struct(fields) = &d.kind else { unreachable!() };
                let value = fields.iter().find(|f| f.name == name).map(|f| (f.get)()).unwrap_or(Value::Null);
                let kv = alloc_str(heap, co, name);
                visitor(heap, co, kv, value);
            }
        }
        DirKind::Array { len, .. } => {
            let len = *len;
            for i in 0..len {
                if let Some(v) = dir_get(heap, co, dir_id, &Value::Int(i as i64)) {
                    visitor(heap, co, Value::Int(i as i64), v);
                }
            }
        }
        DirKind::Join { index, values } => {
            let (index, values) = (*index, *values);
            dir_forall(heap, co, index, &mut |heap, co, k, idx_val| {
                if let Some(v) = dir_get(heap, co, values, &idx_val) {
                    visitor(heap, co, k, v);
                }
            });
        }
        DirKind::Stack(dirs) => {
            if let Some(&(top, _)) = dirs.last() {
                dir_forall(heap, co, top, visitor);
            }
        }
        DirKind::Dyn { getall, .. } => {
            let Some(getall) = *getall else { return };
            if let Ok(result) = apply(heap, co, getall, vec![]) {
                let HeapData::Dir(d) = heap.get(dir_id) else { unreachable!() };
                let _ = d;
                if let Value::Dir(id) = result {
                    dir_forall(heap, co, id, visitor);
                }
            }
        }
    }
}

/// Locks/unlocks a directory, returning the previous token.
pub(crate) fn dir_lock(heap: &mut Heap, dir_id: HeapId, new_token: Option<Value>) -> Option<Value> {
    let HeapData::Dir(d) = heap.get_mut(dir_id) else { unreachable!() };
    std::mem::replace(&mut d.lock_token, new_token)
}

pub(crate) fn dir_islocked(heap: &Heap, dir_id: HeapId) -> bool {
    let HeapData::Dir(d) = heap.get(dir_id) else { unreachable!() };
    d.is_locked()
}

/// Allocates a fresh owned string and localizes it onto `co`'s locals list:
/// strings returned from `get` on certain directory kinds are freshly
/// allocated and so need rooting until the caller binds or otherwise roots
/// them.
pub(crate) fn alloc_str(heap: &mut Heap, co: &mut Coroutine, s: impl Into<String>) -> Value {
    let id = heap.alloc(HeapData::Str(crate::types::StrData::Owned(s.into().into_bytes())));
    co.localize(heap, id);
    Value::Str(id)
}
