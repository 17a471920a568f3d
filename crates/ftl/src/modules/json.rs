//! Minimal JSON encode/decode: an auxiliary command module, and the worked
//! example for the printf format-table mechanism (`%j` compact, `%J` pretty).

use indexmap::IndexMap;

use crate::coroutine::Coroutine;
use crate::dirops::alloc_str;
use crate::exception::{throw, EvalResult};
use crate::heap::{Heap, HeapData};
use crate::printf::FormatTable;
use crate::types::{DirData, DirKey, DirKind};
use crate::value::Value;

/// Builds the `json` module directory: `json.encode`, `json.decode`.
pub(crate) fn build_module(heap: &mut Heap) -> crate::heap::HeapId {
    let dir_id = heap.alloc_static(HeapData::Dir(DirData::new(DirKind::Id(IndexMap::new()))));
    crate::commands::smod_addfn(heap, dir_id, "encode", "encode v -- compact JSON text", 1, fn_encode);
    crate::commands::smod_addfn(heap, dir_id, "decode", "decode text -- parse JSON into a value", 1, fn_decode);
    dir_id
}

/// Registers `%j` (compact) and `%J` (pretty) into the process format table.
pub(crate) fn register_formatters(table: &mut FormatTable) {
    table.register('j', "value: compact JSON", |heap, v| encode_value(heap, v, false, 0));
    table.register('J', "value: pretty-printed JSON", |heap, v| encode_value(heap, v, true, 0));
}

fn fn_encode(heap: &mut Heap, co: &mut Coroutine, args: &[Value]) -> EvalResult {
    let text = encode_value(heap, &args[0], false, 0);
    Ok(alloc_str(heap, co, text))
}

fn fn_decode(heap: &mut Heap, co: &mut Coroutine, args: &[Value]) -> EvalResult {
    let Value::Str(id) = args[0] else {
        let msg = alloc_str(heap, co, format!("json.decode: expected a string, got {}", args[0].type_name()));
        return throw(co, msg);
    };
    let HeapData::Str(s) = heap.get(id) else { unreachable!() };
    let text = String::from_utf8_lossy(s.bytes(heap)).into_owned();
    let mut p = Parser { bytes: text.as_bytes(), pos: 0 };
    p.skip_ws();
    match p.value(heap, co) {
        Some(v) => Ok(v),
        None => {
            let msg = alloc_str(heap, co, format!("json.decode: invalid JSON near byte {}", p.pos));
            throw(co, msg)
        }
    }
}

/// Renders `v` as JSON. Directories encode as objects (`Id`) or arrays
/// (`Vec`); every other shape falls back to its `print` text quoted as a
/// JSON string, since the remaining directory kinds (series, sysenv,
/// struct/array, join, stack, dyn) have no canonical JSON shape.
fn encode_value(heap: &Heap, v: &Value, pretty: bool, depth: usize) -> String {
    match v {
        Value::Null => "null".to_string(),
        Value::Int(n) => n.to_string(),
        Value::Real(r) => r.to_string(),
        Value::Str(_) => encode_string(&v.print(heap)),
        Value::Dir(id) => {
            let HeapData::Dir(d) = heap.get(*id) else { unreachable!() };
            match &d.kind {
                DirKind::Id(map) => encode_object(heap, map, pretty, depth),
                DirKind::Vec(items) => encode_array(heap, items, pretty, depth),
                _ => encode_string(&v.print(heap)),
            }
        }
        other => encode_string(&other.print(heap)),
    }
}

fn encode_object(heap: &Heap, map: &IndexMap<DirKey, Value>, pretty: bool, depth: usize) -> String {
    if map.is_empty() {
        return "{}".to_string();
    }
    let (nl, pad, pad_close, sep) = indent_parts(pretty, depth);
    let parts: Vec<String> = map
        .iter()
        .map(|(k, v)| {
            let key = match k {
                DirKey::Str(s) => s.clone(),
                DirKey::Int(n) => n.to_string(),
                DirKey::Null => "null".to_string(),
                DirKey::Identity(_) => "?".to_string(),
            };
            format!("{pad}{}{sep}{}", encode_string(&key), encode_value(heap, v, pretty, depth + 1))
        })
        .collect();
    format!("{{{nl}{}{nl}{pad_close}}}", parts.join(&format!(",{nl}")))
}

fn encode_array(heap: &Heap, items: &[Value], pretty: bool, depth: usize) -> String {
    if items.is_empty() {
        return "[]".to_string();
    }
    let (nl, pad, pad_close, _) = indent_parts(pretty, depth);
    let parts: Vec<String> = items.iter().map(|v| format!("{pad}{}", encode_value(heap, v, pretty, depth + 1))).collect();
    format!("[{nl}{}{nl}{pad_close}]", parts.join(&format!(",{nl}")))
}

fn indent_parts(pretty: bool, depth: usize) -> (&'static str, String, String, &'static str) {
    if pretty {
        ("\n", "  ".repeat(depth + 1), "  ".repeat(depth), ": ")
    } else {
        ("", String::new(), String::new(), ":")
    }
}

fn encode_string(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\t' => out.push_str("\\t"),
            '\r' => out.push_str("\\r"),
            c if (c as u32) < 0x20 => out.push_str(&format!("\\u{:04x}", c as u32)),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// A small recursive-descent JSON reader, deliberately separate from
/// `crate::parser::Cursor` (FTL source grammar and JSON grammar do not
/// overlap enough to share primitives beyond string escaping).
struct Parser<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Parser<'a> {
    fn peek(&self) -> Option<u8> {
        self.bytes.get(self.pos).copied()
    }

    fn bump(&mut self) -> Option<u8> {
        let b = self.peek()?;
        self.pos += 1;
        Some(b)
    }

    fn skip_ws(&mut self) {
        while matches!(self.peek(), Some(b' ' | b'\t' | b'\n' | b'\r')) {
            self.pos += 1;
        }
    }

    fn literal(&mut self, lit: &str) -> bool {
        if self.bytes[self.pos..].starts_with(lit.as_bytes()) {
            self.pos += lit.len();
            true
        } else {
            false
        }
    }

    fn value(&mut self, heap: &mut Heap, co: &mut Coroutine) -> Option<Value> {
        self.skip_ws();
        match self.peek()? {
            b'n' if self.literal("null") => Some(Value::Null),
            b't' if self.literal("true") => Some(Value::Int(1)),
            b'f' if self.literal("false") => Some(Value::Int(0)),
            b'"' => self.string().map(|s| alloc_str(heap, co, s)),
            b'[' => self.array(heap, co),
            b'{' => self.object(heap, co),
            b'-' | b'0'..=b'9' => self.number(),
            _ => None,
        }
    }

    fn string(&mut self) -> Option<String> {
        if self.bump()? != b'"' {
            return None;
        }
        let mut out = String::new();
        loop {
            match self.bump()? {
                b'"' => return Some(out),
                b'\\' => match self.bump()? {
                    b'"' => out.push('"'),
                    b'\\' => out.push('\\'),
                    b'/' => out.push('/'),
                    b'n' => out.push('\n'),
                    b't' => out.push('\t'),
                    b'r' => out.push('\r'),
                    b'b' => out.push('\u{8}'),
                    b'f' => out.push('\u{c}'),
                    b'u' => {
                        let hex: Vec<u8> = (0..4).filter_map(|_| self.bump()).collect();
                        let code = u32::from_str_radix(std::str::from_utf8(&hex).ok()?, 16).ok()?;
                        out.push(char::from_u32(code)?);
                    }
                    _ => return None,
                },
                c => out.push(c as char),
            }
        }
    }

    fn number(&mut self) -> Option<Value> {
        let start = self.pos;
        if self.peek() == Some(b'-') {
            self.pos += 1;
        }
        while matches!(self.peek(), Some(b'0'..=b'9')) {
            self.pos += 1;
        }
        let mut is_real = false;
        if self.peek() == Some(b'.') {
            is_real = true;
            self.pos += 1;
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
        }
        if matches!(self.peek(), Some(b'e' | b'E')) {
            is_real = true;
            self.pos += 1;
            if matches!(self.peek(), Some(b'+' | b'-')) {
                self.pos += 1;
            }
            while matches!(self.peek(), Some(b'0'..=b'9')) {
                self.pos += 1;
            }
        }
        let text = std::str::from_utf8(&self.bytes[start..self.pos]).ok()?;
        if is_real {
            text.parse().ok().map(Value::Real)
        } else {
            text.parse().ok().map(Value::Int)
        }
    }

    fn array(&mut self, heap: &mut Heap, co: &mut Coroutine) -> Option<Value> {
        self.bump();
        let mut items = Vec::new();
        self.skip_ws();
        if self.peek() == Some(b']') {
            self.pos += 1;
        } else {
            loop {
                items.push(self.value(heap, co)?);
                self.skip_ws();
                match self.bump()? {
                    b',' => continue,
                    b']' => break,
                    _ => return None,
                }
            }
        }
        let dir_id = heap.alloc(HeapData::Dir(DirData::new(DirKind::Vec(items))));
        co.localize(heap, dir_id);
        Some(Value::Dir(dir_id))
    }

    fn object(&mut self, heap: &mut Heap, co: &mut Coroutine) -> Option<Value> {
        self.bump();
        let mut map = IndexMap::new();
        self.skip_ws();
        if self.peek() == Some(b'}') {
            self.pos += 1;
        } else {
            loop {
                self.skip_ws();
                let key = self.string()?;
                self.skip_ws();
                if self.bump()? != b':' {
                    return None;
                }
                let value = self.value(heap, co)?;
                map.insert(DirKey::Str(key), value);
                self.skip_ws();
                match self.bump()? {
                    b',' => continue,
                    b'}' => break,
                    _ => return None,
                }
            }
        }
        let dir_id = heap.alloc(HeapData::Dir(DirData::new(DirKind::Id(map))));
        co.localize(heap, dir_id);
        Some(Value::Dir(dir_id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coroutine::CoroutineId;

    fn fresh() -> (Heap, Coroutine) {
        let mut heap = Heap::new();
        let op_defs = crate::commands::build_op_defs(&mut heap);
        let root = heap.alloc_static(HeapData::Dir(DirData::new(DirKind::Id(IndexMap::new()))));
        let co = Coroutine::new(CoroutineId(0), op_defs, root, 256);
        (heap, co)
    }

    #[test]
    fn round_trips_an_object() {
        let (mut heap, mut co) = fresh();
        let text = alloc_str(&mut heap, &mut co, r#"{"a":1,"b":[2,3]}"#);
        let decoded = fn_decode(&mut heap, &mut co, &[text]).expect("valid json");
        let encoded = fn_encode(&mut heap, &mut co, &[decoded]).expect("encodes");
        assert_eq!(encoded.print(&heap), r#"{"a":1,"b":[2,3]}"#);
    }

    #[test]
    fn rejects_malformed_input() {
        let (mut heap, mut co) = fresh();
        let text = alloc_str(&mut heap, &mut co, "{not json}");
        assert!(fn_decode(&mut heap, &mut co, &[text]).is_err());
    }
}
