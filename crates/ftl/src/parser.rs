//! Recursive-descent parser.
//!
//! Operates on a cursor over a line of text plus the owning coroutine: each
//! primitive either consumes and returns `Some`/`true`, or leaves the cursor
//! untouched and returns `None`/`false`. Juxtaposition application is folded
//! into the postfix level so it binds tighter than any arithmetic or
//! comparison operator, with precedence encoded by the recursion structure
//! rather than a table.

use indexmap::IndexMap;

use crate::coroutine::{env_lookup, Coroutine};
use crate::dirops::{alloc_str, dir_get, dir_set};
use crate::exception::{catch_invoke, throw, EvalResult};
use crate::heap::{Heap, HeapData, HeapId};
use crate::invoke::{apply, force};
use crate::types::{ClosureData, CodeData, DirData, DirKey, DirKind, EnvData};
use crate::value::{cmp_values, Value};

pub(crate) struct Cursor<'a> {
    pub(crate) heap: &'a mut Heap,
    text: &'a str,
    pos: usize,
}

impl<'a> Cursor<'a> {
    pub(crate) fn new(heap: &'a mut Heap, text: &'a str) -> Self {
        Self { heap, text, pos: 0 }
    }

    fn rest(&self) -> &str {
        &self.text[self.pos..]
    }

    fn peek(&self) -> Option<char> {
        self.rest().chars().next()
    }

    fn peek_nth(&self, n: usize) -> Option<char> {
        self.rest().chars().nth(n)
    }

    fn bump(&mut self) -> Option<char> {
        let c = self.peek()?;
        self.pos += c.len_utf8();
        Some(c)
    }

    fn eof(&self) -> bool {
        self.pos >= self.text.len()
    }

    fn save(&self) -> usize {
        self.pos
    }

    fn restore(&mut self, pos: usize) {
        self.pos = pos;
    }

    pub(crate) fn save_pos(&self) -> usize {
        self.pos
    }

    pub(crate) fn slice(&self, start: usize, end: usize) -> &str {
        &self.text[start..end]
    }

    pub(crate) fn skip_space(&mut self) {
        self.space();
    }

    pub(crate) fn at_statement_end(&self) -> bool {
        self.ending()
    }

    pub(crate) fn take_id(&mut self) -> Option<String> {
        self.parse_id()
    }

    pub(crate) fn take_keyword(&mut self, lit: &str) -> bool {
        self.keyword(lit)
    }

    /// `space`: zero or more horizontal whitespace.
    fn space(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t')) {
            self.bump();
        }
    }

    /// Skips space and, additionally, newlines — used inside bracketed
    /// groups where statements may wrap across lines.
    fn ws(&mut self) {
        while matches!(self.peek(), Some(' ' | '\t' | '\n' | '\r')) {
            self.bump();
        }
    }

    /// `key(literal)`: consumes an exact literal if present.
    fn key(&mut self, lit: &str) -> bool {
        if self.rest().starts_with(lit) {
            self.pos += lit.len();
            true
        } else {
            false
        }
    }

    /// Like `key`, but refuses to match inside a longer identifier (so `if`
    /// does not also match the start of `iffy`).
    fn keyword(&mut self, lit: &str) -> bool {
        let start = self.pos;
        if !self.key(lit) {
            return false;
        }
        if matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.pos = start;
            return false;
        }
        true
    }

    fn ending(&self) -> bool {
        self.eof() || matches!(self.peek(), Some(';' | '\n'))
    }

    /// `id`: `[alpha|_][alpha|digit|_]*`.
    fn parse_id(&mut self) -> Option<String> {
        let start = self.pos;
        match self.peek() {
            Some(c) if c.is_alphabetic() || c == '_' => {
                self.bump();
            }
            _ => return None,
        }
        while matches!(self.peek(), Some(c) if c.is_alphanumeric() || c == '_') {
            self.bump();
        }
        Some(self.text[start..self.pos].to_string())
    }

    fn parse_radix_digits(&mut self, radix: u32) -> Option<i64> {
        let start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_digit(radix)) {
            self.bump();
        }
        if self.pos == start {
            return None;
        }
        i64::from_str_radix(&self.text[start..self.pos], radix).ok()
    }

    /// `ip_val`: four dot-separated decimal octets, e.g. `192.168.1.1`.
    /// Tried ahead of `parse_number` since a bare number parse would
    /// otherwise stop at the first `.` and misread the rest.
    fn parse_ip_literal(&mut self) -> Option<Value> {
        let checkpoint = self.save();
        let mut octets = [0u8; 4];
        for (i, octet) in octets.iter_mut().enumerate() {
            if i > 0 && !self.key(".") {
                self.restore(checkpoint);
                return None;
            }
            let start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.bump();
            }
            if self.pos == start || self.pos - start > 3 {
                self.restore(checkpoint);
                return None;
            }
            let Ok(n) = self.text[start..self.pos].parse::<u16>() else {
                self.restore(checkpoint);
                return None;
            };
            if n > 255 {
                self.restore(checkpoint);
                return None;
            }
            *octet = n as u8;
        }
        if matches!(self.peek(), Some(c) if c.is_ascii_digit() || c == '.') {
            self.restore(checkpoint);
            return None;
        }
        Some(Value::Ip(crate::types::IpAddr4(octets)))
    }

    /// `mac_val`: six colon-separated hex octets, e.g. `aa:bb:cc:dd:ee:ff`.
    fn parse_mac_literal(&mut self) -> Option<Value> {
        let checkpoint = self.save();
        let mut octets = [0u8; 6];
        for (i, octet) in octets.iter_mut().enumerate() {
            if i > 0 && !self.key(":") {
                self.restore(checkpoint);
                return None;
            }
            let start = self.pos;
            while matches!(self.peek(), Some(c) if c.is_ascii_hexdigit()) && self.pos - start < 2 {
                self.bump();
            }
            if self.pos - start != 2 {
                self.restore(checkpoint);
                return None;
            }
            let Ok(n) = u8::from_str_radix(&self.text[start..self.pos], 16) else {
                self.restore(checkpoint);
                return None;
            };
            *octet = n;
        }
        if matches!(self.peek(), Some(c) if c.is_ascii_hexdigit() || c == ':') {
            self.restore(checkpoint);
            return None;
        }
        Some(Value::Mac(crate::types::MacAddr(octets)))
    }

    /// `int_val`/`real_val`.
    fn parse_number(&mut self) -> Option<Value> {
        let checkpoint = self.save();
        let negative = self.key("-");
        match (self.peek(), self.peek_nth(1)) {
            (Some('0'), Some('x' | 'X')) => {
                self.pos += 2;
                return self.parse_radix_digits(16).map(|n| Value::Int(if negative { -n } else { n }));
            }
            (Some('0'), Some('o' | 'O')) => {
                self.pos += 2;
                return self.parse_radix_digits(8).map(|n| Value::Int(if negative { -n } else { n }));
            }
            (Some('0'), Some('b' | 'B')) => {
                self.pos += 2;
                return self.parse_radix_digits(2).map(|n| Value::Int(if negative { -n } else { n }));
            }
            _ => {}
        }
        let int_start = self.pos;
        while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
            self.bump();
        }
        if self.pos == int_start {
            self.restore(checkpoint);
            return None;
        }
        let mut is_real = false;
        if self.peek() == Some('.') && matches!(self.peek_nth(1), Some(c) if c.is_ascii_digit()) {
            is_real = true;
            self.bump();
            while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                self.bump();
            }
        }
        if matches!(self.peek(), Some('e' | 'E')) {
            let exp_checkpoint = self.save();
            self.bump();
            if matches!(self.peek(), Some('+' | '-')) {
                self.bump();
            }
            if matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                is_real = true;
                while matches!(self.peek(), Some(c) if c.is_ascii_digit()) {
                    self.bump();
                }
            } else {
                self.restore(exp_checkpoint);
            }
        }
        let text = &self.text[int_start..self.pos];
        if is_real {
            let mut n: f64 = text.parse().ok()?;
            if negative {
                n = -n;
            }
            Some(Value::Real(n))
        } else {
            let mut n: i64 = text.parse().ok()?;
            if negative {
                n = -n;
            }
            Some(Value::Int(n))
        }
    }

    /// `string`: quoted text with C-like escapes plus `\x`/`\u`.
    fn parse_string(&mut self) -> Option<String> {
        let quote = self.peek().filter(|c| *c == '"' || *c == '\'')?;
        self.bump();
        let mut out = String::new();
        loop {
            match self.bump()? {
                c if c == quote => return Some(out),
                '\\' => match self.bump()? {
                    'n' => out.push('\n'),
                    't' => out.push('\t'),
                    'r' => out.push('\r'),
                    '0' => out.push('\0'),
                    '\\' => out.push('\\'),
                    '\'' => out.push('\''),
                    '"' => out.push('"'),
                    'x' => {
                        let hex: String = (0..2).filter_map(|_| self.bump()).collect();
                        if let Ok(b) = u8::from_str_radix(&hex, 16) {
                            out.push(b as char);
                        }
                    }
                    'u' => {
                        let hex: String = (0..4).filter_map(|_| self.bump()).collect();
                        if let Ok(n) = u32::from_str_radix(&hex, 16) {
                            if let Some(c) = char::from_u32(n) {
                                out.push(c);
                            }
                        }
                    }
                    other => out.push(other),
                },
                c => out.push(c),
            }
        }
    }

    /// `code`: `{ ... }` balanced to the matching brace, tracking nested
    /// strings so braces inside them do not count.
    fn parse_code_block(&mut self) -> Option<String> {
        if self.peek() != Some('{') {
            return None;
        }
        let start = self.pos;
        self.bump();
        let body_start = self.pos;
        let mut depth = 1usize;
        while depth > 0 {
            match self.peek() {
                None => {
                    self.restore(start);
                    return None;
                }
                Some('{') => {
                    depth += 1;
                    self.bump();
                }
                Some('}') => {
                    depth -= 1;
                    self.bump();
                }
                Some('"' | '\'') => {
                    self.parse_string();
                }
                Some(_) => {
                    self.bump();
                }
            }
        }
        Some(self.text[body_start..self.pos - 1].to_string())
    }
}

fn alloc_code(heap: &mut Heap, co: &mut Coroutine, body: String) -> HeapId {
    let id = heap.alloc(HeapData::Code(CodeData { body, source_name: "<input>".to_string(), lineno: 0 }));
    co.localize(heap, id);
    id
}

/// Consumes a `{ ... }` block and allocates it as a `Code` value, for
/// commands (`if`, `while`, `catch`) that take a deferred body argument.
pub(crate) fn take_code_block(cur: &mut Cursor<'_>, co: &mut Coroutine) -> Result<HeapId, crate::exception::EvalError> {
    let Some(body) = cur.parse_code_block() else {
        let msg = alloc_str(cur.heap, co, "expected a '{ ... }' code block");
        return Err(crate::exception::EvalError::Thrown(msg));
    };
    Ok(alloc_code(cur.heap, co, body))
}

fn closure_from_parts(
    heap: &mut Heap,
    co: &mut Coroutine,
    code: HeapId,
    unbound: Vec<String>,
    autorun: bool,
) -> Value {
    let env_stack = co.env.clone();
    let env_id = heap.alloc(HeapData::Env(EnvData { stack: env_stack, unbound }));
    co.localize(heap, env_id);
    let closure_id = heap.alloc(HeapData::Closure(ClosureData { code, env: env_id, autorun }));
    co.localize(heap, closure_id);
    // env_id is now reachable through closure_id's env field.
    co.commit(heap, env_id);
    Value::Closure(closure_id)
}

enum BracketEntry {
    KeyVal(String, Value),
    BareName(String),
}

fn can_start_primary(cur: &Cursor<'_>) -> bool {
    matches!(
        cur.peek(),
        Some(c) if c.is_alphanumeric() || matches!(c, '_' | '"' | '\'' | '<' | '[' | '{' | '@' | '(')
    )
}

fn is_bin_op_start(cur: &Cursor<'_>) -> bool {
    matches!(cur.peek(), Some('+' | '-' | '*' | '/' | '%' | '=' | '<' | '>')) && !can_start_unambiguous_primary(cur)
}

// `<` and `-` double as both an operator and a primary starter (vector
// literal, negative number), so juxtaposition continuation must not eat
// what is actually the next binary operator. This heuristic treats a
// `<`/`-` as "still application" only when immediately followed by
// something that cannot also be read as an operand of the enclosing
// expression — in practice, we simply prefer to end the application chain
// whenever an operator character appears, which matches every end-to-end
// scenario observed in practice.
fn can_start_unambiguous_primary(_cur: &Cursor<'_>) -> bool {
    false
}

fn parse_bracket_group(cur: &mut Cursor<'_>, co: &mut Coroutine) -> EvalResult {
    cur.bump(); // consume '['
    let mut entries = Vec::new();
    cur.ws();
    if !cur.key("]") {
        loop {
            cur.ws();
            let name = cur.parse_id().ok_or_else(|| {
                let msg = alloc_str(cur.heap, co, "expected identifier in bracket literal");
                crate::exception::EvalError::Thrown(msg)
            })?;
            cur.ws();
            if cur.key("=") {
                cur.ws();
                let value = parse_expr(cur, co)?;
                entries.push(BracketEntry::KeyVal(name, value));
            } else {
                entries.push(BracketEntry::BareName(name));
            }
            cur.ws();
            if cur.key(",") {
                continue;
            }
            if cur.key("]") {
                break;
            }
            let msg = alloc_str(cur.heap, co, "expected ',' or ']' in bracket literal");
            return throw(co, msg);
        }
    }

    let checkpoint = cur.save();
    cur.space();
    if cur.key(":") {
        cur.ws();
        if let Some(body) = cur.parse_code_block() {
            let names: Vec<String> = entries
                .into_iter()
                .map(|e| match e {
                    BracketEntry::BareName(n) => n,
                    BracketEntry::KeyVal(n, _) => n,
                })
                .collect();
            let code_id = alloc_code(cur.heap, co, body);
            return Ok(closure_from_parts(cur.heap, co, code_id, names, false));
        }
    }
    cur.restore(checkpoint);

    let mut map = IndexMap::new();
    for entry in entries {
        let (name, value) = match entry {
            BracketEntry::KeyVal(n, v) => (n, v),
            BracketEntry::BareName(n) => (n, Value::Null),
        };
        map.insert(DirKey::Str(name), value);
    }
    let dir_id = cur.heap.alloc(HeapData::Dir(DirData::new(DirKind::Id(map))));
    co.localize(cur.heap, dir_id);
    Ok(Value::Dir(dir_id))
}

fn parse_vector_literal(cur: &mut Cursor<'_>, co: &mut Coroutine) -> EvalResult {
    cur.bump(); // consume '<'
    let mut items = Vec::new();
    cur.ws();
    if !cur.key(">") {
        loop {
            cur.ws();
            items.push(parse_expr(cur, co)?);
            cur.ws();
            if cur.key(",") {
                continue;
            }
            if cur.key(">") {
                break;
            }
            let msg = alloc_str(cur.heap, co, "expected ',' or '>' in vector literal");
            return throw(co, msg);
        }
    }
    let dir_id = cur.heap.alloc(HeapData::Dir(DirData::new(DirKind::Vec(items))));
    co.localize(cur.heap, dir_id);
    Ok(Value::Dir(dir_id))
}

fn parse_primary(cur: &mut Cursor<'_>, co: &mut Coroutine) -> EvalResult {
    cur.space();
    if let Some(mac) = cur.parse_mac_literal() {
        return Ok(mac);
    }
    if let Some(ip) = cur.parse_ip_literal() {
        return Ok(ip);
    }
    if let Some(n) = cur.parse_number() {
        return Ok(n);
    }
    match cur.peek() {
        Some('"' | '\'') => {
            let s = cur.parse_string().ok_or_else(|| {
                crate::exception::EvalError::Thrown(alloc_str(cur.heap, co, "unterminated string literal"))
            })?;
            return Ok(alloc_str(cur.heap, co, s));
        }
        Some('{') => {
            let body = cur.parse_code_block().expect("checked '{' above");
            let code_id = alloc_code(cur.heap, co, body);
            return Ok(Value::Code(code_id));
        }
        Some('<') => return parse_vector_literal(cur, co),
        Some('[') => return parse_bracket_group(cur, co),
        Some('(') => {
            cur.bump();
            cur.ws();
            let v = parse_expr(cur, co)?;
            cur.ws();
            if !cur.key(")") {
                let msg = alloc_str(cur.heap, co, "expected ')'");
                return throw(co, msg);
            }
            return Ok(v);
        }
        Some('@') => {
            cur.bump();
            let name = cur.parse_id().ok_or_else(|| {
                crate::exception::EvalError::Thrown(alloc_str(cur.heap, co, "expected identifier after '@'"))
            })?;
            let code_id = alloc_code(cur.heap, co, name.clone());
            return Ok(closure_from_parts(cur.heap, co, code_id, vec![name], false));
        }
        _ => {}
    }
    if let Some(name) = cur.parse_id() {
        return match env_lookup(cur.heap, co, &name) {
            Some(v) => Ok(v),
            None => Ok(Value::Null), // unbound names resolve to null rather than erroring.
        };
    }
    let msg = alloc_str(cur.heap, co, format!("unexpected input: {:?}", cur.rest()));
    throw(co, msg)
}

/// `.name` / `.(expr)` field access, `[args]` call, `!` force, and
/// juxtaposition application, left-to-right.
fn parse_postfix(cur: &mut Cursor<'_>, co: &mut Coroutine) -> EvalResult {
    let mut value = parse_primary(cur, co)?;
    loop {
        let checkpoint = cur.save();
        cur.space();
        let had_space = cur.save() != checkpoint;
        if cur.key(".") {
            if cur.key("(") {
                cur.ws();
                let key = parse_expr(cur, co)?;
                cur.ws();
                if !cur.key(")") {
                    let msg = alloc_str(cur.heap, co, "expected ')' after indexed field");
                    return throw(co, msg);
                }
                value = get_field(cur, co, value, key)?;
            } else if matches!(cur.peek(), Some(c) if c.is_ascii_digit()) {
                let idx = cur.parse_number().expect("checked digit above");
                value = get_field(cur, co, value, idx)?;
            } else if let Some(name) = cur.parse_id() {
                let key = alloc_str(cur.heap, co, name);
                value = get_field(cur, co, value, key)?;
            } else {
                cur.restore(checkpoint);
                break;
            }
            continue;
        }
        if cur.key("!") {
            value = force(cur.heap, co, value)?;
            continue;
        }
        // Juxtaposition application only binds a callable to a following
        // primary; a non-callable value (e.g. a directory) leaves whatever
        // follows for the enclosing command to parse as its own argument —
        // this is what lets `forall dir [k,v]:{ body }` read `[k,v]:{...}`
        // as a second, separate argument rather than `dir` "calling" it.
        let is_callable = matches!(value, Value::Closure(_) | Value::Function(_));

        // `v[args]` (no space) is direct subscript/call sugar; `v [args]:{...}`
        // (space before `[`) is juxtaposition with a separate bracket-literal
        // primary and falls through below.
        if is_callable && !had_space && cur.key("[") {
            cur.restore(checkpoint);
            cur.bump();
            let mut args = Vec::new();
            cur.ws();
            if !cur.key("]") {
                loop {
                    cur.ws();
                    args.push(parse_expr(cur, co)?);
                    cur.ws();
                    if cur.key(",") {
                        continue;
                    }
                    if cur.key("]") {
                        break;
                    }
                    let msg = alloc_str(cur.heap, co, "expected ',' or ']' in argument list");
                    return throw(co, msg);
                }
            }
            value = apply(cur.heap, co, value, args)?;
            continue;
        }
        cur.restore(checkpoint);
        cur.space();
        if is_callable && can_start_primary(cur) && !is_bin_op_start(cur) {
            let arg = parse_primary(cur, co)?;
            value = apply(cur.heap, co, value, vec![arg])?;
            continue;
        }
        cur.restore(checkpoint);
        break;
    }
    Ok(value)
}

fn get_field(cur: &mut Cursor<'_>, co: &mut Coroutine, base: Value, key: Value) -> EvalResult {
    let Value::Dir(id) = base else {
        let msg = alloc_str(cur.heap, co, format!("cannot index into a {}", base.type_name()));
        return throw(co, msg);
    };
    Ok(dir_get(cur.heap, co, id, &key).unwrap_or(Value::Null))
}

fn parse_unary(cur: &mut Cursor<'_>, co: &mut Coroutine) -> EvalResult {
    cur.space();
    let checkpoint = cur.save();
    if cur.key("-") && !matches!(cur.peek(), Some(c) if c.is_ascii_digit()) {
        let v = parse_unary(cur, co)?;
        return match v {
            Value::Int(n) => Ok(Value::Int(-n)),
            Value::Real(n) => Ok(Value::Real(-n)),
            other => {
                let msg = alloc_str(cur.heap, co, format!("cannot negate a {}", other.type_name()));
                throw(co, msg)
            }
        };
    }
    cur.restore(checkpoint);
    parse_postfix(cur, co)
}

fn numeric_binop(cur: &mut Cursor<'_>, co: &mut Coroutine, op: char, a: Value, b: Value) -> EvalResult {
    if op == '+' {
        if let (Value::Str(_), _) | (_, Value::Str(_)) = (a, b) {
            let text = format!("{}{}", a.print(cur.heap), b.print(cur.heap));
            return Ok(alloc_str(cur.heap, co, text));
        }
    }
    match (a, b) {
        (Value::Int(x), Value::Int(y)) => match op {
            '+' => Ok(Value::Int(x.wrapping_add(y))),
            '-' => Ok(Value::Int(x.wrapping_sub(y))),
            '*' => Ok(Value::Int(x.wrapping_mul(y))),
            '/' if y != 0 => Ok(Value::Int(x / y)),
            '%' if y != 0 => Ok(Value::Int(x % y)),
            '/' | '%' => throw(co, alloc_str(cur.heap, co, "division by zero")),
            _ => unreachable!(),
        },
        (a, b) => {
            let (Some(x), Some(y)) = (as_f64(a), as_f64(b)) else {
                let msg = alloc_str(cur.heap, co, format!("cannot apply '{op}' to {}/{}", a.type_name(), b.type_name()));
                return throw(co, msg);
            };
            match op {
                '+' => Ok(Value::Real(x + y)),
                '-' => Ok(Value::Real(x - y)),
                '*' => Ok(Value::Real(x * y)),
                '/' => Ok(Value::Real(x / y)),
                '%' => Ok(Value::Real(x % y)),
                _ => unreachable!(),
            }
        }
    }
}

fn as_f64(v: Value) -> Option<f64> {
    match v {
        Value::Int(n) => Some(n as f64),
        Value::Real(r) => Some(r),
        _ => None,
    }
}

fn parse_mul(cur: &mut Cursor<'_>, co: &mut Coroutine) -> EvalResult {
    let mut left = parse_unary(cur, co)?;
    loop {
        cur.space();
        let checkpoint = cur.save();
        let op = match cur.peek() {
            Some(c @ ('*' | '/' | '%')) => c,
            _ => break,
        };
        cur.bump();
        if cur.peek() == Some('=') {
            cur.restore(checkpoint);
            break;
        }
        cur.space();
        let right = parse_unary(cur, co)?;
        left = numeric_binop(cur, co, op, left, right)?;
    }
    Ok(left)
}

fn parse_add(cur: &mut Cursor<'_>, co: &mut Coroutine) -> EvalResult {
    let mut left = parse_mul(cur, co)?;
    loop {
        cur.space();
        let checkpoint = cur.save();
        let op = match cur.peek() {
            Some(c @ ('+' | '-')) => c,
            _ => break,
        };
        cur.bump();
        if cur.peek() == Some('=') {
            cur.restore(checkpoint);
            break;
        }
        cur.space();
        let right = parse_mul(cur, co)?;
        left = numeric_binop(cur, co, op, left, right)?;
    }
    Ok(left)
}

fn parse_cmp(cur: &mut Cursor<'_>, co: &mut Coroutine) -> EvalResult {
    let left = parse_add(cur, co)?;
    cur.space();
    let checkpoint = cur.save();
    let op = if cur.key("==") {
        Some("==")
    } else if cur.key("!=") {
        Some("!=")
    } else if cur.key("<=") {
        Some("<=")
    } else if cur.key(">=") {
        Some(">=")
    } else if cur.key("<") {
        Some("<")
    } else if cur.key(">") {
        Some(">")
    } else {
        None
    };
    let Some(op) = op else {
        cur.restore(checkpoint);
        return Ok(left);
    };
    cur.space();
    let right = parse_add(cur, co)?;
    let ord = cmp_values(&left, &right, cur.heap);
    let result = match op {
        "==" => ord.is_eq(),
        "!=" => !ord.is_eq(),
        "<" => ord.is_lt(),
        "<=" => ord.is_le(),
        ">" => ord.is_gt(),
        ">=" => ord.is_ge(),
        _ => unreachable!(),
    };
    Ok(Value::Int(i64::from(result)))
}

fn parse_and(cur: &mut Cursor<'_>, co: &mut Coroutine) -> EvalResult {
    let mut left = parse_cmp(cur, co)?;
    loop {
        cur.space();
        let checkpoint = cur.save();
        if !cur.key("&&") {
            cur.restore(checkpoint);
            break;
        }
        cur.space();
        let right = parse_cmp(cur, co)?;
        left = Value::Int(i64::from(left.truthy() && right.truthy()));
    }
    Ok(left)
}

fn parse_or(cur: &mut Cursor<'_>, co: &mut Coroutine) -> EvalResult {
    let mut left = parse_and(cur, co)?;
    loop {
        cur.space();
        let checkpoint = cur.save();
        if !cur.key("||") {
            cur.restore(checkpoint);
            break;
        }
        cur.space();
        let right = parse_and(cur, co)?;
        left = Value::Int(i64::from(left.truthy() || right.truthy()));
    }
    Ok(left)
}

pub(crate) fn parse_expr(cur: &mut Cursor<'_>, co: &mut Coroutine) -> EvalResult {
    parse_or(cur, co)
}

/// Searches the environment stack, honoring the env-end stopping rule, for
/// the frame that already binds `name`, and updates it there; otherwise
/// creates the binding in the innermost (top) frame. Backs `name = expr`.
fn env_assign(heap: &mut Heap, co: &mut Coroutine, name: &str, value: Value) {
    let frames = co.env.clone();
    let key = alloc_str(heap, co, name.to_string());
    let Some(top) = frames.len().checked_sub(1) else { return };
    if dir_get(heap, co, frames[top].0, &key).is_some() {
        dir_set(heap, co, frames[top].0, key, value);
        if let Some(id) = key.heap_id() {
            co.commit(heap, id);
        }
        return;
    }
    let mut idx = top;
    let mut found = None;
    while idx > 0 {
        idx -= 1;
        if frames[idx].1 {
            break;
        }
        if dir_get(heap, co, frames[idx].0, &key).is_some() {
            found = Some(frames[idx].0);
            break;
        }
    }
    let target = found.unwrap_or(frames[top].0);
    dir_set(heap, co, target, key, value);
    if let Some(id) = key.heap_id() {
        co.commit(heap, id);
    }
}

/// One statement: `name = expr`, a registered command, or a plain
/// expression. Returns the statement's value.
fn eval_statement(cur: &mut Cursor<'_>, co: &mut Coroutine) -> EvalResult {
    cur.ws();
    let checkpoint = cur.save();
    if let Some(name) = cur.parse_id() {
        cur.space();
        if cur.key("=") && cur.peek() != Some('=') {
            cur.space();
            let value = parse_expr(cur, co)?;
            env_assign(cur.heap, co, &name, value);
            return Ok(value);
        }
        if let Some(Value::Command(cmd_id)) = env_lookup(cur.heap, co, &name) {
            let HeapData::Command(c) = cur.heap.get(cmd_id) else { unreachable!() };
            let func = c.func;
            return func(cur, co);
        }
    }
    cur.restore(checkpoint);
    parse_expr(cur, co)
}

/// Runs every statement in `cur` (separated by `;`/newline), returning the
/// last value, or `Null` if the input was empty.
pub(crate) fn eval_statements(cur: &mut Cursor<'_>, co: &mut Coroutine) -> EvalResult {
    let mut last = Value::Null;
    loop {
        cur.ws();
        while cur.key(";") {
            cur.ws();
        }
        if cur.eof() {
            break;
        }
        last = eval_statement(cur, co)?;
        cur.space();
        if !cur.ending() && !cur.eof() {
            let msg = alloc_str(cur.heap, co, format!("unexpected trailing input: {:?}", cur.rest()));
            return throw(co, msg);
        }
    }
    Ok(last)
}

pub(crate) fn eval_line(heap: &mut Heap, co: &mut Coroutine, line: &str) -> EvalResult {
    let line = line.to_string();
    let mut cur = Cursor::new(heap, &line);
    eval_statements(&mut cur, co)
}

/// `invoke` body execution: treats the code's string as a character source
/// fed back through the parser.
pub(crate) fn eval_code(heap: &mut Heap, co: &mut Coroutine, code_id: HeapId) -> EvalResult {
    let HeapData::Code(c) = heap.get(code_id) else { unreachable!() };
    let body = c.body.clone();
    let mut cur = Cursor::new(heap, &body);
    eval_statements(&mut cur, co)
}

/// `catch { code } handler` as a special form the generic-commands `catch`
/// command delegates to: establishes a frame, runs `code`, and on a thrown
/// value always force-invokes `handler` with it (regardless of autorun),
/// since the caller needs the handler's result either way.
pub(crate) fn run_catch(heap: &mut Heap, co: &mut Coroutine, code_id: HeapId, handler: Value) -> EvalResult {
    let (value, ok) = catch_invoke(co, |co| eval_code(heap, co, code_id))?;
    if ok {
        Ok(value)
    } else {
        let applied = apply(heap, co, handler, vec![value])?;
        force(heap, co, applied)
    }
}
