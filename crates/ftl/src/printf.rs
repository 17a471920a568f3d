//! Extensible printf machinery: `%<letter>` dispatched through a registered
//! format table, rather than a fixed set of conversions. The JSON module
//! (`crate::modules::json`) is the worked example, registering `%j`/`%J`.

use indexmap::IndexMap;

use crate::heap::Heap;
use crate::value::Value;

/// One registered conversion: help text plus the closure that renders a
/// single value under this letter.
pub(crate) struct Formatter {
    pub help: &'static str,
    pub func: fn(&Heap, &Value) -> String,
}

/// Letter → formatter. Order of registration does not matter; lookup is by
/// exact letter, unlike `oneof`'s longest-prefix directory match.
#[derive(Default)]
pub(crate) struct FormatTable {
    entries: IndexMap<char, Formatter>,
}

impl FormatTable {
    pub(crate) fn new() -> Self {
        let mut table = Self { entries: IndexMap::new() };
        table.register('s', "string: print as text", |heap, v| v.print(heap));
        table.register('d', "int: print as decimal", |heap, v| v.print(heap));
        table.register('x', "int: print as lowercase hex", |_heap, v| match v.number() {
            Some(n) => format!("{n:x}"),
            None => "?".to_string(),
        });
        table
    }

    pub(crate) fn register(&mut self, letter: char, help: &'static str, func: fn(&Heap, &Value) -> String) {
        self.entries.insert(letter, Formatter { help, func });
    }

    pub(crate) fn help_lines(&self) -> Vec<String> {
        self.entries.iter().map(|(c, f)| format!("%{c}: {}", f.help)).collect()
    }

    /// Scans `fmt` for `%<letter>` conversions, consuming `args` left to
    /// right; `%%` is a literal percent. Unrecognized letters and exhausted
    /// args are rendered as the literal `%<letter>` text, preferring in-band
    /// nulls over hard failures for formatting mistakes.
    pub(crate) fn render(&self, heap: &Heap, fmt: &str, args: &[Value]) -> String {
        let mut out = String::new();
        let mut chars = fmt.chars().peekable();
        let mut next_arg = args.iter();
        while let Some(c) = chars.next() {
            if c != '%' {
                out.push(c);
                continue;
            }
            match chars.next() {
                Some('%') => out.push('%'),
                Some(letter) => match (self.entries.get(&letter), next_arg.next()) {
                    (Some(f), Some(v)) => out.push_str(&(f.func)(heap, v)),
                    _ => {
                        out.push('%');
                        out.push(letter);
                    }
                },
                None => out.push('%'),
            }
        }
        out
    }
}
