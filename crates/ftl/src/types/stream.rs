//! Stream values: a value-level wrapper over a character source or sink.
//! The concrete backends (files, sockets, strings) are out of scope here;
//! only the trait contract lives here.

use crate::heap::HeapId;
use crate::charsource::{CharSink, CharSource};

/// Which side of a stream is populated.
pub(crate) enum StreamIo {
    In(Box<dyn CharSource>),
    Out(Box<dyn CharSink>),
    /// Already closed; further reads/writes are a no-op returning EOF/error
    /// per the host's discretion, matching `close`/`takesource` semantics.
    Closed,
}

pub(crate) struct StreamData {
    pub io: StreamIo,
    /// Set by `takesource`: the stream's `delete` must not close the
    /// underlying source because ownership was moved out.
    pub source_taken: bool,
}

impl StreamData {
    pub(crate) fn mark_children(&self, _out: &mut Vec<HeapId>) {
        // Streams reference host-side resources, not other heap values.
    }
}
