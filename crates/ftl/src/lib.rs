//! FTL ("Furtle"): an embeddable command/expression language and
//! interpreter library.
//!
//! The embedding surface is deliberately small: construct a [`Runtime`],
//! `spawn_coroutine` to get a parser state, push source onto it, and drive it
//! a line at a time with `Runtime::eval_line`. Everything else — the value
//! heap, directories, closures, the parser, the baseline vocabulary — is
//! reached only through that surface or through the two front-end binaries.

mod charsource;
mod commands;
mod coroutine;
mod dirops;
mod error;
mod exception;
mod heap;
mod invoke;
mod io;
mod linesource;
mod modules;
mod parser;
mod printf;
mod runtime;
mod types;
mod value;

pub use charsource::{CharSink, CharSource, FixedBufSink, ReadSource, StringSink, StringSource};
pub use coroutine::{Coroutine, CoroutineId};
pub use error::{FtlError, FtlResult, ResourceError};
pub use heap::HeapId;
pub use io::{CollectEchoSink, EchoSink, NullEchoSink, StdEchoSink};
pub use runtime::{Limits, Runtime};
pub use types::{IpAddr4, MacAddr};
pub use value::Value;
