//! Payload types behind each heap-allocated [`crate::value::Value`] variant.
//!
//! One small module per concrete shape, re-exported here for the rest of
//! the crate.

mod callable;
mod closure;
mod directory;
mod misc;
mod stream;
mod string;

pub(crate) use callable::{CommandData, CommandFn, FunctionData, NativeFn};
pub(crate) use closure::{ClosureData, EnvData};
pub(crate) use directory::{DirData, DirKey, DirKind, StructField};
pub(crate) use misc::CodeData;
pub(crate) use stream::StreamData;
pub(crate) use string::StrData;

pub use misc::{IpAddr4, MacAddr};
