//! Throw/catch.
//!
//! Rather than `setjmp`/`longjmp`, every evaluation returns
//! `Result<Value, EvalError>` and `EvalError::Thrown` is unwound by the
//! nearest `catch_invoke` frame — the usual propagation convention for a
//! host language without non-local jumps.

use crate::error::FtlError;
use crate::value::Value;

/// Either a scripted exception (catchable) or an internal/fatal error
/// (propagates through every catch frame unchanged).
#[derive(Debug)]
pub enum EvalError {
    Thrown(Value),
    Fatal(FtlError),
}

impl From<FtlError> for EvalError {
    fn from(e: FtlError) -> Self {
        Self::Fatal(e)
    }
}

pub type EvalResult = Result<Value, EvalError>;

/// A saved execution point `throw` unwinds to.
///
/// Frames nest lexically and must be popped LIFO; `catch_invoke` records the
/// environment-stack depth at entry so the stack can be restored to exactly
/// that depth on unwind, mirroring `env_return`'s contract.
pub struct CatchFrame {
    pub env_depth: usize,
}

/// Runs `body`, establishing a catch frame first. Returns `Ok((value, true))`
/// on normal completion or `Ok((thrown_value, false))` if `body` threw, or
/// propagates a `Fatal` error past the catch entirely.
pub fn catch_invoke<F>(co: &mut crate::coroutine::Coroutine, body: F) -> Result<(Value, bool), FtlError>
where
    F: FnOnce(&mut crate::coroutine::Coroutine) -> EvalResult,
{
    let env_depth = co.env_depth();
    co.push_catch_frame(CatchFrame { env_depth });
    let result = body(co);
    co.pop_catch_frame();
    match result {
        Ok(v) => Ok((v, true)),
        Err(EvalError::Thrown(v)) => {
            co.env_truncate(env_depth);
            Ok((v, false))
        }
        Err(EvalError::Fatal(e)) => Err(e),
    }
}

/// `throw`: if no enclosing catch frame exists, this is a top-level error
/// rather than a panic.
pub fn throw(co: &mut crate::coroutine::Coroutine, value: Value) -> EvalResult {
    if co.has_catch_frame() {
        Err(EvalError::Thrown(value))
    } else {
        co.note_error();
        Err(EvalError::Thrown(value))
    }
}
