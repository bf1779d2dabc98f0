//! # Spindle Runtime
//!
//! Uniform invocation over heterogeneous action functions. An [`Action`]
//! wraps a user- or plugin-supplied function — natively blocking or
//! suspending — behind one contract: JSON value in, JSON value out, with an
//! [`ActionRunContext`] carrying the chunk callback, the read-only context
//! map, and the span sink. Callers never see which shape the wrapped
//! function has.

pub mod action;
pub mod context;

pub use action::{Action, Invocable, ResponseHandle};
pub use context::ActionRunContext;
