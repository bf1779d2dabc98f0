//! # Spindle Stream
//!
//! The streaming plumbing under every action invocation:
//!
//! - [`channel`] — an unbounded single-producer/single-consumer chunk queue
//!   with a distinguished close signal, turning "a function that calls a
//!   callback many times" into "a sequence a caller can iterate".
//! - [`run_to_completion`] / [`BlockingStream`] — the bridge that lets a
//!   synchronous caller drive asynchronous work, including from a thread
//!   that is itself inside a running tokio runtime.
//!
//! This crate is generic over the chunk type and carries no domain types.

pub mod bridge;
pub mod channel;

pub use bridge::{blocking_iter, run_to_completion, BlockingStream};
pub use channel::{channel, ChunkReceiver, ChunkSender, StreamError};
