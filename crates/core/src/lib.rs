//! # Spindle Core
//!
//! Domain types and error definitions for the Spindle action runtime.
//! This crate has **zero framework dependencies** — it defines the value
//! objects that all other crates implement against.
//!
//! ## Design Philosophy
//!
//! Every other crate in the workspace depends inward on this one. Actions,
//! messages, model requests, and tool outcomes are plain serde-friendly
//! values here; the behavior (invocation, resolution, orchestration) lives
//! in the crates that consume them.

pub mod action;
pub mod deprecation;
pub mod error;
pub mod message;
pub mod model;
pub mod tool;

// Re-export key types at crate root for ergonomics
pub use action::{ActionKey, ActionKind, ActionMetadata};
pub use deprecation::{DeprecationNotice, DeprecationStatus, DeprecationTable};
pub use error::{ActionError, Error, GenerateError, RegistryError, Result};
pub use message::{Message, Part, Role, ToolRequest, ToolResponse};
pub use model::{
    FinishReason, ModelRequest, ModelResponse, OutputSpec, ToolChoice, ToolDefinition, Usage,
};
pub use tool::{Interrupt, ToolOutcome, ToolReply};
