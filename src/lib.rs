//! Conversation backend: JSON-file persisted chats answered by a hosted LLM.

// Strict policy on unsafe and undocumented public items
#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(non_camel_case_types)]
#![deny(non_snake_case)]
#![deny(non_upper_case_globals)]
#![deny(nonstandard_style)]
#![deny(unused_must_use)]
#![forbid(unsafe_op_in_unsafe_fn)]
#![warn(dead_code)]
#![warn(unused_imports)]
#![warn(unused_variables)]
// Clippy discipline
#![deny(clippy::all)]
#![deny(clippy::pedantic)]
#![deny(clippy::nursery)]
#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]
#![deny(clippy::print_stdout)]
#![deny(clippy::todo)]
#![deny(clippy::unimplemented)]
#![deny(clippy::unwrap_in_result)]
#![deny(clippy::module_inception)]
#![deny(clippy::redundant_clone)]
#![deny(clippy::shadow_unrelated)]
#![deny(clippy::too_many_arguments)]
#![deny(clippy::cognitive_complexity)]
#![deny(overflowing_literals)]
#![cfg_attr(
    test,
    allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)
)]

/// Configuration, errors, identifiers and shared helpers.
pub mod common;
/// Conversation records, their JSON-file store, and the chat service.
#[allow(clippy::missing_errors_doc)]
pub mod conversation;
/// Conversation folders.
#[allow(clippy::missing_errors_doc)]
pub mod folders;
/// LLM chat backends and the engine that drives them.
pub mod llm;
/// HTTP server and API routes.
#[allow(
    clippy::missing_errors_doc,
    clippy::missing_const_for_fn,
    clippy::unused_async
)]
pub mod server;
/// Entry helpers to start the chat agent.
pub mod start_chat_agent;
/// JSON file persistence primitives.
pub mod storage;
/// Conversation tags.
#[allow(clippy::missing_errors_doc)]
pub mod tags;
