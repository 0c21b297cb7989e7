//! Purpose: Library crate behind the `ccf` CLI: the compact columnar format engine.
//! Exports: `api` (stable surface), `core` (format internals).
//! Role: Converts row-oriented text tables to per-column compressed blocks and back.
//! Invariants: One file handle per write or read call; nothing is cached across calls.
//! Invariants: Core modules prefer explicit inputs/outputs over hidden state.
pub mod api;
pub mod core;
