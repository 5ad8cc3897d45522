//! Shared test utilities for docpipe integration tests.
//!
//! This module provides:
//! - `ScriptedRemote`, an in-process stand-in for the remote document service
//! - `TestHarness`, a `JobService` over a temp storage root

pub mod harness;
pub mod remote;

pub use harness::TestHarness;
pub use remote::{chat_reply, ocr_reply, ScriptedRemote};
