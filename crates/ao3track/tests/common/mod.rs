//! Shared test utilities for ao3track integration tests.
//!
//! This module provides:
//! - `MessageBuilder` for assembling raw notification emails
//! - `FakeMailbox`, an in-memory `MailboxReader` with failure injection

pub mod builders;
pub mod harness;

pub use builders::*;
pub use harness::FakeMailbox;
