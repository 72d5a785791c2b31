//! Mock implementations and test utilities for the workflow state engine.
//!
//! Provides:
//! - A mock [`QueueRepository`][workflow_core::repository::QueueRepository]
//!   implementation with error injection and call-history tracking
//! - Realistic test data generators
//! - Fluent builders and standard fixtures
//! - Contract test helpers runnable against any repository implementation
//! - Custom assertion helpers

pub mod assertions;
pub mod builders;
pub mod contracts;
pub mod fixtures;
pub mod generators;
pub mod repository;

pub use assertions::*;
pub use builders::*;
pub use contracts::*;
pub use fixtures::*;
pub use generators::*;
pub use repository::MockQueueRepository;
