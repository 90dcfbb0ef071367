//! Integration tests module
//!
//! This module provides end-to-end integration tests for the orchestrator,
//! including:
//! - Full cycles from low-queue signal to queue file
//! - Show transitions inside the look-ahead window
//! - Error handling and recovery scenarios

pub mod cycle_test;
pub mod error_scenarios;
pub mod fixtures;
pub mod transition_test;
