// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Cognition core
//!
//! Capability-scoped tool invocation, the planner / executor / critic loop,
//! per-org agent scheduling and belief revision.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain types, application services and their adapters

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod bootstrap;

pub use domain::*;
