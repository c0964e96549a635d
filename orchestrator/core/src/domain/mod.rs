// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Entities, value objects and ports of the cognition subsystem.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Pure types and invariants; no I/O beyond the async port traits

pub mod tenant;
pub mod capability;
pub mod classification;
pub mod tool;
pub mod redaction;
pub mod policy;
pub mod self_model;
pub mod agents;
pub mod session;
pub mod process;
pub mod belief;
pub mod confidence;
pub mod conflict;
pub mod events;
pub mod config;
pub mod repository;
pub mod llm;
