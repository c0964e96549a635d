// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod repositories;
pub mod db;
pub mod event_bus;
pub mod audit;
pub mod llm;
pub mod rbac;
pub mod self_model;
pub mod evidence;
pub mod telemetry;

pub use audit::{AuditOutcome, ToolCallAuditLogger};
pub use event_bus::{CognitionEvent, EventBus};
