// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// LLM Infrastructure
//
// The provider gate bounds concurrent completions per provider; the gated
// JSON client sits on top of any `LLMProvider` and implements the
// never-fails `JsonCompletionClient` contract the agents rely on.

pub mod client;
pub mod gate;

pub use client::{extract_json, GatedJsonClient};
pub use gate::{GatePermit, ProviderGate};
