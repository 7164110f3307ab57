// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Keywarden Core
//!
//! Resource-scoped credential broker for agent pipelines.
//!
//! A verified caller identity is exchanged, lazily and at most once per scope,
//! for downstream access tokens held in a per-request
//! [`domain::access_context::AccessContext`]. Operations declare the scopes
//! they need through a [`application::grant_binding::GrantBinding`], are
//! exposed to agents as token-free
//! [`application::tool_adapter::ToolAdapter`]s and run in fixed order by the
//! [`application::orchestrator::Orchestrator`].
//!
//! # Architecture
//!
//! - `domain`: identity, grants, the access context and the provider/audit seams
//! - `application`: registry, grant binding, tool adapters, orchestration, dispatch
//! - `infrastructure`: credential providers, JWT verification, built-in operations
//! - `presentation`: the axum JSON binding

pub mod application;
pub mod domain;
pub mod infrastructure;
pub mod presentation;

pub use domain::*;
