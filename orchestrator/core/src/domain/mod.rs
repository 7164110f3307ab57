// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Core types of the credential broker: caller identity, resource scopes,
//! access grants, the per-request access context and the operation contract.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Types and interfaces with no transport or I/O dependencies

pub mod access_context;
pub mod audit;
pub mod broker_config;
pub mod credential_provider;
pub mod events;
pub mod grant;
pub mod identity;
pub mod operation;
