// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer
//!
//! Transport bindings that translate inbound requests into
//! [`crate::application::dispatcher::OperationDispatcher`] calls. No business
//! logic lives here.

pub mod api;
