// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Keywarden CLI library - exposes the command handlers and the in-process
//! service composition for testing.

pub mod commands;
pub mod embedded;
