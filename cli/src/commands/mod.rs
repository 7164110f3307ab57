// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the keywarden CLI

pub mod config;
pub mod operations;
pub mod serve;

pub use self::config::ConfigCommand;
pub use self::operations::OperationsCommand;
pub use self::serve::ServeCommand;
