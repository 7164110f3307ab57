// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod audit;
pub mod credentials;
pub mod event_bus;
pub mod identity;
pub mod template_engine;
pub mod tools;

pub use event_bus::{DomainEvent, EventBus};
