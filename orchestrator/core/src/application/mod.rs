// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod agent;
pub mod dispatcher;
pub mod grant_binding;
pub mod orchestrator;
pub mod registry;
pub mod research;
pub mod tool_adapter;

pub use dispatcher::{DispatchError, DispatchOutcome, OperationDispatcher};
pub use grant_binding::{GrantBinding, GrantedOperation};
pub use orchestrator::{Orchestrator, Pipeline, PipelineStep, StepTool};
pub use registry::{OperationRegistration, OperationRegistry, RegisteredOperation};
pub use tool_adapter::{ToolAdapter, ToolBox};
