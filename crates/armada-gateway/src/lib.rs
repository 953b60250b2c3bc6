// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Armada gateway: the central control plane.
//!
//! The gateway brokers kubectl commands between authenticated users and
//! remote cluster agents. Users speak REST; agents dial out over gRPC and
//! pull their work. The broker pairs each waiting REST caller with the
//! asynchronous agent execution under one request id.

pub mod api;
pub mod auth_middleware;
pub mod broker;
pub mod client_info;
pub mod error;
pub mod grpc;
pub mod pagination;
pub mod rbac;
pub mod registry;
pub mod routes;
pub mod server;

pub use api::{create_router, AppState};
pub use broker::{BrokerError, CommandBroker, CommandResult, CommandSpec, CommandStatus};
pub use error::GatewayError;
pub use grpc::AgentRpcService;
pub use registry::{AgentInfo, AgentRegistry, AgentStatus, NewAgent};
