// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

//! Generated protobuf types for the armada agent channel.
//!
//! The agent speaks four unary RPCs (register, heartbeat, pull, submit) plus
//! a reserved streaming slot. The schema lives in `proto/agent.proto`.

/// Generated code for `armada.agent.v1`.
pub mod agent {
	pub mod v1 {
		tonic::include_proto!("armada.agent.v1");
	}
}

pub use agent::v1::*;
