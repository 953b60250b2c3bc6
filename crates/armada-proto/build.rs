// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights
// reserved. SPDX-License-Identifier: Proprietary

fn main() -> Result<(), Box<dyn std::error::Error>> {
	// Use the vendored protoc so builders do not need a system install.
	std::env::set_var("PROTOC", protoc_bin_vendored::protoc_bin_path()?);

	tonic_build::configure()
		.build_server(true)
		.build_client(true)
		.compile_protos(&["proto/agent.proto"], &["proto"])?;

	println!("cargo:rerun-if-changed=proto/agent.proto");
	Ok(())
}
