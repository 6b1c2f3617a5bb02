// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `version` command.

use crate::cli::Cli;
use crate::error::BinResult;

/// Executes the `version` command to display version information.
pub fn version(_cli: &Cli) -> BinResult<()> {
    println!("fieldnode - controller firmware");
    println!();
    println!("version information:");
    println!("  fieldnode-bin:    {}", env!("CARGO_PKG_VERSION"));
    println!("  fieldnode-core:   {}", fieldnode_core::VERSION);
    println!("  fieldnode-config: {}", fieldnode_config::VERSION);
    println!();
    println!("build information:");
    println!("  rust edition: 2021");
    println!("  target:       {}", std::env::consts::ARCH);
    println!("  os:           {}", std::env::consts::OS);
    println!();
    println!("License: PolyForm Noncommercial License 1.0.0");
    println!("Copyright (c) 2025 Sylvex. All rights reserved.");

    Ok(())
}
