// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! fieldnode - controller firmware entry point.

use fieldnode_bin::error::report_error_and_exit;
use fieldnode_bin::{commands, init_logging, Cli};

fn main() {
    let cli = Cli::parse_args();
    init_logging(cli.effective_log_level(), cli.log_format);

    if let Err(error) = commands::execute(cli) {
        report_error_and_exit(error);
    }
}
