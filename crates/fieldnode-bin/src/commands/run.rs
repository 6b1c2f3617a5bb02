// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Implementation of the `run` command.

use std::time::{Duration, Instant};

use tracing::info;

use fieldnode_config::ConfigLoader;
use fieldnode_core::transport::tcp::TcpListener;
use fieldnode_device::hal::sim::SimOutput;
use fieldnode_device::DiagLed;
use fieldnode_modbus::ModbusServer;
use fieldnode_query::QueryServer;

use crate::cli::Cli;
use crate::error::BinResult;
use crate::runtime::{build_devices, build_table, pool_config, query_config, Controller};

/// How long an idle pass sleeps before the next tick.
const IDLE_BACKOFF: Duration = Duration::from_millis(1);

/// Executes the `run` command: builds the controller from configuration and
/// drives the cooperative polling loop until the process is killed.
pub fn run(cli: &Cli) -> BinResult<()> {
    let config = ConfigLoader::new().load(&cli.config)?;
    info!(node = %config.node.id, "starting fieldnode controller");

    let (devices, _bench) = build_devices(&config);
    let table = build_table(&config, &devices)?;

    let modbus = if config.modbus.enabled {
        let listener = TcpListener::bind((config.modbus.bind_address, config.modbus.port))?;
        info!(
            addr = %config.modbus.bind_address,
            port = config.modbus.port,
            slots = config.modbus.slots,
            "modbus server listening"
        );
        Some(ModbusServer::new(listener, pool_config(&config.modbus)))
    } else {
        None
    };

    let query = if config.query.enabled {
        let listener = TcpListener::bind((config.query.bind_address, config.query.port))?;
        info!(
            addr = %config.query.bind_address,
            port = config.query.port,
            "query server listening"
        );
        Some(QueryServer::new(listener, query_config(&config.query)))
    } else {
        None
    };

    let (led_pin, _led) = SimOutput::new();
    let diag = DiagLed::new(Box::new(led_pin));
    let mut controller = Controller::new(devices, table, modbus, query, diag);

    // The firmware main loop: advance everything one bounded tick, back off
    // briefly when a whole pass was idle.
    loop {
        let busy = controller.advance_once(Instant::now());
        if !busy {
            std::thread::sleep(IDLE_BACKOFF);
        }
    }
}
