// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! The query server state machine.
//!
//! `Listen -> Receiving -> Sending -> Listen`, one connection at a time.
//! Request bytes accumulate into a bounded buffer until the first carriage
//! return; a request that fills the buffer without one answers 400. The
//! response is flushed non-blocking and the connection closed.

use std::time::{Duration, Instant};

use tracing::{debug, info, trace, warn};

use fieldnode_core::buffer::FixedBuf;
use fieldnode_core::transport::{Connection, Listener};
use fieldnode_device::{parse_value, DeviceSet};

// =============================================================================
// QueryConfig
// =============================================================================

/// Sizing and policy for the query server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QueryConfig {
    /// Capacity of the request line buffer.
    pub request_capacity: usize,
    /// Idle deadline for a connected client; zero disables it.
    pub idle_timeout: Duration,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            request_capacity: 128,
            idle_timeout: Duration::from_secs(10),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum QueryState {
    Listen,
    Receiving,
    Sending,
}

// =============================================================================
// QueryServer
// =============================================================================

/// The HTTP/JSON query front-end.
pub struct QueryServer<L: Listener> {
    listener: L,
    state: QueryState,
    conn: Option<L::Conn>,
    request: FixedBuf,
    response: Vec<u8>,
    sent: usize,
    started: bool,
    last_activity: Instant,
    idle_timeout: Duration,
}

impl<L: Listener> QueryServer<L> {
    /// Creates the server over an already-bound listener.
    pub fn new(listener: L, config: QueryConfig) -> Self {
        Self {
            listener,
            state: QueryState::Listen,
            conn: None,
            request: FixedBuf::with_capacity(config.request_capacity),
            response: Vec::new(),
            sent: 0,
            started: false,
            last_activity: Instant::now(),
            idle_timeout: config.idle_timeout,
        }
    }

    /// Returns `true` while a client is being served.
    pub fn is_busy(&self) -> bool {
        self.state != QueryState::Listen
    }

    /// Advances the server by one bounded step.
    ///
    /// Returns `true` if any work was done.
    pub fn advance(&mut self, devices: &mut DeviceSet, now: Instant) -> bool {
        if !self.started {
            info!("query server started");
            self.started = true;
            return true;
        }

        match self.state {
            QueryState::Listen => self.advance_listen(now),
            QueryState::Receiving => self.advance_receiving(devices, now),
            QueryState::Sending => self.advance_sending(now),
        }
    }

    fn advance_listen(&mut self, now: Instant) -> bool {
        match self.listener.poll_accept() {
            Ok(Some(conn)) => {
                trace!(conn = %conn.id(), "query client connected");
                self.conn = Some(conn);
                self.request.clear();
                self.last_activity = now;
                self.state = QueryState::Receiving;
                true
            }
            Ok(None) => false,
            Err(e) => {
                warn!(error = %e, "query listener poll failed");
                false
            }
        }
    }

    fn advance_receiving(&mut self, devices: &mut DeviceSet, now: Instant) -> bool {
        if self.expired(now) {
            self.release();
            return true;
        }
        let conn = match self.conn.as_mut() {
            Some(c) => c,
            None => {
                self.state = QueryState::Listen;
                return true;
            }
        };

        let room = self.request.remaining();
        if room == 0 {
            // Request line never terminated within the buffer.
            debug!("query request too long, answering 400");
            self.start_response(respond_status(400));
            return true;
        }

        match self.request.fill_from(room, |tail| conn.try_read(tail)) {
            Ok(0) => false,
            Ok(_) => {
                self.last_activity = now;
                if self.request.as_slice().contains(&b'\r') {
                    let response = self.process_request(devices);
                    self.start_response(response);
                }
                true
            }
            Err(e) => {
                debug!(error = %e, "query client gone while receiving");
                self.release();
                true
            }
        }
    }

    fn advance_sending(&mut self, now: Instant) -> bool {
        if self.expired(now) {
            self.release();
            return true;
        }
        let conn = match self.conn.as_mut() {
            Some(c) => c,
            None => {
                self.state = QueryState::Listen;
                return true;
            }
        };
        match conn.try_write(&self.response[self.sent..]) {
            Ok(0) => false,
            Ok(n) => {
                self.sent += n;
                self.last_activity = now;
                if self.sent == self.response.len() {
                    trace!(bytes = self.sent, "query response flushed");
                    self.release();
                }
                true
            }
            Err(e) => {
                debug!(error = %e, "query client gone while sending");
                self.release();
                true
            }
        }
    }

    fn expired(&self, now: Instant) -> bool {
        !self.idle_timeout.is_zero()
            && now.duration_since(self.last_activity) > self.idle_timeout
    }

    fn start_response(&mut self, response: Vec<u8>) {
        self.response = response;
        self.sent = 0;
        self.state = QueryState::Sending;
    }

    fn release(&mut self) {
        if let Some(mut conn) = self.conn.take() {
            conn.close();
        }
        self.request.clear();
        self.response.clear();
        self.sent = 0;
        self.state = QueryState::Listen;
    }

    /// Parses the GET line and produces the full response bytes.
    fn process_request(&self, devices: &mut DeviceSet) -> Vec<u8> {
        let line = match first_line(self.request.as_slice()) {
            Some(line) => line,
            None => return respond_status(400),
        };

        let url = match get_url(line) {
            Some(url) => url,
            None => return respond_status(400),
        };

        if url == "/" {
            return respond_json(200, &all_devices_json(devices));
        }

        // `/<device>/<value>` writes an actuator.
        let rest = &url[1..];
        let Some((name, value_text)) = rest.split_once('/') else {
            return respond_status(400);
        };

        let Some(handle) = devices.handle_by_name(name) else {
            debug!(device = name, "query for unknown device");
            return respond_status(404);
        };
        // Handle came from the set; the device is there.
        let Some(device) = devices.get(handle) else {
            return respond_status(500);
        };

        let Some(value) = parse_value(device.kind(), value_text) else {
            debug!(device = name, value = value_text, "unparsable value");
            return respond_status(400);
        };

        let Some(device) = devices.get_mut(handle) else {
            return respond_status(500);
        };
        if device.write(value).is_accepted() {
            info!(device = name, %value, "device written via query server");
            respond_json(200, &serde_json::json!({ "status": "OK" }))
        } else {
            respond_status(500)
        }
    }
}

// =============================================================================
// Request / response helpers
// =============================================================================

fn first_line(bytes: &[u8]) -> Option<&str> {
    let end = bytes.iter().position(|&b| b == b'\r')?;
    std::str::from_utf8(&bytes[..end]).ok()
}

/// Extracts the URL from a `GET <url> ...` request line.
fn get_url(line: &str) -> Option<&str> {
    let rest = line.strip_prefix("GET ")?;
    let url = rest.split_whitespace().next()?;
    url.starts_with('/').then_some(url)
}

fn all_devices_json(devices: &DeviceSet) -> serde_json::Value {
    let mut map = serde_json::Map::new();
    for device in devices.iter() {
        map.insert(device.name().to_string(), device.value_json());
    }
    serde_json::Value::Object(map)
}

fn status_text(code: u16) -> &'static str {
    match code {
        200 => "OK",
        400 => "Bad Request",
        404 => "Not Found",
        500 => "Internal Server Error",
        _ => "Unknown Status",
    }
}

fn respond_json(code: u16, body: &serde_json::Value) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(format!("HTTP/1.1 {} {}\r\n", code, status_text(code)).as_bytes());
    out.extend_from_slice(b"Content-Type: application/json\r\nConnection: close\r\n\r\n");
    out.extend_from_slice(body.to_string().as_bytes());
    out.extend_from_slice(b"\r\n");
    out
}

fn respond_status(code: u16) -> Vec<u8> {
    respond_json(code, &serde_json::json!({}))
}

// =============================================================================
// Tests
// =============================================================================
