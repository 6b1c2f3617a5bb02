// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Pin-level hardware abstraction.
//!
//! The driver state machines talk to hardware through three small traits so
//! the same logic runs against real GPIO on a target board or against the
//! simulated pins in [`sim`] when hosted in a process (and in tests). Every
//! operation is an immediate sample or latch; nothing here may block.

/// A digital input line.
pub trait InputPin {
    /// Samples the line. `true` means electrically active.
    fn is_active(&self) -> bool;
}

/// A digital output line.
pub trait OutputPin {
    /// Latches the line high (`true`) or low (`false`).
    fn set_active(&mut self, on: bool);
}

/// A one-wire temperature transducer bus.
///
/// Conversions are started and collected in separate steps because the
/// transducer needs time to convert; the probe driver owns the waiting.
pub trait ProbeBus {
    /// Kicks off a temperature conversion. Returns immediately.
    fn start_conversion(&mut self);

    /// Collects the last conversion result in degrees Celsius.
    ///
    /// `None` means the transducer is absent or faulted.
    fn read_celsius(&mut self) -> Option<f32>;

    /// Re-initializes the bus after a fault. Default is a no-op.
    fn reset(&mut self) {}
}

// =============================================================================
// Simulated pins
// =============================================================================

/// Process-hosted pin implementations.
///
/// Each simulated pin comes with a handle the host (or a test) uses to drive
/// or observe the line, mirroring how a signal generator and a probe would
/// be attached to real hardware.
pub mod sim {
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    use super::{InputPin, OutputPin, ProbeBus};

    /// A simulated input line.
    #[derive(Debug)]
    pub struct SimInput {
        level: Rc<Cell<bool>>,
    }

    /// Drives a [`SimInput`] from the outside.
    #[derive(Debug, Clone)]
    pub struct SimInputHandle {
        level: Rc<Cell<bool>>,
    }

    impl SimInput {
        /// Creates an inactive input line and its driving handle.
        pub fn new() -> (Self, SimInputHandle) {
            let level = Rc::new(Cell::new(false));
            (
                Self {
                    level: Rc::clone(&level),
                },
                SimInputHandle { level },
            )
        }
    }

    impl InputPin for SimInput {
        fn is_active(&self) -> bool {
            self.level.get()
        }
    }

    impl SimInputHandle {
        /// Sets the electrical level of the line.
        pub fn set_level(&self, active: bool) {
            self.level.set(active);
        }
    }

    /// A simulated output line.
    #[derive(Debug)]
    pub struct SimOutput {
        level: Rc<Cell<bool>>,
    }

    /// Observes a [`SimOutput`] from the outside.
    #[derive(Debug, Clone)]
    pub struct SimOutputHandle {
        level: Rc<Cell<bool>>,
    }

    impl SimOutput {
        /// Creates a low output line and its observing handle.
        pub fn new() -> (Self, SimOutputHandle) {
            let level = Rc::new(Cell::new(false));
            (
                Self {
                    level: Rc::clone(&level),
                },
                SimOutputHandle { level },
            )
        }
    }

    impl OutputPin for SimOutput {
        fn set_active(&mut self, on: bool) {
            self.level.set(on);
        }
    }

    impl SimOutputHandle {
        /// Reads the latched level of the line.
        pub fn is_active(&self) -> bool {
            self.level.get()
        }
    }

    #[derive(Debug)]
    struct SimProbeState {
        celsius: f32,
        present: bool,
    }

    /// A simulated temperature transducer bus.
    #[derive(Debug)]
    pub struct SimProbe {
        state: Rc<RefCell<SimProbeState>>,
    }

    /// Drives a [`SimProbe`] from the outside.
    #[derive(Debug, Clone)]
    pub struct SimProbeHandle {
        state: Rc<RefCell<SimProbeState>>,
    }

    impl SimProbe {
        /// Creates a present transducer reporting `celsius`, plus its handle.
        pub fn new(celsius: f32) -> (Self, SimProbeHandle) {
            let state = Rc::new(RefCell::new(SimProbeState {
                celsius,
                present: true,
            }));
            (
                Self {
                    state: Rc::clone(&state),
                },
                SimProbeHandle { state },
            )
        }
    }

    impl ProbeBus for SimProbe {
        fn start_conversion(&mut self) {}

        fn read_celsius(&mut self) -> Option<f32> {
            let s = self.state.borrow();
            s.present.then_some(s.celsius)
        }
    }

    impl SimProbeHandle {
        /// Sets the temperature the transducer reports.
        pub fn set_celsius(&self, celsius: f32) {
            self.state.borrow_mut().celsius = celsius;
        }

        /// Attaches or detaches the transducer.
        pub fn set_present(&self, present: bool) {
            self.state.borrow_mut().present = present;
        }
    }
}

// =============================================================================
// Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::sim::*;
    use super::*;

    #[test]
    fn test_sim_input_levels() {
        let (pin, handle) = SimInput::new();
        assert!(!pin.is_active());
        handle.set_level(true);
        assert!(pin.is_active());
    }

    #[test]
    fn test_sim_output_latches() {
        let (mut pin, handle) = SimOutput::new();
        assert!(!handle.is_active());
        pin.set_active(true);
        assert!(handle.is_active());
        pin.set_active(false);
        assert!(!handle.is_active());
    }

    #[test]
    fn test_sim_probe_presence() {
        let (mut bus, handle) = SimProbe::new(21.5);
        bus.start_conversion();
        assert_eq!(bus.read_celsius(), Some(21.5));
        handle.set_present(false);
        assert_eq!(bus.read_celsius(), None);
        handle.set_present(true);
        handle.set_celsius(-7.25);
        assert_eq!(bus.read_celsius(), Some(-7.25));
    }
}
