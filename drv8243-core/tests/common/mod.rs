//! Simulated DRV8243 plus virtual clock shared by the integration tests.
//!
//! The device model runs entirely on simulated time: delays advance the
//! clock, and the modeled chip reacts to nSLEEP edges the way the real one
//! does. No test here ever sleeps for real.

#![allow(dead_code)]

use std::cell::RefCell;
use std::rc::Rc;

use drv8243_core::driver::LevelSink;
use drv8243_core::handshake::{FaultLine, Timebase, WakeLine};

/// Microseconds after a wake edge before the device pulls nFAULT low.
pub const READY_DELAY_US: u32 = 600;
/// Microseconds after a valid ACK pulse before nFAULT releases.
pub const CLEAR_DELAY_US: u32 = 300;
/// Low widths at or past this are taken as a sleep command by the model.
const SLEEP_THRESHOLD_US: u64 = 40;

/// Behavior profile for the simulated chip.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DeviceProfile {
    /// Signals ready after wake and releases nFAULT after the ACK.
    Nominal,
    /// Never pulls nFAULT low.
    NeverReady,
    /// Pulls nFAULT low after wake and never releases it.
    StuckLow,
}

pub struct SimState {
    now_us: u64,
    wake_high: bool,
    awake: bool,
    fault_low: bool,
    profile: DeviceProfile,
    wake_low_since: Option<u64>,
    ready_at: Option<u64>,
    clear_at: Option<u64>,
    /// Extra microseconds silently added to every delay, modeling a host
    /// that overshoots its waits.
    delay_overshoot_us: u32,
    wake_writes: u32,
}

impl SimState {
    fn new(profile: DeviceProfile, start_us: u64) -> Self {
        Self {
            now_us: start_us,
            wake_high: true,
            awake: false,
            fault_low: false,
            profile,
            wake_low_since: None,
            ready_at: None,
            clear_at: None,
            delay_overshoot_us: 0,
            wake_writes: 0,
        }
    }

    fn advance(&mut self, us: u64) {
        self.now_us += us;
        if let Some(at) = self.ready_at
            && self.now_us >= at
            && self.awake
        {
            self.fault_low = true;
            self.ready_at = None;
        }
        if let Some(at) = self.clear_at
            && self.now_us >= at
        {
            self.fault_low = false;
            self.clear_at = None;
        }
    }

    fn wake_falling(&mut self) {
        self.wake_writes += 1;
        if self.wake_high {
            self.wake_high = false;
            self.wake_low_since = Some(self.now_us);
        }
    }

    fn wake_rising(&mut self) {
        self.wake_writes += 1;
        if self.wake_high {
            return;
        }
        self.wake_high = true;

        let low_for = self
            .wake_low_since
            .take()
            .map_or(0, |since| self.now_us - since);

        if !self.awake || low_for >= SLEEP_THRESHOLD_US {
            // Long low put (or kept) the device asleep; this edge wakes it.
            self.awake = true;
            self.fault_low = false;
            self.clear_at = None;
            self.ready_at = match self.profile {
                DeviceProfile::NeverReady => None,
                DeviceProfile::Nominal | DeviceProfile::StuckLow => {
                    Some(self.now_us + u64::from(READY_DELAY_US))
                }
            };
        } else if self.fault_low && self.profile == DeviceProfile::Nominal {
            // Short low while awake is the ACK pulse.
            self.clear_at = Some(self.now_us + u64::from(CLEAR_DELAY_US));
        }
    }
}

/// Shared handle onto the simulated device and clock.
#[derive(Clone)]
pub struct SimHandle(Rc<RefCell<SimState>>);

impl SimHandle {
    pub fn new(profile: DeviceProfile) -> Self {
        Self(Rc::new(RefCell::new(SimState::new(profile, 0))))
    }

    /// Starts the virtual clock near the `u32` boundary so elapsed math has
    /// to survive wraparound.
    pub fn with_start(profile: DeviceProfile, start_us: u64) -> Self {
        Self(Rc::new(RefCell::new(SimState::new(profile, start_us))))
    }

    pub fn wake(&self) -> SimWake {
        SimWake(self.clone())
    }

    pub fn fault(&self) -> SimFault {
        SimFault(self.clone())
    }

    pub fn timebase(&self) -> SimTimebase {
        SimTimebase(self.clone())
    }

    pub fn now_us(&self) -> u64 {
        self.0.borrow().now_us
    }

    pub fn wake_is_high(&self) -> bool {
        self.0.borrow().wake_high
    }

    pub fn wake_writes(&self) -> u32 {
        self.0.borrow().wake_writes
    }

    pub fn set_delay_overshoot(&self, us: u32) {
        self.0.borrow_mut().delay_overshoot_us = us;
    }
}

pub struct SimWake(SimHandle);

impl WakeLine for SimWake {
    fn set_high(&mut self) {
        self.0.0.borrow_mut().wake_rising();
    }

    fn set_low(&mut self) {
        self.0.0.borrow_mut().wake_falling();
    }

    fn is_set_high(&self) -> bool {
        self.0.0.borrow().wake_high
    }
}

pub struct SimFault(SimHandle);

impl FaultLine for SimFault {
    fn is_low(&self) -> bool {
        self.0.0.borrow().fault_low
    }
}

pub struct SimTimebase(SimHandle);

impl Timebase for SimTimebase {
    // The real microsecond counter is 32 bits wide; truncating the 64-bit
    // virtual clock reproduces its wraparound.
    #[allow(clippy::cast_possible_truncation)]
    fn now_us(&self) -> u32 {
        self.0.0.borrow().now_us as u32
    }

    fn delay_us(&mut self, us: u32) {
        let mut state = self.0.0.borrow_mut();
        let overshoot = state.delay_overshoot_us;
        state.advance(u64::from(us) + u64::from(overshoot));
    }
}

/// Sink that keeps every level it was handed, observable from outside the
/// driver.
#[derive(Clone, Default)]
pub struct RecordingSink(Rc<RefCell<Vec<f32>>>);

impl RecordingSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn levels(&self) -> Vec<f32> {
        self.0.borrow().clone()
    }

    pub fn last(&self) -> Option<f32> {
        self.0.borrow().last().copied()
    }
}

impl LevelSink for RecordingSink {
    fn set_level(&mut self, level: f32) {
        self.0.borrow_mut().push(level);
    }
}
