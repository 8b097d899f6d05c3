//! Simulated DRV8243 behind the interactive session.
//!
//! The device runs on a virtual microsecond clock: delays advance it, and
//! the modeled chip reacts to nSLEEP edges the way the real one does, so a
//! handshake completes instantly in wall-clock time.

use std::cell::RefCell;
use std::rc::Rc;

use drv8243_core::driver::LevelSink;
use drv8243_core::handshake::{FaultLine, Timebase, WakeLine};

/// Microseconds after a wake edge before the model pulls nFAULT low.
const READY_DELAY_US: u64 = 600;
/// Microseconds after a valid ACK pulse before the model releases nFAULT.
const CLEAR_DELAY_US: u64 = 300;
/// Low widths at or past this are taken as a sleep command.
const SLEEP_THRESHOLD_US: u64 = 40;

/// Behavior profile selectable from the session.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum DeviceProfile {
    /// Signals ready after wake and releases nFAULT after the ACK.
    Nominal,
    /// Never pulls nFAULT low.
    NeverReady,
    /// Pulls nFAULT low after wake and never releases it.
    StuckLow,
    /// Healthy device, but the fault line is left unconnected.
    Unwired,
}

impl DeviceProfile {
    pub fn from_tag(tag: &str) -> Result<Self, String> {
        if tag.eq_ignore_ascii_case("nominal") {
            Ok(Self::Nominal)
        } else if tag.eq_ignore_ascii_case("never-ready") {
            Ok(Self::NeverReady)
        } else if tag.eq_ignore_ascii_case("stuck-low") {
            Ok(Self::StuckLow)
        } else if tag.eq_ignore_ascii_case("unwired") {
            Ok(Self::Unwired)
        } else {
            Err(format!("Unknown device profile `{tag}`"))
        }
    }

    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            DeviceProfile::Nominal => "nominal",
            DeviceProfile::NeverReady => "never-ready",
            DeviceProfile::StuckLow => "stuck-low",
            DeviceProfile::Unwired => "unwired",
        }
    }

    /// Whether the session should hand the fault line to the driver.
    #[must_use]
    pub const fn fault_wired(self) -> bool {
        !matches!(self, DeviceProfile::Unwired)
    }
}

struct DeviceState {
    now_us: u64,
    wake_high: bool,
    awake: bool,
    fault_low: bool,
    profile: DeviceProfile,
    wake_low_since: Option<u64>,
    ready_at: Option<u64>,
    clear_at: Option<u64>,
}

impl DeviceState {
    fn new(profile: DeviceProfile) -> Self {
        Self {
            now_us: 0,
            wake_high: true,
            awake: false,
            fault_low: false,
            profile,
            wake_low_since: None,
            ready_at: None,
            clear_at: None,
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
        if self.wake_high {
            self.wake_high = false;
            self.wake_low_since = Some(self.now_us);
        }
    }

    fn wake_rising(&mut self) {
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
                DeviceProfile::Nominal | DeviceProfile::StuckLow | DeviceProfile::Unwired => {
                    Some(self.now_us + READY_DELAY_US)
                }
            };
        } else if self.fault_low
            && matches!(self.profile, DeviceProfile::Nominal | DeviceProfile::Unwired)
        {
            // Short low while awake is the ACK pulse.
            self.clear_at = Some(self.now_us + CLEAR_DELAY_US);
        }
    }
}

/// Shared handle onto the simulated device and its clock.
#[derive(Clone)]
pub struct DeviceHandle(Rc<RefCell<DeviceState>>);

impl DeviceHandle {
    #[must_use]
    pub fn new(profile: DeviceProfile) -> Self {
        Self(Rc::new(RefCell::new(DeviceState::new(profile))))
    }

    #[must_use]
    pub fn wake(&self) -> EmuWake {
        EmuWake(self.clone())
    }

    #[must_use]
    pub fn fault(&self) -> EmuFault {
        EmuFault(self.clone())
    }

    #[must_use]
    pub fn timebase(&self) -> EmuTimebase {
        EmuTimebase(self.clone())
    }

    #[must_use]
    pub fn now_us(&self) -> u64 {
        self.0.borrow().now_us
    }

    #[must_use]
    pub fn wake_is_high(&self) -> bool {
        self.0.borrow().wake_high
    }

    #[must_use]
    pub fn fault_is_low(&self) -> bool {
        self.0.borrow().fault_low
    }
}

pub struct EmuWake(DeviceHandle);

impl WakeLine for EmuWake {
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

pub struct EmuFault(DeviceHandle);

impl FaultLine for EmuFault {
    fn is_low(&self) -> bool {
        self.0.0.borrow().fault_low
    }
}

pub struct EmuTimebase(DeviceHandle);

impl Timebase for EmuTimebase {
    // The session reports elapsed time from the 64-bit clock; the protocol
    // sees the truncated 32-bit view, as on hardware.
    #[allow(clippy::cast_possible_truncation)]
    fn now_us(&self) -> u32 {
        self.0.0.borrow().now_us as u32
    }

    fn delay_us(&mut self, us: u32) {
        self.0.0.borrow_mut().advance(u64::from(us));
    }
}

/// Sink remembering the last duty the driver pushed.
#[derive(Clone, Default)]
pub struct DutySink(Rc<RefCell<Option<f32>>>);

impl DutySink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn last(&self) -> Option<f32> {
        *self.0.borrow()
    }
}

impl LevelSink for DutySink {
    fn set_level(&mut self, level: f32) {
        *self.0.borrow_mut() = Some(level);
    }
}
