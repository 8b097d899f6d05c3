//! Wake/acknowledge handshake protocol for the DRV8243.
//!
//! The chip powers up asleep. Bringing it to a known state takes a bit-banged
//! sequence on nSLEEP: force sleep, wake, wait for nFAULT to signal ready,
//! answer with a short low pulse on nSLEEP, then confirm nFAULT releases.
//! The pulse width is the tight part: past roughly 40 µs the device reads the
//! pulse as a new sleep command instead of an acknowledgment.
//!
//! This module holds the tuneables, result types, and trait seams; the pass
//! itself lives in [`engine`].

use portable_atomic::{AtomicBool, Ordering};

pub mod engine;

pub use engine::HandshakeEngine;

/// Duration nSLEEP is held low to force the device asleep before a pass.
pub const SLEEP_FORCE_MS: u32 = 2;
/// Bound on the wait for nFAULT to go low after wake.
pub const READY_WAIT_TIMEOUT_US: u32 = 5_000;
/// Bound on the wait for nFAULT to release after the ACK pulse.
pub const CONFIRM_WAIT_TIMEOUT_US: u32 = 5_000;
/// Polling granularity for both nFAULT waits.
pub const POLL_STEP_US: u32 = 10;
/// Default ACK pulse width. Empirically tuned against real hardware; any
/// value in the safe window works.
pub const ACK_PULSE_US: u32 = 22;
/// Lower edge of the safe ACK pulse window.
pub const ACK_PULSE_FLOOR_US: u32 = 20;
/// Upper edge of the target window configuration may request.
pub const ACK_PULSE_TARGET_MAX_US: u32 = 30;
/// Hard ceiling: a measured pulse at or past this width risks being taken as
/// a sleep command.
pub const ACK_PULSE_CEILING_US: u32 = 40;
/// Settle delay substituting for the ready wait when nFAULT is not wired.
pub const UNOBSERVED_READY_DELAY_MS: u32 = 2;

/// Timing parameters for one handshake pass.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct HandshakeConfig {
    pub sleep_force_ms: u32,
    pub ready_timeout_us: u32,
    pub confirm_timeout_us: u32,
    pub poll_step_us: u32,
    pub ack_pulse_us: u32,
}

impl HandshakeConfig {
    /// Configuration matching the values tuned against real hardware.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            sleep_force_ms: SLEEP_FORCE_MS,
            ready_timeout_us: READY_WAIT_TIMEOUT_US,
            confirm_timeout_us: CONFIRM_WAIT_TIMEOUT_US,
            poll_step_us: POLL_STEP_US,
            ack_pulse_us: ACK_PULSE_US,
        }
    }

    /// Requests a different ACK pulse width, clamped into the safe window.
    #[must_use]
    pub const fn with_ack_pulse(mut self, pulse_us: u32) -> Self {
        self.ack_pulse_us = if pulse_us < ACK_PULSE_FLOOR_US {
            ACK_PULSE_FLOOR_US
        } else if pulse_us > ACK_PULSE_TARGET_MAX_US {
            ACK_PULSE_TARGET_MAX_US
        } else {
            pulse_us
        };
        self
    }

    /// Worst-case blocking duration of a full pass, with both nFAULT waits
    /// hitting their timeout. Excludes polling-granularity slop.
    #[must_use]
    pub const fn worst_case_blocking_us(&self) -> u32 {
        self.sleep_force_ms * 1_000
            + self.ready_timeout_us
            + self.ack_pulse_us
            + self.confirm_timeout_us
    }
}

impl Default for HandshakeConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Terminal result of the most recent handshake pass.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Default)]
pub enum HandshakeOutcome {
    /// No pass has completed yet.
    #[default]
    NotRun,
    /// Ready observed and the device released nFAULT after the ACK.
    VerifiedOk,
    /// Ready observed but nFAULT never released within the confirm window.
    VerifiedFail,
    /// The pass ran best-effort: nFAULT unwired, ready never observed, or the
    /// wake line was missing entirely.
    Unverified,
}

impl HandshakeOutcome {
    /// Returns `true` once a pass has run, whatever its verdict.
    #[must_use]
    pub const fn has_run(self) -> bool {
        !matches!(self, HandshakeOutcome::NotRun)
    }

    /// Short label used in logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            HandshakeOutcome::NotRun => "not-run",
            HandshakeOutcome::VerifiedOk => "verified-ok",
            HandshakeOutcome::VerifiedFail => "verified-fail",
            HandshakeOutcome::Unverified => "unverified",
        }
    }
}

/// What caused a handshake pass to be requested.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum HandshakeTrigger {
    /// Timer scheduled at initialization fired.
    Deferred,
    /// First level command arrived before the deferred pass ran.
    FirstWrite,
    /// Explicit request from the host.
    HostRequest,
}

impl HandshakeTrigger {
    /// Short label used in logs.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            HandshakeTrigger::Deferred => "deferred",
            HandshakeTrigger::FirstWrite => "first-write",
            HandshakeTrigger::HostRequest => "host-request",
        }
    }
}

/// Shared in-flight guard for handshake passes.
///
/// Passed into each engine at construction so multiple device instances can
/// share one guard explicitly instead of through a process-wide static. The
/// flag is set before the force-sleep step and cleared after finalize on
/// every exit path.
#[derive(Debug, Default)]
pub struct SessionGuard {
    in_flight: AtomicBool,
}

impl SessionGuard {
    #[must_use]
    pub const fn new() -> Self {
        Self {
            in_flight: AtomicBool::new(false),
        }
    }

    /// Attempts to claim the guard. Returns `false` when a pass is already
    /// in flight, in which case the caller must coalesce.
    pub fn try_begin(&self) -> bool {
        self.in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    /// Releases the guard after finalize.
    pub fn finish(&self) {
        self.in_flight.store(false, Ordering::Release);
    }

    /// Returns `true` while a pass is in flight.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }
}

/// Control over the nSLEEP line. Readback reports the driven level so the
/// at-rest invariant (nSLEEP high outside a pulse) can be checked.
pub trait WakeLine {
    fn set_high(&mut self);
    fn set_low(&mut self);
    fn is_set_high(&self) -> bool;
}

/// View of the open-drain nFAULT line. Low means the device is signaling.
pub trait FaultLine {
    fn is_low(&self) -> bool;
}

/// Monotonic microsecond clock plus blocking delays.
///
/// `now_us` wraps at `u32`; elapsed time must always be computed with
/// `wrapping_sub`. Injectable so tests drive a virtual clock instead of
/// real waits.
pub trait Timebase {
    fn now_us(&self) -> u32;
    fn delay_us(&mut self, us: u32);

    fn delay_ms(&mut self, ms: u32) {
        let mut remaining = ms;
        while remaining > 0 {
            self.delay_us(1_000);
            remaining -= 1;
        }
    }
}

/// Read-only snapshot of the engine's bookkeeping for reporting.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct HandshakeDiagnostics {
    pub outcome: HandshakeOutcome,
    /// Passes that actually ran (coalesced calls excluded).
    pub attempts: u8,
    /// nFAULT observed low during the ready wait.
    pub saw_ready: bool,
    /// nFAULT observed high again during the confirm wait.
    pub saw_ack_clear: bool,
    pub ready_wait_us: u32,
    pub confirm_wait_us: u32,
    /// Measured low time of the last ACK pulse.
    pub ack_pulse_low_us: u32,
    /// Last pulse measured at or past [`ACK_PULSE_CEILING_US`].
    pub ack_pulse_overrun: bool,
}
