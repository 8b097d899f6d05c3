//! Telemetry event catalog and ring buffer shared by firmware and host targets.
//!
//! Handshake passes are timing critical, so the engine never formats text
//! while a pass is in flight. It records strongly typed events here instead;
//! firmware mirrors them to defmt and the emulator prints them after the
//! fact. Event kinds serialize to compact numeric codes for transport over
//! diagnostics channels.

use core::fmt;

use heapless::{HistoryBuf, OldestOrdered};

use crate::handshake::{HandshakeOutcome, HandshakeTrigger};

/// Identifier assigned to each recorded telemetry event.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Wraparound-safe microsecond timestamp taken from the engine timebase.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Micros(pub u32);

impl Micros {
    #[must_use]
    pub const fn as_u32(self) -> u32 {
        self.0
    }

    /// Elapsed microseconds since `earlier`, correct across `u32` wraparound.
    #[must_use]
    pub const fn wrapping_elapsed_since(self, earlier: Micros) -> u32 {
        self.0.wrapping_sub(earlier.0)
    }
}

/// Discriminated telemetry events shared across all controller targets.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    /// nSLEEP driven low long enough to force the device asleep.
    SleepForced,
    /// nSLEEP driven high to wake the device.
    WakeAsserted,
    /// nFAULT observed low (device signaling ready).
    ReadyObserved,
    /// nFAULT never went low within the ready-wait window.
    ReadyTimeout,
    /// ACK pulse issued on nSLEEP.
    AckPulse,
    /// nFAULT released high after the ACK pulse.
    AckConfirmed,
    /// nFAULT stayed low past the confirm-wait window.
    AckConfirmTimeout,
    /// Pass aborted because no wake line is wired.
    WakeLineMissing,
    /// A second invocation observed the in-flight guard and was folded into
    /// the running pass.
    HandshakeCoalesced,
    /// Level command fell below the off threshold; actuator driven to zero.
    OutputDisabled,
    HandshakeStarted(HandshakeTrigger),
    HandshakeComplete(HandshakeOutcome),
    Custom(u16),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::SleepForced => f.write_str("sleep-forced"),
            TelemetryEventKind::WakeAsserted => f.write_str("wake-asserted"),
            TelemetryEventKind::ReadyObserved => f.write_str("ready-observed"),
            TelemetryEventKind::ReadyTimeout => f.write_str("ready-timeout"),
            TelemetryEventKind::AckPulse => f.write_str("ack-pulse"),
            TelemetryEventKind::AckConfirmed => f.write_str("ack-confirmed"),
            TelemetryEventKind::AckConfirmTimeout => f.write_str("ack-confirm-timeout"),
            TelemetryEventKind::WakeLineMissing => f.write_str("wake-line-missing"),
            TelemetryEventKind::HandshakeCoalesced => f.write_str("handshake-coalesced"),
            TelemetryEventKind::OutputDisabled => f.write_str("output-disabled"),
            TelemetryEventKind::HandshakeStarted(trigger) => {
                write!(f, "handshake-started {}", trigger.label())
            }
            TelemetryEventKind::HandshakeComplete(outcome) => {
                write!(f, "handshake-complete {}", outcome.label())
            }
            TelemetryEventKind::Custom(code) => write!(f, "custom({code})"),
        }
    }
}

impl TelemetryEventKind {
    const SLEEP_FORCED_CODE: u16 = 0x0000;
    const WAKE_ASSERTED_CODE: u16 = 0x0001;
    const READY_OBSERVED_CODE: u16 = 0x0002;
    const READY_TIMEOUT_CODE: u16 = 0x0003;
    const ACK_PULSE_CODE: u16 = 0x0004;
    const ACK_CONFIRMED_CODE: u16 = 0x0005;
    const ACK_CONFIRM_TIMEOUT_CODE: u16 = 0x0006;
    const WAKE_LINE_MISSING_CODE: u16 = 0x0007;
    const COALESCED_CODE: u16 = 0x0008;
    const OUTPUT_DISABLED_CODE: u16 = 0x0009;
    const STARTED_BASE: u16 = 0x0010;
    const COMPLETE_BASE: u16 = 0x0014;
    const COMPLETE_END: u16 = Self::COMPLETE_BASE + 4;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::SleepForced => Self::SLEEP_FORCED_CODE,
            TelemetryEventKind::WakeAsserted => Self::WAKE_ASSERTED_CODE,
            TelemetryEventKind::ReadyObserved => Self::READY_OBSERVED_CODE,
            TelemetryEventKind::ReadyTimeout => Self::READY_TIMEOUT_CODE,
            TelemetryEventKind::AckPulse => Self::ACK_PULSE_CODE,
            TelemetryEventKind::AckConfirmed => Self::ACK_CONFIRMED_CODE,
            TelemetryEventKind::AckConfirmTimeout => Self::ACK_CONFIRM_TIMEOUT_CODE,
            TelemetryEventKind::WakeLineMissing => Self::WAKE_LINE_MISSING_CODE,
            TelemetryEventKind::HandshakeCoalesced => Self::COALESCED_CODE,
            TelemetryEventKind::OutputDisabled => Self::OUTPUT_DISABLED_CODE,
            TelemetryEventKind::HandshakeStarted(trigger) => {
                Self::STARTED_BASE + trigger_index(trigger)
            }
            TelemetryEventKind::HandshakeComplete(outcome) => {
                Self::COMPLETE_BASE + outcome_index(outcome)
            }
            TelemetryEventKind::Custom(code) => code,
        }
    }

    /// Decodes a raw discriminant, falling back to [`TelemetryEventKind::Custom`].
    #[must_use]
    pub fn from_raw(code: u16) -> Self {
        match code {
            Self::SLEEP_FORCED_CODE => TelemetryEventKind::SleepForced,
            Self::WAKE_ASSERTED_CODE => TelemetryEventKind::WakeAsserted,
            Self::READY_OBSERVED_CODE => TelemetryEventKind::ReadyObserved,
            Self::READY_TIMEOUT_CODE => TelemetryEventKind::ReadyTimeout,
            Self::ACK_PULSE_CODE => TelemetryEventKind::AckPulse,
            Self::ACK_CONFIRMED_CODE => TelemetryEventKind::AckConfirmed,
            Self::ACK_CONFIRM_TIMEOUT_CODE => TelemetryEventKind::AckConfirmTimeout,
            Self::WAKE_LINE_MISSING_CODE => TelemetryEventKind::WakeLineMissing,
            Self::COALESCED_CODE => TelemetryEventKind::HandshakeCoalesced,
            Self::OUTPUT_DISABLED_CODE => TelemetryEventKind::OutputDisabled,
            value if (Self::STARTED_BASE..Self::COMPLETE_BASE).contains(&value) => {
                let offset = value - Self::STARTED_BASE;
                trigger_from_index(offset).map_or(TelemetryEventKind::Custom(value), |trigger| {
                    TelemetryEventKind::HandshakeStarted(trigger)
                })
            }
            value if (Self::COMPLETE_BASE..Self::COMPLETE_END).contains(&value) => {
                let offset = value - Self::COMPLETE_BASE;
                outcome_from_index(offset).map_or(TelemetryEventKind::Custom(value), |outcome| {
                    TelemetryEventKind::HandshakeComplete(outcome)
                })
            }
            other => TelemetryEventKind::Custom(other),
        }
    }
}

const fn trigger_index(trigger: HandshakeTrigger) -> u16 {
    match trigger {
        HandshakeTrigger::Deferred => 0,
        HandshakeTrigger::FirstWrite => 1,
        HandshakeTrigger::HostRequest => 2,
    }
}

const fn trigger_from_index(index: u16) -> Option<HandshakeTrigger> {
    match index {
        0 => Some(HandshakeTrigger::Deferred),
        1 => Some(HandshakeTrigger::FirstWrite),
        2 => Some(HandshakeTrigger::HostRequest),
        _ => None,
    }
}

const fn outcome_index(outcome: HandshakeOutcome) -> u16 {
    match outcome {
        HandshakeOutcome::NotRun => 0,
        HandshakeOutcome::VerifiedOk => 1,
        HandshakeOutcome::VerifiedFail => 2,
        HandshakeOutcome::Unverified => 3,
    }
}

const fn outcome_from_index(index: u16) -> Option<HandshakeOutcome> {
    match index {
        0 => Some(HandshakeOutcome::NotRun),
        1 => Some(HandshakeOutcome::VerifiedOk),
        2 => Some(HandshakeOutcome::VerifiedFail),
        3 => Some(HandshakeOutcome::Unverified),
        _ => None,
    }
}

/// Payloads carried alongside telemetry events.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum TelemetryPayload {
    /// No additional metadata accompanies the event.
    None,
    /// Outcome of a bounded polling wait on nFAULT.
    Wait(WaitTelemetry),
    /// Measured timing of the ACK pulse.
    Pulse(PulseTelemetry),
    /// Summary of a completed handshake pass.
    Pass(PassTelemetry),
}

/// Details of one bounded nFAULT polling wait.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct WaitTelemetry {
    /// Microseconds spent polling before the wait ended.
    pub elapsed_us: u32,
    /// Whether the awaited level was observed before the timeout.
    pub observed: bool,
}

impl WaitTelemetry {
    #[must_use]
    pub const fn new(elapsed_us: u32, observed: bool) -> Self {
        Self {
            elapsed_us,
            observed,
        }
    }
}

/// Measured timing of an ACK pulse on nSLEEP.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PulseTelemetry {
    /// Measured time nSLEEP was held low.
    pub low_us: u32,
    /// Whether the measured width reached the hard ceiling.
    pub overrun: bool,
}

impl PulseTelemetry {
    #[must_use]
    pub const fn new(low_us: u32, overrun: bool) -> Self {
        Self { low_us, overrun }
    }
}

/// Summary recorded when a handshake pass reaches its finalize step.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct PassTelemetry {
    pub outcome: HandshakeOutcome,
    pub attempt: u8,
    pub ready_wait_us: u32,
    pub confirm_wait_us: u32,
}

impl PassTelemetry {
    #[must_use]
    pub const fn new(
        outcome: HandshakeOutcome,
        attempt: u8,
        ready_wait_us: u32,
        confirm_wait_us: u32,
    ) -> Self {
        Self {
            outcome,
            attempt,
            ready_wait_us,
            confirm_wait_us,
        }
    }
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord {
    pub id: EventId,
    pub timestamp: Micros,
    pub event: TelemetryEventKind,
    pub details: TelemetryPayload,
}

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: HistoryBuf<TelemetryRecord, CAPACITY>,
    next_event_id: EventId,
}

impl<const CAPACITY: usize> TelemetryRecorder<CAPACITY> {
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    /// Returns the number of records currently stored.
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    /// Returns `true` when no telemetry records are stored.
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Records an arbitrary telemetry event with the supplied payload.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        payload: TelemetryPayload,
        timestamp: Micros,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp,
            event,
            details: payload,
        });

        id
    }

    /// Records the outcome of a bounded nFAULT wait.
    pub fn record_wait(
        &mut self,
        event: TelemetryEventKind,
        elapsed_us: u32,
        observed: bool,
        timestamp: Micros,
    ) -> EventId {
        self.record(
            event,
            TelemetryPayload::Wait(WaitTelemetry::new(elapsed_us, observed)),
            timestamp,
        )
    }

    /// Records a measured ACK pulse.
    pub fn record_pulse(&mut self, low_us: u32, overrun: bool, timestamp: Micros) -> EventId {
        self.record(
            TelemetryEventKind::AckPulse,
            TelemetryPayload::Pulse(PulseTelemetry::new(low_us, overrun)),
            timestamp,
        )
    }

    /// Records the completion of a handshake pass.
    pub fn record_pass_complete(&mut self, summary: PassTelemetry, timestamp: Micros) -> EventId {
        self.record(
            TelemetryEventKind::HandshakeComplete(summary.outcome),
            TelemetryPayload::Pass(summary),
            timestamp,
        )
    }
}

impl<const CAPACITY: usize> Default for TelemetryRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}
