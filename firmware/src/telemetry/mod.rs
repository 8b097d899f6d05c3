//! defmt / console mirroring for handshake telemetry.
//!
//! The engine records events into the in-memory ring while a pass is in
//! flight; nothing is formatted until the pass has finished. The mirror
//! drains records it has not logged yet and emits one line per record,
//! through defmt on target and stdout on the host.

#![cfg_attr(not(target_os = "none"), allow(dead_code))]

use drv8243_core::telemetry::{
    EventId, TelemetryEventKind, TelemetryPayload, TelemetryRecord, TelemetryRecorder,
};

/// Tracks which telemetry records have already been logged.
#[derive(Default)]
pub struct TelemetryMirror {
    last_logged: Option<EventId>,
}

impl TelemetryMirror {
    #[must_use]
    pub const fn new() -> Self {
        Self { last_logged: None }
    }

    /// Logs every record newer than the last drain. Returns how many records
    /// were emitted.
    pub fn drain<const N: usize>(&mut self, recorder: &TelemetryRecorder<N>) -> usize {
        let mut emitted = 0;
        for record in recorder.oldest_first() {
            if self.last_logged.is_none_or(|seen| record.id > seen) {
                log_record(record);
                self.last_logged = Some(record.id);
                emitted += 1;
            }
        }
        emitted
    }
}

/// Mirrors one telemetry record to the active log sink.
pub fn log_record(record: &TelemetryRecord) {
    let label = event_label(record.event);
    let timestamp_us = record.timestamp.as_u32();

    match record.details {
        TelemetryPayload::None => emit_event(label, timestamp_us),
        TelemetryPayload::Wait(wait) => {
            emit_wait(label, timestamp_us, wait.elapsed_us, wait.observed);
        }
        TelemetryPayload::Pulse(pulse) => {
            emit_pulse(label, timestamp_us, pulse.low_us, pulse.overrun);
        }
        TelemetryPayload::Pass(pass) => emit_pass(
            pass.outcome.label(),
            timestamp_us,
            pass.attempt,
            pass.ready_wait_us,
            pass.confirm_wait_us,
        ),
    }
}

const fn event_label(event: TelemetryEventKind) -> &'static str {
    match event {
        TelemetryEventKind::SleepForced => "sleep-forced",
        TelemetryEventKind::WakeAsserted => "wake-asserted",
        TelemetryEventKind::ReadyObserved => "ready-observed",
        TelemetryEventKind::ReadyTimeout => "ready-timeout",
        TelemetryEventKind::AckPulse => "ack-pulse",
        TelemetryEventKind::AckConfirmed => "ack-confirmed",
        TelemetryEventKind::AckConfirmTimeout => "ack-confirm-timeout",
        TelemetryEventKind::WakeLineMissing => "wake-line-missing",
        TelemetryEventKind::HandshakeCoalesced => "handshake-coalesced",
        TelemetryEventKind::OutputDisabled => "output-disabled",
        TelemetryEventKind::HandshakeStarted(_) => "handshake-started",
        TelemetryEventKind::HandshakeComplete(_) => "handshake-complete",
        TelemetryEventKind::Custom(_) => "custom",
    }
}

#[cfg(target_os = "none")]
fn emit_event(label: &'static str, timestamp_us: u32) {
    defmt::info!("telemetry:drv8243 {} t={}us", label, timestamp_us);
}

#[cfg(not(target_os = "none"))]
fn emit_event(label: &'static str, timestamp_us: u32) {
    println!("telemetry:drv8243 {label} t={timestamp_us}us");
}

#[cfg(target_os = "none")]
fn emit_wait(label: &'static str, timestamp_us: u32, elapsed_us: u32, observed: bool) {
    defmt::info!(
        "telemetry:drv8243 {} t={}us waited={}us observed={}",
        label,
        timestamp_us,
        elapsed_us,
        observed
    );
}

#[cfg(not(target_os = "none"))]
fn emit_wait(label: &'static str, timestamp_us: u32, elapsed_us: u32, observed: bool) {
    println!(
        "telemetry:drv8243 {label} t={timestamp_us}us waited={elapsed_us}us observed={observed}"
    );
}

#[cfg(target_os = "none")]
fn emit_pulse(label: &'static str, timestamp_us: u32, low_us: u32, overrun: bool) {
    if overrun {
        defmt::warn!(
            "telemetry:drv8243 {} t={}us low={}us OVERRUN",
            label,
            timestamp_us,
            low_us
        );
    } else {
        defmt::info!(
            "telemetry:drv8243 {} t={}us low={}us",
            label,
            timestamp_us,
            low_us
        );
    }
}

#[cfg(not(target_os = "none"))]
fn emit_pulse(label: &'static str, timestamp_us: u32, low_us: u32, overrun: bool) {
    if overrun {
        println!("telemetry:drv8243 {label} t={timestamp_us}us low={low_us}us OVERRUN");
    } else {
        println!("telemetry:drv8243 {label} t={timestamp_us}us low={low_us}us");
    }
}

#[cfg(target_os = "none")]
fn emit_pass(
    outcome: &'static str,
    timestamp_us: u32,
    attempt: u8,
    ready_wait_us: u32,
    confirm_wait_us: u32,
) {
    defmt::info!(
        "telemetry:drv8243 pass {} t={}us attempt={} ready={}us confirm={}us",
        outcome,
        timestamp_us,
        attempt,
        ready_wait_us,
        confirm_wait_us
    );
}

#[cfg(not(target_os = "none"))]
fn emit_pass(
    outcome: &'static str,
    timestamp_us: u32,
    attempt: u8,
    ready_wait_us: u32,
    confirm_wait_us: u32,
) {
    println!(
        "telemetry:drv8243 pass {outcome} t={timestamp_us}us attempt={attempt} ready={ready_wait_us}us confirm={confirm_wait_us}us"
    );
}
