//! The blocking handshake pass.
//!
//! One invocation is one full pass: force sleep, wake, ready wait, ACK
//! pulse, confirm wait, finalize. The pass runs to completion on the calling
//! context with bounded busy-waits only; there is no cancellation path, since
//! abandoning the protocol half way (wake asserted, ACK never sent) would
//! leave the device in an undefined state. Worst case the pass blocks for
//! [`HandshakeConfig::worst_case_blocking_us`], about 12 ms.

use crate::telemetry::{Micros, PassTelemetry, TelemetryEventKind, TelemetryPayload, TelemetryRecorder};

use super::{
    ACK_PULSE_CEILING_US, FaultLine, HandshakeConfig, HandshakeDiagnostics, HandshakeOutcome,
    HandshakeTrigger, SessionGuard, Timebase, UNOBSERVED_READY_DELAY_MS, WakeLine,
};

/// Drives the wake/ACK protocol against the wired lines.
///
/// Both lines are optional. A missing nFAULT degrades to a best-effort pass;
/// a missing nSLEEP aborts the pass immediately since the protocol is
/// meaningless without it.
pub struct HandshakeEngine<'g, W, F, T> {
    wake: Option<W>,
    fault: Option<F>,
    timebase: T,
    config: HandshakeConfig,
    guard: &'g SessionGuard,
    attempts: u8,
    outcome: HandshakeOutcome,
    diag: HandshakeDiagnostics,
}

impl<'g, W, F, T> HandshakeEngine<'g, W, F, T>
where
    W: WakeLine,
    F: FaultLine,
    T: Timebase,
{
    pub fn new(
        wake: Option<W>,
        fault: Option<F>,
        timebase: T,
        config: HandshakeConfig,
        guard: &'g SessionGuard,
    ) -> Self {
        Self {
            wake,
            fault,
            timebase,
            config,
            guard,
            attempts: 0,
            outcome: HandshakeOutcome::NotRun,
            diag: HandshakeDiagnostics::default(),
        }
    }

    /// Returns `true` once any pass has completed.
    #[must_use]
    pub fn has_run(&self) -> bool {
        self.outcome.has_run()
    }

    /// Result of the most recent pass.
    #[must_use]
    pub fn outcome(&self) -> HandshakeOutcome {
        self.outcome
    }

    /// Snapshot of bookkeeping from the most recent pass.
    #[must_use]
    pub fn diagnostics(&self) -> HandshakeDiagnostics {
        self.diag
    }

    #[must_use]
    pub fn config(&self) -> HandshakeConfig {
        self.config
    }

    /// Number of passes that actually ran.
    #[must_use]
    pub fn attempts(&self) -> u8 {
        self.attempts
    }

    /// Current timestamp from the engine's timebase.
    #[must_use]
    pub fn stamp(&self) -> Micros {
        Micros(self.timebase.now_us())
    }

    /// Read access to the wake line, if wired.
    pub fn wake_line(&self) -> Option<&W> {
        self.wake.as_ref()
    }

    /// Runs one full handshake pass, or coalesces into an in-flight one.
    ///
    /// Re-entrant invocations observe the shared guard and return the last
    /// known outcome without touching the hardware; the attempt counter only
    /// advances for passes that run. Timeouts and verification failures are
    /// reported through the returned outcome, never as errors — the driver
    /// keeps operating either way.
    pub fn run_handshake<const N: usize>(
        &mut self,
        trigger: HandshakeTrigger,
        telemetry: &mut TelemetryRecorder<N>,
    ) -> HandshakeOutcome {
        if !self.guard.try_begin() {
            telemetry.record(
                TelemetryEventKind::HandshakeCoalesced,
                TelemetryPayload::None,
                self.stamp(),
            );
            return self.outcome;
        }

        let outcome = self.run_pass(trigger, telemetry);
        self.outcome = outcome;
        self.guard.finish();
        outcome
    }

    fn run_pass<const N: usize>(
        &mut self,
        trigger: HandshakeTrigger,
        telemetry: &mut TelemetryRecorder<N>,
    ) -> HandshakeOutcome {
        self.attempts = self.attempts.saturating_add(1);
        self.diag = HandshakeDiagnostics {
            attempts: self.attempts,
            ..HandshakeDiagnostics::default()
        };

        let Self {
            wake,
            fault,
            timebase,
            config,
            diag,
            ..
        } = self;
        let config = *config;

        telemetry.record(
            TelemetryEventKind::HandshakeStarted(trigger),
            TelemetryPayload::None,
            Micros(timebase.now_us()),
        );

        let Some(wake) = wake.as_mut() else {
            telemetry.record(
                TelemetryEventKind::WakeLineMissing,
                TelemetryPayload::None,
                Micros(timebase.now_us()),
            );
            diag.outcome = HandshakeOutcome::Unverified;
            telemetry.record_pass_complete(
                PassTelemetry::new(diag.outcome, diag.attempts, 0, 0),
                Micros(timebase.now_us()),
            );
            return diag.outcome;
        };

        // Step 1: force sleep, long enough to be unambiguous against any
        // in-flight pulse.
        wake.set_low();
        timebase.delay_ms(config.sleep_force_ms);
        telemetry.record(
            TelemetryEventKind::SleepForced,
            TelemetryPayload::None,
            Micros(timebase.now_us()),
        );

        // Step 2: wake.
        wake.set_high();
        telemetry.record(
            TelemetryEventKind::WakeAsserted,
            TelemetryPayload::None,
            Micros(timebase.now_us()),
        );

        // Step 3: wait for nFAULT low (ready), if observable.
        if let Some(fault) = fault.as_ref() {
            let (waited, observed) = poll_fault(
                fault,
                timebase,
                config.ready_timeout_us,
                config.poll_step_us,
                true,
            );
            diag.saw_ready = observed;
            diag.ready_wait_us = waited;
            let event = if observed {
                TelemetryEventKind::ReadyObserved
            } else {
                TelemetryEventKind::ReadyTimeout
            };
            telemetry.record_wait(event, waited, observed, Micros(timebase.now_us()));
        } else {
            timebase.delay_ms(UNOBSERVED_READY_DELAY_MS);
        }

        // Step 4: ACK pulse. Interrupts are suppressed for the pulse window;
        // the width is still measured because suppression is best-effort on
        // some hosts.
        let low_us = critical_section::with(|_| {
            wake.set_low();
            let start = timebase.now_us();
            timebase.delay_us(config.ack_pulse_us);
            let low_us = timebase.now_us().wrapping_sub(start);
            wake.set_high();
            low_us
        });
        diag.ack_pulse_low_us = low_us;
        diag.ack_pulse_overrun = low_us >= ACK_PULSE_CEILING_US;
        telemetry.record_pulse(low_us, diag.ack_pulse_overrun, Micros(timebase.now_us()));

        // Step 5: confirm nFAULT releases after the ACK, only meaningful when
        // ready was actually observed.
        if diag.saw_ready
            && let Some(fault) = fault.as_ref()
        {
            let (waited, observed) = poll_fault(
                fault,
                timebase,
                config.confirm_timeout_us,
                config.poll_step_us,
                false,
            );
            diag.saw_ack_clear = observed;
            diag.confirm_wait_us = waited;
            let event = if observed {
                TelemetryEventKind::AckConfirmed
            } else {
                TelemetryEventKind::AckConfirmTimeout
            };
            telemetry.record_wait(event, waited, observed, Micros(timebase.now_us()));
        }

        // Step 6: finalize. The device is never left forced asleep, whatever
        // path got us here.
        wake.set_high();

        diag.outcome = if fault.is_none() || !diag.saw_ready {
            HandshakeOutcome::Unverified
        } else if diag.saw_ack_clear {
            HandshakeOutcome::VerifiedOk
        } else {
            HandshakeOutcome::VerifiedFail
        };

        telemetry.record_pass_complete(
            PassTelemetry::new(
                diag.outcome,
                diag.attempts,
                diag.ready_wait_us,
                diag.confirm_wait_us,
            ),
            Micros(timebase.now_us()),
        );

        diag.outcome
    }
}

/// Polls nFAULT until it reaches the requested level or the timeout elapses.
///
/// Returns the elapsed wait and whether the level was observed. Elapsed math
/// uses `wrapping_sub` so the loop stays correct across `u32` wraparound.
fn poll_fault<F, T>(
    fault: &F,
    timebase: &mut T,
    timeout_us: u32,
    step_us: u32,
    want_low: bool,
) -> (u32, bool)
where
    F: FaultLine,
    T: Timebase,
{
    let start = timebase.now_us();
    loop {
        let at_level = if want_low {
            fault.is_low()
        } else {
            !fault.is_low()
        };
        let waited = timebase.now_us().wrapping_sub(start);
        if at_level {
            return (waited, true);
        }
        if waited >= timeout_us {
            return (waited, false);
        }
        timebase.delay_us(step_us);
    }
}
