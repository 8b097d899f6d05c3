mod common;

use common::{DeviceProfile, SimFault, SimHandle, SimTimebase, SimWake};
use drv8243_core::handshake::{
    ACK_PULSE_US, HandshakeConfig, HandshakeEngine, HandshakeOutcome, HandshakeTrigger,
    POLL_STEP_US, SessionGuard,
};
use drv8243_core::telemetry::{TelemetryEventKind, TelemetryPayload, TelemetryRecorder};

type SimEngine<'g> = HandshakeEngine<'g, SimWake, SimFault, SimTimebase>;

fn engine_with<'g>(sim: &SimHandle, config: HandshakeConfig, guard: &'g SessionGuard) -> SimEngine<'g> {
    HandshakeEngine::new(
        Some(sim.wake()),
        Some(sim.fault()),
        sim.timebase(),
        config,
        guard,
    )
}

#[test]
fn nominal_pulse_measures_configured_width() {
    let sim = SimHandle::new(DeviceProfile::Nominal);
    let guard = SessionGuard::new();
    let mut engine = engine_with(&sim, HandshakeConfig::new(), &guard);
    let mut telemetry: TelemetryRecorder = TelemetryRecorder::new();

    engine.run_handshake(HandshakeTrigger::HostRequest, &mut telemetry);

    let diag = engine.diagnostics();
    assert_eq!(diag.ack_pulse_low_us, ACK_PULSE_US);
    assert!(!diag.ack_pulse_overrun);

    let pulse = telemetry
        .oldest_first()
        .find_map(|record| match (record.event, record.details) {
            (TelemetryEventKind::AckPulse, TelemetryPayload::Pulse(pulse)) => Some(pulse),
            _ => None,
        })
        .expect("pulse telemetry recorded");
    assert_eq!(pulse.low_us, ACK_PULSE_US);
    assert!(!pulse.overrun);
}

#[test]
fn custom_pulse_width_is_honored() {
    let sim = SimHandle::new(DeviceProfile::Nominal);
    let guard = SessionGuard::new();
    let config = HandshakeConfig::new().with_ack_pulse(28);
    let mut engine = engine_with(&sim, config, &guard);
    let mut telemetry: TelemetryRecorder = TelemetryRecorder::new();

    engine.run_handshake(HandshakeTrigger::HostRequest, &mut telemetry);
    assert_eq!(engine.diagnostics().ack_pulse_low_us, 28);
}

#[test]
fn overshooting_host_flags_pulse_overrun() {
    let sim = SimHandle::new(DeviceProfile::Nominal);
    let guard = SessionGuard::new();
    let mut engine = engine_with(&sim, HandshakeConfig::new(), &guard);
    let mut telemetry: TelemetryRecorder = TelemetryRecorder::new();

    // Every delay silently runs 30 µs long, pushing the 22 µs pulse past the
    // 40 µs ceiling.
    sim.set_delay_overshoot(30);
    let outcome = engine.run_handshake(HandshakeTrigger::HostRequest, &mut telemetry);

    let diag = engine.diagnostics();
    assert_eq!(diag.ack_pulse_low_us, ACK_PULSE_US + 30);
    assert!(diag.ack_pulse_overrun);
    // The pass still runs to completion and parks nSLEEP high.
    assert!(outcome.has_run());
    assert!(sim.wake_is_high());
}

#[test]
fn pass_blocking_time_stays_within_worst_case() {
    for profile in [
        DeviceProfile::Nominal,
        DeviceProfile::NeverReady,
        DeviceProfile::StuckLow,
    ] {
        let sim = SimHandle::new(profile);
        let guard = SessionGuard::new();
        let config = HandshakeConfig::new();
        let mut engine = engine_with(&sim, config, &guard);
        let mut telemetry: TelemetryRecorder = TelemetryRecorder::new();

        let before = sim.now_us();
        engine.run_handshake(HandshakeTrigger::HostRequest, &mut telemetry);
        let elapsed = sim.now_us() - before;

        // Allow one polling step of slop per bounded wait.
        let bound = u64::from(config.worst_case_blocking_us() + 2 * POLL_STEP_US);
        assert!(elapsed <= bound, "{profile:?} pass blocked for {elapsed} µs");
    }
}

#[test]
fn elapsed_math_survives_clock_wraparound() {
    // Start the 32-bit microsecond counter just shy of wrapping so it rolls
    // over in the middle of the ready wait.
    let sim = SimHandle::with_start(DeviceProfile::Nominal, u64::from(u32::MAX) - 2_500);
    let guard = SessionGuard::new();
    let mut engine = engine_with(&sim, HandshakeConfig::new(), &guard);
    let mut telemetry: TelemetryRecorder = TelemetryRecorder::new();

    let outcome = engine.run_handshake(HandshakeTrigger::HostRequest, &mut telemetry);

    assert_eq!(outcome, HandshakeOutcome::VerifiedOk);
    let diag = engine.diagnostics();
    assert!((common::READY_DELAY_US..common::READY_DELAY_US + 100).contains(&diag.ready_wait_us));
    assert!((common::CLEAR_DELAY_US..common::CLEAR_DELAY_US + 100).contains(&diag.confirm_wait_us));
    assert_eq!(diag.ack_pulse_low_us, ACK_PULSE_US);
}
