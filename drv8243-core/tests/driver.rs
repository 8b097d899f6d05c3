// Levels compared here are propagated, not recomputed; exact equality is
// intended.
#![allow(clippy::float_cmp)]

mod common;

use std::cell::RefCell;
use std::rc::Rc;

use common::{DeviceProfile, RecordingSink, SimFault, SimHandle, SimTimebase, SimWake};
use drv8243_core::driver::{DirectionLine, Drv8243Driver};
use drv8243_core::handshake::{
    HandshakeConfig, HandshakeEngine, HandshakeOutcome, HandshakeTrigger, SessionGuard,
};
use drv8243_core::level::LevelCurve;
use drv8243_core::telemetry::{TelemetryEventKind, TelemetryRecorder};

type SimDriver<'g> = Drv8243Driver<'g, SimWake, SimFault, SimTimebase, RecordingSink>;

fn driver_for<'g>(sim: &SimHandle, sink: &RecordingSink, guard: &'g SessionGuard) -> SimDriver<'g> {
    let engine = HandshakeEngine::new(
        Some(sim.wake()),
        Some(sim.fault()),
        sim.timebase(),
        HandshakeConfig::new(),
        guard,
    );
    Drv8243Driver::new(engine, LevelCurve::default(), sink.clone())
}

#[test]
fn first_write_runs_handshake_with_output_forced_off() {
    let sim = SimHandle::new(DeviceProfile::Nominal);
    let guard = SessionGuard::new();
    let sink = RecordingSink::new();
    let mut driver = driver_for(&sim, &sink, &guard);
    let mut telemetry: TelemetryRecorder = TelemetryRecorder::new();

    assert!(!driver.has_run());
    driver.write_state(0.5, &mut telemetry);

    assert!(driver.has_run());
    assert_eq!(driver.engine().outcome(), HandshakeOutcome::VerifiedOk);

    let levels = sink.levels();
    // Output went to zero before the pass, then to the shaped level after.
    assert_eq!(levels.first().copied(), Some(0.0));
    let expected = driver.curve().map(0.5).level();
    assert_eq!(levels.last().copied(), Some(expected));
}

#[test]
fn later_writes_skip_the_handshake() {
    let sim = SimHandle::new(DeviceProfile::Nominal);
    let guard = SessionGuard::new();
    let sink = RecordingSink::new();
    let mut driver = driver_for(&sim, &sink, &guard);
    let mut telemetry: TelemetryRecorder = TelemetryRecorder::new();

    driver.write_state(0.5, &mut telemetry);
    assert_eq!(driver.engine().attempts(), 1);

    let writes_before = sim.wake_writes();
    driver.write_state(0.8, &mut telemetry);
    assert_eq!(driver.engine().attempts(), 1);
    assert_eq!(sim.wake_writes(), writes_before);

    let expected = driver.curve().map(0.8).level();
    assert_eq!(sink.last(), Some(expected));
}

#[test]
fn off_command_disables_output_and_records_it() {
    let sim = SimHandle::new(DeviceProfile::Nominal);
    let guard = SessionGuard::new();
    let sink = RecordingSink::new();
    let mut driver = driver_for(&sim, &sink, &guard);
    let mut telemetry: TelemetryRecorder = TelemetryRecorder::new();

    driver.write_state(0.5, &mut telemetry);
    driver.write_state(0.0, &mut telemetry);

    assert_eq!(sink.last(), Some(0.0));
    assert_eq!(
        telemetry.latest().unwrap().event,
        TelemetryEventKind::OutputDisabled
    );
}

#[test]
fn explicit_handshake_forces_output_off() {
    let sim = SimHandle::new(DeviceProfile::Nominal);
    let guard = SessionGuard::new();
    let sink = RecordingSink::new();
    let mut driver = driver_for(&sim, &sink, &guard);
    let mut telemetry: TelemetryRecorder = TelemetryRecorder::new();

    let outcome = driver.run_handshake(HandshakeTrigger::HostRequest, &mut telemetry);

    assert_eq!(outcome, HandshakeOutcome::VerifiedOk);
    // Zero is the only level the sink ever saw; no drive until commanded.
    assert_eq!(sink.levels(), vec![0.0]);
}

#[test]
fn verification_failure_does_not_block_output() {
    let sim = SimHandle::new(DeviceProfile::StuckLow);
    let guard = SessionGuard::new();
    let sink = RecordingSink::new();
    let mut driver = driver_for(&sim, &sink, &guard);
    let mut telemetry: TelemetryRecorder = TelemetryRecorder::new();

    driver.write_state(0.5, &mut telemetry);

    assert_eq!(driver.engine().outcome(), HandshakeOutcome::VerifiedFail);
    let expected = driver.curve().map(0.5).level();
    assert_eq!(sink.last(), Some(expected));
}

#[derive(Clone, Default)]
struct DirectionProbe(Rc<RefCell<Option<bool>>>);

impl DirectionLine for DirectionProbe {
    fn drive(&mut self, high: bool) {
        *self.0.borrow_mut() = Some(high);
    }
}

#[test]
fn direction_pin_is_driven_at_construction() {
    let sim = SimHandle::new(DeviceProfile::Nominal);
    let guard = SessionGuard::new();
    let sink = RecordingSink::new();
    let engine = HandshakeEngine::new(
        Some(sim.wake()),
        Some(sim.fault()),
        sim.timebase(),
        HandshakeConfig::new(),
        &guard,
    );
    let probe = DirectionProbe::default();

    let _driver: Drv8243Driver<'_, _, _, _, _, DirectionProbe> =
        Drv8243Driver::new(engine, LevelCurve::default(), sink)
            .with_direction(probe.clone(), true);

    assert_eq!(*probe.0.borrow(), Some(true));
}
