//! Device front combining the handshake engine with the level mapper.
//!
//! The driver owns the engine, the transfer curve, and the actuator sink.
//! Level commands only reach the PWM after a handshake pass has run; the
//! first command triggers a synchronous pass if the deferred one has not
//! fired yet. Verification failures never block output — the device may
//! still function, and refusing to drive it would let a miswired fault line
//! brick the feature.

use crate::handshake::{
    FaultLine, HandshakeDiagnostics, HandshakeEngine, HandshakeOutcome, HandshakeTrigger,
    Timebase, WakeLine,
};
use crate::level::{LevelCurve, MappedLevel};
use crate::telemetry::{TelemetryEventKind, TelemetryPayload, TelemetryRecorder};

/// Actuator consuming mapped duty values, typically a PWM channel.
pub trait LevelSink {
    fn set_level(&mut self, level: f32);
}

/// Static direction select (PH) for the H-bridge.
pub trait DirectionLine {
    fn drive(&mut self, high: bool);
}

/// Placeholder for boards without a PH pin.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoDirection;

impl DirectionLine for NoDirection {
    fn drive(&mut self, _: bool) {}
}

/// DRV8243 output driver.
pub struct Drv8243Driver<'g, W, F, T, S, D = NoDirection> {
    engine: HandshakeEngine<'g, W, F, T>,
    curve: LevelCurve,
    sink: S,
    direction: Option<D>,
}

impl<'g, W, F, T, S, D> Drv8243Driver<'g, W, F, T, S, D>
where
    W: WakeLine,
    F: FaultLine,
    T: Timebase,
    S: LevelSink,
    D: DirectionLine,
{
    pub fn new(engine: HandshakeEngine<'g, W, F, T>, curve: LevelCurve, sink: S) -> Self {
        Self {
            engine,
            curve,
            sink,
            direction: None,
        }
    }

    /// Wires the PH pin and drives it to its fixed level immediately.
    #[must_use]
    pub fn with_direction(mut self, mut line: D, high: bool) -> Self {
        line.drive(high);
        self.direction = Some(line);
        self
    }

    /// Returns `true` once any handshake pass has completed.
    #[must_use]
    pub fn has_run(&self) -> bool {
        self.engine.has_run()
    }

    #[must_use]
    pub fn curve(&self) -> LevelCurve {
        self.curve
    }

    /// Read access to the engine, mainly for reporting.
    pub fn engine(&self) -> &HandshakeEngine<'g, W, F, T> {
        &self.engine
    }

    /// Snapshot of the last pass for telemetry surfaces.
    #[must_use]
    pub fn diagnostics(&self) -> HandshakeDiagnostics {
        self.engine.diagnostics()
    }

    /// Runs a handshake pass, forcing the actuator off first so the pass is
    /// not visible as flicker. Output stays at zero until the caller issues
    /// a new level command.
    pub fn run_handshake<const N: usize>(
        &mut self,
        trigger: HandshakeTrigger,
        telemetry: &mut TelemetryRecorder<N>,
    ) -> HandshakeOutcome {
        self.sink.set_level(0.0);
        self.engine.run_handshake(trigger, telemetry)
    }

    /// Applies a normalized level command.
    ///
    /// The first command runs a synchronous handshake pass if the deferred
    /// one has not fired yet, so the first brightness change is
    /// deterministic. The command is then shaped by the curve and forwarded
    /// to the sink; off-threshold commands disable the output entirely.
    pub fn write_state<const N: usize>(&mut self, command: f32, telemetry: &mut TelemetryRecorder<N>) {
        if !self.engine.has_run() {
            self.sink.set_level(0.0);
            self.engine
                .run_handshake(HandshakeTrigger::FirstWrite, telemetry);
        }

        match self.curve.map(command) {
            MappedLevel::Off => {
                telemetry.record(
                    TelemetryEventKind::OutputDisabled,
                    TelemetryPayload::None,
                    self.engine.stamp(),
                );
                self.sink.set_level(0.0);
            }
            MappedLevel::Drive(level) => self.sink.set_level(level),
        }
    }
}
