use drv8243_core::handshake::HandshakeTrigger;
use drv8243_core::telemetry::TelemetryRecorder;
use embassy_futures::select::{Either, select};
use embassy_time::{Duration, Timer};

use crate::hw::BoardDriver;
use crate::output::{DEFER_HANDSHAKE_MS, LevelReceiver};
use crate::telemetry::TelemetryMirror;

#[embassy_executor::task]
pub async fn run(mut driver: BoardDriver, commands: LevelReceiver<'static>) -> ! {
    let mut telemetry: TelemetryRecorder = TelemetryRecorder::new();
    let mut mirror = TelemetryMirror::new();

    // The first pass is deferred past boot so it cannot collide with rail
    // ramp-up. A level command arriving earlier wins the race and runs the
    // pass itself.
    match select(
        Timer::after(Duration::from_millis(DEFER_HANDSHAKE_MS)),
        commands.receive(),
    )
    .await
    {
        Either::First(()) => {
            driver.run_handshake(HandshakeTrigger::Deferred, &mut telemetry);
        }
        Either::Second(command) => {
            driver.write_state(command.level(), &mut telemetry);
        }
    }
    mirror.drain(&telemetry);

    loop {
        let command = commands.receive().await;
        driver.write_state(command.level(), &mut telemetry);
        mirror.drain(&telemetry);
    }
}
