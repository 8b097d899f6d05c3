use cortex_m::interrupt;
use cortex_m::register::primask;
use critical_section::{self, RawRestoreState};
use defmt_rtt as _;
use drv8243_core::handshake::{HandshakeConfig, SessionGuard};
use drv8243_core::level::LevelCurve;
use embassy_executor::Spawner;
use embassy_stm32 as hal;
use embassy_stm32::gpio::{Input, Level, Output, Pull, Speed};
use embassy_sync::channel::Channel;

use crate::hw::{self, BoardEngine};
use crate::output::LevelQueue;

mod link_task;
mod output_task;

critical_section::set_impl!(InterruptCriticalSection);

struct InterruptCriticalSection;

unsafe impl critical_section::Impl for InterruptCriticalSection {
    unsafe fn acquire() -> RawRestoreState {
        let primask = primask::read();
        interrupt::disable();
        primask.is_active()
    }

    unsafe fn release(restore_state: RawRestoreState) {
        if restore_state {
            unsafe {
                interrupt::enable();
            }
        }
    }
}

pub(super) static LEVEL_QUEUE: LevelQueue = Channel::new();
static SESSION_GUARD: SessionGuard = SessionGuard::new();

#[embassy_executor::main]
pub async fn main(spawner: Spawner) {
    let config = hal::Config::default();
    let hal::Peripherals {
        PA2,
        PA3,
        PA4,
        PA6,
        PB6,
        PB7,
        TIM3,
        USART1,
        ..
    } = hal::init(config);

    // nSLEEP rests high; the engine drops it only during sleep-force and the
    // ACK pulse.
    let wake = hw::WakePin::new(Output::new(PA2, Level::High, Speed::Low));
    let fault = hw::FaultPin::new(Input::new(PA3, Pull::Up));
    // PH rests high: forward by default.
    let direction = hw::DirectionPin::new(Output::new(PA4, Level::High, Speed::Low));
    let sink = hw::PwmSink::new(TIM3, PA6);

    let engine = BoardEngine::new(
        Some(wake),
        Some(fault),
        hw::McuTimebase,
        HandshakeConfig::new(),
        &SESSION_GUARD,
    );
    let driver = hw::BoardDriver::new(engine, LevelCurve::default(), sink)
        .with_direction(direction, true);

    spawner
        .spawn(output_task::run(driver, LEVEL_QUEUE.receiver()))
        .expect("failed to spawn output task");
    spawner
        .spawn(link_task::run(LEVEL_QUEUE.sender(), USART1, PB6, PB7))
        .expect("failed to spawn link task");

    core::future::pending::<()>().await;
}
