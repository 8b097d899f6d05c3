//! Pin and timer adapters binding the portable driver to the board.
//!
//! Pin map: PA2 drives nSLEEP push-pull, PA3 reads the open-drain nFAULT
//! with the internal pull-up, PA4 drives PH (rests high, forward), TIM3
//! channel 1 on PA6 feeds the IN1 duty input, and USART1 on PB6/PB7
//! carries the host link.

use drv8243_core::driver::{DirectionLine, Drv8243Driver, LevelSink};
use drv8243_core::handshake::{FaultLine, HandshakeEngine, Timebase, WakeLine};
use embassy_stm32::gpio::{Input, Output, OutputType};
use embassy_stm32::peripherals::{PA6, TIM3};
use embassy_stm32::time::khz;
use embassy_stm32::timer::simple_pwm::{PwmPin, SimplePwm};
use embassy_time::{Duration, Instant, block_for};

/// nSLEEP output. Readback comes from the output data register, not the pad.
pub struct WakePin {
    pin: Output<'static>,
}

impl WakePin {
    pub fn new(pin: Output<'static>) -> Self {
        Self { pin }
    }
}

impl WakeLine for WakePin {
    fn set_high(&mut self) {
        self.pin.set_high();
    }

    fn set_low(&mut self) {
        self.pin.set_low();
    }

    fn is_set_high(&self) -> bool {
        self.pin.is_set_high()
    }
}

/// nFAULT input with the internal pull-up enabled.
pub struct FaultPin {
    pin: Input<'static>,
}

impl FaultPin {
    pub fn new(pin: Input<'static>) -> Self {
        Self { pin }
    }
}

impl FaultLine for FaultPin {
    fn is_low(&self) -> bool {
        self.pin.is_low()
    }
}

/// PH direction select, driven once at startup.
pub struct DirectionPin {
    pin: Output<'static>,
}

impl DirectionPin {
    pub fn new(pin: Output<'static>) -> Self {
        Self { pin }
    }
}

impl DirectionLine for DirectionPin {
    fn drive(&mut self, high: bool) {
        if high {
            self.pin.set_high();
        } else {
            self.pin.set_low();
        }
    }
}

/// Microsecond timebase over the Embassy monotonic.
pub struct McuTimebase;

impl Timebase for McuTimebase {
    // The protocol only needs 32 bits of wraparound-safe microseconds.
    #[allow(clippy::cast_possible_truncation)]
    fn now_us(&self) -> u32 {
        Instant::now().as_micros() as u32
    }

    fn delay_us(&mut self, us: u32) {
        block_for(Duration::from_micros(u64::from(us)));
    }
}

/// TIM3 channel 1 PWM sink for the IN1 duty input.
pub struct PwmSink {
    pwm: SimplePwm<'static, TIM3>,
}

impl PwmSink {
    /// Configures the PWM at 20 kHz, enabled and parked at zero duty.
    pub fn new(tim: TIM3, pin: PA6) -> Self {
        let mut pwm = SimplePwm::new(
            tim,
            Some(PwmPin::new_ch1(pin, OutputType::PushPull)),
            None,
            None,
            None,
            khz(20),
            Default::default(),
        );
        pwm.ch1().enable();
        pwm.ch1().set_duty_cycle_fully_off();
        Self { pwm }
    }
}

impl LevelSink for PwmSink {
    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
    fn set_level(&mut self, level: f32) {
        let max = self.pwm.max_duty_cycle();
        let duty = (f32::from(max) * level.clamp(0.0, 1.0)) as u16;
        self.pwm.ch1().set_duty_cycle(duty);
    }
}

/// Fully wired driver type used by the output task.
pub type BoardDriver =
    Drv8243Driver<'static, WakePin, FaultPin, McuTimebase, PwmSink, DirectionPin>;

/// Engine type backing [`BoardDriver`].
pub type BoardEngine = HandshakeEngine<'static, WakePin, FaultPin, McuTimebase>;
