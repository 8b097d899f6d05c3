use embassy_stm32 as hal;
use embassy_stm32::Peri;
use embassy_stm32::usart::{BufferedUart, Config as UartConfig, DataBits, Parity, StopBits};
use embassy_time::{Duration, Timer};
use embedded_io_async::Read;

use crate::link::LineAccumulator;
use crate::output::LevelSender;

const HOST_UART_BAUD: u32 = 115_200;
const UART_BUFFER_SIZE: usize = 64;

static mut UART_TX_BUFFER: [u8; UART_BUFFER_SIZE] = [0; UART_BUFFER_SIZE];
static mut UART_RX_BUFFER: [u8; UART_BUFFER_SIZE] = [0; UART_BUFFER_SIZE];

embassy_stm32::bind_interrupts!(struct UartIrqs {
    USART1 => embassy_stm32::usart::BufferedInterruptHandler<hal::peripherals::USART1>;
});

#[embassy_executor::task]
pub async fn run(
    commands: LevelSender<'static>,
    usart: Peri<'static, hal::peripherals::USART1>,
    tx_pin: Peri<'static, hal::peripherals::PB6>,
    rx_pin: Peri<'static, hal::peripherals::PB7>,
) -> ! {
    let mut config = UartConfig::default();
    config.baudrate = HOST_UART_BAUD;
    config.data_bits = DataBits::DataBits8;
    config.stop_bits = StopBits::STOP1;
    config.parity = Parity::ParityNone;

    let uart = unsafe {
        BufferedUart::new(
            usart,
            rx_pin,
            tx_pin,
            &mut UART_TX_BUFFER,
            &mut UART_RX_BUFFER,
            UartIrqs,
            config,
        )
        .expect("failed to initialize host link UART")
    };
    let (_uart_tx, mut uart_rx) = uart.split();

    let mut lines = LineAccumulator::new();
    let mut chunk = [0u8; 16];

    loop {
        match uart_rx.read(&mut chunk).await {
            Ok(count) => {
                for &byte in &chunk[..count] {
                    let Some(parsed) = lines.push(byte) else {
                        continue;
                    };
                    match parsed {
                        Ok(command) => {
                            if commands.try_send(command).is_err() {
                                defmt::warn!("link: level queue full, command dropped");
                            }
                        }
                        Err(err) => defmt::warn!("link: {}", err.label()),
                    }
                }
            }
            Err(_) => {
                defmt::warn!("link: UART read error");
                Timer::after(Duration::from_millis(5)).await;
            }
        }
    }
}
