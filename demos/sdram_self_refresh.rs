//! SDRAM self-refresh across deep-sleep.
//!
//! Writes a test pattern to SDRAM device 0, puts the device into
//! self-refresh and the MCU into deep-sleep. The user key (PB14) wakes the
//! core through an EXTI event; the clock tree is restarted, the SDRAM
//! returned to normal mode and the pattern verified.
//!
//! LED2 (PD5) while asleep, LED1 (PD4) on success, LED3 (PG3) on failure.

#![no_std]
#![no_main]

use cortex_m_rt::entry;
use embedded_hal::delay::DelayNs;
use gd32f4xx_hal as hal;
use hal::delay::Delay;
use hal::exmc::{self, fill_buffer, Device, Sdram};
use hal::exti::{Edge, ExtiInput};
use hal::gpio::{Level, Output, Pull, Speed};
use hal::pmu::{Ldo, Pmu, WakeOn};
use hal::{print, println};

const BUFFER_SIZE: usize = 0x400;
const WRITE_READ_ADDR: usize = 0x0000;

fn halt(led: &mut Output<'_>) -> ! {
    led.set_high();
    loop {}
}

#[entry]
fn main() -> ! {
    let mut cp = cortex_m::Peripherals::take().unwrap();
    let config = hal::Config::default();
    let rcc_config = config.rcc;
    let p = hal::init(config);
    let mut delay = Delay;

    let mut led1 = Output::new(p.PD4, Level::Low, Speed::High);
    let mut led2 = Output::new(p.PD5, Level::Low, Speed::High);
    let mut led3 = Output::new(p.PG3, Level::Low, Speed::High);

    let mut pmu = Pmu::new(p.PMU);
    let mut key = ExtiInput::new(p.PB14, Pull::Up, Edge::Falling);

    let mut sdram = Sdram::new(p.EXMC, Device::Device0, exmc::Config::default());
    if let Err(e) = sdram.init(&mut delay) {
        println!("\n\nSDRAM initialize fail! {:?}", e);
        halt(&mut led3);
    }
    println!("\n\nSDRAM initialized!");
    delay.delay_ms(1000);

    let mut txbuffer = [0u8; BUFFER_SIZE];
    fill_buffer(&mut txbuffer, 0);
    let written = sdram.window().and_then(|mut window| window.write_u8(WRITE_READ_ADDR, &txbuffer));
    if let Err(e) = written {
        println!("\nSDRAM write failed: {:?}", e);
        halt(&mut led3);
    }
    println!("\nSDRAM write data completed!");
    delay.delay_ms(1000);

    if let Err(e) = sdram.enter_self_refresh() {
        println!("\nSDRAM self-refresh entry failed: {:?}", e);
        halt(&mut led3);
    }

    println!("\nEnter deepsleep mode!");
    delay.delay_ms(1000);
    println!("\nPress the user key to wakeup the MCU!");
    delay.delay_ms(1000);

    key.clear_pending();
    led2.set_high();
    pmu.deep_sleep(&mut cp.SCB, Ldo::Normal, WakeOn::Event);
    led2.set_low();
    key.clear_pending();

    // Deep-sleep leaves the core on IRC16M
    if let Err(e) = unsafe { hal::rcc::init(rcc_config) } {
        // Console baud rate follows the fallback clocks
        hal::debug::DebugPrint::enable();
        println!("\nClock reconfiguration failed: {:?}", e);
        halt(&mut led3);
    }

    println!("\nUser key has been pressed!");
    delay.delay_ms(1000);

    if let Err(e) = sdram.exit_self_refresh() {
        println!("\nSDRAM self-refresh exit failed: {:?}", e);
        halt(&mut led3);
    }

    let mut rxbuffer = [0u8; BUFFER_SIZE];
    let read = sdram.window().and_then(|window| window.read_u8(WRITE_READ_ADDR, &mut rxbuffer));
    if let Err(e) = read {
        println!("\nSDRAM read failed: {:?}", e);
        halt(&mut led3);
    }
    println!("\nSDRAM read data completed!");
    delay.delay_ms(1000);

    println!("\nCheck the data!");
    delay.delay_ms(1000);

    if let Some(i) = txbuffer.iter().zip(rxbuffer.iter()).position(|(t, r)| t != r) {
        println!("\nSDRAM test failed! first mismatch at {:#x}", i);
        halt(&mut led3);
    }

    println!("\nSDRAM test successed!");
    delay.delay_ms(1000);
    println!("\nThe data is:");
    delay.delay_ms(1000);
    for (i, b) in rxbuffer.iter().enumerate() {
        print!("{:6x}", b);
        if (i + 1) % 16 == 0 {
            println!();
        }
    }
    led1.set_high();

    loop {}
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    println!("PANIC: {:?}", info);
    loop {}
}
