//! Key polling on the GD32F470I EVAL board.
//!
//! Pressing the tamper key (PC13, active low) toggles LED2 (PE3). The key
//! is sampled again after 100ms to filter bounce.

#![no_std]
#![no_main]

use cortex_m_rt::entry;
use embedded_hal::delay::DelayNs;
use gd32f4xx_hal as hal;
use hal::delay::Delay;
use hal::gpio::{Input, Level, Output, Pull, Speed};
use hal::println;

#[entry]
fn main() -> ! {
    let p = hal::init(Default::default());
    let mut delay = Delay;

    println!("\n=== GD32F4xx Key Polling ===\n");

    let mut led2 = Output::new(p.PE3, Level::Low, Speed::High);
    let key = Input::new(p.PC13, Pull::None);

    loop {
        if key.is_low() {
            delay.delay_ms(100);
            if key.is_low() {
                led2.toggle();
                println!("key pressed, LED2 {}", if led2.is_set_high() { "on" } else { "off" });
            }
        }
    }
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    println!("PANIC: {:?}", info);
    loop {}
}
