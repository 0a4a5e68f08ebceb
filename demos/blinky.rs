//! Running LEDs on the GD32F470I EVAL board.
//!
//! LED1 (PE2), LED2 (PE3) and LED3 (PF10) light up in turn, one second
//! each.

#![no_std]
#![no_main]

use cortex_m_rt::entry;
use embedded_hal::delay::DelayNs;
use gd32f4xx_hal as hal;
use hal::delay::Delay;
use hal::gpio::{Level, Output, Speed};
use hal::println;

#[entry]
fn main() -> ! {
    let p = hal::init(Default::default());
    let mut delay = Delay;

    println!("\n=== GD32F4xx Running LED ===\n");

    let mut leds = [
        Output::new(p.PE2, Level::Low, Speed::High),
        Output::new(p.PE3, Level::Low, Speed::High),
        Output::new(p.PF10, Level::Low, Speed::High),
    ];

    let mut current = 0;
    loop {
        let previous = (current + leds.len() - 1) % leds.len();
        leds[current].set_high();
        leds[previous].set_low();
        delay.delay_ms(1000);
        current = (current + 1) % leds.len();
    }
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    println!("PANIC: {:?}", info);
    loop {}
}
