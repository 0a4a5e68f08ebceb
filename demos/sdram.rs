//! EXMC SDRAM example for the GD32F450Z/GD32F470Z EVAL boards.
//!
//! Initializes the MT48LC16M16A2 on SDRAM device 0, writes 1KiB of
//! ascending bytes as half-words, reads them back and compares.
//! Results are printed via USART0 (115200 baud).
//!
//! LED1 (PD4) on success, LED3 (PG3) on failure.

#![no_std]
#![no_main]

use cortex_m_rt::entry;
use embedded_hal::delay::DelayNs;
use gd32f4xx_hal as hal;
use hal::delay::Delay;
use hal::exmc::{self, fill_buffer, Device, Sdram};
use hal::gpio::{Level, Output, Speed};
use hal::{print, println};

const BUFFER_SIZE: usize = 0x400;
const WRITE_READ_ADDR: usize = 0x0000;

fn halt(led: &mut Output<'_>) -> ! {
    led.set_high();
    loop {}
}

#[entry]
fn main() -> ! {
    let p = hal::init(Default::default());
    let mut delay = Delay;

    let mut led1 = Output::new(p.PD4, Level::Low, Speed::High);
    let mut led3 = Output::new(p.PG3, Level::Low, Speed::High);

    let mut sdram = Sdram::new(p.EXMC, Device::Device0, exmc::Config::default());
    if let Err(e) = sdram.init(&mut delay) {
        println!("\n\nSDRAM initialize fail! {:?}", e);
        halt(&mut led3);
    }

    println!("\nSDRAM initialized!");
    delay.delay_ms(1000);

    let mut txbuffer = [0u8; BUFFER_SIZE];
    let mut rxbuffer = [0u8; BUFFER_SIZE];
    fill_buffer(&mut txbuffer, 0);

    let mut words = [0u16; BUFFER_SIZE / 2];
    for (w, pair) in words.iter_mut().zip(txbuffer.chunks_exact(2)) {
        *w = u16::from_le_bytes([pair[0], pair[1]]);
    }

    let result = sdram.window().and_then(|mut window| {
        window.write_u16(WRITE_READ_ADDR, &words)?;
        println!("\nSDRAM write data completed!");
        delay.delay_ms(1000);

        window.read_u16(WRITE_READ_ADDR, &mut words)?;
        println!("\nSDRAM read data completed!");
        delay.delay_ms(1000);
        Ok(())
    });
    if let Err(e) = result {
        println!("\nSDRAM access error: {:?}", e);
        halt(&mut led3);
    }

    for (pair, w) in rxbuffer.chunks_exact_mut(2).zip(words.iter()) {
        pair.copy_from_slice(&w.to_le_bytes());
    }

    println!("\nCheck the data!");
    match txbuffer.iter().zip(rxbuffer.iter()).position(|(t, r)| t != r) {
        Some(i) => {
            println!("\nSDRAM test failed! first mismatch at {:#x}", i);
            halt(&mut led3);
        }
        None => {
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
        }
    }

    loop {}
}

#[panic_handler]
fn panic(info: &core::panic::PanicInfo) -> ! {
    println!("PANIC: {:?}", info);
    loop {}
}
