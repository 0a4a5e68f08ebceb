#![no_std]

#[cfg(test)]
extern crate std;

pub(crate) use embassy_hal_internal::{impl_peripheral, peripherals_definition, peripherals_struct};
pub use embassy_hal_internal::{Peri, PeripheralType};

// This must go FIRST so that all the other modules see its macros.
include!(concat!(env!("OUT_DIR"), "/_macros.rs"));

#[macro_use]
mod fmt;

mod reg;

pub mod time;

pub mod poll;

pub mod debug;

pub mod delay;

pub mod rcc;

pub mod pmu;

pub mod exti;

pub use crate::_generated::{peripherals, Peripherals};

pub mod gpio;

pub mod exmc;

// This must go last, so that it sees all the impl_foo! macros defined earlier.
pub(crate) mod _generated {
    #![allow(dead_code)]
    #![allow(unused_imports)]
    #![allow(non_snake_case)]
    #![allow(missing_docs)]

    include!(concat!(env!("OUT_DIR"), "/_generated.rs"));
}

#[derive(Default)]
pub struct Config {
    pub rcc: rcc::Config,
}

/// Initialize the HAL with the provided configuration.
///
/// This returns the peripheral singletons that can be used for creating drivers.
///
/// If the clock tree cannot be brought up the system keeps running on
/// IRC16M and [`rcc::clocks`] reports that.
///
/// This should only be called once at startup, otherwise it panics.
pub fn init(config: Config) -> Peripherals {
    // Initialize clock tree (RCU)
    if let Err(e) = unsafe { rcc::init(config.rcc) } {
        error!("rcc init failed: {}", e);
    }

    // Initialize debug USART (must be after clock init for correct baud rate)
    debug::DebugPrint::enable();

    Peripherals::take()
}
