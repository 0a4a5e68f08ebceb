//! Debug output module for GD32F4xx.
//!
//! Provides `print!` and `println!` macros for debug output via USART.
//!
//! # Features
//! - `debug-usart0` - Use USART0 (PA9=TX, PA10=RX) - default
//!
//! If no debug feature is enabled, print!/println! are no-ops.
//!
//! Default baudrate: 115200 8N1, divider computed from the APB2 clock.

use core::fmt::{self, Write};

#[cfg(feature = "_debug-output")]
use crate::gpio::{Mux, OutputType, PinGroup, Port, Pull, Speed};
#[cfg(feature = "_debug-output")]
use crate::reg::{read32, write32};

#[cfg(feature = "_debug-output")]
const USART0_BASE: u32 = 0x4001_1000;

#[cfg(feature = "_debug-output")]
const USART_STAT0: u32 = 0x00;
#[cfg(feature = "_debug-output")]
const USART_DATA: u32 = 0x04;
#[cfg(feature = "_debug-output")]
const USART_BAUD: u32 = 0x08;
#[cfg(feature = "_debug-output")]
const USART_CTL0: u32 = 0x0C;

#[cfg(feature = "_debug-output")]
const STAT0_TBE: u32 = 1 << 7;
#[cfg(feature = "_debug-output")]
const CTL0_UEN: u32 = 1 << 13;
#[cfg(feature = "_debug-output")]
const CTL0_TEN: u32 = 1 << 3;
#[cfg(feature = "_debug-output")]
const CTL0_REN: u32 = 1 << 2;

pub const BAUDRATE: u32 = 115_200;

/// USART_BAUD value for 16x oversampling, rounded to nearest
pub const fn baud_divider(pclk: u32, baud: u32) -> u32 {
    (pclk + baud / 2) / baud
}

/// Debug print output using USART
pub struct DebugPrint;

impl DebugPrint {
    /// Initialize USART for debug output (115200 baud, 8N1)
    ///
    /// Must be called after clock init so the APB2 frequency is known.
    #[cfg(feature = "_debug-output")]
    pub fn enable() {
        crate::rcc::enable_usart0();

        // PA9 (TX) and PA10 (RX) as USART0 function (AF7)
        let pins = PinGroup {
            port: Port::A,
            pins: (1 << 9) | (1 << 10),
            af: 7,
            pull: Pull::Up,
            speed: Speed::High,
            output: OutputType::PushPull,
        };
        unsafe { Mux::steal() }.apply(&pins);

        let pclk2 = crate::rcc::clocks().pclk2.0;
        unsafe {
            write32(USART0_BASE + USART_CTL0, 0);
            write32(USART0_BASE + USART_BAUD, baud_divider(pclk2, BAUDRATE));
            // 8 data bits, no parity, 1 stop bit are the reset values
            write32(USART0_BASE + USART_CTL0, CTL0_UEN | CTL0_TEN | CTL0_REN);
        }
    }

    /// No-op when debug output is disabled
    #[cfg(not(feature = "_debug-output"))]
    pub fn enable() {}

    /// Write a single byte
    #[cfg(feature = "_debug-output")]
    #[inline]
    fn write_byte(byte: u8) {
        unsafe {
            // Wait for the transmit data register to drain
            while read32(USART0_BASE + USART_STAT0) & STAT0_TBE == 0 {}
            write32(USART0_BASE + USART_DATA, byte as u32);
        }
    }
}

#[cfg(feature = "_debug-output")]
impl Write for DebugPrint {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            if byte == b'\n' {
                DebugPrint::write_byte(b'\r');
            }
            DebugPrint::write_byte(byte);
        }
        Ok(())
    }
}

#[cfg(not(feature = "_debug-output"))]
impl Write for DebugPrint {
    fn write_str(&mut self, _s: &str) -> fmt::Result {
        Ok(())
    }
}

/// Print to USART debug output
#[macro_export]
macro_rules! print {
    ($($arg:tt)*) => {
        {
            use core::fmt::Write;
            let _ = write!(&mut $crate::debug::DebugPrint, $($arg)*);
        }
    }
}

/// Print with newline to USART debug output
#[macro_export]
macro_rules! println {
    () => {
        $crate::print!("\n")
    };
    ($($arg:tt)*) => {
        {
            use core::fmt::Write;
            let _ = writeln!(&mut $crate::debug::DebugPrint, $($arg)*);
        }
    }
}
