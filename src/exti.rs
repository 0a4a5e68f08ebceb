//! External event lines for GD32F4xx GPIO
//!
//! Line n (0..=15) can be routed from pin n of any port through the SYSCFG
//! EXTISS registers (4 bits per line). A line configured as an event (not an
//! interrupt) wakes the core from `WFE`, including from deep-sleep, without
//! needing an interrupt handler.
//!
//! EXTI registers (0x4001_3C00):
//! - INTEN: 0x00
//! - EVEN:  0x04
//! - RTEN:  0x08 (rising edge)
//! - FTEN:  0x0C (falling edge)
//! - PD:    0x14 (pending, write 1 to clear)

use crate::gpio::{AnyPin, Input, Level, Pin as GpioPin, Pull};
use crate::reg::{modify32, read32, with_field, write32};
use crate::Peri;

const SYSCFG_BASE: u32 = 0x4001_3800;
const SYSCFG_EXTISS0: u32 = 0x08;

const EXTI_BASE: u32 = 0x4001_3C00;
const EXTI_EVEN: u32 = 0x04;
const EXTI_RTEN: u32 = 0x08;
const EXTI_FTEN: u32 = 0x0C;
const EXTI_PD: u32 = 0x14;

/// Edge that triggers the line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Edge {
    Rising,
    Falling,
    Both,
}

impl Edge {
    const fn rising(self) -> bool {
        matches!(self, Edge::Rising | Edge::Both)
    }

    const fn falling(self) -> bool {
        matches!(self, Edge::Falling | Edge::Both)
    }
}

/// SYSCFG register offset and bit position selecting the source of `line`
const fn source_select(line: u8) -> (u32, u32) {
    (SYSCFG_EXTISS0 + (line as u32 / 4) * 4, (line as u32 % 4) * 4)
}

/// GPIO input that also raises an EXTI event on an edge.
pub struct ExtiInput<'d> {
    pin: Input<'d>,
    line: u8,
}

impl<'d> ExtiInput<'d> {
    pub fn new<P: GpioPin + Into<AnyPin>>(pin: Peri<'d, P>, pull: Pull, edge: Edge) -> Self {
        let line = pin.pin();
        let port = pin.port();
        let pin = Input::new(pin, pull);

        crate::rcc::enable_syscfg();
        let (offset, shift) = source_select(line);
        let bit = 1u32 << line;
        unsafe {
            modify32(SYSCFG_BASE + offset, |r| with_field(r, shift, 4, port as u32));
            modify32(EXTI_BASE + EXTI_RTEN, |r| if edge.rising() { r | bit } else { r & !bit });
            modify32(EXTI_BASE + EXTI_FTEN, |r| if edge.falling() { r | bit } else { r & !bit });
            write32(EXTI_BASE + EXTI_PD, bit);
            modify32(EXTI_BASE + EXTI_EVEN, |r| r | bit);
        }
        trace!("exti: line {} from port {}", line, port);

        Self { pin, line }
    }

    /// An edge was seen since the last [`clear_pending`](Self::clear_pending)
    pub fn is_pending(&self) -> bool {
        unsafe { read32(EXTI_BASE + EXTI_PD) & (1 << self.line) != 0 }
    }

    pub fn clear_pending(&mut self) {
        unsafe { write32(EXTI_BASE + EXTI_PD, 1 << self.line) };
    }

    pub fn line(&self) -> u8 {
        self.line
    }

    pub fn is_high(&self) -> bool {
        self.pin.is_high()
    }

    pub fn is_low(&self) -> bool {
        self.pin.is_low()
    }

    pub fn get_level(&self) -> Level {
        self.pin.get_level()
    }
}

impl<'d> Drop for ExtiInput<'d> {
    fn drop(&mut self) {
        let bit = 1u32 << self.line;
        unsafe { modify32(EXTI_BASE + EXTI_EVEN, |r| r & !bit) };
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn source_select_registers() {
        assert_eq!(source_select(0), (0x08, 0));
        assert_eq!(source_select(3), (0x08, 12));
        // PB14 key: EXTISS3, bits 11:8
        assert_eq!(source_select(14), (0x14, 8));
    }

    #[test]
    fn edge_selection() {
        assert!(Edge::Falling.falling() && !Edge::Falling.rising());
        assert!(Edge::Both.falling() && Edge::Both.rising());
    }
}
