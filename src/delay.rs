//! Blocking delays counted in core clock cycles.

use embedded_hal::delay::DelayNs;

/// Busy-wait delay based on the current system clock.
///
/// Accuracy depends on [`rcc::clocks`](crate::rcc::clocks) being up to date,
/// so call [`rcc::init`](crate::rcc::init) again after waking from deep-sleep
/// before relying on it.
#[derive(Clone, Copy, Debug, Default)]
pub struct Delay;

impl DelayNs for Delay {
    #[inline]
    fn delay_ns(&mut self, ns: u32) {
        let cycles = crate::rcc::clocks().sysclk.cycles_in_ns(ns);
        cortex_m::asm::delay(cycles);
    }
}
