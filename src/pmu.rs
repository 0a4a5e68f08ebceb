//! Power management unit: deep-sleep entry.
//!
//! In deep-sleep the 1.2V domain clocks are stopped and the core wakes up
//! on IRC16M. SDRAM contents survive only if the device was put into
//! self-refresh first, and the clock tree has to be brought up again with
//! [`rcc::init`](crate::rcc::init) after wake-up.

use cortex_m::peripheral::SCB;

use crate::peripherals::PMU;
use crate::reg::modify32;
use crate::Peri;

const PMU_BASE: u32 = 0x4000_7000;
const PMU_CTL: u32 = 0x00;

const CTL_LDOLP: u32 = 1 << 0;
const CTL_STBMOD: u32 = 1 << 1;

/// LDO state while in deep-sleep
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Ldo {
    Normal,
    LowPower,
}

/// Instruction used to enter the low-power state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WakeOn {
    /// `WFI`: any enabled interrupt
    Interrupt,
    /// `WFE`: an event, e.g. an EXTI line in event mode
    Event,
}

/// PMU_CTL value selecting deep-sleep (not standby) with the given LDO mode
const fn deep_sleep_ctl(ctl: u32, ldo: Ldo) -> u32 {
    let ctl = ctl & !(CTL_STBMOD | CTL_LDOLP);
    match ldo {
        Ldo::Normal => ctl,
        Ldo::LowPower => ctl | CTL_LDOLP,
    }
}

pub struct Pmu<'d> {
    _pmu: Peri<'d, PMU>,
}

impl<'d> Pmu<'d> {
    pub fn new(pmu: Peri<'d, PMU>) -> Self {
        crate::rcc::enable_pmu();
        Self { _pmu: pmu }
    }

    /// Enter deep-sleep and return after wake-up.
    ///
    /// The system then runs from IRC16M; cached clock values in
    /// [`rcc::clocks`](crate::rcc::clocks) are stale until `rcc::init` runs.
    pub fn deep_sleep(&mut self, scb: &mut SCB, ldo: Ldo, wake: WakeOn) {
        debug!("pmu: deep-sleep, {}", wake);
        unsafe { modify32(PMU_BASE + PMU_CTL, |r| deep_sleep_ctl(r, ldo)) };

        scb.set_sleepdeep();
        match wake {
            WakeOn::Interrupt => cortex_m::asm::wfi(),
            WakeOn::Event => {
                // Clear a stale event latch so the second WFE really sleeps
                cortex_m::asm::sev();
                cortex_m::asm::wfe();
                cortex_m::asm::wfe();
            }
        }
        scb.clear_sleepdeep();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn deep_sleep_control_bits() {
        assert_eq!(deep_sleep_ctl(0x0000_C003, Ldo::Normal), 0x0000_C000);
        assert_eq!(deep_sleep_ctl(0x0000_C002, Ldo::LowPower), 0x0000_C001);
    }
}
