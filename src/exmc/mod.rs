//! EXMC SDRAM controller
//!
//! The external memory controller exposes two SDRAM devices. Each has its
//! own chip select, clock enable and 256MiB address window, but the command
//! register, the refresh timer and a handful of shared timing fields are
//! common to both.
//!
//! Register map (offsets from 0xA000_0000):
//! - SDCTL0/1:  0x140 / 0x144 (interface geometry and clocking)
//! - SDTCFG0/1: 0x148 / 0x14C (command timing)
//! - SDCMD:     0x150
//! - SDARI:     0x154 (auto-refresh interval)
//! - SDSTAT:    0x158
//!
//! Usage:
//!
//! ```ignore
//! let mut sdram = Sdram::new(p.EXMC, Device::Device0, exmc::Config::default());
//! sdram.init(&mut Delay)?;
//! let mut window = sdram.window()?;
//! window.write_u16(0, &buf)?;
//! ```

use crate::gpio::{Mux, OutputType, PinGroup, Port, Pull, Speed};
use crate::peripherals::EXMC;
use crate::reg::{read32, write32};
use crate::Peri;

mod command;
mod profile;
mod sdram;
mod window;

#[cfg(test)]
pub(crate) mod mock;

pub use command::*;
pub use profile::*;
pub use sdram::*;
pub use window::*;

const EXMC_BASE: u32 = 0xA000_0000;

pub(crate) const SDCTL0: u32 = 0x140;
pub(crate) const SDTCFG0: u32 = 0x148;
pub(crate) const SDCMD: u32 = 0x150;
pub(crate) const SDARI: u32 = 0x154;
pub(crate) const SDSTAT: u32 = 0x158;

/// SDSTAT: controller is busy with the previous command
pub(crate) const SDSTAT_NRDY: u32 = 1 << 5;

/// SDRAM alternate function
const AF_EXMC: u8 = 12;

const fn sdram_pins(port: Port, pins: u16) -> PinGroup {
    PinGroup {
        port,
        pins,
        af: AF_EXMC,
        pull: Pull::Up,
        speed: Speed::High,
        output: OutputType::PushPull,
    }
}

// Address, data, DQM, bank select, RAS/CAS, SDCLK: shared by both devices.
// PD0/1/8/9/10/14/15: D2 D3 D13-D15 D0 D1
// PE0/1/7-15: NBL0 NBL1 D4-D12
// PF0-5/11-15: A0-A5 SDNRAS A6-A9
// PG0/1/2/4/5/8/15: A10 A11 A12 BA0 BA1 SDCLK SDNCAS
const PD: PinGroup = sdram_pins(Port::D, 0xC703);
const PE: PinGroup = sdram_pins(Port::E, 0xFF83);
const PF: PinGroup = sdram_pins(Port::F, 0xF83F);
const PG: PinGroup = sdram_pins(Port::G, 0x8137);

/// PC0 SDNWE, PC2 SDNE0, PC3 SDCKE0
const DEVICE0_PINS: [PinGroup; 5] = [sdram_pins(Port::C, 0x000D), PD, PE, PF, PG];

/// PB5 SDCKE1, PB6 SDNE1, PC0 SDNWE
const DEVICE1_PINS: [PinGroup; 6] = [sdram_pins(Port::B, 0x0060), sdram_pins(Port::C, 0x0001), PD, PE, PF, PG];

/// SDRAM device selector
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Device {
    Device0,
    Device1,
}

impl Device {
    /// Start of the device's memory window
    pub const fn base_address(self) -> u32 {
        match self {
            Device::Device0 => 0xC000_0000,
            Device::Device1 => 0xD000_0000,
        }
    }

    /// SDCMD target bit (DS0 / DS1)
    pub(crate) const fn select_bit(self) -> u32 {
        match self {
            Device::Device0 => 1 << 4,
            Device::Device1 => 1 << 3,
        }
    }

    /// Position of the 2-bit bank status field in SDSTAT
    pub(crate) const fn status_shift(self) -> u32 {
        match self {
            Device::Device0 => 1,
            Device::Device1 => 3,
        }
    }

    pub(crate) const fn ctl_offset(self) -> u32 {
        match self {
            Device::Device0 => SDCTL0,
            Device::Device1 => SDCTL0 + 4,
        }
    }

    pub(crate) const fn tcfg_offset(self) -> u32 {
        match self {
            Device::Device0 => SDTCFG0,
            Device::Device1 => SDTCFG0 + 4,
        }
    }

    /// Pin groups wired to this device on the EVAL boards
    pub fn pins(self) -> &'static [PinGroup] {
        match self {
            Device::Device0 => &DEVICE0_PINS,
            Device::Device1 => &DEVICE1_PINS,
        }
    }
}

/// Per-device state reported in SDSTAT
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BankStatus {
    Normal,
    SelfRefresh,
    PowerDown,
}

impl BankStatus {
    pub(crate) const fn from_bits(bits: u32) -> Self {
        match bits & 0x3 {
            0 => BankStatus::Normal,
            1 => BankStatus::SelfRefresh,
            _ => BankStatus::PowerDown,
        }
    }
}

/// Step of the controller sequence that failed
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Stage {
    ClockEnable,
    Settle,
    PrechargeAll,
    AutoRefresh,
    LoadModeRegister,
    ProgramRefreshInterval,
    SelfRefreshEntry,
    SelfRefreshExit,
}

/// SDRAM controller error
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// The controller stayed busy for the whole poll budget
    Timeout(Stage),
    /// The bank never reached the requested state
    Status { expected: BankStatus, actual: BankStatus },
    /// Auto-refresh counter outside 41..=8191
    RefreshOutOfRange(u32),
    /// The device has not completed `init`
    NotInitialized,
    /// Access past the end of the window
    OutOfBounds { offset: usize, len: usize },
    /// Half-word access at an odd offset
    Misaligned { offset: usize },
}

/// Register file of the EXMC SDRAM controller.
///
/// # Safety
///
/// `window_base` must return a pointer valid for reads and writes of
/// [`CAPACITY`] bytes for as long as the implementor is borrowed by an
/// [`Sdram`].
pub unsafe trait ExmcBus {
    fn read(&mut self, offset: u32) -> u32;

    fn write(&mut self, offset: u32, value: u32);

    fn modify(&mut self, offset: u32, f: impl FnOnce(u32) -> u32) {
        let value = self.read(offset);
        self.write(offset, f(value));
    }

    fn window_base(&mut self, device: Device) -> *mut u8 {
        device.base_address() as *mut u8
    }
}

unsafe impl<T: ExmcBus + ?Sized> ExmcBus for &mut T {
    #[inline]
    fn read(&mut self, offset: u32) -> u32 {
        T::read(self, offset)
    }

    #[inline]
    fn write(&mut self, offset: u32, value: u32) {
        T::write(self, offset, value)
    }

    #[inline]
    fn window_base(&mut self, device: Device) -> *mut u8 {
        T::window_base(self, device)
    }
}

/// Memory-mapped EXMC registers
pub struct Mmio<'d> {
    _exmc: Peri<'d, EXMC>,
}

impl<'d> Mmio<'d> {
    pub fn new(exmc: Peri<'d, EXMC>) -> Self {
        Self { _exmc: exmc }
    }
}

unsafe impl<'d> ExmcBus for Mmio<'d> {
    #[inline]
    fn read(&mut self, offset: u32) -> u32 {
        unsafe { read32(EXMC_BASE + offset) }
    }

    #[inline]
    fn write(&mut self, offset: u32, value: u32) {
        unsafe { write32(EXMC_BASE + offset, value) }
    }
}

/// Clock gating and pin multiplexing needed before the controller can talk
/// to the device.
pub trait PinMux {
    /// Enable the EXMC clock and the port clocks used by `groups`.
    fn enable_clocks(&mut self, groups: &[PinGroup]);

    /// Route one pin group to its alternate function.
    fn configure(&mut self, group: &PinGroup);
}

impl PinMux for Mux {
    fn enable_clocks(&mut self, groups: &[PinGroup]) {
        crate::rcc::enable_exmc();
        for group in groups {
            crate::rcc::enable_gpio_port(group.port as u8);
        }
    }

    fn configure(&mut self, group: &PinGroup) {
        self.apply(group);
    }
}

impl<T: PinMux + ?Sized> PinMux for &mut T {
    fn enable_clocks(&mut self, groups: &[PinGroup]) {
        T::enable_clocks(self, groups)
    }

    fn configure(&mut self, group: &PinGroup) {
        T::configure(self, group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pin_count(device: Device) -> u32 {
        device.pins().iter().map(|g| g.pins.count_ones()).sum()
    }

    #[test]
    fn pin_map_sizes() {
        // 13 address + 2 bank + 16 data + 2 DQM + SDCLK, RAS, CAS, WE, NE, CKE
        assert_eq!(pin_count(Device::Device0), 39);
        assert_eq!(pin_count(Device::Device1), 39);
    }

    #[test]
    fn pin_groups_use_exmc_function() {
        for group in Device::Device0.pins().iter().chain(Device::Device1.pins()) {
            assert_eq!(group.af, 12);
            assert_eq!(group.pull, Pull::Up);
            assert_eq!(group.speed, Speed::High);
            assert_eq!(group.output, OutputType::PushPull);
        }
    }

    #[test]
    fn device_select_pins() {
        let pc = Device::Device0.pins()[0];
        assert_eq!(pc.port, Port::C);
        assert_eq!(pc.pin_numbers().collect::<std::vec::Vec<_>>(), [0, 2, 3]);

        let pb = Device::Device1.pins()[0];
        assert_eq!(pb.port, Port::B);
        assert_eq!(pb.pin_numbers().collect::<std::vec::Vec<_>>(), [5, 6]);
    }

    #[test]
    fn bank_status_decoding() {
        assert_eq!(BankStatus::from_bits(0), BankStatus::Normal);
        assert_eq!(BankStatus::from_bits(1), BankStatus::SelfRefresh);
        assert_eq!(BankStatus::from_bits(2), BankStatus::PowerDown);
        assert_eq!(BankStatus::from_bits(0x08 >> Device::Device1.status_shift()), BankStatus::SelfRefresh);
    }

    #[test]
    fn device_register_offsets() {
        assert_eq!(Device::Device0.ctl_offset(), 0x140);
        assert_eq!(Device::Device1.ctl_offset(), 0x144);
        assert_eq!(Device::Device0.tcfg_offset(), 0x148);
        assert_eq!(Device::Device1.tcfg_offset(), 0x14C);
    }
}
