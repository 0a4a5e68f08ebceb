//! SDRAM commands and the mode-register payload.
//!
//! EXMC_SDCMD layout:
//! - CMD:  bits 2:0  (command kind)
//! - DS1:  bit 3     (target device 1)
//! - DS0:  bit 4     (target device 0)
//! - NARF: bits 8:5  (auto-refresh count - 1)
//! - MRC:  bits 21:9 (mode register content)

use super::Device;

/// Command kind written to EXMC_SDCMD.CMD
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum CommandKind {
    NormalOperation = 0,
    ClockEnable = 1,
    PrechargeAll = 2,
    AutoRefresh = 3,
    LoadModeRegister = 4,
    SelfRefresh = 5,
    PowerDown = 6,
}

/// One SDRAM command. Built, issued and dropped; the controller only ever
/// holds one at a time.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Command {
    pub kind: CommandKind,
    pub target: Device,
    /// Consecutive auto-refresh cycles, 1..=15
    pub auto_refresh: u8,
    /// Only meaningful for [`CommandKind::LoadModeRegister`]
    pub mode_register: u16,
}

impl Command {
    pub const fn new(kind: CommandKind, target: Device) -> Self {
        Self {
            kind,
            target,
            auto_refresh: 1,
            mode_register: 0,
        }
    }

    pub const fn auto_refresh(mut self, cycles: u8) -> Self {
        self.auto_refresh = cycles;
        self
    }

    pub const fn mode_register(mut self, mode: u16) -> Self {
        self.mode_register = mode;
        self
    }

    /// EXMC_SDCMD register value
    pub const fn bits(&self) -> u32 {
        let narf = if self.auto_refresh == 0 { 0 } else { self.auto_refresh - 1 };
        (self.kind as u32)
            | self.target.select_bit()
            | (((narf as u32) & 0xF) << 5)
            | (((self.mode_register as u32) & 0x1FFF) << 9)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BurstLength {
    One = 0x0000,
    Two = 0x0001,
    Four = 0x0002,
    Eight = 0x0003,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BurstType {
    Sequential = 0x0000,
    Interleaved = 0x0008,
}

/// CAS latency field of the mode register
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModeCasLatency {
    Two = 0x0020,
    Three = 0x0030,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperatingMode {
    Standard = 0x0000,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WriteBurst {
    /// Writes use the programmed burst length
    Programmed = 0x0000,
    /// Writes are single-location accesses
    Single = 0x0200,
}

/// SDRAM mode register, loaded with a load-mode-register command.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ModeRegister {
    pub burst_length: BurstLength,
    pub burst_type: BurstType,
    pub cas_latency: ModeCasLatency,
    pub operating_mode: OperatingMode,
    pub write_burst: WriteBurst,
}

impl ModeRegister {
    pub const fn bits(&self) -> u16 {
        self.burst_length as u16
            | self.burst_type as u16
            | self.cas_latency as u16
            | self.operating_mode as u16
            | self.write_burst as u16
    }
}
