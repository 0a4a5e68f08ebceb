//! Timing and interface profiles of the MT48LC16M16A2 fitted to the
//! GD32F4xx EVAL boards, and their register encodings.
//!
//! - 4 banks x 8192 rows x 512 columns x 16 bit = 32MiB
//! - 64ms / 8192 rows refresh

use super::command::{BurstLength, BurstType, ModeCasLatency, ModeRegister, OperatingMode, WriteBurst};
use super::Error;
use crate::time::Hertz;

/// Bytes addressable through one device window.
pub const CAPACITY: usize = 32 * 1024 * 1024;

/// Average refresh interval: 64ms / 8192 rows, as rounded by the datasheet.
pub const REFRESH_PERIOD_NS: u32 = 7_810;

/// Cycles subtracted from the refresh interval so that a refresh request
/// arriving during a burst is still serviced in time.
pub const REFRESH_MARGIN: u32 = 20;

/// Auto-refresh cycles issued during bring-up.
pub const INIT_AUTO_REFRESH: u8 = 9;

/// Load-mode-register payload: burst length 1, sequential, CAS 3,
/// standard mode, single-location write burst.
pub const MODE_REGISTER: ModeRegister = ModeRegister {
    burst_length: BurstLength::One,
    burst_type: BurstType::Sequential,
    cas_latency: ModeCasLatency::Three,
    operating_mode: OperatingMode::Standard,
    write_burst: WriteBurst::Single,
};

/// Delays between SDRAM commands, in SDCLK cycles (1..=16 each).
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct TimingProfile {
    /// tMRD: load mode register to active
    pub load_mode_register_delay: u8,
    /// tXSR: exit self-refresh to active
    pub exit_self_refresh_delay: u8,
    /// tRAS: row address select (active to precharge)
    pub row_address_select_delay: u8,
    /// tRC: auto-refresh to active
    pub auto_refresh_delay: u8,
    /// tWR: write recovery
    pub write_recovery_delay: u8,
    /// tRP: row precharge
    pub row_precharge_delay: u8,
    /// tRCD: row to column
    pub row_to_column_delay: u8,
}

// EXMC_SDTCFGx fields, each stored as cycles - 1
const TCFG_LMRD: u32 = 0;
const TCFG_XSRD: u32 = 4;
const TCFG_RASD: u32 = 8;
const TCFG_ARFD: u32 = 12;
const TCFG_WRD: u32 = 16;
const TCFG_RPD: u32 = 20;
const TCFG_RCD: u32 = 24;

/// SDTCFG fields that only exist in the device 0 register.
pub(crate) const TCFG_SHARED_MASK: u32 = (0xF << TCFG_ARFD) | (0xF << TCFG_RPD);

impl TimingProfile {
    /// MT48LC16M16A2 at up to 100MHz SDCLK
    pub const MT48LC16M16A2: Self = Self {
        // 2 clock cycles
        load_mode_register_delay: 2,
        // min 75ns
        exit_self_refresh_delay: 8,
        // min 44ns, max 120k ns
        row_address_select_delay: 5,
        // min 66ns
        auto_refresh_delay: 7,
        // 1 clock + 7.5ns
        write_recovery_delay: 2,
        // min 20ns
        row_precharge_delay: 3,
        // min 20ns
        row_to_column_delay: 3,
    };

    const fn fields(&self) -> [(u32, u8); 7] {
        [
            (TCFG_LMRD, self.load_mode_register_delay),
            (TCFG_XSRD, self.exit_self_refresh_delay),
            (TCFG_RASD, self.row_address_select_delay),
            (TCFG_ARFD, self.auto_refresh_delay),
            (TCFG_WRD, self.write_recovery_delay),
            (TCFG_RPD, self.row_precharge_delay),
            (TCFG_RCD, self.row_to_column_delay),
        ]
    }

    /// Every delay fits the 4-bit `cycles - 1` encoding.
    pub fn is_encodable(&self) -> bool {
        self.fields().iter().all(|&(_, cycles)| (1..=16).contains(&cycles))
    }

    /// EXMC_SDTCFGx register value
    pub fn bits(&self) -> u32 {
        self.fields()
            .iter()
            .fold(0, |acc, &(shift, cycles)| acc | (((cycles.saturating_sub(1)) as u32 & 0xF) << shift))
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ColumnBits {
    Bits8 = 0,
    Bits9 = 1,
    Bits10 = 2,
    Bits11 = 3,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RowBits {
    Bits11 = 0,
    Bits12 = 1,
    Bits13 = 2,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum DataWidth {
    Bits8 = 0,
    Bits16 = 1,
    Bits32 = 2,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum InternalBanks {
    Two = 0,
    Four = 1,
}

/// CAS latency programmed into the controller
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CasLatency {
    One = 1,
    Two = 2,
    Three = 3,
}

/// SDCLK as a division of HCLK
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SdClock {
    Disabled = 0,
    Hclk2 = 2,
    Hclk3 = 3,
}

/// Extra HCLK cycles before read data is sampled
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PipelineDelay {
    Hclk0 = 0,
    Hclk1 = 1,
    Hclk2 = 2,
}

/// Electrical and geometry parameters latched into EXMC_SDCTLx.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct InterfaceProfile {
    pub column_bits: ColumnBits,
    pub row_bits: RowBits,
    pub data_width: DataWidth,
    pub internal_banks: InternalBanks,
    pub cas_latency: CasLatency,
    pub write_protection: bool,
    pub sd_clock: SdClock,
    pub burst_read: bool,
    pub pipeline_delay: PipelineDelay,
}

// EXMC_SDCTLx fields
const CTL_CAW: u32 = 0;
const CTL_RAW: u32 = 2;
const CTL_SDW: u32 = 4;
const CTL_NBK: u32 = 6;
const CTL_CL: u32 = 7;
const CTL_WPEN: u32 = 9;
const CTL_SDCLK: u32 = 10;
const CTL_BRSTRD: u32 = 12;
const CTL_PIPED: u32 = 13;

/// SDCTL fields that only exist in the device 0 register.
pub(crate) const CTL_SHARED_MASK: u32 = (0x3 << CTL_SDCLK) | (0x1 << CTL_BRSTRD) | (0x3 << CTL_PIPED);

impl InterfaceProfile {
    pub const MT48LC16M16A2: Self = Self {
        column_bits: ColumnBits::Bits9,
        row_bits: RowBits::Bits13,
        data_width: DataWidth::Bits16,
        internal_banks: InternalBanks::Four,
        cas_latency: CasLatency::Three,
        write_protection: false,
        sd_clock: SdClock::Hclk3,
        burst_read: true,
        pipeline_delay: PipelineDelay::Hclk2,
    };

    /// EXMC_SDCTLx register value
    pub const fn bits(&self) -> u32 {
        ((self.column_bits as u32) << CTL_CAW)
            | ((self.row_bits as u32) << CTL_RAW)
            | ((self.data_width as u32) << CTL_SDW)
            | ((self.internal_banks as u32) << CTL_NBK)
            | ((self.cas_latency as u32) << CTL_CL)
            | ((self.write_protection as u32) << CTL_WPEN)
            | ((self.sd_clock as u32) << CTL_SDCLK)
            | ((self.burst_read as u32) << CTL_BRSTRD)
            | ((self.pipeline_delay as u32) << CTL_PIPED)
    }

    /// SDCLK produced from the EXMC kernel clock.
    pub fn sdclk(&self, hclk: Hertz) -> Option<Hertz> {
        match self.sd_clock {
            SdClock::Disabled => None,
            div => Some(hclk / div as u32),
        }
    }
}

/// Auto-refresh counter: `ceil(period * clock) - margin`.
///
/// The controller needs at least 41 and holds 13 bits.
pub fn refresh_count(period_ns: u32, clock: Hertz, margin: u32) -> Result<u16, Error> {
    let cycles = clock.cycles_in_ns(period_ns);
    let count = cycles.saturating_sub(margin);
    if !(41..=0x1FFF).contains(&count) {
        return Err(Error::RefreshOutOfRange(count));
    }
    Ok(count as u16)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn refresh_counter_reference_value() {
        assert_eq!(refresh_count(REFRESH_PERIOD_NS, Hertz::mhz(100), REFRESH_MARGIN), Ok(761));
    }

    #[test]
    fn refresh_counter_rounds_up() {
        // 7812.5ns truncated to 7812ns: 781.2 cycles -> 782
        assert_eq!(refresh_count(7_812, Hertz::mhz(100), 20), Ok(762));
    }

    #[test]
    fn refresh_counter_range() {
        assert_eq!(
            refresh_count(REFRESH_PERIOD_NS, Hertz::mhz(1), REFRESH_MARGIN),
            Err(Error::RefreshOutOfRange(0))
        );
        assert_eq!(
            refresh_count(REFRESH_PERIOD_NS, Hertz::mhz(2_000), 0),
            Err(Error::RefreshOutOfRange(15_620))
        );
    }

    #[test]
    fn timing_register_encoding() {
        let timing = TimingProfile::MT48LC16M16A2;
        assert!(timing.is_encodable());
        assert_eq!(timing.bits(), 0x0221_6471);
    }

    #[test]
    fn timing_zero_is_not_encodable() {
        let timing = TimingProfile {
            row_precharge_delay: 0,
            ..TimingProfile::MT48LC16M16A2
        };
        assert!(!timing.is_encodable());
        let timing = TimingProfile {
            exit_self_refresh_delay: 17,
            ..TimingProfile::MT48LC16M16A2
        };
        assert!(!timing.is_encodable());
    }

    #[test]
    fn timing_meets_datasheet_at_100mhz() {
        // 10ns per cycle
        let clk = Hertz::mhz(100);
        let timing = TimingProfile::MT48LC16M16A2;
        assert!(timing.exit_self_refresh_delay as u32 >= clk.cycles_in_ns(75));
        assert!(timing.row_address_select_delay as u32 >= clk.cycles_in_ns(44));
        assert!(timing.auto_refresh_delay as u32 >= clk.cycles_in_ns(66));
        assert!(timing.row_precharge_delay as u32 >= clk.cycles_in_ns(20));
        assert!(timing.row_to_column_delay as u32 >= clk.cycles_in_ns(20));
        assert!(timing.write_recovery_delay >= 2);
        assert!(timing.load_mode_register_delay >= 2);
    }

    #[test]
    fn interface_register_encoding() {
        assert_eq!(InterfaceProfile::MT48LC16M16A2.bits(), 0x5DD9);
    }

    #[test]
    fn sdclk_division() {
        let profile = InterfaceProfile::MT48LC16M16A2;
        assert_eq!(profile.sdclk(Hertz::mhz(240)), Some(Hertz::mhz(80)));
        let off = InterfaceProfile {
            sd_clock: SdClock::Disabled,
            ..profile
        };
        assert_eq!(off.sdclk(Hertz::mhz(240)), None);
    }

    #[test]
    fn capacity_matches_geometry() {
        // banks * rows * columns * bytes per column
        assert_eq!(CAPACITY, 4 * 8192 * 512 * 2);
    }
}
