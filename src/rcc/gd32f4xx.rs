use super::RCU_BASE;
use crate::poll::{wait_until, DEFAULT_BUDGET};
use crate::reg::{modify32, read32, with_field, write32};
use crate::time::Hertz;

const RCU_CTL: u32 = 0x00;
const RCU_PLL: u32 = 0x04;
const RCU_CFG0: u32 = 0x08;
const RCU_APB1EN: u32 = 0x40;

const CTL_HXTALEN: u32 = 1 << 16;
const CTL_HXTALSTB: u32 = 1 << 17;
const CTL_PLLEN: u32 = 1 << 24;
const CTL_PLLSTB: u32 = 1 << 25;

const PLL_PLLSEL_HXTAL: u32 = 1 << 22;

const PMU_BASE: u32 = 0x4000_7000;
const PMU_CTL: u32 = 0x00;
const PMU_CS: u32 = 0x04;

const PMU_CTL_LDOVS: u32 = 0x3 << 14;
const PMU_CTL_HDEN: u32 = 1 << 16;
const PMU_CTL_HDS: u32 = 1 << 17;
const PMU_CS_HDRF: u32 = 1 << 16;
const PMU_CS_HDSRF: u32 = 1 << 17;

/// Clock tree bring-up error
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// External crystal did not report stable
    HxtalTimeout,
    /// PLL did not lock
    PllTimeout,
    /// High-drive mode did not become ready
    HighDriveTimeout,
    /// System clock switch was not acknowledged
    SwitchTimeout,
}

/// System clock source selection
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum SysClkSrc {
    /// 16MHz internal RC oscillator (default at reset)
    Irc16m = 0,
    /// External crystal
    Hxtal = 1,
    /// PLL P output
    PllP = 2,
}

/// PLL P output divider
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PllP {
    Div2 = 2,
    Div4 = 4,
    Div6 = 6,
    Div8 = 8,
}

/// Main PLL configuration, clocked from HXTAL
///
/// VCO = HXTAL / psc * n, SYSCLK = VCO / p, 48MHz domain = VCO / q
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Pll {
    /// Input prescaler (2..=63)
    pub psc: u8,
    /// VCO multiplier (64..=500)
    pub n: u16,
    /// System clock divider
    pub p: PllP,
    /// 48MHz domain divider (2..=15)
    pub q: u8,
}

impl Pll {
    /// 200MHz from a 25MHz crystal: 25 / 25 * 400 / 2
    pub const fn freq_200mhz() -> Self {
        Self {
            psc: 25,
            n: 400,
            p: PllP::Div2,
            q: 9,
        }
    }

    /// 240MHz from a 25MHz crystal: 25 / 25 * 480 / 2
    pub const fn freq_240mhz() -> Self {
        Self {
            psc: 25,
            n: 480,
            p: PllP::Div2,
            q: 10,
        }
    }

    /// System clock produced from `hxtal`
    pub const fn sys_freq(&self, hxtal: Hertz) -> Hertz {
        Hertz(hxtal.0 / self.psc as u32 * self.n as u32 / self.p as u32)
    }

    /// RCU_PLL register value
    pub const fn bits(&self) -> u32 {
        (self.psc as u32 & 0x3F)
            | ((self.n as u32 & 0x1FF) << 6)
            | ((((self.p as u32) >> 1) - 1) << 16)
            | PLL_PLLSEL_HXTAL
            | ((self.q as u32 & 0xF) << 24)
    }
}

/// AHB prescaler
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AhbDiv {
    Div1,
    Div2,
    Div4,
    Div8,
    Div16,
}

impl AhbDiv {
    pub(crate) const fn divisor(self) -> u32 {
        match self {
            AhbDiv::Div1 => 1,
            AhbDiv::Div2 => 2,
            AhbDiv::Div4 => 4,
            AhbDiv::Div8 => 8,
            AhbDiv::Div16 => 16,
        }
    }

    const fn bits(self) -> u32 {
        match self {
            AhbDiv::Div1 => 0b0000,
            AhbDiv::Div2 => 0b1000,
            AhbDiv::Div4 => 0b1001,
            AhbDiv::Div8 => 0b1010,
            AhbDiv::Div16 => 0b1011,
        }
    }
}

/// APB1/APB2 prescaler
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ApbDiv {
    Div1,
    Div2,
    Div4,
    Div8,
    Div16,
}

impl ApbDiv {
    pub(crate) const fn divisor(self) -> u32 {
        match self {
            ApbDiv::Div1 => 1,
            ApbDiv::Div2 => 2,
            ApbDiv::Div4 => 4,
            ApbDiv::Div8 => 8,
            ApbDiv::Div16 => 16,
        }
    }

    const fn bits(self) -> u32 {
        match self {
            ApbDiv::Div1 => 0b000,
            ApbDiv::Div2 => 0b100,
            ApbDiv::Div4 => 0b101,
            ApbDiv::Div8 => 0b110,
            ApbDiv::Div16 => 0b111,
        }
    }
}

/// GD32F4xx clock configuration
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// External crystal frequency
    pub hxtal: Hertz,
    /// Main PLL. None = don't touch the PLL
    pub pll: Option<Pll>,
    /// System clock source
    pub sys_src: SysClkSrc,
    /// AHB prescaler
    pub ahb_div: AhbDiv,
    /// APB1 prescaler (max 60MHz)
    pub apb1_div: ApbDiv,
    /// APB2 prescaler (max 120MHz)
    pub apb2_div: ApbDiv,
    /// Switch the core regulator to high-drive, needed above 168MHz
    pub high_drive: bool,
}

impl Default for Config {
    /// Default: 25MHz crystal, PLL to the chip's rated clock, AHB = SYSCLK,
    /// APB2 = AHB/2, APB1 = AHB/4, as on the GD32F4xx EVAL boards.
    fn default() -> Self {
        Self {
            hxtal: Hertz::mhz(25),
            #[cfg(feature = "gd32f470")]
            pll: Some(Pll::freq_240mhz()),
            #[cfg(not(feature = "gd32f470"))]
            pll: Some(Pll::freq_200mhz()),
            sys_src: SysClkSrc::PllP,
            ahb_div: AhbDiv::Div1,
            apb1_div: ApbDiv::Div4,
            apb2_div: ApbDiv::Div2,
            high_drive: true,
        }
    }
}

/// Bus prescaler bits for RCU_CFG0, other fields cleared.
pub(crate) const fn prescaler_bits(config: &Config) -> u32 {
    (config.ahb_div.bits() << 4) | (config.apb1_div.bits() << 10) | (config.apb2_div.bits() << 13)
}

/// Configuration the chip is left in when [`init`] fails: IRC16M with the
/// bus prescalers of `config` applied.
pub(crate) const fn fallback(config: &Config) -> Config {
    Config {
        pll: None,
        sys_src: SysClkSrc::Irc16m,
        ..*config
    }
}

/// Initialize the GD32F4xx clock tree.
///
/// On error the system clock is switched back to IRC16M; the bus prescalers
/// stay applied, see [`fallback`].
pub(crate) unsafe fn init(config: &Config) -> Result<(), Error> {
    let result = bring_up(config);
    if result.is_err() {
        modify32(RCU_BASE + RCU_CFG0, |r| with_field(r, 0, 2, SysClkSrc::Irc16m as u32));
    }
    result
}

unsafe fn bring_up(config: &Config) -> Result<(), Error> {
    let rcu = RCU_BASE;

    // 1. Bus prescalers before anything can fail or a faster source is selected
    modify32(rcu + RCU_CFG0, |r| (r & !0xFFF0) | prescaler_bits(config));

    if config.sys_src != SysClkSrc::Irc16m || config.pll.is_some() {
        // 2. Start the external crystal
        modify32(rcu + RCU_CTL, |r| r | CTL_HXTALEN);
        wait_until(DEFAULT_BUDGET, || read32(rcu + RCU_CTL) & CTL_HXTALSTB != 0).map_err(|_| {
            error!("rcc: HXTAL did not stabilize");
            Error::HxtalTimeout
        })?;
    }

    // 3. Regulator to the highest voltage scale
    modify32(rcu + RCU_APB1EN, |r| r | (1 << 28));
    modify32(PMU_BASE + PMU_CTL, |r| r | PMU_CTL_LDOVS);

    // 4. Main PLL
    if let Some(pll) = &config.pll {
        write32(rcu + RCU_PLL, pll.bits());
        modify32(rcu + RCU_CTL, |r| r | CTL_PLLEN);
        wait_until(DEFAULT_BUDGET, || read32(rcu + RCU_CTL) & CTL_PLLSTB != 0).map_err(|_| {
            error!("rcc: PLL did not lock");
            Error::PllTimeout
        })?;
    }

    // 5. High-drive mode
    if config.high_drive {
        modify32(PMU_BASE + PMU_CTL, |r| r | PMU_CTL_HDEN);
        wait_until(DEFAULT_BUDGET, || read32(PMU_BASE + PMU_CS) & PMU_CS_HDRF != 0)
            .map_err(|_| Error::HighDriveTimeout)?;
        modify32(PMU_BASE + PMU_CTL, |r| r | PMU_CTL_HDS);
        wait_until(DEFAULT_BUDGET, || read32(PMU_BASE + PMU_CS) & PMU_CS_HDSRF != 0)
            .map_err(|_| Error::HighDriveTimeout)?;
    }

    // 6. Switch system clock
    let src = config.sys_src as u32;
    modify32(rcu + RCU_CFG0, |r| with_field(r, 0, 2, src));
    wait_until(DEFAULT_BUDGET, || (read32(rcu + RCU_CFG0) >> 2) & 0x3 == src)
        .map_err(|_| Error::SwitchTimeout)?;

    debug!("rcc: system clock source {}", config.sys_src);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pll_register_encoding() {
        // PSC=25, N=480, P=2, Q=10, source HXTAL
        assert_eq!(Pll::freq_240mhz().bits(), 0x0A40_7819);
        assert_eq!(Pll::freq_200mhz().bits() & 0x3F, 25);
        assert_eq!((Pll::freq_200mhz().bits() >> 6) & 0x1FF, 400);
    }

    #[test]
    fn pll_output_frequency() {
        assert_eq!(Pll::freq_240mhz().sys_freq(Hertz::mhz(25)), Hertz::mhz(240));
        assert_eq!(Pll::freq_200mhz().sys_freq(Hertz::mhz(25)), Hertz::mhz(200));
    }

    #[test]
    fn prescaler_encoding() {
        // AHB/1, APB1/4, APB2/2
        assert_eq!(prescaler_bits(&Config::default()), 0x9400);
    }

    #[test]
    fn fallback_keeps_prescalers() {
        let config = fallback(&Config::default());
        assert_eq!(config.sys_src, SysClkSrc::Irc16m);
        assert!(config.pll.is_none());
        assert_eq!(prescaler_bits(&config), prescaler_bits(&Config::default()));
    }
}
