use portable_atomic::{AtomicU32, Ordering};

use crate::reg::modify32;
use crate::time::Hertz;

mod gd32f4xx;
pub use gd32f4xx::*;

/// Internal 16MHz RC oscillator, the clock source out of reset.
const IRC16M_FREQ: u32 = 16_000_000;

pub(crate) const RCU_BASE: u32 = 0x4002_3800;

const RCU_AHB1EN: u32 = 0x30;
const RCU_AHB3EN: u32 = 0x38;
const RCU_APB1EN: u32 = 0x40;
const RCU_APB2EN: u32 = 0x44;

static SYSCLK: AtomicU32 = AtomicU32::new(IRC16M_FREQ);
static HCLK: AtomicU32 = AtomicU32::new(IRC16M_FREQ);
static PCLK1: AtomicU32 = AtomicU32::new(IRC16M_FREQ);
static PCLK2: AtomicU32 = AtomicU32::new(IRC16M_FREQ);

#[derive(Copy, Clone, Eq, PartialEq, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Clocks {
    /// CPU / system clock
    pub sysclk: Hertz,
    /// AHB clock, also the EXMC kernel clock
    pub hclk: Hertz,
    /// APB1 clock
    pub pclk1: Hertz,
    /// APB2 clock
    pub pclk2: Hertz,
}

/// Clock frequencies as of the last [`init`].
#[inline]
pub fn clocks() -> Clocks {
    Clocks {
        sysclk: Hertz(SYSCLK.load(Ordering::Relaxed)),
        hclk: Hertz(HCLK.load(Ordering::Relaxed)),
        pclk1: Hertz(PCLK1.load(Ordering::Relaxed)),
        pclk2: Hertz(PCLK2.load(Ordering::Relaxed)),
    }
}

/// Compute the clock frequencies produced by `config`.
pub fn compute_clocks(config: &Config) -> Clocks {
    let sysclk = match config.sys_src {
        SysClkSrc::Irc16m => IRC16M_FREQ,
        SysClkSrc::Hxtal => config.hxtal.0,
        SysClkSrc::PllP => config.pll.map(|p| p.sys_freq(config.hxtal).0).unwrap_or(IRC16M_FREQ),
    };
    let hclk = sysclk / config.ahb_div.divisor();
    Clocks {
        sysclk: Hertz(sysclk),
        hclk: Hertz(hclk),
        pclk1: Hertz(hclk / config.apb1_div.divisor()),
        pclk2: Hertz(hclk / config.apb2_div.divisor()),
    }
}

/// Cache clock frequencies from config.
fn update_clocks(config: &Config) {
    let clocks = compute_clocks(config);
    SYSCLK.store(clocks.sysclk.0, Ordering::Relaxed);
    HCLK.store(clocks.hclk.0, Ordering::Relaxed);
    PCLK1.store(clocks.pclk1.0, Ordering::Relaxed);
    PCLK2.store(clocks.pclk2.0, Ordering::Relaxed);
}

/// Bring up the clock tree described by `config`.
///
/// On error the chip keeps running on IRC16M with the prescalers of
/// `config`, and [`clocks`] reports those frequencies.
///
/// This is also the way back after deep-sleep: the core wakes up on IRC16M
/// and the PLL has to be restarted before anything timing-sensitive runs.
///
/// # Safety
///
/// Changes the system clock under the feet of every running peripheral.
pub unsafe fn init(config: Config) -> Result<(), Error> {
    let result = gd32f4xx::init(&config);
    let applied = match result {
        Ok(()) => config,
        Err(_) => gd32f4xx::fallback(&config),
    };
    critical_section::with(|_| update_clocks(&applied));
    result
}

/// Enable the bus clock of GPIO port `port` (0 = GPIOA .. 8 = GPIOI).
pub fn enable_gpio_port(port: u8) {
    unsafe { modify32(RCU_BASE + RCU_AHB1EN, |r| r | (1 << port)) };
}

/// Enable the EXMC bus clock.
pub fn enable_exmc() {
    unsafe { modify32(RCU_BASE + RCU_AHB3EN, |r| r | 1) };
}

/// Enable the PMU bus clock.
pub fn enable_pmu() {
    unsafe { modify32(RCU_BASE + RCU_APB1EN, |r| r | (1 << 28)) };
}

/// Enable the USART0 bus clock.
pub fn enable_usart0() {
    unsafe { modify32(RCU_BASE + RCU_APB2EN, |r| r | (1 << 4)) };
}

/// Enable the SYSCFG bus clock (EXTI source routing).
pub fn enable_syscfg() {
    unsafe { modify32(RCU_BASE + RCU_APB2EN, |r| r | (1 << 14)) };
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_matches_chip() {
        let clocks = compute_clocks(&Config::default());
        #[cfg(feature = "gd32f470")]
        assert_eq!(clocks.sysclk, Hertz::mhz(240));
        #[cfg(not(feature = "gd32f470"))]
        assert_eq!(clocks.sysclk, Hertz::mhz(200));
        assert_eq!(clocks.hclk, clocks.sysclk);
        assert_eq!(clocks.pclk2, clocks.sysclk / 2);
        assert_eq!(clocks.pclk1, clocks.sysclk / 4);
    }

    #[test]
    fn reset_config_runs_on_irc16m() {
        let config = Config {
            sys_src: SysClkSrc::Irc16m,
            pll: None,
            ahb_div: AhbDiv::Div1,
            apb1_div: ApbDiv::Div1,
            apb2_div: ApbDiv::Div1,
            ..Config::default()
        };
        let clocks = compute_clocks(&config);
        assert_eq!(clocks.sysclk, Hertz::mhz(16));
        assert_eq!(clocks.pclk1, Hertz::mhz(16));
    }

    #[test]
    fn failed_init_reports_irc16m_with_prescalers() {
        let clocks = compute_clocks(&gd32f4xx::fallback(&Config::default()));
        assert_eq!(clocks.sysclk, Hertz::mhz(16));
        assert_eq!(clocks.hclk, Hertz::mhz(16));
        assert_eq!(clocks.pclk2, Hertz::mhz(8));
        assert_eq!(clocks.pclk1, Hertz::mhz(4));
    }

    #[test]
    fn missing_pll_falls_back_to_irc16m() {
        let config = Config {
            pll: None,
            ..Config::default()
        };
        assert_eq!(compute_clocks(&config).sysclk, Hertz::mhz(16));
    }
}
