//! GPIO driver for GD32F4xx
//!
//! Nine ports (GPIOA-GPIOI) of 16 pins each, 0x400 apart starting at
//! 0x4002_0000. Register layout per port:
//! - CTL:    0x00 (mode, 2 bits per pin)
//! - OMODE:  0x04 (output type, 1 bit per pin)
//! - OSPD:   0x08 (output speed, 2 bits per pin)
//! - PUD:    0x0C (pull-up/down, 2 bits per pin)
//! - ISTAT:  0x10 (input level)
//! - OCTL:   0x14 (output level)
//! - BOP:    0x18 (bit set / reset)
//! - AFSEL0: 0x20 (alternate function pins 0-7, 4 bits each)
//! - AFSEL1: 0x24 (alternate function pins 8-15)

use core::convert::Infallible;

use embassy_hal_internal::PeripheralType;

use crate::reg::{modify32, read32, with_field, write32};
use crate::{impl_peripheral, peripherals, Peri};

/// GPIOA base address
const GPIO_BASE: u32 = 0x4002_0000;

const GPIO_CTL: u32 = 0x00;
const GPIO_OMODE: u32 = 0x04;
const GPIO_OSPD: u32 = 0x08;
const GPIO_PUD: u32 = 0x0C;
const GPIO_ISTAT: u32 = 0x10;
const GPIO_OCTL: u32 = 0x14;
const GPIO_BOP: u32 = 0x18;
const GPIO_AFSEL0: u32 = 0x20;

/// GPIO port
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Port {
    A = 0,
    B = 1,
    C = 2,
    D = 3,
    E = 4,
    F = 5,
    G = 6,
    H = 7,
    I = 8,
}

/// GPIO pin mode (2 bits in CTL register)
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum PinMode {
    Input = 0,
    Output = 1,
    Alternate = 2,
    Analog = 3,
}

/// Pull setting for a pin (2 bits in PUD register)
#[derive(Debug, Eq, PartialEq, Copy, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Pull {
    #[default]
    None = 0,
    Up = 1,
    Down = 2,
}

/// Output slew speed (2 bits in OSPD register)
#[derive(Debug, Eq, PartialEq, Copy, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum Speed {
    /// 2MHz
    #[default]
    Low = 0,
    /// 25MHz
    Medium = 1,
    /// 50MHz
    High = 2,
    /// 200MHz
    Max = 3,
}

/// Output driver type (1 bit in OMODE register)
#[derive(Debug, Eq, PartialEq, Copy, Clone, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(u8)]
pub enum OutputType {
    #[default]
    PushPull = 0,
    OpenDrain = 1,
}

/// Logic level
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Level {
    Low,
    High,
}

impl From<bool> for Level {
    fn from(val: bool) -> Self {
        if val {
            Self::High
        } else {
            Self::Low
        }
    }
}

impl From<Level> for bool {
    fn from(level: Level) -> bool {
        matches!(level, Level::High)
    }
}

impl Default for Level {
    fn default() -> Self {
        Self::Low
    }
}

/// A set of pins on one port that share one alternate-function setup.
#[derive(Debug, Eq, PartialEq, Copy, Clone)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct PinGroup {
    pub port: Port,
    /// Bit mask, bit n = pin n
    pub pins: u16,
    /// Alternate function number (0..=15)
    pub af: u8,
    pub pull: Pull,
    pub speed: Speed,
    pub output: OutputType,
}

impl PinGroup {
    /// Iterate over the pin numbers selected by the mask, lowest first.
    pub fn pin_numbers(&self) -> impl Iterator<Item = u8> {
        let pins = self.pins;
        (0..16u8).filter(move |n| pins & (1 << n) != 0)
    }
}

/// Register-level pin configuration for whole [`PinGroup`]s.
///
/// Unlike [`Flex`] this does not take pin singletons; it is the bulk
/// path used by peripheral drivers that own a fixed pin map.
#[derive(Debug, Default)]
pub struct Mux {
    _private: (),
}

impl Mux {
    /// # Safety
    ///
    /// The caller must own every pin it later configures through this handle.
    pub unsafe fn steal() -> Self {
        Self { _private: () }
    }

    /// Enable the port clock and apply `group` to each of its pins.
    pub fn apply(&mut self, group: &PinGroup) {
        crate::rcc::enable_gpio_port(group.port as u8);
        for pin in group.pin_numbers() {
            let raw = AnyPin {
                pin_port: ((group.port as u8) << 4) | pin,
            };
            raw.set_af(group.af);
            raw.set_output_type(group.output);
            raw.set_speed(group.speed);
            raw.set_pull(group.pull);
            raw.set_mode(PinMode::Alternate);
        }
    }
}

/// Flexible GPIO pin that can be configured as input or output
pub struct Flex<'d> {
    pin: Peri<'d, AnyPin>,
}

impl<'d> Flex<'d> {
    #[inline]
    pub fn new<P: Pin + Into<AnyPin>>(pin: Peri<'d, P>) -> Self {
        let pin: Peri<'d, AnyPin> = pin.into();
        crate::rcc::enable_gpio_port(pin._port());
        Self { pin }
    }

    #[inline]
    pub fn set_as_input(&mut self, pull: Pull) {
        self.pin.set_pull(pull);
        self.pin.set_mode(PinMode::Input);
    }

    #[inline]
    pub fn set_as_output(&mut self, speed: Speed) {
        self.pin.set_output_type(OutputType::PushPull);
        self.pin.set_speed(speed);
        self.pin.set_mode(PinMode::Output);
    }

    #[inline]
    pub fn is_high(&self) -> bool {
        self.pin.read_input()
    }

    #[inline]
    pub fn is_low(&self) -> bool {
        !self.is_high()
    }

    #[inline]
    pub fn get_level(&self) -> Level {
        self.is_high().into()
    }

    #[inline]
    pub fn is_set_high(&self) -> bool {
        self.pin.read_output()
    }

    #[inline]
    pub fn set_high(&mut self) {
        self.pin.write_output(true);
    }

    #[inline]
    pub fn set_low(&mut self) {
        self.pin.write_output(false);
    }

    #[inline]
    pub fn set_level(&mut self, level: Level) {
        match level {
            Level::Low => self.set_low(),
            Level::High => self.set_high(),
        }
    }

    #[inline]
    pub fn toggle(&mut self) {
        if self.is_set_high() {
            self.set_low()
        } else {
            self.set_high()
        }
    }
}

/// Input pin
pub struct Input<'d> {
    pin: Flex<'d>,
}

impl<'d> Input<'d> {
    #[inline]
    pub fn new<P: Pin + Into<AnyPin>>(pin: Peri<'d, P>, pull: Pull) -> Self {
        let mut pin = Flex::new(pin);
        pin.set_as_input(pull);
        Self { pin }
    }

    #[inline]
    pub fn is_high(&self) -> bool {
        self.pin.is_high()
    }

    #[inline]
    pub fn is_low(&self) -> bool {
        self.pin.is_low()
    }

    #[inline]
    pub fn get_level(&self) -> Level {
        self.pin.get_level()
    }
}

/// Output pin
pub struct Output<'d> {
    pin: Flex<'d>,
}

impl<'d> Output<'d> {
    #[inline]
    pub fn new<P: Pin + Into<AnyPin>>(pin: Peri<'d, P>, initial_output: Level, speed: Speed) -> Self {
        let mut pin = Flex::new(pin);
        pin.set_level(initial_output);
        pin.set_as_output(speed);
        Self { pin }
    }

    #[inline]
    pub fn set_high(&mut self) {
        self.pin.set_high();
    }

    #[inline]
    pub fn set_low(&mut self) {
        self.pin.set_low();
    }

    #[inline]
    pub fn set_level(&mut self, level: Level) {
        self.pin.set_level(level)
    }

    #[inline]
    pub fn is_set_high(&self) -> bool {
        self.pin.is_set_high()
    }

    #[inline]
    pub fn is_set_low(&self) -> bool {
        !self.pin.is_set_high()
    }

    #[inline]
    pub fn get_output_level(&self) -> Level {
        self.pin.is_set_high().into()
    }

    #[inline]
    pub fn toggle(&mut self) {
        self.pin.toggle();
    }
}

// ============ Low-level pin trait ============

pub(crate) trait SealedPin {
    fn pin_port(&self) -> u8;

    #[inline]
    fn _pin(&self) -> u8 {
        self.pin_port() & 0x0F
    }

    #[inline]
    fn _port(&self) -> u8 {
        self.pin_port() >> 4
    }

    /// Get port base address
    #[inline]
    fn port_base(&self) -> u32 {
        GPIO_BASE + (self._port() as u32) * 0x400
    }

    /// Set pin mode (CTL register, 2 bits per pin)
    fn set_mode(&self, mode: PinMode) {
        let shift = self._pin() as u32 * 2;
        unsafe { modify32(self.port_base() + GPIO_CTL, |r| with_field(r, shift, 2, mode as u32)) };
    }

    /// Set pull configuration (PUD register, 2 bits per pin)
    fn set_pull(&self, pull: Pull) {
        let shift = self._pin() as u32 * 2;
        unsafe { modify32(self.port_base() + GPIO_PUD, |r| with_field(r, shift, 2, pull as u32)) };
    }

    /// Set output speed (OSPD register, 2 bits per pin)
    fn set_speed(&self, speed: Speed) {
        let shift = self._pin() as u32 * 2;
        unsafe { modify32(self.port_base() + GPIO_OSPD, |r| with_field(r, shift, 2, speed as u32)) };
    }

    /// Set output type (OMODE register, 1 bit per pin)
    fn set_output_type(&self, output: OutputType) {
        let shift = self._pin() as u32;
        unsafe { modify32(self.port_base() + GPIO_OMODE, |r| with_field(r, shift, 1, output as u32)) };
    }

    /// Select alternate function (AFSEL0/AFSEL1, 4 bits per pin)
    fn set_af(&self, af: u8) {
        let pin = self._pin() as u32;
        let addr = self.port_base() + GPIO_AFSEL0 + (pin / 8) * 4;
        unsafe { modify32(addr, |r| with_field(r, (pin % 8) * 4, 4, af as u32)) };
    }

    /// Read pin input level (ISTAT register)
    fn read_input(&self) -> bool {
        unsafe { (read32(self.port_base() + GPIO_ISTAT) >> self._pin()) & 1 != 0 }
    }

    /// Read latched output level (OCTL register)
    fn read_output(&self) -> bool {
        unsafe { (read32(self.port_base() + GPIO_OCTL) >> self._pin()) & 1 != 0 }
    }

    /// Drive pin through BOP so no read-modify-write is needed
    fn write_output(&self, high: bool) {
        let bit = 1u32 << self._pin();
        let val = if high { bit } else { bit << 16 };
        unsafe { write32(self.port_base() + GPIO_BOP, val) };
    }
}

/// GPIO Pin trait
#[allow(private_bounds)]
pub trait Pin: PeripheralType + SealedPin + Sized + 'static {
    #[inline]
    fn pin(&self) -> u8 {
        self._pin()
    }

    #[inline]
    fn port(&self) -> u8 {
        self._port()
    }

    #[inline]
    fn degrade(self) -> AnyPin {
        AnyPin {
            pin_port: self.pin_port(),
        }
    }
}

/// Type-erased GPIO pin
pub struct AnyPin {
    pin_port: u8,
}

impl AnyPin {
    #[inline]
    pub unsafe fn steal(pin_port: u8) -> Self {
        Self { pin_port }
    }
}

impl_peripheral!(AnyPin);

impl Pin for AnyPin {}

impl SealedPin for AnyPin {
    #[inline]
    fn pin_port(&self) -> u8 {
        self.pin_port
    }
}

// ============ Generate pin implementations ============

foreach_pin!(
    ($pin_name:ident, $port_name:ident, $port_num:expr, $pin_num:expr) => {
        impl Pin for peripherals::$pin_name {}

        impl SealedPin for peripherals::$pin_name {
            #[inline]
            fn pin_port(&self) -> u8 {
                ($port_num << 4) | $pin_num
            }
        }

        impl From<peripherals::$pin_name> for AnyPin {
            fn from(x: peripherals::$pin_name) -> Self {
                x.degrade()
            }
        }
    };
);

// ============ embedded-hal implementations ============

impl<'d> embedded_hal::digital::ErrorType for Input<'d> {
    type Error = Infallible;
}

impl<'d> embedded_hal::digital::InputPin for Input<'d> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok((*self).is_high())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok((*self).is_low())
    }
}

impl<'d> embedded_hal::digital::ErrorType for Output<'d> {
    type Error = Infallible;
}

impl<'d> embedded_hal::digital::OutputPin for Output<'d> {
    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set_high();
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set_low();
        Ok(())
    }
}

impl<'d> embedded_hal::digital::StatefulOutputPin for Output<'d> {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok((*self).is_set_high())
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok((*self).is_set_low())
    }
}

impl<'d> embedded_hal::digital::ErrorType for Flex<'d> {
    type Error = Infallible;
}

impl<'d> embedded_hal::digital::InputPin for Flex<'d> {
    fn is_high(&mut self) -> Result<bool, Self::Error> {
        Ok((*self).is_high())
    }

    fn is_low(&mut self) -> Result<bool, Self::Error> {
        Ok((*self).is_low())
    }
}

impl<'d> embedded_hal::digital::OutputPin for Flex<'d> {
    fn set_high(&mut self) -> Result<(), Self::Error> {
        self.set_high();
        Ok(())
    }

    fn set_low(&mut self) -> Result<(), Self::Error> {
        self.set_low();
        Ok(())
    }
}

impl<'d> embedded_hal::digital::StatefulOutputPin for Flex<'d> {
    fn is_set_high(&mut self) -> Result<bool, Self::Error> {
        Ok((*self).is_set_high())
    }

    fn is_set_low(&mut self) -> Result<bool, Self::Error> {
        Ok(!(*self).is_set_high())
    }
}
