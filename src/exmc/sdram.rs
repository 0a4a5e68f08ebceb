//! SDRAM bring-up and low-power transitions.
//!
//! Bring-up follows the JEDEC power-up order: clock enable, 10ms settle,
//! precharge all, auto-refresh burst, load mode register, refresh timer.
//! Every hand-off to the controller is guarded by a bounded poll of the
//! not-ready flag; the first exhausted budget aborts the sequence.

use core::marker::PhantomData;

use embedded_hal::delay::DelayNs;

use super::command::{Command, CommandKind};
use super::profile::{
    refresh_count, InterfaceProfile, TimingProfile, CAPACITY, CTL_SHARED_MASK, INIT_AUTO_REFRESH, MODE_REGISTER,
    REFRESH_MARGIN, REFRESH_PERIOD_NS, TCFG_SHARED_MASK,
};
use super::window::SdramWindow;
use super::{BankStatus, Device, Error, ExmcBus, Mmio, PinMux, Stage, SDARI, SDCMD, SDSTAT, SDSTAT_NRDY};
use crate::gpio::Mux;
use crate::peripherals::EXMC;
use crate::poll::{wait_until, DEFAULT_BUDGET};
use crate::reg::with_field;
use crate::time::Hertz;
use crate::Peri;

/// SDRAM driver configuration
#[derive(Clone, Copy, Debug)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Config {
    /// Clock the refresh interval is counted in
    pub refresh_clock: Hertz,
    /// Polls granted to each wait for the controller
    pub poll_budget: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            refresh_clock: Hertz::mhz(100),
            poll_budget: DEFAULT_BUDGET,
        }
    }
}

#[derive(Clone, Copy)]
enum Action {
    Issue { kind: CommandKind, auto_refresh: u8, mode: u16 },
    Settle { ms: u32 },
    ProgramRefresh,
}

#[derive(Clone, Copy)]
struct Step {
    stage: Stage,
    wait_before: bool,
    action: Action,
    wait_after: bool,
    status_after: Option<BankStatus>,
}

impl Step {
    const fn issue(stage: Stage, kind: CommandKind, auto_refresh: u8, mode: u16) -> Self {
        Self {
            stage,
            wait_before: true,
            action: Action::Issue {
                kind,
                auto_refresh,
                mode,
            },
            wait_after: false,
            status_after: None,
        }
    }
}

const INIT_SEQUENCE: [Step; 6] = [
    Step::issue(Stage::ClockEnable, CommandKind::ClockEnable, 2, 0),
    Step {
        stage: Stage::Settle,
        wait_before: false,
        action: Action::Settle { ms: 10 },
        wait_after: false,
        status_after: None,
    },
    Step::issue(Stage::PrechargeAll, CommandKind::PrechargeAll, 2, 0),
    Step::issue(Stage::AutoRefresh, CommandKind::AutoRefresh, INIT_AUTO_REFRESH, 0),
    Step::issue(Stage::LoadModeRegister, CommandKind::LoadModeRegister, 2, MODE_REGISTER.bits()),
    Step {
        stage: Stage::ProgramRefreshInterval,
        wait_before: false,
        action: Action::ProgramRefresh,
        wait_after: true,
        status_after: None,
    },
];

const SELF_REFRESH_ENTRY: [Step; 1] = [Step {
    wait_after: true,
    status_after: Some(BankStatus::SelfRefresh),
    ..Step::issue(Stage::SelfRefreshEntry, CommandKind::SelfRefresh, 1, 0)
}];

const SELF_REFRESH_EXIT: [Step; 1] = [Step {
    wait_after: true,
    status_after: Some(BankStatus::Normal),
    ..Step::issue(Stage::SelfRefreshExit, CommandKind::NormalOperation, 2, 0)
}];

struct NoDelay;

impl DelayNs for NoDelay {
    fn delay_ns(&mut self, _ns: u32) {}
}

/// One SDRAM device behind the EXMC.
pub struct Sdram<'d, B = Mmio<'d>, M = Mux> {
    bus: B,
    mux: M,
    device: Device,
    config: Config,
    initialized: bool,
    _phantom: PhantomData<&'d mut ()>,
}

impl<'d> Sdram<'d> {
    /// Driver on the memory-mapped controller.
    ///
    /// The SDRAM pins of `device` (see [`Device::pins`]) are reconfigured by
    /// [`Sdram::init`] and must not be used for anything else.
    pub fn new(exmc: Peri<'d, EXMC>, device: Device, config: Config) -> Self {
        Self::with_parts(Mmio::new(exmc), unsafe { Mux::steal() }, device, config)
    }
}

impl<'d, B: ExmcBus, M: PinMux> Sdram<'d, B, M> {
    /// Driver on an arbitrary register file and pin multiplexer.
    pub fn with_parts(bus: B, mux: M, device: Device, config: Config) -> Self {
        Self {
            bus,
            mux,
            device,
            config,
            initialized: false,
            _phantom: PhantomData,
        }
    }

    pub fn device(&self) -> Device {
        self.device
    }

    /// Run the full bring-up sequence.
    ///
    /// Can be called again after a failure; every run starts from scratch.
    pub fn init(&mut self, delay: &mut impl DelayNs) -> Result<(), Error> {
        self.initialized = false;

        self.setup_pins();
        self.program_interface(&InterfaceProfile::MT48LC16M16A2, &TimingProfile::MT48LC16M16A2);
        self.run(&INIT_SEQUENCE, delay)?;

        self.initialized = true;
        info!("sdram: {} initialized", self.device);
        Ok(())
    }

    /// Write one command to the controller. No status, no retry.
    pub fn issue(&mut self, command: Command) {
        trace!("sdram: command {:#x}", command.bits());
        self.bus.write(SDCMD, command.bits());
    }

    /// Controller accepts a new command
    pub fn is_ready(&mut self) -> bool {
        self.bus.read(SDSTAT) & SDSTAT_NRDY == 0
    }

    /// Bank state of this device as reported by the controller
    pub fn bank_status(&mut self) -> BankStatus {
        BankStatus::from_bits(self.bus.read(SDSTAT) >> self.device.status_shift())
    }

    /// The device's address window. Only available while the device is
    /// initialized and in normal mode.
    pub fn window(&mut self) -> Result<SdramWindow<'_>, Error> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        let actual = self.bank_status();
        if actual != BankStatus::Normal {
            return Err(Error::Status {
                expected: BankStatus::Normal,
                actual,
            });
        }
        let base = self.bus.window_base(self.device);
        // SAFETY: ExmcBus guarantees `base` is valid for CAPACITY bytes while borrowed.
        Ok(unsafe { SdramWindow::from_raw_parts(base, CAPACITY) })
    }

    /// Put the device into self-refresh. Contents are kept while the core
    /// sleeps.
    pub fn enter_self_refresh(&mut self) -> Result<(), Error> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        self.run(&SELF_REFRESH_ENTRY, &mut NoDelay)
    }

    /// Return the device to normal operation.
    pub fn exit_self_refresh(&mut self) -> Result<(), Error> {
        if !self.initialized {
            return Err(Error::NotInitialized);
        }
        self.run(&SELF_REFRESH_EXIT, &mut NoDelay)
    }

    fn setup_pins(&mut self) {
        let pins = self.device.pins();
        self.mux.enable_clocks(pins);
        for group in pins {
            self.mux.configure(group);
        }
    }

    fn program_interface(&mut self, interface: &InterfaceProfile, timing: &TimingProfile) {
        let ctl = interface.bits();
        let tcfg = timing.bits();

        match self.device {
            Device::Device0 => {
                self.bus.write(Device::Device0.ctl_offset(), ctl);
                self.bus.write(Device::Device0.tcfg_offset(), tcfg);
            }
            Device::Device1 => {
                // SDCLK, BRSTRD, PIPED, ARFD and RPD only exist for device 0
                self.bus.modify(Device::Device0.ctl_offset(), |r| {
                    (r & !CTL_SHARED_MASK) | (ctl & CTL_SHARED_MASK)
                });
                self.bus.write(Device::Device1.ctl_offset(), ctl & !CTL_SHARED_MASK);
                self.bus.modify(Device::Device0.tcfg_offset(), |r| {
                    (r & !TCFG_SHARED_MASK) | (tcfg & TCFG_SHARED_MASK)
                });
                self.bus.write(Device::Device1.tcfg_offset(), tcfg & !TCFG_SHARED_MASK);
            }
        }
    }

    fn program_refresh(&mut self) -> Result<(), Error> {
        let count = refresh_count(REFRESH_PERIOD_NS, self.config.refresh_clock, REFRESH_MARGIN).map_err(|e| {
            error!("sdram: refresh counter out of range");
            e
        })?;
        debug!("sdram: refresh counter {}", count);
        self.bus.modify(SDARI, |r| with_field(r, 1, 13, count as u32));
        Ok(())
    }

    fn run(&mut self, steps: &[Step], delay: &mut impl DelayNs) -> Result<(), Error> {
        for step in steps {
            trace!("sdram: {}", step.stage);
            if step.wait_before {
                self.wait_ready(step.stage)?;
            }
            match step.action {
                Action::Issue {
                    kind,
                    auto_refresh,
                    mode,
                } => {
                    let command = Command::new(kind, self.device)
                        .auto_refresh(auto_refresh)
                        .mode_register(mode);
                    self.issue(command);
                }
                Action::Settle { ms } => delay.delay_ms(ms),
                Action::ProgramRefresh => self.program_refresh()?,
            }
            if step.wait_after {
                self.wait_ready(step.stage)?;
            }
            if let Some(expected) = step.status_after {
                self.wait_status(expected)?;
            }
        }
        Ok(())
    }

    fn wait_ready(&mut self, stage: Stage) -> Result<(), Error> {
        wait_until(self.config.poll_budget, || self.is_ready()).map_err(|_| {
            error!("sdram: controller busy at {}", stage);
            Error::Timeout(stage)
        })
    }

    fn wait_status(&mut self, expected: BankStatus) -> Result<(), Error> {
        let mut actual = self.bank_status();
        let result = wait_until(self.config.poll_budget, || {
            actual = self.bank_status();
            actual == expected
        });
        result.map_err(|_| {
            error!("sdram: bank stuck in {}", actual);
            Error::Status { expected, actual }
        })
    }
}

#[cfg(test)]
mod tests {
    use std::vec;
    use std::vec::Vec;

    use super::*;
    use crate::exmc::mock::{MockBus, MockDelay, MockMux};
    use crate::exmc::window::fill_buffer;

    fn sdram<'a>(
        bus: &'a mut MockBus,
        mux: &'a mut MockMux,
        device: Device,
    ) -> Sdram<'a, &'a mut MockBus, &'a mut MockMux> {
        Sdram::with_parts(bus, mux, device, Config::default())
    }

    #[test]
    fn init_sequence_order() {
        let mut bus = MockBus::new();
        bus.busy_reads = 3;
        let mut mux = MockMux::default();
        let mut delay = MockDelay::default();

        let mut sdram = sdram(&mut bus, &mut mux, Device::Device0);
        assert_eq!(sdram.init(&mut delay), Ok(()));

        assert_eq!(bus.commands, vec![0x31, 0x32, 0x113, 0x0004_6034]);
        assert_eq!(bus.reg(Device::Device0.ctl_offset()), 0x5DD9);
        assert_eq!(bus.reg(Device::Device0.tcfg_offset()), 0x0221_6471);
        assert_eq!(bus.reg(SDARI), 761 << 1);
        assert!(delay.total_ns >= 10_000_000);
    }

    #[test]
    fn settle_runs_between_clock_enable_and_precharge() {
        let mut bus = MockBus::new();
        let mut mux = MockMux::default();
        let mut delay = bus.delay();

        sdram(&mut bus, &mut mux, Device::Device0).init(&mut delay).unwrap();

        // Only the clock-enable command precedes the settle time
        assert!(!delay.waits.is_empty());
        assert!(delay.waits.iter().all(|&accepted| accepted == 1));
        assert_eq!(delay.total_ns, 10_000_000);
        assert_eq!(bus.commands[0] & 0x7, 1);
        assert_eq!(bus.commands[1] & 0x7, 2);
    }

    #[test]
    fn init_configures_device_pins() {
        let mut bus = MockBus::new();
        let mut mux = MockMux::default();

        sdram(&mut bus, &mut mux, Device::Device1)
            .init(&mut MockDelay::default())
            .unwrap();

        assert_eq!(mux.clocks, Device::Device1.pins().len());
        assert_eq!(mux.configured, Device::Device1.pins().to_vec());
    }

    #[test]
    fn init_twice_is_idempotent() {
        let mut bus = MockBus::new();
        let mut mux = MockMux::default();
        let mut delay = MockDelay::default();

        let first = sdram(&mut bus, &mut mux, Device::Device0).init(&mut delay);
        let regs = bus.regs;
        bus.commands.clear();

        let second = sdram(&mut bus, &mut mux, Device::Device0).init(&mut delay);
        assert_eq!(first, second);
        assert_eq!(bus.regs, regs);
        assert_eq!(bus.commands.len(), 4);
    }

    #[test]
    fn device1_shares_device0_fields() {
        let mut bus = MockBus::new();
        let mut mux = MockMux::default();
        // Device 0 settings that must survive
        bus.set_reg(Device::Device0.ctl_offset(), 0x01D9);
        bus.set_reg(Device::Device0.tcfg_offset(), 0x0201_0471);

        sdram(&mut bus, &mut mux, Device::Device1)
            .init(&mut MockDelay::default())
            .unwrap();

        assert_eq!(bus.reg(Device::Device0.ctl_offset()), 0x5DD9);
        assert_eq!(bus.reg(Device::Device1.ctl_offset()), 0x01D9);
        assert_eq!(bus.reg(Device::Device0.tcfg_offset()), 0x0221_6471);
        assert_eq!(bus.reg(Device::Device1.tcfg_offset()), 0x0201_0471);
        assert_eq!(bus.commands[0], 0x29);
    }

    #[test]
    fn never_ready_fails_first_step() {
        let mut bus = MockBus::new();
        bus.never_ready = true;
        let mut mux = MockMux::default();

        let result = sdram(&mut bus, &mut mux, Device::Device0).init(&mut MockDelay::default());
        assert_eq!(result, Err(Error::Timeout(Stage::ClockEnable)));
        assert!(bus.commands.is_empty());
    }

    #[test]
    fn every_step_times_out() {
        let stages = [
            Stage::ClockEnable,
            Stage::PrechargeAll,
            Stage::AutoRefresh,
            Stage::LoadModeRegister,
            Stage::ProgramRefreshInterval,
        ];
        for (accepted, stage) in stages.iter().enumerate() {
            let mut bus = MockBus::new();
            bus.stuck_after = Some(accepted);
            let mut mux = MockMux::default();

            let mut sdram = sdram(&mut bus, &mut mux, Device::Device0);
            assert_eq!(sdram.init(&mut MockDelay::default()), Err(Error::Timeout(*stage)));
            assert_eq!(sdram.window().err(), Some(Error::NotInitialized));
            assert_eq!(bus.commands.len(), accepted);
        }
    }

    #[test]
    fn small_budget_is_honoured() {
        let mut bus = MockBus::new();
        bus.busy_reads = 10;
        let mut mux = MockMux::default();
        let config = Config {
            poll_budget: 5,
            ..Config::default()
        };

        let mut sdram = Sdram::with_parts(&mut bus, &mut mux, Device::Device0, config);
        // first poll passes (nothing issued yet), second waits out 10 busy reads
        assert_eq!(sdram.init(&mut MockDelay::default()), Err(Error::Timeout(Stage::PrechargeAll)));
    }

    #[test]
    fn refresh_out_of_range_aborts() {
        let mut bus = MockBus::new();
        let mut mux = MockMux::default();
        let config = Config {
            refresh_clock: Hertz::mhz(2),
            ..Config::default()
        };

        let mut sdram = Sdram::with_parts(&mut bus, &mut mux, Device::Device0, config);
        assert_eq!(sdram.init(&mut MockDelay::default()), Err(Error::RefreshOutOfRange(0)));
        assert_eq!(bus.reg(SDARI), 0);
    }

    #[test]
    fn self_refresh_round_trip() {
        let mut bus = MockBus::new();
        bus.busy_reads = 2;
        let mut mux = MockMux::default();

        let mut sdram = sdram(&mut bus, &mut mux, Device::Device0);
        sdram.init(&mut MockDelay::default()).unwrap();

        sdram.window().unwrap().write_u16(0x100, &[0xBEEF]).unwrap();

        assert_eq!(sdram.enter_self_refresh(), Ok(()));
        assert_eq!(sdram.bank_status(), BankStatus::SelfRefresh);
        assert!(matches!(sdram.window(), Err(Error::Status { .. })));

        assert_eq!(sdram.exit_self_refresh(), Ok(()));
        assert_eq!(sdram.bank_status(), BankStatus::Normal);

        let mut word = [0u16; 1];
        sdram.window().unwrap().read_u16(0x100, &mut word).unwrap();
        assert_eq!(word, [0xBEEF]);

        assert_eq!(&bus.commands[4..], &[0x15, 0x30]);
    }

    #[test]
    fn self_refresh_requires_init() {
        let mut bus = MockBus::new();
        let mut mux = MockMux::default();

        let mut sdram = sdram(&mut bus, &mut mux, Device::Device0);
        assert_eq!(sdram.enter_self_refresh(), Err(Error::NotInitialized));
        assert_eq!(sdram.exit_self_refresh(), Err(Error::NotInitialized));
        assert!(bus.commands.is_empty());
    }

    #[test]
    fn self_refresh_never_ready_is_bounded() {
        let mut bus = MockBus::new();
        let mut mux = MockMux::default();

        sdram(&mut bus, &mut mux, Device::Device0)
            .init(&mut MockDelay::default())
            .unwrap();
        bus.never_ready = true;

        let mut sdram = sdram_initialized(&mut bus, &mut mux);
        assert_eq!(sdram.enter_self_refresh(), Err(Error::Timeout(Stage::SelfRefreshEntry)));
        assert_eq!(sdram.exit_self_refresh(), Err(Error::Timeout(Stage::SelfRefreshExit)));
    }

    #[test]
    fn self_refresh_status_stuck_is_bounded() {
        let mut bus = MockBus::new();
        bus.status_stuck = true;
        let mut mux = MockMux::default();

        let mut sdram = sdram(&mut bus, &mut mux, Device::Device0);
        sdram.init(&mut MockDelay::default()).unwrap();
        assert_eq!(
            sdram.enter_self_refresh(),
            Err(Error::Status {
                expected: BankStatus::SelfRefresh,
                actual: BankStatus::Normal,
            })
        );
    }

    #[test]
    fn device1_status_field() {
        let mut bus = MockBus::new();
        let mut mux = MockMux::default();

        let mut sdram = sdram(&mut bus, &mut mux, Device::Device1);
        sdram.init(&mut MockDelay::default()).unwrap();
        sdram.enter_self_refresh().unwrap();
        assert_eq!(bus.reg(SDSTAT) & 0x1E, 0x08);
    }

    #[test]
    fn end_to_end_halfword_transfer() {
        let mut bus = MockBus::new();
        bus.busy_reads = 1;
        let mut mux = MockMux::default();

        let mut sdram = sdram(&mut bus, &mut mux, Device::Device0);
        sdram.init(&mut MockDelay::default()).unwrap();

        let mut tx = [0u8; 1024];
        fill_buffer(&mut tx, 0);
        let words: Vec<u16> = tx.chunks(2).map(|c| u16::from_le_bytes([c[0], c[1]])).collect();
        assert_eq!(words.len(), 512);

        let mut window = sdram.window().unwrap();
        window.write_u16(0, &words).unwrap();

        let mut rx_words = vec![0u16; 512];
        window.read_u16(0, &mut rx_words).unwrap();
        let rx: Vec<u8> = rx_words.iter().flat_map(|w| w.to_le_bytes()).collect();
        assert_eq!(first_mismatch(&tx, &rx), None);

        // corrupt one byte behind the controller's back
        bus.memory_mut()[700] ^= 0x40;
        let mut sdram = sdram_initialized(&mut bus, &mut mux);
        sdram.window().unwrap().read_u16(0, &mut rx_words).unwrap();
        let rx: Vec<u8> = rx_words.iter().flat_map(|w| w.to_le_bytes()).collect();
        assert_eq!(first_mismatch(&tx, &rx), Some(700));
    }

    #[test]
    fn end_to_end_byte_transfer() {
        let mut bus = MockBus::new();
        let mut mux = MockMux::default();

        let mut sdram = sdram(&mut bus, &mut mux, Device::Device0);
        sdram.init(&mut MockDelay::default()).unwrap();

        let mut tx = [0u8; 300];
        fill_buffer(&mut tx, 0x10);
        let mut window = sdram.window().unwrap();
        window.write_u8(CAPACITY - tx.len(), &tx).unwrap();

        let mut rx = [0u8; 300];
        window.read_u8(CAPACITY - rx.len(), &mut rx).unwrap();
        assert_eq!(first_mismatch(&tx, &rx), None);
    }

    fn sdram_initialized<'a>(
        bus: &'a mut MockBus,
        mux: &'a mut MockMux,
    ) -> Sdram<'a, &'a mut MockBus, &'a mut MockMux> {
        let mut sdram = sdram(bus, mux, Device::Device0);
        sdram.initialized = true;
        sdram
    }

    fn first_mismatch(a: &[u8], b: &[u8]) -> Option<usize> {
        a.iter().zip(b).position(|(x, y)| x != y)
    }
}
