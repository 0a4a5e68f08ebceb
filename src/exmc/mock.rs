//! Simulated EXMC for host tests.

use core::cell::Cell;
use std::rc::Rc;
use std::vec;
use std::vec::Vec;

use embedded_hal::delay::DelayNs;

use super::{Device, ExmcBus, PinGroup, PinMux, CAPACITY, SDCMD, SDCTL0, SDSTAT, SDSTAT_NRDY};

const REG_COUNT: usize = 8;

/// Controller model: registers, a command log and backing memory for one
/// device window.
pub(crate) struct MockBus {
    pub regs: [u32; REG_COUNT],
    pub commands: Vec<u32>,
    /// SDSTAT reads reporting busy after every command
    pub busy_reads: u32,
    /// Controller never becomes ready
    pub never_ready: bool,
    /// Controller hangs once this many commands were accepted
    pub stuck_after: Option<usize>,
    /// Commands do not change the bank status
    pub status_stuck: bool,
    busy_left: u32,
    accepted: Rc<Cell<usize>>,
    memory: Vec<u16>,
}

impl MockBus {
    pub fn new() -> Self {
        Self {
            regs: [0; REG_COUNT],
            commands: Vec::new(),
            busy_reads: 0,
            never_ready: false,
            stuck_after: None,
            status_stuck: false,
            busy_left: 0,
            accepted: Rc::new(Cell::new(0)),
            memory: vec![0; CAPACITY / 2],
        }
    }

    fn index(offset: u32) -> usize {
        ((offset - SDCTL0) / 4) as usize
    }

    pub fn reg(&self, offset: u32) -> u32 {
        self.regs[Self::index(offset)]
    }

    pub fn set_reg(&mut self, offset: u32, value: u32) {
        self.regs[Self::index(offset)] = value;
    }

    /// Device memory as bytes, bypassing the controller
    pub fn memory_mut(&mut self) -> &mut [u8] {
        let len = self.memory.len() * 2;
        unsafe { core::slice::from_raw_parts_mut(self.memory.as_mut_ptr() as *mut u8, len) }
    }

    /// Delay that logs how many commands the controller had accepted when
    /// each wait started
    pub fn delay(&self) -> MockDelay {
        MockDelay {
            accepted: Some(self.accepted.clone()),
            ..MockDelay::default()
        }
    }

    fn busy(&mut self) -> bool {
        if self.never_ready {
            return true;
        }
        if self.stuck_after.is_some_and(|n| self.commands.len() >= n) {
            return true;
        }
        if self.busy_left > 0 {
            self.busy_left -= 1;
            return true;
        }
        false
    }

    fn execute(&mut self, command: u32) {
        self.commands.push(command);
        self.accepted.set(self.commands.len());
        self.busy_left = self.busy_reads;
        if self.status_stuck {
            return;
        }
        let status = match command & 0x7 {
            0 => 0,
            5 => 1,
            6 => 2,
            _ => return,
        };
        for device in [Device::Device0, Device::Device1] {
            if command & device.select_bit() != 0 {
                let shift = device.status_shift();
                let stat = self.reg(SDSTAT);
                self.set_reg(SDSTAT, (stat & !(0x3 << shift)) | (status << shift));
            }
        }
    }
}

unsafe impl ExmcBus for MockBus {
    fn read(&mut self, offset: u32) -> u32 {
        let value = self.reg(offset);
        if offset == SDSTAT && self.busy() {
            value | SDSTAT_NRDY
        } else {
            value
        }
    }

    fn write(&mut self, offset: u32, value: u32) {
        if offset == SDCMD {
            self.execute(value);
        } else {
            self.set_reg(offset, value);
        }
    }

    fn window_base(&mut self, _device: Device) -> *mut u8 {
        self.memory.as_mut_ptr() as *mut u8
    }
}

#[derive(Default)]
pub(crate) struct MockMux {
    /// Groups passed to `enable_clocks`
    pub clocks: usize,
    pub configured: Vec<PinGroup>,
}

impl PinMux for MockMux {
    fn enable_clocks(&mut self, groups: &[PinGroup]) {
        self.clocks += groups.len();
    }

    fn configure(&mut self, group: &PinGroup) {
        self.configured.push(*group);
    }
}

#[derive(Default)]
pub(crate) struct MockDelay {
    pub total_ns: u64,
    /// Commands accepted before each wait, if tied to a bus
    pub waits: Vec<usize>,
    accepted: Option<Rc<Cell<usize>>>,
}

impl DelayNs for MockDelay {
    fn delay_ns(&mut self, ns: u32) {
        self.total_ns += ns as u64;
        if let Some(accepted) = &self.accepted {
            self.waits.push(accepted.get());
        }
    }
}
