//! In-memory chip for tests: a 256-byte register file with optional scripted
//! values, NACKs, and a record of every open, close and read.

use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::rc::Rc;

use super::{BusOpener, RegisterBus};
use crate::error::{Error, Result};
use crate::registers::{Register, CHIP_IDENTITY};

#[derive(Debug, Clone)]
pub struct FakeChip {
    registers: [u8; 256],
    scripted: HashMap<u8, VecDeque<u8>>,
    nack: HashSet<u8>,
    fail_after: Option<usize>,
}

#[derive(Debug, Default)]
pub struct BusLog {
    pub opens: usize,
    pub closes: usize,
    pub reads: Vec<u8>,
}

#[derive(Debug)]
pub struct State {
    pub chip: FakeChip,
    pub log: BusLog,
}

pub type Shared = Rc<RefCell<State>>;

impl FakeChip {
    /// Blank register file.
    pub fn empty() -> Self {
        Self {
            registers: [0; 256],
            scripted: HashMap::new(),
            nack: HashSet::new(),
            fail_after: None,
        }
    }

    /// Register file that answers the identity probe.
    pub fn pisugar() -> Self {
        Self::empty().with(Register::Identity, CHIP_IDENTITY)
    }

    pub fn with(mut self, register: impl Into<u8>, value: u8) -> Self {
        self.registers[register.into() as usize] = value;
        self
    }

    pub fn with_bytes(mut self, start: u8, bytes: &[u8]) -> Self {
        for (i, b) in bytes.iter().enumerate() {
            self.registers[start as usize + i] = *b;
        }
        self
    }

    /// Successive reads of `register` return `values` in order, then fall
    /// back to the static register contents.
    pub fn script(mut self, register: impl Into<u8>, values: &[u8]) -> Self {
        self.scripted.insert(register.into(), values.iter().copied().collect());
        self
    }

    pub fn nack(mut self, register: impl Into<u8>) -> Self {
        self.nack.insert(register.into());
        self
    }

    /// Every read after the first `n` fails.
    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn into_bus(self) -> (FakeBus, Shared) {
        let state = Rc::new(RefCell::new(State { chip: self, log: BusLog::default() }));
        state.borrow_mut().log.opens += 1;
        (FakeBus { state: state.clone(), open: true }, state)
    }

    fn read(&mut self, log: &mut BusLog, register: u8) -> Result<u8> {
        if self.nack.contains(&register) {
            return Err(Error::bus_read(register, "no acknowledge"));
        }
        if let Some(n) = self.fail_after {
            if log.reads.len() >= n {
                return Err(Error::bus_read(register, "bus fault"));
            }
        }
        log.reads.push(register);
        if let Some(queue) = self.scripted.get_mut(&register) {
            if let Some(v) = queue.pop_front() {
                return Ok(v);
            }
        }
        Ok(self.registers[register as usize])
    }
}

pub struct FakeBus {
    state: Shared,
    open: bool,
}

impl RegisterBus for FakeBus {
    fn read_byte(&mut self, register: u8) -> Result<u8> {
        if !self.open {
            return Err(Error::Closed);
        }
        let mut state = self.state.borrow_mut();
        let State { chip, log } = &mut *state;
        chip.read(log, register)
    }

    fn read_block(&mut self, start: u8, len: u8) -> Result<Vec<u8>> {
        (0..len).map(|i| self.read_byte(start.wrapping_add(i))).collect()
    }

    fn close(&mut self) {
        if self.open {
            self.open = false;
            self.state.borrow_mut().log.closes += 1;
        }
    }
}

pub struct FakeOpener {
    chip: FakeChip,
    fail: bool,
    pub state: Option<Shared>,
}

impl FakeOpener {
    pub fn new(chip: FakeChip) -> Self {
        Self { chip, fail: false, state: None }
    }

    /// An opener whose bus device does not exist.
    pub fn missing() -> Self {
        Self { chip: FakeChip::empty(), fail: true, state: None }
    }

    pub fn log(&self) -> (usize, usize) {
        match &self.state {
            Some(s) => {
                let s = s.borrow();
                (s.log.opens, s.log.closes)
            }
            None => (0, 0),
        }
    }
}

impl BusOpener for FakeOpener {
    type Bus = FakeBus;

    fn open(&mut self) -> Result<FakeBus> {
        if self.fail {
            return Err(Error::bus_open("/dev/i2c-fake", "no such device"));
        }
        let (bus, state) = self.chip.clone().into_bus();
        self.state = Some(state);
        Ok(bus)
    }
}
