//! Raw register I/O against the chip. No interpretation happens here.

mod linux;

#[cfg(test)]
pub mod fake;

pub use linux::{LinuxBus, LinuxOpener};

use crate::error::Result;

pub trait RegisterBus {
    /// Read a single register of the chip.
    fn read_byte(&mut self, register: u8) -> Result<u8>;

    /// Read `len` consecutive registers starting at `start`.
    fn read_block(&mut self, start: u8, len: u8) -> Result<Vec<u8>>;

    /// Release the handle. Calling this on a closed bus does nothing.
    fn close(&mut self);
}

/// Opens a bus handle bound to the chip address.
pub trait BusOpener {
    type Bus: RegisterBus;

    fn open(&mut self) -> Result<Self::Bus>;
}
