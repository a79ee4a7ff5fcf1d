use i2cdev::core::I2CDevice;
use i2cdev::linux::LinuxI2CDevice;
use std::path::PathBuf;

use super::{BusOpener, RegisterBus};
use crate::error::{Error, Result};

/// `/dev/i2c-N` handle with the slave address already selected.
pub struct LinuxBus {
    path: PathBuf,
    dev: Option<LinuxI2CDevice>,
}

impl LinuxBus {
    pub fn open(bus: u8, address: u16) -> Result<Self> {
        let path = PathBuf::from(format!("/dev/i2c-{}", bus));
        log::debug!("Opening {} addr 0x{:02x}", path.display(), address);
        let dev = LinuxI2CDevice::new(&path, address).map_err(|e| Error::bus_open(&path, e))?;
        Ok(Self { path, dev: Some(dev) })
    }

    fn dev(&mut self) -> Result<&mut LinuxI2CDevice> {
        self.dev.as_mut().ok_or(Error::Closed)
    }
}

impl RegisterBus for LinuxBus {
    fn read_byte(&mut self, register: u8) -> Result<u8> {
        let value = self
            .dev()?
            .smbus_read_byte_data(register)
            .map_err(|e| Error::bus_read(register, e))?;
        log::debug!("i2c read 0x{:02x} = 0x{:02x}", register, value);
        Ok(value)
    }

    fn read_block(&mut self, start: u8, len: u8) -> Result<Vec<u8>> {
        let block = self
            .dev()?
            .smbus_read_i2c_block_data(start, len)
            .map_err(|e| Error::bus_read(start, e))?;
        log::debug!("i2c block read 0x{:02x}+{} -> {} bytes", start, len, block.len());
        full_block(start, len, block)
    }

    fn close(&mut self) {
        // Dropping the device closes the file descriptor.
        if self.dev.take().is_some() {
            log::debug!("Closed {}", self.path.display());
        }
    }
}

/// SMBus block reads may come back short; a short block is a failed read.
fn full_block(start: u8, len: u8, block: Vec<u8>) -> Result<Vec<u8>> {
    if block.len() != len as usize {
        return Err(Error::bus_read(
            start,
            format!("short block read: {} of {} bytes", block.len(), len),
        ));
    }
    Ok(block)
}

impl Drop for LinuxBus {
    fn drop(&mut self) {
        self.close();
    }
}

#[derive(Debug, Clone, Copy)]
pub struct LinuxOpener {
    pub bus: u8,
    pub address: u16,
}

impl BusOpener for LinuxOpener {
    type Bus = LinuxBus;

    fn open(&mut self) -> Result<LinuxBus> {
        LinuxBus::open(self.bus, self.address)
    }
}
