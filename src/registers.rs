//! PiSugar register map.
//!
//! These addresses come from the chip datasheet and are not configurable:
//! reading the wrong offset silently returns a different field.
//!
//! ```text
//! Address |     7      |       6        |       5        |      4        |        3         |    2    |  1   |      0
//! --------+------------+----------------+----------------+---------------+------------------+---------+------+--------------
//!    0x02 |  External  | Charge when    | Delayed System |  Auto Power   | Accidental Touch |  Power  | RSVD | Power Button
//!         | Power (RO) | powered (rw)   | Shutdown (rw)  |    On (rw)    |   Control (rw)   | On (rw) |      |  State (RO)
//!    0x03 |    RSVD    |   Automatic    |      RSVD      |     Soft      |  Soft Shutdown   |        Reserved
//!         |            | Hibernate (rw) |                | Shutdown (rw) |   Status (RO)    |
//!    0x20 |   Charge   |           Reserved              | SCL Awakening |             Reserved
//!         | Protection |                                 |     (rw)      |
//! ```

/// I2C bus the PiSugar is wired to on a Raspberry Pi.
pub const DEFAULT_BUS: u8 = 1;

/// Fixed device address.
pub const CHIP_ADDRESS: u16 = 0x57;

/// Value of [`Register::Identity`] on a PiSugar.
pub const CHIP_IDENTITY: u8 = 3;

/// Size of the register space returned by a full dump.
pub const DUMP_LEN: usize = 256;

/// Block size for dump reads.
pub const DUMP_BLOCK: u8 = 32;

/// External power present (RO).
pub const POWER_EXTERNAL_BIT: u8 = 1 << 7;
/// Power on (rw).
pub const POWER_ON_BIT: u8 = 1 << 2;
/// Power button state (RO).
pub const POWER_BUTTON_BIT: u8 = 1 << 0;

/// Write-protect register value that means "writes allowed".
pub const WRITE_PROTECT_OFF: u8 = 0x29;

/// Timed boot enabled (rw).
pub const BOOT_ENABLE_BIT: u8 = 1 << 7;

/// Firmware version: twelve ASCII bytes, NUL padded, read as one block.
pub const FIRMWARE_VERSION_START: u8 = 0xE2;
pub const FIRMWARE_VERSION_LEN: usize = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    Identity,
    PowerControl,
    ShutdownControl,
    Temperature,
    WatchdogTimeout,
    ShutdownDelay,
    BootWatchdogRetries,
    WriteProtect,
    ChargeControl,
    /// First of the two battery voltage bytes. Which one holds the high byte
    /// depends on the board revision, see [`crate::profile::ByteOrder`].
    VoltageA,
    VoltageB,
    /// Chip-computed battery percentage, also used as the energy level.
    EnergyLevel,
    RtcYear,
    RtcMonth,
    RtcDay,
    RtcWeekday,
    RtcHour,
    RtcMinute,
    RtcSecond,
    BootEnable,
    BootWeekdays,
    BootHour,
    BootMinute,
    BootSecond,
}

impl Register {
    pub const fn address(self) -> u8 {
        match self {
            Register::Identity => 0x00,
            Register::PowerControl => 0x02,
            Register::ShutdownControl => 0x03,
            Register::Temperature => 0x04,
            Register::WatchdogTimeout => 0x07,
            Register::ShutdownDelay => 0x09,
            Register::BootWatchdogRetries => 0x0A,
            Register::WriteProtect => 0x0B,
            Register::ChargeControl => 0x20,
            Register::VoltageA => 0x22,
            Register::VoltageB => 0x23,
            Register::EnergyLevel => 0x2A,
            Register::RtcYear => 0x31,
            Register::RtcMonth => 0x32,
            Register::RtcDay => 0x33,
            Register::RtcWeekday => 0x34,
            Register::RtcHour => 0x35,
            Register::RtcMinute => 0x36,
            Register::RtcSecond => 0x37,
            Register::BootEnable => 0x40,
            Register::BootWeekdays => 0x44,
            Register::BootHour => 0x45,
            Register::BootMinute => 0x46,
            Register::BootSecond => 0x47,
        }
    }
}

impl From<Register> for u8 {
    fn from(reg: Register) -> u8 {
        reg.address()
    }
}

/// Decode a packed BCD byte, as used by the RTC and boot schedule fields.
pub fn bcd_to_dec(bcd: u8) -> u8 {
    (bcd >> 4) * 10 + (bcd & 0x0F)
}
