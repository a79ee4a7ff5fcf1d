mod null;
mod pisugar;

pub use null::NullMonitor;
pub use pisugar::PiSugar;

use chrono::{NaiveDateTime, NaiveTime};
use serde::Serialize;
use std::time::Duration;

use crate::bus::RegisterBus;
use crate::error::Result;

/// How averaged reads are paced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Sampling {
    /// Reads averaged per voltage or energy value.
    pub samples: usize,
    /// Pause between samples. The chip's ADC needs this to settle; without it
    /// consecutive samples are correlated.
    pub sample_delay: Duration,
    /// Pause before each block of a register dump.
    pub block_delay: Duration,
}

impl Default for Sampling {
    fn default() -> Self {
        Self {
            samples: 10,
            sample_delay: Duration::from_millis(50),
            block_delay: Duration::from_millis(100),
        }
    }
}

impl Sampling {
    #[cfg(test)]
    pub(crate) fn immediate() -> Self {
        Self { samples: 10, sample_delay: Duration::ZERO, block_delay: Duration::ZERO }
    }
}

/// One poll worth of telemetry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct BatteryReading {
    /// Volts.
    pub voltage: f64,
    /// Estimated state of charge. The linear curves can leave 0..=100.
    pub percent: f64,
    /// Mean raw energy level reported by the chip.
    pub energy: f64,
    pub external_power: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BootSchedule {
    pub enabled: bool,
    /// Bit N set = repeat on weekday N (0 = Sunday).
    pub weekdays: u8,
    pub time: Option<NaiveTime>,
}

/// Chip details outside the battery reading itself.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChipInfo {
    pub firmware: String,
    pub temperature_c: i16,
    pub write_protected: bool,
    pub power_on: bool,
    pub power_button: bool,
    /// Percentage as computed by the chip firmware.
    pub chip_percent: u8,
    pub rtc: Option<NaiveDateTime>,
    pub boot: BootSchedule,
}

/// What callers get from a connection, whether or not a chip was found.
pub trait BatteryMonitor {
    /// False for the stand-in used when no chip answered.
    fn is_available(&self) -> bool;

    fn battery_voltage(&mut self) -> Result<f64>;

    fn battery_percent(&mut self) -> Result<f64>;

    fn battery_energy(&mut self) -> Result<f64>;

    fn is_supplied_power(&mut self) -> Result<bool>;

    /// The full register space, for offline inspection.
    fn buffer_dump(&mut self) -> Result<Vec<u8>>;

    /// Voltage, percent, energy and power source in one go. The percentage
    /// is derived from the same averaged voltage.
    fn reading(&mut self) -> Result<BatteryReading>;

    fn chip_info(&mut self) -> Result<Option<ChipInfo>>;

    /// Release the bus. Safe to call more than once.
    fn close(&mut self);
}

/// The result of [`crate::connector::Connector::connect`].
pub enum Monitor<B: RegisterBus> {
    Connected(PiSugar<B>),
    Disconnected(NullMonitor),
}

impl<B: RegisterBus> Monitor<B> {
    pub fn disconnected() -> Self {
        Monitor::Disconnected(NullMonitor)
    }

    fn inner(&mut self) -> &mut dyn BatteryMonitor {
        match self {
            Monitor::Connected(m) => m,
            Monitor::Disconnected(m) => m,
        }
    }
}

impl<B: RegisterBus> BatteryMonitor for Monitor<B> {
    fn is_available(&self) -> bool {
        match self {
            Monitor::Connected(m) => m.is_available(),
            Monitor::Disconnected(_) => false,
        }
    }

    fn battery_voltage(&mut self) -> Result<f64> {
        self.inner().battery_voltage()
    }

    fn battery_percent(&mut self) -> Result<f64> {
        self.inner().battery_percent()
    }

    fn battery_energy(&mut self) -> Result<f64> {
        self.inner().battery_energy()
    }

    fn is_supplied_power(&mut self) -> Result<bool> {
        self.inner().is_supplied_power()
    }

    fn buffer_dump(&mut self) -> Result<Vec<u8>> {
        self.inner().buffer_dump()
    }

    fn reading(&mut self) -> Result<BatteryReading> {
        self.inner().reading()
    }

    fn chip_info(&mut self) -> Result<Option<ChipInfo>> {
        self.inner().chip_info()
    }

    fn close(&mut self) {
        self.inner().close()
    }
}
