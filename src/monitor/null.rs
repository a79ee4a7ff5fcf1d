use super::{BatteryMonitor, BatteryReading, ChipInfo};
use crate::error::Result;
use crate::registers::DUMP_LEN;

/// Stand-in used when no chip answered. Reports neutral values and never
/// fails, so "no battery hardware" is a normal operating mode for callers.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullMonitor;

impl BatteryMonitor for NullMonitor {
    fn is_available(&self) -> bool {
        false
    }

    fn battery_voltage(&mut self) -> Result<f64> {
        Ok(0.0)
    }

    fn battery_percent(&mut self) -> Result<f64> {
        Ok(0.0)
    }

    fn battery_energy(&mut self) -> Result<f64> {
        Ok(0.0)
    }

    fn is_supplied_power(&mut self) -> Result<bool> {
        Ok(false)
    }

    fn buffer_dump(&mut self) -> Result<Vec<u8>> {
        Ok(vec![0; DUMP_LEN])
    }

    fn reading(&mut self) -> Result<BatteryReading> {
        Ok(BatteryReading { voltage: 0.0, percent: 0.0, energy: 0.0, external_power: false })
    }

    fn chip_info(&mut self) -> Result<Option<ChipInfo>> {
        Ok(None)
    }

    fn close(&mut self) {}
}
