use chrono::{NaiveDate, NaiveDateTime, NaiveTime};
use std::thread;
use std::time::Duration;

use super::{BatteryMonitor, BatteryReading, BootSchedule, ChipInfo, Sampling};
use crate::bus::RegisterBus;
use crate::error::{Error, Result};
use crate::profile::ChipProfile;
use crate::registers::{
    bcd_to_dec, Register, BOOT_ENABLE_BIT, CHIP_IDENTITY, DUMP_BLOCK, DUMP_LEN,
    FIRMWARE_VERSION_LEN, FIRMWARE_VERSION_START, POWER_BUTTON_BIT, POWER_EXTERNAL_BIT,
    POWER_ON_BIT, WRITE_PROTECT_OFF,
};

/// Live monitor bound to a bus on which the identity probe succeeded.
pub struct PiSugar<B: RegisterBus> {
    bus: Option<B>,
    profile: ChipProfile,
    sampling: Sampling,
    pause: fn(Duration),
}

impl<B: RegisterBus> PiSugar<B> {
    /// Check the identity register and take ownership of `bus` if it is a
    /// PiSugar. On any failure the bus is closed before returning.
    pub fn probe(mut bus: B, profile: ChipProfile, sampling: Sampling) -> Result<Self> {
        match bus.read_byte(Register::Identity.address()) {
            Ok(CHIP_IDENTITY) => Ok(Self {
                bus: Some(bus),
                profile,
                sampling,
                pause: thread::sleep,
            }),
            Ok(found) => {
                bus.close();
                Err(Error::IdentityMismatch { found, expected: CHIP_IDENTITY })
            }
            Err(e) => {
                bus.close();
                Err(e)
            }
        }
    }

    pub fn profile(&self) -> &ChipProfile {
        &self.profile
    }

    /// Replace the sleep used between samples and before dump blocks.
    #[cfg(test)]
    pub(crate) fn with_pause(mut self, pause: fn(Duration)) -> Self {
        self.pause = pause;
        self
    }

    fn read(&mut self, reg: Register) -> Result<u8> {
        self.bus.as_mut().ok_or(Error::Closed)?.read_byte(reg.address())
    }

    fn read_block(&mut self, start: u8, len: u8) -> Result<Vec<u8>> {
        self.bus.as_mut().ok_or(Error::Closed)?.read_block(start, len)
    }

    /// Mean of `samples` calls to `sample`, pausing between them. A failed
    /// sample fails the whole read.
    fn average(&mut self, mut sample: impl FnMut(&mut Self) -> Result<f64>) -> Result<f64> {
        let n = self.sampling.samples.max(1);
        let mut sum = 0.0;
        for i in 0..n {
            if i > 0 {
                self.settle(self.sampling.sample_delay);
            }
            sum += sample(self)?;
        }
        Ok(sum / n as f64)
    }

    fn settle(&self, delay: Duration) {
        if !delay.is_zero() {
            (self.pause)(delay);
        }
    }

    pub fn temperature(&mut self) -> Result<i16> {
        Ok(self.read(Register::Temperature)? as i16 - 40)
    }

    pub fn firmware_version(&mut self) -> Result<String> {
        let raw = self.read_block(FIRMWARE_VERSION_START, FIRMWARE_VERSION_LEN as u8)?;
        Ok(String::from_utf8_lossy(&raw)
            .trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
            .to_string())
    }

    pub fn write_protected(&mut self) -> Result<bool> {
        Ok(self.read(Register::WriteProtect)? != WRITE_PROTECT_OFF)
    }

    pub fn chip_percent(&mut self) -> Result<u8> {
        self.read(Register::EnergyLevel)
    }

    /// `None` if the RTC holds an impossible date.
    pub fn rtc_time(&mut self) -> Result<Option<NaiveDateTime>> {
        let yy = bcd_to_dec(self.read(Register::RtcYear)?);
        let mm = bcd_to_dec(self.read(Register::RtcMonth)?);
        let dd = bcd_to_dec(self.read(Register::RtcDay)?);
        let hh = bcd_to_dec(self.read(Register::RtcHour)?);
        let mn = bcd_to_dec(self.read(Register::RtcMinute)?);
        let ss = bcd_to_dec(self.read(Register::RtcSecond)?);
        let date = NaiveDate::from_ymd_opt(2000 + yy as i32, mm as u32, dd as u32);
        let time = NaiveTime::from_hms_opt(hh as u32, mn as u32, ss as u32);
        Ok(date.zip(time).map(|(d, t)| d.and_time(t)))
    }

    pub fn boot_schedule(&mut self) -> Result<BootSchedule> {
        let enabled = self.read(Register::BootEnable)? & BOOT_ENABLE_BIT != 0;
        let weekdays = self.read(Register::BootWeekdays)?;
        let hh = bcd_to_dec(self.read(Register::BootHour)?);
        let mn = bcd_to_dec(self.read(Register::BootMinute)?);
        let ss = bcd_to_dec(self.read(Register::BootSecond)?);
        Ok(BootSchedule {
            enabled,
            weekdays,
            time: NaiveTime::from_hms_opt(hh as u32, mn as u32, ss as u32),
        })
    }
}

impl<B: RegisterBus> BatteryMonitor for PiSugar<B> {
    fn is_available(&self) -> bool {
        self.bus.is_some()
    }

    fn battery_voltage(&mut self) -> Result<f64> {
        let (high, low) = self.profile.byte_order.registers();
        self.average(|m| {
            let h = m.read(high)?;
            let l = m.read(low)?;
            Ok(m.profile.volts(h, l))
        })
    }

    fn battery_percent(&mut self) -> Result<f64> {
        let volts = self.battery_voltage()?;
        Ok(self.profile.percent(volts))
    }

    fn battery_energy(&mut self) -> Result<f64> {
        self.average(|m| Ok(m.read(Register::EnergyLevel)? as f64))
    }

    fn is_supplied_power(&mut self) -> Result<bool> {
        Ok(self.read(Register::PowerControl)? & POWER_EXTERNAL_BIT != 0)
    }

    fn buffer_dump(&mut self) -> Result<Vec<u8>> {
        let mut buffer = Vec::with_capacity(DUMP_LEN);
        for start in (0..DUMP_LEN).step_by(DUMP_BLOCK as usize) {
            self.settle(self.sampling.block_delay);
            buffer.extend(self.read_block(start as u8, DUMP_BLOCK)?);
        }
        Ok(buffer)
    }

    fn reading(&mut self) -> Result<BatteryReading> {
        let voltage = self.battery_voltage()?;
        let energy = self.battery_energy()?;
        let external_power = self.is_supplied_power()?;
        Ok(BatteryReading {
            voltage,
            percent: self.profile.percent(voltage),
            energy,
            external_power,
        })
    }

    fn chip_info(&mut self) -> Result<Option<ChipInfo>> {
        let power = self.read(Register::PowerControl)?;
        Ok(Some(ChipInfo {
            firmware: self.firmware_version()?,
            temperature_c: self.temperature()?,
            write_protected: self.write_protected()?,
            power_on: power & POWER_ON_BIT != 0,
            power_button: power & POWER_BUTTON_BIT != 0,
            chip_percent: self.chip_percent()?,
            rtc: self.rtc_time()?,
            boot: self.boot_schedule()?,
        }))
    }

    fn close(&mut self) {
        if let Some(mut bus) = self.bus.take() {
            bus.close();
            log::debug!("PiSugar bus released");
        }
    }
}

impl<B: RegisterBus> Drop for PiSugar<B> {
    fn drop(&mut self) {
        if self.bus.is_some() {
            log::warn!("PiSugar dropped without close()");
            self.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::fake::{FakeBus, FakeChip, Shared};
    use crate::estimate::PercentCurve;
    use crate::profile::{ByteOrder, Revision, VoltageScale};
    use std::cell::RefCell;

    thread_local! {
        static PAUSES: RefCell<Vec<Duration>> = RefCell::new(Vec::new());
    }

    fn record_pause(delay: Duration) {
        PAUSES.with(|p| p.borrow_mut().push(delay));
    }

    fn take_pauses() -> Vec<Duration> {
        PAUSES.with(|p| std::mem::take(&mut *p.borrow_mut()))
    }

    fn paced() -> Sampling {
        Sampling {
            samples: 10,
            sample_delay: Duration::from_millis(7),
            block_delay: Duration::from_millis(11),
        }
    }

    fn live(chip: FakeChip, profile: ChipProfile) -> (PiSugar<FakeBus>, Shared) {
        let (bus, state) = chip.into_bus();
        let m = PiSugar::probe(bus, profile, Sampling::immediate()).expect("probe");
        (m, state)
    }

    fn close_to(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn reads_are_a_function_of_register_contents() {
        let chip = FakeChip::pisugar().with(0x04u8, 0x41).with(0x0Bu8, 0x29);
        let (mut m, _) = live(chip, ChipProfile::default());
        assert_eq!(m.temperature().unwrap(), 25);
        assert_eq!(m.temperature().unwrap(), 25);
        assert!(!m.write_protected().unwrap());
        m.close();
    }

    #[test]
    fn voltage_scenario() {
        let chip = FakeChip::pisugar().with(0x22u8, 0x0E).with(0x23u8, 0x74);
        let (mut m, _) = live(chip, Revision::Tuned.profile());
        assert!((m.battery_voltage().unwrap() - 3.7).abs() < 1e-9);
        assert!((m.battery_percent().unwrap() - 54.5454).abs() < 1e-3);
        m.close();
    }

    #[test]
    fn voltage_is_the_mean_of_samples() {
        let highs: [u8; 10] = [0x0E, 0x0F, 0x0E, 0x0F, 0x0E, 0x0F, 0x0E, 0x0F, 0x0E, 0x0F];
        let lows: [u8; 10] = [0x10, 0x00, 0x74, 0x20, 0xD8, 0x00, 0x10, 0x40, 0x74, 0x00];
        let expected: f64 = highs
            .iter()
            .zip(lows.iter())
            .map(|(h, l)| (((*h as u32) << 8) + *l as u32) as f64 / 1000.0)
            .sum::<f64>()
            / 10.0;

        let chip = FakeChip::pisugar().script(0x22u8, &highs).script(0x23u8, &lows);
        let (mut m, _) = live(chip, Revision::Tuned.profile());
        let forward = m.battery_voltage().unwrap();
        m.close();

        let mut rh = highs;
        let mut rl = lows;
        rh.reverse();
        rl.reverse();
        let chip = FakeChip::pisugar().script(0x22u8, &rh).script(0x23u8, &rl);
        let (mut m, _) = live(chip, Revision::Tuned.profile());
        let backward = m.battery_voltage().unwrap();
        m.close();

        assert!(close_to(forward, expected));
        assert!(close_to(backward, expected));
    }

    #[test]
    fn voltage_takes_ten_samples() {
        let chip = FakeChip::pisugar().with(0x22u8, 0x0E).with(0x23u8, 0x74);
        let (mut m, state) = live(chip, ChipProfile::default());
        m.battery_voltage().unwrap();
        let reads = &state.borrow().log.reads;
        assert_eq!(reads.iter().filter(|r| **r == 0x22).count(), 10);
        assert_eq!(reads.iter().filter(|r| **r == 0x23).count(), 10);
    }

    #[test]
    fn swapped_byte_order_and_tenth_millivolts() {
        // 37000 = 0x9088, high byte in 0x23
        let chip = FakeChip::pisugar().with(0x22u8, 0x88).with(0x23u8, 0x90);
        let profile = ChipProfile {
            byte_order: ByteOrder::LowFirst,
            scale: VoltageScale::TenthMillivolts,
            curve: PercentCurve::Piecewise,
        };
        let (mut m, _) = live(chip, profile);
        assert!((m.battery_voltage().unwrap() - 3.7).abs() < 1e-9);
        assert_eq!(m.profile().scale.divisor(), 10000);
        m.close();
    }

    #[test]
    fn energy_is_the_mean_of_samples() {
        let levels: [u8; 10] = [50, 52, 54, 56, 58, 60, 62, 64, 66, 68];
        let chip = FakeChip::pisugar().script(0x2Au8, &levels);
        let (mut m, _) = live(chip, ChipProfile::default());
        assert!(close_to(m.battery_energy().unwrap(), 59.0));
        m.close();
    }

    #[test]
    fn external_power_bit() {
        let chip = FakeChip::pisugar().with(0x02u8, 0b1000_0100);
        let (mut m, _) = live(chip, ChipProfile::default());
        assert!(m.is_supplied_power().unwrap());
        m.close();

        let chip = FakeChip::pisugar().with(0x02u8, 0b0000_0101);
        let (mut m, _) = live(chip, ChipProfile::default());
        assert!(!m.is_supplied_power().unwrap());
        m.close();
    }

    #[test]
    fn a_failed_sample_aborts_the_average() {
        // probe + four samples + one high byte, then the bus faults
        let chip = FakeChip::pisugar().with(0x22u8, 0x0E).fail_after(1 + 4 * 2 + 1);
        let (mut m, _) = live(chip, ChipProfile::default());
        let err = m.battery_voltage().unwrap_err();
        assert!(matches!(err, Error::BusRead { .. }));
        m.close();
    }

    #[test]
    fn dump_reads_eight_blocks() {
        let chip = FakeChip::pisugar().with(0xFFu8, 0xAB).with(0x22u8, 0x0E);
        let (mut m, state) = live(chip, ChipProfile::default());
        let dump = m.buffer_dump().unwrap();
        assert_eq!(dump.len(), DUMP_LEN);
        assert_eq!(dump[0x00], CHIP_IDENTITY);
        assert_eq!(dump[0x22], 0x0E);
        assert_eq!(dump[0xFF], 0xAB);
        // one probe read plus 256 register reads through the block path
        assert_eq!(state.borrow().log.reads.len(), 1 + DUMP_LEN);
        m.close();
    }

    #[test]
    fn reading_combines_everything() {
        let chip = FakeChip::pisugar()
            .with(0x22u8, 0x0E)
            .with(0x23u8, 0x74)
            .with(0x2Au8, 60)
            .with(0x02u8, 0x80);
        let (mut m, _) = live(chip, Revision::Tuned.profile());
        let r = m.reading().unwrap();
        assert!((r.voltage - 3.7).abs() < 1e-9);
        assert!((r.percent - 54.5454).abs() < 1e-3);
        assert!(close_to(r.energy, 60.0));
        assert!(r.external_power);
        m.close();
    }

    #[test]
    fn chip_info_decodes_fields() {
        let chip = FakeChip::pisugar()
            .with_bytes(0xE2, b"3.0.8\0\0\0\0\0\0\0")
            .with(0x04u8, 40 + 31)
            .with(0x0Bu8, 0x00)
            .with(0x02u8, 0b1000_0100)
            .with(0x2Au8, 77)
            .with_bytes(0x31, &[0x26, 0x10, 0x16, 0x05, 0x14, 0x30, 0x59])
            .with(0x40u8, 0x80)
            .with_bytes(0x44, &[0b0111_1110, 0x07, 0x15, 0x00]);
        let (mut m, _) = live(chip, ChipProfile::default());
        let info = m.chip_info().unwrap().unwrap();
        assert_eq!(info.firmware, "3.0.8");
        assert_eq!(info.temperature_c, 31);
        assert!(info.write_protected);
        assert!(info.power_on);
        assert!(!info.power_button);
        assert_eq!(info.chip_percent, 77);
        let rtc = info.rtc.unwrap();
        assert_eq!(rtc.to_string(), "2026-10-16 14:30:59");
        assert!(info.boot.enabled);
        assert_eq!(info.boot.weekdays, 0b0111_1110);
        assert_eq!(info.boot.time, NaiveTime::from_hms_opt(7, 15, 0));
        m.close();
    }

    #[test]
    fn impossible_rtc_date_is_none() {
        let chip = FakeChip::pisugar().with_bytes(0x31, &[0x26, 0x13, 0x40, 0, 0, 0, 0]);
        let (mut m, _) = live(chip, ChipProfile::default());
        assert_eq!(m.rtc_time().unwrap(), None);
        m.close();
    }

    #[test]
    fn samples_are_spaced_by_the_settling_delay() {
        let (bus, _) = FakeChip::pisugar().with(0x22u8, 0x0E).into_bus();
        let mut m = PiSugar::probe(bus, ChipProfile::default(), paced())
            .unwrap()
            .with_pause(record_pause);
        take_pauses();

        m.battery_voltage().unwrap();
        assert_eq!(take_pauses(), vec![Duration::from_millis(7); 9]);

        m.battery_energy().unwrap();
        assert_eq!(take_pauses(), vec![Duration::from_millis(7); 9]);

        m.buffer_dump().unwrap();
        assert_eq!(take_pauses(), vec![Duration::from_millis(11); 8]);
        m.close();
    }

    #[test]
    fn no_pause_after_the_last_sample() {
        let (bus, state) = FakeChip::pisugar().into_bus();
        let mut m = PiSugar::probe(bus, ChipProfile::default(), paced())
            .unwrap()
            .with_pause(record_pause);
        take_pauses();
        m.battery_energy().unwrap();
        // ten reads after the probe, and no trailing pause after the last one
        assert_eq!(state.borrow().log.reads.len(), 1 + 10);
        assert_eq!(take_pauses().len(), 9);
        m.close();
    }

    #[test]
    fn default_pause_really_sleeps() {
        let sampling = Sampling {
            samples: 10,
            sample_delay: Duration::from_millis(5),
            block_delay: Duration::ZERO,
        };
        let (bus, _) = FakeChip::pisugar().into_bus();
        let mut m = PiSugar::probe(bus, ChipProfile::default(), sampling).unwrap();
        let start = std::time::Instant::now();
        m.battery_voltage().unwrap();
        assert!(start.elapsed() >= Duration::from_millis(45));
        m.close();
    }

    #[test]
    fn identity_mismatch_closes_bus() {
        let (bus, state) = FakeChip::empty().with(0x00u8, 7).into_bus();
        let err = PiSugar::probe(bus, ChipProfile::default(), Sampling::immediate()).err().unwrap();
        assert!(matches!(err, Error::IdentityMismatch { found: 7, expected: 3 }));
        assert_eq!(state.borrow().log.closes, 1);
    }

    #[test]
    fn close_twice_releases_once() {
        let (mut m, state) = live(FakeChip::pisugar(), ChipProfile::default());
        m.close();
        m.close();
        assert_eq!(state.borrow().log.closes, 1);
        assert!(!m.is_available());
        assert!(matches!(m.battery_voltage(), Err(Error::Closed)));
    }

    #[test]
    fn drop_releases_an_unclosed_bus() {
        let (m, state) = live(FakeChip::pisugar(), ChipProfile::default());
        drop(m);
        assert_eq!(state.borrow().log.closes, 1);
    }
}
