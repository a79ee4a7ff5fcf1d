use crate::bus::BusOpener;
use crate::monitor::{Monitor, PiSugar, Sampling};
use crate::profile::ChipProfile;

/// Opens the bus, probes for the chip and hands out the matching monitor.
/// This is the only place a bus handle is created.
pub struct Connector<O: BusOpener> {
    opener: O,
    profile: ChipProfile,
    sampling: Sampling,
}

impl<O: BusOpener> Connector<O> {
    pub fn new(opener: O, profile: ChipProfile, sampling: Sampling) -> Self {
        Self { opener, profile, sampling }
    }

    /// Never fails: a missing bus or chip yields [`Monitor::Disconnected`].
    pub fn connect(&mut self) -> Monitor<O::Bus> {
        let bus = match self.opener.open() {
            Ok(bus) => bus,
            Err(e) => {
                log::warn!("No PiSugar: {}", e);
                return Monitor::disconnected();
            }
        };

        match PiSugar::probe(bus, self.profile, self.sampling) {
            Ok(monitor) => {
                log::info!(
                    "PiSugar found ({:?}, scale 1/{}, curve {:?})",
                    self.profile.byte_order,
                    self.profile.scale.divisor(),
                    self.profile.curve
                );
                Monitor::Connected(monitor)
            }
            Err(e) => {
                log::warn!("Attention, no PiSugar found: {}", e);
                Monitor::disconnected()
            }
        }
    }

    pub fn opener(&self) -> &O {
        &self.opener
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bus::fake::{FakeChip, FakeOpener};
    use crate::monitor::BatteryMonitor;
    use crate::registers::DUMP_LEN;

    fn connector(opener: FakeOpener) -> Connector<FakeOpener> {
        Connector::new(opener, ChipProfile::default(), Sampling::immediate())
    }

    #[test]
    fn nack_on_probe_yields_null_without_leaking() {
        let mut c = connector(FakeOpener::new(FakeChip::empty().nack(0x00u8)));
        let m = c.connect();
        assert!(matches!(m, Monitor::Disconnected(_)));
        assert_eq!(c.opener().log(), (1, 1));
    }

    #[test]
    fn wrong_identity_yields_null() {
        let mut c = connector(FakeOpener::new(FakeChip::empty().with(0x00u8, 0x42)));
        let m = c.connect();
        assert!(!m.is_available());
        assert_eq!(c.opener().log(), (1, 1));
    }

    #[test]
    fn missing_bus_yields_null() {
        let mut c = connector(FakeOpener::missing());
        let mut m = c.connect();
        assert!(!m.is_available());
        assert_eq!(m.battery_voltage().unwrap(), 0.0);
        assert_eq!(c.opener().log(), (0, 0));
    }

    #[test]
    fn identity_three_binds_live_monitor() {
        let chip = FakeChip::pisugar().with(0x22u8, 0x0E).with(0x23u8, 0x74);
        let mut c = connector(FakeOpener::new(chip));
        let mut m = c.connect();
        assert!(m.is_available());
        assert!((m.battery_voltage().unwrap() - 3.7).abs() < 1e-9);
        assert_eq!(c.opener().log(), (1, 0));
        m.close();
        m.close();
        assert_eq!(c.opener().log(), (1, 1));
    }

    #[test]
    fn null_dump_matches_live_dump_length() {
        let mut live = connector(FakeOpener::new(FakeChip::pisugar())).connect();
        let mut null = connector(FakeOpener::missing()).connect();
        assert_eq!(live.buffer_dump().unwrap().len(), DUMP_LEN);
        assert_eq!(null.buffer_dump().unwrap().len(), live.buffer_dump().unwrap().len());
        live.close();
    }
}
