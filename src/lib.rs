//! Battery telemetry for the PiSugar UPS board.
//!
//! [`connector::Connector`] opens the I2C bus and probes for the chip. It
//! returns a [`monitor::Monitor`] that is either a live [`monitor::PiSugar`]
//! or a [`monitor::NullMonitor`] reporting neutral values, so callers never
//! special-case missing hardware.

pub mod bus;
pub mod config;
pub mod connector;
pub mod error;
pub mod estimate;
pub mod logbook;
pub mod monitor;
pub mod poller;
pub mod profile;
pub mod registers;

pub use error::{Error, Result};
