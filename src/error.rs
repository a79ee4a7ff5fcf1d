use std::path::PathBuf;

pub type Result<T> = std::result::Result<T, Error>;

type Source = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The bus device could not be opened at all.
    #[error("failed to open I2C bus {}: {source}", .path.display())]
    BusOpen { path: PathBuf, source: Source },

    /// A register read failed or the chip did not acknowledge.
    #[error("failed to read register 0x{register:02X}: {source}")]
    BusRead { register: u8, source: Source },

    /// Something answered on the chip address, but not a PiSugar.
    #[error("unexpected chip identity 0x{found:02X} (expected 0x{expected:02X})")]
    IdentityMismatch { found: u8, expected: u8 },

    #[error("bus handle already released")]
    Closed,
}

impl Error {
    pub fn bus_read(register: u8, source: impl Into<Source>) -> Self {
        Error::BusRead { register, source: source.into() }
    }

    pub fn bus_open(path: impl Into<PathBuf>, source: impl Into<Source>) -> Self {
        Error::BusOpen { path: path.into(), source: source.into() }
    }
}
