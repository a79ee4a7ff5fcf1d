//! Plain-text voltage logs.

use anyhow::{Context, Result};
use chrono::{DateTime, TimeZone};
use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::Path;

use crate::monitor::BatteryReading;

/// `"16 14:30, 3.700 V  --  54.545 %  --  Energy: 59  --  Is Charging? true"`.
/// The energy mean is truncated, not rounded.
pub fn reading_line<Tz: TimeZone>(at: &DateTime<Tz>, r: &BatteryReading) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!(
        "{}, {:.3} V  --  {:.3} %  --  Energy: {}  --  Is Charging? {}",
        at.format("%d %H:%M"),
        r.voltage,
        r.percent,
        r.energy.trunc() as i64,
        r.external_power
    )
}

/// `"14:30,0x03,0x00,..."`, one field per register.
pub fn dump_line<Tz: TimeZone>(at: &DateTime<Tz>, dump: &[u8]) -> String
where
    Tz::Offset: std::fmt::Display,
{
    let mut line = at.format("%H:%M,").to_string();
    for (i, byte) in dump.iter().enumerate() {
        if i > 0 {
            line.push(',');
        }
        let _ = write!(line, "0x{:02X}", byte);
    }
    line
}

/// 16 registers per row with the row address in front.
pub fn hex_table(dump: &[u8]) -> String {
    let mut out = String::from("     ");
    for col in 0..16 {
        let _ = write!(out, " {:X} ", col);
    }
    out.push('\n');
    for (row, chunk) in dump.chunks(16).enumerate() {
        let _ = write!(out, "0x{:02X}:", row * 16);
        for byte in chunk {
            let _ = write!(out, " {:02X}", byte);
        }
        out.push('\n');
    }
    out
}

/// Append `line` to `path`, creating the file and its directory if needed.
pub fn append_line(path: &Path, line: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open log: {}", path.display()))?;
    writeln!(file, "{}", line).with_context(|| format!("Failed to write log: {}", path.display()))?;
    Ok(())
}
