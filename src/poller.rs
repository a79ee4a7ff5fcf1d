//! Fixed-interval polling until cancelled.
//!
//! Cancellation is checked between polls and while waiting. A poll that has
//! started runs to completion, so the bus is never released under an
//! in-flight read; the caller closes the monitor after [`run`] returns.

use anyhow::Result;
use chrono::Local;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use crate::logbook;
use crate::monitor::{BatteryMonitor, BatteryReading};

const WAIT_SLICE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct PollOptions {
    pub interval: Duration,
    pub log_path: PathBuf,
    /// Also append a register dump line on every poll.
    pub dump_path: Option<PathBuf>,
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct PollStats {
    pub polls: usize,
    pub failures: usize,
}

/// Poll `monitor` every `opts.interval` while `running` is set. A failed
/// poll is logged and retried at the next interval, never within the same one.
pub fn run<M>(monitor: &mut M, opts: &PollOptions, running: &AtomicBool) -> PollStats
where
    M: BatteryMonitor + ?Sized,
{
    let mut stats = PollStats::default();
    log::info!("Polling every {}s", opts.interval.as_secs_f64());

    while running.load(Ordering::SeqCst) {
        stats.polls += 1;
        match poll_once(monitor, opts) {
            Ok(reading) => log::info!(
                "Battery: {:.3} V | {:.1} % | energy {:.0} | external power {}",
                reading.voltage,
                reading.percent,
                reading.energy,
                reading.external_power
            ),
            Err(e) => {
                stats.failures += 1;
                log::warn!("Telemetry unavailable for this poll: {:#}", e);
            }
        }
        wait(opts.interval, running);
    }

    log::info!("Polling stopped after {} polls ({} failed)", stats.polls, stats.failures);
    stats
}

pub fn poll_once<M>(monitor: &mut M, opts: &PollOptions) -> Result<BatteryReading>
where
    M: BatteryMonitor + ?Sized,
{
    // A failed poll writes nothing.
    let reading = monitor.reading()?;
    let dump = match opts.dump_path {
        Some(_) => Some(monitor.buffer_dump()?),
        None => None,
    };

    let now = Local::now();
    logbook::append_line(&opts.log_path, &logbook::reading_line(&now, &reading))?;
    if let (Some(dump_path), Some(dump)) = (&opts.dump_path, dump) {
        logbook::append_line(dump_path, &logbook::dump_line(&now, &dump))?;
    }
    Ok(reading)
}

/// Sleep for `interval`, returning early once `running` is cleared.
fn wait(interval: Duration, running: &AtomicBool) {
    let deadline = Instant::now() + interval;
    while running.load(Ordering::SeqCst) {
        let now = Instant::now();
        if now >= deadline {
            break;
        }
        thread::sleep((deadline - now).min(WAIT_SLICE));
    }
}
