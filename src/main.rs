use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use pisugar_monitor::bus::{LinuxOpener, RegisterBus};
use pisugar_monitor::config::{self, MonitorConfig};
use pisugar_monitor::connector::Connector;
use pisugar_monitor::logbook;
use pisugar_monitor::monitor::{BatteryMonitor, Monitor};
use pisugar_monitor::poller::{self, PollOptions};

#[derive(Parser, Debug)]
#[command(name = "pisugar-monitor", version, about = "PiSugar battery telemetry over I2C")]
pub struct Cli {
    /// Path to config file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Generate shell completions and exit
    #[arg(long, value_name = "SHELL")]
    completions: Option<Shell>,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print one battery reading (default)
    Read {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
    /// Append one reading to the voltage log
    Log,
    /// Poll until interrupted, logging every reading
    Watch {
        /// Override poll interval in seconds
        #[arg(long)]
        interval: Option<u64>,
        /// Also log a register dump on every poll
        #[arg(long)]
        dump: bool,
    },
    /// Print the 256-byte register space as a hex table
    Dump,
    /// Print firmware version, temperature, RTC and boot schedule
    Info {
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();
    let cli = Cli::parse();

    if let Some(shell) = cli.completions {
        let mut cmd = Cli::command();
        clap_complete::generate(shell, &mut cmd, "pisugar-monitor", &mut std::io::stdout());
        return Ok(());
    }

    let config_path = cli.config.unwrap_or_else(config::default_config_path);
    let config = config::load_config(&config_path)?;

    log::info!(
        "Starting pisugar-monitor on bus {} addr 0x{:02x}, revision={}",
        config.bus.index,
        config.bus.address,
        config.chip.revision
    );

    let opener = LinuxOpener { bus: config.bus.index, address: config.bus.address };
    let mut connector = Connector::new(opener, config.chip.profile(), config.sampling.sampling());
    let mut monitor = connector.connect();

    let command = cli.command.unwrap_or(Command::Read { json: false });
    let result = run(command, &config, &mut monitor);

    // Release the bus on every exit path, including errors and an interrupted watch.
    monitor.close();
    result
}

fn run<B: RegisterBus>(
    command: Command,
    config: &MonitorConfig,
    monitor: &mut Monitor<B>,
) -> Result<()> {
    match command {
        Command::Read { json } => {
            let reading = monitor.reading().context("Failed to read battery")?;
            if json {
                println!("{}", serde_json::to_string_pretty(&reading)?);
            } else {
                println!("Battery: {:.3} V | {:.1} %", reading.voltage, reading.percent);
                println!("Energy: {:.0}", reading.energy);
                println!("External power: {}", reading.external_power);
            }
        }
        Command::Log => {
            let reading = monitor.reading().context("Failed to read battery")?;
            let line = logbook::reading_line(&chrono::Local::now(), &reading);
            logbook::append_line(&config.log.path, &line)?;
            log::info!("Appended to {}", config.log.path.display());
        }
        Command::Watch { interval, dump } => {
            let running = Arc::new(AtomicBool::new(true));
            {
                let running = running.clone();
                ctrlc::set_handler(move || {
                    log::info!("Process ended");
                    running.store(false, Ordering::SeqCst);
                })
                .context("Failed to install signal handler")?;
            }
            let opts = PollOptions {
                interval: interval
                    .map(std::time::Duration::from_secs)
                    .unwrap_or_else(|| config.log.interval()),
                log_path: config.log.path.clone(),
                dump_path: dump.then(|| config.log.dump_path.clone()),
            };
            anyhow::ensure!(!opts.interval.is_zero(), "Poll interval must be at least 1 second");
            poller::run(monitor, &opts, &running);
        }
        Command::Dump => {
            let dump = monitor.buffer_dump().context("Failed to dump registers")?;
            print!("{}", logbook::hex_table(&dump));
        }
        Command::Info { json } => {
            let Some(info) = monitor.chip_info().context("Failed to read chip info")? else {
                anyhow::bail!("No PiSugar connected");
            };
            if json {
                println!("{}", serde_json::to_string_pretty(&info)?);
            } else {
                println!("Firmware: {}", info.firmware);
                println!("Temperature: {} °C", info.temperature_c);
                println!("Write protected: {}", info.write_protected);
                println!("Power on: {} | button: {}", info.power_on, info.power_button);
                println!("Chip percentage: {} %", info.chip_percent);
                match info.rtc {
                    Some(t) => println!("RTC: {}", t),
                    None => println!("RTC: invalid"),
                }
                let boot_time = info
                    .boot
                    .time
                    .map(|t| t.to_string())
                    .unwrap_or_else(|| "invalid".into());
                println!(
                    "Timed boot: {} at {} (weekdays 0b{:07b})",
                    if info.boot.enabled { "on" } else { "off" },
                    boot_time,
                    info.boot.weekdays
                );
            }
        }
    }
    Ok(())
}
