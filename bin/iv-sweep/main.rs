use chrono::Utc;
use clap::{Parser, Subcommand};
use env_logger::Env;
use log::{info, LevelFilter};
use std::path::PathBuf;

use block_sweep::{
    export_iv, load_config_or_default, plot_iv, write_metadata, Block, SweepMetadata,
};

/// SIS bias block sweep tool
#[derive(Parser, Debug)]
#[command(name = "iv-sweep")]
#[command(about = "Bias sweeps and point readings for the SIS junction block", long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error)
    #[arg(short, long, value_name = "LEVEL")]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the raw junction current reading
    ReadCurrent,
    /// Print the raw voltage set-point reading
    ReadVoltage,
    /// Command a new voltage set-point, in volts
    SetVoltage {
        #[arg(allow_hyphen_values = true)]
        volt: f64,
    },
    /// Sweep the bias voltage and record an IV curve
    Current {
        /// Start voltage, in volts
        #[arg(allow_hyphen_values = true)]
        v_from: f64,
        /// End voltage, in volts
        #[arg(allow_hyphen_values = true)]
        v_to: f64,
        /// Number of points, endpoints included
        points: usize,
        /// Write the result to this CSV file (default: timestamped name)
        #[arg(long, value_name = "FILE")]
        export: Option<PathBuf>,
        /// Skip writing the CSV
        #[arg(long)]
        no_export: bool,
        /// Render a terminal scatter plot of the result
        #[arg(long)]
        plot: bool,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = load_config_or_default(args.config.as_deref());

    let log_level = args
        .log_level
        .unwrap_or_else(|| config.logging.log_level.clone());
    initialize_logging(&log_level);

    info!(
        "Block: {}:{} ({})",
        config.instrument.host, config.instrument.port, config.instrument.device
    );

    let block = Block::builder()
        .host(&config.instrument.host)
        .port(config.instrument.port)
        .device(&config.instrument.device)
        .sweep_config(config.sweep.clone())
        .build()?;

    match args.command {
        Command::ReadCurrent => {
            println!("{}", block.read_current()?);
        }
        Command::ReadVoltage => {
            println!("{}", block.read_voltage()?);
        }
        Command::SetVoltage { volt } => {
            block.write_voltage(volt)?;
            info!("Set-point commanded: {volt} V");
        }
        Command::Current {
            v_from,
            v_to,
            points,
            export,
            no_export,
            plot,
        } => {
            let started_at = Utc::now();
            info!("Sweeping {v_from} V to {v_to} V in {points} points");
            let sweep = block.sweep_current(v_from, v_to, points)?;
            info!("Sweep complete: {} samples", sweep.len());

            if !no_export {
                let path = export.unwrap_or_else(default_export_path);
                export_iv(&path, &sweep)?;
                info!("IV data written to {}", path.display());

                let metadata = SweepMetadata {
                    started_at,
                    host: config.instrument.host.clone(),
                    device: config.instrument.device.clone(),
                    v_from,
                    v_to,
                    points,
                };
                let meta_path = path.with_extension("meta.json");
                write_metadata(&meta_path, &metadata)?;
                info!("Metadata written to {}", meta_path.display());
            }

            if plot {
                plot_iv(&sweep, None, None)?;
            }
        }
    }

    Ok(())
}

fn default_export_path() -> PathBuf {
    PathBuf::from(format!("iv_{}.csv", Utc::now().format("%Y%m%d_%H%M%S")))
}

/// Initialize logging with configurable level
fn initialize_logging(log_level: &str) {
    let level = match log_level.to_lowercase().as_str() {
        "trace" => LevelFilter::Trace,
        "debug" => LevelFilter::Debug,
        "info" => LevelFilter::Info,
        "warn" => LevelFilter::Warn,
        "error" => LevelFilter::Error,
        _ => {
            eprintln!("Warning: Invalid log level '{log_level}', using 'info'");
            LevelFilter::Info
        }
    };

    env_logger::Builder::from_env(Env::default())
        .filter_level(level)
        .format_timestamp_millis()
        .init();
}
