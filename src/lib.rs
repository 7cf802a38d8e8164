pub mod client;
pub mod config;
pub mod error;
pub mod export;
pub mod plotting;
pub mod protocol;
pub mod sweep;
pub mod vna;

pub use client::{Block, BlockBuilder, ConnectionConfig};
pub use config::{
    load_config, load_config_or_default, AppConfig, InstrumentConfig, LoggingConfig, SweepConfig,
};
pub use error::BlockError;
pub use export::{export_iv, export_reflection, write_metadata, SweepMetadata};
pub use plotting::plot_iv;
pub use protocol::{parse_reading, CommandSet};
pub use sweep::{linspace, IvSweep, ReflectionParams, ReflectionPoint, ReflectionSweep, Sample};
pub use vna::{VnaDriver, VnaRequest, VnaResponse, DEFAULT_FREQUENCY_POINTS};
