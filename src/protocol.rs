use std::num::ParseFloatError;

// Protocol constants
pub const RECV_BUFFER_SIZE: usize = 1024;
pub const DEFAULT_DEVICE: &str = "DEV2";

/// Text command grammar for the bias block.
///
/// The instrument speaks a minimal SCPI-style dialect with no message
/// delimiter: one command per write, one best-effort read per reply.
/// Commands address a device channel (`DEV2` on the standard rack).
#[derive(Debug, Clone)]
pub struct CommandSet {
    device: String,
}

impl CommandSet {
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }

    pub fn device(&self) -> &str {
        &self.device
    }

    /// `BIAS:<dev>:CURR?` - query the measured junction current.
    pub fn query_current(&self) -> String {
        format!("BIAS:{}:CURR?", self.device)
    }

    /// `BIAS:<dev>:VOLT?` - query the active voltage set-point.
    pub fn query_voltage(&self) -> String {
        format!("BIAS:{}:VOLT?", self.device)
    }

    /// `BIAS:<dev>:VOLT <value>` - command a new voltage set-point.
    pub fn set_voltage(&self, volt: f64) -> String {
        format!("BIAS:{}:VOLT {}", self.device, volt)
    }
}

impl Default for CommandSet {
    fn default() -> Self {
        Self::new(DEFAULT_DEVICE)
    }
}

/// Parse a plain decimal instrument reply, tolerating trailing whitespace.
pub fn parse_reading(raw: &str) -> Result<f64, ParseFloatError> {
    raw.trim().parse::<f64>()
}
