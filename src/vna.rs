use std::path::PathBuf;

use crate::error::BlockError;

/// Frequency points used when a request leaves the count unset.
pub const DEFAULT_FREQUENCY_POINTS: usize = 201;

/// One reflection acquisition request at the current bias point.
#[derive(Debug, Clone)]
pub struct VnaRequest {
    /// S-parameter selector, e.g. "S11"
    pub parameter: String,
    /// Start frequency in Hz
    pub freq_start: f64,
    /// Stop frequency in Hz
    pub freq_stop: f64,
    /// Number of frequency points; `None` falls back to
    /// [`DEFAULT_FREQUENCY_POINTS`]
    pub freq_points: Option<usize>,
    /// Trace averaging count
    pub averages: u32,
    /// Where the driver should export its own raw data, if anywhere
    pub export_path: Option<PathBuf>,
}

impl VnaRequest {
    pub fn points(&self) -> usize {
        self.freq_points.unwrap_or(DEFAULT_FREQUENCY_POINTS)
    }
}

/// One captured reflection trace with its frequency axis.
#[derive(Debug, Clone)]
pub struct VnaResponse {
    pub trace: Vec<f64>,
    pub frequency: Vec<f64>,
}

/// Interface to the vector network analyzer acquisition routine.
///
/// The VNA is an external collaborator: the sweep loop only needs a trace
/// and its frequency axis per bias point. Implementations wrap whatever
/// analyzer backend is on hand; tests use in-memory mocks. Driver failures
/// propagate and abort the sweep.
pub trait VnaDriver {
    fn measure(&mut self, request: &VnaRequest) -> Result<VnaResponse, BlockError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_points_default() {
        let request = VnaRequest {
            parameter: "S11".to_string(),
            freq_start: 4e9,
            freq_stop: 8e9,
            freq_points: None,
            averages: 10,
            export_path: None,
        };
        assert_eq!(request.points(), 201);

        let request = VnaRequest {
            freq_points: Some(401),
            ..request
        };
        assert_eq!(request.points(), 401);
    }
}
