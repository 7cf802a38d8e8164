use log::{error, info};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::thread;
use std::time::Duration;

use crate::client::{Block, Session};
use crate::error::BlockError;
use crate::protocol::parse_reading;
use crate::vna::{VnaDriver, VnaRequest};

/// One bias point: the commanded set-point and the measured response.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub voltage: f64,
    pub current: f64,
}

/// Ordered result of a current sweep.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IvSweep {
    pub samples: Vec<Sample>,
}

impl IvSweep {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn voltages(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.voltage)
    }

    pub fn currents(&self) -> impl Iterator<Item = f64> + '_ {
        self.samples.iter().map(|s| s.current)
    }
}

/// One bias point of a reflection sweep.
#[derive(Debug, Clone)]
pub struct ReflectionPoint {
    pub voltage: f64,
    pub current: f64,
    pub trace: Vec<f64>,
}

impl ReflectionPoint {
    /// Composite column key used in exported files, `<voltage>;<current>`.
    pub fn key(&self) -> String {
        format!("{};{}", self.voltage, self.current)
    }
}

/// Result of a reflection sweep: one trace per bias point plus the shared
/// frequency axis.
///
/// The axis is recorded once, from the last VNA response of the sweep;
/// per-point axes are assumed identical.
#[derive(Debug, Clone, Default)]
pub struct ReflectionSweep {
    pub points: Vec<ReflectionPoint>,
    pub frequency: Vec<f64>,
}

/// Parameters for [`Block::sweep_reflection`].
#[derive(Debug, Clone)]
pub struct ReflectionParams {
    pub v_from: f64,
    pub v_to: f64,
    pub v_points: usize,
    pub freq_start: f64,
    pub freq_stop: f64,
    /// `None` uses the VNA driver default of 201 points
    pub freq_points: Option<usize>,
    /// S-parameter selector, e.g. "S11"
    pub parameter: String,
    pub averages: u32,
    pub export_path: Option<PathBuf>,
}

/// `points` evenly spaced values from `from` to `to`, endpoints included.
/// A single point yields `from`; `to < from` yields descending values.
pub fn linspace(from: f64, to: f64, points: usize) -> Vec<f64> {
    if points == 0 {
        return Vec::new();
    }
    if points == 1 {
        return vec![from];
    }
    let step = (to - from) / (points - 1) as f64;
    (0..points).map(|i| from + step * i as f64).collect()
}

impl Block {
    /// Sweep the bias voltage and record the junction current at each point.
    ///
    /// Holds one connection for the whole sweep. The voltage set-point found
    /// at the start is written back after the last point. Each point settles
    /// for the configured delay when it is the first of the sweep or falls
    /// inside the instability band, then polls the current with parse
    /// retries until a numeric reading arrives.
    ///
    /// # Errors
    /// Returns `BlockError` if the connection fails, the initial voltage
    /// reading is not numeric, or the parse-retry budget is exhausted.
    /// A failed sweep returns no samples and leaves the voltage unrestored.
    pub fn sweep_current(
        &self,
        v_from: f64,
        v_to: f64,
        points: usize,
    ) -> Result<IvSweep, BlockError> {
        if points == 0 {
            return Err(BlockError::Config(
                "Sweep needs at least one point".to_string(),
            ));
        }

        let mut session = self.connect()?;
        let initial_voltage = self.read_initial_voltage(&mut session)?;

        let mut samples = Vec::with_capacity(points);
        for (index, voltage) in linspace(v_from, v_to, points).into_iter().enumerate() {
            self.step_voltage(&mut session, voltage, index == 0)?;
            let current =
                self.poll_current(&mut session, voltage, self.sweep.current_poll_delay())?;
            info!("volt {voltage}; curr {current}");
            samples.push(Sample { voltage, current });
        }

        session.send(&self.commands().set_voltage(initial_voltage))?;
        Ok(IvSweep { samples })
    }

    /// Sweep the bias voltage and capture a VNA reflection trace at each
    /// point, in addition to the junction current.
    ///
    /// Stepping, settling and retry behavior match [`Self::sweep_current`],
    /// except the current poll uses the slower reflection delay. The
    /// frequency axis of the result is taken from the last VNA response.
    ///
    /// # Errors
    /// As for `sweep_current`, plus VNA driver failures, which abort the
    /// sweep immediately.
    pub fn sweep_reflection(
        &self,
        params: &ReflectionParams,
        vna: &mut dyn VnaDriver,
    ) -> Result<ReflectionSweep, BlockError> {
        if params.v_points == 0 {
            return Err(BlockError::Config(
                "Sweep needs at least one point".to_string(),
            ));
        }

        let request = VnaRequest {
            parameter: params.parameter.clone(),
            freq_start: params.freq_start,
            freq_stop: params.freq_stop,
            freq_points: params.freq_points,
            averages: params.averages,
            export_path: params.export_path.clone(),
        };

        let mut session = self.connect()?;
        let initial_voltage = self.read_initial_voltage(&mut session)?;

        let mut result = ReflectionSweep::default();
        for (index, voltage) in linspace(params.v_from, params.v_to, params.v_points)
            .into_iter()
            .enumerate()
        {
            self.step_voltage(&mut session, voltage, index == 0)?;
            let current =
                self.poll_current(&mut session, voltage, self.sweep.reflection_poll_delay())?;

            let response = vna.measure(&request)?;
            info!("volt {voltage}; curr {current}");
            result.points.push(ReflectionPoint {
                voltage,
                current,
                trace: response.trace,
            });
            result.frequency = response.frequency;
        }

        session.send(&self.commands().set_voltage(initial_voltage))?;
        Ok(result)
    }

    fn read_initial_voltage(&self, session: &mut Session) -> Result<f64, BlockError> {
        let raw = session.query(&self.commands().query_voltage())?;
        parse_reading(&raw).map_err(|_| BlockError::Malformed(raw))
    }

    /// Command one set-point and drain its acknowledgement. The first point
    /// of a sweep and points inside the instability band settle before the
    /// acknowledgement is read.
    fn step_voltage(
        &self,
        session: &mut Session,
        voltage: f64,
        first: bool,
    ) -> Result<(), BlockError> {
        session.send(&self.commands().set_voltage(voltage))?;
        if first || self.sweep.in_instability_band(voltage) {
            thread::sleep(self.sweep.settle_delay());
        }
        // Acknowledgement text is not parsed, only drained from the socket
        let _ack = session.recv()?;
        Ok(())
    }

    /// Poll the current until it parses as a number. Each attempt waits the
    /// poll delay first, matching the instrument's reading cadence. With
    /// `max_parse_retries == 0` this retries forever, as the original
    /// control software did.
    fn poll_current(
        &self,
        session: &mut Session,
        voltage: f64,
        delay: Duration,
    ) -> Result<f64, BlockError> {
        let mut attempts = 0u32;
        loop {
            thread::sleep(delay);
            let raw = session.query(&self.commands().query_current())?;
            match parse_reading(&raw) {
                Ok(current) => return Ok(current),
                Err(_) => {
                    attempts += 1;
                    error!("Error with v = {voltage}; i = {raw}");
                    if self.sweep.max_parse_retries > 0 && attempts >= self.sweep.max_parse_retries
                    {
                        return Err(BlockError::RetryExhausted {
                            voltage,
                            attempts,
                            raw,
                        });
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_linspace_ascending() {
        assert_eq!(linspace(0.0, 1.0, 3), vec![0.0, 0.5, 1.0]);
    }

    #[test]
    fn test_linspace_descending() {
        assert_eq!(linspace(1.0, 0.0, 3), vec![1.0, 0.5, 0.0]);
    }

    #[test]
    fn test_linspace_single_point() {
        assert_eq!(linspace(0.25, 7e-3, 1), vec![0.25]);
    }

    #[test]
    fn test_linspace_empty() {
        assert!(linspace(0.0, 1.0, 0).is_empty());
    }

    #[test]
    fn test_linspace_includes_endpoints() {
        let values = linspace(-7e-3, 7e-3, 300);
        assert_eq!(values.len(), 300);
        assert_eq!(values[0], -7e-3);
        assert!((values[299] - 7e-3).abs() < 1e-12);
    }

    #[test]
    fn test_reflection_point_key() {
        let point = ReflectionPoint {
            voltage: 0.5,
            current: 1.25e-6,
            trace: vec![],
        };
        assert_eq!(point.key(), "0.5;0.00000125");
    }

    #[test]
    fn test_iv_sweep_accessors() {
        let sweep = IvSweep {
            samples: vec![
                Sample {
                    voltage: 0.0,
                    current: 1.0,
                },
                Sample {
                    voltage: 0.5,
                    current: 2.0,
                },
            ],
        };
        assert_eq!(sweep.len(), 2);
        assert_eq!(sweep.voltages().collect::<Vec<_>>(), vec![0.0, 0.5]);
        assert_eq!(sweep.currents().collect::<Vec<_>>(), vec![1.0, 2.0]);
    }
}
