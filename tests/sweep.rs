//! Sweep behavior against a stub bias block speaking the text protocol.
//!
//! The stub echoes the commanded voltage back as the current reading, which
//! makes sweep results fully predictable.

use std::io::{Read, Write};
use std::net::TcpListener;
use std::sync::{Arc, Mutex};
use std::thread;

use block_sweep::{Block, BlockError, ReflectionParams, SweepConfig, VnaDriver, VnaRequest,
    VnaResponse};

/// Stub instrument. Replies `VOLT?` with the current set-point, `CURR?`
/// with the set-point value (echo), and acknowledges set commands with
/// `OK`. Optionally serves a number of garbage current replies first.
struct StubBlock {
    port: u16,
    commands: Arc<Mutex<Vec<String>>>,
}

impl StubBlock {
    fn spawn(initial_voltage: f64, garbage_replies: usize) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let port = listener.local_addr().unwrap().port();
        let commands = Arc::new(Mutex::new(Vec::new()));
        let log = commands.clone();

        thread::spawn(move || {
            let mut garbage_left = garbage_replies;
            for stream in listener.incoming() {
                let Ok(mut stream) = stream else { break };
                let mut voltage = initial_voltage;
                let mut buf = [0u8; 1024];
                loop {
                    let n = match stream.read(&mut buf) {
                        Ok(0) | Err(_) => break,
                        Ok(n) => n,
                    };
                    let cmd = String::from_utf8_lossy(&buf[..n]).to_string();
                    log.lock().unwrap().push(cmd.clone());

                    let reply = if cmd.ends_with("VOLT?") {
                        format!("{voltage}\r\n")
                    } else if cmd.ends_with("CURR?") {
                        if garbage_left > 0 {
                            garbage_left -= 1;
                            "ERR -113\r\n".to_string()
                        } else {
                            format!("{voltage}\r\n")
                        }
                    } else if let Some(value) = cmd.rsplit(' ').next().and_then(|v| v.parse().ok())
                    {
                        voltage = value;
                        "OK\r\n".to_string()
                    } else {
                        "ERR -100\r\n".to_string()
                    };
                    if stream.write_all(reply.as_bytes()).is_err() {
                        break;
                    }
                }
            }
        });

        Self { port, commands }
    }

    fn commands(&self) -> Vec<String> {
        self.commands.lock().unwrap().clone()
    }

    /// Wait until the stub has seen `expected`. The client never reads a
    /// reply to its final restore command, so the command log can lag the
    /// sweep returning.
    fn wait_for_command(&self, expected: &str) {
        let deadline = std::time::Instant::now() + std::time::Duration::from_secs(1);
        loop {
            if self.commands().iter().any(|c| c == expected) {
                return;
            }
            assert!(
                std::time::Instant::now() < deadline,
                "stub never received {expected:?}"
            );
            thread::sleep(std::time::Duration::from_millis(5));
        }
    }
}

/// Sweep tuning with delays short enough for tests
fn fast_sweep_config() -> SweepConfig {
    SweepConfig {
        settle_delay_ms: 5,
        current_poll_delay_ms: 2,
        reflection_poll_delay_ms: 2,
        ..SweepConfig::default()
    }
}

fn connect(stub: &StubBlock) -> Block {
    Block::builder()
        .host("127.0.0.1")
        .port(stub.port)
        .sweep_config(fast_sweep_config())
        .build()
        .unwrap()
}

struct MockVna {
    calls: usize,
}

impl VnaDriver for MockVna {
    fn measure(&mut self, request: &VnaRequest) -> Result<VnaResponse, BlockError> {
        self.calls += 1;
        let points = request.points();
        let step = (request.freq_stop - request.freq_start) / (points - 1) as f64;
        Ok(VnaResponse {
            trace: vec![-(self.calls as f64); points],
            frequency: (0..points)
                .map(|i| request.freq_start + step * i as f64)
                .collect(),
        })
    }
}

#[test]
fn sweep_current_returns_evenly_spaced_samples() {
    let stub = StubBlock::spawn(0.25, 0);
    let block = connect(&stub);

    let sweep = block.sweep_current(0.0, 1.0, 3).unwrap();

    let samples: Vec<(f64, f64)> = sweep.samples.iter().map(|s| (s.voltage, s.current)).collect();
    assert_eq!(samples, vec![(0.0, 0.0), (0.5, 0.5), (1.0, 1.0)]);
}

#[test]
fn sweep_current_restores_initial_voltage() {
    let stub = StubBlock::spawn(0.25, 0);
    let block = connect(&stub);

    block.sweep_current(0.0, 1.0, 3).unwrap();

    stub.wait_for_command("BIAS:DEV2:VOLT 0.25");
    let commands = stub.commands();
    assert_eq!(commands.first().unwrap(), "BIAS:DEV2:VOLT?");
    assert_eq!(commands.last().unwrap(), "BIAS:DEV2:VOLT 0.25");
}

#[test]
fn sweep_current_descending() {
    let stub = StubBlock::spawn(0.0, 0);
    let block = connect(&stub);

    let sweep = block.sweep_current(1.0, 0.0, 3).unwrap();
    let voltages: Vec<f64> = sweep.voltages().collect();
    assert_eq!(voltages, vec![1.0, 0.5, 0.0]);
}

#[test]
fn sweep_current_retries_garbage_replies() {
    let stub = StubBlock::spawn(0.1, 2);
    let block = connect(&stub);

    let sweep = block.sweep_current(0.5, 0.5, 1).unwrap();

    // Only the final numeric reading is recorded
    assert_eq!(sweep.samples[0].current, 0.5);
    let queries = stub
        .commands()
        .iter()
        .filter(|c| c.ends_with("CURR?"))
        .count();
    assert_eq!(queries, 3);
}

#[test]
fn sweep_current_bounded_retry_surfaces_error() {
    let stub = StubBlock::spawn(0.1, usize::MAX);
    let block = Block::builder()
        .host("127.0.0.1")
        .port(stub.port)
        .sweep_config(SweepConfig {
            max_parse_retries: 3,
            ..fast_sweep_config()
        })
        .build()
        .unwrap();

    let err = block.sweep_current(0.5, 0.5, 1).unwrap_err();
    match err {
        BlockError::RetryExhausted { attempts, .. } => assert_eq!(attempts, 3),
        other => panic!("expected RetryExhausted, got {other}"),
    }
}

#[test]
fn sweep_current_rejects_zero_points() {
    let stub = StubBlock::spawn(0.0, 0);
    let block = connect(&stub);

    assert!(matches!(
        block.sweep_current(0.0, 1.0, 0),
        Err(BlockError::Config(_))
    ));
}

#[test]
fn one_shot_reads_return_trimmed_text() {
    let stub = StubBlock::spawn(0.125, 0);
    let block = connect(&stub);

    assert_eq!(block.read_voltage().unwrap(), "0.125");
    assert_eq!(block.read_current().unwrap(), "0.125");
}

#[test]
fn write_voltage_sends_set_command() {
    let stub = StubBlock::spawn(0.0, 0);
    let block = connect(&stub);

    block.write_voltage(1.5e-3).unwrap();

    // Fire-and-forget: the command arrives, nothing is read back
    stub.wait_for_command("BIAS:DEV2:VOLT 0.0015");
}

#[test]
fn sweep_reflection_collects_traces_and_final_frequency_axis() {
    let stub = StubBlock::spawn(0.0, 0);
    let block = connect(&stub);
    let mut vna = MockVna { calls: 0 };

    let params = ReflectionParams {
        v_from: 0.0,
        v_to: 1e-3,
        v_points: 2,
        freq_start: 4e9,
        freq_stop: 5e9,
        freq_points: Some(11),
        parameter: "S11".to_string(),
        averages: 4,
        export_path: None,
    };
    let sweep = block.sweep_reflection(&params, &mut vna).unwrap();

    assert_eq!(sweep.points.len(), 2);
    assert_eq!(vna.calls, 2);
    // Traces in visit order, one per bias point
    assert_eq!(sweep.points[0].trace, vec![-1.0; 11]);
    assert_eq!(sweep.points[1].trace, vec![-2.0; 11]);
    // Frequency axis recorded once, from the last response
    assert_eq!(sweep.frequency.len(), 11);
    assert_eq!(sweep.frequency[0], 4e9);
    assert_eq!(sweep.frequency[10], 5e9);
    // Currents echo the commanded voltages
    assert_eq!(sweep.points[1].voltage, 1e-3);
    assert_eq!(sweep.points[1].current, 1e-3);

    // Restoration holds for reflection sweeps too
    stub.wait_for_command("BIAS:DEV2:VOLT 0");
    assert_eq!(stub.commands().last().unwrap(), "BIAS:DEV2:VOLT 0");
}

#[test]
fn sweep_reflection_propagates_vna_errors() {
    struct FailingVna;
    impl VnaDriver for FailingVna {
        fn measure(&mut self, _request: &VnaRequest) -> Result<VnaResponse, BlockError> {
            Err(BlockError::Vna("calibration invalid".to_string()))
        }
    }

    let stub = StubBlock::spawn(0.0, 0);
    let block = connect(&stub);

    let params = ReflectionParams {
        v_from: 0.0,
        v_to: 1e-3,
        v_points: 2,
        freq_start: 4e9,
        freq_stop: 5e9,
        freq_points: None,
        parameter: "S11".to_string(),
        averages: 1,
        export_path: None,
    };
    let err = block.sweep_reflection(&params, &mut FailingVna).unwrap_err();
    assert!(matches!(err, BlockError::Vna(_)));
}
