use textplots::{Chart, Plot, Shape};

use crate::sweep::IvSweep;

/// Milli scaling used for both axes of the IV plot
const MILLI: f64 = 1e3;

/// Render a recorded sweep as a terminal scatter plot, voltage in mV
/// against current in mA.
///
/// # Examples
/// ```
/// use block_sweep::{plot_iv, IvSweep, Sample};
///
/// let sweep = IvSweep {
///     samples: vec![
///         Sample { voltage: 1e-3, current: 2e-6 },
///         Sample { voltage: 2e-3, current: 5e-6 },
///     ],
/// };
/// plot_iv(&sweep, None, None).unwrap();
/// ```
pub fn plot_iv(
    sweep: &IvSweep,
    width: Option<usize>,
    height: Option<usize>,
) -> Result<(), Box<dyn std::error::Error>> {
    if sweep.is_empty() {
        return Err("Cannot plot empty sweep".into());
    }

    let width = width.unwrap_or(140);
    let height = height.unwrap_or(60);

    let frame: Vec<(f32, f32)> = sweep
        .samples
        .iter()
        .map(|s| ((s.voltage * MILLI) as f32, (s.current * MILLI) as f32))
        .collect();

    let v_min = frame.iter().map(|p| p.0).fold(f32::INFINITY, f32::min);
    let mut v_max = frame.iter().map(|p| p.0).fold(f32::NEG_INFINITY, f32::max);
    if v_max <= v_min {
        // Degenerate x range, e.g. a single-point sweep
        v_max = v_min + 1.0;
    }
    let i_min = sweep.currents().fold(f64::INFINITY, f64::min) * MILLI;
    let i_max = sweep.currents().fold(f64::NEG_INFINITY, f64::max) * MILLI;

    println!("IV Sweep");
    println!("X-axis: SIS Voltage, mV | Y-axis: SIS Current, mA");
    println!(
        "Range: {} points | Current: {:.4} to {:.4} mA",
        sweep.len(),
        i_min,
        i_max
    );
    println!("{}", "─".repeat(width));

    Chart::new(width as u32, height as u32, v_min, v_max)
        .lineplot(&Shape::Points(&frame))
        .nice();

    println!("SIS Voltage, mV →");

    Ok(())
}
