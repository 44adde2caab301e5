use std::ops::Range;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};

use runscan::data::model::{Axis, Histogram1D};
use runscan::data::root::writer::RootWriter;
use runscan::data::root::{Codec, HistogramKind};

/// Write a directory of synthetic stage0 run files for trying `runscan`.
#[derive(Parser)]
struct Args {
    /// Directory receiving the run files
    #[arg(long, default_value = "sample_stage0")]
    dir: PathBuf,

    /// First run number generated
    #[arg(long, default_value_t = 107_923)]
    first_run: u32,

    /// Number of consecutive run numbers covered (some are left missing)
    #[arg(long, default_value_t = 40)]
    count: u32,

    /// Payload compression
    #[arg(long, value_enum, default_value_t = SampleCompression::Zlib)]
    compression: SampleCompression,
}

#[derive(Clone, Copy, ValueEnum)]
enum SampleCompression {
    None,
    Zlib,
    Zstd,
}

/// Minimal deterministic PRNG (xoshiro256**)
struct SimpleRng {
    state: [u64; 4],
}

impl SimpleRng {
    fn new(seed: u64) -> Self {
        let mut s = [0u64; 4];
        let mut x = seed;
        for slot in &mut s {
            x = x.wrapping_mul(6364136223846793005).wrapping_add(1);
            *slot = x;
        }
        SimpleRng { state: s }
    }

    fn next_u64(&mut self) -> u64 {
        let result = (self.state[1].wrapping_mul(5))
            .rotate_left(7)
            .wrapping_mul(9);
        let t = self.state[1] << 17;
        self.state[2] ^= self.state[0];
        self.state[3] ^= self.state[1];
        self.state[1] ^= self.state[2];
        self.state[0] ^= self.state[3];
        self.state[2] ^= t;
        self.state[3] = self.state[3].rotate_left(45);
        result
    }

    fn next_f64(&mut self) -> f64 {
        (self.next_u64() >> 11) as f64 / (1u64 << 53) as f64
    }

    /// Box-Muller transform for normal distribution
    fn gauss(&mut self, mean: f64, std_dev: f64) -> f64 {
        let u1 = self.next_f64().max(1e-15);
        let u2 = self.next_f64();
        let z = (-2.0 * u1.ln()).sqrt() * (2.0 * std::f64::consts::PI * u2).cos();
        mean + std_dev * z
    }
}

/// Crystal/detector ID spectrum: 1000 unit bins with a per-channel rate.
/// `dead` channels stay at zero, the way unmapped channels look in stage0.
fn id_spectrum(rng: &mut SimpleRng, dead: &[usize]) -> Result<Histogram1D> {
    let axis = Axis::fixed(1000, 0.0, 1000.0)?;
    let values: Vec<f64> = (0..1000)
        .map(|channel| {
            if dead.contains(&channel) {
                0.0
            } else {
                rng.gauss(500.0, 40.0).max(1.0).round()
            }
        })
        .collect();
    let mut hist = Histogram1D::from_bins("ID", axis, &values, 0.0, 0.0)?;
    hist.title = "ID".to_string();
    Ok(hist)
}

fn esum_spectrum(rng: &mut SimpleRng) -> Result<Histogram1D> {
    let axis = Axis::fixed(400, 0.0, 20.0)?;
    let values: Vec<f64> = (0..400)
        .map(|i| {
            let e = i as f64 * 0.05;
            (2000.0 * (-(e - 6.5).powi(2) / 2.0).exp() + rng.gauss(0.0, 5.0))
                .max(0.0)
                .round()
        })
        .collect();
    Ok(Histogram1D::from_bins("Esum", axis, &values, 0.0, 0.0)?)
}

/// Run numbers `first..first + count`, refusing ranges past `u32::MAX`.
fn run_range(first: u32, count: u32) -> Result<Range<u32>> {
    let end = first
        .checked_add(count)
        .context("--first-run plus --count does not fit in a run number")?;
    Ok(first..end)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let mut rng = SimpleRng::new(42);

    std::fs::create_dir_all(&args.dir)
        .with_context(|| format!("creating {}", args.dir.display()))?;

    let runs = run_range(args.first_run, args.count)?;
    let end_run = runs.end;

    let mut written = 0;
    for run in runs {
        let offset = run - args.first_run;
        if offset % 7 == 3 {
            continue;
        }
        // Every fifth run loses one of the two checked channels.
        let dead: &[usize] = match offset % 5 {
            1 => &[200],
            4 => &[201],
            _ => &[],
        };

        let mut writer = match args.compression {
            SampleCompression::None => RootWriter::new(),
            SampleCompression::Zlib => RootWriter::with_compression(Codec::Zlib),
            SampleCompression::Zstd => RootWriter::with_compression(Codec::Zstd),
        };
        writer
            .add_histogram(&id_spectrum(&mut rng, dead)?, HistogramKind::Double)?
            .add_histogram(&esum_spectrum(&mut rng)?, HistogramKind::Float)?;

        let path = args.dir.join(format!(
            "Stage0_Histograms_Run_{run}_500ns_CW_0ns_CBT_0ns_DEBT.root"
        ));
        writer
            .write(&path)
            .with_context(|| format!("writing {}", path.display()))?;
        written += 1;
    }

    println!(
        "Wrote {written} run files to {} (runs {}..{})",
        args.dir.display(),
        args.first_run,
        end_run
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_range_rejects_overflow() {
        assert_eq!(run_range(107_923, 40).unwrap(), 107_923..107_963);
        assert_eq!(run_range(u32::MAX, 0).unwrap(), u32::MAX..u32::MAX);
        assert!(run_range(u32::MAX - 1, 2).is_err());
    }
}
