use std::fmt;

use clap::ValueEnum;

use super::model::Histogram1D;

// ---------------------------------------------------------------------------
// Bin contents at the requested x-values
// ---------------------------------------------------------------------------

/// Content read at one requested x-value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BinHit {
    pub x: f64,
    pub bin: usize,
    pub content: f64,
}

impl BinHit {
    pub fn is_empty(&self) -> bool {
        self.content == 0.0
    }
}

/// The bins a run was judged on, in the order of the x-values.
#[derive(Debug, Clone, PartialEq)]
pub struct BinReport {
    pub hits: Vec<BinHit>,
}

impl fmt::Display for BinReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, hit) in self.hits.iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "x={} (bin {}) = {}", hit.x, hit.bin, hit.content)?;
        }
        Ok(())
    }
}

/// Look up the bin containing each `x` and read its content.
pub fn read_bins(hist: &Histogram1D, xs: &[f64]) -> BinReport {
    let hits = xs
        .iter()
        .map(|&x| {
            let bin = hist.find_bin(x);
            BinHit {
                x,
                bin,
                content: hist.bin_content(bin),
            }
        })
        .collect();
    BinReport { hits }
}

// ---------------------------------------------------------------------------
// Selection: which runs are recorded
// ---------------------------------------------------------------------------

/// Condition a run must meet to be written to the run list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum Selection {
    /// Every checked bin has a non-zero content.
    #[default]
    AllFilled,
    /// At least one checked bin is empty.
    AnyEmpty,
}

impl Selection {
    /// An empty report never selects a run.
    pub fn accepts(self, report: &BinReport) -> bool {
        if report.hits.is_empty() {
            return false;
        }
        match self {
            Selection::AllFilled => report.hits.iter().all(|h| !h.is_empty()),
            Selection::AnyEmpty => report.hits.iter().any(BinHit::is_empty),
        }
    }
}
