use std::fmt;

use thiserror::Error;

// ---------------------------------------------------------------------------
// Validation errors
// ---------------------------------------------------------------------------

/// Reasons a histogram cannot be built from decoded parts.
#[derive(Debug, Error, PartialEq)]
pub enum HistogramError {
    #[error("axis must have at least one bin")]
    NoBins,

    #[error("axis range is empty or inverted: [{xmin}, {xmax})")]
    BadRange { xmin: f64, xmax: f64 },

    #[error("expected {expected} bin edges, got {got}")]
    EdgeCount { expected: usize, got: usize },

    #[error("bin edges are not strictly ascending at index {0}")]
    UnsortedEdges(usize),

    #[error("expected {expected} cells (bins + under/overflow), got {got}")]
    CellCount { expected: usize, got: usize },
}

// ---------------------------------------------------------------------------
// Axis – binning of one dimension
// ---------------------------------------------------------------------------

/// Binning of a 1-D histogram axis.
///
/// Bin numbering follows ROOT: bin 0 is the underflow, bins `1..=nbins` cover
/// `[xmin, xmax)`, bin `nbins + 1` is the overflow.
#[derive(Debug, Clone, PartialEq)]
pub struct Axis {
    nbins: usize,
    xmin: f64,
    xmax: f64,
    /// Variable bin edges (`nbins + 1` values), empty for fixed-width bins.
    edges: Vec<f64>,
}

impl Axis {
    /// Fixed-width binning.
    pub fn fixed(nbins: usize, xmin: f64, xmax: f64) -> Result<Self, HistogramError> {
        if nbins == 0 {
            return Err(HistogramError::NoBins);
        }
        if !(xmin < xmax) {
            return Err(HistogramError::BadRange { xmin, xmax });
        }
        Ok(Axis {
            nbins,
            xmin,
            xmax,
            edges: Vec::new(),
        })
    }

    /// Variable-width binning from explicit edges.
    pub fn variable(edges: Vec<f64>) -> Result<Self, HistogramError> {
        if edges.len() < 2 {
            return Err(HistogramError::NoBins);
        }
        if let Some(i) = edges.windows(2).position(|w| !(w[0] < w[1])) {
            return Err(HistogramError::UnsortedEdges(i + 1));
        }
        Ok(Axis {
            nbins: edges.len() - 1,
            xmin: edges[0],
            xmax: edges[edges.len() - 1],
            edges,
        })
    }

    /// Binning as stored in a ROOT `TAxis`: an empty edge array means fixed bins.
    pub fn from_parts(
        nbins: usize,
        xmin: f64,
        xmax: f64,
        edges: Vec<f64>,
    ) -> Result<Self, HistogramError> {
        if edges.is_empty() {
            return Axis::fixed(nbins, xmin, xmax);
        }
        if edges.len() != nbins + 1 {
            return Err(HistogramError::EdgeCount {
                expected: nbins + 1,
                got: edges.len(),
            });
        }
        Axis::variable(edges)
    }

    pub fn nbins(&self) -> usize {
        self.nbins
    }

    pub fn xmin(&self) -> f64 {
        self.xmin
    }

    pub fn xmax(&self) -> f64 {
        self.xmax
    }

    /// Variable bin edges; empty for fixed-width bins.
    pub fn edges(&self) -> &[f64] {
        &self.edges
    }

    /// Index of the bin containing `x`, ROOT `TAxis::FindBin` semantics
    /// (without automatic axis extension).
    pub fn find_bin(&self, x: f64) -> usize {
        if x < self.xmin {
            return 0;
        }
        // NaN fails this comparison too and lands in the overflow, as in ROOT.
        if !(x < self.xmax) {
            return self.nbins + 1;
        }
        if self.edges.is_empty() {
            let width = self.xmax - self.xmin;
            let bin = 1 + (self.nbins as f64 * (x - self.xmin) / width) as usize;
            bin.min(self.nbins)
        } else {
            // Number of edges <= x, i.e. 1 + index of the last such edge.
            self.edges.partition_point(|&e| e <= x).min(self.nbins)
        }
    }
}

// ---------------------------------------------------------------------------
// Histogram1D – one decoded histogram
// ---------------------------------------------------------------------------

/// A 1-D histogram with its under/overflow cells.
#[derive(Debug, Clone, PartialEq)]
pub struct Histogram1D {
    pub name: String,
    pub title: String,
    axis: Axis,
    /// `nbins + 2` cells: underflow, bins, overflow.
    contents: Vec<f64>,
}

impl Histogram1D {
    pub fn new(
        name: impl Into<String>,
        title: impl Into<String>,
        axis: Axis,
        contents: Vec<f64>,
    ) -> Result<Self, HistogramError> {
        let expected = axis.nbins() + 2;
        if contents.len() != expected {
            return Err(HistogramError::CellCount {
                expected,
                got: contents.len(),
            });
        }
        Ok(Histogram1D {
            name: name.into(),
            title: title.into(),
            axis,
            contents,
        })
    }

    /// Build from in-range bin values plus the two flow cells.
    pub fn from_bins(
        name: impl Into<String>,
        axis: Axis,
        values: &[f64],
        underflow: f64,
        overflow: f64,
    ) -> Result<Self, HistogramError> {
        let mut contents = Vec::with_capacity(values.len() + 2);
        contents.push(underflow);
        contents.extend_from_slice(values);
        contents.push(overflow);
        Histogram1D::new(name, "", axis, contents)
    }

    pub fn axis(&self) -> &Axis {
        &self.axis
    }

    pub fn find_bin(&self, x: f64) -> usize {
        self.axis.find_bin(x)
    }

    /// Content of `bin`; out-of-range indices read as zero.
    pub fn bin_content(&self, bin: usize) -> f64 {
        self.contents.get(bin).copied().unwrap_or(0.0)
    }

    /// Content of the bin containing `x`.
    pub fn content_at(&self, x: f64) -> f64 {
        self.bin_content(self.find_bin(x))
    }

    /// Sum of all cells, flows included.
    pub fn integral(&self) -> f64 {
        self.contents.iter().sum()
    }
}

impl fmt::Display for Histogram1D {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} ({} bins in [{}, {}))",
            self.name,
            self.axis.nbins,
            self.axis.xmin,
            self.axis.xmax
        )
    }
}
