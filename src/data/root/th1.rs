use super::buffer::RBuffer;
use super::RootError;
use crate::data::model::{Axis, Histogram1D};

/// Storage type of the bin array, one per concrete `TH1` class.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistogramKind {
    Double,
    Float,
    Int,
    Short,
    Char,
}

impl HistogramKind {
    pub fn from_class(class: &str) -> Option<Self> {
        match class {
            "TH1D" => Some(HistogramKind::Double),
            "TH1F" => Some(HistogramKind::Float),
            "TH1I" => Some(HistogramKind::Int),
            "TH1S" => Some(HistogramKind::Short),
            "TH1C" => Some(HistogramKind::Char),
            _ => None,
        }
    }

    pub fn class_name(self) -> &'static str {
        match self {
            HistogramKind::Double => "TH1D",
            HistogramKind::Float => "TH1F",
            HistogramKind::Int => "TH1I",
            HistogramKind::Short => "TH1S",
            HistogramKind::Char => "TH1C",
        }
    }
}

/// Decode a streamed `TH1x` object.
///
/// Layout: `TH1x` header, then the `TH1` base (name, attributes, axes,
/// statistics), then the `TArray` base holding `fNcells` bin contents.
pub fn decode(data: &[u8], kind: HistogramKind) -> Result<Histogram1D, RootError> {
    let mut buf = RBuffer::new(data);

    let _outer = buf.read_version()?;
    let th1 = buf.read_version()?;
    let (name, title) = buf.read_tnamed()?;
    buf.skip_object("TAttLine")?;
    buf.skip_object("TAttFill")?;
    buf.skip_object("TAttMarker")?;
    let ncells = buf.read_len()?;
    let axis = read_axis(&mut buf)?;
    buf.skip_object("TAxis")?;
    buf.skip_object("TAxis")?;
    // Statistics, contour, options and the function list are not needed.
    buf.finish(th1, "TH1")?;

    let contents = read_array(&mut buf, kind)?;
    if contents.len() != ncells {
        return Err(RootError::Malformed(format!(
            "{name}: fNcells is {ncells} but the bin array holds {}",
            contents.len()
        )));
    }
    Ok(Histogram1D::new(name, title, axis, contents)?)
}

fn read_axis(buf: &mut RBuffer<'_>) -> Result<Axis, RootError> {
    let header = buf.read_version()?;
    let _ = buf.read_tnamed()?;
    buf.skip_object("TAttAxis")?;
    let nbins = buf.read_len()?;
    let xmin = buf.read_f64()?;
    let xmax = buf.read_f64()?;
    let nedges = buf.read_len()?;
    let edges = (0..nedges)
        .map(|_| buf.read_f64())
        .collect::<Result<Vec<_>, _>>()?;
    buf.finish(header, "TAxis")?;
    Ok(Axis::from_parts(nbins, xmin, xmax, edges)?)
}

fn read_array(buf: &mut RBuffer<'_>, kind: HistogramKind) -> Result<Vec<f64>, RootError> {
    let n = buf.read_len()?;
    let width = match kind {
        HistogramKind::Double => 8,
        HistogramKind::Float | HistogramKind::Int => 4,
        HistogramKind::Short => 2,
        HistogramKind::Char => 1,
    };
    if n.saturating_mul(width) > buf.remaining() {
        return Err(RootError::Malformed(format!(
            "bin array of {n} entries overruns the object"
        )));
    }
    (0..n)
        .map(|_| match kind {
            HistogramKind::Double => buf.read_f64(),
            HistogramKind::Float => buf.read_f32().map(f64::from),
            HistogramKind::Int => buf.read_i32().map(f64::from),
            HistogramKind::Short => buf.read_i16().map(f64::from),
            HistogramKind::Char => buf.read_i8().map(f64::from),
        })
        .collect()
}
