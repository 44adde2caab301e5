use std::path::Path;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use arrow::array::{Array, AsArray, Float32Array, Float64Array, LargeListArray, ListArray};
use arrow::datatypes::DataType;
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use serde::Deserialize;
use serde_json::Value as JsonValue;

use super::model::{Axis, Histogram1D};
use super::root::RootFile;

// ---------------------------------------------------------------------------
// Public entry-point
// ---------------------------------------------------------------------------

/// Load the histogram called `name` from a file.  Dispatch by extension.
///
/// Supported formats:
/// * `.root`    – stage0 output, read natively
/// * `.json`    – `{ "<name>": { "edges": [...], "values": [...] }, ... }`
/// * `.csv`     – long format `histogram,bin_low,bin_high,content`
/// * `.parquet` – one row per histogram with `edges` / `values` list columns
pub fn load_histogram(path: &Path, name: &str) -> Result<Histogram1D> {
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();

    match ext.as_str() {
        "root" => load_root(path, name),
        "parquet" | "pq" => load_parquet(path, name),
        "json" => load_json(path, name),
        "csv" => load_csv(path, name),
        other => bail!("Unsupported file extension: .{other}"),
    }
}

fn load_root(path: &Path, name: &str) -> Result<Histogram1D> {
    let mut file = RootFile::open(path).context("opening ROOT file")?;
    let hist = file
        .histogram(name)
        .with_context(|| format!("reading histogram '{name}'"))?;
    Ok(hist)
}

/// Assemble a histogram from exported edges and in-range values.
fn from_export(
    name: &str,
    title: String,
    edges: Vec<f64>,
    values: &[f64],
    underflow: f64,
    overflow: f64,
) -> Result<Histogram1D> {
    if edges.len() != values.len() + 1 {
        bail!(
            "'{name}': {} edges cannot bound {} bins",
            edges.len(),
            values.len()
        );
    }
    let axis = Axis::variable(edges).with_context(|| format!("'{name}': bad binning"))?;
    let mut hist = Histogram1D::from_bins(name, axis, values, underflow, overflow)?;
    hist.title = title;
    Ok(hist)
}

// ---------------------------------------------------------------------------
// JSON loader
// ---------------------------------------------------------------------------

/// One histogram entry of a JSON export.
#[derive(Debug, Deserialize)]
struct JsonHistogram {
    #[serde(default)]
    title: String,
    edges: Vec<f64>,
    values: Vec<f64>,
    #[serde(default)]
    underflow: f64,
    #[serde(default)]
    overflow: f64,
}

/// Expected JSON schema (an object keyed by histogram name):
///
/// ```json
/// {
///   "ID": {
///     "edges": [0.0, 1.0, 2.0, ...],
///     "values": [12.0, 0.0, ...],
///     "underflow": 0.0,
///     "overflow": 3.0
///   }
/// }
/// ```
fn load_json(path: &Path, name: &str) -> Result<Histogram1D> {
    let text = std::fs::read_to_string(path).context("reading JSON file")?;
    let root: JsonValue = serde_json::from_str(&text).context("parsing JSON")?;

    let entries = root
        .as_object()
        .context("Expected top-level JSON object keyed by histogram name")?;
    let entry = entries
        .get(name)
        .with_context(|| format!("no histogram '{name}' in {}", path.display()))?;
    let parsed: JsonHistogram = serde_json::from_value(entry.clone())
        .with_context(|| format!("histogram '{name}' has an invalid layout"))?;

    from_export(
        name,
        parsed.title,
        parsed.edges,
        &parsed.values,
        parsed.underflow,
        parsed.overflow,
    )
}

// ---------------------------------------------------------------------------
// CSV loader
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct CsvRow {
    histogram: String,
    bin_low: f64,
    bin_high: f64,
    content: f64,
}

/// CSV layout: header `histogram,bin_low,bin_high,content`, one row per bin.
/// A row with `bin_low = -inf` is the underflow, `bin_high = inf` the overflow.
/// Bins of one histogram must be contiguous; row order does not matter.
fn load_csv(path: &Path, name: &str) -> Result<Histogram1D> {
    let mut reader = csv::Reader::from_path(path).context("opening CSV")?;

    let mut bins: Vec<(f64, f64, f64)> = Vec::new();
    let mut underflow = 0.0;
    let mut overflow = 0.0;

    for (row_no, result) in reader.deserialize::<CsvRow>().enumerate() {
        let row = result.with_context(|| format!("CSV row {row_no}"))?;
        if row.histogram != name {
            continue;
        }
        if row.bin_low == f64::NEG_INFINITY {
            underflow += row.content;
        } else if row.bin_high == f64::INFINITY {
            overflow += row.content;
        } else {
            bins.push((row.bin_low, row.bin_high, row.content));
        }
    }

    if bins.is_empty() {
        bail!("no histogram '{name}' in {}", path.display());
    }
    bins.sort_by(|a, b| a.0.total_cmp(&b.0));

    let mut edges = Vec::with_capacity(bins.len() + 1);
    for (i, w) in bins.windows(2).enumerate() {
        if w[0].1 != w[1].0 {
            bail!(
                "'{name}': bin {} ends at {} but bin {} starts at {}",
                i + 1,
                w[0].1,
                i + 2,
                w[1].0
            );
        }
    }
    edges.extend(bins.iter().map(|b| b.0));
    edges.push(bins[bins.len() - 1].1);
    let values: Vec<f64> = bins.iter().map(|b| b.2).collect();

    from_export(name, String::new(), edges, &values, underflow, overflow)
}

// ---------------------------------------------------------------------------
// Parquet loader
// ---------------------------------------------------------------------------

/// Load a histogram from a Parquet export.
///
/// Expected schema, one row per histogram:
/// - `histogram`: Utf8 – histogram name
/// - `edges`: List<Float64> or LargeList<Float64> – `nbins + 1` bin edges
/// - `values`: List<Float64> or LargeList<Float64> – `nbins` bin contents
/// - `underflow`, `overflow`: Float64, optional
fn load_parquet(path: &Path, name: &str) -> Result<Histogram1D> {
    let file = std::fs::File::open(path).context("opening parquet file")?;
    let builder =
        ParquetRecordBatchReaderBuilder::try_new(file).context("reading parquet metadata")?;
    let reader = builder.build().context("building parquet reader")?;

    for batch_result in reader {
        let batch = batch_result.context("reading parquet record batch")?;
        let schema = batch.schema();

        let column = |col: &str| {
            schema
                .index_of(col)
                .map(|i| batch.column(i))
                .map_err(|_| anyhow::anyhow!("Parquet file missing '{col}' column"))
        };
        let names = column("histogram")?;
        let edges_col = column("edges")?;
        let values_col = column("values")?;
        let underflow_col = column("underflow").ok();
        let overflow_col = column("overflow").ok();

        for row in 0..batch.num_rows() {
            if extract_string(names, row)?.as_deref() != Some(name) {
                continue;
            }
            let edges = extract_f64_list(edges_col, row)
                .with_context(|| format!("Row {row}: failed to read 'edges'"))?;
            let values = extract_f64_list(values_col, row)
                .with_context(|| format!("Row {row}: failed to read 'values'"))?;
            let underflow = extract_f64(underflow_col, row)?;
            let overflow = extract_f64(overflow_col, row)?;
            return from_export(name, String::new(), edges, &values, underflow, overflow);
        }
    }

    bail!("no histogram '{name}' in {}", path.display())
}

// -- Parquet / Arrow helpers --

fn extract_string(col: &Arc<dyn Array>, row: usize) -> Result<Option<String>> {
    if col.is_null(row) {
        return Ok(None);
    }
    let value = match col.data_type() {
        DataType::Utf8 => col.as_string::<i32>().value(row),
        DataType::LargeUtf8 => col.as_string::<i64>().value(row),
        other => bail!("Expected string 'histogram' column, got {other:?}"),
    };
    Ok(Some(value.to_string()))
}

/// A flow cell; a missing column or null reads as zero.
fn extract_f64(col: Option<&Arc<dyn Array>>, row: usize) -> Result<f64> {
    let Some(col) = col else {
        return Ok(0.0);
    };
    if col.is_null(row) {
        return Ok(0.0);
    }
    if let Some(arr) = col.as_any().downcast_ref::<Float64Array>() {
        Ok(arr.value(row))
    } else if let Some(arr) = col.as_any().downcast_ref::<Float32Array>() {
        Ok(arr.value(row) as f64)
    } else {
        bail!("Expected Float64 flow column, got {:?}", col.data_type())
    }
}

/// Extract a `Vec<f64>` from a List or LargeList column at the given row.
fn extract_f64_list(col: &Arc<dyn Array>, row: usize) -> Result<Vec<f64>> {
    if col.is_null(row) {
        bail!("null value in list column");
    }

    let values_array = match col.data_type() {
        DataType::List(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<ListArray>()
                .context("expected ListArray")?;
            list_arr.value(row)
        }
        DataType::LargeList(_) => {
            let list_arr = col
                .as_any()
                .downcast_ref::<LargeListArray>()
                .context("expected LargeListArray")?;
            list_arr.value(row)
        }
        other => bail!("Expected List or LargeList column, got {other:?}"),
    };

    if let Some(f64_arr) = values_array.as_any().downcast_ref::<Float64Array>() {
        Ok(f64_arr.iter().map(|v| v.unwrap_or(0.0)).collect())
    } else if let Some(f32_arr) = values_array.as_any().downcast_ref::<Float32Array>() {
        Ok(f32_arr.iter().map(|v| v.unwrap_or(0.0) as f64).collect())
    } else {
        bail!(
            "List inner type is {:?}, expected Float64 or Float32",
            values_array.data_type()
        )
    }
}
