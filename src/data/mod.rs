/// Data layer: histogram model, file readers, and run selection.
///
/// Architecture:
/// ```text
///  .root / .json / .csv / .parquet
///        │
///        ▼
///   ┌──────────┐
///   │  loader   │  parse file → Histogram1D  (root: native reader)
///   └──────────┘
///        │
///        ▼
///   ┌─────────────┐
///   │ Histogram1D  │  axis + contents with under/overflow
///   └─────────────┘
///        │
///        ▼
///   ┌──────────┐
///   │  filter   │  read bins at x-values → Selection decides
///   └──────────┘
/// ```
pub mod filter;
pub mod loader;
pub mod model;
pub mod root;
