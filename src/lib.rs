/// Scan numbered DANCE stage0 run files and list the runs whose histogram
/// bins meet a condition.
///
/// ```text
///  config ──► scan ──► data::loader ──► data::filter
///   (CLI)    (loop)    (root/json/...)   (selection)
/// ```
pub mod config;
pub mod data;
pub mod scan;
