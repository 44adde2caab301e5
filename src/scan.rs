use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::config::ScanConfig;
use crate::data::filter::{read_bins, BinReport};
use crate::data::loader::load_histogram;

// ---------------------------------------------------------------------------
// Per-run outcome
// ---------------------------------------------------------------------------

/// What happened to one run of the scan.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// No file at the rendered path.
    Missing(PathBuf),
    /// File read; the checked bins met the selection.
    Selected(BinReport),
    /// File read; the checked bins did not meet the selection.
    Rejected(BinReport),
    /// File present but unreadable, skipped because of `keep_going`.
    Failed(String),
}

/// Run numbers grouped by outcome, each in scan order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanSummary {
    pub selected: Vec<u32>,
    pub missing: Vec<u32>,
    pub rejected: Vec<u32>,
    pub failed: Vec<u32>,
}

impl ScanSummary {
    fn record(&mut self, run: u32, outcome: &RunOutcome) {
        let bucket = match outcome {
            RunOutcome::Missing(_) => &mut self.missing,
            RunOutcome::Selected(_) => &mut self.selected,
            RunOutcome::Rejected(_) => &mut self.rejected,
            RunOutcome::Failed(_) => &mut self.failed,
        };
        bucket.push(run);
    }

    pub fn scanned(&self) -> usize {
        self.selected.len() + self.missing.len() + self.rejected.len() + self.failed.len()
    }
}

// ---------------------------------------------------------------------------
// Scanner
// ---------------------------------------------------------------------------

/// Sequential scan over the configured run range.
pub struct Scanner {
    config: ScanConfig,
}

impl Scanner {
    pub fn new(config: ScanConfig) -> Self {
        Scanner { config }
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    /// Inspect one run. Missing files are an outcome, unreadable files an error.
    pub fn inspect(&self, run: u32) -> Result<RunOutcome> {
        let path = self.config.template.render(run);
        if !path.is_file() {
            return Ok(RunOutcome::Missing(path));
        }

        let hist = load_histogram(&path, &self.config.histogram)
            .with_context(|| format!("run {run}: {}", path.display()))?;
        let report = read_bins(&hist, &self.config.points);
        if self.config.selection.accepts(&report) {
            Ok(RunOutcome::Selected(report))
        } else {
            Ok(RunOutcome::Rejected(report))
        }
    }

    /// Scan every run, writing a line per missing file to `report`.
    pub fn run(&self, report: &mut impl Write) -> Result<ScanSummary> {
        if self.config.first_run >= self.config.end_run {
            warn!(
                "empty run range [{}, {}), nothing to scan",
                self.config.first_run, self.config.end_run
            );
        }

        let mut summary = ScanSummary::default();
        for run in self.config.runs() {
            let outcome = match self.inspect(run) {
                Ok(outcome) => outcome,
                Err(err) if self.config.keep_going => {
                    warn!("skipping {err:#}");
                    RunOutcome::Failed(format!("{err:#}"))
                }
                Err(err) => return Err(err),
            };

            match &outcome {
                RunOutcome::Missing(path) => {
                    writeln!(report, "File does not exist: {}", path.display())
                        .context("writing scan report")?;
                }
                RunOutcome::Selected(bins) => debug!("run {run}: selected ({bins})"),
                RunOutcome::Rejected(bins) => debug!("run {run}: rejected ({bins})"),
                RunOutcome::Failed(_) => {}
            }
            summary.record(run, &outcome);
        }

        info!(
            "scanned {} runs: {} selected, {} rejected, {} missing, {} failed",
            summary.scanned(),
            summary.selected.len(),
            summary.rejected.len(),
            summary.missing.len(),
            summary.failed.len()
        );
        Ok(summary)
    }
}

/// Write one run number per line, replacing any previous file.
pub fn write_run_list(path: &Path, runs: &[u32]) -> Result<()> {
    let file =
        File::create(path).with_context(|| format!("creating {}", path.display()))?;
    let mut out = BufWriter::new(file);
    for run in runs {
        writeln!(out, "{run}")?;
    }
    out.flush()
        .with_context(|| format!("writing {}", path.display()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::fs;

    use tempfile::TempDir;

    use super::*;
    use crate::config::PathTemplate;
    use crate::data::filter::Selection;

    fn write_json_run(dir: &Path, run: u32, bin200: f64, bin201: f64) {
        let body = format!(
            r#"{{"ID": {{"edges": [199, 200, 201, 202], "values": [1, {bin200}, {bin201}]}}}}"#
        );
        fs::write(dir.join(format!("run_{run}.json")), body).unwrap();
    }

    fn config_for(dir: &Path, first_run: u32, end_run: u32) -> ScanConfig {
        ScanConfig {
            first_run,
            end_run,
            template: PathTemplate::new(format!("{}/run_{{runnum}}.json", dir.display()))
                .unwrap(),
            output: dir.join("runs.txt"),
            ..ScanConfig::default()
        }
    }

    #[test]
    fn missing_filled_and_empty_runs() {
        let dir = TempDir::new().unwrap();
        write_json_run(dir.path(), 107924, 5.0, 3.0);
        write_json_run(dir.path(), 107925, 0.0, 7.0);

        let scanner = Scanner::new(config_for(dir.path(), 107923, 107926));
        let mut report = Vec::new();
        let summary = scanner.run(&mut report).unwrap();

        assert_eq!(summary.selected, vec![107924]);
        assert_eq!(summary.rejected, vec![107925]);
        assert_eq!(summary.missing, vec![107923]);
        assert!(summary.failed.is_empty());

        let printed = String::from_utf8(report).unwrap();
        assert_eq!(
            printed,
            format!(
                "File does not exist: {}\n",
                dir.path().join("run_107923.json").display()
            )
        );
    }

    #[test]
    fn any_empty_selection_inverts_the_decision() {
        let dir = TempDir::new().unwrap();
        write_json_run(dir.path(), 1, 5.0, 3.0);
        write_json_run(dir.path(), 2, 0.0, 7.0);

        let mut config = config_for(dir.path(), 1, 3);
        config.selection = Selection::AnyEmpty;
        let summary = Scanner::new(config).run(&mut std::io::sink()).unwrap();
        assert_eq!(summary.selected, vec![2]);
        assert_eq!(summary.rejected, vec![1]);
    }

    #[test]
    fn unreadable_file_aborts_unless_keep_going() {
        let dir = TempDir::new().unwrap();
        write_json_run(dir.path(), 1, 5.0, 3.0);
        fs::write(dir.path().join("run_2.json"), "not json").unwrap();
        write_json_run(dir.path(), 3, 4.0, 4.0);

        let strict = Scanner::new(config_for(dir.path(), 1, 4));
        let err = strict.run(&mut std::io::sink()).unwrap_err();
        assert!(format!("{err:#}").contains("run 2"));

        let mut config = config_for(dir.path(), 1, 4);
        config.keep_going = true;
        let summary = Scanner::new(config).run(&mut std::io::sink()).unwrap();
        assert_eq!(summary.selected, vec![1, 3]);
        assert_eq!(summary.failed, vec![2]);
    }

    #[test]
    fn empty_range_scans_nothing() {
        let dir = TempDir::new().unwrap();
        let summary = Scanner::new(config_for(dir.path(), 10, 10))
            .run(&mut std::io::sink())
            .unwrap();
        assert_eq!(summary, ScanSummary::default());
    }

    #[test]
    fn run_list_is_one_number_per_line() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("runs.txt");
        fs::write(&path, "stale\n").unwrap();

        write_run_list(&path, &[107924, 107930]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "107924\n107930\n");

        write_run_list(&path, &[]).unwrap();
        assert_eq!(fs::read_to_string(&path).unwrap(), "");
    }
}
