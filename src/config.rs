use std::path::PathBuf;

use clap::Parser;
use thiserror::Error;

use crate::data::filter::Selection;

/// Placeholder substituted with the run number in path templates.
pub const RUN_PLACEHOLDER: &str = "{runnum}";

pub const DEFAULT_PATH_TEMPLATE: &str = "/home/jr2514/DANCE/DANCE_Analysis/stage0_root/\
     Stage0_Histograms_Run_{runnum}_500ns_CW_0ns_CBT_0ns_DEBT.root";
pub const DEFAULT_FIRST_RUN: u32 = 107_923;
pub const DEFAULT_END_RUN: u32 = 108_922;
pub const DEFAULT_HISTOGRAM: &str = "ID";
pub const DEFAULT_OUTPUT: &str = "runs_bothdata_map_11_15_201";

/// Invalid command-line configuration.
#[derive(Debug, Error, PartialEq)]
pub enum ConfigError {
    #[error("path template {0:?} does not contain {{runnum}}")]
    MissingPlaceholder(String),

    #[error("at least one --point x-value is required")]
    NoPoints,

    #[error("x-value {0} is not finite")]
    NonFinitePoint(f64),
}

/// Scan DANCE stage0 run files and list the runs whose histogram bins pass a check.
#[derive(Debug, Parser)]
#[command(name = "runscan")]
#[command(version)]
pub struct Cli {
    /// First run number to scan (inclusive)
    #[arg(long, default_value_t = DEFAULT_FIRST_RUN)]
    pub first_run: u32,

    /// Run number where the scan stops (exclusive)
    #[arg(long, default_value_t = DEFAULT_END_RUN)]
    pub end_run: u32,

    /// Path of each run file; every {runnum} is replaced by the run number
    #[arg(long, default_value = DEFAULT_PATH_TEMPLATE)]
    pub path_template: String,

    /// Name of the 1-D histogram inspected in each file
    #[arg(long, default_value = DEFAULT_HISTOGRAM)]
    pub histogram: String,

    /// X-value whose bin is checked (repeat for several)
    #[arg(long = "point", default_values_t = [200.0, 201.0])]
    pub points: Vec<f64>,

    /// Condition a run must meet to be listed
    #[arg(long, value_enum, default_value_t = Selection::AllFilled)]
    pub select: Selection,

    /// File receiving the selected run numbers, one per line
    #[arg(short, long, default_value = DEFAULT_OUTPUT)]
    pub output: PathBuf,

    /// Log unreadable files and carry on instead of aborting the scan
    #[arg(long)]
    pub keep_going: bool,
}

/// A run-file path pattern containing [`RUN_PLACEHOLDER`].
#[derive(Debug, Clone, PartialEq)]
pub struct PathTemplate(String);

impl PathTemplate {
    pub fn new(template: impl Into<String>) -> Result<Self, ConfigError> {
        let template = template.into();
        if !template.contains(RUN_PLACEHOLDER) {
            return Err(ConfigError::MissingPlaceholder(template));
        }
        Ok(PathTemplate(template))
    }

    pub fn render(&self, run: u32) -> PathBuf {
        PathBuf::from(self.0.replace(RUN_PLACEHOLDER, &run.to_string()))
    }
}

/// Validated settings for one scan.
#[derive(Debug, Clone, PartialEq)]
pub struct ScanConfig {
    pub first_run: u32,
    pub end_run: u32,
    pub template: PathTemplate,
    pub histogram: String,
    pub points: Vec<f64>,
    pub selection: Selection,
    pub output: PathBuf,
    pub keep_going: bool,
}

impl ScanConfig {
    /// Runs visited by the scan, in order.
    pub fn runs(&self) -> std::ops::Range<u32> {
        self.first_run..self.end_run
    }
}

impl Default for ScanConfig {
    fn default() -> Self {
        ScanConfig {
            first_run: DEFAULT_FIRST_RUN,
            end_run: DEFAULT_END_RUN,
            template: PathTemplate(DEFAULT_PATH_TEMPLATE.to_string()),
            histogram: DEFAULT_HISTOGRAM.to_string(),
            points: vec![200.0, 201.0],
            selection: Selection::AllFilled,
            output: PathBuf::from(DEFAULT_OUTPUT),
            keep_going: false,
        }
    }
}

impl TryFrom<Cli> for ScanConfig {
    type Error = ConfigError;

    fn try_from(cli: Cli) -> Result<Self, Self::Error> {
        if cli.points.is_empty() {
            return Err(ConfigError::NoPoints);
        }
        if let Some(&x) = cli.points.iter().find(|x| !x.is_finite()) {
            return Err(ConfigError::NonFinitePoint(x));
        }
        Ok(ScanConfig {
            first_run: cli.first_run,
            end_run: cli.end_run,
            template: PathTemplate::new(cli.path_template)?,
            histogram: cli.histogram,
            points: cli.points,
            selection: cli.select,
            output: cli.output,
            keep_going: cli.keep_going,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<ScanConfig, ConfigError> {
        let cli = Cli::try_parse_from(std::iter::once("runscan").chain(args.iter().copied()))
            .unwrap();
        ScanConfig::try_from(cli)
    }

    #[test]
    fn defaults_reproduce_the_stage0_scan() {
        let config = parse(&[]).unwrap();
        assert_eq!(config, ScanConfig::default());
        assert_eq!(config.runs().len(), 999);
        assert_eq!(
            config.template.render(107923),
            PathBuf::from(
                "/home/jr2514/DANCE/DANCE_Analysis/stage0_root/\
                 Stage0_Histograms_Run_107923_500ns_CW_0ns_CBT_0ns_DEBT.root"
            )
        );
    }

    #[test]
    fn overrides() {
        let config = parse(&[
            "--first-run",
            "10",
            "--end-run",
            "12",
            "--path-template",
            "/data/{runnum}/run_{runnum}.json",
            "--point",
            "5",
            "--select",
            "any-empty",
            "-o",
            "out.txt",
            "--keep-going",
        ])
        .unwrap();
        assert_eq!(config.runs().collect::<Vec<_>>(), vec![10, 11]);
        assert_eq!(config.points, vec![5.0]);
        assert_eq!(config.selection, Selection::AnyEmpty);
        assert_eq!(config.output, PathBuf::from("out.txt"));
        assert!(config.keep_going);
        assert_eq!(
            config.template.render(11),
            PathBuf::from("/data/11/run_11.json")
        );
    }

    #[test]
    fn invalid_settings() {
        assert_eq!(
            parse(&["--path-template", "/data/run.root"]),
            Err(ConfigError::MissingPlaceholder("/data/run.root".into()))
        );
        assert!(matches!(
            parse(&["--point", "NaN"]),
            Err(ConfigError::NonFinitePoint(x)) if x.is_nan()
        ));
        assert!(Cli::try_parse_from(["runscan", "--select", "sometimes"]).is_err());
    }
}
