// End-to-end scans over stage0-style .root files written with the fixture writer.

use std::fs;
use std::path::Path;

use runscan::config::{PathTemplate, ScanConfig};
use runscan::data::filter::Selection;
use runscan::data::model::{Axis, Histogram1D};
use runscan::data::root::writer::RootWriter;
use runscan::data::root::{Codec, HistogramKind};
use runscan::scan::{write_run_list, RunOutcome, Scanner};
use tempfile::TempDir;

const STEM: &str = "Stage0_Histograms_Run_{runnum}_500ns_CW_0ns_CBT_0ns_DEBT.root";

fn run_path(dir: &Path, run: u32) -> std::path::PathBuf {
    dir.join(STEM.replace("{runnum}", &run.to_string()))
}

fn write_run(dir: &Path, run: u32, bin200: f64, bin201: f64, codec: Option<Codec>) {
    let axis = Axis::fixed(1000, 0.0, 1000.0).unwrap();
    let mut values = vec![10.0; 1000];
    values[200] = bin200;
    values[201] = bin201;
    let id = Histogram1D::from_bins("ID", axis, &values, 0.0, 0.0).unwrap();

    let mut writer = match codec {
        Some(codec) => RootWriter::with_compression(codec),
        None => RootWriter::new(),
    };
    writer.add_histogram(&id, HistogramKind::Double).unwrap();
    writer.write(&run_path(dir, run)).unwrap();
}

fn config(dir: &Path, first_run: u32, end_run: u32) -> ScanConfig {
    ScanConfig {
        first_run,
        end_run,
        template: PathTemplate::new(format!("{}/{STEM}", dir.display())).unwrap(),
        output: dir.join("runs_bothdata_map_11_15_201"),
        ..ScanConfig::default()
    }
}

#[test]
fn stage0_scenario() {
    let dir = TempDir::new().unwrap();
    write_run(dir.path(), 107924, 5.0, 3.0, None);
    write_run(dir.path(), 107925, 0.0, 7.0, Some(Codec::Zlib));

    let scanner = Scanner::new(config(dir.path(), 107923, 107926));
    let mut report = Vec::new();
    let summary = scanner.run(&mut report).unwrap();
    write_run_list(&scanner.config().output, &summary.selected).unwrap();

    let printed = String::from_utf8(report).unwrap();
    assert_eq!(
        printed,
        format!(
            "File does not exist: {}\n",
            run_path(dir.path(), 107923).display()
        )
    );
    let listed = fs::read_to_string(dir.path().join("runs_bothdata_map_11_15_201")).unwrap();
    assert_eq!(listed, "107924\n");
}

#[test]
fn output_is_ascending_and_unique() {
    let dir = TempDir::new().unwrap();
    let codecs = [None, Some(Codec::Zlib), Some(Codec::Zstd)];
    for run in 100..130u32 {
        if run % 4 == 0 {
            continue;
        }
        let bin200 = if run % 3 == 0 { 0.0 } else { 2.0 };
        write_run(dir.path(), run, bin200, 1.0, codecs[run as usize % 3]);
    }

    let summary = Scanner::new(config(dir.path(), 100, 130))
        .run(&mut std::io::sink())
        .unwrap();

    let expected: Vec<u32> = (100..130).filter(|r| r % 4 != 0 && r % 3 != 0).collect();
    assert_eq!(summary.selected, expected);
    assert!(summary.selected.windows(2).all(|w| w[0] < w[1]));
    assert!(summary.missing.iter().all(|r| r % 4 == 0));
    assert_eq!(summary.scanned(), 30);
}

#[test]
fn inspect_reports_the_checked_bins() {
    let dir = TempDir::new().unwrap();
    write_run(dir.path(), 7, 0.0, 7.0, None);

    let mut cfg = config(dir.path(), 7, 8);
    cfg.selection = Selection::AnyEmpty;
    let outcome = Scanner::new(cfg).inspect(7).unwrap();
    match outcome {
        RunOutcome::Selected(report) => {
            let contents: Vec<f64> = report.hits.iter().map(|h| h.content).collect();
            assert_eq!(contents, vec![0.0, 7.0]);
            assert_eq!(report.hits[0].bin, 201);
        }
        other => panic!("unexpected outcome {other:?}"),
    }
}

#[test]
fn missing_histogram_is_an_error() {
    let dir = TempDir::new().unwrap();
    write_run(dir.path(), 1, 1.0, 1.0, None);

    let mut cfg = config(dir.path(), 1, 2);
    cfg.histogram = "Esum".to_string();
    let err = Scanner::new(cfg).run(&mut std::io::sink()).unwrap_err();
    let message = format!("{err:#}");
    assert!(message.contains("run 1"), "{message}");
    assert!(message.contains("Esum"), "{message}");
}
