//! One cluster's fitted values across repeated ASteCA runs.

use std::fmt;
use std::path::{Path, PathBuf};

use anyhow::Result;

use crate::data::loader::load_asteca_output;
use crate::data::model::Measurement;

/// Labels of the standard set of fitting runs.
pub const DEFAULT_RUNS: [&str; 10] = [
    "1st", "2nd", "3rd", "4th", "5th", "6th", "7th", "8th", "9th", "10th",
];

/// `<root>/<run>_run/asteca_output_<run>.dat`
pub fn run_output_path(root: &Path, run: &str) -> PathBuf {
    root.join(format!("{run}_run")).join(format!("asteca_output_{run}.dat"))
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunValues {
    pub run: String,
    pub feh: Measurement,
    pub log_age: Measurement,
    pub ebv: Measurement,
}

impl fmt::Display for RunValues {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{:>5}  z={:.4}±{:.4}  log_age={:.3}±{:.3}  E(B-V)={:.3}±{:.3}",
            self.run,
            self.feh.value,
            self.feh.sigma,
            self.log_age.value,
            self.log_age.sigma,
            self.ebv.value,
            self.ebv.sigma
        )
    }
}

/// Values of cluster `name` in every run output that lists it, in run order.
/// A run file that cannot be read aborts the scan.
pub fn cluster_across_runs<S: AsRef<str>>(root: &Path, runs: &[S], name: &str) -> Result<Vec<RunValues>> {
    let mut out = Vec::new();
    for run in runs {
        let run = run.as_ref();
        let path = run_output_path(root, run);
        let clusters = load_asteca_output(&path)?;
        match clusters.into_iter().find(|c| c.name == name) {
            Some(c) => out.push(RunValues {
                run: run.to_string(),
                feh: c.feh,
                log_age: c.log_age,
                ebv: c.ebv,
            }),
            None => log::debug!("{name} not in run {run}"),
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn row(name: &str, z: f64) -> String {
        format!(
            "{name} 00h52m00s -72d00m00s 100 5 150 0.3 0.9 1.1 {z} 0.002 9.2 0.1 0.05 0.01 18.9 0.05 3000 400\n"
        )
    }

    fn write_run(root: &Path, run: &str, body: &str) {
        let path = run_output_path(root, run);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, format!("# ASteCA output\n{body}")).unwrap();
    }

    #[test]
    fn path_layout() {
        assert_eq!(
            run_output_path(Path::new("runs"), "3rd"),
            PathBuf::from("runs/3rd_run/asteca_output_3rd.dat")
        );
    }

    #[test]
    fn collects_the_cluster_from_each_run() {
        let dir = tempfile::tempdir().unwrap();
        write_run(dir.path(), "1st", &(row("K3", 0.004) + &row("L1", 0.001)));
        write_run(dir.path(), "2nd", &row("L1", 0.002));
        write_run(dir.path(), "3rd", &row("K3", 0.006));

        let vals = cluster_across_runs(dir.path(), &["1st", "2nd", "3rd"], "K3").unwrap();
        let got: Vec<(&str, f64)> = vals.iter().map(|v| (v.run.as_str(), v.feh.value)).collect();
        assert_eq!(got, vec![("1st", 0.004), ("3rd", 0.006)]);
        assert_eq!(vals[0].log_age, Measurement::new(9.2, 0.1));
    }

    #[test]
    fn missing_run_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        write_run(dir.path(), "1st", &row("K3", 0.004));
        let err = cluster_across_runs(dir.path(), &["1st", "2nd"], "K3").unwrap_err();
        assert!(format!("{err:#}").contains("asteca_output_2nd.dat"));
    }
}
