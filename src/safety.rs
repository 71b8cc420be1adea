//! Safety checks for the JSON run report.
//!
//! The report path comes from the command line and is overwritten without
//! asking, so it must never point at one of the audio files being tagged.

use std::path::Path;

use crate::error::{Error, Result};

fn refuse(path: &Path, message: impl Into<String>) -> Error {
    Error::InvalidReport {
        path: path.to_path_buf(),
        message: message.into(),
    }
}

/// Validates that a report path is safe to overwrite.
///
/// Checks:
/// - the file name ends in `.json`
/// - it is not an existing directory
/// - it is not one of the files in `inputs`
pub fn validate_report_path(report: &Path, inputs: &[impl AsRef<Path>]) -> Result<()> {
    let is_json = report
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.eq_ignore_ascii_case("json"))
        .unwrap_or(false);
    if !is_json {
        return Err(refuse(report, "report file must have a .json extension"));
    }

    if report.is_dir() {
        return Err(refuse(report, "path is a directory"));
    }

    if let Some(input) = inputs.iter().find(|i| i.as_ref() == report) {
        return Err(refuse(
            report,
            format!("cannot be the same as input '{}'", input.as_ref().display()),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use tempfile::TempDir;

    #[test]
    fn test_valid_report_path() {
        let report = PathBuf::from("/tmp/utanet-report.json");
        let inputs = vec![PathBuf::from("/music/01 - a.mp3")];
        assert!(validate_report_path(&report, &inputs).is_ok());
    }

    #[test]
    fn test_requires_json_extension() {
        let result = validate_report_path(Path::new("/tmp/report.txt"), &Vec::<PathBuf>::new());
        assert!(result.unwrap_err().to_string().contains(".json extension"));
    }

    #[test]
    fn test_report_equals_input() {
        // Odd, but a .json input list entry must still be refused
        let path = PathBuf::from("/music/list.json");
        let result = validate_report_path(&path, &[path.clone()]);
        assert!(result.unwrap_err().to_string().contains("cannot be the same as input"));
    }

    #[test]
    fn test_directory_refused() {
        let dir = TempDir::new().unwrap();
        let json_dir = dir.path().join("out.json");
        std::fs::create_dir(&json_dir).unwrap();
        assert!(validate_report_path(&json_dir, &Vec::<PathBuf>::new()).is_err());
    }
}
