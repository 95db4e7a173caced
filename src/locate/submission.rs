//! Submission snapshot selection for multi-submission histories.
//!
//! A student directory holds one folder per snapshot: `submit` for the
//! first, `submit-1` .. `submit-N` for later ones, optionally a
//! `last-submit` marker folder, and a `submit-time` file with one line per
//! recorded submission.

use std::fs;
use std::io;
use std::path::Path;

use lazy_static::lazy_static;
use regex::Regex;

use crate::config::SubmissionPolicy;
use crate::error::LocateError;
use crate::model::Submission;

/// Marker folder holding the most recent snapshot.
pub const LAST_SUBMIT: &str = "last-submit";
/// One line per recorded submission.
pub const SUBMIT_TIME: &str = "submit-time";
/// Folder of the first snapshot.
pub const FIRST_SUBMIT: &str = "submit";

lazy_static! {
    static ref SNAPSHOT_DIR: Regex = Regex::new(r"^submit(-\d+)?$").unwrap();
}

/// Pick the snapshot folder to analyze under `student_dir`.
pub fn select_submission(
    student_dir: &Path,
    policy: SubmissionPolicy,
) -> Result<Submission, LocateError> {
    let count = count_submissions(student_dir)?;
    if count == 0 {
        return Err(LocateError::NotFound {
            identity: student_dir.display().to_string(),
            reason: "no recorded submissions".to_string(),
        });
    }

    let label = match policy {
        SubmissionPolicy::First => FIRST_SUBMIT.to_string(),
        SubmissionPolicy::Latest if student_dir.join(LAST_SUBMIT).is_dir() => {
            LAST_SUBMIT.to_string()
        }
        SubmissionPolicy::Latest if count <= 1 => FIRST_SUBMIT.to_string(),
        SubmissionPolicy::Latest => format!("{}-{}", FIRST_SUBMIT, count - 1),
    };

    Ok(Submission { label, count })
}

/// Number of recorded submissions.
///
/// Uses `submit-time` when present, otherwise counts snapshot folders.
pub fn count_submissions(student_dir: &Path) -> Result<usize, LocateError> {
    let io_err = |source: io::Error| LocateError::Io {
        path: student_dir.to_path_buf(),
        source,
    };

    let times = student_dir.join(SUBMIT_TIME);
    if times.is_file() {
        let content = fs::read_to_string(&times).map_err(io_err)?;
        return Ok(content.lines().filter(|l| !l.trim().is_empty()).count());
    }

    let mut count = 0;
    for entry in fs::read_dir(student_dir).map_err(io_err)? {
        let entry = entry.map_err(io_err)?;
        let name = entry.file_name();
        let is_dir = entry.file_type().map(|t| t.is_dir()).unwrap_or(false);
        if is_dir && SNAPSHOT_DIR.is_match(&name.to_string_lossy()) {
            count += 1;
        }
    }
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn student(snapshots: &[&str], times: Option<usize>) -> TempDir {
        let dir = TempDir::new().unwrap();
        for s in snapshots {
            fs::create_dir(dir.path().join(s)).unwrap();
        }
        if let Some(n) = times {
            let lines: String = (0..n).map(|i| format!("2020-10-0{} 12:00\n", i + 1)).collect();
            fs::write(dir.path().join(SUBMIT_TIME), lines).unwrap();
        }
        dir
    }

    #[test]
    fn test_marker_wins_regardless_of_count() {
        let dir = student(&["submit", "submit-1", "submit-2", LAST_SUBMIT], Some(3));
        let sub = select_submission(dir.path(), SubmissionPolicy::Latest).unwrap();
        assert_eq!(sub.label, LAST_SUBMIT);
        assert_eq!(sub.count, 3);
    }

    #[test]
    fn test_latest_numbered_snapshot() {
        let dir = student(&["submit", "submit-1", "submit-2"], Some(3));
        let sub = select_submission(dir.path(), SubmissionPolicy::Latest).unwrap();
        assert_eq!(sub.label, "submit-2");
    }

    #[test]
    fn test_single_submission() {
        let dir = student(&["submit"], Some(1));
        let sub = select_submission(dir.path(), SubmissionPolicy::Latest).unwrap();
        assert_eq!(sub.label, "submit");
        assert_eq!(sub.count, 1);
    }

    #[test]
    fn test_first_policy_ignores_marker() {
        let dir = student(&["submit", "submit-1", LAST_SUBMIT], Some(2));
        let sub = select_submission(dir.path(), SubmissionPolicy::First).unwrap();
        assert_eq!(sub.label, "submit");
        assert_eq!(sub.count, 2);
    }

    #[test]
    fn test_count_without_time_file() {
        let dir = student(&["submit", "submit-1", "notes"], None);
        assert_eq!(count_submissions(dir.path()).unwrap(), 2);
        let sub = select_submission(dir.path(), SubmissionPolicy::Latest).unwrap();
        assert_eq!(sub.label, "submit-1");
    }

    #[test]
    fn test_no_submissions() {
        let dir = student(&[], None);
        assert!(matches!(
            select_submission(dir.path(), SubmissionPolicy::Latest),
            Err(LocateError::NotFound { .. })
        ));
    }
}
