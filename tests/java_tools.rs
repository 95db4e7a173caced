//! Java cohort runs against shell-script stand-ins for PMD and multimetric.
#![cfg(unix)]

use std::fs;
use std::path::Path;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;

use cohortscan::batch::{Batch, DiagnosticKind};
use cohortscan::config::{Config, ToolCommand};
use cohortscan::model::{ParticipantRecord, SourceLanguage};
use tempfile::TempDir;

const MULTIMETRIC_OUT: &str = r#"{
  "overall": {"loc": 9, "comment_ratio": 11.11, "cyclomatic_complexity": 3},
  "files": {
    "Main.java": {"loc": 9, "comment_ratio": 11.11, "cyclomatic_complexity": 3, "halstead_volume": 120.0}
  },
  "stats": {
    "mean": {"cyclomatic_complexity": 3, "halstead_volume": 120.0, "halstead_difficulty": 6.5, "halstead_timerequired": 43.33, "halstead_effort": 780.0},
    "min": {"cyclomatic_complexity": 3, "halstead_volume": 120.0, "halstead_difficulty": 6.5, "halstead_timerequired": 43.33, "halstead_effort": 780.0},
    "max": {"cyclomatic_complexity": 3, "halstead_volume": 120.0, "halstead_difficulty": 6.5, "halstead_timerequired": 43.33, "halstead_effort": 780.0}
  }
}"#;

const PMD_OUT: &str = r#"{"files": [{"filename": "Main.java", "violations": [
  {"rule": "SystemPrintln", "description": "Usage of System.out/err"},
  {"rule": "UseUtilityClass", "description": "All methods are static"},
  {"rule": "CognitiveComplexity", "description": "The method 'main(String[])' has a cognitive complexity of 18, current threshold is 15"},
  {"rule": "CognitiveComplexity", "description": "The method 'play(int)' has a cognitive complexity of 16, current threshold is 15"}
]}]}"#;

const MAIN: &str = "\
// Entry point
public class Main {
    public static void main(String[] args) {
        for (String a : args) {
            if (a.isEmpty()) {
                System.out.println(a);
            }
        }
    }
}
";

fn write(root: &Path, rel: &str, text: &str) {
    let path = root.join(rel);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, text).unwrap();
}

/// `sh <script> <args...>`; the script body sees the expanded args.
fn script(root: &Path, name: &str, body: &str, args: &[&str], ok: Vec<i32>) -> ToolCommand {
    let path = root.join(format!("{}.sh", name));
    fs::write(&path, body).unwrap();
    let mut all = vec![path.display().to_string()];
    all.extend(args.iter().map(|a| a.to_string()));
    ToolCommand {
        program: "sh".to_string(),
        args: all,
        ok_exit_codes: ok,
        timeout_secs: Some(5),
    }
}

fn fixture() -> (TempDir, Config) {
    let tmp = TempDir::new().unwrap();
    let root = tmp.path();
    write(root, "data/multimetric.json", MULTIMETRIC_OUT);
    write(root, "data/pmd.json", PMD_OUT);

    write(root, "src/jdoe/project_2/Main.java", MAIN);
    write(root, "src/asmith/project_2/Main.java", MAIN);
    write(root, "src/asmith/project_2/Crash.java", MAIN.replace("Main", "Crash").as_str());
    write(root, "src/bkim/project_2/Slow.java", MAIN.replace("Main", "Slow").as_str());

    let yaml = r#"
cohorts:
  - name: CS46A_Fall21
    language: java
    survey: survey.csv
    source_root: src
    output: out.csv
    layout:
      kind: direct
"#;
    let mut config: Config = serde_yaml::from_str(yaml).unwrap();
    config.base_dir = root.to_path_buf();

    let data = root.join("data");
    config.tools.multimetric = script(
        root,
        "multimetric",
        &format!(
            "case \"$*\" in *Slow*) sleep 10 ;; esac\ncat '{}'\n",
            data.join("multimetric.json").display()
        ),
        &["{files}"],
        vec![0],
    );
    config.tools.multimetric.timeout_secs = Some(1);
    // Fails the run unless the manifest lists every file by absolute path.
    config.tools.pmd = script(
        root,
        "pmd",
        &format!(
            "grep -q '^/.*Main.java$' \"$2\" || exit 3\n\
             if grep -q Crash \"$2\"; then echo 'Exception in thread main'; exit 4; fi\n\
             cat '{}'\nexit 4\n",
            data.join("pmd.json").display()
        ),
        &["--file-list", "{manifest}"],
        vec![0, 4],
    );
    (tmp, config)
}

fn record(row: usize, username: &str) -> ParticipantRecord {
    ParticipantRecord {
        row,
        identity: format!("{}@school.edu", username),
        username: Some(username.to_string()),
        participant_id: row as u32 + 1,
        experiment_id: "CS46A_Fall21".to_string(),
        project_id: 2,
        project_name: "Hangman".to_string(),
        language: SourceLanguage::Java,
        passthrough: vec![String::new(), String::new()],
        submit_num: None,
        metrics: None,
    }
}

#[test]
fn test_java_cohort_with_tool_stand_ins() {
    let (_tmp, config) = fixture();
    let report = Batch::new(&config, &config.cohorts[0], Arc::new(AtomicBool::new(false)))
        .unwrap()
        .with_progress(false)
        .run(vec![record(0, "jdoe"), record(1, "asmith"), record(2, "bkim")])
        .unwrap();

    // asmith: malformed PMD output; bkim: multimetric timeout
    assert_eq!(report.count(DiagnosticKind::ToolFailure), 2);
    assert_eq!(report.rows.len(), 1);
    assert_eq!(report.dropped, 2);

    let metrics = report.rows[0].metrics.as_ref().unwrap();
    assert_eq!(metrics.values().len(), 26);
    assert_eq!(metrics.loc(), 9.0);
    assert_eq!(metrics.get("comment_ratio"), Some(11.11));
    assert_eq!(metrics.get("style_errors"), Some(2.0));
    assert_eq!(metrics.get("style_errors_per_loc"), Some(0.22));
    assert_eq!(metrics.get("cc_mean"), Some(3.0));
    assert_eq!(metrics.get("halstead_time_max"), Some(43.33));
    assert_eq!(metrics.get("cognitive_mean"), Some(17.0));
    assert_eq!(metrics.get("cognitive_min"), Some(16.0));
    assert_eq!(metrics.get("cognitive_max"), Some(18.0));
    assert_eq!(metrics.get("skipped"), Some(0.0));
}
