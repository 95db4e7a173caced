//! Survey table input and result table output.

use std::collections::HashMap;
use std::fs;
use std::io::{Read, Write};
use std::path::Path;

use anyhow::Context;

use crate::config::CohortConfig;
use crate::locate::derive_username;
use crate::model::ParticipantRecord;
use crate::normalize::{MetricsVector, Schema};

/// Key columns written before the passthrough and metric columns.
pub const KEY_COLUMNS: &[&str] = &[
    "participant_id",
    "username",
    "experiment_id",
    "project_id",
    "project_name",
    "language",
];

pub const SUBMIT_NUM_COLUMN: &str = "submit_num";

/// Read the cohort's survey CSV, keeping only completed responses.
pub fn load_participants(path: &Path, cohort: &CohortConfig) -> anyhow::Result<Vec<ParticipantRecord>> {
    let file = fs::File::open(path).with_context(|| format!("opening survey {}", path.display()))?;
    read_participants(file, cohort).with_context(|| format!("reading survey {}", path.display()))
}

/// Parse survey rows from any reader.
pub fn read_participants<R: Read>(reader: R, cohort: &CohortConfig) -> anyhow::Result<Vec<ParticipantRecord>> {
    let mut reader = csv::ReaderBuilder::new().flexible(true).from_reader(reader);
    let headers = reader.headers()?.clone();
    let column = |name: &str| {
        headers
            .iter()
            .position(|h| h.trim() == name)
            .ok_or_else(|| anyhow::anyhow!("survey has no column {:?}", name))
    };

    let columns = &cohort.columns;
    let progress = column(&columns.progress)?;
    let identity = column(&columns.identity)?;
    let project_id = column(&columns.project_id)?;
    let project_name = column(&columns.project_name)?;
    let passthrough = cohort
        .passthrough
        .iter()
        .map(|p| column(&p.from))
        .collect::<anyhow::Result<Vec<_>>>()?;

    let mut records = Vec::new();
    for (row, result) in reader.records().enumerate() {
        let record = result?;
        let field = |idx: usize| record.get(idx).unwrap_or("").trim();

        if field(progress) != columns.complete_value {
            continue;
        }

        let Some(id) = parse_project_id(field(project_id)) else {
            tracing::warn!(
                row,
                value = field(project_id),
                "skipping survey row with a non-integer project id"
            );
            continue;
        };

        let raw_identity = field(identity).to_string();
        records.push(ParticipantRecord {
            row,
            username: derive_username(&raw_identity, cohort.identity),
            identity: raw_identity,
            participant_id: 0,
            experiment_id: cohort.name.clone(),
            project_id: id,
            project_name: field(project_name).to_string(),
            language: cohort.language,
            passthrough: passthrough.iter().map(|&i| field(i).to_string()).collect(),
            submit_num: None,
            metrics: None,
        });
    }

    assign_participant_ids(&mut records);
    Ok(records)
}

/// Accepts `3` and `3.0`.
fn parse_project_id(value: &str) -> Option<i64> {
    if let Ok(id) = value.parse::<i64>() {
        return Some(id);
    }
    let float = value.parse::<f64>().ok()?;
    (float.is_finite() && float.fract() == 0.0).then_some(float as i64)
}

/// Number participants 1.. in first-appearance order of their username.
///
/// Returns the number of distinct participants.
pub fn assign_participant_ids(records: &mut [ParticipantRecord]) -> usize {
    let mut ids: HashMap<String, u32> = HashMap::new();
    for record in records.iter_mut() {
        let key = record
            .username
            .clone()
            .unwrap_or_else(|| record.identity.to_lowercase());
        let next = ids.len() as u32 + 1;
        record.participant_id = *ids.entry(key).or_insert(next);
    }
    ids.len()
}

/// Header row for a cohort's result table.
pub fn result_header(cohort: &CohortConfig) -> Vec<String> {
    let mut header: Vec<String> = KEY_COLUMNS.iter().map(|s| s.to_string()).collect();
    if cohort.tracks_submissions() {
        header.push(SUBMIT_NUM_COLUMN.to_string());
    }
    header.extend(cohort.passthrough.iter().map(|p| p.to.clone()));
    header.extend(Schema::for_language(cohort.language).names().map(str::to_string));
    header
}

/// Write result rows to `path`, replacing it only once every row is written.
pub fn write_results(path: &Path, cohort: &CohortConfig, rows: &[ParticipantRecord]) -> anyhow::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    fs::create_dir_all(dir).with_context(|| format!("creating {}", dir.display()))?;

    let mut staged = tempfile::NamedTempFile::new_in(dir)?;
    write_results_to(&mut staged, cohort, rows)?;
    staged.flush()?;
    staged
        .persist(path)
        .with_context(|| format!("writing results to {}", path.display()))?;
    Ok(())
}

/// Write result rows, sorted by (username, project id, project name).
pub fn write_results_to<W: Write>(writer: W, cohort: &CohortConfig, rows: &[ParticipantRecord]) -> anyhow::Result<()> {
    let header = result_header(cohort);
    let mut csv = csv::Writer::from_writer(writer);
    csv.write_record(&header)?;

    let mut sorted: Vec<&ParticipantRecord> = rows.iter().collect();
    sorted.sort_by_key(|r| r.key());

    for record in sorted {
        let row = result_row(cohort, record);
        if row.len() != header.len() {
            anyhow::bail!(
                "row for {} has {} fields but the header has {}",
                record.label(),
                row.len(),
                header.len()
            );
        }
        csv.write_record(&row)?;
    }
    csv.flush()?;
    Ok(())
}

fn result_row(cohort: &CohortConfig, record: &ParticipantRecord) -> Vec<String> {
    let mut row = vec![
        record.participant_id.to_string(),
        record.username.clone().unwrap_or_default(),
        record.experiment_id.clone(),
        record.project_id.to_string(),
        record.project_name.clone(),
        record.language.to_string(),
    ];
    if cohort.tracks_submissions() {
        row.push(record.submit_num.map(|n| n.to_string()).unwrap_or_default());
    }
    row.extend(record.passthrough.iter().cloned());

    let zeroed;
    let metrics = match &record.metrics {
        Some(m) => m,
        None => {
            zeroed = MetricsVector::zeroed(record.language);
            &zeroed
        }
    };
    row.extend(metrics.values().iter().map(|v| v.to_string()));
    row
}
