//! Source locator: participant identity → source-tree directory.
//!
//! Resolution is read-only. Directory listings used for fuzzy name
//! matching are cached per directory for the lifetime of the locator.

pub mod identity;
pub mod submission;

use std::collections::{BTreeMap, HashMap};
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use crate::config::{CohortConfig, Config, IdentityScheme, LayoutConfig, SubmissionPolicy};
use crate::error::LocateError;
use crate::model::{ParticipantRecord, SourceTree};

pub use identity::{derive_username, name_key, NameKey};
pub use submission::{count_submissions, select_submission};

const USERNAME: &str = "{username}";

/// Resolved layout with paths made absolute.
#[derive(Debug, Clone)]
enum Layout {
    Direct {
        template: String,
    },
    SubmitHistory {
        students_template: String,
        student_index: Option<PathBuf>,
        submission: SubmissionPolicy,
    },
}

/// Resolves participants of one cohort to their source directories.
pub struct Locator {
    source_root: PathBuf,
    identity: IdentityScheme,
    disambiguation: BTreeMap<String, String>,
    layout: Layout,
    index_cache: RwLock<HashMap<PathBuf, Arc<Vec<String>>>>,
}

impl Locator {
    pub fn new(config: &Config, cohort: &CohortConfig) -> Self {
        let layout = match &cohort.layout {
            LayoutConfig::Direct { template } => Layout::Direct {
                template: template.clone(),
            },
            LayoutConfig::SubmitHistory {
                students_template,
                student_index,
                submission,
            } => Layout::SubmitHistory {
                students_template: students_template.clone(),
                student_index: student_index.as_deref().map(|p| config.resolve(p)),
                submission: *submission,
            },
        };

        let disambiguation = cohort
            .disambiguation
            .iter()
            .filter_map(|(name, dir)| name_key(name).map(|k| (k.full, dir.clone())))
            .collect();

        Self {
            source_root: config.resolve(&cohort.source_root),
            identity: cohort.identity,
            disambiguation,
            layout,
            index_cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolve a participant record.
    pub fn locate(&self, record: &ParticipantRecord) -> Result<SourceTree, LocateError> {
        self.locate_identity(&record.identity, record.project_id, &record.project_name)
    }

    /// Resolve a raw identity field for one project.
    pub fn locate_identity(
        &self,
        identity: &str,
        project_id: i64,
        project_name: &str,
    ) -> Result<SourceTree, LocateError> {
        let username = derive_username(identity, self.identity).ok_or_else(|| {
            LocateError::NotFound {
                identity: identity.to_string(),
                reason: "identity field is blank".to_string(),
            }
        })?;
        let vars = TemplateVars {
            project_id,
            project_name,
        };

        let tree = match &self.layout {
            Layout::Direct { template } => {
                let dir = match template.split_once(USERNAME) {
                    Some((prefix, suffix)) => {
                        let parent = self.source_root.join(vars.expand(prefix));
                        let student = self.resolve_student(identity, &username, &parent)?;
                        join_relative(parent.join(student), &vars.expand(suffix))
                    }
                    None => self.source_root.join(vars.expand(template)),
                };
                SourceTree::new(dir)
            }
            Layout::SubmitHistory {
                students_template,
                student_index,
                submission,
            } => {
                let students_dir = self.source_root.join(vars.expand(students_template));
                let index_dir = student_index.as_deref().unwrap_or(&students_dir);
                let student = self.resolve_student(identity, &username, index_dir)?;
                let student_dir = students_dir.join(&student);
                if !student_dir.is_dir() {
                    return Err(not_found(
                        identity,
                        format!("{} does not exist", student_dir.display()),
                    ));
                }
                let chosen = select_submission(&student_dir, *submission)?;
                let mut tree = SourceTree::new(student_dir.join(&chosen.label));
                tree.submission = Some(chosen);
                tree
            }
        };

        if !tree.dir.is_dir() {
            return Err(not_found(
                identity,
                format!("{} does not exist", tree.dir.display()),
            ));
        }

        tracing::debug!(identity, dir = %tree.dir.display(), "located source tree");
        Ok(tree)
    }

    /// Map a username to a directory name under `index_dir`.
    ///
    /// Email and username schemes use the name as-is. Full names try the
    /// exact initial+last key first, then any directory containing the
    /// last name.
    fn resolve_student(
        &self,
        identity: &str,
        username: &str,
        index_dir: &Path,
    ) -> Result<String, LocateError> {
        if self.identity != IdentityScheme::FullName {
            return Ok(username.to_string());
        }
        let key = name_key(identity).ok_or_else(|| not_found(identity, "name is blank"))?;

        let students = self.index(index_dir, identity)?;
        if students.iter().any(|s| s == &key.key) {
            return Ok(key.key);
        }

        let candidates: Vec<String> = students
            .iter()
            .filter(|s| s.contains(&key.last))
            .cloned()
            .collect();

        match candidates.len() {
            0 => Err(not_found(
                identity,
                format!("no directory under {} matches {:?}", index_dir.display(), key.last),
            )),
            1 => Ok(candidates[0].clone()),
            _ => match self.disambiguation.get(&key.full) {
                Some(dir) => {
                    tracing::debug!(identity, dir = dir.as_str(), "resolved ambiguous name from table");
                    Ok(dir.clone())
                }
                None => Err(LocateError::Ambiguous {
                    identity: identity.to_string(),
                    candidates,
                }),
            },
        }
    }

    /// Sorted, non-hidden subdirectory names of `dir`.
    fn index(&self, dir: &Path, identity: &str) -> Result<Arc<Vec<String>>, LocateError> {
        if let Ok(cache) = self.index_cache.read() {
            if let Some(listing) = cache.get(dir) {
                return Ok(Arc::clone(listing));
            }
        }

        let listing = Arc::new(match list_dirs(dir) {
            Ok(names) => names,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(not_found(
                    identity,
                    format!("student index {} does not exist", dir.display()),
                ))
            }
            Err(source) => {
                return Err(LocateError::Io {
                    path: dir.to_path_buf(),
                    source,
                })
            }
        });

        if let Ok(mut cache) = self.index_cache.write() {
            cache.insert(dir.to_path_buf(), Arc::clone(&listing));
        }
        Ok(listing)
    }
}

struct TemplateVars<'a> {
    project_id: i64,
    project_name: &'a str,
}

impl TemplateVars<'_> {
    /// Project names are folded to lower case with whitespace removed.
    fn expand(&self, template: &str) -> String {
        let folded: String = self
            .project_name
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect::<String>()
            .to_lowercase();
        template
            .replace("{project_id}", &self.project_id.to_string())
            .replace("{project_name}", &folded)
    }
}

fn join_relative(base: PathBuf, rest: &str) -> PathBuf {
    let rest = rest.trim_start_matches('/');
    if rest.is_empty() {
        base
    } else {
        base.join(rest)
    }
}

fn list_dirs(dir: &Path) -> io::Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        if !entry.file_type()?.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.starts_with('.') {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

fn not_found(identity: &str, reason: impl Into<String>) -> LocateError {
    LocateError::NotFound {
        identity: identity.to_string(),
        reason: reason.into(),
    }
}
