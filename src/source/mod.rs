//! Source loader: enumerate, read, and parse-validate a submission's files.

use std::fs;
use std::path::{Path, PathBuf};

use globset::{Glob, GlobSet, GlobSetBuilder};
use walkdir::WalkDir;

use crate::analysis::analyzer_for;
use crate::error::LoadError;
use crate::model::{SourceFile, SourceLanguage};

/// A candidate file that was found but not loaded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Outcome of loading one directory.
#[derive(Debug, Default)]
pub struct LoadedSources {
    /// Files that were read and parsed, in path order.
    pub files: Vec<SourceFile>,
    pub skipped: Vec<SkippedFile>,
}

impl LoadedSources {
    /// Number of candidate files found, loaded or not.
    pub fn found(&self) -> usize {
        self.files.len() + self.skipped.len()
    }

    /// Nothing with the right extension was found.
    pub fn is_empty_dir(&self) -> bool {
        self.found() == 0
    }

    /// Candidates were found but none parsed.
    pub fn all_skipped(&self) -> bool {
        self.files.is_empty() && !self.skipped.is_empty()
    }

    pub fn paths(&self) -> Vec<&Path> {
        self.files.iter().map(|f| f.path.as_path()).collect()
    }
}

/// Loads one language's source files from a directory tree.
pub struct SourceLoader {
    language: SourceLanguage,
    exclude: GlobSet,
}

impl SourceLoader {
    /// Build a loader; `exclude` globs are matched against file names.
    pub fn new(language: SourceLanguage, exclude: &[String]) -> Result<Self, LoadError> {
        let mut builder = GlobSetBuilder::new();
        for pattern in exclude {
            let glob = Glob::new(pattern).map_err(|source| LoadError::Pattern {
                pattern: pattern.clone(),
                source,
            })?;
            builder.add(glob);
        }
        let exclude = builder.build().map_err(|source| LoadError::Pattern {
            pattern: exclude.join(", "),
            source,
        })?;
        Ok(Self { language, exclude })
    }

    pub fn language(&self) -> SourceLanguage {
        self.language
    }

    /// Candidate files under `dir`, sorted.
    ///
    /// Hidden files and directories are never candidates. Entries the walk
    /// cannot read are dropped; see [`SourceLoader::load`] to have them counted.
    pub fn enumerate(&self, dir: &Path) -> Result<Vec<PathBuf>, LoadError> {
        self.walk(dir, &mut LoadedSources::default())
    }

    /// Only an unreadable `dir` itself is an error. Anything below it that
    /// cannot be walked is recorded in `loaded.skipped`.
    fn walk(&self, dir: &Path, loaded: &mut LoadedSources) -> Result<Vec<PathBuf>, LoadError> {
        let analyzer = analyzer_for(self.language);
        let mut files = Vec::new();

        for entry in WalkDir::new(dir)
            .follow_links(true)
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'))
        {
            let entry = match entry {
                Ok(entry) => entry,
                Err(source) if source.depth() == 0 => {
                    return Err(LoadError::Walk {
                        path: dir.to_path_buf(),
                        source,
                    });
                }
                Err(e) => {
                    match e.path() {
                        Some(path) => loaded.skip(path.to_path_buf(), e.to_string()),
                        None => tracing::debug!(dir = %dir.display(), "walk error: {}", e),
                    }
                    continue;
                }
            };
            if !entry.file_type().is_file() {
                continue;
            }
            let path = entry.path();
            let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("");
            if !analyzer.handles_extension(extension) {
                continue;
            }
            if self.exclude.is_match(entry.file_name()) {
                tracing::trace!(path = %path.display(), "excluded");
                continue;
            }
            files.push(path.to_path_buf());
        }

        files.sort();
        Ok(files)
    }

    /// Read and parse every candidate under `dir`.
    ///
    /// Unreadable, non-UTF-8, and syntactically invalid files are skipped,
    /// as are entries the directory walk fails on.
    pub fn load(&self, dir: &Path) -> Result<LoadedSources, LoadError> {
        let analyzer = analyzer_for(self.language);
        let mut loaded = LoadedSources::default();

        for path in self.walk(dir, &mut loaded)? {
            let text = match fs::read(&path) {
                Ok(bytes) => match String::from_utf8(bytes) {
                    Ok(text) => text,
                    Err(_) => {
                        loaded.skip(path, "not valid UTF-8");
                        continue;
                    }
                },
                Err(e) => {
                    loaded.skip(path, e.to_string());
                    continue;
                }
            };

            if let Err(e) = analyzer.parse_strict(&path, text.as_bytes()) {
                loaded.skip(path, e.to_string());
                continue;
            }

            loaded.files.push(SourceFile {
                path,
                text,
                language: self.language,
            });
        }

        Ok(loaded)
    }
}

impl LoadedSources {
    fn skip(&mut self, path: PathBuf, reason: impl Into<String>) {
        let reason = reason.into();
        tracing::debug!(path = %path.display(), reason = reason.as_str(), "skipping file");
        self.skipped.push(SkippedFile { path, reason });
    }
}
