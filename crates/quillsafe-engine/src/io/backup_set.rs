use std::fs;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

use chrono::NaiveDateTime;
use regex::Regex;

use crate::backup::BackupError;
use crate::codec::{self, PortableDocument};

/// `strftime` layout of the minute-resolution stamp in snapshot names
pub const TIMESTAMP_FORMAT: &str = "%Y%m%d%H%M";

/// `<prefix>_<12 digits>` with an optional extension
fn snapshot_name_regex() -> &'static Regex {
    static SNAPSHOT_NAME: OnceLock<Regex> = OnceLock::new();
    SNAPSHOT_NAME.get_or_init(|| {
        Regex::new(r"^(.+)_(\d{12})(\.[^.]+)?$").expect("Invalid snapshot name regex")
    })
}

/// On-disk snapshot families: `root/{name}/{name}_{YYYYMMDDHHMM}.{ext}`
#[derive(Debug, Clone)]
pub struct BackupSet {
    root: PathBuf,
    extension: String,
}

#[derive(Debug)]
pub struct RenameFailure {
    pub path: PathBuf,
    pub source: std::io::Error,
}

/// What a rename-sync did; failures never stop the walk
#[derive(Debug, Default)]
#[must_use]
pub struct RenameReport {
    pub renamed: usize,
    /// Entries that do not look like snapshots and were left alone
    pub skipped: usize,
    pub failures: Vec<RenameFailure>,
}

impl RenameReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }

    fn fail(&mut self, path: &Path, source: std::io::Error) {
        log::warn!("Backup rename failed for {}: {source}", path.display());
        self.failures.push(RenameFailure {
            path: path.to_path_buf(),
            source,
        });
    }
}

impl BackupSet {
    pub fn new<P: Into<PathBuf>>(root: P, extension: &str) -> Self {
        Self {
            root: root.into(),
            extension: extension.trim_start_matches('.').to_string(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn extension(&self) -> &str {
        &self.extension
    }

    pub fn dir_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    pub fn snapshot_path(&self, name: &str, at: NaiveDateTime) -> PathBuf {
        self.dir_for(name).join(format!(
            "{name}_{}.{}",
            at.format(TIMESTAMP_FORMAT),
            self.extension
        ))
    }

    /// Write `document` as the snapshot for minute `at`, replacing any
    /// snapshot already written in that minute.
    pub fn write_snapshot(
        &self,
        name: &str,
        document: &PortableDocument,
        at: NaiveDateTime,
    ) -> Result<PathBuf, BackupError> {
        if name.trim().is_empty() {
            return Err(BackupError::EmptyName);
        }
        let dir = self.dir_for(name);
        fs::create_dir_all(&dir).map_err(|source| BackupError::CreateDir {
            path: dir.clone(),
            source,
        })?;
        let path = self.snapshot_path(name, at);
        codec::write(&path, document)?;
        Ok(path)
    }

    /// Snapshot files for `name`, oldest first
    pub fn snapshots(&self, name: &str) -> Vec<PathBuf> {
        let Ok(entries) = fs::read_dir(self.dir_for(name)) else {
            return Vec::new();
        };
        let mut paths: Vec<(String, PathBuf)> = entries
            .flatten()
            .filter_map(|entry| {
                let file_name = entry.file_name().to_str()?.to_string();
                let stamp = snapshot_name_regex()
                    .captures(&file_name)?
                    .get(2)?
                    .as_str()
                    .to_string();
                Some((stamp, entry.path()))
            })
            .collect();
        paths.sort();
        paths.into_iter().map(|(_, path)| path).collect()
    }

    /// Move the backup set `old` to `new`.
    ///
    /// Every `<anything>_<12 digits>[.ext]` file gets the prefix `new` with its
    /// stamp and extension kept. Other entries stay where they are. A file is
    /// never renamed over an existing one. If `new` already has a directory,
    /// snapshots are moved into it and the old directory keeps the rest.
    pub fn rename_sync(&self, old: &str, new: &str) -> RenameReport {
        let mut report = RenameReport::default();
        let old_dir = self.dir_for(old);
        let new_dir = self.dir_for(new);
        if old == new || new.trim().is_empty() || !old_dir.is_dir() {
            return report;
        }

        let entries = match fs::read_dir(&old_dir) {
            Ok(entries) => entries,
            Err(e) => {
                report.fail(&old_dir, e);
                return report;
            }
        };
        let merge = new_dir.exists();
        let target_dir = if merge { &new_dir } else { &old_dir };

        for entry in entries {
            let entry = match entry {
                Ok(entry) => entry,
                Err(e) => {
                    report.fail(&old_dir, e);
                    continue;
                }
            };
            let source = entry.path();
            let captures = entry
                .file_name()
                .to_str()
                .filter(|_| source.is_file())
                .and_then(|file_name| snapshot_name_regex().captures(file_name))
                .map(|caps| {
                    let ext = caps.get(3).map_or("", |m| m.as_str());
                    format!("{new}_{}{ext}", &caps[2])
                });
            let Some(target_name) = captures else {
                report.skipped += 1;
                continue;
            };

            let target = target_dir.join(target_name);
            if target == source {
                continue;
            }
            if target.exists() {
                report.fail(
                    &source,
                    std::io::Error::new(
                        std::io::ErrorKind::AlreadyExists,
                        format!("{} already exists", target.display()),
                    ),
                );
                continue;
            }
            match fs::rename(&source, &target) {
                Ok(()) => report.renamed += 1,
                Err(e) => report.fail(&source, e),
            }
        }

        if !merge && let Err(e) = fs::rename(&old_dir, &new_dir) {
            report.fail(&old_dir, e);
        }

        log::info!(
            "Synced backups {old:?} -> {new:?}: {} renamed, {} skipped, {} failed",
            report.renamed,
            report.skipped,
            report.failures.len()
        );
        report
    }
}
