//! One open document and everything that follows it around: identity,
//! display name, save path, the pending typing style, the save baseline and
//! the backup scheduler.
//!
//! The shell drives a session synchronously. Every failure comes back as a
//! [`SessionError`] or a [`TickOutcome`]; nothing here panics or retries.

use std::ops::Range;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;
use quillsafe_config::Config;

use crate::backup::{BackupScheduler, SnapshotSource, TickOutcome};
use crate::codec::{self, CodecError};
use crate::editing::{Alignment, Attributes, Fingerprint, Flag, StyleRunBuffer, StyleUpdate};
use crate::io::{IdentityRegistry, RegistryError, RenameReport};
use crate::models::DocumentId;

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Codec(#[from] CodecError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SaveStatus {
    Saved(PathBuf),
    /// No current path; the shell must ask for one and call `save_as`
    NeedsPath,
    /// Nothing worth saving
    Nothing,
}

#[derive(Debug)]
pub struct EditorSession {
    buffer: StyleRunBuffer,
    /// Style for the next typed text, armed by styling an empty selection
    pending: Option<Attributes>,
    identity: DocumentId,
    name: String,
    path: Option<PathBuf>,
    last_saved: Option<Fingerprint>,
    registry: IdentityRegistry,
    scheduler: BackupScheduler,
}

impl EditorSession {
    pub fn new(config: &Config) -> Self {
        Self::with_parts(
            IdentityRegistry::open(config.index_path()),
            BackupScheduler::from_config(config),
        )
    }

    pub fn with_parts(registry: IdentityRegistry, scheduler: BackupScheduler) -> Self {
        let identity = DocumentId::mint();
        Self {
            buffer: StyleRunBuffer::new(),
            pending: None,
            name: identity.to_string(),
            identity,
            path: None,
            last_saved: None,
            registry,
            scheduler,
        }
    }

    pub fn buffer(&self) -> &StyleRunBuffer {
        &self.buffer
    }

    pub fn identity(&self) -> &DocumentId {
        &self.identity
    }

    /// Display name; also the name of the active backup set
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn registry(&self) -> &IdentityRegistry {
        &self.registry
    }

    pub fn scheduler(&self) -> &BackupScheduler {
        &self.scheduler
    }

    pub fn pending_style(&self) -> Option<Attributes> {
        self.pending
    }

    /// Insert `text`, consuming the pending style if one is armed.
    pub fn type_text(&mut self, at: usize, text: &str) {
        match self.pending.take() {
            Some(attrs) => self.buffer.insert_styled(at, text, attrs),
            None => self.buffer.insert_text(at, text),
        }
    }

    /// Restyle a selection, or arm the pending style when it is empty.
    pub fn apply_style(&mut self, selection: Range<usize>, update: StyleUpdate) {
        if selection.is_empty() {
            let base = self
                .pending
                .unwrap_or_else(|| self.buffer.attributes_at(selection.start));
            self.pending = Some(update.apply(base));
        } else {
            self.buffer.set_attributes(selection, update);
        }
    }

    pub fn toggle(&mut self, selection: Range<usize>, flag: Flag) {
        self.apply_style(selection, StyleUpdate::Toggle(flag));
    }

    pub fn set_alignment(&mut self, selection: Range<usize>, alignment: Alignment) {
        self.buffer.set_paragraph_alignment(selection, alignment);
    }

    pub fn delete(&mut self, range: Range<usize>) {
        self.buffer.delete(range);
    }

    /// Style shown by toolbar indicators at `position`
    pub fn style_at(&self, position: usize) -> Attributes {
        self.pending
            .unwrap_or_else(|| self.buffer.attributes_at(position))
    }

    pub fn is_dirty(&self) -> bool {
        match &self.last_saved {
            Some(baseline) => !baseline.equals(&Fingerprint::snapshot(&self.buffer)),
            None => !self.buffer.is_blank(),
        }
    }

    /// Start a fresh document.
    ///
    /// Content with a path is saved first. Content without one returns
    /// `NeedsPath` and leaves the session as it was.
    pub fn new_document(&mut self) -> Result<SaveStatus, SessionError> {
        let status = if self.buffer.is_blank() {
            SaveStatus::Nothing
        } else {
            match self.save()? {
                SaveStatus::NeedsPath => return Ok(SaveStatus::NeedsPath),
                status => status,
            }
        };

        self.identity = DocumentId::mint();
        self.name = self.identity.to_string();
        self.path = None;
        self.buffer.clear();
        self.pending = None;
        self.last_saved = None;
        self.scheduler.reset_baseline();
        log::info!("New document {}", self.identity);
        Ok(status)
    }

    /// Replace the session with the document at `path`.
    ///
    /// A corrupt or unreadable file leaves the session untouched. If the
    /// identity was last registered under another name, its backup set is
    /// renamed to follow the file and the report of that walk is returned.
    pub fn load(&mut self, path: &Path) -> Result<Option<RenameReport>, SessionError> {
        let decoded = codec::decode(path)?;
        let identity = decoded.identity.unwrap_or_else(|| {
            log::debug!("{} has no identity, minting one", path.display());
            DocumentId::mint()
        });
        let name = display_name(path, &identity);

        let rename = self
            .registry
            .lookup(&identity)
            .filter(|previous| *previous != name)
            .map(|previous| self.scheduler.rename_sync(&previous, &name));

        self.buffer = decoded.buffer;
        self.pending = None;
        self.identity = identity;
        self.name = name;
        self.path = Some(path.to_path_buf());
        self.scheduler.set_interval(decoded.backup_interval);
        self.scheduler.reset_baseline();
        self.last_saved = Some(Fingerprint::snapshot(&self.buffer));
        log::info!("Loaded {} as {}", path.display(), self.identity);

        self.registry.register(&self.identity, &self.name)?;
        Ok(rename)
    }

    /// Write to the current path, keeping the identity.
    pub fn save(&mut self) -> Result<SaveStatus, SessionError> {
        let Some(path) = self.path.clone() else {
            return Ok(SaveStatus::NeedsPath);
        };
        self.write(&path)?;
        Ok(SaveStatus::Saved(path))
    }

    /// Write to `path` as a new logical document with a fresh identity.
    ///
    /// The file is written before anything else changes, so a failed write
    /// leaves the session and its backups as they were. When the display
    /// name changes the backup set follows it and the report is returned.
    pub fn save_as(&mut self, path: &Path) -> Result<Option<RenameReport>, SessionError> {
        let identity = DocumentId::mint();
        let name = display_name(path, &identity);
        codec::save(
            path,
            &self.buffer,
            &identity,
            self.scheduler.interval_minutes(),
        )?;

        let rename = (name != self.name).then(|| self.scheduler.rename_sync(&self.name, &name));
        self.path = Some(path.to_path_buf());
        self.name = name;
        self.identity = identity;
        self.scheduler.reset_baseline();
        self.commit_save(path)?;
        Ok(rename)
    }

    /// Save on the way out; a blank buffer is not worth a file.
    pub fn close(&mut self) -> Result<SaveStatus, SessionError> {
        if self.buffer.is_blank() {
            return Ok(SaveStatus::Nothing);
        }
        self.save()
    }

    pub fn tick(&mut self) -> TickOutcome {
        self.tick_at(chrono::Local::now().naive_local())
    }

    pub fn tick_at(&mut self, now: NaiveDateTime) -> TickOutcome {
        let source = SnapshotSource {
            buffer: &self.buffer,
            identity: &self.identity,
            name: &self.name,
        };
        self.scheduler.tick_at(source, now)
    }

    /// Take a snapshot immediately and restart the countdown
    pub fn backup_now(&mut self, now: NaiveDateTime) -> TickOutcome {
        let source = SnapshotSource {
            buffer: &self.buffer,
            identity: &self.identity,
            name: &self.name,
        };
        self.scheduler.fire(source, now)
    }

    /// Returns the interval in effect after parsing `text`
    pub fn set_backup_interval_text(&mut self, text: &str) -> u32 {
        self.scheduler.set_interval_text(text)
    }

    pub fn backup_interval(&self) -> u32 {
        self.scheduler.interval_minutes()
    }

    pub fn set_periodic(&mut self, enabled: bool) {
        self.scheduler.set_enabled(enabled);
    }

    fn write(&mut self, path: &Path) -> Result<(), SessionError> {
        codec::save(
            path,
            &self.buffer,
            &self.identity,
            self.scheduler.interval_minutes(),
        )?;
        self.commit_save(path)
    }

    /// Record a completed write: the save baseline moves even if the
    /// registry cannot be updated.
    fn commit_save(&mut self, path: &Path) -> Result<(), SessionError> {
        self.last_saved = Some(Fingerprint::snapshot(&self.buffer));
        log::info!("Saved {} ({})", path.display(), self.identity);
        self.registry.register(&self.identity, &self.name)?;
        Ok(())
    }
}

fn display_name(path: &Path, identity: &DocumentId) -> String {
    path.file_stem()
        .map(|stem| stem.to_string_lossy().into_owned())
        .filter(|stem| !stem.trim().is_empty())
        .unwrap_or_else(|| identity.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editing::DEFAULT_SIZE;
    use crate::tests::{create_test_dir, minute, test_config};
    use pretty_assertions::assert_eq;

    #[test]
    fn new_session_is_named_after_its_identity() {
        let dir = create_test_dir();
        let session = EditorSession::new(&test_config(&dir));

        assert_eq!(session.name(), session.identity().as_str());
        assert_eq!(session.path(), None);
        assert!(!session.is_dirty());
    }

    #[test]
    fn empty_selection_arms_pending_style_for_next_text() {
        let dir = create_test_dir();
        let mut session = EditorSession::new(&test_config(&dir));
        session.type_text(0, "plain ");

        session.toggle(6..6, Flag::Bold);
        session.apply_style(6..6, StyleUpdate::Size(18));

        assert!(session.style_at(6).bold);
        assert_eq!(session.buffer().text(), "plain ");
        session.type_text(6, "loud");
        session.type_text(10, "!");

        let buffer = session.buffer();
        assert!(!buffer.attributes_at(0).bold);
        assert!(buffer.attributes_at(6).bold);
        assert_eq!(buffer.attributes_at(6).size, 18);
        assert!(buffer.attributes_at(10).bold);
        assert_eq!(session.pending_style(), None);
    }

    #[test]
    fn non_empty_selection_restyles_buffer() {
        let dir = create_test_dir();
        let mut session = EditorSession::new(&test_config(&dir));
        session.type_text(0, "hello world");

        session.toggle(0..5, Flag::Italic);

        assert!(session.style_at(0).italic);
        assert!(!session.style_at(6).italic);
        assert_eq!(session.pending_style(), None);
        assert_eq!(session.style_at(6).size, DEFAULT_SIZE);
    }

    #[test]
    fn save_without_path_needs_one() {
        let dir = create_test_dir();
        let mut session = EditorSession::new(&test_config(&dir));
        session.type_text(0, "draft");

        assert_eq!(session.save().unwrap(), SaveStatus::NeedsPath);
        assert!(session.is_dirty());
    }

    #[test]
    fn dirty_tracking_follows_save_baseline() {
        let dir = create_test_dir();
        let mut session = EditorSession::new(&test_config(&dir));
        let path = dir.path().join("Notes.qdoc");
        session.type_text(0, "draft");
        session.save_as(&path).unwrap();
        assert!(!session.is_dirty());

        session.toggle(0..5, Flag::Bold);
        assert!(session.is_dirty());

        session.toggle(0..5, Flag::Bold);
        assert!(!session.is_dirty());
    }

    #[test]
    fn save_as_mints_identity_and_adopts_name() {
        let dir = create_test_dir();
        let mut session = EditorSession::new(&test_config(&dir));
        let first = session.identity().clone();
        session.type_text(0, "text");

        let rename = session.save_as(&dir.path().join("Report.qdoc")).unwrap();

        assert!(rename.unwrap().is_clean());
        assert_eq!(session.path(), Some(dir.path().join("Report.qdoc").as_path()));
        assert_ne!(session.identity(), &first);
        assert_eq!(session.name(), "Report");
        assert_eq!(
            session.registry().lookup(session.identity()),
            Some("Report".to_string())
        );
    }

    #[test]
    fn save_as_reports_snapshots_it_could_not_move() {
        let dir = create_test_dir();
        let config = test_config(&dir);
        let mut session = EditorSession::new(&config);
        session.type_text(0, "draft");
        session.save_as(&dir.path().join("Draft.qdoc")).unwrap();
        let noon = minute(2024, 1, 1, 12, 0);
        assert!(matches!(session.backup_now(noon), TickOutcome::Written(_)));
        let taken = config.backups_dir().join("Final").join("Final_202401011200.qdoc");
        std::fs::create_dir_all(taken.parent().unwrap()).unwrap();
        std::fs::write(&taken, "older").unwrap();

        let report = session
            .save_as(&dir.path().join("Final.qdoc"))
            .unwrap()
            .unwrap();

        assert_eq!(report.renamed, 0);
        assert_eq!(report.failures.len(), 1);
        assert_eq!(
            report.failures[0].path,
            config.backups_dir().join("Draft").join("Draft_202401011200.qdoc")
        );
        assert_eq!(std::fs::read_to_string(&taken).unwrap(), "older");
        assert_eq!(session.name(), "Final");
    }

    #[test]
    fn failed_save_as_leaves_session_and_backups_alone() {
        let dir = create_test_dir();
        let config = test_config(&dir);
        let mut session = EditorSession::new(&config);
        session.type_text(0, "draft");
        let draft = dir.path().join("Draft.qdoc");
        session.save_as(&draft).unwrap();
        let noon = minute(2024, 1, 1, 12, 0);
        assert!(matches!(session.backup_now(noon), TickOutcome::Written(_)));
        let identity = session.identity().clone();

        let result = session.save_as(&dir.path().join("missing").join("Final.qdoc"));

        assert!(matches!(
            result,
            Err(SessionError::Codec(CodecError::StorageWrite { .. }))
        ));
        assert_eq!(session.name(), "Draft");
        assert_eq!(session.identity(), &identity);
        assert_eq!(session.path(), Some(draft.as_path()));
        assert!(!session.is_dirty());
        assert_eq!(session.scheduler().store().snapshots("Draft").len(), 1);
        assert!(!config.backups_dir().join("Final").exists());
        assert_eq!(
            session.registry().entries().into_values().collect::<Vec<_>>(),
            vec!["Draft".to_string()]
        );
    }

    #[test]
    fn corrupt_load_leaves_session_unchanged() {
        let dir = create_test_dir();
        let mut session = EditorSession::new(&test_config(&dir));
        session.type_text(0, "keep me");
        let identity = session.identity().clone();
        let path = dir.path().join("broken.qdoc");
        std::fs::write(&path, "{\"paragraphs\": [").unwrap();

        let result = session.load(&path);

        assert!(matches!(
            result,
            Err(SessionError::Codec(CodecError::CorruptDocument { .. }))
        ));
        assert_eq!(session.buffer().text(), "keep me");
        assert_eq!(session.identity(), &identity);
        assert_eq!(session.path(), None);
    }

    #[test]
    fn new_document_saves_then_resets() {
        let dir = create_test_dir();
        let mut session = EditorSession::new(&test_config(&dir));
        let path = dir.path().join("Journal.qdoc");
        session.type_text(0, "day one");
        session.save_as(&path).unwrap();
        session.type_text(7, ", more");
        let old = session.identity().clone();

        let status = session.new_document().unwrap();

        assert_eq!(status, SaveStatus::Saved(path.clone()));
        assert_eq!(codec::decode(&path).unwrap().buffer.text(), "day one, more");
        assert_ne!(session.identity(), &old);
        assert_eq!(session.name(), session.identity().as_str());
        assert!(session.buffer().is_empty());
        assert_eq!(session.path(), None);
        assert!(!session.is_dirty());
    }

    #[test]
    fn new_document_with_unsaved_content_asks_for_path() {
        let dir = create_test_dir();
        let mut session = EditorSession::new(&test_config(&dir));
        session.type_text(0, "unsaved");
        let identity = session.identity().clone();

        assert_eq!(session.new_document().unwrap(), SaveStatus::NeedsPath);
        assert_eq!(session.identity(), &identity);
        assert_eq!(session.buffer().text(), "unsaved");
    }

    #[test]
    fn close_skips_blank_buffers() {
        let dir = create_test_dir();
        let mut session = EditorSession::new(&test_config(&dir));
        session.type_text(0, " \n ");

        assert_eq!(session.close().unwrap(), SaveStatus::Nothing);
    }

    #[test]
    fn interval_text_is_validated() {
        let dir = create_test_dir();
        let mut session = EditorSession::new(&test_config(&dir));

        assert_eq!(session.set_backup_interval_text("15"), 15);
        assert_eq!(session.backup_interval(), 15);
        assert_eq!(session.set_backup_interval_text("soon"), 2);
        assert_eq!(session.scheduler().remaining(), 120);
    }
}
