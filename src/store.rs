use anyhow::{Context, Result};
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use crate::models::{AnalysisResult, JobDetail, LedgerEntry};

pub const LEDGER_FILE: &str = "analyzed_jobs.json";
pub const RESULTS_FILE: &str = "jobs.json";
pub const REPORT_FILE: &str = "jobs.md";
pub const NOTIFICATIONS_FILE: &str = "jobs_notifications.md";

/// Newest-first record of every id ever classified. Exactly-once is enforced
/// here by `filter_unseen`, not by the storage layer.
pub struct Ledger {
    entries: Vec<LedgerEntry>,
    seen: HashSet<String>,
}

impl Ledger {
    pub fn from_entries(entries: Vec<LedgerEntry>) -> Self {
        let seen = entries.iter().map(|e| e.id.clone()).collect();
        Self { entries, seen }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.seen.contains(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Drop details whose id already has a ledger entry, preserving relative
    /// order. Returns the survivors and how many were skipped.
    pub fn filter_unseen(&self, details: Vec<JobDetail>) -> (Vec<JobDetail>, usize) {
        let total = details.len();
        let unseen: Vec<JobDetail> = details
            .into_iter()
            .filter(|d| !self.contains(&d.list_metadata.id))
            .collect();
        let skipped = total - unseen.len();
        (unseen, skipped)
    }

    /// New entries first; the ledger is a newest-first append log.
    pub fn merge(self, new_entries: Vec<LedgerEntry>) -> Vec<LedgerEntry> {
        let mut merged = new_entries;
        merged.extend(self.entries);
        merged
    }
}

/// Sole writer of persisted state: the ledger, the qualified-results store,
/// and the two Markdown reports, all under one data directory.
pub struct DataStore {
    dir: PathBuf,
}

impl DataStore {
    pub fn open(dir: Option<PathBuf>) -> Result<Self> {
        let dir = match dir {
            Some(dir) => dir,
            None => Self::default_dir(),
        };
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create data directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    fn default_dir() -> PathBuf {
        if let Some(proj_dirs) = directories::ProjectDirs::from("", "", "duckhunt") {
            proj_dirs.data_dir().to_path_buf()
        } else {
            PathBuf::from(".data")
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Load the ledger. An absent or corrupt file is an empty ledger with a
    /// logged warning, never fatal.
    pub fn load_ledger(&self) -> Ledger {
        let entries: Vec<LedgerEntry> = self.load_collection(LEDGER_FILE);
        Ledger::from_entries(entries)
    }

    /// Load the qualified-results store with the same tolerance.
    pub fn load_qualified(&self) -> Vec<AnalysisResult> {
        self.load_collection(RESULTS_FILE)
    }

    fn load_collection<T: serde::de::DeserializeOwned>(&self, file: &str) -> Vec<T> {
        let path = self.dir.join(file);
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(_) => return Vec::new(),
        };
        match serde_json::from_str(&text) {
            Ok(items) => items,
            Err(e) => {
                eprintln!("Warning: could not parse {}: {}", path.display(), e);
                Vec::new()
            }
        }
    }

    pub fn save_ledger(&self, entries: &[LedgerEntry]) -> Result<()> {
        self.save_json(LEDGER_FILE, entries)
    }

    pub fn save_qualified(&self, results: &[AnalysisResult]) -> Result<()> {
        self.save_json(RESULTS_FILE, results)
    }

    fn save_json<T: serde::Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<()> {
        let text = serde_json::to_string_pretty(value)?;
        self.write_atomic(file, &text)
    }

    pub fn save_report(&self, markdown: &str) -> Result<()> {
        self.write_atomic(REPORT_FILE, markdown)
    }

    /// Prepend a new notification block before any existing notification
    /// content, separated by a horizontal rule. With no existing file the
    /// new block becomes the entire file.
    pub fn prepend_notification(&self, block: &str) -> Result<()> {
        let path = self.dir.join(NOTIFICATIONS_FILE);
        let existing = fs::read_to_string(&path).unwrap_or_default();
        let combined = if existing.is_empty() {
            block.to_string()
        } else {
            format!("{}\n---\n\n{}", block, existing)
        };
        self.write_atomic(NOTIFICATIONS_FILE, &combined)
    }

    /// Write to a sibling temp file, then rename into place, so a crash
    /// mid-write never leaves a truncated artifact.
    fn write_atomic(&self, file: &str, contents: &str) -> Result<()> {
        let path = self.dir.join(file);
        let tmp = self.dir.join(format!("{}.tmp", file));
        fs::write(&tmp, contents)
            .with_context(|| format!("Failed to write {}", tmp.display()))?;
        fs::rename(&tmp, &path)
            .with_context(|| format!("Failed to move {} into place", path.display()))?;
        Ok(())
    }
}
