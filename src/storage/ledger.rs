use std::{
    collections::HashSet,
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::Mutex,
};

use anyhow::{Context, Result};
use chrono::Utc;

use super::traits::Ledger;
use crate::git::ObjectId;

/// File-backed ledger.
///
/// The file is append-only, one `<hex-id>\t<recorded-at>` line per object.
/// Every id is loaded into memory on open; `record` appends, flushes and
/// syncs before returning, so an entry survives a crash right after.
pub struct FileLedger {
    path: PathBuf,
    inner: Mutex<FileLedgerInner>,
}

struct FileLedgerInner {
    entries: HashSet<ObjectId>,
    file: File,
}

impl FileLedger {
    /// Open the ledger at `path`, creating it (and its directory) if needed
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create ledger directory {:?}", parent))?;
        }

        let entries = if path.exists() {
            let content = Self::read_complete_lines(&path)?;
            Self::parse(&content).with_context(|| format!("Failed to parse ledger {:?}", path))?
        } else {
            HashSet::new()
        };

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .with_context(|| format!("Failed to open ledger {:?} for append", path))?;

        tracing::debug!("Loaded {} ledger entries from {:?}", entries.len(), path);

        Ok(Self {
            path,
            inner: Mutex::new(FileLedgerInner { entries, file }),
        })
    }

    /// Read the ledger, cutting off a last line that a crash left without
    /// its newline so the next append starts on a fresh line.
    fn read_complete_lines(path: &Path) -> Result<String> {
        let mut content =
            fs::read(path).with_context(|| format!("Failed to read ledger from {:?}", path))?;

        let complete = content
            .iter()
            .rposition(|&b| b == b'\n')
            .map_or(0, |pos| pos + 1);
        if complete < content.len() {
            tracing::warn!(
                "Dropping incomplete last ledger line in {:?}: {:?}",
                path,
                String::from_utf8_lossy(&content[complete..])
            );
            OpenOptions::new()
                .write(true)
                .open(path)
                .and_then(|file| file.set_len(complete as u64))
                .with_context(|| format!("Failed to truncate ledger {:?}", path))?;
            content.truncate(complete);
        }

        String::from_utf8(content).with_context(|| format!("Ledger {:?} is not UTF-8", path))
    }

    fn parse(content: &str) -> Result<HashSet<ObjectId>> {
        let mut entries = HashSet::new();
        for (lineno, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            let hex = line.split('\t').next().unwrap_or(line);
            let id: ObjectId = hex
                .parse()
                .with_context(|| format!("Invalid ledger entry on line {}", lineno + 1))?;
            entries.insert(id);
        }
        Ok(entries)
    }

    pub fn len(&self) -> usize {
        self.lock().map(|inner| inner.entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, FileLedgerInner>> {
        self.inner
            .lock()
            .map_err(|_| anyhow::anyhow!("Ledger lock poisoned: {:?}", self.path))
    }
}

impl Ledger for FileLedger {
    fn has(&self, id: &ObjectId) -> Result<bool> {
        Ok(self.lock()?.entries.contains(id))
    }

    fn record(&self, id: &ObjectId) -> Result<()> {
        let mut inner = self.lock()?;
        if inner.entries.contains(id) {
            return Ok(());
        }

        let line = format!("{}\t{}\n", id, Utc::now().to_rfc3339());
        inner
            .file
            .write_all(line.as_bytes())
            .with_context(|| format!("Failed to append ledger entry for {}", id))?;
        inner
            .file
            .sync_data()
            .with_context(|| format!("Failed to sync ledger {:?}", self.path))?;

        inner.entries.insert(*id);
        Ok(())
    }
}

/// In-memory ledger for tests and dry runs
#[derive(Debug, Default)]
pub struct MemoryLedger {
    entries: Mutex<HashSet<ObjectId>>,
}

impl MemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Ledger that already knows `ids`
    pub fn with_entries<I: IntoIterator<Item = ObjectId>>(ids: I) -> Self {
        Self {
            entries: Mutex::new(ids.into_iter().collect()),
        }
    }

    pub fn contains(&self, id: &ObjectId) -> bool {
        self.entries
            .lock()
            .map(|entries| entries.contains(id))
            .unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.entries.lock().map(|entries| entries.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Ledger for MemoryLedger {
    fn has(&self, id: &ObjectId) -> Result<bool> {
        let entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("Ledger lock poisoned"))?;
        Ok(entries.contains(id))
    }

    fn record(&self, id: &ObjectId) -> Result<()> {
        let mut entries = self
            .entries
            .lock()
            .map_err(|_| anyhow::anyhow!("Ledger lock poisoned"))?;
        entries.insert(*id);
        Ok(())
    }
}
