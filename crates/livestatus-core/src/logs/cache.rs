//! Lazily parsed monitoring history.
//!
//! Only the file index (path and first timestamp) is rebuilt per query.
//! Parsed entries are loaded on demand and kept in an LRU set bounded by
//! the total number of cached messages.

use std::collections::{BTreeMap, HashMap};
use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use parking_lot::Mutex;
use tracing::{debug, warn};

use super::entry::LogEntry;
use crate::counters::{Counter, Counters};
use crate::error::LogError;

/// Parsed entries of one history file, oldest first.
pub type Logfile = Arc<Vec<LogEntry>>;

// ============================================================
// LoadedFile: one parsed file plus its freshness stamp
// ============================================================

struct LoadedFile {
    len: u64,
    modified: Option<SystemTime>,
    entries: Logfile,
    last_use: u64,
}

#[derive(Default)]
struct CacheState {
    loaded: HashMap<PathBuf, LoadedFile>,
    use_counter: u64,
}

impl CacheState {
    fn cached_messages(&self) -> usize {
        self.loaded.values().map(|f| f.entries.len()).sum()
    }
}

pub struct LogCache {
    log_file: Option<PathBuf>,
    archive_path: Option<PathBuf>,
    max_cached_messages: usize,
    max_lines_per_logfile: usize,
    counters: Option<Arc<Counters>>,
    state: Mutex<CacheState>,
}

impl LogCache {
    pub fn new(
        log_file: Option<PathBuf>,
        archive_path: Option<PathBuf>,
        max_cached_messages: usize,
        max_lines_per_logfile: usize,
    ) -> Self {
        Self {
            log_file,
            archive_path,
            max_cached_messages,
            max_lines_per_logfile,
            counters: None,
            state: Mutex::new(CacheState::default()),
        }
    }

    /// New lines of the current log file are counted as log messages.
    pub fn with_counters(mut self, counters: Arc<Counters>) -> Self {
        self.counters = Some(counters);
        self
    }

    /// Drops every parsed file, e.g. after the core rotated its log.
    pub fn invalidate(&self) {
        let mut state = self.state.lock();
        debug!("dropping {} cached log files", state.loaded.len());
        state.loaded.clear();
    }

    pub fn cached_messages(&self) -> usize {
        self.state.lock().cached_messages()
    }

    /// History files by their first timestamp.
    fn index(&self) -> BTreeMap<i64, PathBuf> {
        let mut index = BTreeMap::new();
        if let Some(dir) = &self.archive_path {
            match fs::read_dir(dir) {
                Ok(entries) => {
                    for entry in entries.flatten() {
                        let path = entry.path();
                        if path.extension().is_some_and(|ext| ext == "log")
                            && let Some(since) = first_timestamp(&path)
                        {
                            index.insert(since, path);
                        }
                    }
                }
                Err(e) => debug!("cannot scan log archive {}: {}", dir.display(), e),
            }
        }
        if let Some(path) = &self.log_file
            && let Some(since) = first_timestamp(path)
        {
            index.insert(since, path.clone());
        }
        index
    }

    /// Files overlapping `[since, until]`, oldest first: the file covering
    /// `since` and every later file starting no later than `until`.
    pub fn logfiles_between(&self, since: i64, until: i64) -> Vec<Logfile> {
        let index = self.index();
        let first = index.range(..=since).next_back().map_or(i64::MIN, |(t, _)| *t);
        let paths: Vec<&PathBuf> = index.range(first..=until.max(first)).map(|(_, p)| p).collect();

        let mut state = self.state.lock();
        let mut result = Vec::with_capacity(paths.len());
        for path in &paths {
            match self.load(&mut state, path) {
                Ok(entries) => result.push(entries),
                Err(e) => warn!("{}", e),
            }
        }
        self.evict(&mut state, &paths);
        result
    }

    fn load(&self, state: &mut CacheState, path: &Path) -> Result<Logfile, LogError> {
        let metadata = fs::metadata(path).map_err(|source| LogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let modified = metadata.modified().ok();
        state.use_counter += 1;
        let use_counter = state.use_counter;
        let previous_len = match state.loaded.get_mut(path) {
            Some(file) if file.len == metadata.len() && file.modified == modified => {
                file.last_use = use_counter;
                return Ok(Arc::clone(&file.entries));
            }
            Some(file) => Some(file.entries.len()),
            None => None,
        };

        let entries = Arc::new(self.parse_file(path)?);
        debug!("loaded {} entries from {}", entries.len(), path.display());
        if self.log_file.as_deref() == Some(path)
            && let (Some(counters), Some(previous)) = (&self.counters, previous_len)
        {
            counters.add(Counter::LogMessages, entries.len().saturating_sub(previous) as u64);
        }
        state.loaded.insert(
            path.to_path_buf(),
            LoadedFile {
                len: metadata.len(),
                modified,
                entries: Arc::clone(&entries),
                last_use: use_counter,
            },
        );
        Ok(entries)
    }

    fn parse_file(&self, path: &Path) -> Result<Vec<LogEntry>, LogError> {
        let file = File::open(path).map_err(|source| LogError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let mut entries = Vec::new();
        for (i, line) in BufReader::new(file).split(b'\n').enumerate() {
            if i >= self.max_lines_per_logfile {
                warn!(
                    "{} has more than {} lines, ignoring the rest",
                    path.display(),
                    self.max_lines_per_logfile
                );
                break;
            }
            let line = line.map_err(|source| LogError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            let line = String::from_utf8_lossy(&line);
            if let Some(entry) = LogEntry::parse(i + 1, line.trim_end_matches('\r')) {
                entries.push(entry);
            }
        }
        Ok(entries)
    }

    /// Evicts least recently used files beyond the message limit, never
    /// one of the files the current query is using.
    fn evict(&self, state: &mut CacheState, in_use: &[&PathBuf]) {
        let mut total = state.cached_messages();
        while total > self.max_cached_messages {
            let victim = state
                .loaded
                .iter()
                .filter(|(path, _)| !in_use.contains(path))
                .min_by_key(|(_, file)| file.last_use)
                .map(|(path, _)| path.clone());
            let Some(victim) = victim else {
                break;
            };
            if let Some(file) = state.loaded.remove(&victim) {
                debug!("evicting {} ({} entries)", victim.display(), file.entries.len());
                total -= file.entries.len();
            }
        }
    }
}

fn first_timestamp(path: &Path) -> Option<i64> {
    let file = File::open(path).ok()?;
    let mut line = Vec::new();
    BufReader::new(file).read_until(b'\n', &mut line).ok()?;
    let line = String::from_utf8_lossy(&line);
    let (time, _) = line.strip_prefix('[')?.split_once(']')?;
    time.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_log(dir: &Path, name: &str, lines: &[&str]) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        for line in lines {
            writeln!(file, "{line}").unwrap();
        }
        path
    }

    fn archive() -> (tempfile::TempDir, PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let archive = dir.path().join("archive");
        fs::create_dir(&archive).unwrap();
        write_log(
            &archive,
            "a.log",
            &[
                "[1000] LOG VERSION: 2.0",
                "[1010] HOST ALERT: h1;DOWN;HARD;1;down",
            ],
        );
        write_log(
            &archive,
            "b.log",
            &["[2000] LOG VERSION: 2.0", "[2010] HOST ALERT: h1;UP;HARD;1;up"],
        );
        write_log(&archive, "ignored.txt", &["[1500] LOG VERSION: 2.0"]);
        (dir, archive)
    }

    #[test]
    fn test_files_covering_range() {
        let (dir, archive) = archive();
        let current = write_log(dir.path(), "current.log", &["[3000] LOG VERSION: 2.0"]);
        let cache = LogCache::new(Some(current), Some(archive), 1000, 1000);

        let files = cache.logfiles_between(1500, 2500);
        assert_eq!(files.len(), 2);
        assert_eq!(files[0][0].time, 1000);
        assert_eq!(files[1][1].time, 2010);

        assert_eq!(cache.logfiles_between(0, 5000).len(), 3);
        assert_eq!(cache.logfiles_between(3500, 4000).len(), 1);
    }

    #[test]
    fn test_growing_current_file_is_reloaded() {
        let dir = tempfile::tempdir().unwrap();
        let current = write_log(dir.path(), "current.log", &["[3000] LOG VERSION: 2.0"]);
        let counters = Arc::new(Counters::new());
        let cache = LogCache::new(Some(current.clone()), None, 1000, 1000).with_counters(Arc::clone(&counters));
        assert_eq!(cache.logfiles_between(0, 4000)[0].len(), 1);

        let mut file = fs::OpenOptions::new().append(true).open(&current).unwrap();
        writeln!(file, "[3001] EXTERNAL COMMAND: FOO").unwrap();
        writeln!(file, "[3002] EXTERNAL COMMAND: BAR").unwrap();
        drop(file);
        assert_eq!(cache.logfiles_between(0, 4000)[0].len(), 3);
        assert_eq!(counters.value(Counter::LogMessages), 2);
    }

    #[test]
    fn test_line_limit_and_eviction() {
        let (_dir, archive) = archive();
        let cache = LogCache::new(None, Some(archive), 2, 1);
        let files = cache.logfiles_between(0, 1500);
        assert_eq!(files.len(), 1);
        assert_eq!(files[0].len(), 1);

        cache.logfiles_between(2000, 2500);
        cache.logfiles_between(0, 1500);
        cache.logfiles_between(2000, 2500);
        assert!(cache.cached_messages() <= 2);

        cache.invalidate();
        assert_eq!(cache.cached_messages(), 0);
    }
}
