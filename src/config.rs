//! Configuration management with environment variable support
//!
//! Provides the recognized options of the index core: partition
//! directories, indexing poll interval, analyzer and writer tuning.

use crate::analyzer::Analyzer;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

/// Default indexing poll interval (30 seconds)
pub const DEFAULT_INDEXING_INTERVAL_MS: u64 = 30_000;

/// Upper bound for auto-detected writer threads
const MAX_AUTO_WRITER_THREADS: usize = 4;

/// Index writer tuning
#[derive(Debug, Clone, PartialEq)]
pub struct WriterConfig {
    /// Memory budget in MB per thread
    pub memory_budget_mb: usize,
    /// Number of indexing threads (0 = auto)
    pub num_threads: usize,
}

impl Default for WriterConfig {
    fn default() -> Self {
        Self {
            memory_budget_mb: 50,
            num_threads: 0,
        }
    }
}

impl WriterConfig {
    /// Effective thread count
    pub fn threads(&self) -> usize {
        if self.num_threads == 0 {
            num_cpus::get().clamp(1, MAX_AUTO_WRITER_THREADS)
        } else {
            self.num_threads
        }
    }

    /// Total memory budget in bytes across all threads
    pub fn total_budget_bytes(&self) -> usize {
        self.memory_budget_mb * self.threads() * 1024 * 1024
    }
}

/// Index core configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Base directory for the default index location
    pub data_dir: PathBuf,
    /// Index partitions; the first one is the writable primary
    pub index_dirs: Vec<PathBuf>,
    /// Sleep between indexing cycles when the queue is empty
    pub indexing_interval_ms: u64,
    /// Analyzer identifier, resolved with fallback by `Config::analyzer`
    pub analyzer: String,
    /// Writer tuning
    pub writer: WriterConfig,
}

impl Default for Config {
    fn default() -> Self {
        let data_dir = default_data_dir();
        Self {
            index_dirs: vec![data_dir.join("index")],
            data_dir,
            indexing_interval_ms: DEFAULT_INDEXING_INTERVAL_MS,
            analyzer: Analyzer::Standard.name().to_string(),
            writer: WriterConfig::default(),
        }
    }
}

impl Config {
    /// Configuration with a single primary partition
    pub fn with_index_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            index_dirs: vec![dir.into()],
            ..Self::default()
        }
    }

    /// Load configuration from environment variables
    ///
    /// Supported environment variables:
    /// - WIKI_SEARCH_DATA_DIR: Base data directory (default: platform data dir)
    /// - WIKI_SEARCH_INDEX_DIRS: Comma separated partition directories (default: <data_dir>/index)
    /// - WIKI_SEARCH_INDEXING_INTERVAL_MS: Poll interval in ms (default: 30000)
    /// - WIKI_SEARCH_ANALYZER: standard | english | whitespace (default: standard)
    /// - WIKI_SEARCH_WRITER_MEMORY_MB: Writer memory per thread in MB (default: 50)
    /// - WIKI_SEARCH_WRITER_THREADS: Writer threads (default: 0 for auto)
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration through an arbitrary key lookup
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(dir) = lookup("WIKI_SEARCH_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
            config.index_dirs = vec![config.data_dir.join("index")];
        }

        if let Some(dirs) = lookup("WIKI_SEARCH_INDEX_DIRS") {
            let parsed = parse_dir_list(&dirs);
            if parsed.is_empty() {
                tracing::warn!("WIKI_SEARCH_INDEX_DIRS is empty, keeping default index directory");
            } else {
                config.index_dirs = parsed;
            }
        }

        if let Some(interval) = lookup("WIKI_SEARCH_INDEXING_INTERVAL_MS") {
            match interval.trim().parse::<u64>() {
                Ok(ms) => config.indexing_interval_ms = ms,
                Err(_) => tracing::warn!(
                    "Invalid indexing interval '{}', using {}ms",
                    interval,
                    DEFAULT_INDEXING_INTERVAL_MS
                ),
            }
        }

        if let Some(analyzer) = lookup("WIKI_SEARCH_ANALYZER") {
            config.analyzer = analyzer;
        }

        if let Some(memory) = lookup("WIKI_SEARCH_WRITER_MEMORY_MB") {
            if let Ok(mb) = memory.trim().parse::<usize>() {
                config.writer.memory_budget_mb = mb.max(15);
            }
        }

        if let Some(threads) = lookup("WIKI_SEARCH_WRITER_THREADS") {
            if let Ok(num) = threads.trim().parse::<usize>() {
                config.writer.num_threads = num;
            }
        }

        config
    }

    /// Writable primary partition
    pub fn primary_dir(&self) -> Option<&PathBuf> {
        self.index_dirs.first()
    }

    pub fn indexing_interval(&self) -> Duration {
        Duration::from_millis(self.indexing_interval_ms)
    }

    /// Configured analyzer, falling back to the standard one
    pub fn analyzer(&self) -> Analyzer {
        Analyzer::from_config(&self.analyzer)
    }

    /// Log configuration summary
    pub fn log_summary(&self) {
        tracing::info!(
            "Index partitions: {}",
            self.index_dirs
                .iter()
                .map(|d| d.display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        );
        tracing::info!(
            "Indexing interval: {}ms, analyzer: {}, writer: {} threads x {}MB",
            self.indexing_interval_ms,
            self.analyzer,
            self.writer.threads(),
            self.writer.memory_budget_mb
        );
    }
}

/// Split a comma separated directory list, dropping blanks
pub fn parse_dir_list(dirs: &str) -> Vec<PathBuf> {
    dirs.split(',')
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(PathBuf::from)
        .collect()
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    if let Some(dirs) = directories::ProjectDirs::from("org", "wiki-search", "wiki-search") {
        dirs.data_dir().to_path_buf()
    } else {
        // Fallback to current directory
        PathBuf::from("./data")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.indexing_interval_ms, 30_000);
        assert_eq!(config.analyzer(), Analyzer::Standard);
        assert_eq!(config.index_dirs.len(), 1);
        assert!(config.primary_dir().unwrap().ends_with("index"));
    }

    #[test]
    fn test_from_lookup() {
        let config = Config::from_lookup(lookup(&[
            ("WIKI_SEARCH_INDEX_DIRS", "/var/idx/main, /var/idx/archive,,"),
            ("WIKI_SEARCH_INDEXING_INTERVAL_MS", "250"),
            ("WIKI_SEARCH_ANALYZER", "english"),
            ("WIKI_SEARCH_WRITER_THREADS", "2"),
        ]));

        assert_eq!(
            config.index_dirs,
            vec![PathBuf::from("/var/idx/main"), PathBuf::from("/var/idx/archive")]
        );
        assert_eq!(config.indexing_interval(), Duration::from_millis(250));
        assert_eq!(config.analyzer(), Analyzer::English);
        assert_eq!(config.writer.threads(), 2);
    }

    #[test]
    fn test_invalid_values_fall_back() {
        let config = Config::from_lookup(lookup(&[
            ("WIKI_SEARCH_INDEXING_INTERVAL_MS", "soon"),
            ("WIKI_SEARCH_ANALYZER", "org.example.MissingAnalyzer"),
            ("WIKI_SEARCH_INDEX_DIRS", " , "),
        ]));

        assert_eq!(config.indexing_interval_ms, DEFAULT_INDEXING_INTERVAL_MS);
        assert_eq!(config.analyzer(), Analyzer::Standard);
        assert_eq!(config.index_dirs.len(), 1);
    }

    #[test]
    fn test_writer_budget() {
        let writer = WriterConfig {
            memory_budget_mb: 20,
            num_threads: 3,
        };
        assert_eq!(writer.total_budget_bytes(), 60 * 1024 * 1024);
        assert!(WriterConfig::default().threads() >= 1);
    }
}
