//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// HTTP server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size accepted by the upload endpoint, in bytes.
    #[serde(default = "default_max_upload_bytes")]
    pub max_upload_bytes: u64,
}

fn default_bind() -> String {
    "127.0.0.1:8080".to_string()
}

fn default_max_upload_bytes() -> u64 {
    4 * 1024 * 1024 * 1024 // 4 GiB, the FAT32 file size limit
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_upload_bytes: default_max_upload_bytes(),
        }
    }
}

impl ServerConfig {
    /// Body limit as a `usize`, saturating on 32-bit targets.
    pub fn max_upload_bytes_usize(&self) -> usize {
        usize::try_from(self.max_upload_bytes).unwrap_or(usize::MAX)
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage (an SD card mount on the device).
    Filesystem {
        /// Root directory uploads are written under.
        path: PathBuf,
    },
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Filesystem {
            path: PathBuf::from("./data/sd"),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::Filesystem { path } if path.as_os_str().is_empty() => {
                Err("filesystem storage requires a non-empty path".to_string())
            }
            StorageConfig::Filesystem { .. } => Ok(()),
        }
    }
}

/// Ingest pipeline configuration: slot ring sizing and drain timing.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct IngestConfig {
    /// Number of slots in the ring (at least two).
    #[serde(default = "default_buffer_count")]
    pub buffer_count: usize,
    /// Desired slot size in bytes. The allocator may settle on less.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    /// The allocator gives up rather than go below this slot size.
    #[serde(default = "default_min_chunk_size")]
    pub min_chunk_size: usize,
    /// Allocation attempts; every attempt after the first halves the slot size.
    #[serde(default = "default_alloc_attempts")]
    pub alloc_attempts: usize,
    /// Idle time after which the drain task abandons a silent producer.
    #[serde(default = "default_stall_timeout_ms")]
    pub stall_timeout_ms: u64,
}

fn default_buffer_count() -> usize {
    crate::DEFAULT_BUFFER_COUNT
}

fn default_chunk_size() -> usize {
    crate::DEFAULT_CHUNK_SIZE
}

fn default_min_chunk_size() -> usize {
    crate::MIN_CHUNK_SIZE
}

fn default_alloc_attempts() -> usize {
    crate::DEFAULT_ALLOC_ATTEMPTS
}

fn default_stall_timeout_ms() -> u64 {
    crate::DEFAULT_STALL_TIMEOUT_MS
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            buffer_count: default_buffer_count(),
            chunk_size: default_chunk_size(),
            min_chunk_size: default_min_chunk_size(),
            alloc_attempts: default_alloc_attempts(),
            stall_timeout_ms: default_stall_timeout_ms(),
        }
    }
}

impl IngestConfig {
    /// Get the stall timeout as a Duration.
    pub fn stall_timeout(&self) -> Duration {
        Duration::from_millis(self.stall_timeout_ms)
    }

    /// Upper bound on resident slot memory for one session.
    pub fn max_resident_bytes(&self) -> usize {
        self.buffer_count.saturating_mul(self.chunk_size)
    }

    /// Validate ingest configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if self.buffer_count < 2 {
            return Err(format!(
                "ingest.buffer_count must be at least 2, got {}",
                self.buffer_count
            ));
        }
        if self.min_chunk_size == 0 {
            return Err("ingest.min_chunk_size must be greater than 0".to_string());
        }
        if self.chunk_size < self.min_chunk_size {
            return Err(format!(
                "ingest.chunk_size {} is below ingest.min_chunk_size {}",
                self.chunk_size, self.min_chunk_size
            ));
        }
        if self.alloc_attempts == 0 {
            return Err("ingest.alloc_attempts must be at least 1".to_string());
        }
        if self.stall_timeout_ms == 0 {
            return Err("ingest.stall_timeout_ms must be greater than 0".to_string());
        }
        Ok(())
    }
}

/// Complete application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
    /// Ingest pipeline configuration.
    #[serde(default)]
    pub ingest: IngestConfig,
}

impl AppConfig {
    /// Create a test configuration with sensible defaults.
    ///
    /// **For testing only.** Uses small slots and a short stall timeout so
    /// tests exercise slot rotation and abandonment quickly.
    pub fn for_testing() -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::default(),
            ingest: IngestConfig {
                chunk_size: 1024,
                stall_timeout_ms: 2_000,
                ..IngestConfig::default()
            },
        }
    }

    /// Validate every section.
    pub fn validate(&self) -> crate::Result<()> {
        self.storage
            .validate()
            .and_then(|_| self.ingest.validate())
            .map_err(crate::Error::InvalidConfig)
    }
}
