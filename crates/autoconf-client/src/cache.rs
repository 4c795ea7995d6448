// crates/autoconf-client/src/cache.rs
// ============================================================================
// Module: AutoConf Cache Store
// Description: Versioned on-disk storage of autoconf payloads and HTTP metadata.
// Purpose: Persist documents across restarts and serve them without network I/O.
// Dependencies: autoconf-core, serde_json, time, tracing
// ============================================================================

//! ## Overview
//! Every client owns one cache directory named after an FNV-1a hash of its
//! configured URLs. The directory holds payload files named
//! `autoconf-<unix>.json` plus `.etag`, `.last-modified`, and `.last-refresh`
//! metadata files:
//!
//! ```text
//! <root>/<fnv64hex>/
//!   autoconf-<unix>.json   payload, mode 0600
//!   .etag                  opaque, mode 0600
//!   .last-modified         opaque, mode 0600
//!   .last-refresh          RFC 3339 text, mode 0600
//! ```
//!
//! Invariants:
//! - Reads hold the shared lock; writes and pruning hold the exclusive lock.
//! - Files are written to a temporary sibling and renamed into place, so a
//!   reader never observes a partial payload.
//! - Payload filenames are strictly increasing in save order.
//! - The lock is never held across an `.await`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::ffi::OsString;
use std::fs;
use std::fs::DirBuilder;
use std::fs::OpenOptions;
use std::io::ErrorKind as IoErrorKind;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::sync::PoisonError;
use std::sync::RwLock;
use std::time::Duration;

use autoconf_core::Config;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;
use tracing::debug;
use tracing::warn;

use crate::error::AutoConfError;
use crate::response::Response;
use crate::response::version_token;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// ETag metadata file.
const ETAG_FILE: &str = ".etag";

/// Last-Modified metadata file.
const LAST_MODIFIED_FILE: &str = ".last-modified";

/// Last HTTP round-trip timestamp file.
const LAST_REFRESH_FILE: &str = ".last-refresh";

/// Payload filename prefix.
const PAYLOAD_PREFIX: &str = "autoconf-";

/// Payload filename suffix.
const PAYLOAD_SUFFIX: &str = ".json";

/// Mode of cache files.
#[cfg(unix)]
const FILE_MODE: u32 = 0o600;

/// Mode of cache directories.
#[cfg(unix)]
const DIR_MODE: u32 = 0o755;

/// Temporary file name attempts before giving up.
const TEMP_ATTEMPTS: u32 = 64;

/// FNV-1a 64-bit offset basis.
const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;

/// FNV-1a 64-bit prime.
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

// ============================================================================
// SECTION: Cache Key
// ============================================================================

/// Returns the cache directory name for a URL set.
///
/// URLs are sorted so the key is independent of configuration order; a single
/// URL hashes to exactly FNV-1a of its bytes.
#[must_use]
pub fn cache_key<S: AsRef<str>>(urls: &[S]) -> String {
    let mut sorted: Vec<&str> = urls.iter().map(AsRef::as_ref).collect();
    sorted.sort_unstable();
    let mut hash = FNV_OFFSET_BASIS;
    for byte in sorted.iter().flat_map(|url| url.bytes()) {
        hash ^= u64::from(byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    format!("{hash:016x}")
}

// ============================================================================
// SECTION: Metadata
// ============================================================================

/// Conditional-request metadata of the newest payload.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheMetadata {
    /// Stored ETag, trimmed; empty when absent.
    pub etag: String,
    /// Stored Last-Modified, trimmed; empty when absent.
    pub last_modified: String,
}

// ============================================================================
// SECTION: Cache Store
// ============================================================================

/// Lock-protected cache directory of one client.
#[derive(Debug)]
pub struct CacheStore {
    /// Directory holding this client's payloads.
    dir: PathBuf,
    /// Reader-writer lock over the directory contents.
    lock: RwLock<()>,
}

impl CacheStore {
    /// Creates a store for `urls` under `root`. Nothing is created on disk.
    #[must_use]
    pub fn new<S: AsRef<str>>(root: &Path, urls: &[S]) -> Self {
        Self {
            dir: root.join(cache_key(urls)),
            lock: RwLock::new(()),
        }
    }

    /// Returns the cache directory.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Creates the cache directory if missing.
    ///
    /// # Errors
    ///
    /// Returns [`AutoConfError::Cache`] when the directory cannot be created.
    pub fn ensure_dir(&self) -> Result<(), AutoConfError> {
        let mut builder = DirBuilder::new();
        builder.recursive(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            builder.mode(DIR_MODE);
        }
        builder.create(&self.dir).map_err(|err| AutoConfError::cache("failed to create cache dir", &err))
    }

    // ------------------------------------------------------------------------
    // Reads
    // ------------------------------------------------------------------------

    /// Reads the stored ETag and Last-Modified values.
    #[must_use]
    pub fn read_metadata(&self) -> CacheMetadata {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);
        self.read_metadata_unlocked()
    }

    /// Reads the time of the most recent HTTP round-trip.
    ///
    /// # Errors
    ///
    /// Returns [`AutoConfError::Cache`] when the file is missing or unparsable.
    pub fn read_last_refresh(&self) -> Result<OffsetDateTime, AutoConfError> {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);
        self.read_last_refresh_unlocked()
    }

    /// Lists payload files, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AutoConfError::Cache`] when the directory cannot be read.
    pub fn list_cache_files(&self) -> Result<Vec<PathBuf>, AutoConfError> {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);
        self.list_unlocked()
    }

    /// Returns true when at least one payload file exists.
    #[must_use]
    pub fn has_cached_config(&self) -> bool {
        self.list_cache_files().is_ok_and(|files| !files.is_empty())
    }

    /// Decodes the newest payload.
    ///
    /// # Errors
    ///
    /// Returns [`AutoConfError::NoCachedVersions`] for an empty cache and
    /// [`AutoConfError::Cache`] for unreadable or undecodable payloads.
    pub fn cached_config(&self) -> Result<Config, AutoConfError> {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);
        self.cached_config_unlocked()
    }

    /// Builds a cached response whose age is measured from the last refresh.
    ///
    /// Payload, refresh time, and metadata are read under one shared lock so
    /// they always describe the same save. The age is at least one nanosecond
    /// so the response always reports itself as cached.
    ///
    /// # Errors
    ///
    /// Returns the errors of [`Self::cached_config`] and
    /// [`Self::read_last_refresh`].
    pub fn cached_response(&self, now: OffsetDateTime) -> Result<Response, AutoConfError> {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);
        let config = self.cached_config_unlocked()?;
        let fetch_time = self.read_last_refresh_unlocked()?;
        let metadata = self.read_metadata_unlocked();
        let cache_age = Duration::try_from(now - fetch_time)
            .unwrap_or(Duration::ZERO)
            .max(Duration::from_nanos(1));
        Ok(Response {
            config,
            fetch_time,
            version: version_token(&metadata.etag, &metadata.last_modified),
            cache_age,
        })
    }

    /// Returns false when `payload` equals the newest cached payload.
    #[must_use]
    pub fn is_new_payload(&self, payload: &[u8]) -> bool {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);
        !self.newest_payload_unlocked().is_ok_and(|newest| newest == payload)
    }

    // ------------------------------------------------------------------------
    // Writes
    // ------------------------------------------------------------------------

    /// Saves a payload and its metadata.
    ///
    /// The payload file is stamped with `now` (or one second after the newest
    /// payload when that is later). Empty `etag` or `last_modified` values
    /// remove the stored value. Metadata failures are logged and do not fail
    /// the save.
    ///
    /// # Errors
    ///
    /// Returns [`AutoConfError::Cache`] when the payload cannot be written.
    pub fn save(
        &self,
        payload: &[u8],
        etag: &str,
        last_modified: &str,
        refreshed_at: OffsetDateTime,
    ) -> Result<PathBuf, AutoConfError> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        let newest = self.list_unlocked()?.first().and_then(|path| payload_timestamp(path));
        let now = OffsetDateTime::now_utc().unix_timestamp();
        let stamp = newest.map_or(now, |newest| now.max(newest.saturating_add(1)));
        let path = self.dir.join(format!("{PAYLOAD_PREFIX}{stamp}{PAYLOAD_SUFFIX}"));
        write_owner_only(&path, payload)
            .map_err(|err| AutoConfError::cache("failed to write cache file", &err))?;

        for (file, value) in [(ETAG_FILE, etag), (LAST_MODIFIED_FILE, last_modified)] {
            let target = self.dir.join(file);
            let result = if value.is_empty() {
                remove_if_present(&target)
            } else {
                write_owner_only(&target, value.as_bytes())
            };
            if let Err(err) = result {
                warn!(file, error = %err, "failed to update cache metadata");
            }
        }
        if let Err(err) = self.write_last_refresh_unlocked(refreshed_at) {
            warn!(error = %err, "failed to write last refresh time");
        }
        Ok(path)
    }

    /// Records the time of an HTTP round-trip that produced no new payload.
    ///
    /// # Errors
    ///
    /// Returns [`AutoConfError::Cache`] when the file cannot be written.
    pub fn write_last_refresh(&self, refreshed_at: OffsetDateTime) -> Result<(), AutoConfError> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        self.write_last_refresh_unlocked(refreshed_at)
    }

    /// Deletes payloads beyond the newest `keep`; returns how many were removed.
    ///
    /// # Errors
    ///
    /// Returns [`AutoConfError::Cache`] when listing or removal fails.
    pub fn prune(&self, keep: usize) -> Result<usize, AutoConfError> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        let files = self.list_unlocked()?;
        let mut removed = 0;
        for file in files.iter().skip(keep) {
            fs::remove_file(file)
                .map_err(|err| AutoConfError::cache("failed to remove cache file", &err))?;
            debug!(file = %file.display(), "removed old cache file");
            removed += 1;
        }
        Ok(removed)
    }

    // ------------------------------------------------------------------------
    // Unlocked Helpers
    // ------------------------------------------------------------------------

    /// Lists payload files without taking the lock.
    fn list_unlocked(&self) -> Result<Vec<PathBuf>, AutoConfError> {
        let entries = fs::read_dir(&self.dir)
            .map_err(|err| AutoConfError::cache("failed to read cache dir", &err))?;
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|err| AutoConfError::cache("failed to read cache dir", &err))?;
            let is_file = entry.file_type().is_ok_and(|kind| kind.is_file());
            let name = entry.file_name();
            let is_payload = name.to_str().is_some_and(|name| {
                name.starts_with(PAYLOAD_PREFIX) && name.ends_with(PAYLOAD_SUFFIX)
            });
            if is_file && is_payload {
                files.push(entry.path());
            }
        }
        files.sort_by(|a, b| b.file_name().cmp(&a.file_name()));
        Ok(files)
    }

    /// Reads the newest payload bytes without taking the lock.
    fn newest_payload_unlocked(&self) -> Result<Vec<u8>, AutoConfError> {
        let files = self.list_unlocked()?;
        let newest = files.first().ok_or(AutoConfError::NoCachedVersions)?;
        fs::read(newest).map_err(|err| AutoConfError::cache("failed to read cached config", &err))
    }

    /// Decodes the newest payload without taking the lock.
    fn cached_config_unlocked(&self) -> Result<Config, AutoConfError> {
        let bytes = self.newest_payload_unlocked()?;
        serde_json::from_slice(&bytes)
            .map_err(|err| AutoConfError::Cache(format!("failed to parse cached config: {err}")))
    }

    /// Reads `.last-refresh` without taking the lock.
    fn read_last_refresh_unlocked(&self) -> Result<OffsetDateTime, AutoConfError> {
        let raw = fs::read_to_string(self.dir.join(LAST_REFRESH_FILE))
            .map_err(|err| AutoConfError::cache("failed to read last refresh time", &err))?;
        OffsetDateTime::parse(raw.trim(), &Rfc3339).map_err(|err| {
            AutoConfError::Cache(format!("failed to parse last refresh time: {err}"))
        })
    }

    /// Reads `.etag` and `.last-modified` without taking the lock.
    fn read_metadata_unlocked(&self) -> CacheMetadata {
        let etag = fs::read_to_string(self.dir.join(ETAG_FILE));
        let last_modified = fs::read_to_string(self.dir.join(LAST_MODIFIED_FILE));
        if etag.is_err() && last_modified.is_err() {
            debug!(dir = %self.dir.display(), "no previous cache metadata found");
        }
        CacheMetadata {
            etag: etag.map(|value| value.trim().to_string()).unwrap_or_default(),
            last_modified: last_modified.map(|value| value.trim().to_string()).unwrap_or_default(),
        }
    }

    /// Writes `.last-refresh` without taking the lock.
    fn write_last_refresh_unlocked(&self, refreshed_at: OffsetDateTime) -> Result<(), AutoConfError> {
        let text = refreshed_at
            .format(&Rfc3339)
            .map_err(|err| AutoConfError::Cache(format!("failed to format refresh time: {err}")))?;
        write_owner_only(&self.dir.join(LAST_REFRESH_FILE), text.as_bytes())
            .map_err(|err| AutoConfError::cache("failed to write last refresh time", &err))
    }
}

// ============================================================================
// SECTION: File Helpers
// ============================================================================

/// Parses the unix timestamp out of a payload filename.
fn payload_timestamp(path: &Path) -> Option<i64> {
    path.file_name()?
        .to_str()?
        .strip_prefix(PAYLOAD_PREFIX)?
        .strip_suffix(PAYLOAD_SUFFIX)?
        .parse()
        .ok()
}

/// Removes a file, treating a missing file as success.
fn remove_if_present(path: &Path) -> std::io::Result<()> {
    match fs::remove_file(path) {
        Err(err) if err.kind() != IoErrorKind::NotFound => Err(err),
        _ => Ok(()),
    }
}

/// Writes a file with owner-only permissions using a temporary sibling and rename.
fn write_owner_only(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().unwrap_or_else(|| Path::new("."));
    let file_name = path.file_name().unwrap_or_default();
    for attempt in 0 .. TEMP_ATTEMPTS {
        let mut temp_name = OsString::from(".tmp-");
        temp_name.push(file_name);
        temp_name.push(format!(".{}.{attempt}", std::process::id()));
        let temp_path = parent.join(temp_name);
        let mut options = OpenOptions::new();
        options.write(true).create_new(true);
        #[cfg(unix)]
        {
            use std::os::unix::fs::OpenOptionsExt;
            options.mode(FILE_MODE);
        }
        match options.open(&temp_path) {
            Ok(mut temp_file) => {
                let written = temp_file
                    .write_all(bytes)
                    .and_then(|()| temp_file.sync_all())
                    .and_then(|()| fs::rename(&temp_path, path));
                if written.is_err() {
                    let _ = fs::remove_file(&temp_path);
                }
                return written;
            }
            Err(err) if err.kind() == IoErrorKind::AlreadyExists => {}
            Err(err) => return Err(err),
        }
    }
    Err(std::io::Error::new(IoErrorKind::AlreadyExists, "unable to allocate temporary cache file"))
}

// ============================================================================
// SECTION: Tests
// ============================================================================
