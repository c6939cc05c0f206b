use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};

use thiserror::Error;

use crate::shared::constants::APP_DIR_NAME;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("download of {url} returned HTTP {status}")]
    Status { url: String, status: u16 },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("could not determine cache directory")]
    NoCacheDir,
    #[error("model download cancelled")]
    Cancelled,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// A model artifact pinned to one versioned download location.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelSource {
    pub file_name: String,
    pub url: String,
}

impl ModelSource {
    pub fn new(file_name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            file_name: file_name.into(),
            url: url.into(),
        }
    }
}

/// Resolves a model into the platform cache, downloading it on first use.
///
/// Resolution order:
/// 1. User cache directory
/// 2. Bundled directory (development checkouts, packaged installs)
/// 3. Download into the cache
///
/// Setting `cancelled` aborts a download between chunks; the partial file
/// is removed.
pub fn resolve(
    source: &ModelSource,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
    cancelled: &AtomicBool,
) -> Result<PathBuf, ModelResolveError> {
    resolve_in(&model_cache_dir()?, source, bundled_dir, progress, cancelled)
}

/// Same as [`resolve`], against an explicit cache directory.
pub fn resolve_in(
    cache_dir: &Path,
    source: &ModelSource,
    bundled_dir: Option<&Path>,
    progress: Option<ProgressFn>,
    cancelled: &AtomicBool,
) -> Result<PathBuf, ModelResolveError> {
    let cached_path = cache_dir.join(&source.file_name);
    if cached_path.is_file() {
        log::debug!("Using cached model {}", cached_path.display());
        return Ok(cached_path);
    }

    if let Some(bundled_path) = bundled_dir
        .map(|dir| dir.join(&source.file_name))
        .filter(|p| p.is_file())
    {
        log::debug!("Using bundled model {}", bundled_path.display());
        return Ok(bundled_path);
    }

    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    log::info!("Downloading {} from {}", source.file_name, source.url);
    download(&source.url, &cached_path, progress, cancelled)?;
    Ok(cached_path)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/FaceWatch/models/`
/// - Linux: `$XDG_CACHE_HOME/FaceWatch/models/` or `~/.cache/FaceWatch/models/`
/// - Windows: `%LOCALAPPDATA%/FaceWatch/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    let base = dirs::data_dir();
    #[cfg(not(target_os = "macos"))]
    let base = dirs::cache_dir();

    base.map(|d| d.join(APP_DIR_NAME).join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

fn download(
    url: &str,
    dest: &Path,
    progress: Option<ProgressFn>,
    cancelled: &AtomicBool,
) -> Result<(), ModelResolveError> {
    if cancelled.load(Ordering::Acquire) {
        return Err(ModelResolveError::Cancelled);
    }
    let download_err = |source| ModelResolveError::Download {
        url: url.to_string(),
        source,
    };

    let mut response = reqwest::blocking::get(url).map_err(download_err)?;
    if !response.status().is_success() {
        return Err(ModelResolveError::Status {
            url: url.to_string(),
            status: response.status().as_u16(),
        });
    }
    let total = response.content_length().unwrap_or(0);

    // Stream into a sibling temp file and rename, so a crash mid-download
    // never leaves a truncated model at the cached path.
    let temp_path = dest.with_extension("part");
    if let Err(e) = write_stream(&mut response, &temp_path, total, progress.as_ref(), cancelled) {
        let _ = fs::remove_file(&temp_path);
        return Err(e);
    }

    fs::rename(&temp_path, dest).map_err(|e| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source: e,
    })
}

fn write_stream(
    reader: &mut impl Read,
    path: &Path,
    total: u64,
    progress: Option<&ProgressFn>,
    cancelled: &AtomicBool,
) -> Result<(), ModelResolveError> {
    let write_err = |source| ModelResolveError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut file = fs::File::create(path).map_err(write_err)?;
    let mut buf = vec![0u8; 1024 * 1024];
    let mut downloaded: u64 = 0;
    loop {
        if cancelled.load(Ordering::Acquire) {
            return Err(ModelResolveError::Cancelled);
        }
        let n = reader.read(&mut buf).map_err(write_err)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err)?;
        downloaded += n as u64;
        if let Some(cb) = progress {
            cb(downloaded, total);
        }
    }
    file.flush().map_err(write_err)
}
