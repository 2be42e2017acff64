use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

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
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("model asset not found: {0}")]
    NotFound(String),
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// Where a model asset may come from.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ModelLocation {
    /// Explicit file path. When set, nothing else is consulted.
    pub path: Option<PathBuf>,
    /// File name looked up in the cache and bundled directories.
    pub name: String,
    /// Download source used when the asset is not cached.
    pub url: Option<String>,
    pub bundled_dir: Option<PathBuf>,
}

/// Resolve a model asset, checking cache locations before downloading.
///
/// Resolution order:
/// 1. Explicit path
/// 2. User cache directory (platform-specific)
/// 3. Bundled directory
/// 4. Download from URL to cache
pub fn resolve(
    location: &ModelLocation,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    resolve_in(&model_cache_dir()?, location, progress)
}

/// Same as [`resolve`] with an explicit cache directory.
pub fn resolve_in(
    cache_dir: &Path,
    location: &ModelLocation,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    if let Some(path) = &location.path {
        return if path.exists() {
            Ok(path.clone())
        } else {
            Err(ModelResolveError::NotFound(path.display().to_string()))
        };
    }

    let cached_path = cache_dir.join(&location.name);
    if cached_path.exists() {
        return Ok(cached_path);
    }

    if let Some(dir) = &location.bundled_dir {
        let bundled_path = dir.join(&location.name);
        if bundled_path.exists() {
            return Ok(bundled_path);
        }
    }

    let Some(url) = &location.url else {
        return Err(ModelResolveError::NotFound(format!(
            "{} (not in {} and no download URL configured)",
            location.name,
            cache_dir.display()
        )));
    };

    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    log::info!("Downloading {} from {url}", location.name);
    download(url, &cached_path, progress)?;
    Ok(cached_path)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/facecam/models/`
/// - Linux: `$XDG_CACHE_HOME/facecam/models/` or `~/.cache/facecam/models/`
/// - Windows: `%LOCALAPPDATA%/facecam/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    {
        dirs::data_dir()
            .map(|d| d.join("facecam").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
    #[cfg(not(target_os = "macos"))]
    {
        dirs::cache_dir()
            .map(|d| d.join("facecam").join("models"))
            .ok_or(ModelResolveError::NoCacheDir)
    }
}

fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");

    let result = download_inner(url, dest, &temp_path, progress);

    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }

    result
}

fn download_inner(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let total = response.content_length().unwrap_or(0);
    let mut downloaded: u64 = 0;

    let write_err = |e| ModelResolveError::Write {
        path: temp_path.to_path_buf(),
        source: e,
    };
    let mut file = fs::File::create(temp_path).map_err(write_err)?;

    let mut buf = vec![0u8; 256 * 1024];
    loop {
        let n = response.read(&mut buf).map_err(write_err)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err)?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }

    file.flush().map_err(write_err)?;
    drop(file);

    fs::rename(temp_path, dest).map_err(|e| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source: e,
    })?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn location(name: &str) -> ModelLocation {
        ModelLocation {
            name: name.to_string(),
            ..ModelLocation::default()
        }
    }

    #[test]
    fn test_explicit_path_wins() {
        let tmp = TempDir::new().unwrap();
        let explicit = tmp.path().join("custom.onnx");
        fs::write(&explicit, b"model").unwrap();
        let loc = ModelLocation {
            path: Some(explicit.clone()),
            ..location("other.onnx")
        };
        assert_eq!(resolve_in(tmp.path(), &loc, None).unwrap(), explicit);
    }

    #[test]
    fn test_missing_explicit_path_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let loc = ModelLocation {
            path: Some(tmp.path().join("absent.onnx")),
            ..location("absent.onnx")
        };
        assert!(matches!(
            resolve_in(tmp.path(), &loc, None),
            Err(ModelResolveError::NotFound(_))
        ));
    }

    #[test]
    fn test_resolve_finds_cached_file() {
        let tmp = TempDir::new().unwrap();
        let cached = tmp.path().join("m.onnx");
        fs::write(&cached, b"cached").unwrap();
        assert_eq!(
            resolve_in(tmp.path(), &location("m.onnx"), None).unwrap(),
            cached
        );
    }

    #[test]
    fn test_resolve_finds_bundled_file() {
        let tmp = TempDir::new().unwrap();
        let cache = tmp.path().join("cache");
        let bundled_dir = tmp.path().join("bundled");
        fs::create_dir_all(&bundled_dir).unwrap();
        fs::write(bundled_dir.join("m.onnx"), b"bundled").unwrap();

        let loc = ModelLocation {
            bundled_dir: Some(bundled_dir.clone()),
            ..location("m.onnx")
        };
        assert_eq!(
            resolve_in(&cache, &loc, None).unwrap(),
            bundled_dir.join("m.onnx")
        );
    }

    #[test]
    fn test_uncached_without_url_is_not_found() {
        let tmp = TempDir::new().unwrap();
        let err = resolve_in(tmp.path(), &location("m.onnx"), None).unwrap_err();
        assert!(err.to_string().contains("m.onnx"));
    }

    #[test]
    fn test_model_cache_dir_returns_path() {
        let path = model_cache_dir().unwrap();
        assert!(path.to_string_lossy().contains("facecam"));
        assert!(path.to_string_lossy().contains("models"));
    }

    #[test]
    fn test_download_invalid_url_leaves_no_partial_file() {
        let tmp = TempDir::new().unwrap();
        let dest = tmp.path().join("model.onnx");
        let result = download("http://invalid.nonexistent.example.com/model", &dest, None);
        assert!(result.is_err());
        assert!(!dest.exists());
        assert!(!dest.with_extension("part").exists());
    }
}
