use std::fs;
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Destination for user-facing artifacts (snapshots, recordings).
///
/// Every artifact is named `<purpose>-<unixMillis>.<ext>`.
#[derive(Clone, Debug)]
pub struct DownloadDirectory {
    dir: PathBuf,
}

impl DownloadDirectory {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// The user's download directory, falling back to the working directory.
    pub fn user_default() -> Self {
        Self::new(dirs::download_dir().unwrap_or_else(|| PathBuf::from(".")))
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for a new artifact stamped with the current wall-clock time.
    pub fn artifact_path(&self, purpose: &str, ext: &str) -> std::io::Result<PathBuf> {
        self.artifact_path_at(purpose, ext, unix_millis())
    }

    /// Path stamped with `unix_millis`. A name already taken in the
    /// directory gets a `-1`, `-2`, ... suffix instead of being overwritten.
    pub fn artifact_path_at(
        &self,
        purpose: &str,
        ext: &str,
        unix_millis: u128,
    ) -> std::io::Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.dir.join(artifact_name(purpose, unix_millis, ext));
        if !path.exists() {
            return Ok(path);
        }
        let stem = format!("{purpose}-{unix_millis}");
        Ok((1u32..)
            .map(|n| self.dir.join(format!("{stem}-{n}.{ext}")))
            .find(|candidate| !candidate.exists())
            .unwrap_or(path))
    }
}

pub fn artifact_name(purpose: &str, unix_millis: u128, ext: &str) -> String {
    format!("{purpose}-{unix_millis}.{ext}")
}

pub fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_name_pattern() {
        assert_eq!(
            artifact_name("face-record", 1_700_000_000_123, "webm"),
            "face-record-1700000000123.webm"
        );
    }

    #[test]
    fn test_same_millisecond_artifacts_do_not_collide() {
        let tmp = tempfile::tempdir().unwrap();
        let downloads = DownloadDirectory::new(tmp.path());
        let first = downloads.artifact_path_at("face-detect-snap", "png", 42).unwrap();
        assert!(first.ends_with("face-detect-snap-42.png"));
        fs::write(&first, b"a").unwrap();

        let second = downloads.artifact_path_at("face-detect-snap", "png", 42).unwrap();
        assert!(second.ends_with("face-detect-snap-42-1.png"));
        fs::write(&second, b"b").unwrap();

        let third = downloads.artifact_path_at("face-detect-snap", "png", 42).unwrap();
        assert!(third.ends_with("face-detect-snap-42-2.png"));
        assert_eq!(fs::read(&first).unwrap(), b"a");
    }

    #[test]
    fn test_artifact_path_creates_directory() {
        let tmp = tempfile::tempdir().unwrap();
        let downloads = DownloadDirectory::new(tmp.path().join("nested"));
        let path = downloads.artifact_path("face-detect-snap", "png").unwrap();
        assert!(tmp.path().join("nested").is_dir());
        let name = path.file_name().unwrap().to_string_lossy().into_owned();
        assert!(name.starts_with("face-detect-snap-"));
        assert!(name.ends_with(".png"));
        let stamp = &name["face-detect-snap-".len()..name.len() - ".png".len()];
        assert!(stamp.parse::<u128>().is_ok());
    }
}
