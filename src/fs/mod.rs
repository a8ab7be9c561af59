//! Filesystem abstraction used by the download pipeline.
//!
//! Every download writes into a fresh [`MemoryFs`] first and only merges the
//! staged tree into the destination [`Filesystem`] once all artifacts were
//! produced. A failed download therefore never leaves partial files behind.
//!
//! # Examples
//!
//! ```
//! use kanko::fs::{Filesystem, MemoryFs, merge_directories};
//! use std::path::Path;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> kanko::Result<()> {
//! let staging = MemoryFs::new();
//! let library = MemoryFs::new();
//!
//! staging.write(Path::new("/library/Berserk/cover.jpg"), b"jpeg", 0o644).await?;
//! merge_directories(&library, Path::new("/library"), &staging, Path::new("/library"), 0o755, 0o644).await?;
//!
//! assert!(library.exists(Path::new("/library/Berserk/cover.jpg")).await?);
//! # Ok(())
//! # }
//! ```

mod local;
mod memory;

pub use self::local::LocalFs;
pub use self::memory::MemoryFs;

use async_trait::async_trait;
use std::path::{Path, PathBuf};

use crate::error::Result;

/// Entry returned by [`Filesystem::read_dir`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirEntry {
    pub path: PathBuf,
    pub is_dir: bool,
}

/// Hierarchical store the pipeline reads from and writes to.
///
/// Modes are unix permission bits; stores without permissions ignore them.
#[async_trait]
pub trait Filesystem: Send + Sync {
    /// Name of the store, for logging only.
    fn name(&self) -> &str;

    /// Returns `true` if a file or directory exists at `path`.
    async fn exists(&self, path: &Path) -> Result<bool>;

    /// Returns `true` if `path` is an existing directory.
    async fn is_dir(&self, path: &Path) -> Result<bool>;

    /// Creates `path` and all of its missing parents.
    async fn create_dir_all(&self, path: &Path, mode: u32) -> Result<()>;

    /// Creates or truncates the file at `path`, creating missing parents.
    async fn write(&self, path: &Path, data: &[u8], mode: u32) -> Result<()>;

    /// Reads the whole file at `path`.
    async fn read(&self, path: &Path) -> Result<Vec<u8>>;

    /// Lists the direct children of the directory at `path`, sorted by path.
    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>>;

    /// Removes the file at `path`, or the directory and everything below it.
    async fn remove(&self, path: &Path) -> Result<()>;
}

/// Copies the tree below `src_dir` on `src` into `dst_dir` on `dst`.
///
/// Directories are created with `mode_dir`, files written with `mode_file`.
/// Files already present in the destination are replaced; everything else
/// in the destination is left untouched.
pub async fn merge_directories(
    dst: &dyn Filesystem,
    dst_dir: &Path,
    src: &dyn Filesystem,
    src_dir: &Path,
    mode_dir: u32,
    mode_file: u32,
) -> Result<()> {
    dst.create_dir_all(dst_dir, mode_dir).await?;

    for entry in src.read_dir(src_dir).await? {
        let Some(name) = entry.path.file_name() else {
            continue;
        };
        let target = dst_dir.join(name);

        if entry.is_dir {
            Box::pin(merge_directories(
                dst,
                &target,
                src,
                &entry.path,
                mode_dir,
                mode_file,
            ))
            .await?;
        } else {
            let data = src.read(&entry.path).await?;
            dst.write(&target, &data, mode_file).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_merge_keeps_existing_files() {
        let staging = MemoryFs::new();
        let library = MemoryFs::new();

        library
            .write(Path::new("/lib/Monster/series.json"), b"old", 0o644)
            .await
            .unwrap();
        staging
            .write(Path::new("/lib/Monster/ch1.cbz"), b"new", 0o644)
            .await
            .unwrap();
        staging
            .create_dir_all(Path::new("/lib/Monster/Vol. 1"), 0o755)
            .await
            .unwrap();

        merge_directories(
            &library,
            Path::new("/lib"),
            &staging,
            Path::new("/lib"),
            0o755,
            0o644,
        )
        .await
        .unwrap();

        assert_eq!(
            library.read(Path::new("/lib/Monster/series.json")).await.unwrap(),
            b"old"
        );
        assert_eq!(
            library.read(Path::new("/lib/Monster/ch1.cbz")).await.unwrap(),
            b"new"
        );
        assert!(library.is_dir(Path::new("/lib/Monster/Vol. 1")).await.unwrap());
    }
}
