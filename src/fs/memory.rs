//! In-memory filesystem, used as the per-download staging area.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use tokio::sync::RwLock;

use super::{DirEntry, Filesystem};
use crate::error::Result;

#[derive(Debug, Clone)]
enum Node {
    Dir,
    File(Vec<u8>),
}

/// In-memory [`Filesystem`].
///
/// Nodes live in a sorted map behind a [`RwLock`], so every method works on
/// `&self` and listings come out in path order. Modes are ignored.
#[derive(Debug, Default)]
pub struct MemoryFs {
    nodes: RwLock<BTreeMap<PathBuf, Node>>,
}

impl MemoryFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Paths of every file currently stored.
    pub async fn files(&self) -> Vec<PathBuf> {
        self.nodes
            .read()
            .await
            .iter()
            .filter(|(_, node)| matches!(node, Node::File(_)))
            .map(|(path, _)| path.clone())
            .collect()
    }
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} does not exist", path.display()),
    )
}

fn insert_parents(nodes: &mut BTreeMap<PathBuf, Node>, path: &Path) -> io::Result<()> {
    for ancestor in path.ancestors().skip(1) {
        if ancestor.as_os_str().is_empty() {
            continue;
        }
        match nodes.get(ancestor) {
            Some(Node::File(_)) => {
                return Err(io::Error::new(
                    io::ErrorKind::AlreadyExists,
                    format!("{} is a file", ancestor.display()),
                ));
            }
            Some(Node::Dir) => {}
            None => {
                nodes.insert(ancestor.to_path_buf(), Node::Dir);
            }
        }
    }
    Ok(())
}

#[async_trait]
impl Filesystem for MemoryFs {
    fn name(&self) -> &str {
        "memory"
    }

    async fn exists(&self, path: &Path) -> Result<bool> {
        Ok(self.nodes.read().await.contains_key(path))
    }

    async fn is_dir(&self, path: &Path) -> Result<bool> {
        Ok(matches!(self.nodes.read().await.get(path), Some(Node::Dir)))
    }

    async fn create_dir_all(&self, path: &Path, _mode: u32) -> Result<()> {
        let mut nodes = self.nodes.write().await;
        insert_parents(&mut nodes, path)?;
        match nodes.get(path) {
            Some(Node::File(_)) => Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("{} is a file", path.display()),
            )
            .into()),
            _ => {
                nodes.insert(path.to_path_buf(), Node::Dir);
                Ok(())
            }
        }
    }

    async fn write(&self, path: &Path, data: &[u8], _mode: u32) -> Result<()> {
        let mut nodes = self.nodes.write().await;
        insert_parents(&mut nodes, path)?;
        if matches!(nodes.get(path), Some(Node::Dir)) {
            return Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("{} is a directory", path.display()),
            )
            .into());
        }
        nodes.insert(path.to_path_buf(), Node::File(data.to_vec()));
        Ok(())
    }

    async fn read(&self, path: &Path) -> Result<Vec<u8>> {
        match self.nodes.read().await.get(path) {
            Some(Node::File(data)) => Ok(data.clone()),
            Some(Node::Dir) => Err(io::Error::new(
                io::ErrorKind::IsADirectory,
                format!("{} is a directory", path.display()),
            )
            .into()),
            None => Err(not_found(path).into()),
        }
    }

    async fn read_dir(&self, path: &Path) -> Result<Vec<DirEntry>> {
        let nodes = self.nodes.read().await;
        if !matches!(nodes.get(path), Some(Node::Dir)) {
            return Err(not_found(path).into());
        }

        Ok(nodes
            .range(path.to_path_buf()..)
            .take_while(|(child, _)| child.starts_with(path))
            .filter(|(child, _)| child.parent() == Some(path))
            .map(|(child, node)| DirEntry {
                path: child.clone(),
                is_dir: matches!(node, Node::Dir),
            })
            .collect())
    }

    async fn remove(&self, path: &Path) -> Result<()> {
        let mut nodes = self.nodes.write().await;
        if !nodes.contains_key(path) {
            return Err(not_found(path).into());
        }
        nodes.retain(|node, _| !node.starts_with(path));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_write_creates_parents() {
        let fs = MemoryFs::new();
        fs.write(Path::new("/a/b/c.txt"), b"data", 0o644).await.unwrap();

        assert!(fs.is_dir(Path::new("/a/b")).await.unwrap());
        assert!(fs.is_dir(Path::new("/a")).await.unwrap());
        assert_eq!(fs.read(Path::new("/a/b/c.txt")).await.unwrap(), b"data");
        assert_eq!(fs.files().await, vec![PathBuf::from("/a/b/c.txt")]);
    }

    #[tokio::test]
    async fn test_read_dir_lists_direct_children() {
        let fs = MemoryFs::new();
        fs.write(Path::new("/lib/x/0001.png"), b"1", 0o644).await.unwrap();
        fs.write(Path::new("/lib/x/0002.png"), b"2", 0o644).await.unwrap();
        fs.write(Path::new("/lib/y.cbz"), b"3", 0o644).await.unwrap();

        let entries = fs.read_dir(Path::new("/lib")).await.unwrap();
        assert_eq!(
            entries,
            vec![
                DirEntry { path: PathBuf::from("/lib/x"), is_dir: true },
                DirEntry { path: PathBuf::from("/lib/y.cbz"), is_dir: false },
            ]
        );
    }

    #[tokio::test]
    async fn test_remove_directory_recursively() {
        let fs = MemoryFs::new();
        fs.write(Path::new("/lib/x/0001.png"), b"1", 0o644).await.unwrap();
        fs.write(Path::new("/lib/xy.png"), b"2", 0o644).await.unwrap();

        fs.remove(Path::new("/lib/x")).await.unwrap();
        assert!(!fs.exists(Path::new("/lib/x/0001.png")).await.unwrap());
        assert!(fs.exists(Path::new("/lib/xy.png")).await.unwrap());

        assert!(fs.remove(Path::new("/lib/x")).await.is_err());
    }

    #[tokio::test]
    async fn test_read_not_found() {
        let fs = MemoryFs::new();
        let err = fs.read(Path::new("missing.txt")).await.unwrap_err();
        assert!(matches!(err, crate::Error::Io(ref e) if e.kind() == io::ErrorKind::NotFound));
    }
}
