//! Virtual filesystem backend
//!
//! Filesystem housekeeping over two schemes: plain paths / `file://`
//! map to the local filesystem, `mem://` to an engine-held in-memory
//! tree. Remote object stores are recognized scheme names but not
//! backed here; operations on them fail with an explicit error.

use std::fs;
use std::path::PathBuf;

use dashmap::DashMap;

use tessera_core::{Error, Filesystem, Result};

/// Schemes with a working backend in this engine
pub const SUPPORTED_FILESYSTEMS: [Filesystem; 1] = [Filesystem::Mem];

/// True when the engine can actually serve `fs`
pub fn is_supported(fs: Filesystem) -> bool {
    SUPPORTED_FILESYSTEMS.contains(&fs)
}

#[derive(Debug, Clone, PartialEq)]
enum MemEntry {
    File(Vec<u8>),
    Dir,
}

enum Resolved {
    Local(PathBuf),
    Mem(String),
}

/// VFS over the local filesystem and the in-memory scheme
#[derive(Default)]
pub struct VfsBackend {
    mem: DashMap<String, MemEntry>,
}

impl VfsBackend {
    /// Fresh backend with an empty in-memory tree
    pub fn new() -> VfsBackend {
        VfsBackend::default()
    }

    fn resolve(&self, uri: &str) -> Result<Resolved> {
        if let Some(path) = uri.strip_prefix("file://") {
            return Ok(Resolved::Local(PathBuf::from(path)));
        }
        if uri.starts_with("mem://") {
            return Ok(Resolved::Mem(uri.trim_end_matches('/').to_string()));
        }
        if let Some((scheme, _)) = uri.split_once("://") {
            return Err(Error::InvalidParameter(format!(
                "unsupported filesystem scheme '{scheme}://'"
            )));
        }
        Ok(Resolved::Local(PathBuf::from(uri)))
    }

    /// Create an empty file, truncating an existing one
    pub fn touch(&self, uri: &str) -> Result<()> {
        match self.resolve(uri)? {
            Resolved::Local(path) => {
                fs::File::create(path)?;
            }
            Resolved::Mem(key) => {
                self.mem.insert(key, MemEntry::File(Vec::new()));
            }
        }
        Ok(())
    }

    /// Write a whole file
    pub fn write_file(&self, uri: &str, contents: &[u8]) -> Result<()> {
        match self.resolve(uri)? {
            Resolved::Local(path) => fs::write(path, contents)?,
            Resolved::Mem(key) => {
                self.mem.insert(key, MemEntry::File(contents.to_vec()));
            }
        }
        Ok(())
    }

    /// Read a whole file
    pub fn read_file(&self, uri: &str) -> Result<Vec<u8>> {
        match self.resolve(uri)? {
            Resolved::Local(path) => Ok(fs::read(path)?),
            Resolved::Mem(key) => match self.mem.get(&key).map(|e| e.value().clone()) {
                Some(MemEntry::File(data)) => Ok(data),
                _ => Err(Error::NotFound(format!("file '{uri}'"))),
            },
        }
    }

    /// True when `uri` names a file
    pub fn is_file(&self, uri: &str) -> Result<bool> {
        Ok(match self.resolve(uri)? {
            Resolved::Local(path) => path.is_file(),
            Resolved::Mem(key) => matches!(self.mem.get(&key).map(|e| e.value().clone()), Some(MemEntry::File(_))),
        })
    }

    /// True when `uri` names a directory
    pub fn is_dir(&self, uri: &str) -> Result<bool> {
        Ok(match self.resolve(uri)? {
            Resolved::Local(path) => path.is_dir(),
            Resolved::Mem(key) => {
                matches!(self.mem.get(&key).map(|e| e.value().clone()), Some(MemEntry::Dir))
                    || self
                        .mem
                        .iter()
                        .any(|e| e.key().starts_with(&format!("{key}/")))
            }
        })
    }

    /// Size of a file in bytes
    pub fn file_size(&self, uri: &str) -> Result<u64> {
        match self.resolve(uri)? {
            Resolved::Local(path) => Ok(fs::metadata(path)?.len()),
            Resolved::Mem(key) => match self.mem.get(&key).map(|e| e.value().clone()) {
                Some(MemEntry::File(data)) => Ok(data.len() as u64),
                _ => Err(Error::NotFound(format!("file '{uri}'"))),
            },
        }
    }

    /// Create a directory, parents included
    pub fn create_dir(&self, uri: &str) -> Result<()> {
        match self.resolve(uri)? {
            Resolved::Local(path) => fs::create_dir_all(path)?,
            Resolved::Mem(key) => {
                self.mem.insert(key, MemEntry::Dir);
            }
        }
        Ok(())
    }

    /// Remove a directory and everything beneath it
    pub fn remove_dir(&self, uri: &str) -> Result<()> {
        match self.resolve(uri)? {
            Resolved::Local(path) => fs::remove_dir_all(path)?,
            Resolved::Mem(key) => {
                let prefix = format!("{key}/");
                self.mem.retain(|k, _| k != &key && !k.starts_with(&prefix));
            }
        }
        Ok(())
    }

    /// Remove a file
    pub fn remove_file(&self, uri: &str) -> Result<()> {
        match self.resolve(uri)? {
            Resolved::Local(path) => fs::remove_file(path)?,
            Resolved::Mem(key) => {
                match self.mem.remove(&key) {
                    Some((_, MemEntry::File(_))) => {}
                    Some((k, entry)) => {
                        // Put a non-file entry back untouched.
                        self.mem.insert(k, entry);
                        return Err(Error::InvalidParameter(format!("'{uri}' is not a file")));
                    }
                    None => return Err(Error::NotFound(format!("file '{uri}'"))),
                }
            }
        }
        Ok(())
    }

    /// Direct children of a directory
    pub fn ls(&self, uri: &str) -> Result<Vec<String>> {
        match self.resolve(uri)? {
            Resolved::Local(path) => {
                let mut out = Vec::new();
                for entry in fs::read_dir(path)? {
                    out.push(entry?.path().to_string_lossy().into_owned());
                }
                out.sort();
                Ok(out)
            }
            Resolved::Mem(key) => {
                let prefix = format!("{key}/");
                let mut out: Vec<String> = self
                    .mem
                    .iter()
                    .filter_map(|e| {
                        let rest = e.key().strip_prefix(&prefix)?;
                        let child = rest.split('/').next()?;
                        Some(format!("{prefix}{child}"))
                    })
                    .collect();
                out.sort();
                out.dedup();
                Ok(out)
            }
        }
    }

    /// Copy a file
    pub fn copy_file(&self, from: &str, to: &str) -> Result<()> {
        let data = self.read_file(from)?;
        self.write_file(to, &data)
    }

    /// Move a file
    pub fn move_file(&self, from: &str, to: &str) -> Result<()> {
        self.copy_file(from, to)?;
        self.remove_file(from)
    }
}
