//! Virtual filesystem handle
//!
//! Filesystem housekeeping through the context's engine: local paths
//! (plain or `file://`) and the in-memory `mem://` scheme. OS failures
//! surface as [`Error::Io`]; unsupported schemes as
//! [`Error::InvalidParameter`].
//!
//! [`Error::Io`]: tessera_core::Error::Io
//! [`Error::InvalidParameter`]: tessera_core::Error::InvalidParameter

use tessera_core::Result;

use crate::context::Context;

/// Filesystem operations bound to a context
pub struct Vfs {
    context: Context,
}

impl Vfs {
    /// VFS over the context's engine
    pub fn new(context: &Context) -> Vfs {
        Vfs {
            context: context.clone(),
        }
    }

    /// Create an empty file, truncating an existing one
    pub fn touch(&self, uri: &str) -> Result<()> {
        self.context.engine().vfs().touch(uri)
    }

    /// Write a whole file
    pub fn write_file(&self, uri: &str, contents: &[u8]) -> Result<()> {
        self.context.engine().vfs().write_file(uri, contents)
    }

    /// Read a whole file
    pub fn read_file(&self, uri: &str) -> Result<Vec<u8>> {
        self.context.engine().vfs().read_file(uri)
    }

    /// True when `uri` names a file
    pub fn is_file(&self, uri: &str) -> Result<bool> {
        self.context.engine().vfs().is_file(uri)
    }

    /// True when `uri` names a directory
    pub fn is_dir(&self, uri: &str) -> Result<bool> {
        self.context.engine().vfs().is_dir(uri)
    }

    /// Size of a file in bytes
    pub fn file_size(&self, uri: &str) -> Result<u64> {
        self.context.engine().vfs().file_size(uri)
    }

    /// Create a directory, parents included
    pub fn create_dir(&self, uri: &str) -> Result<()> {
        self.context.engine().vfs().create_dir(uri)
    }

    /// Remove a directory and everything beneath it
    pub fn remove_dir(&self, uri: &str) -> Result<()> {
        self.context.engine().vfs().remove_dir(uri)
    }

    /// Remove a file
    pub fn remove_file(&self, uri: &str) -> Result<()> {
        self.context.engine().vfs().remove_file(uri)
    }

    /// Direct children of a directory
    pub fn ls(&self, uri: &str) -> Result<Vec<String>> {
        self.context.engine().vfs().ls(uri)
    }

    /// Copy a file
    pub fn copy_file(&self, from: &str, to: &str) -> Result<()> {
        self.context.engine().vfs().copy_file(from, to)
    }

    /// Move a file
    pub fn move_file(&self, from: &str, to: &str) -> Result<()> {
        self.context.engine().vfs().move_file(from, to)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_vfs_through_context() {
        let ctx = Context::new().unwrap();
        let vfs = Vfs::new(&ctx);
        vfs.write_file("mem://data/blob", b"payload").unwrap();
        assert!(vfs.is_file("mem://data/blob").unwrap());
        assert_eq!(vfs.file_size("mem://data/blob").unwrap(), 7);

        // Two VFS handles on one context share the in-memory tree.
        let other = Vfs::new(&ctx);
        assert_eq!(other.read_file("mem://data/blob").unwrap(), b"payload");
    }
}
