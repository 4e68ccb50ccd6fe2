//! Storage abstraction the system under test performs its file I/O through.
//!
//! Errors follow `std::fs` conventions (`io::ErrorKind::NotFound` and so on)
//! so a disk-backed and an in-memory implementation are interchangeable.

use std::fmt::Debug;
use std::io::{self, Read, Seek, Write};
use std::path::Path;

/// An open file handle.
pub trait File: Read + Write + Seek + Send + Debug {
    /// Makes everything written so far durable.
    fn sync(&mut self) -> io::Result<()>;

    fn len(&self) -> io::Result<u64>;

    fn is_empty(&self) -> io::Result<bool> {
        Ok(self.len()? == 0)
    }
}

pub trait FileSystem: Send + Sync + Debug {
    /// Creates a file, truncating it if it exists.
    fn create(&self, path: &Path) -> io::Result<Box<dyn File>>;

    /// Opens an existing file for reading and writing.
    fn open(&self, path: &Path) -> io::Result<Box<dyn File>>;

    fn remove(&self, path: &Path) -> io::Result<()>;

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    fn mkdir_all(&self, dir: &Path) -> io::Result<()>;

    /// Names of the direct children of `dir`, sorted.
    fn list(&self, dir: &Path) -> io::Result<Vec<String>>;

    fn exists(&self, path: &Path) -> bool;
}
