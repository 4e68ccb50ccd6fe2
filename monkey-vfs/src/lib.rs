//! # Monkey VFS
//!
//! In-memory substitute for the storage abstraction of the system under test.
//!
//! Tests hand a [`MemFs`] to a system instance at construction time so it
//! runs without touching physical disk and starts from a deterministic, empty
//! state on every run.
//!
//! ## Example
//!
//! ```rust
//! use monkey_vfs::get_test_fs;
//! use std::io::{Read, Write};
//! use std::path::Path;
//!
//! let fs = get_test_fs();
//! fs.mkdir_all(Path::new("/data")).unwrap();
//! let mut file = fs.create(Path::new("/data/state")).unwrap();
//! file.write_all(b"hello world").unwrap();
//! file.sync().unwrap();
//!
//! let mut content = String::new();
//! fs.open(Path::new("/data/state"))
//!     .unwrap()
//!     .read_to_string(&mut content)
//!     .unwrap();
//! assert_eq!(content, "hello world");
//! ```

pub mod mem_fs;
mod tests;

pub use mem_fs::MemFs;

use monkey_core::vfs::FileSystem;
use std::sync::Arc;

/// Returns a fresh file system instance intended for tests.
///
/// User applications can usually ignore this; it exists so a test driver can
/// swap the storage of a system instance for an in-memory one.
pub fn get_test_fs() -> Arc<dyn FileSystem> {
    Arc::new(MemFs::new())
}
