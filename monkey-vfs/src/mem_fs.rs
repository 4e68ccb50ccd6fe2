use monkey_core::vfs::{File, FileSystem};
use parking_lot::{Mutex, RwLock};
use std::collections::BTreeMap;
use std::io::{self, Read, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

#[derive(Debug, Default)]
struct FileData {
    data: Vec<u8>,
    synced: Option<Vec<u8>>,
}

#[derive(Debug, Clone)]
enum Node {
    File(Arc<Mutex<FileData>>),
    Dir,
}

/// In-memory file system.
///
/// Nothing survives the process. Every file remembers the contents it had at
/// its last `sync`, which lets [`MemFs::reset_to_synced_state`] emulate a
/// crash. Clones share the same tree.
#[derive(Debug, Clone, Default)]
pub struct MemFs {
    nodes: Arc<RwLock<BTreeMap<PathBuf, Node>>>,
}

impl MemFs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drops every write that was not followed by a sync. Files that were
    /// never synced disappear.
    pub fn reset_to_synced_state(&self) {
        let mut nodes = self.nodes.write();
        nodes.retain(|_, node| match node {
            Node::Dir => true,
            Node::File(file) => {
                let mut file = file.lock();
                match file.synced.clone() {
                    Some(synced) => {
                        file.data = synced;
                        true
                    }
                    None => false,
                }
            }
        });
        debug!("MemFs reset to synced state, {} entries left", nodes.len());
    }

    /// Removes everything.
    pub fn clear(&self) {
        self.nodes.write().clear();
    }

    fn lookup_file(&self, path: &Path) -> io::Result<Arc<Mutex<FileData>>> {
        match self.nodes.read().get(&normalize(path)) {
            Some(Node::File(file)) => Ok(file.clone()),
            Some(Node::Dir) => Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} is a directory", path.display()),
            )),
            None => Err(not_found(path)),
        }
    }
}

fn normalize(path: &Path) -> PathBuf {
    let mut out = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                out.pop();
            }
            other => out.push(other.as_os_str()),
        }
    }
    out
}

fn not_found(path: &Path) -> io::Error {
    io::Error::new(
        io::ErrorKind::NotFound,
        format!("{} does not exist", path.display()),
    )
}

fn parent_exists(nodes: &BTreeMap<PathBuf, Node>, path: &Path) -> bool {
    match path.parent() {
        None => true,
        Some(parent) if parent.as_os_str().is_empty() || parent == Path::new("/") => true,
        Some(parent) => matches!(nodes.get(parent), Some(Node::Dir)),
    }
}

impl FileSystem for MemFs {
    fn create(&self, path: &Path) -> io::Result<Box<dyn File>> {
        let path = normalize(path);
        let mut nodes = self.nodes.write();
        if !parent_exists(&nodes, &path) {
            return Err(not_found(path.parent().unwrap_or(&path)));
        }
        let file = match nodes.get(&path) {
            Some(Node::Dir) => {
                return Err(io::Error::new(
                    io::ErrorKind::Other,
                    format!("{} is a directory", path.display()),
                ))
            }
            Some(Node::File(file)) => {
                // truncation is an unsynced write like any other
                file.lock().data.clear();
                file.clone()
            }
            None => {
                let file = Arc::new(Mutex::new(FileData::default()));
                nodes.insert(path, Node::File(file.clone()));
                file
            }
        };
        Ok(Box::new(MemFile { file, pos: 0 }))
    }

    fn open(&self, path: &Path) -> io::Result<Box<dyn File>> {
        let file = self.lookup_file(path)?;
        Ok(Box::new(MemFile { file, pos: 0 }))
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        let path = normalize(path);
        let mut nodes = self.nodes.write();
        let is_dir = match nodes.get(&path) {
            None => return Err(not_found(&path)),
            Some(node) => matches!(node, Node::Dir),
        };
        if is_dir && nodes.keys().any(|p| p.parent() == Some(path.as_path())) {
            return Err(io::Error::new(
                io::ErrorKind::Other,
                format!("{} is not empty", path.display()),
            ));
        }
        nodes.remove(&path);
        Ok(())
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let (from, to) = (normalize(from), normalize(to));
        let mut nodes = self.nodes.write();
        if !parent_exists(&nodes, &to) {
            return Err(not_found(to.parent().unwrap_or(&to)));
        }
        match nodes.remove(&from) {
            Some(Node::File(file)) => {
                nodes.insert(to, Node::File(file));
                Ok(())
            }
            Some(Node::Dir) => {
                nodes.insert(from, Node::Dir);
                Err(io::Error::new(
                    io::ErrorKind::Other,
                    "renaming directories is not supported",
                ))
            }
            None => Err(not_found(&from)),
        }
    }

    fn mkdir_all(&self, dir: &Path) -> io::Result<()> {
        let dir = normalize(dir);
        let mut nodes = self.nodes.write();
        let mut current = PathBuf::new();
        for component in dir.components() {
            current.push(component.as_os_str());
            if matches!(component, Component::RootDir | Component::Prefix(_)) {
                continue;
            }
            match nodes.get(&current) {
                Some(Node::Dir) => {}
                Some(Node::File(_)) => {
                    return Err(io::Error::new(
                        io::ErrorKind::AlreadyExists,
                        format!("{} is a file", current.display()),
                    ))
                }
                None => {
                    nodes.insert(current.clone(), Node::Dir);
                }
            }
        }
        Ok(())
    }

    fn list(&self, dir: &Path) -> io::Result<Vec<String>> {
        let dir = normalize(dir);
        let nodes = self.nodes.read();
        let is_root = dir.as_os_str().is_empty() || dir == Path::new("/");
        if !is_root && !matches!(nodes.get(&dir), Some(Node::Dir)) {
            return Err(not_found(&dir));
        }
        // BTreeMap iteration keeps the names sorted
        Ok(nodes
            .keys()
            .filter(|p| p.parent() == Some(dir.as_path()))
            .filter_map(|p| p.file_name())
            .map(|name| name.to_string_lossy().into_owned())
            .collect())
    }

    fn exists(&self, path: &Path) -> bool {
        self.nodes.read().contains_key(&normalize(path))
    }
}

#[derive(Debug)]
struct MemFile {
    file: Arc<Mutex<FileData>>,
    pos: u64,
}

impl Read for MemFile {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let file = self.file.lock();
        let start = (self.pos as usize).min(file.data.len());
        let n = buf.len().min(file.data.len() - start);
        buf[..n].copy_from_slice(&file.data[start..start + n]);
        self.pos += n as u64;
        Ok(n)
    }
}

impl Write for MemFile {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let mut file = self.file.lock();
        let start = self.pos as usize;
        if file.data.len() < start {
            file.data.resize(start, 0);
        }
        let overlap = (file.data.len() - start).min(buf.len());
        file.data[start..start + overlap].copy_from_slice(&buf[..overlap]);
        file.data.extend_from_slice(&buf[overlap..]);
        self.pos += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Seek for MemFile {
    fn seek(&mut self, pos: SeekFrom) -> io::Result<u64> {
        let len = self.file.lock().data.len() as i64;
        let target = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(offset) => len + offset,
            SeekFrom::Current(offset) => self.pos as i64 + offset,
        };
        if target < 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "seek before start of file",
            ));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }
}

impl File for MemFile {
    fn sync(&mut self) -> io::Result<()> {
        let mut file = self.file.lock();
        file.synced = Some(file.data.clone());
        Ok(())
    }

    fn len(&self) -> io::Result<u64> {
        Ok(self.file.lock().data.len() as u64)
    }
}
