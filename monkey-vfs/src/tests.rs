#[cfg(test)]
mod unit_tests {
    use crate::MemFs;
    use monkey_core::vfs::FileSystem;
    use proptest::prelude::*;
    use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
    use std::path::Path;

    fn read_all(fs: &MemFs, path: &str) -> Vec<u8> {
        let mut data = Vec::new();
        fs.open(Path::new(path))
            .unwrap()
            .read_to_end(&mut data)
            .unwrap();
        data
    }

    #[test]
    fn test_write_read_and_overwrite() {
        let fs = MemFs::new();
        fs.mkdir_all(Path::new("/db")).unwrap();

        let mut file = fs.create(Path::new("/db/log")).unwrap();
        file.write_all(b"hello world").unwrap();
        assert_eq!(read_all(&fs, "/db/log"), b"hello world");

        file.seek(SeekFrom::Start(6)).unwrap();
        file.write_all(b"there!").unwrap();
        assert_eq!(read_all(&fs, "/db/log"), b"hello there!");
        assert_eq!(file.len().unwrap(), 12);
    }

    #[test]
    fn test_open_missing_file_is_not_found() {
        let fs = MemFs::new();
        let err = fs.open(Path::new("/nope")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_create_requires_parent_directory() {
        let fs = MemFs::new();
        let err = fs.create(Path::new("/missing/file")).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_list_remove_and_rename() {
        let fs = MemFs::new();
        fs.mkdir_all(Path::new("/db/snapshots")).unwrap();
        fs.create(Path::new("/db/b")).unwrap();
        fs.create(Path::new("/db/a")).unwrap();

        assert_eq!(fs.list(Path::new("/db")).unwrap(), vec!["a", "b", "snapshots"]);

        fs.rename(Path::new("/db/a"), Path::new("/db/snapshots/a")).unwrap();
        assert!(!fs.exists(Path::new("/db/a")));
        assert!(fs.exists(Path::new("/db/snapshots/a")));

        // non-empty directories cannot be removed
        assert!(fs.remove(Path::new("/db/snapshots")).is_err());
        fs.remove(Path::new("/db/snapshots/a")).unwrap();
        fs.remove(Path::new("/db/snapshots")).unwrap();
        assert_eq!(fs.list(Path::new("/db")).unwrap(), vec!["b"]);
    }

    #[test]
    fn test_reset_drops_unsynced_writes() {
        let fs = MemFs::new();
        fs.mkdir_all(Path::new("/db")).unwrap();

        let mut synced = fs.create(Path::new("/db/synced")).unwrap();
        synced.write_all(b"durable").unwrap();
        synced.sync().unwrap();
        synced.write_all(b" and lost").unwrap();

        let mut never = fs.create(Path::new("/db/never")).unwrap();
        never.write_all(b"gone").unwrap();

        fs.reset_to_synced_state();

        assert_eq!(read_all(&fs, "/db/synced"), b"durable");
        assert!(!fs.exists(Path::new("/db/never")));
        assert!(fs.exists(Path::new("/db")));
    }

    #[test]
    fn test_clones_share_state_and_clear_resets() {
        let fs = MemFs::new();
        let other = fs.clone();
        other.mkdir_all(Path::new("/x")).unwrap();
        assert!(fs.exists(Path::new("/x")));

        fs.clear();
        assert!(!other.exists(Path::new("/x")));
    }

    proptest! {
        #[test]
        fn prop_chunked_writes_read_back(chunks in proptest::collection::vec(
            proptest::collection::vec(any::<u8>(), 0..64), 0..16)) {
            let fs = MemFs::new();
            let mut file = fs.create(Path::new("/f")).unwrap();
            let mut expected = Vec::new();
            for chunk in &chunks {
                file.write_all(chunk).unwrap();
                expected.extend_from_slice(chunk);
            }
            prop_assert_eq!(read_all(&fs, "/f"), expected);
        }
    }
}
