//! Filesystem semantics of the translator against a real SQLite database.

use pathfs_daemon::fs::{Owner, Translator, MAX_FILE_SIZE};
use pathfs_daemon::{Database, FileKind, FsError, StatFs};
use tempfile::TempDir;
use time::{Duration, OffsetDateTime};

const OWNER: Owner = Owner { uid: 1000, gid: 1000 };

async fn setup() -> (Translator, TempDir) {
    let temp_dir = TempDir::new().unwrap();
    let db = Database::new(temp_dir.path().join("files.db")).await.unwrap();
    let translator = Translator::new(db, OWNER).await.unwrap();
    (translator, temp_dir)
}

async fn file_with(translator: &Translator, path: &str, data: &[u8]) {
    translator.mknod(path, 0o644, 0).await.unwrap();
    translator.write(path, data, 0).await.unwrap();
}

async fn contents(translator: &Translator, path: &str) -> Vec<u8> {
    translator.read(path, 1 << 20, 0).await.unwrap()
}

fn names(entries: &[pathfs_daemon::DirEntry]) -> Vec<&str> {
    entries.iter().map(|e| e.name.as_str()).collect()
}

#[tokio::test]
async fn test_root_exists_after_init() {
    let (translator, _dir) = setup().await;

    let root = translator.getattr("/").await.unwrap();
    assert_eq!(root.kind, FileKind::Directory);
    assert_eq!(root.permissions(), 0o755);
    assert_eq!(root.nlink, 2);
    assert_eq!((root.uid, root.gid), (1000, 1000));
}

#[tokio::test]
async fn test_reinit_keeps_existing_root() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("files.db");

    let first = Translator::new(Database::new(&path).await.unwrap(), OWNER)
        .await
        .unwrap();
    first.mkdir("/docs", 0o755).await.unwrap();
    first.database().close().await;

    let second = Translator::new(Database::new(&path).await.unwrap(), OWNER)
        .await
        .unwrap();
    assert_eq!(second.getattr("/").await.unwrap().nlink, 3);
    assert!(second.getattr("/docs").await.is_ok());
}

#[tokio::test]
async fn test_duplicate_create_fails_without_mutation() {
    let (translator, _dir) = setup().await;
    file_with(&translator, "/a.txt", b"original").await;

    let err = translator.mknod("/a.txt", 0o600, 0).await.unwrap_err();
    assert!(matches!(err, FsError::AlreadyExists(_)));
    assert_eq!(err.errno(), libc::EEXIST);

    let record = translator.getattr("/a.txt").await.unwrap();
    assert_eq!(record.permissions(), 0o644);
    assert_eq!(contents(&translator, "/a.txt").await, b"original");

    let err = translator.mkdir("/a.txt", 0o755).await.unwrap_err();
    assert!(matches!(err, FsError::AlreadyExists(_)));
    assert_eq!(translator.getattr("/").await.unwrap().nlink, 2);
}

#[tokio::test]
async fn test_write_read_round_trip() {
    let (translator, _dir) = setup().await;
    translator.mknod("/f", 0o644, 0).await.unwrap();

    let data = b"some bytes \x00 with a nul";
    assert_eq!(translator.write("/f", data, 0).await.unwrap(), data.len());
    assert_eq!(
        translator.read("/f", data.len(), 0).await.unwrap(),
        data.to_vec()
    );
    assert_eq!(translator.getattr("/f").await.unwrap().size, data.len() as i64);
}

#[tokio::test]
async fn test_overwrite_drops_tail() {
    let (translator, _dir) = setup().await;
    file_with(&translator, "/f", b"abcdefgh").await;

    translator.write("/f", b"XY", 2).await.unwrap();

    assert_eq!(contents(&translator, "/f").await, b"abXY");
    assert_eq!(translator.getattr("/f").await.unwrap().size, 4);
}

#[tokio::test]
async fn test_write_past_end_zero_fills() {
    let (translator, _dir) = setup().await;
    file_with(&translator, "/f", b"ab").await;

    translator.write("/f", b"Z", 4).await.unwrap();

    assert_eq!(contents(&translator, "/f").await, b"ab\0\0Z");
}

#[tokio::test]
async fn test_write_at_huge_offset_is_rejected() {
    let (translator, _dir) = setup().await;
    file_with(&translator, "/f", b"keep").await;

    for offset in [i64::MAX as u64, u64::MAX, u64::MAX - 1] {
        let err = translator.write("/f", b"x", offset).await.unwrap_err();
        assert!(matches!(err, FsError::FileTooLarge(_)), "offset {offset}: {err}");
        assert_eq!(err.errno(), libc::EFBIG);
    }

    assert_eq!(contents(&translator, "/f").await, b"keep");
    assert_eq!(translator.getattr("/f").await.unwrap().size, 4);
    assert!(translator.read("/f", 10, u64::MAX).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_write_at_size_limit_edge() {
    let (translator, _dir) = setup().await;
    file_with(&translator, "/f", b"ab").await;

    // Ending one byte past the limit is refused
    assert!(matches!(
        translator.write("/f", b"x", MAX_FILE_SIZE).await,
        Err(FsError::FileTooLarge(_))
    ));
    assert!(matches!(
        translator.write("/f", b"xy", MAX_FILE_SIZE - 1).await,
        Err(FsError::FileTooLarge(_))
    ));
    // Even an empty write cannot start past the limit
    assert!(matches!(
        translator.write("/f", b"", MAX_FILE_SIZE + 1).await,
        Err(FsError::FileTooLarge(_))
    ));

    assert_eq!(contents(&translator, "/f").await, b"ab");
}

#[tokio::test]
async fn test_read_is_clamped() {
    let (translator, _dir) = setup().await;
    file_with(&translator, "/f", b"hello").await;

    assert_eq!(translator.read("/f", 100, 3).await.unwrap(), b"lo");
    assert!(translator.read("/f", 10, 99).await.unwrap().is_empty());

    // A file that was never written reads as empty
    translator.mknod("/empty", 0o644, 0).await.unwrap();
    assert!(translator.read("/empty", 10, 0).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_read_missing_and_directory() {
    let (translator, _dir) = setup().await;
    translator.mkdir("/d", 0o755).await.unwrap();

    assert!(matches!(
        translator.read("/nope", 1, 0).await,
        Err(FsError::NotFound(_))
    ));
    assert!(matches!(
        translator.read("/d", 1, 0).await,
        Err(FsError::IsADirectory(_))
    ));
}

#[tokio::test]
async fn test_truncate() {
    let (translator, _dir) = setup().await;
    file_with(&translator, "/f", b"hello world").await;

    translator.truncate("/f", 11).await.unwrap();
    translator.truncate("/f", 50).await.unwrap();
    assert_eq!(contents(&translator, "/f").await, b"hello world");

    translator.truncate("/f", 5).await.unwrap();
    assert_eq!(contents(&translator, "/f").await, b"hello");
    assert_eq!(translator.getattr("/f").await.unwrap().size, 5);

    translator.truncate("/f", 0).await.unwrap();
    assert!(contents(&translator, "/f").await.is_empty());
}

#[tokio::test]
async fn test_mkdir_counts_link_in_parent() {
    let (translator, _dir) = setup().await;
    translator.mkdir("/a", 0o700).await.unwrap();
    let before = translator.getattr("/a").await.unwrap().nlink;

    let created = translator.mkdir("/a/b", 0o700).await.unwrap();

    assert_eq!(translator.getattr("/a").await.unwrap().nlink, before + 1);
    assert_eq!(created.nlink, 2);
    assert_eq!(created.permissions(), 0o755);
}

#[tokio::test]
async fn test_create_requires_directory_parent() {
    let (translator, _dir) = setup().await;
    file_with(&translator, "/file", b"x").await;

    assert!(matches!(
        translator.mknod("/missing/f", 0o644, 0).await,
        Err(FsError::NotFound(_))
    ));
    assert!(matches!(
        translator.mkdir("/file/sub", 0o755).await,
        Err(FsError::NotADirectory(_))
    ));
}

#[tokio::test]
async fn test_mknod_rejects_special_files() {
    let (translator, _dir) = setup().await;

    let err = translator
        .mknod("/fifo", libc::S_IFIFO as u32 | 0o644, 0)
        .await
        .unwrap_err();
    assert!(matches!(err, FsError::Unsupported(_)));
    assert!(translator.getattr("/fifo").await.is_err());
}

#[tokio::test]
async fn test_rmdir() {
    let (translator, _dir) = setup().await;
    translator.mkdir("/a", 0o755).await.unwrap();
    file_with(&translator, "/a/f", b"x").await;
    assert_eq!(translator.getattr("/").await.unwrap().nlink, 3);

    assert!(matches!(
        translator.rmdir("/a").await,
        Err(FsError::NotEmpty(_))
    ));
    assert!(matches!(
        translator.rmdir("/a/f").await,
        Err(FsError::NotADirectory(_))
    ));
    assert!(matches!(translator.rmdir("/").await, Err(FsError::Busy(_))));

    translator.unlink("/a/f").await.unwrap();
    translator.rmdir("/a").await.unwrap();

    assert!(matches!(
        translator.getattr("/a").await,
        Err(FsError::NotFound(_))
    ));
    assert_eq!(translator.getattr("/").await.unwrap().nlink, 2);
}

#[tokio::test]
async fn test_unlink() {
    let (translator, _dir) = setup().await;
    translator.mkdir("/d", 0o755).await.unwrap();

    let err = translator.unlink("/nope").await.unwrap_err();
    assert_eq!(err.errno(), libc::ENOENT);
    assert!(matches!(
        translator.unlink("/d").await,
        Err(FsError::IsADirectory(_))
    ));

    file_with(&translator, "/f", b"x").await;
    translator.unlink("/f").await.unwrap();
    assert!(translator.getattr("/f").await.is_err());
}

#[tokio::test]
async fn test_rename_preserves_attributes() {
    let (translator, _dir) = setup().await;
    file_with(&translator, "/old", b"payload").await;
    translator.chmod("/old", 0o600).await.unwrap();
    let before = translator.getattr("/old").await.unwrap();

    translator.rename("/old", "/new").await.unwrap();

    let after = translator.getattr("/new").await.unwrap();
    assert_eq!(after.id, before.id);
    assert_eq!(after.mode, before.mode);
    assert_eq!(after.size, before.size);
    assert_eq!(after.mtime, before.mtime);
    assert_eq!(after.created_at, before.created_at);
    assert_eq!(contents(&translator, "/new").await, b"payload");
    assert!(matches!(
        translator.getattr("/old").await,
        Err(FsError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_rename_directory_moves_subtree_and_links() {
    let (translator, _dir) = setup().await;
    translator.mkdir("/src", 0o755).await.unwrap();
    translator.mkdir("/dst", 0o755).await.unwrap();
    translator.mkdir("/src/sub", 0o755).await.unwrap();
    file_with(&translator, "/src/sub/f", b"deep").await;

    translator.rename("/src/sub", "/dst/sub").await.unwrap();

    assert_eq!(contents(&translator, "/dst/sub/f").await, b"deep");
    assert!(translator.getattr("/src/sub/f").await.is_err());
    assert_eq!(translator.getattr("/src").await.unwrap().nlink, 2);
    assert_eq!(translator.getattr("/dst").await.unwrap().nlink, 3);
}

#[tokio::test]
async fn test_rename_errors() {
    let (translator, _dir) = setup().await;
    translator.mkdir("/a", 0o755).await.unwrap();
    file_with(&translator, "/b", b"b").await;

    assert!(matches!(
        translator.rename("/missing", "/x").await,
        Err(FsError::NotFound(_))
    ));
    assert!(matches!(
        translator.rename("/a", "/b").await,
        Err(FsError::AlreadyExists(_))
    ));
    assert!(matches!(
        translator.rename("/a", "/a/inside").await,
        Err(FsError::InvalidArgument(_))
    ));
    assert!(matches!(
        translator.rename("/", "/x").await,
        Err(FsError::Busy(_))
    ));

    // Failed renames leave both sides intact
    assert!(translator.getattr("/a").await.unwrap().is_dir());
    assert_eq!(contents(&translator, "/b").await, b"b");
}

#[tokio::test]
async fn test_end_to_end_docs_scenario() {
    let (translator, _dir) = setup().await;

    translator.mkdir("/docs", 0o755).await.unwrap();
    let (_, fh) = translator.create("/docs/a.txt", 0o644, libc::O_WRONLY).await.unwrap();
    translator.write("/docs/a.txt", b"hello", 0).await.unwrap();
    translator.write("/docs/a.txt", b" world", 5).await.unwrap();
    translator.release("/docs/a.txt", fh).unwrap();

    assert_eq!(
        translator.read("/docs/a.txt", 11, 0).await.unwrap(),
        b"hello world"
    );
    let entries = translator.readdir("/docs").await.unwrap();
    assert!(names(&entries).contains(&"a.txt"));
}

#[tokio::test]
async fn test_readdir_lists_immediate_children_only() {
    let (translator, _dir) = setup().await;
    translator.mkdir("/docs", 0o755).await.unwrap();
    translator.mkdir("/docs/sub", 0o755).await.unwrap();
    file_with(&translator, "/docs/a.txt", b"a").await;
    file_with(&translator, "/docs/sub/deep.txt", b"d").await;
    file_with(&translator, "/docsy", b"sibling").await;

    let entries = translator.readdir("/docs").await.unwrap();
    let mut listed = names(&entries);
    listed.sort_unstable();
    assert_eq!(listed, vec![".", "..", "a.txt", "sub"]);

    let sub = entries.iter().find(|e| e.name == "sub").unwrap();
    assert_eq!(sub.kind, FileKind::Directory);
    assert_eq!(sub.path, "/docs/sub");

    assert!(matches!(
        translator.readdir("/docs/a.txt").await,
        Err(FsError::NotADirectory(_))
    ));
}

#[tokio::test]
async fn test_chmod_keeps_file_type() {
    let (translator, _dir) = setup().await;
    translator.mkdir("/d", 0o755).await.unwrap();

    translator.chmod("/d", 0o100700).await.unwrap();

    let record = translator.getattr("/d").await.unwrap();
    assert!(record.is_dir());
    assert_eq!(record.permissions(), 0o700);
}

#[tokio::test]
async fn test_chown_partial_and_missing() {
    let (translator, _dir) = setup().await;
    file_with(&translator, "/f", b"x").await;

    translator.chown("/f", Some(42), None).await.unwrap();
    let record = translator.getattr("/f").await.unwrap();
    assert_eq!((record.uid, record.gid), (42, 1000));

    translator.chown("/missing", Some(1), Some(1)).await.unwrap();
}

#[tokio::test]
async fn test_utimens() {
    let (translator, _dir) = setup().await;
    file_with(&translator, "/f", b"x").await;

    let atime = OffsetDateTime::UNIX_EPOCH + Duration::days(1);
    let mtime = OffsetDateTime::UNIX_EPOCH + Duration::days(2);
    translator.utimens("/f", Some((atime, mtime))).await.unwrap();

    let record = translator.getattr("/f").await.unwrap();
    assert_eq!(record.atime, atime);
    assert_eq!(record.mtime, mtime);

    translator.utimens("/f", None).await.unwrap();
    assert!(translator.getattr("/f").await.unwrap().mtime > mtime);

    translator.utimens("/missing", None).await.unwrap();
}

#[tokio::test]
async fn test_symlink_and_readlink() {
    let (translator, _dir) = setup().await;
    translator.mkdir("/docs", 0o755).await.unwrap();
    file_with(&translator, "/docs/a.txt", b"a").await;

    let link = translator.symlink("/docs/link", "a.txt").await.unwrap();
    assert_eq!(link.kind, FileKind::Symlink);
    assert_eq!(link.permissions(), 0o777);
    assert_eq!(translator.readlink("/docs/link").await.unwrap(), "a.txt");

    assert!(matches!(
        translator.symlink("/docs/dangling", "nope.txt").await,
        Err(FsError::NotFound(_))
    ));
    assert!(matches!(
        translator.readlink("/docs/a.txt").await,
        Err(FsError::InvalidArgument(_))
    ));
}

#[tokio::test]
async fn test_hard_link_snapshots_target() {
    let (translator, _dir) = setup().await;
    file_with(&translator, "/orig", b"shared").await;
    translator.chmod("/orig", 0o640).await.unwrap();

    let link = translator.link("/copy", "/orig").await.unwrap();
    assert_eq!(link.kind, FileKind::Hardlink);
    assert_eq!(link.permissions(), 0o640);
    assert_eq!(contents(&translator, "/copy").await, b"shared");

    // Each record reads and writes its own content
    translator.write("/copy", b"changed", 0).await.unwrap();
    assert_eq!(contents(&translator, "/orig").await, b"shared");

    translator.mkdir("/d", 0o755).await.unwrap();
    assert!(matches!(
        translator.link("/dlink", "/d").await,
        Err(FsError::NotPermitted(_))
    ));
}

#[tokio::test]
async fn test_handles_follow_renames() {
    let (translator, _dir) = setup().await;
    file_with(&translator, "/f", b"x").await;

    let fh = translator.open("/f", libc::O_RDONLY).await.unwrap();
    assert_eq!(translator.handle_path(fh).unwrap(), "/f");

    translator.rename("/f", "/g").await.unwrap();
    assert_eq!(translator.handle_path(fh).unwrap(), "/g");

    translator.release("/g", fh).unwrap();
    assert!(matches!(
        translator.handle_path(fh),
        Err(FsError::BadHandle(h)) if h == fh
    ));
    translator.release("/g", fh).unwrap();

    assert!(matches!(
        translator.open("/missing", 0).await,
        Err(FsError::NotFound(_))
    ));
}

#[tokio::test]
async fn test_handle_after_unlink() {
    let (translator, _dir) = setup().await;
    file_with(&translator, "/f", b"data").await;

    let fh = translator.open("/f", libc::O_RDWR).await.unwrap();
    translator.unlink("/f").await.unwrap();

    // The handle still names the path, but the record behind it is gone
    let path = translator.handle_path(fh).unwrap();
    assert_eq!(path, "/f");

    let err = translator.read(&path, 4, 0).await.unwrap_err();
    assert!(matches!(err, FsError::NotFound(_)));
    assert_eq!(err.errno(), libc::ENOENT);

    let err = translator.write(&path, b"more", 0).await.unwrap_err();
    assert!(matches!(err, FsError::NotFound(_)));
    assert_eq!(err.errno(), libc::ENOENT);

    // Nothing was recreated by the write
    assert!(translator.getattr("/f").await.is_err());
    translator.release(&path, fh).unwrap();
}

#[tokio::test]
async fn test_access() {
    let (translator, _dir) = setup().await;
    file_with(&translator, "/f", b"x").await;

    translator.access("/f", libc::R_OK).await.unwrap();
    let err = translator.access("/missing", libc::F_OK).await.unwrap_err();
    assert_eq!(err.errno(), libc::EACCES);
}

#[tokio::test]
async fn test_statfs_and_sync_calls() {
    let (translator, _dir) = setup().await;

    assert_eq!(translator.statfs("/"), StatFs::FIXED);
    assert_eq!(translator.statfs("/").name_max, 255);
    translator.flush("/", 1).unwrap();
    translator.fsync("/", true, 1).unwrap();
}
