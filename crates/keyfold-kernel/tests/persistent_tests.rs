//! End-to-end scenarios against the persistent stack: a local object
//! directory plus a SQLite metadata database, both in a temp dir.

use std::path::Path;

use bytes::Bytes;
use keyfold_kernel::config::{MetadataConfig, StorageConfig};
use keyfold_kernel::path::decode;
use keyfold_kernel::{
    CleanupOutcome, DeletedEntry, ErrorKind, KernelConfig, ListOptions, OwnerId, SortField,
    SortSpec, Vfs,
};

fn config(dir: &Path) -> KernelConfig {
    KernelConfig {
        storage: StorageConfig::Local {
            root: dir.join("objects"),
        },
        metadata: MetadataConfig::Sqlite {
            path: dir.join("metadata.db"),
        },
        public_base_url: Some("https://files.test/".into()),
        list_page_size: 2,
        ..KernelConfig::persistent()
    }
}

fn owner(id: &str) -> OwnerId {
    OwnerId::new(id).expect("valid owner")
}

#[tokio::test]
async fn docs_scenario_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let u1 = owner("u1");

    {
        let vfs = Vfs::open(&config(dir.path())).unwrap();
        for name in ["a.txt", "b.txt"] {
            let record = vfs
                .upload(&u1, "docs/", name, Bytes::from(format!("body of {name}")))
                .await
                .unwrap();
            assert_eq!(record.url, format!("https://files.test/u1/docs/{name}"));
        }
        vfs.create_folder(&u1, "docs/", "sub").await.unwrap();
    }

    let vfs = Vfs::open(&config(dir.path())).unwrap();
    assert_eq!(vfs.list_files(&u1, "docs/").await.unwrap(), vec!["a.txt", "b.txt"]);
    assert_eq!(vfs.list_folders(&u1, "docs/").await.unwrap(), vec!["sub"]);

    let deleted = vfs.delete_entry(&u1, "docs/", "a.txt").await.unwrap();
    match deleted {
        DeletedEntry::File { record } => assert_eq!(record.filename, "a.txt"),
        other => panic!("expected file, got {other:?}"),
    }
    assert_eq!(vfs.list_files(&u1, "docs/").await.unwrap(), vec!["b.txt"]);

    let report = vfs.empty_directory(&u1, "docs/").await.unwrap();
    assert!(report.is_clean());
    let outcomes: Vec<_> = report.records.iter().map(|r| r.outcome.clone()).collect();
    assert!(matches!(outcomes[0], CleanupOutcome::Removed { .. }));
    assert_eq!(outcomes[1], CleanupOutcome::Marker);

    assert_eq!(
        vfs.list_files(&u1, "docs/").await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert_eq!(
        vfs.list_folders(&u1, "docs/").await.unwrap_err().kind(),
        ErrorKind::NotFound
    );
    assert!(vfs.list_owner_files(&u1, &ListOptions::default()).await.unwrap().is_empty());
}

#[tokio::test]
async fn transport_directories_decode_to_nested_paths() {
    let dir = tempfile::tempdir().unwrap();
    let vfs = Vfs::open(&config(dir.path())).unwrap();
    let u1 = owner("u1");

    let directory = decode("test1%test1-1%");
    vfs.upload(&u1, &directory, "deep.txt", Bytes::from_static(b"x"))
        .await
        .unwrap();

    assert_eq!(vfs.list_folders(&u1, "").await.unwrap(), vec!["test1"]);
    assert_eq!(vfs.list_folders(&u1, "test1/").await.unwrap(), vec!["test1-1"]);
    assert_eq!(
        vfs.file_link(&u1, "test1/test1-1/", "deep.txt").await.unwrap(),
        "https://files.test/u1/test1/test1-1/deep.txt"
    );
}

#[tokio::test]
async fn owner_listing_sorts_and_paginates() {
    let dir = tempfile::tempdir().unwrap();
    let vfs = Vfs::open(&config(dir.path())).unwrap();
    let u1 = owner("u1");
    for name in ["b.txt", "c.txt", "a.txt", "d.txt"] {
        vfs.upload(&u1, "", name, Bytes::from_static(b"x")).await.unwrap();
    }
    vfs.upload(&owner("u2"), "", "z.txt", Bytes::from_static(b"x"))
        .await
        .unwrap();

    let sort: SortSpec = "filename:asc".parse().unwrap();
    let page = vfs
        .list_owner_files(&u1, &ListOptions::default().sorted(sort).page(2, 1))
        .await
        .unwrap();
    let names: Vec<_> = page.iter().map(|r| r.filename.as_str()).collect();
    assert_eq!(names, vec!["b.txt", "c.txt"]);

    let newest = vfs
        .list_owner_files(
            &u1,
            &ListOptions::default().sorted(SortSpec::desc(SortField::CreatedAt)).page(1, 0),
        )
        .await
        .unwrap();
    assert_eq!(newest[0].filename, "d.txt");
}

#[tokio::test]
async fn remove_owner_leaves_neighbours_alone() {
    let dir = tempfile::tempdir().unwrap();
    let vfs = Vfs::open(&config(dir.path())).unwrap();
    let (u1, u10) = (owner("u1"), owner("u10"));
    for o in [&u1, &u10] {
        vfs.upload(o, "docs/", "a.txt", Bytes::from_static(b"x"))
            .await
            .unwrap();
        vfs.create_folder(o, "", "empty").await.unwrap();
    }

    let removal = vfs.remove_owner(&u1).await.unwrap();
    assert_eq!(removal.sweep.map(|s| s.deleted_keys.len()), Some(2));

    assert!(vfs.list_files(&u1, "").await.unwrap().is_empty());
    assert!(vfs.find_orphans(&u1).await.unwrap().is_empty());
    assert_eq!(vfs.list_files(&u10, "docs/").await.unwrap(), vec!["a.txt"]);
    assert_eq!(vfs.list_folders(&u10, "").await.unwrap(), vec!["docs", "empty"]);
}

#[tokio::test]
async fn oversized_upload_is_refused() {
    let dir = tempfile::tempdir().unwrap();
    let config = KernelConfig {
        max_upload_bytes: 8,
        ..config(dir.path())
    };
    let vfs = Vfs::open(&config).unwrap();
    let err = vfs
        .upload(&owner("u1"), "", "big.bin", Bytes::from(vec![0u8; 9]))
        .await
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Invalid);
}
