//! Integration tests for the in-memory native library

use uplink_runtime::{
    error_codes, CommitUploadOptions, DownloadOptions, ListItem, ListObjectsOptions,
    ListUploadPartsOptions, NativeError, RawHandle, StorageRuntime, UploadOptions,
};
use uplink_runtime_mocked::MemoryStorage;

fn open(storage: &MemoryStorage) -> (RawHandle, RawHandle) {
    let access = storage
        .request_access_with_passphrase("sat.test:7777", "api-key", "secret")
        .unwrap();
    let project = storage.open_project(access).unwrap();
    (access, project)
}

fn close(storage: &MemoryStorage, access: RawHandle, project: RawHandle) {
    storage.close_project(project).unwrap();
    storage.free_project(project);
    storage.free_access(access);
}

#[test]
fn test_upload_then_download() {
    let storage = MemoryStorage::new();
    let (access, project) = open(&storage);
    storage.create_bucket(project, "photos").unwrap();

    let upload = storage
        .upload_object(project, "photos", "cat.jpg", &UploadOptions::default())
        .unwrap();
    assert_eq!(storage.upload_write(upload, b"hello ").bytes_written, 6);
    assert_eq!(storage.upload_write(upload, b"world").bytes_written, 5);
    storage.upload_commit(upload).unwrap();
    let again = storage.upload_write(upload, b"!");
    assert_eq!(again.error.unwrap().code, error_codes::UPLOAD_DONE);
    storage.free_upload(upload);

    let download = storage
        .download_object(project, "photos", "cat.jpg", &DownloadOptions::default())
        .unwrap();
    let mut buffer = [0u8; 8];
    let first = storage.download_read(download, &mut buffer);
    assert_eq!(first.bytes_read, 8);
    assert!(first.error.is_none());
    let second = storage.download_read(download, &mut buffer);
    assert_eq!(second.bytes_read, 3);
    assert_eq!(second.error.unwrap().code, error_codes::EOF);
    assert_eq!(&buffer[..3], b"rld");
    storage.close_download(download).unwrap();
    storage.free_download(download);

    close(&storage, access, project);
    assert!(storage.universe_is_empty());
}

#[test]
fn test_read_chunk_limits_each_read() {
    let storage = MemoryStorage::new();
    storage.seed_object("photos", "big", &[7u8; 10]);
    storage.set_read_chunk(4);
    let (access, project) = open(&storage);
    let download = storage
        .download_object(project, "photos", "big", &DownloadOptions::default())
        .unwrap();

    let mut buffer = [0u8; 64];
    let reads: Vec<usize> = (0..3)
        .map(|_| storage.download_read(download, &mut buffer).bytes_read)
        .collect();
    assert_eq!(reads, vec![4, 4, 2]);

    storage.free_download(download);
    close(&storage, access, project);
}

#[test]
fn test_multipart_parts_are_assembled_in_order() {
    let storage = MemoryStorage::new();
    let (access, project) = open(&storage);
    storage.create_bucket(project, "photos").unwrap();
    let info = storage
        .begin_upload(project, "photos", "video", &UploadOptions::default())
        .unwrap();

    for (number, chunk) in [(2u32, b"world".as_slice()), (1, b"hello ".as_slice())] {
        let part = storage
            .upload_part(project, "photos", "video", &info.upload_id, number)
            .unwrap();
        storage.part_upload_write(part, chunk);
        storage.part_upload_set_etag(part, &format!("etag-{number}")).unwrap();
        storage.part_upload_commit(part).unwrap();
        storage.free_part_upload(part);
    }

    let parts = storage.list_upload_parts(
        project,
        "photos",
        "video",
        &info.upload_id,
        &ListUploadPartsOptions::default(),
    );
    let mut numbers = Vec::new();
    while storage.iterator_next(parts) {
        if let Some(ListItem::Part(part)) = storage.iterator_item(parts) {
            numbers.push(part.part_number);
        }
    }
    assert!(storage.iterator_err(parts).is_none());
    storage.free_iterator(parts);
    assert_eq!(numbers, vec![1, 2]);

    let object = storage
        .commit_upload(
            project,
            "photos",
            "video",
            &info.upload_id,
            &CommitUploadOptions::default(),
        )
        .unwrap();
    assert_eq!(object.system.content_length, 11);
    assert_eq!(
        storage.object_data("photos", "video").unwrap(),
        b"hello world".to_vec()
    );

    close(&storage, access, project);
    assert!(storage.universe_is_empty());
}

#[test]
fn test_listing_missing_bucket_reports_through_cursor() {
    let storage = MemoryStorage::new();
    let (access, project) = open(&storage);
    let cursor = storage.list_objects(project, "nothing", &ListObjectsOptions::default());
    assert!(!storage.iterator_next(cursor));
    assert_eq!(
        storage.iterator_err(cursor).unwrap().code,
        error_codes::BUCKET_NOT_FOUND
    );
    storage.free_iterator(cursor);
    close(&storage, access, project);
}

#[test]
fn test_injected_failure_hits_next_call_only() {
    let storage = MemoryStorage::new();
    let (access, project) = open(&storage);
    storage.fail_next(
        "create_bucket",
        NativeError::new(error_codes::TOO_MANY_REQUESTS, "slow down"),
    );
    let err = storage.create_bucket(project, "photos").unwrap_err();
    assert_eq!(err.code, error_codes::TOO_MANY_REQUESTS);
    assert!(storage.create_bucket(project, "photos").is_ok());
    close(&storage, access, project);
}

#[test]
fn test_revoked_access_cannot_open_project() {
    let storage = MemoryStorage::new();
    let (access, project) = open(&storage);
    let serialized = storage.access_serialize(access).unwrap();
    let parsed = storage.parse_access(&serialized).unwrap();
    storage.revoke_access(project, parsed).unwrap();
    let err = storage.open_project(parsed).unwrap_err();
    assert_eq!(err.code, error_codes::PERMISSION_DENIED);
    storage.free_access(parsed);
    close(&storage, access, project);
    assert!(storage.universe_is_empty());
}

#[test]
fn test_wrong_handle_kind_is_rejected() {
    let storage = MemoryStorage::new();
    let (access, project) = open(&storage);
    let err = storage.stat_bucket(access, "photos").unwrap_err();
    assert_eq!(err.code, error_codes::INVALID_HANDLE);
    close(&storage, access, project);
}
