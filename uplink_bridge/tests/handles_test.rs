mod common;

use common::{open_project, request_access, setup};
use uplink_bridge::{BridgeError, ErrorKind, HandleKind, HandleRef, Value};
use uplink_runtime::{error_codes, NativeError};

#[tokio::test]
async fn freed_handle_is_rejected_without_a_native_call() {
    let (storage, bridge) = setup();
    let access = request_access(&bridge).await;
    bridge
        .call_async("freeAccess", vec![access.into()])
        .await
        .unwrap();
    let calls = storage.calls();

    let err = bridge
        .call("accessSerialize", vec![access.into()])
        .err()
        .unwrap();

    assert!(matches!(
        err,
        BridgeError::InvalidHandle {
            expected: HandleKind::Access
        }
    ));
    assert_eq!(err.as_storage().unwrap().kind, ErrorKind::InvalidHandle);
    assert_eq!(storage.calls(), calls);
    assert_eq!(bridge.in_flight(), 0);
}

#[tokio::test]
async fn handle_of_another_kind_is_rejected() {
    let (storage, bridge) = setup();
    let (access, project) = open_project(&bridge).await;
    let calls = storage.calls();

    let err = bridge
        .call("accessSerialize", vec![project.into()])
        .err()
        .unwrap();
    assert!(matches!(
        err,
        BridgeError::InvalidHandle {
            expected: HandleKind::Access
        }
    ));

    let err = bridge
        .call("statBucket", vec![access.into(), "bucket".into()])
        .err()
        .unwrap();
    assert!(matches!(
        err,
        BridgeError::InvalidHandle {
            expected: HandleKind::Project
        }
    ));
    assert_eq!(storage.calls(), calls);

    common::close_project(&bridge, access, project).await;
}

#[tokio::test]
async fn malformed_handles_are_rejected() {
    let (_storage, bridge) = setup();

    for bad in [
        Value::Handle(HandleRef::dangling(9999)),
        Value::from("access"),
        Value::Number(1.0),
        Value::object([("key", Value::Number(1.0))]),
    ] {
        let err = bridge.call("freeAccess", vec![bad]).err().unwrap();
        assert!(
            matches!(err, BridgeError::InvalidHandle { .. }),
            "unexpected {err:?}"
        );
    }
}

#[tokio::test]
async fn handle_keys_are_not_reused() {
    let (_storage, bridge) = setup();
    let first = request_access(&bridge).await;
    bridge
        .call_async("freeAccess", vec![first.into()])
        .await
        .unwrap();

    let second = request_access(&bridge).await;

    assert_ne!(first.key(), second.key());
    assert!(bridge.call("freeAccess", vec![first.into()]).is_err());
    bridge
        .call_async("freeAccess", vec![second.into()])
        .await
        .unwrap();
    assert!(bridge.registry_is_empty());
}

#[tokio::test]
async fn commit_consumes_the_upload_handle() {
    let (storage, bridge) = setup();
    let (access, project) = open_project(&bridge).await;
    storage.seed_object("bucket", "seed", b"");
    let upload = bridge
        .call_async(
            "uploadObject",
            vec![project.into(), "bucket".into(), "k".into(), Value::Undefined],
        )
        .await
        .unwrap();
    let open_handles = bridge.open_handles();

    bridge
        .call_async("uploadCommit", vec![upload.clone()])
        .await
        .unwrap();

    assert_eq!(bridge.open_handles(), open_handles - 1);
    let err = bridge.call("uploadCommit", vec![upload]).err().unwrap();
    assert!(matches!(
        err,
        BridgeError::InvalidHandle {
            expected: HandleKind::Upload
        }
    ));
    common::close_project(&bridge, access, project).await;
    assert_eq!(storage.live_resources(), 0);
}

#[tokio::test]
async fn failed_commit_keeps_the_upload_open() {
    let (storage, bridge) = setup();
    let (access, project) = open_project(&bridge).await;
    storage.seed_object("bucket", "seed", b"");
    let upload = bridge
        .call_async(
            "uploadObject",
            vec![project.into(), "bucket".into(), "k".into(), Value::Undefined],
        )
        .await
        .unwrap();
    storage.fail_next(
        "upload_commit",
        NativeError::new(error_codes::TOO_MANY_REQUESTS, "slow down"),
    );

    let err = bridge
        .call_async("uploadCommit", vec![upload.clone()])
        .await
        .unwrap_err();

    let BridgeError::Storage(error) = err else {
        panic!("expected a storage error");
    };
    assert_eq!(error.kind, ErrorKind::TooManyRequests);
    assert_eq!(error.details.as_deref(), Some("slow down"));
    // Still registered: abort goes through
    bridge.call_async("uploadAbort", vec![upload]).await.unwrap();
    assert_eq!(storage.object_data("bucket", "k"), None);
    common::close_project(&bridge, access, project).await;
    assert!(bridge.registry_is_empty());
    assert_eq!(storage.live_resources(), 0);
}

#[tokio::test]
async fn failed_close_still_releases_the_project() {
    let (storage, bridge) = setup();
    let (access, project) = open_project(&bridge).await;
    storage.fail_next("close_project", NativeError::new(error_codes::INTERNAL, "io"));

    let err = bridge
        .call_async("closeProject", vec![project.into()])
        .await
        .unwrap_err();

    assert!(matches!(err, BridgeError::Storage(ref e) if e.kind == ErrorKind::Internal));
    assert!(bridge.call("closeProject", vec![project.into()]).is_err());
    bridge
        .call_async("freeAccess", vec![access.into()])
        .await
        .unwrap();
    assert!(bridge.registry_is_empty());
    assert_eq!(storage.live_resources(), 0);
}

#[tokio::test]
async fn shutdown_releases_leaked_handles() {
    let (storage, bridge) = setup();
    let (_access, project) = open_project(&bridge).await;
    storage.seed_object("bucket", "k", b"data");
    let _download = common::open_download(&bridge, project, "bucket", "k").await;
    assert_eq!(bridge.open_handles(), 3);

    let leaked = bridge.shutdown().await;

    assert_eq!(leaked, 3);
    assert!(bridge.registry_is_empty());
    assert_eq!(storage.live_resources(), 0);
    assert_eq!(bridge.shutdown().await, 0);
}

#[tokio::test]
async fn encryption_key_lifecycle() {
    let (storage, bridge) = setup();
    let access = request_access(&bridge).await;
    let salt = uplink_bridge::HostBuffer::from(b"salt".as_slice());

    let key = bridge
        .call_async("deriveEncryptionKey", vec!["phrase".into(), salt.into()])
        .await
        .unwrap();
    bridge
        .call_async(
            "accessOverrideEncryptionKey",
            vec![access.into(), "bucket".into(), "secret/".into(), key.clone()],
        )
        .await
        .unwrap();
    bridge
        .call_async("freeEncryptionKey", vec![key.clone()])
        .await
        .unwrap();

    assert!(matches!(
        bridge.call("freeEncryptionKey", vec![key]).err(),
        Some(BridgeError::InvalidHandle {
            expected: HandleKind::EncryptionKey
        })
    ));
    bridge
        .call_async("freeAccess", vec![access.into()])
        .await
        .unwrap();
    assert_eq!(storage.live_resources(), 0);
}
