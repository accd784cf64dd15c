#[macro_use]
extern crate hamcrest;

mod common;

use common::{open_project, request_access, setup};
use hamcrest::prelude::*;
use uplink_bridge::{BridgeError, ErrorCategory, ErrorKind, HostBuffer, Map, Value, BASE_CLASS};

#[tokio::test]
async fn invalid_arguments_fail_before_any_task() {
    let (storage, bridge) = setup();
    let access = request_access(&bridge).await;
    let calls = storage.calls();

    let cases: Vec<(&str, Vec<Value>)> = vec![
        ("noSuchOperation", vec![]),
        ("requestAccessWithPassphrase", vec!["sat".into(), "key".into()]),
        ("parseAccess", vec![Value::Number(42.0)]),
        ("openProject", vec![]),
        ("listBucketsCreate", vec![Value::Null, Value::Undefined]),
        (
            "accessShare",
            vec![access.into(), Value::from("all"), Value::Undefined],
        ),
        ("deriveEncryptionKey", vec!["phrase".into(), "salt".into()]),
        (
            "updateObjectMetadata",
            vec![
                Value::Undefined,
                "bucket".into(),
                "k".into(),
                Value::Object(Map::new()),
            ],
        ),
    ];
    for (name, args) in cases {
        let err = bridge.call(name, args).err().unwrap();
        assert!(
            matches!(err, BridgeError::Type(_) | BridgeError::InvalidHandle { .. }),
            "{name}: {err:?}"
        );
    }

    assert_that!(storage.calls(), is(equal_to(calls)));
    assert_that!(bridge.in_flight(), is(equal_to(0)));
    assert_that!(bridge.open_handles(), is(equal_to(1)));
}

#[tokio::test]
async fn operation_names_are_unique() {
    let (_storage, bridge) = setup();

    let names: Vec<&str> = bridge.operations().map(|op| op.name).collect();
    let unique: std::collections::HashSet<&str> = names.iter().copied().collect();

    assert_that!(unique.len(), is(equal_to(names.len())));
    for name in ["requestAccessWithPassphrase", "uploadWrite", "testThrowTypedError"] {
        assert!(unique.contains(name), "{name} missing");
    }
}

#[tokio::test]
async fn numeric_arguments_are_range_checked() {
    let (storage, bridge) = setup();
    let (access, project) = open_project(&bridge).await;
    let calls = storage.calls();

    let negative = bridge
        .call(
            "uploadWrite",
            vec![Value::Undefined, HostBuffer::new(1).into(), Value::Number(-1.0)],
        )
        .err()
        .unwrap();
    let timeout = bridge
        .call(
            "configOpenProject",
            vec![
                Value::object([("dialTimeoutMilliseconds", Value::Number(1e12))]),
                access.into(),
            ],
        )
        .err()
        .unwrap();
    let code = bridge
        .call(
            "testThrowTypedError",
            vec![Value::Number(f64::from(i32::MAX) + 1.0), "m".into()],
        )
        .err()
        .unwrap();

    assert!(matches!(negative, BridgeError::Type(_) | BridgeError::Range(_)));
    assert!(matches!(timeout, BridgeError::Range(_)));
    assert!(matches!(code, BridgeError::Range(_)));
    assert_that!(storage.calls(), is(equal_to(calls)));
    common::close_project(&bridge, access, project).await;
}

#[tokio::test]
async fn typed_errors_carry_their_class() {
    let (_storage, bridge) = setup();
    let classes = bridge.init_error_classes(Some("HostError"));

    for kind in ErrorKind::ALL {
        let err = bridge
            .call_async(
                "testThrowTypedError",
                vec![Value::from(i64::from(kind.code())), "from test".into()],
            )
            .await
            .unwrap_err();

        let BridgeError::Storage(error) = err else {
            panic!("{kind:?}: expected a storage error");
        };
        assert_that!(error.kind, is(equal_to(kind)));
        assert_that!(error.code, is(equal_to(kind.code())));
        assert_that!(error.details.as_deref(), is(equal_to(Some("from test"))));
        assert!(classes.is_a(&error, error.class_name()));
        assert!(classes.is_a(&error, BASE_CLASS));
        assert!(classes.is_a(&error, "HostError"));
    }
}

#[tokio::test]
async fn unknown_code_keeps_its_raw_value() {
    let (_storage, bridge) = setup();

    let err = bridge
        .call_async(
            "testThrowTypedError",
            vec![Value::from(0x4242i64), "".into()],
        )
        .await
        .unwrap_err();

    let error = err.as_storage().unwrap();
    assert_that!(error.kind, is(equal_to(ErrorKind::Internal)));
    assert_that!(error.code, is(equal_to(0x4242)));
    assert_that!(error.details.as_deref(), is(equal_to(None::<&str>)));
    assert_that!(error.class_name(), is(equal_to("InternalError")));
}

#[tokio::test]
async fn error_classes_form_one_hierarchy() {
    let (_storage, bridge) = setup();

    let classes = bridge.init_error_classes(None);

    assert_that!(classes.base(), is(equal_to("Error")));
    let base = classes.get(BASE_CLASS).unwrap();
    assert_that!(base.parent.as_str(), is(equal_to("Error")));
    assert_that!(base.code, is(equal_to(None::<i32>)));
    assert!(classes
        .classes()
        .filter(|class| class.name != BASE_CLASS)
        .all(|class| class.parent == BASE_CLASS));
    let not_found = classes.for_code(ErrorKind::BucketNotFound.code());
    assert_that!(not_found.name, is(equal_to("BucketNotFoundError")));
    assert_that!(classes.for_code(-7).name, is(equal_to("InternalError")));
}

#[tokio::test]
async fn storage_errors_are_classified() {
    let (storage, bridge) = setup();
    let (access, project) = open_project(&bridge).await;
    storage.seed_object("full", "k", b"x");

    let exists = bridge
        .call_async("createBucket", vec![project.into(), "full".into()])
        .await
        .unwrap_err();
    let not_empty = bridge
        .call_async("deleteBucket", vec![project.into(), "full".into()])
        .await
        .unwrap_err();
    let missing = bridge
        .call_async("statBucket", vec![project.into(), "missing".into()])
        .await
        .unwrap_err();
    let bad_name = bridge
        .call_async("createBucket", vec![project.into(), "X".into()])
        .await
        .unwrap_err();

    let kinds: Vec<ErrorKind> = [exists, not_empty, missing, bad_name]
        .iter()
        .map(|err| err.as_storage().unwrap().kind)
        .collect();
    assert_that!(
        kinds.clone(),
        is(equal_to(vec![
            ErrorKind::BucketAlreadyExists,
            ErrorKind::BucketNotEmpty,
            ErrorKind::BucketNotFound,
            ErrorKind::BucketNameInvalid,
        ]))
    );
    assert!(kinds
        .iter()
        .all(|kind| kind.category() == ErrorCategory::Bucket));
    common::close_project(&bridge, access, project).await;
}

#[tokio::test]
async fn restricted_access_is_denied() {
    let (storage, bridge) = setup();
    let (access, project) = open_project(&bridge).await;
    storage.seed_object("bucket", "k", b"x");
    let permission = Value::object([("allowDownload", Value::Bool(true))]);
    let prefixes = Value::Array(vec![Value::object([("bucket", Value::from("bucket"))])]);

    let shared = bridge
        .call_async("accessShare", vec![access.into(), permission, prefixes])
        .await
        .unwrap();
    let limited = bridge
        .call_async("openProject", vec![shared.clone()])
        .await
        .unwrap();
    let err = bridge
        .call_async(
            "uploadObject",
            vec![limited.clone(), "bucket".into(), "new".into(), Value::Undefined],
        )
        .await
        .unwrap_err();

    assert_that!(
        err.as_storage().map(|e| e.kind),
        is(equal_to(Some(ErrorKind::PermissionDenied)))
    );
    bridge.call_async("closeProject", vec![limited]).await.unwrap();
    bridge.call_async("freeAccess", vec![shared]).await.unwrap();
    common::close_project(&bridge, access, project).await;
    assert!(bridge.registry_is_empty());
}

#[tokio::test]
async fn edge_credentials_and_share_urls() {
    let (_storage, bridge) = setup();
    let access = request_access(&bridge).await;

    let insecure = Value::object([
        ("authServiceAddress", Value::from("auth.test:7777")),
        ("insecureUnencryptedConnection", Value::Bool(true)),
    ]);
    let credentials = bridge
        .call_async(
            "edgeRegisterAccess",
            vec![insecure, access.into(), Value::object([("isPublic", Value::Bool(true))])],
        )
        .await
        .unwrap();
    let key_id = credentials
        .get("accessKeyId")
        .and_then(Value::as_str)
        .unwrap()
        .to_string();
    assert!(key_id.starts_with("jw"));

    let url = bridge
        .call_async(
            "edgeJoinShareUrl",
            vec![
                "https://link.test/".into(),
                key_id.as_str().into(),
                "bucket".into(),
                "k".into(),
                Value::object([("raw", Value::Bool(true))]),
            ],
        )
        .await
        .unwrap();
    let expected = format!("https://link.test/raw/{key_id}/bucket/k");
    assert_that!(url.as_str(), is(equal_to(Some(expected.as_str()))));

    let unreachable = Value::object([("authServiceAddress", Value::from("unreachable:1"))]);
    let dial = bridge
        .call_async(
            "edgeRegisterAccess",
            vec![unreachable, access.into(), Value::Undefined],
        )
        .await
        .unwrap_err();
    let dial = dial.as_storage().unwrap();
    assert_that!(dial.kind, is(equal_to(ErrorKind::EdgeAuthDialFailed)));
    assert_that!(dial.category(), is(equal_to(ErrorCategory::Edge)));

    let no_bucket = bridge
        .call_async(
            "edgeJoinShareUrl",
            vec!["https://link.test".into(), key_id.as_str().into(), Value::Undefined, "k".into()],
        )
        .await
        .unwrap_err();
    assert_that!(
        no_bucket.as_storage().map(|e| e.kind),
        is(equal_to(Some(ErrorKind::Internal)))
    );

    let missing_address = bridge
        .call("edgeRegisterAccess", vec![Value::Object(Map::new()), access.into()])
        .err()
        .unwrap();
    assert!(matches!(missing_address, BridgeError::Type(_)));
    bridge
        .call_async("freeAccess", vec![access.into()])
        .await
        .unwrap();
}
