#![allow(dead_code)]

use std::sync::Arc;

use uplink_bridge::{Bridge, BridgeConfig, BridgeError, HandleRef, HostBuffer, Value};
use uplink_runtime::StorageRuntime;
use uplink_runtime_mocked::MemoryStorage;

pub const SATELLITE: &str = "sat.test:7777";

pub fn setup() -> (Arc<MemoryStorage>, Bridge) {
    setup_with_workers(4)
}

pub fn setup_with_workers(worker_threads: usize) -> (Arc<MemoryStorage>, Bridge) {
    let storage = Arc::new(MemoryStorage::new());
    let runtime: Arc<dyn StorageRuntime> = Arc::clone(&storage) as Arc<dyn StorageRuntime>;
    let config = BridgeConfig {
        worker_threads,
        ..BridgeConfig::default()
    };
    (storage, Bridge::with_config(runtime, &config))
}

pub fn handle(value: &Value) -> HandleRef {
    value.as_handle().expect("expected a handle")
}

pub async fn request_access(bridge: &Bridge) -> HandleRef {
    let access = bridge
        .call_async(
            "requestAccessWithPassphrase",
            vec![SATELLITE.into(), "api-key".into(), "secret".into()],
        )
        .await
        .unwrap();
    handle(&access)
}

/// Access grant plus a project opened with it.
pub async fn open_project(bridge: &Bridge) -> (HandleRef, HandleRef) {
    let access = request_access(bridge).await;
    let project = bridge
        .call_async("openProject", vec![access.into()])
        .await
        .unwrap();
    (access, handle(&project))
}

pub async fn close_project(bridge: &Bridge, access: HandleRef, project: HandleRef) {
    bridge
        .call_async("closeProject", vec![project.into()])
        .await
        .unwrap();
    bridge
        .call_async("freeAccess", vec![access.into()])
        .await
        .unwrap();
}

/// Upload `data` in one write and commit.
pub async fn put(bridge: &Bridge, project: HandleRef, bucket: &str, key: &str, data: &[u8]) {
    let upload = bridge
        .call_async(
            "uploadObject",
            vec![project.into(), bucket.into(), key.into(), Value::Undefined],
        )
        .await
        .unwrap();
    let buffer = HostBuffer::from(data);
    bridge
        .call_async(
            "uploadWrite",
            vec![upload.clone(), buffer.into(), data.len().into()],
        )
        .await
        .unwrap();
    bridge.call_async("uploadCommit", vec![upload]).await.unwrap();
}

/// Read a download to the end through a buffer of `chunk` bytes.
///
/// End of data arrives as a rejection carrying the bytes copied by that
/// last read.
pub async fn read_all(bridge: &Bridge, download: HandleRef, chunk: usize) -> Vec<u8> {
    let buffer = HostBuffer::new(chunk);
    let mut data = Vec::new();
    loop {
        let read = bridge
            .call_async(
                "downloadRead",
                vec![download.into(), buffer.clone().into(), chunk.into()],
            )
            .await;
        match read {
            Ok(result) => {
                let n = result.get("bytesRead").and_then(Value::as_i64).unwrap() as usize;
                data.extend_from_slice(&buffer.lock()[..n]);
            }
            Err(BridgeError::Storage(error)) if error.is_eof() => {
                let n = error.bytes_read.unwrap_or(0);
                data.extend_from_slice(&buffer.lock()[..n]);
                return data;
            }
            Err(error) => panic!("downloadRead failed: {error}"),
        }
    }
}

pub async fn open_download(bridge: &Bridge, project: HandleRef, bucket: &str, key: &str) -> HandleRef {
    open_download_with(bridge, project, bucket, key, Value::Undefined).await
}

pub async fn open_download_with(
    bridge: &Bridge,
    project: HandleRef,
    bucket: &str,
    key: &str,
    options: Value,
) -> HandleRef {
    let opened = bridge
        .call_async(
            "downloadObject",
            vec![project.into(), bucket.into(), key.into(), options],
        )
        .await
        .unwrap();
    handle(opened.get("downloadHandle").unwrap())
}
