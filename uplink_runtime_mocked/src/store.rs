//! Bucket and object contents of the in-memory library.

use std::collections::BTreeMap;

use uplink_runtime::{
    error_codes, Bucket, CustomMetadata, ListItem, ListObjectsOptions, NativeError, NativeResult,
    Object, Part, SystemMetadata, UploadInfo,
};

#[derive(Debug, Clone)]
pub struct StoredObject {
    pub data: Vec<u8>,
    pub created: i64,
    pub expires: i64,
    pub custom: CustomMetadata,
}

impl StoredObject {
    pub fn to_object(&self, key: &str) -> Object {
        Object {
            key: key.to_string(),
            is_prefix: false,
            system: SystemMetadata {
                created: self.created,
                expires: self.expires,
                content_length: self.data.len() as i64,
            },
            custom: self.custom.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct StoredPart {
    pub data: Vec<u8>,
    pub etag: String,
    pub modified: i64,
}

#[derive(Debug, Clone)]
pub struct PendingUpload {
    pub key: String,
    pub created: i64,
    pub expires: i64,
    pub parts: BTreeMap<u32, StoredPart>,
}

impl PendingUpload {
    pub fn to_info(&self, upload_id: &str) -> UploadInfo {
        UploadInfo {
            upload_id: upload_id.to_string(),
            key: self.key.clone(),
            is_prefix: false,
            system: SystemMetadata {
                created: self.created,
                expires: self.expires,
                content_length: 0,
            },
            custom: CustomMetadata::new(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct StoredBucket {
    pub created: i64,
    pub objects: BTreeMap<String, StoredObject>,
    /// Keyed by upload id.
    pub uploads: BTreeMap<String, PendingUpload>,
}

#[derive(Debug, Default)]
pub struct Store {
    pub buckets: BTreeMap<String, StoredBucket>,
}

pub fn validate_bucket_name(name: &str) -> NativeResult<()> {
    let valid_chars = name
        .chars()
        .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '.');
    let valid_edges = name
        .chars()
        .next()
        .zip(name.chars().last())
        .is_some_and(|(first, last)| first.is_ascii_alphanumeric() && last.is_ascii_alphanumeric());
    if (3..=63).contains(&name.len()) && valid_chars && valid_edges {
        Ok(())
    } else {
        Err(NativeError::new(
            error_codes::BUCKET_NAME_INVALID,
            format!("{name:?}"),
        ))
    }
}

pub fn validate_key(key: &str) -> NativeResult<()> {
    if key.is_empty() {
        Err(NativeError::new(error_codes::OBJECT_KEY_INVALID, "\"\""))
    } else {
        Ok(())
    }
}

fn bucket_not_found(name: &str) -> NativeError {
    NativeError::new(error_codes::BUCKET_NOT_FOUND, format!("{name:?}"))
}

fn object_not_found(key: &str) -> NativeError {
    NativeError::new(error_codes::OBJECT_NOT_FOUND, format!("{key:?}"))
}

impl Store {
    pub fn bucket(&self, name: &str) -> NativeResult<&StoredBucket> {
        validate_bucket_name(name)?;
        self.buckets.get(name).ok_or_else(|| bucket_not_found(name))
    }

    pub fn bucket_mut(&mut self, name: &str) -> NativeResult<&mut StoredBucket> {
        validate_bucket_name(name)?;
        self.buckets
            .get_mut(name)
            .ok_or_else(|| bucket_not_found(name))
    }

    pub fn create_bucket(&mut self, name: &str, now: i64) -> NativeResult<Bucket> {
        validate_bucket_name(name)?;
        if self.buckets.contains_key(name) {
            return Err(NativeError::new(
                error_codes::BUCKET_ALREADY_EXISTS,
                format!("{name:?}"),
            ));
        }
        self.buckets.insert(
            name.to_string(),
            StoredBucket {
                created: now,
                ..StoredBucket::default()
            },
        );
        Ok(Bucket {
            name: name.to_string(),
            created: now,
        })
    }

    pub fn ensure_bucket(&mut self, name: &str, now: i64) -> NativeResult<Bucket> {
        validate_bucket_name(name)?;
        let bucket = self.buckets.entry(name.to_string()).or_insert(StoredBucket {
            created: now,
            ..StoredBucket::default()
        });
        Ok(Bucket {
            name: name.to_string(),
            created: bucket.created,
        })
    }

    pub fn stat_bucket(&self, name: &str) -> NativeResult<Bucket> {
        let bucket = self.bucket(name)?;
        Ok(Bucket {
            name: name.to_string(),
            created: bucket.created,
        })
    }

    pub fn delete_bucket(&mut self, name: &str, with_objects: bool) -> NativeResult<Bucket> {
        let bucket = self.bucket(name)?;
        if !with_objects && !bucket.objects.is_empty() {
            return Err(NativeError::new(
                error_codes::BUCKET_NOT_EMPTY,
                format!("{name:?}"),
            ));
        }
        let created = bucket.created;
        self.buckets.remove(name);
        Ok(Bucket {
            name: name.to_string(),
            created,
        })
    }

    pub fn object(&self, bucket: &str, key: &str) -> NativeResult<&StoredObject> {
        validate_key(key)?;
        self.bucket(bucket)?
            .objects
            .get(key)
            .ok_or_else(|| object_not_found(key))
    }

    pub fn object_mut(&mut self, bucket: &str, key: &str) -> NativeResult<&mut StoredObject> {
        validate_key(key)?;
        self.bucket_mut(bucket)?
            .objects
            .get_mut(key)
            .ok_or_else(|| object_not_found(key))
    }

    pub fn put_object(&mut self, bucket: &str, key: &str, object: StoredObject) -> NativeResult<()> {
        validate_key(key)?;
        self.bucket_mut(bucket)?
            .objects
            .insert(key.to_string(), object);
        Ok(())
    }

    pub fn remove_object(&mut self, bucket: &str, key: &str) -> NativeResult<StoredObject> {
        validate_key(key)?;
        self.bucket_mut(bucket)?
            .objects
            .remove(key)
            .ok_or_else(|| object_not_found(key))
    }

    pub fn pending(&self, bucket: &str, upload_id: &str) -> NativeResult<&PendingUpload> {
        self.bucket(bucket)?
            .uploads
            .get(upload_id)
            .ok_or_else(|| object_not_found(upload_id))
    }

    pub fn pending_mut(&mut self, bucket: &str, upload_id: &str) -> NativeResult<&mut PendingUpload> {
        self.bucket_mut(bucket)?
            .uploads
            .get_mut(upload_id)
            .ok_or_else(|| object_not_found(upload_id))
    }

    pub fn list_buckets(&self, cursor: Option<&str>) -> Vec<ListItem> {
        self.buckets
            .iter()
            .filter(|(name, _)| cursor.map_or(true, |c| name.as_str() > c))
            .map(|(name, bucket)| {
                ListItem::Bucket(Bucket {
                    name: name.clone(),
                    created: bucket.created,
                })
            })
            .collect()
    }

    pub fn list_objects(&self, bucket: &str, options: &ListObjectsOptions) -> NativeResult<Vec<ListItem>> {
        let stored = self.bucket(bucket)?;
        let entries = stored
            .objects
            .iter()
            .map(|(key, object)| (key.as_str(), Some(object)));
        Ok(collapse(entries, options)
            .into_iter()
            .map(|(key, object)| {
                let mut item = match object {
                    Some(object) => object.to_object(&key),
                    None => prefix_entry(&key),
                };
                if !options.system {
                    item.system = SystemMetadata::default();
                }
                if !options.custom {
                    item.custom.clear();
                }
                ListItem::Object(item)
            })
            .collect())
    }

    pub fn list_uploads(&self, bucket: &str, options: &ListObjectsOptions) -> NativeResult<Vec<ListItem>> {
        let stored = self.bucket(bucket)?;
        let mut pending: Vec<(&str, (&str, &PendingUpload))> = stored
            .uploads
            .iter()
            .map(|(id, upload)| (upload.key.as_str(), (id.as_str(), upload)))
            .collect();
        pending.sort_by(|a, b| (a.0, (a.1).0).cmp(&(b.0, (b.1).0)));
        let entries = pending.into_iter().map(|(key, upload)| (key, Some(upload)));
        Ok(collapse(entries, options)
            .into_iter()
            .map(|(key, upload)| {
                let mut info = match upload {
                    Some((id, upload)) => upload.to_info(id),
                    None => UploadInfo {
                        upload_id: String::new(),
                        key,
                        is_prefix: true,
                        system: SystemMetadata::default(),
                        custom: CustomMetadata::new(),
                    },
                };
                if !options.system {
                    info.system = SystemMetadata::default();
                }
                ListItem::Upload(info)
            })
            .collect())
    }

    pub fn list_parts(&self, bucket: &str, key: &str, upload_id: &str, cursor: u32) -> NativeResult<Vec<ListItem>> {
        let pending = self.pending(bucket, upload_id)?;
        if pending.key != key {
            return Err(object_not_found(key));
        }
        Ok(pending
            .parts
            .range(cursor.saturating_add(1)..)
            .map(|(number, part)| {
                ListItem::Part(Part {
                    part_number: *number,
                    size: part.data.len() as u64,
                    modified: part.modified,
                    etag: part.etag.clone(),
                })
            })
            .collect())
    }
}

fn prefix_entry(key: &str) -> Object {
    Object {
        key: key.to_string(),
        is_prefix: true,
        system: SystemMetadata::default(),
        custom: CustomMetadata::new(),
    }
}

/// Apply prefix, cursor and non-recursive collapsing to sorted keys.
/// Collapsed entries carry `None` in place of the object.
fn collapse<'a, T>(
    entries: impl Iterator<Item = (&'a str, Option<T>)>,
    options: &ListObjectsOptions,
) -> Vec<(String, Option<T>)> {
    let prefix = options.prefix.as_deref().unwrap_or("");
    let mut out: Vec<(String, Option<T>)> = Vec::new();
    for (key, value) in entries {
        let Some(rest) = key.strip_prefix(prefix) else {
            continue;
        };
        if options.cursor.as_deref().is_some_and(|c| key <= c) {
            continue;
        }
        match rest.find('/').filter(|_| !options.recursive) {
            Some(slash) => {
                let collapsed = format!("{prefix}{}", &rest[..=slash]);
                let seen = out
                    .last()
                    .is_some_and(|(k, v)| v.is_none() && *k == collapsed);
                if !seen {
                    out.push((collapsed, None));
                }
            }
            None => out.push((key.to_string(), value)),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    fn object(data: &[u8]) -> StoredObject {
        StoredObject {
            data: data.to_vec(),
            created: 1,
            expires: 0,
            custom: vec![("kind".into(), "test".into())],
        }
    }

    fn keys(items: &[ListItem]) -> Vec<(String, bool)> {
        items
            .iter()
            .map(|item| match item {
                ListItem::Object(o) => (o.key.clone(), o.is_prefix),
                other => panic!("unexpected item {other:?}"),
            })
            .collect()
    }

    #[test]
    fn bucket_names_are_validated() {
        assert!(validate_bucket_name("photos").is_ok());
        assert!(validate_bucket_name("my-bucket.2024").is_ok());
        for bad in ["ab", "Upper", "-lead", "trail-", "has_underscore", ""] {
            let err = validate_bucket_name(bad).unwrap_err();
            assert_eq!(err.code, error_codes::BUCKET_NAME_INVALID, "{bad}");
        }
    }

    #[test]
    fn non_empty_bucket_is_not_deleted() {
        let mut store = Store::default();
        store.create_bucket("photos", 1).unwrap();
        store.put_object("photos", "a", object(b"x")).unwrap();
        let err = store.delete_bucket("photos", false).unwrap_err();
        assert_eq!(err.code, error_codes::BUCKET_NOT_EMPTY);
        store.delete_bucket("photos", true).unwrap();
        assert!(store.buckets.is_empty());
    }

    #[test]
    fn listing_collapses_prefixes_unless_recursive() {
        let mut store = Store::default();
        store.create_bucket("photos", 1).unwrap();
        for key in ["a/1", "a/2", "b", "c/d/e"] {
            store.put_object("photos", key, object(b"x")).unwrap();
        }

        let flat = store
            .list_objects("photos", &ListObjectsOptions::default())
            .unwrap();
        assert_eq!(
            keys(&flat),
            vec![
                ("a/".to_string(), true),
                ("b".to_string(), false),
                ("c/".to_string(), true)
            ]
        );

        let recursive = ListObjectsOptions {
            recursive: true,
            prefix: Some("c/".into()),
            ..ListObjectsOptions::default()
        };
        let deep = store.list_objects("photos", &recursive).unwrap();
        assert_eq!(keys(&deep), vec![("c/d/e".to_string(), false)]);
    }

    #[test]
    fn listing_honours_cursor_and_custom_flag() {
        let mut store = Store::default();
        store.create_bucket("photos", 1).unwrap();
        for key in ["a", "b", "c"] {
            store.put_object("photos", key, object(b"x")).unwrap();
        }
        let options = ListObjectsOptions {
            cursor: Some("a".into()),
            ..ListObjectsOptions::default()
        };
        let items = store.list_objects("photos", &options).unwrap();
        assert_eq!(items.len(), 2);
        match &items[0] {
            ListItem::Object(o) => {
                assert_eq!(o.key, "b");
                assert!(o.custom.is_empty());
                assert_eq!(o.system.content_length, 1);
            }
            other => panic!("unexpected item {other:?}"),
        }
    }
}
