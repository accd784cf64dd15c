//! Marshaling layer
//!
//! Each operation declares a fixed positional parameter list. `Args::extract`
//! validates a call against it before anything is scheduled: a missing
//! argument, a wrong shape, an out-of-range number or a bad handle fails the
//! call synchronously and no task is created.
//!
//! The second half of the module converts native result records into host
//! values.

use uplink_runtime::{
    Bucket, CustomMetadata, EdgeCredentials, ListItem, Object, Part, RawHandle, SystemMetadata,
    UploadInfo,
};

use crate::buffer::HostBuffer;
use crate::error::BridgeError;
use crate::registry::{HandleKind, HandleRef, HandleRegistry};
use crate::value::{Map, Value};

/// Largest part number the multipart protocol accepts.
pub const MAX_PART_NUMBER: i64 = 10_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParamKind {
    String,
    Integer { min: i64, max: i64 },
    Buffer,
    Map,
    Array,
    Handle(HandleKind),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Param {
    pub name: &'static str,
    pub kind: ParamKind,
    pub required: bool,
}

impl Param {
    const fn new(name: &'static str, kind: ParamKind) -> Self {
        Self {
            name,
            kind,
            required: true,
        }
    }

    pub const fn string(name: &'static str) -> Self {
        Self::new(name, ParamKind::String)
    }

    pub const fn integer(name: &'static str, min: i64, max: i64) -> Self {
        Self::new(name, ParamKind::Integer { min, max })
    }

    pub const fn length(name: &'static str) -> Self {
        Self::integer(name, 0, i64::MAX)
    }

    pub const fn buffer(name: &'static str) -> Self {
        Self::new(name, ParamKind::Buffer)
    }

    pub const fn map(name: &'static str) -> Self {
        Self::new(name, ParamKind::Map)
    }

    pub const fn array(name: &'static str) -> Self {
        Self::new(name, ParamKind::Array)
    }

    pub const fn handle(name: &'static str, kind: HandleKind) -> Self {
        Self::new(name, ParamKind::Handle(kind))
    }

    pub const fn optional(self) -> Self {
        Self {
            required: false,
            ..self
        }
    }
}

#[derive(Debug, Clone)]
enum Arg {
    Absent,
    String(String),
    Integer(i64),
    Buffer(HostBuffer),
    Map(Map),
    Array(Vec<Value>),
    Handle { reference: HandleRef, raw: RawHandle },
}

/// Validated arguments of one call.
#[derive(Debug)]
pub struct Args {
    operation: &'static str,
    values: Vec<Arg>,
}

impl Args {
    /// # Errors
    /// `Type`, `Range` or `InvalidHandle`, per the first offending argument.
    pub fn extract(
        operation: &'static str,
        params: &[Param],
        values: Vec<Value>,
        registry: &HandleRegistry,
    ) -> Result<Self, BridgeError> {
        let mut values = values.into_iter();
        let mut args = Vec::with_capacity(params.len());
        for param in params {
            let value = values.next().unwrap_or(Value::Undefined);
            args.push(extract_one(operation, param, value, registry)?);
        }
        Ok(Self {
            operation,
            values: args,
        })
    }

    #[must_use]
    pub fn operation(&self) -> &'static str {
        self.operation
    }

    fn get(&self, index: usize) -> &Arg {
        self.values.get(index).unwrap_or(&Arg::Absent)
    }

    fn mismatch(&self, index: usize, expected: &str) -> BridgeError {
        BridgeError::type_error(format!(
            "{}: argument {index} is not a {expected}",
            self.operation
        ))
    }

    /// # Errors
    /// `Type` if the argument is not a string.
    pub fn string(&self, index: usize) -> Result<String, BridgeError> {
        match self.get(index) {
            Arg::String(s) => Ok(s.clone()),
            _ => Err(self.mismatch(index, "string")),
        }
    }

    /// # Errors
    /// `Type` if present but not a string.
    pub fn opt_string(&self, index: usize) -> Result<Option<String>, BridgeError> {
        match self.get(index) {
            Arg::Absent => Ok(None),
            _ => self.string(index).map(Some),
        }
    }

    /// # Errors
    /// `Type` if the argument is not an integer.
    pub fn integer(&self, index: usize) -> Result<i64, BridgeError> {
        match self.get(index) {
            Arg::Integer(n) => Ok(*n),
            _ => Err(self.mismatch(index, "integer")),
        }
    }

    /// # Errors
    /// `Type` if the argument is not a buffer.
    pub fn buffer(&self, index: usize) -> Result<HostBuffer, BridgeError> {
        match self.get(index) {
            Arg::Buffer(b) => Ok(b.clone()),
            _ => Err(self.mismatch(index, "buffer")),
        }
    }

    /// Options map; absent maps read as empty.
    ///
    /// # Errors
    /// `Type` if present but not a map.
    pub fn options(&self, index: usize) -> Result<Options<'_>, BridgeError> {
        match self.get(index) {
            Arg::Absent => Ok(Options::new(self.operation, None)),
            Arg::Map(map) => Ok(Options::new(self.operation, Some(map))),
            _ => Err(self.mismatch(index, "map")),
        }
    }

    /// # Errors
    /// `Type` if present but not an array.
    pub fn array(&self, index: usize) -> Result<&[Value], BridgeError> {
        match self.get(index) {
            Arg::Absent => Ok(&[][..]),
            Arg::Array(values) => Ok(values),
            _ => Err(self.mismatch(index, "array")),
        }
    }

    /// # Errors
    /// `Type` if the argument is not a handle.
    pub fn handle(&self, index: usize) -> Result<RawHandle, BridgeError> {
        match self.get(index) {
            Arg::Handle { raw, .. } => Ok(*raw),
            _ => Err(self.mismatch(index, "handle")),
        }
    }

    /// # Errors
    /// `Type` if the argument is not a handle.
    pub fn handle_ref(&self, index: usize) -> Result<HandleRef, BridgeError> {
        match self.get(index) {
            Arg::Handle { reference, .. } => Ok(*reference),
            _ => Err(self.mismatch(index, "handle")),
        }
    }
}

fn extract_one(
    operation: &str,
    param: &Param,
    value: Value,
    registry: &HandleRegistry,
) -> Result<Arg, BridgeError> {
    if value.is_nullish() {
        if param.required {
            return Err(BridgeError::type_error(format!(
                "{operation}: missing required argument '{}'",
                param.name
            )));
        }
        return Ok(Arg::Absent);
    }
    let wrong_shape = |value: &Value| {
        BridgeError::type_error(format!(
            "{operation}: '{}' must be {}, got {}",
            param.name,
            expected_shape(param.kind),
            value.type_name()
        ))
    };
    match (param.kind, value) {
        (ParamKind::String, Value::String(s)) => Ok(Arg::String(s)),
        (ParamKind::Integer { min, max }, value) => {
            let n = value.as_i64().ok_or_else(|| wrong_shape(&value))?;
            if n < min || n > max {
                return Err(BridgeError::range_error(format!(
                    "{operation}: '{}' out of range ({n} not in {min}..={max})",
                    param.name
                )));
            }
            Ok(Arg::Integer(n))
        }
        (ParamKind::Buffer, Value::Buffer(b)) => Ok(Arg::Buffer(b)),
        (ParamKind::Map, Value::Object(map)) => Ok(Arg::Map(map)),
        (ParamKind::Array, Value::Array(values)) => Ok(Arg::Array(values)),
        (ParamKind::Handle(kind), Value::Handle(reference)) => {
            let raw = registry.resolve(reference, kind)?;
            Ok(Arg::Handle { reference, raw })
        }
        (ParamKind::Handle(kind), _) => Err(BridgeError::InvalidHandle { expected: kind }),
        (_, value) => Err(wrong_shape(&value)),
    }
}

fn expected_shape(kind: ParamKind) -> &'static str {
    match kind {
        ParamKind::String => "a string",
        ParamKind::Integer { .. } => "an integer",
        ParamKind::Buffer => "a buffer",
        ParamKind::Map => "an object",
        ParamKind::Array => "an array",
        ParamKind::Handle(kind) => kind.name(),
    }
}

/// Read access to an optional key/value options argument.
#[derive(Debug, Clone, Copy)]
pub struct Options<'a> {
    operation: &'static str,
    map: Option<&'a Map>,
}

impl<'a> Options<'a> {
    #[must_use]
    pub fn new(operation: &'static str, map: Option<&'a Map>) -> Self {
        Self { operation, map }
    }

    #[must_use]
    pub fn as_map(&self) -> Option<&'a Map> {
        self.map
    }

    fn value(&self, key: &str) -> Option<&'a Value> {
        self.map
            .and_then(|map| map.get(key))
            .filter(|v| !v.is_nullish())
    }

    fn wrong(&self, key: &str, expected: &str) -> BridgeError {
        BridgeError::type_error(format!(
            "{}: option '{key}' must be {expected}",
            self.operation
        ))
    }

    /// # Errors
    /// `Type` if set but not a string.
    pub fn string(&self, key: &str) -> Result<Option<String>, BridgeError> {
        match self.value(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(_) => Err(self.wrong(key, "a string")),
        }
    }

    /// # Errors
    /// `Type` if missing or not a string.
    pub fn required_string(&self, key: &str) -> Result<String, BridgeError> {
        self.string(key)?
            .ok_or_else(|| self.wrong(key, "a string (required)"))
    }

    /// # Errors
    /// `Type` if set but not a boolean.
    pub fn bool(&self, key: &str, default: bool) -> Result<bool, BridgeError> {
        match self.value(key) {
            None => Ok(default),
            Some(Value::Bool(b)) => Ok(*b),
            Some(_) => Err(self.wrong(key, "a boolean")),
        }
    }

    /// # Errors
    /// `Type` if set but not an integer.
    pub fn integer(&self, key: &str, default: i64) -> Result<i64, BridgeError> {
        match self.value(key) {
            None => Ok(default),
            Some(value) => value.as_i64().ok_or_else(|| self.wrong(key, "an integer")),
        }
    }

    /// Nested string-to-string map, as custom metadata.
    ///
    /// # Errors
    /// `Type` if set but not a map of strings.
    pub fn metadata(&self, key: &str) -> Result<CustomMetadata, BridgeError> {
        match self.value(key) {
            None => Ok(CustomMetadata::new()),
            Some(Value::Object(map)) => metadata_from_map(self.operation, map),
            Some(_) => Err(self.wrong(key, "an object")),
        }
    }
}

/// # Errors
/// `Type` if any value is not a string.
pub fn metadata_from_map(operation: &str, map: &Map) -> Result<CustomMetadata, BridgeError> {
    map.iter()
        .map(|(key, value)| match value {
            Value::String(s) => Ok((key.clone(), s.clone())),
            other => Err(BridgeError::type_error(format!(
                "{operation}: metadata value for '{key}' must be a string, got {}",
                other.type_name()
            ))),
        })
        .collect()
}

// ---------------------------------------------------------------------------
// Native records to host values
// ---------------------------------------------------------------------------

/// Non-positive timestamps mean "unset".
fn timestamp(ts: i64) -> Value {
    if ts > 0 {
        Value::from(ts)
    } else {
        Value::Null
    }
}

fn system_value(system: &SystemMetadata) -> Value {
    Value::object([
        ("created", Value::from(system.created)),
        ("expires", timestamp(system.expires)),
        ("contentLength", Value::from(system.content_length)),
    ])
}

fn custom_value(custom: &CustomMetadata) -> Value {
    Value::Object(
        custom
            .iter()
            .map(|(k, v)| (k.clone(), Value::from(v.as_str())))
            .collect(),
    )
}

#[must_use]
pub fn bucket_value(bucket: &Bucket) -> Value {
    Value::object([
        ("name", Value::from(bucket.name.as_str())),
        ("created", Value::from(bucket.created)),
    ])
}

#[must_use]
pub fn object_value(object: &Object) -> Value {
    Value::object([
        ("key", Value::from(object.key.as_str())),
        ("isPrefix", Value::from(object.is_prefix)),
        ("system", system_value(&object.system)),
        ("custom", custom_value(&object.custom)),
    ])
}

#[must_use]
pub fn upload_info_value(info: &UploadInfo) -> Value {
    Value::object([
        ("uploadId", Value::from(info.upload_id.as_str())),
        ("key", Value::from(info.key.as_str())),
        ("isPrefix", Value::from(info.is_prefix)),
        ("system", system_value(&info.system)),
        ("custom", custom_value(&info.custom)),
    ])
}

#[must_use]
pub fn part_value(part: &Part) -> Value {
    Value::object([
        ("partNumber", Value::from(part.part_number)),
        ("size", Value::from(part.size)),
        ("modified", Value::from(part.modified)),
        ("etag", Value::from(part.etag.as_str())),
    ])
}

#[must_use]
pub fn credentials_value(credentials: &EdgeCredentials) -> Value {
    Value::object([
        ("accessKeyId", Value::from(credentials.access_key_id.as_str())),
        ("secretKey", Value::from(credentials.secret_key.as_str())),
        ("endpoint", Value::from(credentials.endpoint.as_str())),
    ])
}

#[must_use]
pub fn list_item_value(item: &ListItem) -> Value {
    match item {
        ListItem::Bucket(bucket) => bucket_value(bucket),
        ListItem::Object(object) => object_value(object),
        ListItem::Upload(info) => upload_info_value(info),
        ListItem::Part(part) => part_value(part),
    }
}

// ---------------------------------------------------------------------------
// Host values back to native records
// ---------------------------------------------------------------------------

/// Typed view of a resolved value.
pub trait FromValue: Sized {
    fn from_value(value: &Value) -> Option<Self>;
}

fn int_field(value: &Value, key: &str) -> i64 {
    value.get(key).and_then(Value::as_i64).unwrap_or(0)
}

fn string_field(value: &Value, key: &str) -> Option<String> {
    value.get(key).and_then(Value::as_str).map(str::to_string)
}

fn system_from(value: Option<&Value>) -> SystemMetadata {
    value.map_or_else(SystemMetadata::default, |system| SystemMetadata {
        created: int_field(system, "created"),
        expires: int_field(system, "expires"),
        content_length: int_field(system, "contentLength"),
    })
}

fn custom_from(value: Option<&Value>) -> CustomMetadata {
    value
        .and_then(Value::as_object)
        .map(|map| {
            map.iter()
                .filter_map(|(k, v)| v.as_str().map(|v| (k.clone(), v.to_string())))
                .collect()
        })
        .unwrap_or_default()
}

impl FromValue for Bucket {
    fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            name: string_field(value, "name")?,
            created: int_field(value, "created"),
        })
    }
}

impl FromValue for Object {
    fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            key: string_field(value, "key")?,
            is_prefix: value.get("isPrefix").and_then(Value::as_bool).unwrap_or(false),
            system: system_from(value.get("system")),
            custom: custom_from(value.get("custom")),
        })
    }
}

impl FromValue for UploadInfo {
    fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            upload_id: string_field(value, "uploadId")?,
            key: string_field(value, "key")?,
            is_prefix: value.get("isPrefix").and_then(Value::as_bool).unwrap_or(false),
            system: system_from(value.get("system")),
            custom: custom_from(value.get("custom")),
        })
    }
}

impl FromValue for Part {
    fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            part_number: u32::try_from(value.get("partNumber")?.as_i64()?).ok()?,
            size: u64::try_from(int_field(value, "size")).unwrap_or(0),
            modified: int_field(value, "modified"),
            etag: string_field(value, "etag").unwrap_or_default(),
        })
    }
}

impl FromValue for EdgeCredentials {
    fn from_value(value: &Value) -> Option<Self> {
        Some(Self {
            access_key_id: string_field(value, "accessKeyId")?,
            secret_key: string_field(value, "secretKey")?,
            endpoint: string_field(value, "endpoint")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const PARAMS: &[Param] = &[
        Param::string("bucket"),
        Param::integer("partNumber", 1, MAX_PART_NUMBER),
        Param::map("options").optional(),
    ];

    fn extract(values: Vec<Value>) -> Result<Args, BridgeError> {
        Args::extract("test", PARAMS, values, &HandleRegistry::new())
    }

    #[test]
    fn valid_call() {
        let args = extract(vec![Value::from("b"), Value::Number(3.0)]).unwrap();
        assert_eq!(args.string(0).unwrap(), "b");
        assert_eq!(args.integer(1).unwrap(), 3);
        assert!(!args.options(2).unwrap().bool("recursive", false).unwrap());
    }

    #[test]
    fn missing_required() {
        let err = extract(vec![Value::from("b")]).unwrap_err();
        assert!(matches!(err, BridgeError::Type(msg) if msg.contains("partNumber")));
    }

    #[test]
    fn wrong_shape_and_range() {
        let err = extract(vec![Value::Number(1.0), Value::Number(1.0)]).unwrap_err();
        assert!(matches!(err, BridgeError::Type(_)));
        let err = extract(vec![Value::from("b"), Value::Number(10_001.0)]).unwrap_err();
        assert!(matches!(err, BridgeError::Range(_)));
        let err = extract(vec![Value::from("b"), Value::Number(0.0)]).unwrap_err();
        assert!(matches!(err, BridgeError::Range(_)));
    }

    #[test]
    fn option_properties_are_typed() {
        let options = Value::object([("recursive", Value::from("yes"))]);
        let args = extract(vec![Value::from("b"), Value::Number(1.0), options]).unwrap();
        let err = args.options(2).unwrap().bool("recursive", false).unwrap_err();
        assert!(matches!(err, BridgeError::Type(_)));
    }

    #[test]
    fn non_handle_in_handle_slot_is_invalid_handle() {
        let params = [Param::handle("project", HandleKind::Project)];
        let err = Args::extract(
            "test",
            &params,
            vec![Value::from("project")],
            &HandleRegistry::new(),
        )
        .unwrap_err();
        assert!(matches!(err, BridgeError::InvalidHandle { .. }));
    }

    #[test]
    fn expiration_sentinel_is_null() {
        let object = Object {
            key: "k".into(),
            is_prefix: false,
            system: SystemMetadata {
                created: 10,
                expires: 0,
                content_length: 4,
            },
            custom: vec![("a".into(), "b".into())],
        };
        let value = object_value(&object);
        let system = value.get("system").unwrap();
        assert_eq!(system.get("expires"), Some(&Value::Null));
        assert_eq!(system.get("contentLength").and_then(Value::as_i64), Some(4));
        assert_eq!(
            value.get("custom").unwrap().get("a").and_then(Value::as_str),
            Some("b")
        );
        let back = Object::from_value(&value).unwrap();
        assert_eq!(back, object);
    }

    #[test]
    fn part_requires_a_number() {
        let part = Part {
            part_number: 3,
            size: 10,
            modified: 7,
            etag: "e".into(),
        };
        assert_eq!(Part::from_value(&part_value(&part)), Some(part));
        assert_eq!(Part::from_value(&Value::object([("etag", Value::from("e"))])), None);
    }
}
