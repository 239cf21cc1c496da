//! Structural signatures for block equality.
//!
//! Two blocks are structurally equal when their identity-stripped values
//! serialize to the same canonical bytes. Object keys are written in sorted
//! order, so the hash never depends on map iteration order.

use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};

use crate::block::BlockRef;

/// SHA-256 of a block's canonical, identity-stripped form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Signature(String);

impl Signature {
    /// Signature of an arbitrary JSON value with every `id` key removed.
    pub fn of_value(value: &Value) -> Self {
        let mut hasher = Sha256::new();
        write_canonical(value, &mut hasher);
        Self(hex::encode(hasher.finalize()))
    }

    /// Signature used by the three-way merge.
    ///
    /// Leaves hash their type and attributes. A columns container hashes its
    /// own attributes plus its layout (column ids and the identities of the
    /// children in each column); the children's content is merged on its
    /// own and does not feed into the container's signature.
    pub fn of_block(block: BlockRef<'_>) -> Self {
        let mut canonical = serde_json::Map::new();
        canonical.insert("type".into(), Value::String(block.block_type().to_string()));
        for (key, value) in block.attributes() {
            canonical.insert(key, value);
        }
        if let BlockRef::Columns(cols) = block {
            let layout = cols
                .layout()
                .into_iter()
                .map(|(col, children)| {
                    Value::Array(vec![
                        Value::String(col.to_string()),
                        Value::Array(children.into_iter().map(|c| Value::String(c.into())).collect()),
                    ])
                })
                .collect();
            canonical.insert("layout".into(), Value::Array(layout));
        }

        let mut hasher = Sha256::new();
        write_value(&Value::Object(canonical), &mut hasher);
        Self(hex::encode(hasher.finalize()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for Signature {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0[..12.min(self.0.len())])
    }
}

fn write_canonical(value: &Value, hasher: &mut Sha256) {
    match value {
        Value::Object(map) => {
            let stripped: serde_json::Map<String, Value> = map
                .iter()
                .filter(|(key, _)| key.as_str() != "id")
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            write_object(&stripped, hasher, write_canonical);
        }
        Value::Array(items) => write_array(items, hasher, write_canonical),
        scalar => write_scalar(scalar, hasher),
    }
}

// Writes the value as-is; callers have already decided which keys belong.
fn write_value(value: &Value, hasher: &mut Sha256) {
    match value {
        Value::Object(map) => write_object(map, hasher, write_value),
        Value::Array(items) => write_array(items, hasher, write_value),
        scalar => write_scalar(scalar, hasher),
    }
}

fn write_object(
    map: &serde_json::Map<String, Value>,
    hasher: &mut Sha256,
    nested: fn(&Value, &mut Sha256),
) {
    let mut keys: Vec<&String> = map.keys().collect();
    keys.sort();
    hasher.update(b"{");
    for (i, key) in keys.into_iter().enumerate() {
        if i > 0 {
            hasher.update(b",");
        }
        write_scalar(&Value::String(key.clone()), hasher);
        hasher.update(b":");
        if let Some(value) = map.get(key) {
            nested(value, hasher);
        }
    }
    hasher.update(b"}");
}

fn write_array(items: &[Value], hasher: &mut Sha256, nested: fn(&Value, &mut Sha256)) {
    hasher.update(b"[");
    for (i, item) in items.iter().enumerate() {
        if i > 0 {
            hasher.update(b",");
        }
        nested(item, hasher);
    }
    hasher.update(b"]");
}

fn write_scalar(value: &Value, hasher: &mut Sha256) {
    hasher.update(value.to_string().as_bytes());
}
