// ── JSON flattening ──
//
// Objects become dotted paths, arrays get `[i]` suffixes, nulls vanish.
// `{"data":{"list":[{"a":1}]}}` flattens to `data.list[0].a = 1`.

use serde_json::Value;

use crate::error::Error;
use crate::fields::{FieldBag, FieldValue};

pub fn parse(body: &str) -> Result<Value, Error> {
    serde_json::from_str(body).map_err(|e| Error::malformed("JSON", e.to_string()))
}

pub fn flatten(value: &Value) -> FieldBag {
    let mut bag = FieldBag::new();
    walk(value, String::new(), &mut bag);
    bag
}

fn walk(value: &Value, path: String, bag: &mut FieldBag) {
    match value {
        Value::Null => {}
        Value::Bool(b) => bag.insert(path, FieldValue::Bool(*b)),
        Value::Number(n) => {
            if let Some(f) = n.as_f64() {
                bag.insert(path, FieldValue::Number(f));
            }
        }
        Value::String(s) => bag.insert(path, FieldValue::Text(s.clone())),
        Value::Array(items) => {
            for (i, item) in items.iter().enumerate() {
                walk(item, format!("{path}[{i}]"), bag);
            }
        }
        Value::Object(map) => {
            for (key, item) in map {
                let child = if path.is_empty() {
                    key.clone()
                } else {
                    format!("{path}.{key}")
                };
                walk(item, child, bag);
            }
        }
    }
}
