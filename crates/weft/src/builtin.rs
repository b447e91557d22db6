//! Built-in method providers.
//!
//! The binary registers a small `table` component at startup so pipelines
//! run without any external provider: `load` reads a JSON file or an inline
//! value, `clean` drops nulls, `stats` summarizes numeric lists, and
//! `select` projects a key out of an object.
use semver::Version;
use serde_json::{json, Value};

use weft_core::registry::style::InputShape;
use weft_core::registry::{callable, MethodDef, MethodProvider};

pub struct TableProvider;

impl MethodProvider for TableProvider {
    fn name(&self) -> &str {
        "builtin-table"
    }

    fn methods(&self) -> Vec<MethodDef> {
        vec![
            MethodDef::new(
                "table",
                "mem",
                "load",
                callable(|args| async move {
                    if let Some(value) = args.arg("value") {
                        return Ok(value.clone());
                    }
                    let path = args.require("path")?;
                    let Value::String(path) = path else {
                        return Err("'path' must be a string".into());
                    };
                    let contents = std::fs::read_to_string(path)
                        .map_err(|e| format!("failed to read '{}': {}", path, e))?;
                    let value: Value = serde_json::from_str(&contents)
                        .map_err(|e| format!("invalid JSON in '{}': {}", path, e))?;
                    Ok(value)
                }),
            )
            .version(Version::new(1, 0, 0))
            .description("Load a JSON document from disk or pass through an inline value"),
            MethodDef::new(
                "table",
                "mem",
                "clean",
                callable(|args| async move {
                    let input = args
                        .primary
                        .clone()
                        .or_else(|| args.arg("df").cloned())
                        .ok_or("clean needs a primary input or a 'df' argument")?;
                    Ok(drop_nulls(input))
                }),
            )
            .version(Version::new(1, 0, 0))
            .takes_primary(true)
            .description("Drop null entries from lists and objects"),
            MethodDef::new(
                "table",
                "mem",
                "stats",
                callable(|args| async move {
                    let input = args
                        .primary
                        .clone()
                        .or_else(|| args.arg("df").cloned())
                        .ok_or("stats needs a primary input or a 'df' argument")?;
                    let Value::Array(items) = input else {
                        return Err("stats expects a list".into());
                    };
                    let numbers: Vec<f64> =
                        items.iter().filter_map(|v| v.as_f64()).collect();
                    if numbers.is_empty() {
                        return Ok(json!({ "count": 0 }));
                    }
                    let count = numbers.len();
                    let sum: f64 = numbers.iter().sum();
                    let min = numbers.iter().cloned().fold(f64::INFINITY, f64::min);
                    let max = numbers.iter().cloned().fold(f64::NEG_INFINITY, f64::max);
                    Ok(json!({
                        "count": count,
                        "min": min,
                        "max": max,
                        "mean": sum / count as f64,
                    }))
                }),
            )
            .version(Version::new(1, 0, 0))
            .takes_primary(true)
            .input_shape(InputShape::List)
            .description("Summarize a numeric list"),
            MethodDef::new(
                "table",
                "mem",
                "select",
                callable(|args| async move {
                    let input = args
                        .primary
                        .clone()
                        .ok_or("select needs a primary input")?;
                    let key = args.require("key")?;
                    let Value::String(key) = key else {
                        return Err("'key' must be a string".into());
                    };
                    let Value::Object(map) = input else {
                        return Err("select expects an object".into());
                    };
                    map.get(key)
                        .cloned()
                        .ok_or_else(|| format!("key '{}' not present", key).into())
                }),
            )
            .version(Version::new(1, 0, 0))
            .takes_primary(true)
            .description("Project one key out of an object"),
        ]
    }
}

fn drop_nulls(value: Value) -> Value {
    match value {
        Value::Array(items) => Value::Array(
            items
                .into_iter()
                .filter(|v| !v.is_null())
                .map(drop_nulls)
                .collect(),
        ),
        Value::Object(map) => Value::Object(
            map.into_iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k, drop_nulls(v)))
                .collect(),
        ),
        other => other,
    }
}
