//! Defaulting: a pure function over the enumerated defaults table.
//!
//! Runs before constraint checking. Never touches its input; returns a new
//! document with every absent field in [`DEFAULTS`] filled in. Parent objects
//! are filled before their children, so `s3Bucket.region` gets a value even
//! when `s3Bucket` itself was omitted. JSON `null` counts as absent.

use serde_json::{Map, Value, json};

/// Region used when `s3Bucket.region` is omitted.
pub const DEFAULT_REGION: &str = "eu-west-3";

/// A literal default value.
#[derive(Clone, Copy, Debug)]
enum Literal {
    Str(&'static str),
    Bool(bool),
    Int(u64),
    Object,
    Array,
}

impl Literal {
    fn to_value(self) -> Value {
        match self {
            Self::Str(s) => Value::String(s.to_string()),
            Self::Bool(b) => Value::Bool(b),
            Self::Int(n) => json!(n),
            Self::Object => Value::Object(Map::new()),
            Self::Array => Value::Array(Vec::new()),
        }
    }
}

/// The defaults table, parents before children.
const DEFAULTS: &[(&[&str], Literal)] = &[
    (&["output"], Literal::Str("PDF")),
    (&["cookies"], Literal::Array),
    (&["s3Bucket"], Literal::Object),
    (&["s3Bucket", "region"], Literal::Str(DEFAULT_REGION)),
    (&["s3Bucket", "credentials"], Literal::Object),
    (&["defaultViewport"], Literal::Object),
    (&["defaultViewport", "width"], Literal::Int(1440)),
    (&["defaultViewport", "height"], Literal::Int(1080)),
    (&["options"], Literal::Object),
    (&["options", "displayHeaderFooter"], Literal::Bool(false)),
    (&["options", "printBackground"], Literal::Bool(true)),
    (&["options", "landscape"], Literal::Bool(false)),
    (&["options", "pageRanges"], Literal::Str("")),
    (&["options", "format"], Literal::Str("Letter")),
    (&["options", "preferCSSPageSize"], Literal::Bool(false)),
];

/// Return a copy of `body` with every default applied.
///
/// Non-object bodies are returned unchanged (minus nulls); constraint
/// checking reports them.
pub fn apply_defaults(body: &Value) -> Value {
    let mut out = strip_nulls(body);
    if out.is_object() {
        for (path, literal) in DEFAULTS {
            fill(&mut out, path, *literal);
        }
    }
    out
}

fn fill(root: &mut Value, path: &[&str], literal: Literal) {
    let Some((leaf, parents)) = path.split_last() else {
        return;
    };
    let mut cursor = root;
    for key in parents {
        match cursor.get_mut(*key) {
            Some(next) if next.is_object() => cursor = next,
            // Absent or wrong-typed parent: leave it for constraint checking.
            _ => return,
        }
    }
    if let Value::Object(map) = cursor {
        let _ = map
            .entry((*leaf).to_string())
            .or_insert_with(|| literal.to_value());
    }
}

fn strip_nulls(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(
            map.iter()
                .filter(|(_, v)| !v.is_null())
                .map(|(k, v)| (k.clone(), strip_nulls(v)))
                .collect(),
        ),
        Value::Array(items) => Value::Array(items.iter().map(strip_nulls).collect()),
        other => other.clone(),
    }
}
