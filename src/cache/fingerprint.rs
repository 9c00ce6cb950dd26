use serde_json::Value;
use sha2::Digest;
use sha2::Sha256;

use crate::constants::FINGERPRINT_HASH_LEN;
use crate::constants::FINGERPRINT_SEPARATOR;
use crate::FeedbackOptions;

/// Derives the cache key for `key` (usually an identity key) and its options.
///
/// Options are serialized canonically (object keys sorted at every depth)
/// before hashing, so logically identical option sets share a fingerprint
/// regardless of insertion order. Empty options add no suffix.
pub fn fingerprint(
    key: &str,
    options: &FeedbackOptions,
) -> String {
    if options.is_empty() {
        return key.to_string();
    }

    let mut canonical = String::new();
    write_canonical_object(options.iter(), &mut canonical);

    let digest = Sha256::digest(canonical.as_bytes());
    let mut hash = hex::encode(digest);
    hash.truncate(FINGERPRINT_HASH_LEN);

    format!("{key}{FINGERPRINT_SEPARATOR}{hash}")
}

/// Order independent JSON text of `value`
pub fn canonical_json(value: &Value) -> String {
    let mut out = String::new();
    write_canonical(value, &mut out);
    out
}

fn write_canonical(
    value: &Value,
    out: &mut String,
) {
    match value {
        Value::Object(map) => write_canonical_object(map.iter(), out),
        Value::Array(items) => {
            out.push('[');
            for (i, item) in items.iter().enumerate() {
                if i > 0 {
                    out.push(',');
                }
                write_canonical(item, out);
            }
            out.push(']');
        }
        // Scalars have a single textual form
        other => out.push_str(&other.to_string()),
    }
}

fn write_canonical_object<'a>(
    entries: impl Iterator<Item = (&'a String, &'a Value)>,
    out: &mut String,
) {
    let mut entries: Vec<_> = entries.collect();
    entries.sort_by(|a, b| a.0.cmp(b.0));

    out.push('{');
    for (i, (key, value)) in entries.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        out.push_str(&Value::String(key.clone()).to_string());
        out.push(':');
        write_canonical(value, out);
    }
    out.push('}');
}
