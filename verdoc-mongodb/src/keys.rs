//! Field-name escaping for MongoDB key restrictions.
//!
//! MongoDB forbids dots, dollar signs, and null bytes in stored field names.
//! Documents here carry open-ended, caller-chosen field names, so keys are
//! percent-escaped on the way in and restored on the way out. Only keys are
//! rewritten; string values pass through untouched. Caller-supplied query
//! filters are also passed through verbatim, since their keys are native
//! MongoDB query syntax.

use bson::{Bson, Document as RawDocument};

// Order matters: '%' must be escaped first and restored last.
const ESCAPES: [(&str, &str); 4] = [
    ("%", "%25"),
    (".", "%2E"),
    ("$", "%24"),
    ("\0", "%00"),
];

fn escape_key(key: &str) -> String {
    let mut escaped = key.to_string();
    for (raw, replacement) in ESCAPES {
        escaped = escaped.replace(raw, replacement);
    }
    escaped
}

fn restore_key(key: &str) -> String {
    let mut restored = key.to_string();
    for (raw, replacement) in ESCAPES.iter().rev() {
        restored = restored.replace(*replacement, *raw);
    }
    restored
}

fn map_keys(value: &Bson, f: fn(&str) -> String) -> Bson {
    match value {
        Bson::Array(items) => Bson::Array(items.iter().map(|item| map_keys(item, f)).collect()),
        Bson::Document(doc) => Bson::Document(
            doc.iter()
                .map(|(key, value)| (f(key), map_keys(value, f)))
                .collect(),
        ),
        other => other.clone(),
    }
}

/// Escapes every field name in the record, recursively.
pub(crate) fn escape_record(record: &RawDocument) -> RawDocument {
    record
        .iter()
        .map(|(key, value)| (escape_key(key), map_keys(value, escape_key)))
        .collect()
}

/// Restores every field name in a record fetched from MongoDB.
pub(crate) fn restore_record(record: &RawDocument) -> RawDocument {
    record
        .iter()
        .map(|(key, value)| (restore_key(key), map_keys(value, restore_key)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;

    #[test]
    fn escape_and_restore_are_inverse() {
        let record = doc! {
            "price.usd": 10,
            "$meta": { "a.b": [ { "100%": true } ] },
            "plain": "a.b $ untouched",
        };

        let escaped = escape_record(&record);
        assert!(escaped.get("price%2Eusd").is_some());
        assert!(escaped.get("%24meta").is_some());
        assert_eq!(escaped.get("plain"), record.get("plain"));

        assert_eq!(restore_record(&escaped), record);
    }

    #[test]
    fn percent_escaping_is_unambiguous() {
        let record = doc! { "100%24": 1 };
        assert_eq!(restore_record(&escape_record(&record)), record);
    }
}
