//! Dotted key paths into nested records

use crate::types::{SourceRecord, Value};
use indexmap::IndexMap;

/// Path segment delimiter
pub const DELIMITER: char = '.';

/// Split a key into its path segments
pub fn segments(key: &str) -> Vec<&str> {
    key.split(DELIMITER).collect()
}

/// Follow `segments` through a record. `None` when any step is missing.
pub fn get<'a>(record: &'a SourceRecord, segments: &[&str]) -> Option<&'a Value> {
    let (first, rest) = segments.split_first()?;
    rest.iter()
        .try_fold(record.get(*first)?, |value, segment| value.get(segment))
}

/// Write `value` at a dotted key, creating intermediate maps as needed.
///
/// An intermediate scalar in the way is replaced by a map.
pub fn set(record: &mut SourceRecord, key: &str, value: Value) {
    let parts = segments(key);
    let Some((last, parents)) = parts.split_last() else {
        return;
    };

    let mut map = record;
    for part in parents {
        let slot = map
            .entry((*part).to_string())
            .or_insert_with(|| Value::Map(IndexMap::new()));
        if !matches!(slot, Value::Map(_)) {
            *slot = Value::Map(IndexMap::new());
        }
        let Value::Map(inner) = slot else {
            return;
        };
        map = inner;
    }
    map.insert((*last).to_string(), value);
}
