//! Row materialization: column fill, key flattening, sanitization

use crate::grid::ColumnTransform;
use crate::path;
use crate::sanitize::sanitize;
use crate::types::{Headings, OutputRow, SourceRecord, Value};

/// Deepest dotted key that is followed; longer keys export as empty cells
pub const MAX_PATH_DEPTH: usize = 3;

/// Look up a column key in a display record.
///
/// Keys with more than [`MAX_PATH_DEPTH`] segments and paths that do not
/// exist both yield `None`.
pub fn lookup<'a>(record: &'a SourceRecord, key: &str) -> Option<&'a Value> {
    let segments = path::segments(key);
    if segments.len() > MAX_PATH_DEPTH {
        return None;
    }
    path::get(record, &segments)
}

/// Run every transform over the batch, in order
pub fn apply_transforms(
    batch: Vec<SourceRecord>,
    transforms: &[Box<dyn ColumnTransform>],
) -> Vec<SourceRecord> {
    if transforms.is_empty() {
        return batch;
    }
    let originals = batch.clone();
    transforms
        .iter()
        .fold(batch, |records, transform| transform.fill(records, &originals))
}

/// Build one output row from a display record
pub fn flatten(record: &SourceRecord, columns: &Headings) -> OutputRow {
    let mut row = OutputRow::with_capacity(columns.len());
    for (key, label) in columns {
        let raw = lookup(record, key).and_then(Value::to_text);
        row.push(label.as_str(), sanitize(raw.as_deref()));
    }
    row
}

/// Convert a chunk of source records into output rows
pub fn materialize(
    batch: Vec<SourceRecord>,
    transforms: &[Box<dyn ColumnTransform>],
    columns: &Headings,
) -> Vec<OutputRow> {
    apply_transforms(batch, transforms)
        .iter()
        .map(|record| flatten(record, columns))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::DisplayColumn;
    use crate::types::record;

    fn people() -> Vec<SourceRecord> {
        vec![
            record([
                ("name", Value::from("Ann")),
                ("addr", [("city", "NYC")].into_iter().collect()),
            ]),
            record([
                ("name", Value::from("Bo")),
                ("addr", [("city", "LA")].into_iter().collect()),
            ]),
        ]
    }

    fn headings(pairs: &[(&str, &str)]) -> Headings {
        pairs
            .iter()
            .map(|(k, l)| (k.to_string(), l.to_string()))
            .collect()
    }

    #[test]
    fn test_flattens_dotted_keys_under_labels() {
        let columns = headings(&[("name", "Name"), ("addr.city", "City")]);
        let rows = materialize(people(), &[], &columns);

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].iter().collect::<Vec<_>>(), vec![("Name", "Ann"), ("City", "NYC")]);
        assert_eq!(rows[1].iter().collect::<Vec<_>>(), vec![("Name", "Bo"), ("City", "LA")]);
    }

    #[test]
    fn test_three_segments_followed_four_dropped() {
        let deep: Value = [(
            "b",
            [("c", [("d", "deep")].into_iter().collect::<Value>())]
                .into_iter()
                .collect::<Value>(),
        )]
        .into_iter()
        .collect();
        let rec = record([("a", deep)]);

        assert_eq!(lookup(&rec, "a.b.c"), Some(&[("d", "deep")].into_iter().collect()));
        assert_eq!(lookup(&rec, "a.b.c.d"), None);
    }

    #[test]
    fn test_missing_path_is_empty_cell() {
        let columns = headings(&[("addr.zip", "Zip"), ("nope", "Nope"), ("name.x", "X")]);
        let rows = materialize(people(), &[], &columns);

        assert_eq!(rows[0].len(), 3);
        assert!(rows[0].values().all(str::is_empty));
    }

    #[test]
    fn test_values_sanitized() {
        let rec = record([("bio", "<p>Hi</p><script>steal()</script>")]);
        let row = flatten(&rec, &headings(&[("bio", "Bio")]));
        assert_eq!(row.get("Bio"), Some("Hi"));
    }

    #[test]
    fn test_transforms_run_in_order() {
        let transforms: Vec<Box<dyn ColumnTransform>> = vec![
            Box::new(DisplayColumn::new("name", |v: &Value, _: &SourceRecord| {
                Value::from(format!("{}!", v))
            })),
            Box::new(DisplayColumn::new("name", |v: &Value, original: &SourceRecord| {
                Value::from(format!("{} ({})", v, original["name"]))
            })),
        ];
        let rows = materialize(people(), &transforms, &headings(&[("name", "Name")]));

        assert_eq!(rows[0].get("Name"), Some("Ann! (Ann)"));
    }

    #[test]
    fn test_scalar_rendering() {
        let rec = record([
            ("id", Value::Int(7)),
            ("score", Value::Float(9.5)),
            ("active", Value::Bool(true)),
            ("deleted", Value::Bool(false)),
            ("note", Value::Null),
        ]);
        let columns = headings(&[
            ("id", "ID"),
            ("score", "Score"),
            ("active", "Active"),
            ("deleted", "Deleted"),
            ("note", "Note"),
        ]);
        let row = flatten(&rec, &columns);

        assert_eq!(row.values().collect::<Vec<_>>(), vec!["7", "9.5", "1", "", ""]);
    }
}
