//! Recipient row parser.
//!
//! Turns an uploaded tabular file (one header row + data rows) into row
//! objects. Pure: no I/O beyond reading the given source, no knowledge of
//! campaigns or column mappings.

use std::io::Read;

use crate::error::Result;

/// One parsed data row: its position in the file and an ordered mapping
/// of column name to raw text value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientRow {
    /// 0-based position among data rows. Header excluded.
    pub index: usize,
    fields: Vec<(String, String)>,
}

impl RecipientRow {
    /// Look up a column value by name. Column names compare
    /// case-insensitively; values are returned as stored.
    pub fn get(&self, column: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(column))
            .map(|(_, value)| value.as_str())
    }

    /// The row's columns in file order.
    pub fn fields(&self) -> &[(String, String)] {
        &self.fields
    }

    /// Encode the row as a JSON object for storage.
    pub fn to_json(&self) -> String {
        let map: serde_json::Map<String, serde_json::Value> = self
            .fields
            .iter()
            .map(|(name, value)| (name.clone(), serde_json::Value::String(value.clone())))
            .collect();
        serde_json::Value::Object(map).to_string()
    }
}

/// Parse a CSV source into recipient rows.
///
/// The first record is the header; column names are arbitrary and mapped
/// later via the campaign's column-mapping spec. Short rows are padded
/// implicitly (missing cells read as absent), long rows keep only the
/// headered columns.
pub fn parse_recipient_rows<R: Read>(reader: R) -> Result<Vec<RecipientRow>> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let headers: Vec<String> = csv_reader
        .headers()?
        .iter()
        .map(|h| h.trim().to_string())
        .collect();

    let mut rows = Vec::new();
    for (index, record) in csv_reader.records().enumerate() {
        let record = record?;
        let fields = headers
            .iter()
            .enumerate()
            .map(|(col, name)| {
                let value = record.get(col).unwrap_or("").to_string();
                (name.clone(), value)
            })
            .collect();
        rows.push(RecipientRow { index, fields });
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Phone,Name,Due Date
+1 555 000 0001,Alice,2026-03-01
+1 555 000 0002,Bob,2026-03-02
";

    #[test]
    fn parses_rows_in_order_with_headers() {
        let rows = parse_recipient_rows(SAMPLE.as_bytes()).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].index, 0);
        assert_eq!(rows[1].index, 1);
        assert_eq!(rows[0].get("Phone"), Some("+1 555 000 0001"));
        assert_eq!(rows[1].get("Name"), Some("Bob"));
    }

    #[test]
    fn column_lookup_is_case_insensitive() {
        let rows = parse_recipient_rows(SAMPLE.as_bytes()).unwrap();
        assert_eq!(rows[0].get("phone"), Some("+1 555 000 0001"));
        assert_eq!(rows[0].get("DUE DATE"), Some("2026-03-01"));
        assert_eq!(rows[0].get("missing"), None);
    }

    #[test]
    fn short_rows_read_as_absent_cells() {
        let source = "phone,name\n5550001111\n";
        let rows = parse_recipient_rows(source.as_bytes()).unwrap();
        assert_eq!(rows[0].get("phone"), Some("5550001111"));
        assert_eq!(rows[0].get("name"), Some(""));
    }

    #[test]
    fn empty_file_yields_no_rows() {
        let rows = parse_recipient_rows("phone,name\n".as_bytes()).unwrap();
        assert!(rows.is_empty());
    }

    #[test]
    fn row_encodes_to_json_object() {
        let rows = parse_recipient_rows(SAMPLE.as_bytes()).unwrap();
        let json: serde_json::Value = serde_json::from_str(&rows[0].to_json()).unwrap();
        assert_eq!(json["Name"], "Alice");
        assert_eq!(json["Due Date"], "2026-03-01");
    }
}
