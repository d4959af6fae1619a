//! Tabular record model.

use std::collections::HashMap;

/// Cell values treated as missing, the same set a dataframe `dropna` honors.
const NA_TOKENS: &[&str] = &[
    "", "NA", "N/A", "n/a", "NaN", "nan", "-NaN", "-nan", "null", "NULL", "None", "#N/A", "<NA>",
];

/// Returns true if a raw cell value counts as missing.
pub fn is_missing(value: &str) -> bool {
    let trimmed = value.trim();
    NA_TOKENS.contains(&trimmed)
}

/// One row of the bulk source: field name to scalar value.
///
/// Missing cells are never stored, so `get` returning `None` covers both
/// absent columns and NA cells.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Record {
    ordinal: u64,
    fields: HashMap<String, String>,
}

impl Record {
    /// Build a record from raw `(column, cell)` pairs, dropping missing cells.
    pub fn from_pairs<I, K, V>(ordinal: u64, pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: AsRef<str>,
    {
        let fields = pairs
            .into_iter()
            .filter(|(_, v)| !is_missing(v.as_ref()))
            .map(|(k, v)| (k.into(), v.as_ref().trim().to_string()))
            .collect();
        Self { ordinal, fields }
    }

    /// 0-based position of this record in the source.
    pub fn ordinal(&self) -> u64 {
        self.ordinal
    }

    pub fn get(&self, field: &str) -> Option<&str> {
        self.fields.get(field).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// True if every required field has a value.
    pub fn is_complete<S: AsRef<str>>(&self, required: &[S]) -> bool {
        required.iter().all(|f| self.fields.contains_key(f.as_ref()))
    }

    /// First required field without a value, if any.
    pub fn first_missing<'a, S: AsRef<str>>(&self, required: &'a [S]) -> Option<&'a str> {
        required
            .iter()
            .map(AsRef::as_ref)
            .find(|f| !self.fields.contains_key(*f))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_missing() {
        assert!(is_missing(""));
        assert!(is_missing("   "));
        assert!(is_missing("NaN"));
        assert!(is_missing(" NA "));
        assert!(is_missing("null"));
        assert!(!is_missing("0"));
        assert!(!is_missing("?"));
        assert!(!is_missing("chevrolet chevelle malibu"));
    }

    #[test]
    fn test_from_pairs_drops_missing_and_trims() {
        let record = Record::from_pairs(7, [("name", " ford torino "), ("mpg", ""), ("origin", "usa")]);

        assert_eq!(record.ordinal(), 7);
        assert_eq!(record.get("name"), Some("ford torino"));
        assert_eq!(record.get("mpg"), None);
        assert_eq!(record.len(), 2);
    }

    #[test]
    fn test_completeness() {
        let record = Record::from_pairs(0, [("name", "amc hornet"), ("mpg", "NaN")]);

        assert!(record.is_complete(&["name"]));
        assert!(!record.is_complete(&["name", "mpg"]));
        assert!(!record.is_complete(&["name", "weight"]));
        assert_eq!(record.first_missing(&["name", "mpg"]), Some("mpg"));
        assert_eq!(record.first_missing(&["name"]), None);
    }
}
