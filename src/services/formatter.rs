//! Record-to-text synthesis.

use crate::models::{FieldSpec, PipelineConfig, Record};

/// Renders records through a fixed `Label: value` template.
#[derive(Debug, Clone)]
pub struct RecordFormatter {
    fields: Vec<FieldSpec>,
    required: Vec<String>,
}

impl RecordFormatter {
    pub fn new(fields: Vec<FieldSpec>) -> Self {
        let required = fields.iter().map(|f| f.column.clone()).collect();
        Self { fields, required }
    }

    pub fn from_config(config: &PipelineConfig) -> Self {
        Self::new(config.fields.clone())
    }

    /// Columns a record must carry to be formatted.
    pub fn required_fields(&self) -> &[String] {
        &self.required
    }

    /// Keep complete records, paired with their offset in the original chunk.
    pub fn retain_complete(&self, chunk: Vec<Record>) -> Vec<(usize, Record)> {
        chunk
            .into_iter()
            .enumerate()
            .filter(|(offset, record)| match record.first_missing(&self.required) {
                None => true,
                Some(field) => {
                    tracing::debug!(
                        row = record.ordinal(),
                        offset = *offset,
                        field,
                        "Dropping incomplete record"
                    );
                    false
                }
            })
            .collect()
    }

    /// Render a complete record. Absent values render as empty strings, which
    /// only happens if the record skipped `retain_complete`.
    pub fn format(&self, record: &Record) -> String {
        self.fields
            .iter()
            .map(|f| format!("{}: {}", f.label, record.get(&f.column).unwrap_or_default()))
            .collect::<Vec<_>>()
            .join(", ")
    }
}

impl Default for RecordFormatter {
    fn default() -> Self {
        Self::from_config(&PipelineConfig::default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn full_record(ordinal: u64) -> Record {
        Record::from_pairs(
            ordinal,
            [
                ("name", "chevrolet chevelle malibu"),
                ("mpg", "18"),
                ("cylinders", "8"),
                ("displacement", "307"),
                ("horsepower", "130"),
                ("weight", "3504"),
                ("acceleration", "12"),
                ("model_year", "70"),
                ("origin", "usa"),
            ],
        )
    }

    #[test]
    fn test_default_template() {
        let formatter = RecordFormatter::default();
        let text = formatter.format(&full_record(0));

        assert_eq!(
            text,
            "Name: chevrolet chevelle malibu, MPG: 18, Cylinders: 8, Displacement: 307, \
             Horsepower: 130, Weight: 3504, Acceleration: 12, Model Year: 70, Origin: usa"
        );
    }

    #[test]
    fn test_every_value_once_in_order() {
        let formatter = RecordFormatter::new(vec![
            FieldSpec::new("a", "A"),
            FieldSpec::new("b", "B"),
            FieldSpec::new("c", "C"),
        ]);
        let record = Record::from_pairs(0, [("c", "gamma"), ("a", "alpha"), ("b", "beta")]);
        let text = formatter.format(&record);

        assert!(!text.is_empty());
        for value in ["alpha", "beta", "gamma"] {
            assert_eq!(text.matches(value).count(), 1);
        }
        let positions: Vec<usize> = ["alpha", "beta", "gamma"]
            .iter()
            .map(|v| text.find(v).unwrap())
            .collect();
        assert!(positions.windows(2).all(|w| w[0] < w[1]));
    }

    #[test]
    fn test_format_is_deterministic() {
        let formatter = RecordFormatter::default();
        let record = full_record(4);
        assert_eq!(formatter.format(&record), formatter.format(&record.clone()));
    }

    #[test]
    fn test_retain_complete_keeps_original_offsets() {
        let formatter = RecordFormatter::default();
        let chunk = vec![
            full_record(10),
            Record::from_pairs(11, [("name", "ford pinto"), ("mpg", "")]),
            full_record(12),
        ];

        let kept = formatter.retain_complete(chunk);
        let offsets: Vec<usize> = kept.iter().map(|(o, _)| *o).collect();
        assert_eq!(offsets, vec![0, 2]);
        assert_eq!(kept[1].1.ordinal(), 12);
    }

    #[test]
    fn test_extra_columns_ignored() {
        let formatter = RecordFormatter::new(vec![FieldSpec::new("name", "Name")]);
        let record = Record::from_pairs(0, [("name", "saab 99e"), ("price", "1000")]);

        assert_eq!(formatter.required_fields(), ["name"]);
        assert_eq!(formatter.format(&record), "Name: saab 99e");
    }
}
