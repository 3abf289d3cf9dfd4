//! 🗂️ Section rows: who they are, when, and how many kids they have.

use crate::classifier::ClassifiedDocument;
use crate::common::{RecordKind, Row};
use crate::transforms::{RowTransform, attr, or_empty};

/// 🗂️ Marker type for section rows.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SectionRows;

impl RowTransform for SectionRows {
    fn transform_row(classified: &ClassifiedDocument, run_id: &str) -> Row {
        let doc = &classified.document;
        let child_count = i64::try_from(doc.child_count()).unwrap_or(i64::MAX);

        Row::new(classified.path.clone())
            .with_string(attr::PATH, classified.path.clone())
            .with_string(attr::SECTION, classified.section_path.clone())
            .with_string(attr::KIND, RecordKind::Section.as_str())
            .with_string(attr::DATE, or_empty(&doc.date))
            .with_string(attr::TITLE, or_empty(&doc.title))
            .with_string(attr::SUMMARY, or_empty(&doc.summary))
            .with_number(attr::CHILD_COUNT, child_count)
            .with_string(attr::SYNC_RUN_ID, run_id)
    }
}
