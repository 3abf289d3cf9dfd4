//! 📄 Page rows: the full-fat shape, search blob included.

use crate::classifier::ClassifiedDocument;
use crate::common::{RawDocument, RecordKind, Row};
use crate::transforms::{RowTransform, attr, or_empty, or_empty_list};

/// 📄 Marker type for leaf page rows.
#[derive(Debug, Clone, Copy)]
pub(crate) struct PageRows;

impl RowTransform for PageRows {
    fn transform_row(classified: &ClassifiedDocument, run_id: &str) -> Row {
        let doc = &classified.document;
        let tags = or_empty_list(&doc.tags);
        let categories = or_empty_list(&doc.categories);
        let images = or_empty_list(&doc.images);

        Row::new(classified.path.clone())
            .with_string(attr::PATH, classified.path.clone())
            .with_string(attr::SECTION, classified.section_path.clone())
            .with_string(attr::KIND, RecordKind::Page.as_str())
            .with_string(attr::DATE, or_empty(&doc.date))
            .with_string(attr::TITLE, or_empty(&doc.title))
            .with_string(attr::SUMMARY, or_empty(&doc.summary))
            .with_string(attr::CONTENT_HTML, or_empty(&doc.content))
            .with_string(attr::TAGS, tags.join(" "))
            .with_string(attr::CATEGORIES, categories.join(" "))
            .with_string(attr::IMAGE, images.first().cloned().unwrap_or_default())
            .with_string(attr::SEARCH_CONTENT, search_content(doc))
            .with_list(attr::IMAGE_ARRAY, images.to_vec())
            .with_list(attr::TAG_ARRAY, tags.to_vec())
            .with_list(attr::CATEGORY_ARRAY, categories.to_vec())
            .with_string(attr::SYNC_RUN_ID, run_id)
    }
}

/// 🔍 Lowercased categories, tags, title, summary, content. Five parts, four spaces.
pub(crate) fn search_content(doc: &RawDocument) -> String {
    [
        or_empty_list(&doc.categories).join(" "),
        or_empty_list(&doc.tags).join(" "),
        or_empty(&doc.title).to_string(),
        or_empty(&doc.summary).to_string(),
        or_empty(&doc.content).to_string(),
    ]
    .join(" ")
    .to_lowercase()
}
