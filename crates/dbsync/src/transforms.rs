//! 🔄 Transforms: classified documents in, table rows out.
//!
//! ```text
//!   ClassifiedDocument ──▶ PageRows    ──▶ Row (pageKind = "page")
//!                     └──▶ SectionRows ──▶ Row (pageKind = "section")
//! ```
//!
//! Each transform is a zero-sized marker type with a static method, so the
//! batch conversion below is one `match` on the kind and a tight loop.
//!
//! ## Defaults 📜
//!
//! Documents are not validated before they become rows. Anything absent gets
//! an explicit default instead of leaking `None` into the table:
//!
//! | field                                 | when absent |
//! |---------------------------------------|-------------|
//! | `date`, `title`, `summary`, `content` | `""`        |
//! | `tags`, `categories`, `images`        | `[]`        |
//! | first image                           | `""`        |
//! | `children`                            | count `0`   |
//!
//! Wrongly typed fields are coerced while parsing (see [`RawDocument`](crate::common::RawDocument)):
//!
//! | found                                   | becomes                    |
//! |-----------------------------------------|----------------------------|
//! | number/bool where a string belongs      | its JSON text, `"20240101"` |
//! | object/array where a string belongs     | absent, so `""`            |
//! | a lone scalar where a list belongs      | a list of one              |
//! | `null`/object entries inside a list     | dropped                    |
//! | `children` that is not an array         | count `0`, so a page       |

use std::collections::HashMap;

use crate::classifier::ClassifiedDocument;
use crate::collectors::Batch;
use crate::common::{RecordKind, Row};

pub(crate) mod page;
pub(crate) mod section;

pub(crate) use page::PageRows;
pub(crate) use section::SectionRows;

/// 🔑 Attribute names shared by both row shapes. `PATH` is the table's hash key.
pub mod attr {
    pub const PATH: &str = "pagePath";
    pub const SECTION: &str = "pageSection";
    pub const KIND: &str = "pageKind";
    pub const DATE: &str = "pageDate";
    pub const TITLE: &str = "pageTitle";
    pub const SUMMARY: &str = "pageSummary";
    pub const CONTENT_HTML: &str = "pageContentHtml";
    pub const TAGS: &str = "pageTags";
    pub const CATEGORIES: &str = "pageCategories";
    pub const IMAGE: &str = "pageImage";
    pub const SEARCH_CONTENT: &str = "pageSearchContent";
    pub const IMAGE_ARRAY: &str = "pageImageArray";
    pub const TAG_ARRAY: &str = "pageTagArray";
    pub const CATEGORY_ARRAY: &str = "pageCategoryArray";
    pub const CHILD_COUNT: &str = "pageChildCount";
    pub const SYNC_RUN_ID: &str = "syncRunId";
}

/// 🔄 Turns one classified document into one row.
pub(crate) trait RowTransform {
    fn transform_row(document: &ClassifiedDocument, run_id: &str) -> Row;
}

/// 📦 Convert a whole batch. Duplicate paths collapse to the last document,
/// since a single bulk write may not name the same key twice.
pub(crate) fn rows_for_batch(batch: &Batch, run_id: &str) -> Vec<Row> {
    let transform: fn(&ClassifiedDocument, &str) -> Row = match batch.kind {
        RecordKind::Page => PageRows::transform_row,
        RecordKind::Section => SectionRows::transform_row,
    };

    let mut rows: Vec<Row> = Vec::with_capacity(batch.len());
    let mut positions: HashMap<String, usize> = HashMap::with_capacity(batch.len());
    for document in &batch.documents {
        let row = transform(document, run_id);
        match positions.get(&row.key) {
            Some(&at) => rows[at] = row,
            None => {
                positions.insert(row.key.clone(), rows.len());
                rows.push(row);
            }
        }
    }
    rows
}

pub(crate) fn or_empty(value: &Option<String>) -> &str {
    value.as_deref().unwrap_or("")
}

pub(crate) fn or_empty_list(values: &Option<Vec<String>>) -> &[String] {
    values.as_deref().unwrap_or(&[])
}
