//! 🏷️ Classifier: page or section, and where does it live?
//!
//! A document with children is a section. Everything else is a page.
//! Sections are their own section; pages belong to the directory one level up.

use crate::common::{RawDocument, RecordKind, canonicalize, strip_last_component};

/// 🏷️ A document that knows what it is and where it goes.
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifiedDocument {
    pub kind: RecordKind,
    pub path: String,
    pub section_path: String,
    pub document: RawDocument,
}

pub fn classify(key: &str, document: RawDocument) -> ClassifiedDocument {
    let directory = strip_last_component(key);
    let (kind, section_directory) = if document.child_count() > 0 {
        (RecordKind::Section, directory)
    } else {
        (RecordKind::Page, strip_last_component(directory))
    };

    ClassifiedDocument {
        kind,
        path: canonicalize(directory),
        section_path: canonicalize(section_directory),
        document,
    }
}
