use serde::{Deserialize, Serialize};

use crate::editing::Attributes;

/// Paragraph/run document exchanged with storage
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortableDocument {
    #[serde(default)]
    pub metadata: Metadata,
    #[serde(default)]
    pub paragraphs: Vec<PortableParagraph>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    /// Opaque document identity
    #[serde(default)]
    pub identifier: Option<String>,
    /// Free-text field; holds the backup interval in minutes
    #[serde(default)]
    pub comments: String,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortableParagraph {
    /// `left`, `center` or `right`; anything else reads as left
    #[serde(default)]
    pub alignment: Option<String>,
    #[serde(default)]
    pub runs: Vec<PortableRun>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortableRun {
    pub text: String,
    #[serde(default)]
    pub bold: bool,
    #[serde(default)]
    pub italic: bool,
    #[serde(default)]
    pub underline: bool,
    /// Points; may be fractional in foreign documents
    #[serde(default)]
    pub size: Option<f64>,
}

impl PortableRun {
    pub fn styled(text: &str, attrs: Attributes) -> Self {
        Self {
            text: text.to_string(),
            bold: attrs.bold,
            italic: attrs.italic,
            underline: attrs.underline,
            size: Some(f64::from(attrs.size)),
        }
    }
}
