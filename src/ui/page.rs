//! Identifier-addressed elements that the watcher writes and renderers draw.

use std::collections::BTreeMap;

/// Id of the progress bar element.
pub const BAR_ID: &str = "barra_progreso";
/// Id of the remaining-time label.
pub const ETA_ID: &str = "eta";

/// A drawable element: a width style property and a text content property.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub width: Option<String>,
    pub text: String,
}

/// Handle to an element that is known to exist in a `Page`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ElementId(String);

impl ElementId {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Page {
    elements: BTreeMap<String, Element>,
}

impl Page {
    pub fn new() -> Self {
        Self::default()
    }

    /// Page with an empty element for each id.
    pub fn with_elements<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut page = Self::new();
        for id in ids {
            page.insert(id);
        }
        page
    }

    /// The stock layout: a progress bar and an eta label.
    pub fn progress_page() -> Self {
        Self::with_elements([BAR_ID, ETA_ID])
    }

    pub fn insert(&mut self, id: impl Into<String>) {
        self.elements.entry(id.into()).or_default();
    }

    pub fn resolve(&self, id: &str) -> Option<ElementId> {
        self.elements
            .contains_key(id)
            .then(|| ElementId(id.to_string()))
    }

    pub fn get(&self, id: &str) -> Option<&Element> {
        self.elements.get(id)
    }

    pub fn element(&self, id: &ElementId) -> Option<&Element> {
        self.elements.get(id.as_str())
    }

    /// Returns whether the value changed.
    pub fn set_width(&mut self, id: &ElementId, width: &str) -> bool {
        match self.elements.get_mut(id.as_str()) {
            Some(el) if el.width.as_deref() != Some(width) => {
                el.width = Some(width.to_string());
                true
            }
            _ => false,
        }
    }

    /// Returns whether the value changed.
    pub fn set_text(&mut self, id: &ElementId, text: &str) -> bool {
        match self.elements.get_mut(id.as_str()) {
            Some(el) if el.text != text => {
                el.text = text.to_string();
                true
            }
            _ => false,
        }
    }
}
