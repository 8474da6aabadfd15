use serde::Serialize;

/// Per-page output counters, collected while the content streams are written.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PageMetrics {
    pub page_number: usize,
    pub command_count: usize,
    pub text_runs: usize,
    /// Characters a base-14 font could not encode, written as `?`.
    pub replaced_chars: usize,
    pub content_bytes: usize,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct DocumentMetrics {
    pub pages: Vec<PageMetrics>,
    pub font_objects: usize,
    pub image_objects: usize,
    pub total_bytes: usize,
    pub render_ms: f64,
}

impl DocumentMetrics {
    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn content_bytes(&self) -> usize {
        self.pages.iter().map(|page| page.content_bytes).sum()
    }

    pub fn replaced_chars(&self) -> usize {
        self.pages.iter().map(|page| page.replaced_chars).sum()
    }
}
