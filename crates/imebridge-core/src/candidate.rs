use serde::{Deserialize, Serialize};

/// Candidate list as handed over by a native source.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CandidatePayload {
    pub items: Vec<String>,
    pub page_start: u32,
    pub page_size: u32,
    pub selection: u32,
    /// Candidate count reported by the IME.
    pub count: u32,
}

impl CandidatePayload {
    pub fn new(items: Vec<String>, page_start: u32, page_size: u32, selection: u32) -> Self {
        let count = items.len() as u32;
        Self {
            items,
            page_start,
            page_size,
            selection,
            count,
        }
    }
}

/// Snapshot of the candidate window the IME is presenting.
///
/// `page_start` and `selection` are stored exactly as the IME reported them.
/// Consumers clamp when rendering; [`CandidatePage::visible`] already does.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CandidatePage {
    items: Vec<String>,
    page_start: u32,
    page_size: u32,
    selection: u32,
}

impl CandidatePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn replace(&mut self, items: Vec<String>, page_start: u32, page_size: u32, selection: u32) {
        self.items = items;
        self.page_start = page_start;
        self.page_size = page_size;
        self.selection = selection;
    }

    pub fn reset(&mut self) {
        self.items.clear();
        self.page_start = 0;
        self.page_size = 0;
        self.selection = 0;
    }

    pub fn items(&self) -> &[String] {
        &self.items
    }

    pub fn page_start(&self) -> u32 {
        self.page_start
    }

    pub fn page_size(&self) -> u32 {
        self.page_size
    }

    /// Absolute index into [`CandidatePage::items`].
    pub fn selection(&self) -> u32 {
        self.selection
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Items on the active page, cut off at the end of the list.
    pub fn visible(&self) -> &[String] {
        let len = self.items.len();
        let start = (self.page_start as usize).min(len);
        let end = start.saturating_add(self.page_size as usize).min(len);
        &self.items[start..end]
    }

    pub fn selected(&self) -> Option<&str> {
        self.items.get(self.selection as usize).map(String::as_str)
    }

    /// Position of the selection inside [`CandidatePage::visible`], if it is shown.
    pub fn selection_in_page(&self) -> Option<usize> {
        let selection = self.selection as usize;
        let start = self.page_start as usize;
        if selection < start {
            return None;
        }
        let rel = selection - start;
        if rel < self.visible().len() {
            Some(rel)
        } else {
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(items: &[&str], start: u32, size: u32, selection: u32) -> CandidatePage {
        let mut p = CandidatePage::new();
        p.replace(
            items.iter().map(|s| s.to_string()).collect(),
            start,
            size,
            selection,
        );
        p
    }

    #[test]
    fn test_visible_window() {
        let p = page(&["你", "泥", "妮"], 0, 2, 0);
        assert_eq!(p.visible(), &["你".to_string(), "泥".to_string()]);
        assert_eq!(p.selected(), Some("你"));
        assert_eq!(p.selection_in_page(), Some(0));
    }

    #[test]
    fn test_visible_window_clamped_by_list_length() {
        let p = page(&["你", "泥", "妮"], 2, 2, 0);
        assert_eq!(p.visible(), &["妮".to_string()]);
        // Selection stays absolute and falls outside the page
        assert_eq!(p.selected(), Some("你"));
        assert_eq!(p.selection_in_page(), None);
    }

    #[test]
    fn test_out_of_range_values_pass_through() {
        let p = page(&["a", "b"], 5, 9, 7);
        assert_eq!(p.page_start(), 5);
        assert_eq!(p.selection(), 7);
        assert!(p.visible().is_empty());
        assert_eq!(p.selected(), None);
    }

    #[test]
    fn test_reset() {
        let mut p = page(&["a", "b"], 1, 1, 1);
        p.reset();
        assert!(p.is_empty());
        assert_eq!(p, CandidatePage::default());
    }
}
