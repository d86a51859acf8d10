use std::collections::HashSet;

/// Ids of the proposed changes currently chosen for application.
///
/// Membership only; display order comes from the run result.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionSet {
    ids: HashSet<String>,
}

impl SelectionSet {
    pub fn replace_with<I, S>(&mut self, ids: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.ids = ids.into_iter().map(Into::into).collect();
    }

    /// Flip membership of `id`. Returns whether it is selected afterwards.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.ids.remove(id) {
            false
        } else {
            self.ids.insert(id.to_string());
            true
        }
    }

    pub fn contains(&self, id: &str) -> bool {
        self.ids.contains(id)
    }

    #[cfg(test)]
    pub fn snapshot(&self) -> HashSet<String> {
        self.ids.clone()
    }

    pub fn clear(&mut self) {
        self.ids.clear();
    }

    pub fn len(&self) -> usize {
        self.ids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn double_toggle_restores_original() {
        let mut sel = SelectionSet::default();
        sel.replace_with(["a", "b"]);
        let before = sel.snapshot();

        assert!(sel.toggle("x"));
        assert!(sel.contains("x"));
        assert!(!sel.toggle("x"));
        assert_eq!(sel.snapshot(), before);
    }

    #[test]
    fn replace_discards_previous_members() {
        let mut sel = SelectionSet::default();
        sel.replace_with(["a", "b"]);
        sel.replace_with(vec!["c".to_string()]);
        assert!(!sel.contains("a"));
        assert!(sel.contains("c"));
        assert_eq!(sel.len(), 1);

        sel.clear();
        assert!(sel.is_empty());
    }
}
