//! Minimal payload computation
//!
//! Only entries whose change tag is not `Unchanged` are sent. Scalar fields
//! always travel since they are cheap and fully replaced by the response.

use super::item::Tracked;
use super::SettingsDocument;

/// Drop every entry that has not changed since the last sync
pub fn retain_changed<T: Tracked>(items: &mut Vec<T>) {
    items.retain(|item| !item.change().is_unchanged());
}

/// Copy of `document` reduced to what changed
pub fn minimal_payload(document: &SettingsDocument) -> SettingsDocument {
    let mut payload = document.clone();
    retain_changed(&mut payload.filters);
    for view in payload.views.values_mut() {
        retain_changed(&mut view.columns);
        retain_changed(&mut view.aggregations);
        retain_changed(&mut view.highlights);
    }
    payload
}

/// Number of list entries a payload of `document` would carry
pub fn changed_entries(document: &SettingsDocument) -> usize {
    fn count<T: Tracked>(items: &[T]) -> usize {
        items.iter().filter(|item| !item.change().is_unchanged()).count()
    }

    count(&document.filters)
        + document
            .views
            .values()
            .map(|view| count(&view.columns) + count(&view.aggregations) + count(&view.highlights))
            .sum::<usize>()
}
