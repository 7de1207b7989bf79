//! Opaque page payload returned by the upstream listing API.

use std::sync::Arc;

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;

/// One page of the upstream server list.
///
/// The document is kept exactly as upstream returned it (`data`,
/// `nextPageCursor` and whatever else the API adds). The core never filters
/// or rewrites it. Cloning is cheap: the JSON is shared behind an `Arc`, so
/// the same page can be handed to every waiter of a coalesced fetch and to
/// the cache at once.
#[derive(Debug, Clone, PartialEq)]
pub struct Page(Arc<Value>);

impl Page {
    pub fn new(value: Value) -> Self {
        Self(Arc::new(value))
    }

    /// Borrow the raw JSON document.
    pub fn as_value(&self) -> &Value {
        &self.0
    }

    /// Number of entries in the `data` array, if present.
    ///
    /// Used for log fields only.
    pub fn entry_count(&self) -> Option<usize> {
        self.0.get("data").and_then(Value::as_array).map(Vec::len)
    }

    /// Returns `true` if both pages share the same allocation.
    pub fn ptr_eq(&self, other: &Page) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

impl From<Value> for Page {
    fn from(value: Value) -> Self {
        Self::new(value)
    }
}

impl Serialize for Page {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.0.serialize(serializer)
    }
}

impl<'de> Deserialize<'de> for Page {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Value::deserialize(deserializer).map(Self::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_passes_document_through() {
        let doc = json!({
            "previousPageCursor": null,
            "nextPageCursor": "abc",
            "data": [{ "id": "srv-1", "playing": 3, "maxPlayers": 8 }]
        });
        let page = Page::from(doc.clone());

        assert_eq!(page.as_value(), &doc);
        assert_eq!(serde_json::to_value(&page).unwrap(), doc);
        assert_eq!(page.entry_count(), Some(1));
    }

    #[test]
    fn test_clone_shares_allocation() {
        let page = Page::new(json!({ "data": [] }));
        let copy = page.clone();
        assert!(page.ptr_eq(&copy));
        assert!(!page.ptr_eq(&Page::new(json!({ "data": [] }))));
    }

    #[test]
    fn test_entry_count_without_data() {
        assert_eq!(Page::new(json!({ "errors": [] })).entry_count(), None);
    }
}
