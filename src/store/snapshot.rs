use serde_json::{Map, Value};

/// Local copy of the watched value, rebuilt from `put` / `patch` events.
///
/// Follows the store's tree semantics: writing `null` removes a child and an
/// object left without children collapses to `null`.
#[derive(Debug, Default)]
pub struct SnapshotCache {
    root: Value,
    last_emitted: Option<Value>,
}

impl SnapshotCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current value at the watched path
    pub fn value(&self) -> &Value {
        &self.root
    }

    /// Replace the value at `path`.
    ///
    /// Returns the new full value when it differs from the last one returned.
    pub fn put(&mut self, path: &str, data: Value) -> Option<Value> {
        let segments = split_path(path);
        set_at(&mut self.root, &segments, data);
        self.take_change()
    }

    /// Set every child of `data` under `path`.
    pub fn patch(&mut self, path: &str, data: Value) -> Option<Value> {
        let base = split_path(path);
        match data {
            Value::Object(children) => {
                for (key, value) in children {
                    let mut segments = base.clone();
                    segments.extend(split_path(&key));
                    set_at(&mut self.root, &segments, value);
                }
            }
            // Not produced by the store, but a scalar patch can only mean a put
            other => set_at(&mut self.root, &base, other),
        }
        self.take_change()
    }

    /// The first value is always reported, even `null`.
    fn take_change(&mut self) -> Option<Value> {
        if self.last_emitted.as_ref() == Some(&self.root) {
            return None;
        }
        self.last_emitted = Some(self.root.clone());
        Some(self.root.clone())
    }
}

fn split_path(path: &str) -> Vec<String> {
    path.split('/')
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn set_at(node: &mut Value, segments: &[String], value: Value) {
    let (head, rest) = match segments.split_first() {
        Some(split) => split,
        None => {
            *node = value;
            return;
        }
    };

    if !node.is_object() {
        if value.is_null() {
            return;
        }
        *node = Value::Object(Map::new());
    }

    let emptied = match node {
        Value::Object(children) => {
            let child = children.entry(head.clone()).or_insert(Value::Null);
            set_at(child, rest, value);
            if child.is_null() {
                children.remove(head);
            }
            children.is_empty()
        }
        _ => false,
    };

    if emptied {
        *node = Value::Null;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_initial_put_always_reported() {
        let mut cache = SnapshotCache::new();
        assert_eq!(cache.put("/", Value::Null), Some(Value::Null));

        let mut cache = SnapshotCache::new();
        assert_eq!(
            cache.put("/", json!({"message": "hi"})),
            Some(json!({"message": "hi"}))
        );
    }

    #[test]
    fn test_unchanged_value_not_reported() {
        let mut cache = SnapshotCache::new();
        cache.put("/", json!({"message": "hi"}));

        // Reconnect replays the same value
        assert_eq!(cache.put("/", json!({"message": "hi"})), None);
        // Writing the same child again is not a change either
        assert_eq!(cache.put("/message", json!("hi")), None);
    }

    #[test]
    fn test_put_at_child_path() {
        let mut cache = SnapshotCache::new();
        cache.put("/", json!({"message": "old", "sender": "line"}));

        let value = cache.put("/message", json!("new")).unwrap();
        assert_eq!(value, json!({"message": "new", "sender": "line"}));
    }

    #[test]
    fn test_put_creates_missing_parents() {
        let mut cache = SnapshotCache::new();
        cache.put("/", Value::Null);

        let value = cache.put("/meta/source", json!("bot")).unwrap();
        assert_eq!(value, json!({"meta": {"source": "bot"}}));
    }

    #[test]
    fn test_patch_merges_children() {
        let mut cache = SnapshotCache::new();
        cache.put("/", json!({"message": "old", "sender": "line"}));

        let value = cache
            .patch("/", json!({"message": "new", "meta/at": 1}))
            .unwrap();
        assert_eq!(
            value,
            json!({"message": "new", "sender": "line", "meta": {"at": 1}})
        );
    }

    #[test]
    fn test_null_removes_child_and_collapses_empty_objects() {
        let mut cache = SnapshotCache::new();
        cache.put("/", json!({"message": "hi", "meta": {"at": 1}}));

        let value = cache.put("/meta/at", Value::Null).unwrap();
        assert_eq!(value, json!({"message": "hi"}));

        let value = cache.patch("/", json!({"message": null})).unwrap();
        assert_eq!(value, Value::Null);
        assert_eq!(cache.value(), &Value::Null);
    }

    #[test]
    fn test_deleting_absent_child_is_not_a_change() {
        let mut cache = SnapshotCache::new();
        cache.put("/", json!({"message": "hi"}));
        assert_eq!(cache.put("/missing/deep", Value::Null), None);
    }
}
