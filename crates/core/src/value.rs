//! Typed values: trees shaped by a [`FieldSchema`](crate::FieldSchema), plus the three
//! markers the state consumer tells apart.

use std::collections::BTreeMap;

use crate::path::{AttributePath, PathStep};

#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    /// Not yet known; to be computed by the next planning cycle.
    Pending,
    /// Known to be empty. Only valid where the schema allows the position to be unset.
    Null,
    /// The converter could not determine a value here. Backfill replaces every one of these.
    Absent,
    String(String),
    Number(serde_json::Number),
    Bool(bool),
    List(Vec<TypedValue>),
    Set(Vec<TypedValue>),
    Map(BTreeMap<String, TypedValue>),
    Object(BTreeMap<String, TypedValue>),
    /// Raw JSON kept verbatim at a free-form schema position.
    Dynamic(serde_json::Value),
}

impl TypedValue {
    pub fn is_pending(&self) -> bool { matches!(self, TypedValue::Pending) }
    pub fn is_null(&self) -> bool { matches!(self, TypedValue::Null) }
    pub fn is_absent(&self) -> bool { matches!(self, TypedValue::Absent) }

    pub fn as_object(&self) -> Option<&BTreeMap<String, TypedValue>> {
        match self {
            TypedValue::Object(m) => Some(m),
            _ => None,
        }
    }

    /// Look up a nested node by attribute names / map keys (indices as decimal strings).
    pub fn lookup(&self, segments: &[&str]) -> Option<&TypedValue> {
        let mut cur = self;
        for seg in segments {
            cur = match cur {
                TypedValue::Object(m) | TypedValue::Map(m) => m.get(*seg)?,
                TypedValue::List(items) | TypedValue::Set(items) => items.get(seg.parse::<usize>().ok()?)?,
                _ => return None,
            };
        }
        Some(cur)
    }

    /// Visit every node depth-first with its path. Children of a node are visited after it.
    pub fn walk<F: FnMut(&AttributePath, &TypedValue)>(&self, f: &mut F) {
        fn go<F: FnMut(&AttributePath, &TypedValue)>(v: &TypedValue, path: &AttributePath, f: &mut F) {
            f(path, v);
            match v {
                TypedValue::Object(m) => {
                    for (k, child) in m {
                        go(child, &path.child(PathStep::Attribute(k.clone())), f);
                    }
                }
                TypedValue::Map(m) => {
                    for (k, child) in m {
                        go(child, &path.child(PathStep::Key(k.clone())), f);
                    }
                }
                TypedValue::List(items) | TypedValue::Set(items) => {
                    for (i, child) in items.iter().enumerate() {
                        go(child, &path.child(PathStep::Index(i)), f);
                    }
                }
                _ => {}
            }
        }
        go(self, &AttributePath::root(), f)
    }

    /// Paths of all Pending markers in the tree.
    pub fn pending_paths(&self) -> Vec<AttributePath> {
        let mut out = Vec::new();
        self.walk(&mut |p, v| if v.is_pending() { out.push(p.clone()) });
        out
    }

    /// True when no node is Pending or Absent.
    pub fn is_fully_known(&self) -> bool {
        let mut known = true;
        self.walk(&mut |_, v| if matches!(v, TypedValue::Pending | TypedValue::Absent) { known = false });
        known
    }
}

impl From<&str> for TypedValue {
    fn from(s: &str) -> Self { TypedValue::String(s.to_string()) }
}

impl From<bool> for TypedValue {
    fn from(b: bool) -> Self { TypedValue::Bool(b) }
}

impl From<i64> for TypedValue {
    fn from(n: i64) -> Self { TypedValue::Number(n.into()) }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn obj(entries: Vec<(&str, TypedValue)>) -> TypedValue {
        TypedValue::Object(entries.into_iter().map(|(k, v)| (k.to_string(), v)).collect())
    }

    #[test]
    fn pending_paths_report_every_marker() {
        let v = obj(vec![
            ("a", TypedValue::Pending),
            ("b", obj(vec![("c", TypedValue::List(vec![TypedValue::from(1), TypedValue::Pending]))])),
        ]);
        let paths: Vec<String> = v.pending_paths().iter().map(|p| p.to_string()).collect();
        assert_eq!(paths, vec!["a".to_string(), "b.c[1]".to_string()]);
        assert!(!v.is_fully_known());
    }

    #[test]
    fn lookup_descends_objects_and_lists() {
        let v = obj(vec![("spec", obj(vec![("ports", TypedValue::List(vec![TypedValue::from(80)]))]))]);
        assert_eq!(v.lookup(&["spec", "ports", "0"]), Some(&TypedValue::from(80)));
        assert_eq!(v.lookup(&["spec", "nope"]), None);
        assert!(v.is_fully_known());
    }
}
