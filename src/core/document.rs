//! Documents: open-ended attribute maps with an optional store-assigned id.

use crate::core::error::{GoatfishError, Result};
use crate::core::value::Value;
use std::collections::BTreeMap;

/// Attribute name that carries the external id.
pub const ID_ATTR: &str = "id";

pub type Attributes = BTreeMap<String, Value>;

/// One persisted document.
///
/// The id lives in the attribute map under [`ID_ATTR`], exactly like any other
/// attribute, but it is never written into the serialized blob. Two documents
/// compare equal only when both carry the same text id; unsaved documents are
/// not even equal to themselves, which is why there is no `Eq` impl.
#[derive(Debug, Clone, Default)]
pub struct Document {
    attrs: Attributes,
}

impl Document {
    pub fn from_attrs<I, K, V>(attrs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self {
            attrs: attrs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// The external id, if the document has been saved.
    pub fn id(&self) -> Option<&str> {
        self.attrs.get(ID_ATTR).and_then(Value::as_str)
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attrs.get(key)
    }

    /// Lookup with the missing-is-null policy used by query filters.
    pub fn get_or_null(&self, key: &str) -> &Value {
        const NULL: &Value = &Value::Null;
        self.attrs.get(key).unwrap_or(NULL)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<Value>) -> &mut Self {
        self.attrs.insert(key.into(), value.into());
        self
    }

    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.attrs.remove(key)
    }

    pub fn attrs(&self) -> &Attributes {
        &self.attrs
    }

    pub fn into_attrs(self) -> Attributes {
        self.attrs
    }

    /// Id state for the save path: `Ok(None)` when unsaved.
    pub(crate) fn saved_id(&self) -> Result<Option<String>> {
        match self.attrs.get(ID_ATTR) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::Text(id)) => Ok(Some(id.clone())),
            Some(other) => Err(GoatfishError::ValidationError(format!(
                "document id must be text, got {:?}",
                other
            ))),
        }
    }

    pub(crate) fn attrs_mut(&mut self) -> &mut Attributes {
        &mut self.attrs
    }

    pub(crate) fn from_stored(id: String, mut attrs: Attributes) -> Self {
        attrs.insert(ID_ATTR.to_string(), Value::Text(id));
        Self { attrs }
    }

    /// Whether every `(field, value)` filter matches this document.
    pub fn matches(&self, filter: &Attributes) -> bool {
        filter.iter().all(|(k, v)| self.get_or_null(k) == v)
    }
}

impl PartialEq for Document {
    fn eq(&self, other: &Self) -> bool {
        match (self.id(), other.id()) {
            (Some(a), Some(b)) => a == b,
            _ => false,
        }
    }
}

impl From<Attributes> for Document {
    fn from(attrs: Attributes) -> Self {
        Self { attrs }
    }
}

/// Generates a fresh external id: a 128-bit ULID (48-bit millisecond
/// timestamp prefix, 80 random bits) rendered as 32 lowercase hex digits.
pub fn new_id() -> String {
    format!("{:032x}", ulid::Ulid::new().0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    #[allow(clippy::eq_op)]
    fn test_unsaved_documents_are_never_equal() {
        let a = Document::from_attrs([("foo", 1)]);
        let b = a.clone();
        assert_ne!(a, b);
        assert_ne!(a, a);
    }

    #[test]
    fn test_equality_follows_id() {
        let a = Document::from_stored("abc".into(), Attributes::new());
        let mut b = Document::from_attrs([("foo", 2)]);
        b.set(ID_ATTR, "abc");
        let c = Document::from_stored("def".into(), Attributes::new());
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_missing_attribute_matches_null_filter() {
        let doc = Document::from_attrs([("foo", 1)]);
        let mut filter = Attributes::new();
        filter.insert("bar".into(), Value::Null);
        assert!(doc.matches(&filter));
        filter.insert("foo".into(), Value::Int(2));
        assert!(!doc.matches(&filter));
    }

    #[test]
    fn test_non_text_id_is_rejected() {
        let doc = Document::from_attrs([(ID_ATTR, 7)]);
        assert!(doc.saved_id().is_err());
        let doc = Document::from_attrs([(ID_ATTR, Value::Null)]);
        assert_eq!(doc.saved_id().unwrap(), None);
    }

    #[test]
    fn test_new_id_is_32_hex_digits_and_unique() {
        let a = new_id();
        let b = new_id();
        assert_eq!(a.len(), 32);
        assert!(a.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
        assert_ne!(a, b);
    }
}
