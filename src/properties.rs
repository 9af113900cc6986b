//! Ordered, multi-valued document metadata.
//!
//! [`Properties`] keeps fields in insertion order and each field holds an
//! ordered list of string values. Key lookups are case-sensitive by default;
//! a case-insensitive store matches keys regardless of case while remembering
//! the spelling used when the field was first added.

use indexmap::map::Entry;
use indexmap::IndexMap;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Field {
    key: String,
    values: Vec<String>,
}

/// Multi-valued key/value store for document metadata.
///
/// # Example
///
/// ```
/// use doc_importer::properties::Properties;
///
/// let mut props = Properties::new();
/// props.add("keywords", "rust");
/// props.add("keywords", "parser");
/// assert_eq!(props.get_values("keywords"), ["rust", "parser"]);
/// ```
#[derive(Debug, Clone, Default)]
pub struct Properties {
    case_insensitive: bool,
    fields: IndexMap<String, Field>,
}

impl Properties {
    /// Create an empty, case-sensitive store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty store whose keys are matched ignoring case.
    pub fn case_insensitive() -> Self {
        Self {
            case_insensitive: true,
            fields: IndexMap::new(),
        }
    }

    /// Whether keys are matched ignoring case.
    pub fn is_case_insensitive(&self) -> bool {
        self.case_insensitive
    }

    fn normalize(&self, key: &str) -> String {
        if self.case_insensitive {
            key.to_lowercase()
        } else {
            key.to_string()
        }
    }

    fn field_mut(&mut self, key: &str) -> &mut Field {
        let normalized = self.normalize(key);
        self.fields.entry(normalized).or_insert_with(|| Field {
            key: key.to_string(),
            values: Vec::new(),
        })
    }

    /// Append a value to a field, creating the field if needed.
    pub fn add(&mut self, key: &str, value: impl Into<String>) {
        self.field_mut(key).values.push(value.into());
    }

    /// Append several values to a field.
    pub fn add_all<I, V>(&mut self, key: &str, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let field = self.field_mut(key);
        field.values.extend(values.into_iter().map(Into::into));
    }

    /// Append a value unless the field already holds an equal one.
    ///
    /// Returns `true` when the value was added.
    pub fn add_unique(&mut self, key: &str, value: &str) -> bool {
        let field = self.field_mut(key);
        if field.values.iter().any(|v| v == value) {
            false
        } else {
            field.values.push(value.to_string());
            true
        }
    }

    /// Replace all values of a field with a single value.
    pub fn set(&mut self, key: &str, value: impl Into<String>) {
        let field = self.field_mut(key);
        field.values.clear();
        field.values.push(value.into());
    }

    /// Replace all values of a field.
    pub fn set_all<I, V>(&mut self, key: &str, values: I)
    where
        I: IntoIterator<Item = V>,
        V: Into<String>,
    {
        let field = self.field_mut(key);
        field.values = values.into_iter().map(Into::into).collect();
    }

    /// First value of a field.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_values(key).first().map(String::as_str)
    }

    /// All values of a field, empty if the field is absent.
    pub fn get_values(&self, key: &str) -> &[String] {
        self.fields
            .get(&self.normalize(key))
            .map(|f| f.values.as_slice())
            .unwrap_or(&[])
    }

    /// Whether the field exists (it may hold zero values).
    pub fn contains_key(&self, key: &str) -> bool {
        self.fields.contains_key(&self.normalize(key))
    }

    /// Remove a field, returning its values.
    pub fn remove(&mut self, key: &str) -> Option<Vec<String>> {
        let normalized = self.normalize(key);
        self.fields.shift_remove(&normalized).map(|f| f.values)
    }

    /// Field keys in insertion order, as first spelled.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.fields.values().map(|f| f.key.as_str())
    }

    /// Fields and their values in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &[String])> {
        self.fields
            .values()
            .map(|f| (f.key.as_str(), f.values.as_slice()))
    }

    /// Number of fields.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    /// Whether the store has no fields.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Remove every field.
    pub fn clear(&mut self) {
        self.fields.clear();
    }

    /// Merge another store into this one.
    ///
    /// For every field of `other`, each value is appended unless this store's
    /// field already holds an equal value. Deduplication is per field and by
    /// exact string equality; encounter order is preserved.
    pub fn merge(&mut self, other: &Properties) {
        for (key, values) in other.iter() {
            let normalized = self.normalize(key);
            let field = match self.fields.entry(normalized) {
                Entry::Occupied(e) => e.into_mut(),
                Entry::Vacant(e) => e.insert(Field {
                    key: key.to_string(),
                    values: Vec::new(),
                }),
            };
            for value in values {
                if !field.values.contains(value) {
                    field.values.push(value.clone());
                }
            }
        }
    }
}

impl PartialEq for Properties {
    /// Structural equality: same case mode, same fields in the same order
    /// with the same values.
    fn eq(&self, other: &Self) -> bool {
        self.case_insensitive == other.case_insensitive
            && self.fields.len() == other.fields.len()
            && self
                .fields
                .iter()
                .zip(other.fields.iter())
                .all(|(a, b)| a == b)
    }
}

impl Eq for Properties {}
