use std::collections::HashMap;

/// How deep below the base DN a search reaches.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Scope {
    /// Only the base object itself.
    Base,
    OneLevel,
    Subtree,
}

/// One directory object returned by a search.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DirectoryEntry {
    dn: String,
    pub attributes: HashMap<String, Vec<String>>,
}

impl DirectoryEntry {
    pub fn new(dn: &str, attributes: HashMap<String, Vec<String>>) -> DirectoryEntry {
        DirectoryEntry {
            dn: dn.to_string(),
            attributes,
        }
    }

    pub fn dn(&self) -> &str {
        &self.dn
    }

    /// All values of an attribute. Names match exactly first, then case-insensitively.
    /// `dn` resolves to the entry's DN when the server did not return it as an attribute.
    pub fn get_attrs(&self, name: &str) -> Vec<String> {
        if let Some(values) = self.attributes.get(name) {
            return values.clone();
        }
        if let Some((_, values)) = self
            .attributes
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
        {
            return values.clone();
        }
        if name.eq_ignore_ascii_case("dn") {
            return vec![self.dn.clone()];
        }
        vec![]
    }

    /// First value of an attribute, or empty.
    pub fn get_attr(&self, name: &str) -> String {
        self.get_attrs(name).into_iter().next().unwrap_or_default()
    }
}

/// A single search request. Built per call, never reused.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SearchCriteria {
    pub base_dn: String,
    pub filter: String,
    pub scope: Scope,
    // empty means all attributes
    pub attributes: Vec<String>,
}

impl SearchCriteria {
    pub fn subtree(base_dn: &str, filter: &str, attributes: Vec<String>) -> SearchCriteria {
        SearchCriteria {
            base_dn: base_dn.to_string(),
            filter: filter.to_string(),
            scope: Scope::Subtree,
            attributes,
        }
    }
}
