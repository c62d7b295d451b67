use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Type name of the revision object created for a new document.
pub const ITEM_REVISION_TYPE: &str = "ItemRevision";

/// Property values as returned by the service (`dbValues` / `uiValues`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyValues {
    #[serde(default)]
    pub db_values: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub ui_values: Vec<String>,
}

/// Reference to a server-side business object.
///
/// Identity is the `uid`; the type hierarchy and properties are only present
/// when the service returned them.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelObject {
    pub uid: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub type_hierarchy: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub props: BTreeMap<String, PropertyValues>,
}

impl PartialEq for ModelObject {
    fn eq(&self, other: &Self) -> bool {
        self.uid == other.uid
    }
}

impl Eq for ModelObject {}

impl ModelObject {
    pub fn new(uid: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            uid: uid.into(),
            type_name: type_name.into(),
            type_hierarchy: Vec::new(),
            props: BTreeMap::new(),
        }
    }

    /// True if the object is of `type_name` or inherits from it.
    pub fn is_instance_of(&self, type_name: &str) -> bool {
        self.type_name == type_name || self.type_hierarchy.iter().any(|t| t == type_name)
    }

    /// First database value of a property, if present.
    pub fn property(&self, name: &str) -> Option<&str> {
        self.props
            .get(name)
            .and_then(|p| p.db_values.first())
            .map(String::as_str)
    }

    /// Display string (`object_string`) of the object.
    pub fn display_name(&self) -> Option<&str> {
        self.property("object_string")
    }

    /// Reference carrying only uid and type, as sent back in requests.
    pub fn to_reference(&self) -> Self {
        Self::new(self.uid.clone(), self.type_name.clone())
    }
}
