//! # Module Schema Tree
//!
//! The nested description of a module that reflection flattens into nodes:
//! identity, declared data types with their fields, and declared APIs with
//! their parameters.
//!
//! JSON field names are camelCase. Missing arrays decode as empty and a
//! missing `required` flag decodes as `false`.

use crate::primitives::{DEFAULT_MODULE_NAME, DEFAULT_MODULE_VERSION};
use serde::{Deserialize, Serialize};

/// A module's full schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ModuleSpec {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Ids of modules this one depends on. Not carried through reflection.
    #[serde(default)]
    pub dependencies: Vec<String>,
    #[serde(default)]
    pub types: Vec<TypeSpec>,
    #[serde(default)]
    pub apis: Vec<ApiSpec>,
}

impl ModuleSpec {
    /// Fill in the identity defaults.
    ///
    /// An empty id falls back to `fallback_id` (the id of the node the spec
    /// was read from), an empty name to "Unknown" and an empty version to
    /// "0.1.0".
    #[must_use]
    pub fn with_defaults(mut self, fallback_id: &str) -> Self {
        let header = self.header().with_defaults(fallback_id);
        self.id = header.id;
        self.name = header.name;
        self.version = header.version;
        self
    }

    /// The identity part of the spec, as stored on a module node.
    #[must_use]
    pub fn header(&self) -> ModuleHeader {
        ModuleHeader {
            id: self.id.clone(),
            name: self.name.clone(),
            version: self.version.clone(),
            description: self.description.clone(),
            title: self.title.clone(),
        }
    }
}

/// Module identity without its types and APIs. Content of a module node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct ModuleHeader {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ModuleHeader {
    /// See [`ModuleSpec::with_defaults`].
    #[must_use]
    pub fn with_defaults(mut self, fallback_id: &str) -> Self {
        if self.id.trim().is_empty() {
            self.id = fallback_id.to_string();
        }
        if self.name.trim().is_empty() {
            self.name = DEFAULT_MODULE_NAME.to_string();
        }
        if self.version.trim().is_empty() {
            self.version = DEFAULT_MODULE_VERSION.to_string();
        }
        self
    }
}

/// A declared data type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeSpec {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub fields: Vec<FieldSpec>,
}

/// Type identity without its fields. Content of a type node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TypeHeader {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl From<&TypeSpec> for TypeHeader {
    fn from(spec: &TypeSpec) -> Self {
        Self {
            name: spec.name.clone(),
            description: spec.description.clone(),
        }
    }
}

/// A single field of a declared data type. Content of a property node.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl FieldSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, field_type: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            field_type: field_type.into(),
            required,
            description: None,
        }
    }
}

/// A declared API. Content of an api node, parameters included.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiSpec {
    pub name: String,
    pub verb: String,
    pub route: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterSpec>,
}

/// A single API parameter.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterSpec {
    pub name: String,
    #[serde(rename = "type")]
    pub param_type: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

impl ParameterSpec {
    #[must_use]
    pub fn new(name: impl Into<String>, param_type: impl Into<String>, required: bool) -> Self {
        Self {
            name: name.into(),
            param_type: param_type.into(),
            required,
            description: None,
        }
    }
}
