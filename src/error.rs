//! Error types with fix suggestions
//!
//! Every definition error names the offending document and, where one exists,
//! the element and attribute, so a broken definition can be located quickly.

use thiserror::Error;

/// Trait for errors that provide fix suggestions
pub trait FixSuggestion {
    fn fix_suggestion(&self) -> Option<&str>;
}

pub type Result<T, E = BinderyError> = std::result::Result<T, E>;

/// Which dynamically resolved capability failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CapabilityKind {
    Binder,
    Transformation,
}

impl std::fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CapabilityKind::Binder => write!(f, "binder"),
            CapabilityKind::Transformation => write!(f, "transformation"),
        }
    }
}

#[derive(Error, Debug)]
pub enum BinderyError {
    // ─────────────────────────────────────────────────────────────
    // Definition errors (BND-010 to BND-019)
    // ─────────────────────────────────────────────────────────────

    #[error("BND-010: The adapter defined in '{source_name}' must be a <{expected}/>, found <{found}>")]
    SchemaMismatch {
        source_name: String,
        expected: String,
        found: String,
    },

    #[error("BND-011: <{element}> in '{source_name}' is missing mandatory attribute '{attribute}'")]
    MissingAttribute {
        source_name: String,
        element: String,
        attribute: String,
    },

    #[error("BND-012: Unknown tag name <{element}> in '{source_name}'")]
    UnknownElement { source_name: String, element: String },

    #[error("BND-013: <bind from=\"{from}\"> in '{source_name}' mixes <map> and <transform>")]
    ConflictingTransformation { source_name: String, from: String },

    #[error("BND-014: Cannot resolve custom {kind} '{identifier}' in '{source_name}'")]
    UnresolvedBinder {
        source_name: String,
        kind: CapabilityKind,
        identifier: String,
    },

    #[error("BND-015: Custom {kind} '{identifier}' in '{source_name}' is not allowed in a restricted context")]
    RestrictedCapability {
        source_name: String,
        kind: CapabilityKind,
        identifier: String,
    },

    #[error("BND-016: Expression '{expression}' in '{source_name}' references unselected column '{column}'")]
    UnresolvedPlaceholder {
        source_name: String,
        expression: String,
        column: String,
    },

    #[error("BND-017: '{source_name}' does not contain an adapter definition")]
    EmptyDefinition { source_name: String },

    #[error("BND-018: Malformed definition '{source_name}': {details}")]
    Document {
        source_name: String,
        details: String,
    },

    // ─────────────────────────────────────────────────────────────
    // Runtime errors (BND-030 to BND-039)
    // ─────────────────────────────────────────────────────────────

    #[error("BND-030: Query on '{uri}' failed: {details}")]
    Query { uri: String, details: String },

    #[error("BND-031: Configuration error: {reason}")]
    Config { reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl BinderyError {
    /// True for errors raised while compiling a definition
    pub fn is_definition_error(&self) -> bool {
        matches!(
            self,
            BinderyError::SchemaMismatch { .. }
                | BinderyError::MissingAttribute { .. }
                | BinderyError::UnknownElement { .. }
                | BinderyError::ConflictingTransformation { .. }
                | BinderyError::UnresolvedBinder { .. }
                | BinderyError::RestrictedCapability { .. }
                | BinderyError::UnresolvedPlaceholder { .. }
                | BinderyError::EmptyDefinition { .. }
                | BinderyError::Document { .. }
        )
    }
}

impl FixSuggestion for BinderyError {
    fn fix_suggestion(&self) -> Option<&str> {
        match self {
            BinderyError::SchemaMismatch { .. } => {
                Some("Use the expected root element or drop the --root expectation")
            }
            BinderyError::MissingAttribute { .. } => {
                Some("Add the attribute, and check that resource references (@type/name) exist")
            }
            BinderyError::UnknownElement { .. } => {
                Some("Only <select> and <bind> (with <map> or <transform>) are supported")
            }
            BinderyError::ConflictingTransformation { .. } => {
                Some("Use either several <map> elements or a single <transform>, not both")
            }
            BinderyError::UnresolvedBinder { .. } => {
                Some("Register the factory for this identifier before compiling")
            }
            BinderyError::RestrictedCapability { .. } => {
                Some("Use a built-in type (string, image, image-uri, drawable, tag) or an expression")
            }
            BinderyError::UnresolvedPlaceholder { .. } => {
                Some("Add a <select column=\"...\" /> for every {column} used in the expression")
            }
            BinderyError::EmptyDefinition { .. } => Some("Add a <cursor-adapter> root element"),
            BinderyError::Document { .. } => Some("Check XML syntax: quoting and closing tags"),
            BinderyError::Query { .. } => Some("Check the source URI and selection expression"),
            BinderyError::Config { .. } => Some("Check the TOML syntax of the configuration file"),
            BinderyError::Io(_) => Some("Check file path and permissions"),
            BinderyError::Json(_) => Some("Rows must be a JSON array of objects"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_attribute_names_document_element_and_attribute() {
        let err = BinderyError::MissingAttribute {
            source_name: "contacts".into(),
            element: "bind".into(),
            attribute: "as".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("BND-011"));
        assert!(msg.contains("contacts"));
        assert!(msg.contains("<bind>"));
        assert!(msg.contains("'as'"));
    }

    #[test]
    fn restricted_capability_names_kind() {
        let err = BinderyError::RestrictedCapability {
            source_name: "widget".into(),
            kind: CapabilityKind::Transformation,
            identifier: "com.example.Upper".into(),
        };
        assert!(err.to_string().contains("custom transformation 'com.example.Upper'"));
    }

    #[test]
    fn definition_errors_are_classified() {
        let err = BinderyError::EmptyDefinition {
            source_name: "x".into(),
        };
        assert!(err.is_definition_error());

        let err = BinderyError::Query {
            uri: "content://x".into(),
            details: "boom".into(),
        };
        assert!(!err.is_definition_error());
    }

    #[test]
    fn every_variant_has_a_suggestion() {
        let err = BinderyError::Config {
            reason: "bad".into(),
        };
        assert!(err.fix_suggestion().is_some());
        let err = BinderyError::UnknownElement {
            source_name: "x".into(),
            element: "foo".into(),
        };
        assert!(err.fix_suggestion().unwrap().contains("<select>"));
    }
}
