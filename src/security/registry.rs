use super::SecurityScheme;
use crate::error::SchemaError;
use indexmap::IndexMap;
use serde_json::{Map, Value};

/// Distinct security schemes keyed by identifier, in first-registration order.
#[derive(Debug, Clone, Default)]
pub struct SecuritySchemeRegistry {
    schemes: IndexMap<String, SecurityScheme>,
}

impl SecuritySchemeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `scheme` and return its identifier.
    ///
    /// Registering an identical scheme again is a no-op.
    ///
    /// # Errors
    ///
    /// [`SchemaError::ConflictingSecurityScheme`] when a different scheme is
    /// already registered under the same identifier.
    pub fn register(&mut self, scheme: &SecurityScheme) -> Result<String, SchemaError> {
        let id = scheme.identifier().to_string();
        match self.schemes.get(&id) {
            Some(existing) if existing == scheme => {}
            Some(_) => return Err(SchemaError::ConflictingSecurityScheme(id)),
            None => {
                self.schemes.insert(id.clone(), scheme.clone());
            }
        }
        Ok(id)
    }

    pub fn get(&self, id: &str) -> Option<&SecurityScheme> {
        self.schemes.get(id)
    }

    pub fn len(&self) -> usize {
        self.schemes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.schemes.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &SecurityScheme)> {
        self.schemes.iter().map(|(k, v)| (k.as_str(), v))
    }

    /// The `components.securitySchemes` object.
    pub fn to_components(&self) -> Map<String, Value> {
        self.schemes
            .iter()
            .map(|(id, scheme)| (id.clone(), scheme.to_openapi()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_schemes_register_once() {
        let mut registry = SecuritySchemeRegistry::new();
        assert_eq!(registry.register(&SecurityScheme::bearer()).unwrap(), "Bearer");
        assert_eq!(registry.register(&SecurityScheme::bearer()).unwrap(), "Bearer");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn conflicting_identifier_is_an_error() {
        let mut registry = SecuritySchemeRegistry::new();
        registry
            .register(&SecurityScheme::api_key_in_header("X-Key"))
            .unwrap();
        let err = registry
            .register(&SecurityScheme::api_key_in_header("X-Other"))
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::ConflictingSecurityScheme("APIKeyInHeader".to_string())
        );
    }

    #[test]
    fn components_keep_registration_order() {
        let mut registry = SecuritySchemeRegistry::new();
        registry.register(&SecurityScheme::digest()).unwrap();
        registry.register(&SecurityScheme::basic()).unwrap();
        let keys: Vec<_> = registry.to_components().keys().cloned().collect();
        assert_eq!(keys, vec!["Digest", "Basic"]);
    }
}
