//! Registry of mappings keyed by domain type.

use std::any::{type_name, Any, TypeId};
use std::collections::HashMap;
use std::fmt;

use search_index_shared::{Mappable, Mapping, Request};

use crate::errors::SearchIndexError;

/// Holds one [`Mapping`] per domain type.
///
/// The registry is filled at startup and handed to the `SearchClient`, which
/// uses it to turn objects into requests.
#[derive(Default)]
pub struct MappingRegistry {
    mappings: HashMap<TypeId, Box<dyn Any + Send + Sync>>,
    names: HashMap<TypeId, &'static str>,
}

impl fmt::Debug for MappingRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.names.values().copied().collect();
        names.sort_unstable();
        f.debug_struct("MappingRegistry")
            .field("types", &names)
            .finish()
    }
}

impl MappingRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `mapping` for `T`, replacing any earlier one.
    pub fn register<T: Mappable + 'static>(&mut self, mapping: Mapping<T>) {
        let id = TypeId::of::<T>();
        self.mappings.insert(id, Box::new(mapping));
        self.names.insert(id, type_name::<T>());
    }

    /// Builder-style [`MappingRegistry::register`].
    pub fn with<T: Mappable + 'static>(mut self, mapping: Mapping<T>) -> Self {
        self.register(mapping);
        self
    }

    /// Whether a mapping is registered for `T`.
    pub fn contains<T: 'static>(&self) -> bool {
        self.mappings.contains_key(&TypeId::of::<T>())
    }

    /// The mapping registered for `T`.
    ///
    /// # Returns
    ///
    /// * `Ok(&Mapping<T>)` - The registered mapping
    /// * `Err(SearchIndexError::UnknownMapping)` - If `T` has no mapping
    pub fn get<T: Mappable + 'static>(&self) -> Result<&Mapping<T>, SearchIndexError> {
        self.mappings
            .get(&TypeId::of::<T>())
            .and_then(|mapping| mapping.downcast_ref::<Mapping<T>>())
            .ok_or_else(|| SearchIndexError::unknown_mapping(type_name::<T>()))
    }

    /// Build the request for `object` using its registered mapping.
    pub fn build_request<T: Mappable + 'static>(
        &self,
        object: &T,
    ) -> Result<Request, SearchIndexError> {
        let mapping = self.get::<T>()?;
        Ok(mapping.build_request(object)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Serialize;

    #[derive(Serialize)]
    struct Article {
        id: u64,
        title: String,
    }

    impl Mappable for Article {
        fn mapping_id(&self) -> String {
            self.id.to_string()
        }
    }

    #[derive(Serialize)]
    struct Comment {
        id: u64,
    }

    impl Mappable for Comment {
        fn mapping_id(&self) -> String {
            self.id.to_string()
        }
    }

    #[test]
    fn test_build_request_uses_registered_mapping() {
        let registry =
            MappingRegistry::new().with(Mapping::<Article>::builder("articles").field("title").build());

        let article = Article {
            id: 7,
            title: "Hello".to_string(),
        };
        let request = registry.build_request(&article).unwrap();
        assert_eq!(request.path(), "/articles/Article/7");
        assert!(registry.contains::<Article>());
    }

    #[test]
    fn test_unregistered_type_is_unknown_mapping() {
        let registry = MappingRegistry::new();
        let err = registry.build_request(&Comment { id: 1 }).unwrap_err();
        match err {
            SearchIndexError::UnknownMapping(name) => assert!(name.ends_with("Comment")),
            other => panic!("unexpected error: {other:?}"),
        }
    }
}
