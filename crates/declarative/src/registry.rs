//! Registry of resource kinds, keyed by kind name.

use std::collections::BTreeMap;

use crate::error::{EngineError, Result};
use crate::reconciler::Reconciler;
use crate::resource::ResourceKind;
use crate::schema::ResourceDescriptor;

/// Maps kind names to their implementations
pub struct Registry<G: ?Sized> {
    kinds: BTreeMap<&'static str, Box<dyn ResourceKind<G>>>,
}

impl<G: ?Sized> Default for Registry<G> {
    fn default() -> Self {
        Self {
            kinds: BTreeMap::new(),
        }
    }
}

impl<G: ?Sized> Registry<G> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a kind. Registering the same name twice is an error.
    pub fn register(&mut self, kind: Box<dyn ResourceKind<G>>) -> Result<()> {
        let name = kind.name();
        if self.kinds.contains_key(name) {
            return Err(EngineError::schema(name, "kind is already registered"));
        }
        self.kinds.insert(name, kind);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&dyn ResourceKind<G>> {
        self.kinds
            .get(name)
            .map(|kind| &**kind)
            .ok_or_else(|| EngineError::UnknownKind(name.to_string()))
    }

    pub fn descriptor(&self, name: &str) -> Result<&ResourceDescriptor> {
        self.get(name).map(|kind| kind.descriptor())
    }

    /// Reconciler for `name` bound to `gateway`
    pub fn reconciler<'a>(&'a self, name: &str, gateway: &'a G) -> Result<Reconciler<'a, G>> {
        Ok(Reconciler::new(self.get(name)?, gateway))
    }

    /// Registered kind names, sorted
    pub fn kinds(&self) -> impl Iterator<Item = &'static str> + '_ {
        self.kinds.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resource::RemoteResponse;
    use crate::schema::{AttrType, AttributeSpec};
    use crate::types::Record;
    use serde_json::Value as Json;
    use std::sync::LazyLock;

    static THING: LazyLock<ResourceDescriptor> = LazyLock::new(|| {
        ResourceDescriptor::new(
            "thing",
            "test kind",
            "id",
            vec![AttributeSpec::computed_once("id", AttrType::String)],
        )
        .unwrap()
    });

    struct Thing;

    impl ResourceKind<()> for Thing {
        fn descriptor(&self) -> &ResourceDescriptor {
            &THING
        }

        fn remote_create(&self, _: &(), _: &Record, _: &Json) -> Result<RemoteResponse> {
            Ok(RemoteResponse::new(201, "Created", "{\"id\":\"t-1\"}"))
        }

        fn remote_read(&self, _: &(), _: &str) -> Result<RemoteResponse> {
            Ok(RemoteResponse::new(200, "OK", "{\"id\":\"t-1\"}"))
        }

        fn remote_update(&self, _: &(), _: &str, _: &Json) -> Result<RemoteResponse> {
            Ok(RemoteResponse::new(200, "OK", "{\"id\":\"t-1\"}"))
        }

        fn remote_delete(&self, _: &(), _: &str) -> Result<RemoteResponse> {
            Ok(RemoteResponse::new(204, "No Content", ""))
        }
    }

    #[test]
    fn test_register_and_get() {
        let mut registry: Registry<()> = Registry::new();
        registry.register(Box::new(Thing)).unwrap();
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.get("thing").unwrap().name(), "thing");
        assert_eq!(registry.kinds().collect::<Vec<_>>(), vec!["thing"]);
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry: Registry<()> = Registry::new();
        registry.register(Box::new(Thing)).unwrap();
        assert!(registry.register(Box::new(Thing)).is_err());
    }

    #[test]
    fn test_unknown_kind() {
        let registry: Registry<()> = Registry::new();
        assert!(matches!(registry.get("nope"), Err(EngineError::UnknownKind(_))));
    }

    #[test]
    fn test_reconciler_dispatch() {
        let mut registry: Registry<()> = Registry::new();
        registry.register(Box::new(Thing)).unwrap();
        let state = registry.reconciler("thing", &()).unwrap().import("t-1").unwrap();
        assert_eq!(state.get_str("id"), Some("t-1"));
    }
}
