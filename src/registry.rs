//! Component Registry
//!
//! Lookup of component descriptors by domain and by `(domain, platform)`.
//! The validator only sees the [`ComponentRegistry`] trait; how descriptors
//! are discovered (compiled in, loaded from manifests) is up to the adapter.

use std::cell::RefCell;
use std::collections::HashMap;
use std::sync::Arc;

use tracing::debug;

use crate::component::ComponentDescriptor;

/// Key under which a platform descriptor is stored, e.g. `sensor.dht`
pub fn platform_key(domain: &str, platform: &str) -> String {
    format!("{}.{}", domain, platform)
}

/// Source of component descriptors. Both lookups must be pure.
pub trait ComponentRegistry {
    fn lookup(&self, domain: &str) -> Option<Arc<ComponentDescriptor>>;

    fn lookup_platform(&self, domain: &str, platform: &str) -> Option<Arc<ComponentDescriptor>>;
}

impl<R: ComponentRegistry + ?Sized> ComponentRegistry for &R {
    fn lookup(&self, domain: &str) -> Option<Arc<ComponentDescriptor>> {
        (**self).lookup(domain)
    }

    fn lookup_platform(&self, domain: &str, platform: &str) -> Option<Arc<ComponentDescriptor>> {
        (**self).lookup_platform(domain, platform)
    }
}

/// Registry held entirely in memory
#[derive(Debug, Clone, Default)]
pub struct InMemoryRegistry {
    components: HashMap<String, Arc<ComponentDescriptor>>,
}

impl InMemoryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a domain, replacing any previous descriptor
    pub fn register(&mut self, domain: impl Into<String>, descriptor: ComponentDescriptor) {
        self.components.insert(domain.into(), Arc::new(descriptor));
    }

    /// Register a platform of a domain, replacing any previous descriptor
    pub fn register_platform(
        &mut self,
        domain: &str,
        platform: &str,
        descriptor: ComponentDescriptor,
    ) {
        self.components
            .insert(platform_key(domain, platform), Arc::new(descriptor));
    }

    pub fn with_component(mut self, domain: &str, descriptor: ComponentDescriptor) -> Self {
        self.register(domain, descriptor);
        self
    }

    pub fn with_platform(
        mut self,
        domain: &str,
        platform: &str,
        descriptor: ComponentDescriptor,
    ) -> Self {
        self.register_platform(domain, platform, descriptor);
        self
    }

    pub fn contains(&self, key: &str) -> bool {
        self.components.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl ComponentRegistry for InMemoryRegistry {
    fn lookup(&self, domain: &str) -> Option<Arc<ComponentDescriptor>> {
        self.components.get(domain).cloned()
    }

    fn lookup_platform(&self, domain: &str, platform: &str) -> Option<Arc<ComponentDescriptor>> {
        self.components.get(&platform_key(domain, platform)).cloned()
    }
}

/// Caches every answer (including misses) of an inner registry for one run
#[derive(Debug)]
pub struct MemoizedRegistry<R> {
    inner: R,
    cache: RefCell<HashMap<String, Option<Arc<ComponentDescriptor>>>>,
}

impl<R: ComponentRegistry> MemoizedRegistry<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            cache: RefCell::new(HashMap::new()),
        }
    }

    /// Number of distinct keys looked up so far
    pub fn cached_len(&self) -> usize {
        self.cache.borrow().len()
    }

    pub fn into_inner(self) -> R {
        self.inner
    }

    fn cached(
        &self,
        key: String,
        fetch: impl FnOnce(&R) -> Option<Arc<ComponentDescriptor>>,
    ) -> Option<Arc<ComponentDescriptor>> {
        if let Some(hit) = self.cache.borrow().get(&key) {
            return hit.clone();
        }
        let found = fetch(&self.inner);
        if found.is_none() {
            debug!(component = %key, "component not found in registry");
        }
        self.cache.borrow_mut().insert(key, found.clone());
        found
    }
}

impl<R: ComponentRegistry> ComponentRegistry for MemoizedRegistry<R> {
    fn lookup(&self, domain: &str) -> Option<Arc<ComponentDescriptor>> {
        self.cached(domain.to_string(), |inner| inner.lookup(domain))
    }

    fn lookup_platform(&self, domain: &str, platform: &str) -> Option<Arc<ComponentDescriptor>> {
        self.cached(platform_key(domain, platform), |inner| {
            inner.lookup_platform(domain, platform)
        })
    }
}
