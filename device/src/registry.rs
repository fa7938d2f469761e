//! Live resource registry and leak reporting.
//!
//! Every resource created through a [`GraphicsDevice`](crate::GraphicsDevice)
//! factory is registered here under a fresh [`ResourceId`] and removed again
//! by its first `destroy()`. Whatever is still registered when
//! [`GraphicsDevice::check_for_leaks`](crate::GraphicsDevice::check_for_leaks)
//! runs is reported as leaked.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::resources::ResourceType;

static NEXT_RESOURCE_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique resource identifier. Ids increase monotonically and are
/// never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct ResourceId(u64);

impl ResourceId {
    /// Issue the next id.
    pub(crate) fn next() -> Self {
        Self(NEXT_RESOURCE_ID.fetch_add(1, Ordering::Relaxed))
    }

    /// Raw numeric value.
    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ResourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

#[derive(Debug, Clone)]
struct RegistryEntry {
    resource_type: ResourceType,
    name: Option<String>,
}

/// Set of live resource ids owned by one device.
#[derive(Debug, Default)]
pub(crate) struct ResourceRegistry {
    live: BTreeMap<ResourceId, RegistryEntry>,
}

impl ResourceRegistry {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    pub(crate) fn register(
        &mut self,
        id: ResourceId,
        resource_type: ResourceType,
        name: Option<String>,
    ) {
        self.live.insert(id, RegistryEntry { resource_type, name });
    }

    /// Returns false if the id was not registered.
    pub(crate) fn unregister(&mut self, id: ResourceId) -> bool {
        self.live.remove(&id).is_some()
    }

    pub(crate) fn set_name(&mut self, id: ResourceId, name: &str) {
        if let Some(entry) = self.live.get_mut(&id) {
            entry.name = Some(name.to_string());
        }
    }

    pub(crate) fn contains(&self, id: ResourceId) -> bool {
        self.live.contains_key(&id)
    }

    pub(crate) fn len(&self) -> usize {
        self.live.len()
    }

    pub(crate) fn leak_report(&self) -> LeakReport {
        LeakReport {
            leaked: self
                .live
                .iter()
                .map(|(id, entry)| LeakedResource {
                    id: *id,
                    resource_type: entry.resource_type,
                    name: entry.name.clone(),
                })
                .collect(),
        }
    }
}

/// A resource that was created but never destroyed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LeakedResource {
    /// Id of the leaked resource.
    pub id: ResourceId,
    /// Kind of resource.
    pub resource_type: ResourceType,
    /// Debug name, if one was set.
    pub name: Option<String>,
}

impl fmt::Display for LeakedResource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.name {
            Some(name) => write!(f, "{} {} \"{}\"", self.resource_type, self.id, name),
            None => write!(f, "{} {}", self.resource_type, self.id),
        }
    }
}

/// Result of a leak check, ordered by creation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LeakReport {
    leaked: Vec<LeakedResource>,
}

impl LeakReport {
    /// Returns true if nothing leaked.
    pub fn is_empty(&self) -> bool {
        self.leaked.is_empty()
    }

    /// Number of leaked resources.
    pub fn len(&self) -> usize {
        self.leaked.len()
    }

    /// Iterate over leaked resources.
    pub fn iter(&self) -> impl Iterator<Item = &LeakedResource> {
        self.leaked.iter()
    }

    /// Returns true if the given id is among the leaks.
    pub fn contains(&self, id: ResourceId) -> bool {
        self.leaked.iter().any(|leak| leak.id == id)
    }
}

impl fmt::Display for LeakReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.leaked.is_empty() {
            return write!(f, "no leaked resources");
        }
        write!(f, "{} leaked resource(s):", self.leaked.len())?;
        for leak in &self.leaked {
            write!(f, "\n  {leak}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ids_are_monotonic() {
        let a = ResourceId::next();
        let b = ResourceId::next();
        assert!(b > a);
        assert_ne!(a, b);
    }

    #[test]
    fn test_register_and_unregister() {
        let mut registry = ResourceRegistry::new();
        let id = ResourceId::next();
        registry.register(id, ResourceType::Buffer, None);
        assert!(registry.contains(id));
        assert!(registry.unregister(id));
        assert!(!registry.unregister(id));
        assert_eq!(registry.len(), 0);
    }

    #[test]
    fn test_leak_report_lists_names() {
        let mut registry = ResourceRegistry::new();
        let kept = ResourceId::next();
        let freed = ResourceId::next();
        registry.register(kept, ResourceType::Texture, None);
        registry.register(freed, ResourceType::Buffer, None);
        registry.set_name(kept, "albedo");
        registry.unregister(freed);

        let report = registry.leak_report();
        assert_eq!(report.len(), 1);
        assert!(report.contains(kept));
        assert!(!report.contains(freed));
        assert!(report.to_string().contains("albedo"));
    }
}
