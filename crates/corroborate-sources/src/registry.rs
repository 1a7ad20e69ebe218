//! Static table of retrieval ports, one per source kind

use crate::SourceError;
use corroborate_domain::{RetrievalPort, SourceKind};
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// Registry mapping each source kind to its retrieval port
///
/// Built once before a run and shared read-only afterwards. Registering a
/// second port for a kind replaces the first.
#[derive(Clone, Default)]
pub struct SourceRegistry {
    ports: BTreeMap<SourceKind, Arc<dyn RetrievalPort>>,
}

impl SourceRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry from a list of ports
    pub fn from_ports(ports: Vec<Arc<dyn RetrievalPort>>) -> Self {
        let mut registry = Self::new();
        for port in ports {
            registry.register(port);
        }
        registry
    }

    /// Register a port under its own kind, returning the port it replaced
    pub fn register(&mut self, port: Arc<dyn RetrievalPort>) -> Option<Arc<dyn RetrievalPort>> {
        let kind = port.kind();
        debug!("Registering retrieval port for '{}'", kind);
        self.ports.insert(kind, port)
    }

    /// Builder-style [`register`](Self::register)
    pub fn with_port(mut self, port: impl RetrievalPort + 'static) -> Self {
        self.register(Arc::new(port));
        self
    }

    /// Get the port for a kind
    pub fn get(&self, kind: SourceKind) -> Option<Arc<dyn RetrievalPort>> {
        self.ports.get(&kind).cloned()
    }

    /// Get the port for a kind, failing if none is registered
    pub fn require(&self, kind: SourceKind) -> Result<Arc<dyn RetrievalPort>, SourceError> {
        self.get(kind).ok_or(SourceError::NotRegistered(kind))
    }

    /// Kinds with a registered port, in stable order
    pub fn kinds(&self) -> Vec<SourceKind> {
        self.ports.keys().copied().collect()
    }

    /// Whether a kind has a port
    pub fn contains(&self, kind: SourceKind) -> bool {
        self.ports.contains_key(&kind)
    }

    /// Number of registered ports
    pub fn len(&self) -> usize {
        self.ports.len()
    }

    /// Whether no port is registered
    pub fn is_empty(&self) -> bool {
        self.ports.is_empty()
    }
}

impl fmt::Debug for SourceRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SourceRegistry")
            .field("kinds", &self.kinds())
            .finish()
    }
}
