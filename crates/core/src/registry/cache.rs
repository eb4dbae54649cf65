//! Name-keyed object and function caches over the host reflection store

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use dashmap::DashMap;
use parking_lot::Mutex;
use tracing::{debug, trace};

use coopbridge_engine::{ReflectionHost, TypeTag};

use super::handle::ObjectHandle;
use crate::error::ErrorKind;
use crate::invoke::{FunctionDescriptor, ParamLayout};
use crate::status::BridgeStatus;

/// Error type for registry lookups
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Function not found: {class}::{method}")]
    FunctionNotFound { class: String, method: String },

    #[error("No live instances of {0}")]
    NoInstances(String),

    #[error("{name} is a {found:?}, expected {expected:?}")]
    TypeMismatch {
        name: String,
        expected: TypeTag,
        found: TypeTag,
    },
}

impl RegistryError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::TypeMismatch { .. } => ErrorKind::LayoutMismatch,
            _ => ErrorKind::NotFoundYet,
        }
    }
}

/// Object Registry Accessor
///
/// Resolves dotted full names to handles with one store walk per name, and
/// (class, method) pairs to [`FunctionDescriptor`]s with one method lookup
/// per pair. Both caches are dropped when the host signals a registry change.
pub struct ObjectRegistry {
    host: Arc<dyn ReflectionHost>,
    status: Arc<BridgeStatus>,
    objects: Mutex<HashMap<String, ObjectHandle>>,
    functions: DashMap<(String, String), Arc<FunctionDescriptor>>,
    scans: AtomicU64,
}

impl ObjectRegistry {
    pub fn new(host: Arc<dyn ReflectionHost>, status: Arc<BridgeStatus>) -> Self {
        Self {
            host,
            status,
            objects: Mutex::new(HashMap::new()),
            functions: DashMap::new(),
            scans: AtomicU64::new(0),
        }
    }

    /// Resolve a dotted full name
    ///
    /// Fails with `NotFound` while the host store is still being populated;
    /// callers retry on a later tick.
    pub fn lookup(&self, full_name: &str) -> Result<ObjectHandle, RegistryError> {
        if let Some(handle) = self.objects.lock().get(full_name) {
            trace!("Cache hit for {}: {}", full_name, handle);
            return Ok(*handle);
        }

        self.scans.fetch_add(1, Ordering::Relaxed);
        let Some(raw) = self.host.find_object_by_full_name(full_name) else {
            debug!("Object {} not found (ready: {})", full_name, self.host.is_ready());
            return Err(RegistryError::NotFound(full_name.to_string()));
        };

        // A concurrent scan may have won; keep the first handle
        let mut objects = self.objects.lock();
        let handle = *objects
            .entry(full_name.to_string())
            .or_insert(ObjectHandle::from_raw(raw));
        debug!("Resolved {} -> {}", full_name, handle);
        Ok(handle)
    }

    /// Resolve a name and check the entry kind
    ///
    /// A tag mismatch means the host store no longer looks like the build we
    /// target, so it raises the fatal status instead of returning a handle.
    pub fn lookup_as(&self, full_name: &str, expected: TypeTag) -> Result<ObjectHandle, RegistryError> {
        let handle = self.lookup(full_name)?;
        self.check_tag(full_name, handle, expected)?;
        Ok(handle)
    }

    /// Resolve a class descriptor by full name
    pub fn lookup_class(&self, full_name: &str) -> Result<ObjectHandle, RegistryError> {
        self.lookup_as(full_name, TypeTag::Class)
    }

    /// Resolve a member function and its parameter layout
    pub fn lookup_function(
        &self,
        class_name: &str,
        method: &str,
    ) -> Result<Arc<FunctionDescriptor>, RegistryError> {
        let key = (class_name.to_string(), method.to_string());
        if let Some(descriptor) = self.functions.get(&key) {
            return Ok(descriptor.clone());
        }

        let class = self.lookup_class(class_name)?;
        let raw = self
            .host
            .find_function(class.raw(), method)
            .ok_or_else(|| RegistryError::FunctionNotFound {
                class: class_name.to_string(),
                method: method.to_string(),
            })?;
        let function = ObjectHandle::from_raw(raw);
        self.check_tag(&format!("{}::{}", class_name, method), function, TypeTag::Function)?;

        let layout = ParamLayout::from_properties(&self.host.function_properties(raw));
        debug!(
            "Resolved {}::{} ({} params, {} bytes)",
            class_name,
            method,
            layout.slots().len(),
            layout.size()
        );

        let descriptor = self
            .functions
            .entry(key)
            .or_insert_with(|| {
                Arc::new(FunctionDescriptor::new(class, function, class_name, method, layout))
            })
            .clone();
        Ok(descriptor)
    }

    /// Every live, non-template instance of a class
    pub fn instances_of(&self, class_name: &str) -> Result<Vec<ObjectHandle>, RegistryError> {
        let class = self.lookup_class(class_name)?;
        let instances: Vec<ObjectHandle> = self
            .host
            .enumerate_class_instances(class.raw())
            .into_iter()
            .map(ObjectHandle::from_raw)
            .collect();

        if instances.is_empty() {
            return Err(RegistryError::NoInstances(class_name.to_string()));
        }
        Ok(instances)
    }

    fn check_tag(&self, name: &str, handle: ObjectHandle, expected: TypeTag) -> Result<(), RegistryError> {
        let found = self.host.type_tag(handle.raw());
        if found == expected {
            return Ok(());
        }

        let err = RegistryError::TypeMismatch {
            name: name.to_string(),
            expected,
            found,
        };
        self.status.raise_host_unsupported(&err.to_string());
        Err(err)
    }

    /// Drop every cached handle and descriptor
    pub fn on_registry_changed(&self) {
        let objects = {
            let mut objects = self.objects.lock();
            let count = objects.len();
            objects.clear();
            count
        };
        let functions = self.functions.len();
        self.functions.clear();
        debug!(
            "Registry changed: dropped {} objects and {} functions",
            objects, functions
        );
    }

    pub fn cached_objects(&self) -> usize {
        self.objects.lock().len()
    }

    pub fn cached_functions(&self) -> usize {
        self.functions.len()
    }

    /// Number of store walks performed
    pub fn scan_count(&self) -> u64 {
        self.scans.load(Ordering::Relaxed)
    }

    pub fn host(&self) -> &Arc<dyn ReflectionHost> {
        &self.host
    }
}
