use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use crate::mapping::{FieldDescriptor, discover};
use crate::meta::ClassRef;
use crate::value::TypeRef;

/// Discovered descriptor lists, keyed by type.
///
/// Entries are created on first lookup and never evicted; type shape cannot
/// change at runtime. Two threads missing the same type at once may both run
/// discovery; the first list stored wins and both results are equal anyway.
#[derive(Debug, Default)]
pub struct DescriptorCache {
    entries: RwLock<HashMap<TypeRef, Arc<[FieldDescriptor]>>>,
    discoveries: AtomicUsize,
}

impl DescriptorCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, class: &ClassRef) -> Arc<[FieldDescriptor]> {
        if let Some(list) = self.read().get(&class.ty()) {
            return list.clone();
        }

        let list: Arc<[FieldDescriptor]> = discover(class, false, None).into();
        self.discoveries.fetch_add(1, Ordering::Relaxed);
        tracing::debug!(class = %class.name(), descriptors = list.len(), "discovered mapping");

        self.write().entry(class.ty()).or_insert(list).clone()
    }

    pub fn contains(&self, class: &ClassRef) -> bool {
        self.read().contains_key(&class.ty())
    }

    pub fn len(&self) -> usize {
        self.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().is_empty()
    }

    /// Number of discovery walks run so far.
    pub fn discoveries(&self) -> usize {
        self.discoveries.load(Ordering::Relaxed)
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<TypeRef, Arc<[FieldDescriptor]>>> {
        match self.entries.read() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("descriptor cache read lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<TypeRef, Arc<[FieldDescriptor]>>> {
        match self.entries.write() {
            Ok(g) => g,
            Err(poisoned) => {
                tracing::warn!("descriptor cache write lock was poisoned, recovering");
                poisoned.into_inner()
            }
        }
    }
}
