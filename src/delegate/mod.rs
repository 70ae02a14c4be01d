//! Lazily resolved, explicitly invalidated component holders.
//!
//! # Data Flow
//! ```text
//! resolve()
//!     → shared read of the cached slot (fast path, no exclusive access)
//!     → cold: exclusive write, re-check, resolver.rs (context lookup)
//!         → no instance / failure: factory.rs (factory of last resort)
//!     → cache Arc<T>, return it
//!
//! Config reload:
//!     RefreshableRegistry::refresh_all → invalidate() on every holder
//!     → next resolve() re-runs resolution
//! ```
//!
//! # Design Decisions
//! - Holders stay in place across reloads, so references held by
//!   collaborators remain valid
//! - At most one resolution runs at a time per holder
//! - Instances are replaced, never mutated

pub mod factory;
pub mod resolver;

pub use factory::{DefaultFactory, FactoryError, FnFactory, InstanceFactory, NoFactory};
pub use resolver::{ComponentResolver, ContextRegistry, ResolveError};

use std::any::type_name;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Neither the resolver nor the fallback factory produced an instance.
#[derive(Debug, thiserror::Error)]
#[error("no `{type_name}` available for context `{context}`")]
pub struct DelegateError {
    pub context: String,
    pub type_name: &'static str,
    #[source]
    pub source: FactoryError,
}

/// Something that can drop cached state on demand.
pub trait Refreshable: Send + Sync {
    fn refresh(&self);
}

/// Caches one context-scoped instance of `T` until invalidated.
pub struct LazyDelegate<T> {
    context_id: String,
    resolver: Arc<dyn ComponentResolver<T>>,
    factory: Arc<dyn InstanceFactory<T>>,
    delegate: RwLock<Option<Arc<T>>>,
}

impl<T: Send + Sync + 'static> LazyDelegate<T> {
    /// Create a cold holder.
    pub fn new(
        context_id: impl Into<String>,
        resolver: Arc<dyn ComponentResolver<T>>,
        factory: Arc<dyn InstanceFactory<T>>,
    ) -> Self {
        Self {
            context_id: context_id.into(),
            resolver,
            factory,
            delegate: RwLock::new(None),
        }
    }

    /// Create a holder that starts with an instance already cached.
    pub fn preloaded(
        context_id: impl Into<String>,
        resolver: Arc<dyn ComponentResolver<T>>,
        factory: Arc<dyn InstanceFactory<T>>,
        instance: T,
    ) -> Self {
        let holder = Self::new(context_id, resolver, factory);
        *holder.write_slot() = Some(Arc::new(instance));
        holder
    }

    pub fn context_id(&self) -> &str {
        &self.context_id
    }

    /// The cached instance, resolving it first when cold.
    pub fn resolve(&self) -> Result<Arc<T>, DelegateError> {
        if let Some(instance) = self.read_slot().as_ref() {
            return Ok(Arc::clone(instance));
        }
        self.load_instance()
    }

    /// Drop the cached instance. Idempotent.
    pub fn invalidate(&self) {
        if self.write_slot().take().is_some() {
            tracing::debug!(
                context = %self.context_id,
                component = type_name::<T>(),
                "Delegate invalidated"
            );
        }
    }

    pub fn is_resolved(&self) -> bool {
        self.read_slot().is_some()
    }

    fn load_instance(&self) -> Result<Arc<T>, DelegateError> {
        let mut slot = self.write_slot();

        // Another caller may have resolved while we waited.
        if let Some(instance) = slot.as_ref() {
            return Ok(Arc::clone(instance));
        }

        let instance = match self.resolver.resolve(&self.context_id) {
            Ok(Some(instance)) => instance,
            Ok(None) => {
                tracing::debug!(
                    context = %self.context_id,
                    component = type_name::<T>(),
                    "No component registered, using fallback instance"
                );
                self.create_fallback()?
            }
            Err(e) => {
                tracing::warn!(
                    context = %self.context_id,
                    component = type_name::<T>(),
                    error = %e,
                    "Component resolution failed, using fallback instance"
                );
                self.create_fallback()?
            }
        };

        let instance = Arc::new(instance);
        *slot = Some(Arc::clone(&instance));
        Ok(instance)
    }

    fn create_fallback(&self) -> Result<T, DelegateError> {
        self.factory.create().map_err(|source| DelegateError {
            context: self.context_id.clone(),
            type_name: type_name::<T>(),
            source,
        })
    }

    fn read_slot(&self) -> RwLockReadGuard<'_, Option<Arc<T>>> {
        self.delegate.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_slot(&self) -> RwLockWriteGuard<'_, Option<Arc<T>>> {
        self.delegate.write().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<T: Send + Sync + 'static> Refreshable for LazyDelegate<T> {
    fn refresh(&self) {
        self.invalidate();
    }
}

impl<T> fmt::Debug for LazyDelegate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let resolved = self
            .delegate
            .read()
            .map(|slot| slot.is_some())
            .unwrap_or(false);
        f.debug_struct("LazyDelegate")
            .field("context_id", &self.context_id)
            .field("component", &type_name::<T>())
            .field("resolved", &resolved)
            .finish()
    }
}

// Equality, hashing and display go through the resolved instance.

impl<T: PartialEq + Send + Sync + 'static> PartialEq<T> for LazyDelegate<T> {
    fn eq(&self, other: &T) -> bool {
        self.resolve().map(|d| *d == *other).unwrap_or(false)
    }
}

impl<T: Hash + Send + Sync + 'static> Hash for LazyDelegate<T> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        if let Ok(d) = self.resolve() {
            d.hash(state);
        }
    }
}

impl<T: fmt::Display + Send + Sync + 'static> fmt::Display for LazyDelegate<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.resolve() {
            Ok(d) => fmt::Display::fmt(&*d, f),
            Err(_) => Err(fmt::Error),
        }
    }
}

/// Invalidates a group of holders together.
#[derive(Default)]
pub struct RefreshableRegistry {
    members: Mutex<Vec<Arc<dyn Refreshable>>>,
}

impl RefreshableRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, member: Arc<dyn Refreshable>) {
        self.members
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(member);
    }

    /// Refresh every registered member. Returns how many were refreshed.
    pub fn refresh_all(&self) -> usize {
        let members = self
            .members
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for member in &members {
            member.refresh();
        }
        tracing::debug!(count = members.len(), "Refreshed registered components");
        members.len()
    }

    pub fn len(&self) -> usize {
        self.members.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl fmt::Debug for RefreshableRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefreshableRegistry")
            .field("members", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::hash_map::DefaultHasher;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
    struct Codec {
        name: String,
    }

    impl fmt::Display for Codec {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "codec:{}", self.name)
        }
    }

    /// Resolver that counts calls and returns a scripted answer.
    struct Scripted {
        calls: AtomicUsize,
        answer: fn() -> Result<Option<Codec>, ResolveError>,
    }

    impl Scripted {
        fn new(answer: fn() -> Result<Option<Codec>, ResolveError>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                answer,
            })
        }
    }

    impl ComponentResolver<Codec> for Scripted {
        fn resolve(&self, _context_id: &str) -> Result<Option<Codec>, ResolveError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.answer)()
        }
    }

    fn found() -> Result<Option<Codec>, ResolveError> {
        Ok(Some(Codec { name: "json".into() }))
    }

    fn missing() -> Result<Option<Codec>, ResolveError> {
        Ok(None)
    }

    fn broken() -> Result<Option<Codec>, ResolveError> {
        Err(ResolveError::ContextUnavailable("svc".into()))
    }

    #[test]
    fn test_resolve_caches_instance() {
        let resolver = Scripted::new(found);
        let holder: LazyDelegate<Codec> =
            LazyDelegate::new("svc", resolver.clone(), Arc::new(DefaultFactory));

        assert!(!holder.is_resolved());
        let first = holder.resolve().unwrap();
        let second = holder.resolve().unwrap();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.name, "json");
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_missing_component_falls_back_to_default() {
        let holder: LazyDelegate<Codec> =
            LazyDelegate::new("svc", Scripted::new(missing), Arc::new(DefaultFactory));
        let codec = holder.resolve().unwrap();
        assert_eq!(*codec, Codec::default());
        assert!(holder.is_resolved());
    }

    #[test]
    fn test_resolver_failure_falls_back_to_default() {
        let holder: LazyDelegate<Codec> =
            LazyDelegate::new("svc", Scripted::new(broken), Arc::new(DefaultFactory));
        assert_eq!(*holder.resolve().unwrap(), Codec::default());
    }

    #[test]
    fn test_both_failing_is_an_error() {
        let holder: LazyDelegate<Codec> =
            LazyDelegate::new("svc", Scripted::new(broken), Arc::new(NoFactory));
        let err = holder.resolve().unwrap_err();
        assert_eq!(err.context, "svc");
        assert!(!holder.is_resolved());
    }

    #[test]
    fn test_invalidate_forces_reresolution() {
        let resolver = Scripted::new(found);
        let holder: LazyDelegate<Codec> =
            LazyDelegate::new("svc", resolver.clone(), Arc::new(DefaultFactory));

        let before = holder.resolve().unwrap();
        holder.invalidate();
        holder.invalidate();
        assert!(!holder.is_resolved());

        let after = holder.resolve().unwrap();
        assert!(!Arc::ptr_eq(&before, &after));
        assert_eq!(*before, *after);
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_invalidate_while_cold_is_noop() {
        let resolver = Scripted::new(found);
        let holder: LazyDelegate<Codec> =
            LazyDelegate::new("svc", resolver.clone(), Arc::new(DefaultFactory));
        holder.invalidate();
        assert!(!holder.is_resolved());
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_preloaded_skips_resolver() {
        let resolver = Scripted::new(found);
        let holder = LazyDelegate::preloaded(
            "svc",
            resolver.clone(),
            Arc::new(DefaultFactory),
            Codec { name: "xml".into() },
        );
        assert_eq!(holder.resolve().unwrap().name, "xml");
        assert_eq!(resolver.calls.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_identity_delegates_to_instance() {
        let holder: LazyDelegate<Codec> =
            LazyDelegate::new("svc", Scripted::new(found), Arc::new(DefaultFactory));
        let expected = Codec { name: "json".into() };

        assert!(holder == expected);
        assert_eq!(holder.to_string(), "codec:json");

        let mut a = DefaultHasher::new();
        holder.hash(&mut a);
        let mut b = DefaultHasher::new();
        expected.hash(&mut b);
        assert_eq!(a.finish(), b.finish());
    }

    #[test]
    fn test_registry_refreshes_all_members() {
        let registry = RefreshableRegistry::new();
        let a: Arc<LazyDelegate<Codec>> = Arc::new(LazyDelegate::new(
            "a",
            Scripted::new(found),
            Arc::new(DefaultFactory),
        ));
        let b: Arc<LazyDelegate<Codec>> = Arc::new(LazyDelegate::new(
            "b",
            Scripted::new(found),
            Arc::new(DefaultFactory),
        ));
        registry.register(a.clone());
        registry.register(b.clone());

        a.resolve().unwrap();
        b.resolve().unwrap();
        assert_eq!(registry.refresh_all(), 2);
        assert!(!a.is_resolved());
        assert!(!b.is_resolved());
    }
}
