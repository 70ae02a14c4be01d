//! Context-scoped component resolution.

use dashmap::DashMap;
use std::any::{Any, TypeId};
use std::sync::Arc;

/// Produces the component of type `T` registered for a context.
///
/// `Ok(None)` means nothing is registered, which callers treat as a cue to
/// fall back rather than as a failure.
pub trait ComponentResolver<T>: Send + Sync {
    fn resolve(&self, context_id: &str) -> Result<Option<T>, ResolveError>;
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ResolveError {
    #[error("context `{0}` is not available")]
    ContextUnavailable(String),

    #[error("component for context `{context}` is not a `{expected}`")]
    TypeMismatch {
        context: String,
        expected: &'static str,
    },
}

type ComponentKey = (String, TypeId);

/// Concurrent map of `(context, type) → component`.
#[derive(Debug, Default)]
pub struct ContextRegistry {
    components: DashMap<ComponentKey, Arc<dyn Any + Send + Sync>>,
}

impl ContextRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register (or replace) the `T` component of a context.
    pub fn register<T>(&self, context_id: impl Into<String>, component: T)
    where
        T: Any + Send + Sync,
    {
        self.components
            .insert((context_id.into(), TypeId::of::<T>()), Arc::new(component));
    }

    /// Replace every `T` component at once, leaving other types untouched.
    pub fn replace_all<T, I>(&self, components: I)
    where
        T: Any + Send + Sync,
        I: IntoIterator<Item = (String, T)>,
    {
        let type_id = TypeId::of::<T>();
        self.components.retain(|(_, t), _| *t != type_id);
        for (context_id, component) in components {
            self.components
                .insert((context_id, type_id), Arc::new(component));
        }
    }

    pub fn remove_context(&self, context_id: &str) {
        self.components.retain(|(ctx, _), _| ctx != context_id);
    }

    pub fn len(&self) -> usize {
        self.components.len()
    }

    pub fn is_empty(&self) -> bool {
        self.components.is_empty()
    }
}

impl<T> ComponentResolver<T> for ContextRegistry
where
    T: Any + Clone + Send + Sync,
{
    fn resolve(&self, context_id: &str) -> Result<Option<T>, ResolveError> {
        let key = (context_id.to_string(), TypeId::of::<T>());
        let Some(entry) = self.components.get(&key) else {
            return Ok(None);
        };
        entry
            .value()
            .downcast_ref::<T>()
            .cloned()
            .map(Some)
            .ok_or_else(|| ResolveError::TypeMismatch {
                context: context_id.to_string(),
                expected: std::any::type_name::<T>(),
            })
    }
}
