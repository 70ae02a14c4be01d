//! Lazy delegate holders under concurrency and refresh.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use filter_gateway::delegate::{
    ComponentResolver, ContextRegistry, DefaultFactory, LazyDelegate, NoFactory, Refreshable,
    RefreshableRegistry, ResolveError,
};

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
struct Serializer {
    format: String,
}

/// Resolver that counts calls and holds the lock long enough to expose races.
struct SlowResolver {
    calls: AtomicUsize,
    result: Option<Serializer>,
}

impl ComponentResolver<Serializer> for SlowResolver {
    fn resolve(&self, _context_id: &str) -> Result<Option<Serializer>, ResolveError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(Duration::from_millis(20));
        Ok(self.result.clone())
    }
}

struct HolderGroup(Vec<Arc<LazyDelegate<Serializer>>>);

impl Refreshable for HolderGroup {
    fn refresh(&self) {
        for holder in &self.0 {
            holder.invalidate();
        }
    }
}

#[test]
fn test_concurrent_first_resolve_runs_resolver_once() {
    let resolver = Arc::new(SlowResolver {
        calls: AtomicUsize::new(0),
        result: Some(Serializer {
            format: "json".to_string(),
        }),
    });
    let holder: Arc<LazyDelegate<Serializer>> = Arc::new(LazyDelegate::<Serializer>::new(
        "orders",
        resolver.clone(),
        Arc::new(NoFactory),
    ));

    let results: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| holder.resolve().unwrap()))
            .collect();
        handles.into_iter().map(|h| h.join().unwrap()).collect()
    });

    assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
    assert!(results.iter().all(|r| Arc::ptr_eq(r, &results[0])));
    assert_eq!(results[0].format, "json");
}

#[test]
fn test_missing_component_falls_back_to_default_and_caches() {
    let resolver = Arc::new(SlowResolver {
        calls: AtomicUsize::new(0),
        result: None,
    });
    let holder: LazyDelegate<Serializer> =
        LazyDelegate::<Serializer>::new("orders", resolver.clone(), Arc::new(DefaultFactory));

    let first = holder.resolve().unwrap();
    let second = holder.resolve().unwrap();

    assert_eq!(*first, Serializer::default());
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(resolver.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_refresh_picks_up_new_registration() {
    let registry = Arc::new(ContextRegistry::new());
    registry.register(
        "orders",
        Serializer {
            format: "json".to_string(),
        },
    );

    let holder: Arc<LazyDelegate<Serializer>> = Arc::new(LazyDelegate::<Serializer>::new(
        "orders",
        registry.clone(),
        Arc::new(NoFactory),
    ));
    assert_eq!(holder.resolve().unwrap().format, "json");

    let refreshables = RefreshableRegistry::new();
    refreshables.register(Arc::new(HolderGroup(vec![holder.clone()])));

    registry.register(
        "orders",
        Serializer {
            format: "cbor".to_string(),
        },
    );
    assert_eq!(holder.resolve().unwrap().format, "json");

    assert_eq!(refreshables.refresh_all(), 1);
    assert!(!holder.is_resolved());
    assert_eq!(holder.resolve().unwrap().format, "cbor");
}

#[test]
fn test_transparent_equality_and_display_delegate() {
    let registry = Arc::new(ContextRegistry::new());
    registry.register("orders", 42_u32);
    let holder = LazyDelegate::<u32>::new("orders", registry, Arc::new(NoFactory));

    assert!(holder == 42);
    assert_eq!(holder.to_string(), "42");
}
