use std::collections::VecDeque;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::Endpoint;
use crate::MockResolver;
use crate::ResolveError;

pub(crate) type ResolveOutcome = Result<Vec<Endpoint>, ResolveError>;

/// Counts resolver invocations shared with a mock
#[derive(Debug, Clone, Default)]
pub(crate) struct CallCounter(Arc<AtomicUsize>);

impl CallCounter {
    pub(crate) fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    fn bump(&self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

/// Mock that accepts every target name and answers `resolve` with `script`
/// in order, then with `then` forever.
pub(crate) fn scripted_resolver(
    script: Vec<ResolveOutcome>,
    then: ResolveOutcome,
) -> (MockResolver, CallCounter) {
    let counter = CallCounter::default();
    let script = Arc::new(Mutex::new(VecDeque::from(script)));

    let mut resolver = MockResolver::new();
    resolver.expect_check_target().returning(|_| Ok(()));

    let calls = counter.clone();
    resolver.expect_resolve().returning(move |_| {
        calls.bump();
        script.lock().pop_front().unwrap_or_else(|| then.clone())
    });

    (resolver, counter)
}

/// Mock whose every resolution returns a set never seen before, so each
/// poll publishes.
pub(crate) fn churning_resolver() -> (MockResolver, CallCounter) {
    let counter = CallCounter::default();

    let mut resolver = MockResolver::new();
    resolver.expect_check_target().returning(|_| Ok(()));

    let calls = counter.clone();
    resolver.expect_resolve().returning(move |_| {
        calls.bump();
        let port = 1000 + calls.get() as u16;
        Ok(vec![Endpoint::new("churn", port, 1)])
    });

    (resolver, counter)
}
