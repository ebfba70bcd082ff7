//! Remote cart query state with stale-response suppression.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use cartsync_core::Cart;
use tracing::{debug, error, instrument};

use super::{RemoteCartAccessor, RemoteError};

/// What happened to a fetch result.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchOutcome {
    /// The result became the visible server cart.
    Applied,
    /// A newer fetch or replace was issued while this one was in flight, so
    /// the result was discarded on arrival.
    Superseded,
}

/// Point-in-time view of the remote cart.
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteSnapshot {
    /// Most recently completed cart, or empty if none has completed yet.
    pub cart: Cart,
    /// No result has completed yet and one is in flight.
    pub is_loading: bool,
    /// A request is in flight.
    pub is_fetching: bool,
    /// The newest completed request failed.
    pub is_error: bool,
    /// Message of the newest failure, if `is_error`.
    pub error: Option<String>,
}

#[derive(Debug, Default)]
struct QueryState {
    data: Option<Cart>,
    issued: u64,
    in_flight: usize,
    error: Option<String>,
}

/// Server cart query state around a [`RemoteCartAccessor`].
///
/// Cheaply cloneable via `Arc`; clones share state. Every request takes a
/// ticket from a monotonically increasing counter, and its result is applied
/// only if no newer ticket has been issued since. A failed request keeps the
/// last good cart visible.
pub struct RemoteCart<A> {
    inner: Arc<RemoteCartInner<A>>,
}

struct RemoteCartInner<A> {
    accessor: A,
    state: Mutex<QueryState>,
}

impl<A> Clone for RemoteCart<A> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Marks a request in flight until dropped, including when the request
/// future is cancelled.
struct InFlight<'a, A> {
    cart: &'a RemoteCart<A>,
    ticket: u64,
}

impl<A> Drop for InFlight<'_, A> {
    fn drop(&mut self) {
        let mut state = self.cart.lock();
        state.in_flight = state.in_flight.saturating_sub(1);
    }
}

impl<A> RemoteCart<A> {
    /// Wrap an accessor. Nothing is fetched until [`refetch`](Self::refetch).
    #[must_use]
    pub fn new(accessor: A) -> Self {
        Self {
            inner: Arc::new(RemoteCartInner {
                accessor,
                state: Mutex::new(QueryState::default()),
            }),
        }
    }

    /// The wrapped accessor.
    #[must_use]
    pub fn accessor(&self) -> &A {
        &self.inner.accessor
    }

    fn lock(&self) -> MutexGuard<'_, QueryState> {
        self.inner
            .state
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn begin(&self) -> InFlight<'_, A> {
        let mut state = self.lock();
        state.issued += 1;
        state.in_flight += 1;
        InFlight {
            cart: self,
            ticket: state.issued,
        }
    }

    /// The most recently completed server cart, or empty if none yet.
    #[must_use]
    pub fn cart(&self) -> Cart {
        self.lock().data.clone().unwrap_or_default()
    }

    /// Whether any request has completed successfully since creation or the
    /// last [`reset`](Self::reset).
    #[must_use]
    pub fn has_data(&self) -> bool {
        self.lock().data.is_some()
    }

    /// Current query state.
    #[must_use]
    pub fn snapshot(&self) -> RemoteSnapshot {
        let state = self.lock();
        RemoteSnapshot {
            cart: state.data.clone().unwrap_or_default(),
            is_loading: state.data.is_none() && state.in_flight > 0,
            is_fetching: state.in_flight > 0,
            is_error: state.error.is_some(),
            error: state.error.clone(),
        }
    }

    /// Forget the cached cart and error, and discard anything in flight.
    ///
    /// Used on sign-out so the next user never sees this user's cart.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.issued += 1;
        state.data = None;
        state.error = None;
        debug!("Remote cart state reset");
    }

    /// Record a result for `ticket`. Returns `false` if it was superseded.
    fn settle(&self, ticket: u64, result: Result<&Cart, &RemoteError>) -> bool {
        let mut state = self.lock();
        if ticket != state.issued {
            debug!(ticket, newest = state.issued, "Discarding stale remote cart response");
            return false;
        }
        match result {
            Ok(cart) => {
                state.data = Some(cart.clone());
                state.error = None;
            }
            Err(e) => state.error = Some(e.to_string()),
        }
        true
    }
}

impl<A: RemoteCartAccessor> RemoteCart<A> {
    /// Fetch the server cart.
    ///
    /// # Errors
    ///
    /// Returns the accessor's error if this fetch is still the newest request
    /// when it fails. The last good cart stays visible. Failures of
    /// superseded fetches are discarded like their successes.
    #[instrument(skip(self))]
    pub async fn refetch(&self) -> Result<FetchOutcome, RemoteError> {
        let in_flight = self.begin();
        let result = self.inner.accessor.fetch().await;

        let applied = self.settle(in_flight.ticket, result.as_ref());
        drop(in_flight);

        match (applied, result) {
            (false, _) => Ok(FetchOutcome::Superseded),
            (true, Ok(cart)) => {
                debug!(lines = cart.len(), "Remote cart fetched");
                Ok(FetchOutcome::Applied)
            }
            (true, Err(e)) => {
                error!(error = %e, "Failed to fetch remote cart");
                Err(e)
            }
        }
    }

    /// Replace the server cart and return what the server stored.
    ///
    /// The stored cart becomes visible unless a newer request was issued in
    /// the meantime. Fetches started before this call are superseded by it.
    ///
    /// # Errors
    ///
    /// Returns the accessor's error. The server cart is then whatever it was.
    #[instrument(skip(self, cart), fields(lines = cart.len()))]
    pub async fn replace(&self, cart: &Cart) -> Result<Cart, RemoteError> {
        let in_flight = self.begin();
        let result = self.inner.accessor.replace(cart).await;

        self.settle(in_flight.ticket, result.as_ref());
        drop(in_flight);

        if let Err(e) = &result {
            error!(error = %e, "Failed to replace remote cart");
        }
        result
    }
}
