//! Unified cart surface over the guest and server carts.
//!
//! # Architecture
//!
//! The coordinator owns the guest cart container, the remote query state and
//! the current authentication signal. From the signal it derives a
//! [`SessionPhase`] and, from that, which [`CartProvider`] is visible. Callers
//! read a [`CartSnapshot`] and never branch on authentication themselves.
//!
//! ```text
//!            set_auth_state()
//!   Guest ──────────────────▶ Authenticating ──────────▶ Authenticated
//!     ▲                                                       │
//!     └──────────────────────── LoggedOut ◀───────────────────┘
//! ```
//!
//! Signing in never touches the guest cart. Guest items stay readable until
//! the caller merges or clears them; [`Transition::LoggedIn`] reports whether
//! there is anything to reconcile.

use cartsync_core::{AuthState, AuthStatus, Cart, LineItem, Quantity, UserDescriptor};
use serde::Serialize;
use tracing::{debug, info, instrument, warn};

use crate::error::{CartError, Result};
use crate::guest::GuestCart;
use crate::remote::{FetchOutcome, RemoteCart, RemoteCartAccessor};
use crate::store::LocalCartStore;

/// How [`CartCoordinator::replace`] treats duplicate products in its input.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvariantPolicy {
    /// Reject the input with [`CartError::Invariant`].
    Strict,
    /// Fold duplicates together and log a warning.
    Coalesce,
}

impl Default for InvariantPolicy {
    /// `Strict` in debug builds, `Coalesce` in release builds.
    fn default() -> Self {
        if cfg!(debug_assertions) {
            Self::Strict
        } else {
            Self::Coalesce
        }
    }
}

impl std::str::FromStr for InvariantPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "strict" => Ok(Self::Strict),
            "coalesce" => Ok(Self::Coalesce),
            _ => Err(format!("invalid invariant policy: {s}")),
        }
    }
}

/// What to do with guest items when a signed-in user reconciles carts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeStrategy {
    /// Sum quantities per product into the server cart.
    Sum,
    /// Keep the server cart as is and drop the guest items.
    Discard,
}

impl std::fmt::Display for MergeStrategy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sum => write!(f, "sum"),
            Self::Discard => write!(f, "discard"),
        }
    }
}

impl std::str::FromStr for MergeStrategy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "sum" => Ok(Self::Sum),
            "discard" => Ok(Self::Discard),
            _ => Err(format!("invalid merge strategy: {s}")),
        }
    }
}

/// Where the visible cart comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CartSource {
    /// Authentication is still resolving; the guest cart is shown but is not
    /// final.
    Pending,
    /// The guest cart.
    Local,
    /// The server cart.
    Remote,
}

impl std::fmt::Display for CartSource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Pending => write!(f, "pending"),
            Self::Local => write!(f, "local"),
            Self::Remote => write!(f, "remote"),
        }
    }
}

/// Session phase derived from the authentication signal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    /// Anonymous visitor; the guest cart is visible.
    Guest,
    /// The session layer is still resolving the caller; the guest cart is
    /// shown as pending.
    Authenticating,
    /// A user is signed in; the server cart is visible.
    Authenticated,
}

/// Result of [`CartCoordinator::set_auth_state`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transition {
    /// Nothing changed for the cart, including the same user resolving
    /// again after a loading phase.
    Unchanged,
    /// Authentication started resolving.
    Authenticating,
    /// Authentication resolved to an anonymous visitor.
    Guest,
    /// A user signed in, or a different user replaced the previous one. The
    /// guest cart is untouched.
    LoggedIn {
        /// The guest cart has items the caller may want to merge.
        pending_guest_items: bool,
    },
    /// The user signed out. Cached server state was dropped.
    LoggedOut,
}

/// The unified cart view handed to callers.
#[derive(Debug, Clone, PartialEq)]
pub struct CartSnapshot {
    /// Visible line items.
    pub cart: Cart,
    /// Sum of visible quantities.
    pub total_quantity: u64,
    /// The visible cart is not final yet.
    pub is_loading: bool,
    /// A server request is in flight.
    pub is_fetching: bool,
    /// The newest server request failed; `cart` is the last good value.
    pub is_error: bool,
    /// Which cart is visible.
    pub source: CartSource,
}

/// Outcome of [`CartCoordinator::merge_guest_into_remote`].
#[derive(Debug, Clone, PartialEq)]
pub struct MergeReport {
    /// Strategy applied.
    pub strategy: MergeStrategy,
    /// Guest lines that were reconciled.
    pub guest_lines: usize,
    /// Server cart after the merge.
    pub cart: Cart,
    /// The guest cart was cleared locally. When `false` the server already
    /// holds the merged items and a later merge will not add them again.
    pub guest_cleared: bool,
}

/// The cart currently visible to callers.
pub enum CartProvider<'a, S, A> {
    /// Guest cart from the local store.
    Local(&'a GuestCart<S>),
    /// Most recently completed server cart.
    Remote(&'a RemoteCart<A>),
}

impl<S: LocalCartStore, A> CartProvider<'_, S, A> {
    /// The provider's current cart.
    #[must_use]
    pub fn cart(&self) -> Cart {
        match self {
            Self::Local(guest) => guest.cart().clone(),
            Self::Remote(remote) => remote.cart(),
        }
    }

    /// Which source this provider represents.
    #[must_use]
    pub const fn source(&self) -> CartSource {
        match self {
            Self::Local(_) => CartSource::Local,
            Self::Remote(_) => CartSource::Remote,
        }
    }
}

/// Single read/write surface over the guest and server carts.
pub struct CartCoordinator<S, A> {
    guest: GuestCart<S>,
    remote: RemoteCart<A>,
    auth: AuthState,
    phase: SessionPhase,
    /// User whose server cart the remote state belongs to. Survives the
    /// loading phase so a re-resolve can tell a sign-out or switch apart
    /// from the same user coming back.
    cached_user: Option<UserDescriptor>,
    /// Guest items already folded into the server cart whose local clear
    /// failed.
    merged_guest: Option<Cart>,
    policy: InvariantPolicy,
}

impl<S: LocalCartStore, A: RemoteCartAccessor> CartCoordinator<S, A> {
    /// Create a coordinator for an anonymous visitor.
    #[must_use]
    pub fn new(guest: GuestCart<S>, remote: RemoteCart<A>, policy: InvariantPolicy) -> Self {
        Self {
            guest,
            remote,
            auth: AuthState::guest(),
            phase: SessionPhase::Guest,
            cached_user: None,
            merged_guest: None,
            policy,
        }
    }

    /// Tear down the coordinator and hand back its parts.
    #[must_use]
    pub fn into_parts(self) -> (GuestCart<S>, RemoteCart<A>) {
        (self.guest, self.remote)
    }

    /// The guest cart container.
    #[must_use]
    pub const fn guest(&self) -> &GuestCart<S> {
        &self.guest
    }

    /// The remote query state.
    #[must_use]
    pub const fn remote(&self) -> &RemoteCart<A> {
        &self.remote
    }

    /// The last authentication signal received.
    #[must_use]
    pub const fn auth_state(&self) -> &AuthState {
        &self.auth
    }

    /// The current session phase.
    #[must_use]
    pub const fn phase(&self) -> SessionPhase {
        self.phase
    }

    /// Feed a new authentication signal.
    ///
    /// Signing in leaves the guest cart alone. Resolving to a guest after a
    /// user was signed in, or to a different user, drops the cached server
    /// cart, also when the change passes through a loading phase.
    pub fn set_auth_state(&mut self, auth: AuthState) -> Transition {
        let status = auth.status();
        let previous = self.phase;
        self.auth = auth;

        let transition = match status {
            AuthStatus::Unknown => {
                self.phase = SessionPhase::Authenticating;
                if previous == SessionPhase::Authenticating {
                    Transition::Unchanged
                } else {
                    Transition::Authenticating
                }
            }
            AuthStatus::Guest => {
                self.phase = SessionPhase::Guest;
                if self.cached_user.take().is_some() {
                    self.drop_server_state();
                    info!("User signed out, server cart state dropped");
                    Transition::LoggedOut
                } else if previous == SessionPhase::Guest {
                    Transition::Unchanged
                } else {
                    Transition::Guest
                }
            }
            AuthStatus::Authenticated(user) => {
                self.phase = SessionPhase::Authenticated;
                match self.cached_user.replace(user) {
                    Some(cached) if Some(&cached) == self.cached_user.as_ref() => {
                        Transition::Unchanged
                    }
                    Some(_) => {
                        self.drop_server_state();
                        info!("Signed-in user changed, server cart state dropped");
                        self.logged_in()
                    }
                    None => self.logged_in(),
                }
            }
        };

        debug!(?previous, next = ?self.phase, ?transition, "Authentication state updated");
        transition
    }

    /// Forget everything tied to the previous user's server cart. Bumps the
    /// request generation, so fetches still in flight for that user are
    /// discarded.
    fn drop_server_state(&mut self) {
        self.remote.reset();
        self.merged_guest = None;
    }

    fn logged_in(&self) -> Transition {
        let pending_guest_items = !self.pending_guest_items().is_empty();
        info!(pending_guest_items, "User signed in");
        Transition::LoggedIn {
            pending_guest_items,
        }
    }

    /// Guest items not yet folded into the server cart.
    fn pending_guest_items(&self) -> Cart {
        match &self.merged_guest {
            None => self.guest.cart().clone(),
            Some(merged) => self
                .guest
                .cart()
                .iter()
                .filter_map(|line| {
                    let already = merged.get(line.product_id()).map_or(0, |m| m.quantity.get());
                    Quantity::new(line.quantity.get().saturating_sub(already))
                        .ok()
                        .map(|quantity| LineItem::new(line.product.clone(), quantity))
                })
                .collect(),
        }
    }

    /// The provider whose cart is visible in the current phase.
    #[must_use]
    pub const fn provider(&self) -> CartProvider<'_, S, A> {
        match self.phase {
            SessionPhase::Authenticated => CartProvider::Remote(&self.remote),
            SessionPhase::Guest | SessionPhase::Authenticating => CartProvider::Local(&self.guest),
        }
    }

    /// The visible cart.
    ///
    /// For a signed-in user this is the most recently completed server cart,
    /// or empty while the first fetch is pending.
    #[must_use]
    pub fn visible_cart(&self) -> Cart {
        self.provider().cart()
    }

    /// Sum of visible quantities. Zero for an empty cart.
    #[must_use]
    pub fn total_quantity(&self) -> u64 {
        self.visible_cart().total_quantity()
    }

    /// The unified cart view.
    #[must_use]
    pub fn snapshot(&self) -> CartSnapshot {
        match self.phase {
            SessionPhase::Authenticated => {
                let remote = self.remote.snapshot();
                // Nothing fetched yet for this user counts as loading even
                // before the first request goes out.
                let unfetched = !self.remote.has_data() && !remote.is_error;
                CartSnapshot {
                    total_quantity: remote.cart.total_quantity(),
                    cart: remote.cart,
                    is_loading: remote.is_loading || unfetched,
                    is_fetching: remote.is_fetching,
                    is_error: remote.is_error,
                    source: CartSource::Remote,
                }
            }
            SessionPhase::Guest | SessionPhase::Authenticating => {
                let cart = self.guest.cart().clone();
                let pending = self.phase == SessionPhase::Authenticating;
                CartSnapshot {
                    total_quantity: cart.total_quantity(),
                    cart,
                    is_loading: pending,
                    is_fetching: false,
                    is_error: false,
                    source: if pending {
                        CartSource::Pending
                    } else {
                        CartSource::Local
                    },
                }
            }
        }
    }

    /// Add an item to the guest cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store write fails.
    pub fn add_item(&mut self, item: LineItem) -> Result<()> {
        self.guest.add_item(item)?;
        Ok(())
    }

    /// Empty the guest cart and delete its store entry.
    ///
    /// Available in every phase; callers decide when it is appropriate.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store entry cannot be deleted.
    pub fn clear(&mut self) -> Result<()> {
        self.guest.clear()?;
        self.merged_guest = None;
        Ok(())
    }

    /// Replace the guest cart with `items`.
    ///
    /// Used to mirror a freshly fetched server cart into the guest cart, or to
    /// install a merged cart.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::Invariant`] if `items` repeats a product under
    /// [`InvariantPolicy::Strict`], or a store error if the write fails.
    pub fn replace(&mut self, items: Vec<LineItem>) -> Result<()> {
        let cart = match self.policy {
            InvariantPolicy::Strict => Cart::try_from_items(items)?,
            InvariantPolicy::Coalesce => {
                let coalesced = Cart::coalesce(items);
                if coalesced.merged > 0 {
                    warn!(
                        merged = coalesced.merged,
                        "Replacement cart had duplicate products, merged them"
                    );
                }
                coalesced.cart
            }
        };
        self.guest.replace(cart)?;
        self.merged_guest = None;
        Ok(())
    }

    /// Fetch the server cart again.
    ///
    /// Returns `Ok(None)` without contacting the server unless a user is
    /// signed in.
    ///
    /// # Errors
    ///
    /// Returns the remote error if the fetch fails while still the newest
    /// request. The last good server cart stays visible.
    pub async fn refetch(&self) -> Result<Option<FetchOutcome>> {
        if self.phase != SessionPhase::Authenticated {
            debug!(phase = ?self.phase, "Skipping remote cart fetch");
            return Ok(None);
        }
        Ok(Some(self.remote.refetch().await?))
    }

    /// Copy the latest completed server cart into the guest cart.
    ///
    /// # Errors
    ///
    /// Returns an error if the local store write fails.
    pub fn sync_remote_into_guest(&mut self) -> Result<()> {
        let cart = self.remote.cart();
        self.guest.replace(cart)?;
        self.merged_guest = None;
        Ok(())
    }

    /// Reconcile the guest cart with the signed-in user's server cart.
    ///
    /// Fetches the server cart, applies `strategy`, writes the result back to
    /// the server, and only then clears the guest cart. If any server call
    /// fails the guest cart is left intact.
    ///
    /// Once the server accepted the merge, a failure to clear the guest cart
    /// locally is logged and reported through
    /// [`MergeReport::guest_cleared`] instead of failing the call. The
    /// merged items are remembered, so merging again only sends guest items
    /// added since.
    ///
    /// # Errors
    ///
    /// Returns [`CartError::NotAuthenticated`] outside the authenticated
    /// phase, or the remote error that stopped the merge.
    #[instrument(skip(self), fields(guest_lines = self.guest.cart().len()))]
    pub async fn merge_guest_into_remote(&mut self, strategy: MergeStrategy) -> Result<MergeReport> {
        if self.phase != SessionPhase::Authenticated {
            return Err(CartError::NotAuthenticated);
        }

        self.remote.refetch().await?;
        let server = self.remote.cart();
        let pending = self.pending_guest_items();
        let guest_lines = pending.len();

        let cart = match strategy {
            MergeStrategy::Sum if guest_lines > 0 => {
                let merged = server.merged_with(&pending);
                self.remote.replace(&merged).await?
            }
            MergeStrategy::Sum | MergeStrategy::Discard => server,
        };

        let guest_cleared = self.clear_merged_guest();

        info!(
            %strategy,
            guest_lines,
            guest_cleared,
            server_lines = cart.len(),
            "Guest cart reconciled with server cart"
        );
        Ok(MergeReport {
            strategy,
            guest_lines,
            cart,
            guest_cleared,
        })
    }

    /// Clear the guest cart after its items reached the server. On failure
    /// the items are remembered as merged.
    fn clear_merged_guest(&mut self) -> bool {
        if self.guest.cart().is_empty() {
            self.merged_guest = None;
            return true;
        }
        match self.guest.clear() {
            Ok(_) => {
                self.merged_guest = None;
                true
            }
            Err(e) => {
                warn!(
                    error = %e,
                    "Server cart holds the merged items but the guest cart could not be cleared"
                );
                self.merged_guest = Some(self.guest.cart().clone());
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use cartsync_core::{ProductId, ProductRef, Quantity, Role, UserDescriptor};

    use super::*;
    use crate::remote::RemoteError;
    use crate::store::{MemoryStore, StoreError, keys};

    fn item(id: &str, quantity: u32) -> LineItem {
        LineItem::new(
            ProductRef::new(ProductId::parse(id).unwrap()),
            Quantity::new(quantity).unwrap(),
        )
    }

    fn cart(items: &[(&str, u32)]) -> Cart {
        items.iter().map(|&(id, q)| item(id, q)).collect()
    }

    /// In-memory server cart.
    #[derive(Default)]
    struct FakeServer {
        cart: Mutex<Cart>,
        fail_replace: bool,
        fetches: Mutex<usize>,
    }

    impl FakeServer {
        fn with_cart(cart: Cart) -> Self {
            Self {
                cart: Mutex::new(cart),
                ..Self::default()
            }
        }
    }

    impl RemoteCartAccessor for FakeServer {
        async fn fetch(&self) -> std::result::Result<Cart, RemoteError> {
            *self.fetches.lock().unwrap() += 1;
            Ok(self.cart.lock().unwrap().clone())
        }

        async fn replace(&self, cart: &Cart) -> std::result::Result<Cart, RemoteError> {
            if self.fail_replace {
                return Err(RemoteError::Unavailable("replace refused".to_string()));
            }
            *self.cart.lock().unwrap() = cart.clone();
            Ok(cart.clone())
        }
    }

    fn coordinator(server: FakeServer) -> CartCoordinator<MemoryStore, FakeServer> {
        CartCoordinator::new(
            GuestCart::load(MemoryStore::new()),
            RemoteCart::new(server),
            InvariantPolicy::Strict,
        )
    }

    fn customer() -> AuthState {
        AuthState::authenticated(UserDescriptor::with_role(Role::Customer))
    }

    #[test]
    fn test_guest_snapshot() {
        let mut coord = coordinator(FakeServer::default());
        coord.add_item(item("A", 2)).unwrap();
        coord.add_item(item("A", 3)).unwrap();

        let snapshot = coord.snapshot();
        assert_eq!(snapshot.cart, cart(&[("A", 5)]));
        assert_eq!(snapshot.total_quantity, 5);
        assert_eq!(snapshot.source, CartSource::Local);
        assert!(!snapshot.is_loading);
    }

    #[test]
    fn test_empty_cart_total_is_zero() {
        let coord = coordinator(FakeServer::default());
        assert_eq!(coord.total_quantity(), 0);
        assert!(coord.visible_cart().is_empty());
    }

    #[test]
    fn test_auth_loading_shows_guest_cart_as_pending() {
        let mut coord = coordinator(FakeServer::default());
        coord.add_item(item("A", 1)).unwrap();

        assert_eq!(
            coord.set_auth_state(AuthState::loading()),
            Transition::Authenticating
        );
        let snapshot = coord.snapshot();
        assert_eq!(snapshot.source, CartSource::Pending);
        assert!(snapshot.is_loading);
        assert_eq!(snapshot.cart, cart(&[("A", 1)]));

        assert_eq!(coord.set_auth_state(AuthState::guest()), Transition::Guest);
        assert_eq!(coord.snapshot().source, CartSource::Local);
    }

    #[tokio::test]
    async fn test_authenticated_reads_remote_and_ignores_guest() {
        let mut coord = coordinator(FakeServer::with_cart(cart(&[("C", 4)])));
        coord.add_item(item("A", 1)).unwrap();

        let transition = coord.set_auth_state(customer());
        assert_eq!(
            transition,
            Transition::LoggedIn {
                pending_guest_items: true
            }
        );

        // Before the first fetch completes the server cart reads as empty.
        assert!(coord.visible_cart().is_empty());
        assert_eq!(coord.snapshot().source, CartSource::Remote);
        assert!(coord.snapshot().is_loading);

        assert_eq!(coord.refetch().await.unwrap(), Some(FetchOutcome::Applied));
        assert!(!coord.snapshot().is_loading);
        assert_eq!(coord.visible_cart(), cart(&[("C", 4)]));
        assert_eq!(coord.total_quantity(), 4);

        // Guest items survive sign-in untouched.
        assert_eq!(coord.guest().cart(), &cart(&[("A", 1)]));
        assert!(coord.guest().store().contains_key(keys::GUEST_CART));
    }

    #[tokio::test]
    async fn test_refetch_skipped_for_guest() {
        let coord = coordinator(FakeServer::default());
        assert_eq!(coord.refetch().await.unwrap(), None);
        assert_eq!(*coord.remote().accessor().fetches.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_logout_drops_server_cart_and_restores_guest_view() {
        let mut coord = coordinator(FakeServer::with_cart(cart(&[("C", 4)])));
        coord.add_item(item("A", 1)).unwrap();
        coord.set_auth_state(customer());
        coord.refetch().await.unwrap();

        assert_eq!(coord.set_auth_state(AuthState::guest()), Transition::LoggedOut);
        assert!(!coord.remote().has_data());
        assert_eq!(coord.visible_cart(), cart(&[("A", 1)]));
    }

    #[tokio::test]
    async fn test_switching_users_drops_cached_cart() {
        let mut coord = coordinator(FakeServer::with_cart(cart(&[("C", 4)])));
        coord.set_auth_state(customer());
        coord.refetch().await.unwrap();

        let admin = AuthState::authenticated(UserDescriptor::with_role(Role::Admin));
        assert_eq!(
            coord.set_auth_state(admin.clone()),
            Transition::LoggedIn {
                pending_guest_items: false
            }
        );
        assert!(coord.visible_cart().is_empty());
        assert_eq!(coord.set_auth_state(admin), Transition::Unchanged);
    }

    #[tokio::test]
    async fn test_merge_sum_writes_server_then_clears_guest() {
        let mut coord = coordinator(FakeServer::with_cart(cart(&[("C", 4), ("A", 1)])));
        coord.add_item(item("A", 2)).unwrap();
        coord.add_item(item("B", 1)).unwrap();
        coord.set_auth_state(customer());

        let report = coord.merge_guest_into_remote(MergeStrategy::Sum).await.unwrap();
        assert_eq!(report.guest_lines, 2);
        assert_eq!(report.cart, cart(&[("C", 4), ("A", 3), ("B", 1)]));

        assert_eq!(
            *coord.remote().accessor().cart.lock().unwrap(),
            cart(&[("C", 4), ("A", 3), ("B", 1)])
        );
        assert_eq!(coord.visible_cart(), report.cart);
        assert!(coord.guest().cart().is_empty());
        assert!(!coord.guest().store().contains_key(keys::GUEST_CART));
    }

    #[tokio::test]
    async fn test_merge_discard_keeps_server_cart() {
        let mut coord = coordinator(FakeServer::with_cart(cart(&[("C", 4)])));
        coord.add_item(item("A", 2)).unwrap();
        coord.set_auth_state(customer());

        let report = coord
            .merge_guest_into_remote(MergeStrategy::Discard)
            .await
            .unwrap();
        assert_eq!(report.cart, cart(&[("C", 4)]));
        assert!(coord.guest().cart().is_empty());
    }

    #[tokio::test]
    async fn test_failed_merge_keeps_guest_cart() {
        let server = FakeServer {
            fail_replace: true,
            ..FakeServer::with_cart(cart(&[("C", 4)]))
        };
        let mut coord = coordinator(server);
        coord.add_item(item("A", 2)).unwrap();
        coord.set_auth_state(customer());

        let err = coord.merge_guest_into_remote(MergeStrategy::Sum).await.unwrap_err();
        assert!(matches!(err, CartError::Remote(RemoteError::Unavailable(_))));
        assert_eq!(coord.guest().cart(), &cart(&[("A", 2)]));
        assert_eq!(coord.visible_cart(), cart(&[("C", 4)]));
    }

    #[tokio::test]
    async fn test_merge_requires_authentication() {
        let mut coord = coordinator(FakeServer::default());
        let err = coord.merge_guest_into_remote(MergeStrategy::Sum).await.unwrap_err();
        assert!(matches!(err, CartError::NotAuthenticated));
    }

    #[test]
    fn test_replace_strict_rejects_duplicates() {
        let mut coord = coordinator(FakeServer::default());
        coord.add_item(item("Z", 1)).unwrap();

        let err = coord.replace(vec![item("A", 1), item("A", 2)]).unwrap_err();
        assert!(matches!(err, CartError::Invariant(_)));
        assert_eq!(coord.visible_cart(), cart(&[("Z", 1)]));
    }

    #[test]
    fn test_replace_coalesce_merges_duplicates() {
        let mut coord = CartCoordinator::new(
            GuestCart::load(MemoryStore::new()),
            RemoteCart::new(FakeServer::default()),
            InvariantPolicy::Coalesce,
        );
        coord.replace(vec![item("A", 1), item("A", 2)]).unwrap();
        assert_eq!(coord.visible_cart(), cart(&[("A", 3)]));
    }

    #[test]
    fn test_replace_twice_is_idempotent() {
        let mut coord = coordinator(FakeServer::default());
        let items = vec![item("A", 1), item("B", 2)];

        coord.replace(items.clone()).unwrap();
        let once = coord.snapshot();
        coord.replace(items).unwrap();
        assert_eq!(coord.snapshot(), once);
    }

    #[tokio::test]
    async fn test_sync_remote_into_guest() {
        let mut coord = coordinator(FakeServer::with_cart(cart(&[("C", 4)])));
        coord.set_auth_state(customer());
        coord.refetch().await.unwrap();

        coord.sync_remote_into_guest().unwrap();
        assert_eq!(coord.guest().cart(), &cart(&[("C", 4)]));
    }

    #[test]
    fn test_clear_in_any_phase() {
        let mut coord = coordinator(FakeServer::default());
        coord.add_item(item("A", 1)).unwrap();
        coord.set_auth_state(customer());
        coord.clear().unwrap();
        assert!(coord.guest().cart().is_empty());
    }

    #[test]
    fn test_parse_strategy_and_policy() {
        assert_eq!("sum".parse::<MergeStrategy>().unwrap(), MergeStrategy::Sum);
        assert_eq!(
            "discard".parse::<MergeStrategy>().unwrap(),
            MergeStrategy::Discard
        );
        assert!("prompt".parse::<MergeStrategy>().is_err());
        assert_eq!(
            "strict".parse::<InvariantPolicy>().unwrap(),
            InvariantPolicy::Strict
        );
    }

    #[tokio::test]
    async fn test_sign_out_through_loading_drops_server_cart() {
        let mut coord = coordinator(FakeServer::with_cart(cart(&[("C", 4)])));
        coord.add_item(item("A", 1)).unwrap();
        coord.set_auth_state(customer());
        coord.refetch().await.unwrap();

        assert_eq!(
            coord.set_auth_state(AuthState::loading()),
            Transition::Authenticating
        );
        assert_eq!(coord.set_auth_state(AuthState::guest()), Transition::LoggedOut);
        assert!(!coord.remote().has_data());
        assert_eq!(coord.visible_cart(), cart(&[("A", 1)]));

        assert_eq!(coord.set_auth_state(AuthState::guest()), Transition::Unchanged);
    }

    #[tokio::test]
    async fn test_user_switch_through_loading_drops_server_cart() {
        let mut coord = coordinator(FakeServer::with_cart(cart(&[("C", 4)])));
        coord.set_auth_state(customer());
        coord.refetch().await.unwrap();

        coord.set_auth_state(AuthState::loading());
        let admin = AuthState::authenticated(UserDescriptor::with_role(Role::Admin));
        assert_eq!(
            coord.set_auth_state(admin),
            Transition::LoggedIn {
                pending_guest_items: false
            }
        );
        assert!(!coord.remote().has_data());
        assert!(coord.visible_cart().is_empty());
        assert!(coord.snapshot().is_loading);
    }

    #[tokio::test]
    async fn test_same_user_through_loading_keeps_server_cart() {
        let mut coord = coordinator(FakeServer::with_cart(cart(&[("C", 4)])));
        coord.set_auth_state(customer());
        coord.refetch().await.unwrap();

        coord.set_auth_state(AuthState::loading());
        assert_eq!(coord.set_auth_state(customer()), Transition::Unchanged);
        assert_eq!(coord.visible_cart(), cart(&[("C", 4)]));
    }

    /// A store that accepts writes but cannot delete.
    #[derive(Default)]
    struct NoRemoveStore(MemoryStore);

    impl LocalCartStore for NoRemoveStore {
        fn get(&self, key: &str) -> std::result::Result<Option<String>, StoreError> {
            self.0.get(key)
        }

        fn set(&mut self, key: &str, value: &str) -> std::result::Result<(), StoreError> {
            self.0.set(key, value)
        }

        fn remove(&mut self, key: &str) -> std::result::Result<(), StoreError> {
            Err(StoreError::Io {
                key: key.to_owned(),
                source: std::io::Error::other("remove refused"),
            })
        }
    }

    #[tokio::test]
    async fn test_failed_guest_clear_after_merge_does_not_duplicate() {
        let mut coord = CartCoordinator::new(
            GuestCart::load(NoRemoveStore::default()),
            RemoteCart::new(FakeServer::with_cart(cart(&[("C", 1)]))),
            InvariantPolicy::Strict,
        );
        coord.add_item(item("A", 2)).unwrap();
        coord.set_auth_state(customer());

        let first = coord.merge_guest_into_remote(MergeStrategy::Sum).await.unwrap();
        assert!(!first.guest_cleared);
        assert_eq!(first.cart, cart(&[("C", 1), ("A", 2)]));

        let second = coord.merge_guest_into_remote(MergeStrategy::Sum).await.unwrap();
        assert!(!second.guest_cleared);
        assert_eq!(second.guest_lines, 0);
        assert_eq!(
            *coord.remote().accessor().cart.lock().unwrap(),
            cart(&[("C", 1), ("A", 2)])
        );

        // Items added after the merge are still merged once.
        coord.add_item(item("A", 1)).unwrap();
        let third = coord.merge_guest_into_remote(MergeStrategy::Sum).await.unwrap();
        assert_eq!(third.guest_lines, 1);
        assert_eq!(third.cart, cart(&[("C", 1), ("A", 3)]));
    }

    #[tokio::test]
    async fn test_merge_reports_guest_cleared() {
        let mut coord = coordinator(FakeServer::default());
        coord.add_item(item("A", 1)).unwrap();
        coord.set_auth_state(customer());

        let report = coord.merge_guest_into_remote(MergeStrategy::Sum).await.unwrap();
        assert!(report.guest_cleared);
    }

    #[test]
    fn test_cart_source_display_and_serialize() {
        assert_eq!(CartSource::Pending.to_string(), "pending");
        assert_eq!(CartSource::Remote.to_string(), "remote");
        assert_eq!(
            serde_json::to_string(&CartSource::Local).unwrap(),
            "\"local\""
        );
    }
}
