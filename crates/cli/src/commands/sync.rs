//! Commands that move items between the guest cart and the server cart.
//!
//! Both need `CARTSYNC_REMOTE_URL` and `CARTSYNC_REMOTE_TOKEN`.

use cartsync_cart::MergeStrategy;

use super::{CommandError, Coordinator, emit, render, require_remote};

/// Overwrite the guest cart with the current server cart.
pub async fn pull(cart: &mut Coordinator, json: bool) -> Result<(), CommandError> {
    require_remote(cart)?;

    cart.refetch().await?;
    cart.sync_remote_into_guest()?;
    tracing::info!(
        "Pulled {} lines from server into guest cart",
        cart.guest().cart().len()
    );

    emit(&render(&cart.snapshot(), json)?)
}

/// Fold the guest cart into the server cart using `strategy`.
///
/// The guest cart is cleared only after the server accepted the result.
pub async fn merge(cart: &mut Coordinator, strategy: &str, json: bool) -> Result<(), CommandError> {
    require_remote(cart)?;
    let strategy: MergeStrategy = strategy.parse().map_err(CommandError::InvalidInput)?;

    let report = cart.merge_guest_into_remote(strategy).await?;
    if !report.guest_cleared {
        tracing::warn!("Server cart was updated but the local guest cart could not be cleared");
    }
    if report.guest_lines == 0 {
        tracing::info!("Guest cart was empty, nothing to merge");
    } else {
        tracing::info!(
            "Merged {} guest lines into server cart ({})",
            report.guest_lines,
            report.strategy
        );
    }

    emit(&render(&cart.snapshot(), json)?)
}

#[cfg(test)]
mod tests {
    use cartsync_cart::CartConfig;

    use super::*;
    use crate::commands::open;

    fn guest_only() -> (tempfile::TempDir, Coordinator) {
        let dir = tempfile::tempdir().unwrap();
        let cart = open(&CartConfig {
            store_dir: dir.path().to_path_buf(),
            ..CartConfig::default()
        })
        .unwrap();
        (dir, cart)
    }

    #[tokio::test]
    async fn test_pull_requires_remote() {
        let (_dir, mut cart) = guest_only();
        let err = pull(&mut cart, false).await.unwrap_err();
        assert!(matches!(err, CommandError::RemoteNotConfigured));
    }

    #[tokio::test]
    async fn test_merge_requires_remote() {
        let (_dir, mut cart) = guest_only();
        let err = merge(&mut cart, "sum", false).await.unwrap_err();
        assert!(matches!(err, CommandError::RemoteNotConfigured));
    }
}
