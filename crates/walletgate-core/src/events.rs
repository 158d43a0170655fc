//! Provider-event synchronization.
//!
//! EVM providers push account, chain, and disconnect events; those are
//! consumed and republished as normalized session changes. Cardano
//! providers push nothing useful, so an idle probe loop stands in while
//! no session is active, plus a bounded promotion poll for connect
//! attempts stuck in the authorization-pending state. Every loop is tied
//! to an explicit shutdown channel so teardown is deterministic.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::connection::ConnectionManager;
use crate::domain::{ChainFamily, SessionSnapshot};
use crate::identity;
use crate::ports::EvmProviderEvent;

#[derive(Clone)]
pub struct SyncCallbacks {
    pub on_session_update: Arc<dyn Fn(SessionSnapshot) + Send + Sync>,
    pub on_chain_changed: Arc<dyn Fn(SessionSnapshot) + Send + Sync>,
    pub on_disconnect: Arc<dyn Fn() + Send + Sync>,
}

/// Owner of the spawned synchronization tasks. Dropping the handle tears
/// everything down; no provider call happens after `stop`.
pub struct SyncHandle {
    shutdown: watch::Sender<bool>,
    tasks: Vec<JoinHandle<()>>,
}

impl SyncHandle {
    pub fn stop(&mut self) {
        let _ = self.shutdown.send(true);
        for task in self.tasks.drain(..) {
            task.abort();
        }
    }
}

impl Drop for SyncHandle {
    fn drop(&mut self) {
        self.stop();
    }
}

pub struct EventSynchronizer;

impl EventSynchronizer {
    pub fn spawn(manager: Arc<ConnectionManager>, callbacks: SyncCallbacks) -> SyncHandle {
        let (shutdown, _) = watch::channel(false);
        let mut tasks = Vec::new();

        if let Some(provider) = manager.environment().evm_provider() {
            match provider.subscribe() {
                Ok(events) => {
                    tasks.push(tokio::spawn(evm_event_loop(
                        Arc::clone(&manager),
                        callbacks.clone(),
                        events,
                        shutdown.subscribe(),
                    )));
                }
                Err(err) => warn!(error = %err, "evm event subscription unavailable"),
            }
        }

        tasks.push(tokio::spawn(cardano_probe_loop(
            Arc::clone(&manager),
            callbacks.clone(),
            shutdown.subscribe(),
        )));

        tasks.push(tokio::spawn(promotion_loop(
            manager,
            callbacks,
            shutdown.subscribe(),
        )));

        SyncHandle { shutdown, tasks }
    }
}

async fn evm_event_loop(
    manager: Arc<ConnectionManager>,
    callbacks: SyncCallbacks,
    mut events: mpsc::UnboundedReceiver<EvmProviderEvent>,
    mut shutdown: watch::Receiver<bool>,
) {
    loop {
        let event = tokio::select! {
            _ = shutdown.changed() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        match event {
            EvmProviderEvent::AccountsChanged(accounts) => {
                debug!(count = accounts.len(), "accountsChanged");
                if accounts.is_empty() {
                    manager.clear_session();
                    (callbacks.on_disconnect)();
                    continue;
                }
                match manager.refresh_session().await {
                    Ok(Some(snapshot)) => (callbacks.on_session_update)(snapshot),
                    Ok(None) => {}
                    Err(err) => warn!(error = %err, "session refresh after account change failed"),
                }
            }
            // Switching chains invalidates balance and address-class
            // assumptions; re-derive the whole session.
            EvmProviderEvent::ChainChanged(chain) => {
                debug!(%chain, "chainChanged");
                match manager.refresh_session().await {
                    Ok(Some(snapshot)) => (callbacks.on_chain_changed)(snapshot),
                    Ok(None) => {}
                    Err(err) => {
                        warn!(error = %err, "session re-derivation after chain change failed");
                        manager.clear_session();
                        (callbacks.on_disconnect)();
                    }
                }
            }
            EvmProviderEvent::Disconnect => {
                debug!("provider disconnect");
                manager.clear_session();
                (callbacks.on_disconnect)();
            }
        }
    }
}

/// Probes the last-used Cardano wallet's authorization state while no
/// session is active; parks on the session watch otherwise so an active
/// session causes zero provider calls.
async fn cardano_probe_loop(
    manager: Arc<ConnectionManager>,
    callbacks: SyncCallbacks,
    mut shutdown: watch::Receiver<bool>,
) {
    let interval = manager.config().probe_interval();
    let mut session_rx = manager.session_watch();
    loop {
        if *session_rx.borrow() {
            tokio::select! {
                _ = shutdown.changed() => break,
                changed = session_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }
        }
        tokio::select! {
            _ = shutdown.changed() => break,
            _ = tokio::time::sleep(interval) => {}
        }
        if *session_rx.borrow() {
            continue;
        }
        let Some(wallet_id) = manager.last_wallet() else {
            continue;
        };
        let Some(identity) = identity::find(&wallet_id) else {
            continue;
        };
        if identity.chain_family != ChainFamily::Cardano {
            continue;
        }
        if manager.cardano_enabled(identity).await {
            debug!(%wallet_id, "idle probe found existing authorization");
            if let Ok(session) = manager.connect(&wallet_id).await {
                (callbacks.on_session_update)(session.snapshot());
            }
        }
    }
}

/// Bounded poll for out-of-band approval after a connect attempt ended
/// in the authorization-pending state. Promotes silently via the
/// fast path; never re-prompts.
async fn promotion_loop(
    manager: Arc<ConnectionManager>,
    callbacks: SyncCallbacks,
    mut shutdown: watch::Receiver<bool>,
) {
    let interval = manager.config().probe_interval();
    let attempts = manager.config().promotion_attempts;
    let mut pending_rx = manager.pending_watch();
    loop {
        let pending = pending_rx.borrow().clone();
        let Some(wallet_id) = pending else {
            tokio::select! {
                _ = shutdown.changed() => break,
                changed = pending_rx.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    continue;
                }
            }
        };
        debug!(%wallet_id, "promotion poll started");
        for _ in 0..attempts {
            tokio::select! {
                _ = shutdown.changed() => return,
                _ = tokio::time::sleep(interval) => {}
            }
            if pending_rx.borrow().as_deref() != Some(wallet_id.as_str()) {
                break;
            }
            if manager.authorization_granted(&wallet_id).await {
                match manager.connect(&wallet_id).await {
                    Ok(session) => {
                        debug!(%wallet_id, "pending attempt promoted to connected");
                        (callbacks.on_session_update)(session.snapshot());
                    }
                    Err(err) => warn!(error = %err, "promotion connect failed"),
                }
                break;
            }
        }
        manager.clear_pending(&wallet_id);
    }
}
