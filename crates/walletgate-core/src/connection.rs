use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::sync::watch;
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::address;
use crate::codec;
use crate::config::SessionConfig;
use crate::domain::{ChainFamily, ConnectedSession, ProviderHandle, SessionSnapshot};
use crate::error::WalletError;
use crate::identity::{self, WalletIdentity};
use crate::ports::{CardanoApiPort, EvmProviderPort, InjectedEnvironment, StoragePort};
use crate::registry;
use crate::resolver;
use crate::store::SessionStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectPhase {
    Idle,
    Connecting,
    Connected,
    Failed,
}

type ConnectOutcome = Result<ConnectedSession, WalletError>;

struct ManagerState {
    phase: ConnectPhase,
    session: Option<ConnectedSession>,
    inflight: HashMap<String, watch::Receiver<Option<ConnectOutcome>>>,
}

/// Orchestrates the handshake with a selected provider and owns the
/// resulting session state. Authorization prompts are guarded by a
/// wall-clock timeout and deduplicated per wallet id.
pub struct ConnectionManager {
    env: Arc<dyn InjectedEnvironment>,
    store: SessionStore,
    config: SessionConfig,
    state: Mutex<ManagerState>,
    session_active: watch::Sender<bool>,
    pending_authorization: watch::Sender<Option<String>>,
}

impl ConnectionManager {
    pub fn new(
        env: Arc<dyn InjectedEnvironment>,
        storage: Arc<dyn StoragePort>,
        config: SessionConfig,
    ) -> Self {
        let (session_active, _) = watch::channel(false);
        let (pending_authorization, _) = watch::channel(None);
        Self {
            env,
            store: SessionStore::new(storage),
            config,
            state: Mutex::new(ManagerState {
                phase: ConnectPhase::Idle,
                session: None,
                inflight: HashMap::new(),
            }),
            session_active,
            pending_authorization,
        }
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub(crate) fn environment(&self) -> &Arc<dyn InjectedEnvironment> {
        &self.env
    }

    /// Last wallet id persisted by a successful connect.
    pub fn last_wallet(&self) -> Option<String> {
        self.store.last_wallet()
    }

    pub fn phase(&self) -> ConnectPhase {
        self.state
            .lock()
            .map(|g| g.phase)
            .unwrap_or(ConnectPhase::Failed)
    }

    /// Best-effort, non-blocking probe of the current session.
    pub fn active_session(&self) -> Option<ConnectedSession> {
        self.state.lock().ok().and_then(|g| g.session.clone())
    }

    /// Serializable view of the session, with a defensive format
    /// re-check before the address is exposed.
    pub fn snapshot(&self) -> Result<Option<SessionSnapshot>, WalletError> {
        let session = match self.active_session() {
            Some(session) => session,
            None => return Ok(None),
        };
        if !address::is_canonical(session.chain_family, &session.address) {
            return Err(WalletError::InvalidAddressFormat);
        }
        Ok(Some(session.snapshot()))
    }

    pub fn session_watch(&self) -> watch::Receiver<bool> {
        self.session_active.subscribe()
    }

    pub(crate) fn pending_watch(&self) -> watch::Receiver<Option<String>> {
        self.pending_authorization.subscribe()
    }

    /// Full handshake. A second concurrent call for the same wallet id
    /// awaits the in-flight outcome instead of issuing another
    /// authorization request.
    pub async fn connect(&self, wallet_id: &str) -> Result<ConnectedSession, WalletError> {
        loop {
            // The state lock must be released before any await point so
            // the future stays Send.
            let slot = {
                let mut guard = self.lock()?;
                match guard.inflight.get(wallet_id) {
                    Some(rx) => InflightSlot::Joined(rx.clone()),
                    None => {
                        let (tx, rx) = watch::channel(None);
                        guard.inflight.insert(wallet_id.to_owned(), rx);
                        guard.phase = ConnectPhase::Connecting;
                        InflightSlot::Owner(tx)
                    }
                }
            };
            let outcome_tx = match slot {
                InflightSlot::Joined(rx) => {
                    debug!(wallet_id, "joining in-flight connect attempt");
                    match await_outcome(rx).await {
                        Some(outcome) => return outcome,
                        // The owning future was dropped before it could
                        // report; evict the dead entry and run the
                        // handshake ourselves.
                        None => {
                            self.evict_dead_inflight(wallet_id)?;
                            continue;
                        }
                    }
                }
                InflightSlot::Owner(tx) => tx,
            };

            let mut cleanup = InflightCleanup {
                manager: self,
                wallet_id,
                armed: true,
            };
            let outcome = self.establish(wallet_id).await;
            cleanup.armed = false;
            self.finish_attempt(wallet_id, &outcome)?;
            let _ = outcome_tx.send(Some(outcome.clone()));
            return outcome;
        }
    }

    /// Clears local session state and the persisted wallet hint. Most
    /// providers offer no programmatic revocation, so this is a
    /// local-state operation, not a security boundary.
    pub fn disconnect(&self) -> Result<(), WalletError> {
        {
            let mut guard = self.lock()?;
            guard.session = None;
            guard.phase = ConnectPhase::Idle;
        }
        if let Err(err) = self.store.clear() {
            warn!(error = %err, "failed to clear persisted wallet id");
        }
        self.session_active.send_replace(false);
        self.pending_authorization.send_replace(None);
        info!("session disconnected");
        Ok(())
    }

    /// Session invalidation driven by provider events; keeps the
    /// persisted hint so the reconnection flow can still use it.
    pub(crate) fn clear_session(&self) {
        if let Ok(mut guard) = self.state.lock() {
            guard.session = None;
            guard.phase = ConnectPhase::Idle;
        }
        self.session_active.send_replace(false);
    }

    pub(crate) fn clear_pending(&self, wallet_id: &str) {
        self.pending_authorization.send_if_modified(|pending| {
            if pending.as_deref() == Some(wallet_id) {
                *pending = None;
                true
            } else {
                false
            }
        });
    }

    /// Re-derives address, balance, and network from the live handle.
    /// Used after account and chain change events; a chain change is
    /// handled as a fresh derivation of the whole session.
    pub async fn refresh_session(&self) -> Result<Option<SessionSnapshot>, WalletError> {
        let session = match self.active_session() {
            Some(session) => session,
            None => return Ok(None),
        };
        let rebuilt = match &session.handle {
            ProviderHandle::Evm(provider) => {
                let accounts = provider.accounts().await.map_err(WalletError::classify)?;
                if accounts.is_empty() {
                    self.clear_session();
                    return Ok(None);
                }
                self.evm_session(&session.wallet_id, Arc::clone(provider), accounts)
                    .await?
            }
            ProviderHandle::Cardano(api) => {
                self.cardano_session(&session.wallet_id, Arc::clone(api))
                    .await?
            }
        };
        let snapshot = rebuilt.snapshot();
        self.install_session(rebuilt)?;
        Ok(Some(snapshot))
    }

    /// True when the provider reports an authorization that can be
    /// promoted without a prompt.
    pub(crate) async fn authorization_granted(&self, wallet_id: &str) -> bool {
        let identity = match identity::find(wallet_id) {
            Some(identity) => identity,
            None => return false,
        };
        match identity.chain_family {
            ChainFamily::Evm => match self.env.evm_provider() {
                Some(provider) => match provider.selected_address() {
                    Ok(Some(addr)) if !addr.is_empty() => true,
                    _ => provider
                        .accounts()
                        .await
                        .map(|accounts| !accounts.is_empty())
                        .unwrap_or(false),
                },
                None => false,
            },
            ChainFamily::Cardano => self.cardano_enabled(identity).await,
        }
    }

    pub(crate) async fn cardano_enabled(&self, identity: &WalletIdentity) -> bool {
        let entries = registry::cardano_entries(self.env.as_ref());
        let key = match identity::match_cardano_key(identity, &entries) {
            Some(key) => key.to_owned(),
            None => return false,
        };
        match self.env.cardano_provider(&key) {
            Some(provider) => provider.is_enabled().await.unwrap_or(false),
            None => false,
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, ManagerState>, WalletError> {
        self.state
            .lock()
            .map_err(|e| WalletError::Provider(format!("manager state lock poisoned: {e}")))
    }

    fn finish_attempt(&self, wallet_id: &str, outcome: &ConnectOutcome) -> Result<(), WalletError> {
        {
            let mut guard = self.lock()?;
            guard.inflight.remove(wallet_id);
            match outcome {
                Ok(session) => {
                    guard.phase = ConnectPhase::Connected;
                    guard.session = Some(session.clone());
                }
                Err(_) => {
                    guard.phase = ConnectPhase::Failed;
                }
            }
        }
        match outcome {
            Ok(session) => {
                if let Err(err) = self.store.remember(wallet_id) {
                    warn!(error = %err, "failed to persist wallet id");
                }
                // send_replace stores the value even while no receiver
                // is subscribed yet; the synchronizer loops read the
                // watch state lazily.
                self.pending_authorization.send_replace(None);
                self.session_active.send_replace(true);
                info!(wallet_id, address = %session.address, "wallet connected");
            }
            Err(WalletError::AuthorizationPending) => {
                debug!(wallet_id, "authorization pending, eligible for promotion poll");
                self.pending_authorization
                    .send_replace(Some(wallet_id.to_owned()));
            }
            Err(err) => {
                debug!(wallet_id, error = %err, "connect attempt failed");
            }
        }
        Ok(())
    }

    fn install_session(&self, session: ConnectedSession) -> Result<(), WalletError> {
        let mut guard = self.lock()?;
        guard.session = Some(session);
        guard.phase = ConnectPhase::Connected;
        drop(guard);
        self.session_active.send_replace(true);
        Ok(())
    }

    /// Removes an in-flight entry whose sender is gone, so a retry can
    /// start a fresh attempt instead of joining a dead one.
    fn evict_dead_inflight(&self, wallet_id: &str) -> Result<(), WalletError> {
        let mut guard = self.lock()?;
        let dead = guard
            .inflight
            .get(wallet_id)
            .map(|rx| rx.has_changed().is_err())
            .unwrap_or(false);
        if dead {
            guard.inflight.remove(wallet_id);
        }
        Ok(())
    }

    async fn establish(&self, wallet_id: &str) -> ConnectOutcome {
        let identity =
            identity::find(wallet_id).ok_or_else(|| WalletError::WalletNotFound(wallet_id.to_owned()))?;
        match identity.chain_family {
            ChainFamily::Evm => self.connect_evm(identity).await,
            ChainFamily::Cardano => self.connect_cardano(identity).await,
        }
    }

    async fn connect_evm(&self, identity: &WalletIdentity) -> ConnectOutcome {
        let provider = self
            .env
            .evm_provider()
            .ok_or(WalletError::NoProviderDetected(ChainFamily::Evm))?;
        if let Some(flag) = identity.evm_flag {
            if !provider.has_flag(flag) {
                return Err(WalletError::WalletNotFound(identity.id.to_owned()));
            }
        }

        // Already-authorized fast path: a readable selectedAddress means
        // access was granted before, so no prompt is needed.
        let accounts = match provider.selected_address().map_err(WalletError::classify)? {
            Some(addr) if !addr.is_empty() => {
                debug!(wallet_id = identity.id, "fast path via selectedAddress");
                vec![addr]
            }
            _ => {
                let budget = self.config.authorize_timeout();
                match timeout(budget, provider.request_accounts()).await {
                    Ok(result) => result.map_err(WalletError::classify)?,
                    Err(_) => {
                        // The prompt cannot be cancelled; the user may
                        // have approved just as the budget elapsed.
                        match provider.selected_address().map_err(WalletError::classify)? {
                            Some(addr) if !addr.is_empty() => vec![addr],
                            _ => return Err(WalletError::Timeout(self.config.authorize_timeout_ms)),
                        }
                    }
                }
            }
        };

        self.evm_session(identity.id, provider, accounts).await
    }

    async fn evm_session(
        &self,
        wallet_id: &str,
        provider: Arc<dyn EvmProviderPort>,
        accounts: Vec<String>,
    ) -> ConnectOutcome {
        let candidate = resolver::resolve_evm(&accounts)?;
        let chain_hex = provider.chain_id().await.map_err(WalletError::classify)?;
        let chain_id = codec::chain_id_from_hex(&chain_hex)
            .ok_or_else(|| WalletError::Provider(format!("invalid chain id: {chain_hex}")))?;
        // Balance is informational; a failed read never blocks the
        // connection.
        let wei = match provider.get_balance(&candidate.canonical).await {
            Ok(raw) => codec::wei_from_hex(&raw).unwrap_or_default(),
            Err(err) => {
                warn!(error = %err, "balance read failed, reporting zero");
                Default::default()
            }
        };
        self.finalize(ConnectedSession {
            wallet_id: wallet_id.to_owned(),
            chain_family: ChainFamily::Evm,
            address: candidate.canonical,
            balance: codec::format_wei(wei),
            network_label: evm_network_label(chain_id),
            chain_id: Some(chain_id),
            handle: ProviderHandle::Evm(provider),
        })
    }

    async fn connect_cardano(&self, identity: &WalletIdentity) -> ConnectOutcome {
        let entries = registry::cardano_entries(self.env.as_ref());
        if entries.is_empty() {
            return Err(WalletError::NoProviderDetected(ChainFamily::Cardano));
        }
        let key = identity::match_cardano_key(identity, &entries)
            .ok_or_else(|| WalletError::WalletNotFound(identity.id.to_owned()))?
            .to_owned();
        let provider = self
            .env
            .cardano_provider(&key)
            .ok_or_else(|| WalletError::WalletNotFound(identity.id.to_owned()))?;

        // isEnabled means a prior grant exists; enable() then resolves
        // without a user-facing prompt.
        let already_enabled = provider.is_enabled().await.unwrap_or(false);
        let api = if already_enabled {
            debug!(wallet_id = identity.id, "fast path via isEnabled");
            provider.enable().await.map_err(WalletError::classify)?
        } else {
            let budget = self.config.authorize_timeout();
            match timeout(budget, provider.enable()).await {
                Ok(result) => result.map_err(WalletError::classify)?,
                Err(_) => {
                    if provider.is_enabled().await.unwrap_or(false) {
                        provider.enable().await.map_err(WalletError::classify)?
                    } else {
                        return Err(WalletError::Timeout(self.config.authorize_timeout_ms));
                    }
                }
            }
        };

        self.cardano_session(identity.id, api).await
    }

    async fn cardano_session(
        &self,
        wallet_id: &str,
        api: Arc<dyn CardanoApiPort>,
    ) -> ConnectOutcome {
        let candidate = resolver::resolve_cardano(api.as_ref()).await?;
        let network_id = api.network_id().await.map_err(WalletError::classify)?;
        let lovelace = match api.balance().await {
            Ok(raw) => codec::lovelace_from_cbor_hex(&raw),
            Err(err) => {
                warn!(error = %err, "balance read failed, reporting zero");
                0
            }
        };
        self.finalize(ConnectedSession {
            wallet_id: wallet_id.to_owned(),
            chain_family: ChainFamily::Cardano,
            address: candidate.canonical,
            balance: codec::format_lovelace(lovelace),
            network_label: cardano_network_label(network_id),
            chain_id: None,
            handle: ProviderHandle::Cardano(api),
        })
    }

    /// An unvalidated address must never reach a session object.
    fn finalize(&self, session: ConnectedSession) -> ConnectOutcome {
        if !address::is_canonical(session.chain_family, &session.address) {
            return Err(WalletError::InvalidAddressFormat);
        }
        Ok(session)
    }
}

enum InflightSlot {
    Owner(watch::Sender<Option<ConnectOutcome>>),
    Joined(watch::Receiver<Option<ConnectOutcome>>),
}

/// Unregisters an attempt whose owning future is dropped mid-handshake,
/// e.g. when a synchronizer task is aborted inside `connect`. Disarmed
/// once `finish_attempt` takes over.
struct InflightCleanup<'a> {
    manager: &'a ConnectionManager,
    wallet_id: &'a str,
    armed: bool,
}

impl Drop for InflightCleanup<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Ok(mut guard) = self.manager.state.lock() {
            guard.inflight.remove(self.wallet_id);
            if guard.session.is_none() {
                guard.phase = ConnectPhase::Idle;
            }
        }
    }
}

/// Resolves to the published outcome, or `None` when the owning attempt
/// was dropped without reporting one.
async fn await_outcome(
    mut rx: watch::Receiver<Option<ConnectOutcome>>,
) -> Option<ConnectOutcome> {
    loop {
        {
            let value = rx.borrow();
            if let Some(outcome) = value.as_ref() {
                return Some(outcome.clone());
            }
        }
        if rx.changed().await.is_err() {
            return None;
        }
    }
}

fn evm_network_label(chain_id: u64) -> String {
    match chain_id {
        1 => "Ethereum Mainnet".to_owned(),
        10 => "OP Mainnet".to_owned(),
        56 => "BNB Smart Chain".to_owned(),
        137 => "Polygon".to_owned(),
        8453 => "Base".to_owned(),
        42161 => "Arbitrum One".to_owned(),
        11155111 => "Sepolia".to_owned(),
        other => format!("Chain {other}"),
    }
}

fn cardano_network_label(network_id: u8) -> String {
    match network_id {
        1 => "Cardano Mainnet".to_owned(),
        0 => "Cardano Testnet".to_owned(),
        other => format!("Cardano Network {other}"),
    }
}
