#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, Once};

use async_trait::async_trait;
use tokio::sync::{mpsc, Notify};

use walletgate_core::{
    address, CardanoApiPort, CardanoProviderPort, ConnectionManager, EvmProviderEvent,
    EvmProviderPort, InjectedEnvironment, PortError, SessionConfig, StoragePort,
};

#[derive(Default)]
pub struct CallLog {
    entries: Mutex<Vec<String>>,
}

impl CallLog {
    pub fn record(&self, name: &str) {
        self.entries
            .lock()
            .expect("call log lock")
            .push(name.to_owned());
    }

    pub fn entries(&self) -> Vec<String> {
        self.entries.lock().expect("call log lock").clone()
    }

    pub fn count(&self) -> usize {
        self.entries.lock().expect("call log lock").len()
    }

    pub fn count_of(&self, name: &str) -> usize {
        self.entries
            .lock()
            .expect("call log lock")
            .iter()
            .filter(|e| *e == name)
            .count()
    }
}

#[derive(Debug, Clone)]
pub enum AuthScript {
    Grant(Vec<String>),
    Reject { code: i64, message: String },
    Pending,
    Hang,
}

pub struct FakeEvmProvider {
    pub log: Arc<CallLog>,
    flags: Mutex<Vec<String>>,
    selected: Mutex<VecDeque<Option<String>>>,
    auth: Mutex<AuthScript>,
    accounts: Mutex<Vec<String>>,
    chain: Mutex<String>,
    balance: Mutex<String>,
    gate: Mutex<Option<Arc<Notify>>>,
    senders: Mutex<Vec<mpsc::UnboundedSender<EvmProviderEvent>>>,
}

impl Default for FakeEvmProvider {
    fn default() -> Self {
        Self {
            log: Arc::new(CallLog::default()),
            flags: Mutex::new(vec!["isMetaMask".to_owned()]),
            selected: Mutex::new(VecDeque::from([None])),
            auth: Mutex::new(AuthScript::Grant(vec![evm_addr(0x11)])),
            accounts: Mutex::new(Vec::new()),
            chain: Mutex::new("0x1".to_owned()),
            balance: Mutex::new("0xde0b6b3a7640000".to_owned()),
            gate: Mutex::new(None),
            senders: Mutex::new(Vec::new()),
        }
    }
}

impl FakeEvmProvider {
    pub fn with_flags(self, flags: &[&str]) -> Self {
        *self.flags.lock().expect("flags lock") = flags.iter().map(|f| (*f).to_owned()).collect();
        self
    }

    pub fn with_selected(self, selected: Option<&str>) -> Self {
        *self.selected.lock().expect("selected lock") =
            VecDeque::from([selected.map(str::to_owned)]);
        self
    }

    /// Scripts a sequence of `selectedAddress` reads; the last value
    /// repeats.
    pub fn with_selected_sequence(self, sequence: &[Option<&str>]) -> Self {
        *self.selected.lock().expect("selected lock") = sequence
            .iter()
            .map(|s| s.map(str::to_owned))
            .collect::<VecDeque<_>>();
        self
    }

    pub fn with_auth(self, auth: AuthScript) -> Self {
        *self.auth.lock().expect("auth lock") = auth;
        self
    }

    pub fn with_accounts(self, accounts: &[&str]) -> Self {
        *self.accounts.lock().expect("accounts lock") =
            accounts.iter().map(|a| (*a).to_owned()).collect();
        self
    }

    pub fn with_chain(self, chain: &str) -> Self {
        *self.chain.lock().expect("chain lock") = chain.to_owned();
        self
    }

    pub fn with_balance(self, balance: &str) -> Self {
        *self.balance.lock().expect("balance lock") = balance.to_owned();
        self
    }

    pub fn with_gate(self, gate: Arc<Notify>) -> Self {
        *self.gate.lock().expect("gate lock") = Some(gate);
        self
    }

    pub fn set_selected(&self, selected: Option<&str>) {
        *self.selected.lock().expect("selected lock") =
            VecDeque::from([selected.map(str::to_owned)]);
    }

    pub fn set_accounts(&self, accounts: &[&str]) {
        *self.accounts.lock().expect("accounts lock") =
            accounts.iter().map(|a| (*a).to_owned()).collect();
    }

    pub fn set_chain(&self, chain: &str) {
        *self.chain.lock().expect("chain lock") = chain.to_owned();
    }

    pub fn set_balance(&self, balance: &str) {
        *self.balance.lock().expect("balance lock") = balance.to_owned();
    }

    pub fn inject_accounts_changed(&self, accounts: &[&str]) {
        self.set_accounts(accounts);
        self.emit(EvmProviderEvent::AccountsChanged(
            accounts.iter().map(|a| (*a).to_owned()).collect(),
        ));
    }

    pub fn inject_chain_changed(&self, chain: &str) {
        self.set_chain(chain);
        self.emit(EvmProviderEvent::ChainChanged(chain.to_owned()));
    }

    pub fn inject_disconnect(&self) {
        self.emit(EvmProviderEvent::Disconnect);
    }

    fn emit(&self, event: EvmProviderEvent) {
        let senders = self.senders.lock().expect("senders lock");
        for sender in senders.iter() {
            let _ = sender.send(event.clone());
        }
    }
}

#[async_trait]
impl EvmProviderPort for FakeEvmProvider {
    fn selected_address(&self) -> Result<Option<String>, PortError> {
        self.log.record("selected_address");
        let mut queue = self.selected.lock().expect("selected lock");
        if queue.len() > 1 {
            Ok(queue.pop_front().flatten())
        } else {
            Ok(queue.front().cloned().flatten())
        }
    }

    fn has_flag(&self, flag: &str) -> bool {
        self.flags
            .lock()
            .expect("flags lock")
            .iter()
            .any(|f| f == flag)
    }

    async fn request_accounts(&self) -> Result<Vec<String>, PortError> {
        self.log.record("request_accounts");
        let gate = self.gate.lock().expect("gate lock").clone();
        if let Some(gate) = gate {
            gate.notified().await;
        }
        let script = self.auth.lock().expect("auth lock").clone();
        match script {
            AuthScript::Grant(accounts) => {
                *self.accounts.lock().expect("accounts lock") = accounts.clone();
                Ok(accounts)
            }
            AuthScript::Reject { code, message } => Err(PortError::Rpc { code, message }),
            AuthScript::Pending => Err(PortError::Rpc {
                code: -32002,
                message: "request already pending".to_owned(),
            }),
            AuthScript::Hang => {
                std::future::pending::<()>().await;
                unreachable!("pending future resolved")
            }
        }
    }

    async fn accounts(&self) -> Result<Vec<String>, PortError> {
        self.log.record("accounts");
        Ok(self.accounts.lock().expect("accounts lock").clone())
    }

    async fn chain_id(&self) -> Result<String, PortError> {
        self.log.record("chain_id");
        Ok(self.chain.lock().expect("chain lock").clone())
    }

    async fn get_balance(&self, _address: &str) -> Result<String, PortError> {
        self.log.record("get_balance");
        Ok(self.balance.lock().expect("balance lock").clone())
    }

    fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<EvmProviderEvent>, PortError> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.senders.lock().expect("senders lock").push(tx);
        Ok(rx)
    }
}

pub struct FakeCardanoApi {
    pub log: Arc<CallLog>,
    change: Mutex<Option<String>>,
    used: Mutex<Vec<String>>,
    unused: Mutex<Vec<String>>,
    reward: Mutex<Vec<String>>,
    balance_hex: Mutex<String>,
    network: u8,
}

impl Default for FakeCardanoApi {
    fn default() -> Self {
        Self {
            log: Arc::new(CallLog::default()),
            change: Mutex::new(None),
            used: Mutex::new(Vec::new()),
            unused: Mutex::new(Vec::new()),
            reward: Mutex::new(Vec::new()),
            balance_hex: Mutex::new("1a00989680".to_owned()),
            network: 1,
        }
    }
}

impl FakeCardanoApi {
    pub fn with_change(self, change: Option<&str>) -> Self {
        *self.change.lock().expect("change lock") = change.map(str::to_owned);
        self
    }

    pub fn with_used(self, used: &[&str]) -> Self {
        *self.used.lock().expect("used lock") = used.iter().map(|a| (*a).to_owned()).collect();
        self
    }

    pub fn with_unused(self, unused: &[&str]) -> Self {
        *self.unused.lock().expect("unused lock") =
            unused.iter().map(|a| (*a).to_owned()).collect();
        self
    }

    pub fn with_reward(self, reward: &[&str]) -> Self {
        *self.reward.lock().expect("reward lock") =
            reward.iter().map(|a| (*a).to_owned()).collect();
        self
    }

    pub fn with_balance(self, balance_hex: &str) -> Self {
        *self.balance_hex.lock().expect("balance lock") = balance_hex.to_owned();
        self
    }
}

#[async_trait]
impl CardanoApiPort for FakeCardanoApi {
    async fn network_id(&self) -> Result<u8, PortError> {
        self.log.record("network_id");
        Ok(self.network)
    }

    async fn balance(&self) -> Result<String, PortError> {
        self.log.record("balance");
        Ok(self.balance_hex.lock().expect("balance lock").clone())
    }

    async fn change_address(&self) -> Result<Option<String>, PortError> {
        self.log.record("change_address");
        Ok(self.change.lock().expect("change lock").clone())
    }

    async fn used_addresses(&self) -> Result<Vec<String>, PortError> {
        self.log.record("used_addresses");
        Ok(self.used.lock().expect("used lock").clone())
    }

    async fn unused_addresses(&self) -> Result<Vec<String>, PortError> {
        self.log.record("unused_addresses");
        Ok(self.unused.lock().expect("unused lock").clone())
    }

    async fn reward_addresses(&self) -> Result<Vec<String>, PortError> {
        self.log.record("reward_addresses");
        Ok(self.reward.lock().expect("reward lock").clone())
    }
}

#[derive(Debug, Clone, Copy)]
pub enum EnableScript {
    Allow,
    Refuse,
    Hang,
}

pub struct FakeCardanoProvider {
    pub log: Arc<CallLog>,
    pub api: Arc<FakeCardanoApi>,
    name: Option<String>,
    enabled: AtomicBool,
    prompts: AtomicUsize,
    script: Mutex<EnableScript>,
}

impl FakeCardanoProvider {
    pub fn new(name: Option<&str>, api: FakeCardanoApi) -> Self {
        Self {
            log: Arc::new(CallLog::default()),
            api: Arc::new(api),
            name: name.map(str::to_owned),
            enabled: AtomicBool::new(false),
            prompts: AtomicUsize::new(0),
            script: Mutex::new(EnableScript::Allow),
        }
    }

    pub fn with_enabled(self, enabled: bool) -> Self {
        self.enabled.store(enabled, Ordering::SeqCst);
        self
    }

    pub fn with_script(self, script: EnableScript) -> Self {
        *self.script.lock().expect("script lock") = script;
        self
    }

    pub fn set_enabled(&self, enabled: bool) {
        self.enabled.store(enabled, Ordering::SeqCst);
    }

    /// Number of user-facing prompts that were shown.
    pub fn prompts(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl CardanoProviderPort for FakeCardanoProvider {
    fn display_name(&self) -> Option<String> {
        self.name.clone()
    }

    async fn is_enabled(&self) -> Result<bool, PortError> {
        self.log.record("is_enabled");
        Ok(self.enabled.load(Ordering::SeqCst))
    }

    async fn enable(&self) -> Result<Arc<dyn CardanoApiPort>, PortError> {
        self.log.record("enable");
        if self.enabled.load(Ordering::SeqCst) {
            return Ok(Arc::clone(&self.api) as Arc<dyn CardanoApiPort>);
        }
        let script = *self.script.lock().expect("script lock");
        match script {
            EnableScript::Allow => {
                self.prompts.fetch_add(1, Ordering::SeqCst);
                self.enabled.store(true, Ordering::SeqCst);
                Ok(Arc::clone(&self.api) as Arc<dyn CardanoApiPort>)
            }
            EnableScript::Refuse => Err(PortError::Rpc {
                code: -3,
                message: "refused".to_owned(),
            }),
            EnableScript::Hang => {
                self.prompts.fetch_add(1, Ordering::SeqCst);
                std::future::pending::<()>().await;
                unreachable!("pending future resolved")
            }
        }
    }
}

#[derive(Default)]
pub struct FakeEnv {
    evm: Mutex<Option<Arc<FakeEvmProvider>>>,
    cardano: Mutex<BTreeMap<String, Arc<FakeCardanoProvider>>>,
    cardano_reads: AtomicU32,
    /// Number of `cardano_keys` reads before the namespace appears.
    cardano_visible_after: AtomicU32,
}

impl FakeEnv {
    pub fn with_evm(self, provider: Arc<FakeEvmProvider>) -> Self {
        *self.evm.lock().expect("evm lock") = Some(provider);
        self
    }

    pub fn with_cardano(self, key: &str, provider: Arc<FakeCardanoProvider>) -> Self {
        self.cardano
            .lock()
            .expect("cardano lock")
            .insert(key.to_owned(), provider);
        self
    }

    pub fn with_cardano_visible_after(self, reads: u32) -> Self {
        self.cardano_visible_after.store(reads, Ordering::SeqCst);
        self
    }
}

impl InjectedEnvironment for FakeEnv {
    fn evm_provider(&self) -> Option<Arc<dyn EvmProviderPort>> {
        self.evm
            .lock()
            .expect("evm lock")
            .clone()
            .map(|p| p as Arc<dyn EvmProviderPort>)
    }

    fn cardano_keys(&self) -> Vec<String> {
        let read = self.cardano_reads.fetch_add(1, Ordering::SeqCst);
        if read < self.cardano_visible_after.load(Ordering::SeqCst) {
            return Vec::new();
        }
        self.cardano
            .lock()
            .expect("cardano lock")
            .keys()
            .cloned()
            .collect()
    }

    fn cardano_provider(&self, key: &str) -> Option<Arc<dyn CardanoProviderPort>> {
        self.cardano
            .lock()
            .expect("cardano lock")
            .get(key)
            .cloned()
            .map(|p| p as Arc<dyn CardanoProviderPort>)
    }
}

#[derive(Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, String>>,
}

impl StoragePort for MemoryStorage {
    fn get(&self, key: &str) -> Result<Option<String>, PortError> {
        Ok(self.entries.lock().expect("storage lock").get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), PortError> {
        self.entries
            .lock()
            .expect("storage lock")
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), PortError> {
        self.entries.lock().expect("storage lock").remove(key);
        Ok(())
    }
}

pub fn evm_addr(seed: u8) -> String {
    format!("0x{}", hex_of(&[seed; 20]))
}

pub fn hex_of(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// Hex-encoded binary Cardano address: header byte plus a 56-byte body.
pub fn cardano_hex(header: u8, seed: u8) -> String {
    let mut bytes = vec![header];
    bytes.extend_from_slice(&[seed; 56]);
    hex_of(&bytes)
}

/// Canonical mainnet payment address generated through the converter, so
/// every fixture stays checksum-consistent.
pub fn canonical_addr(seed: u8) -> String {
    address::cardano_from_hex(&cardano_hex(0x01, seed)).expect("valid fixture address")
}

pub fn manager_with(
    env: Arc<FakeEnv>,
    storage: Arc<MemoryStorage>,
    config: SessionConfig,
) -> Arc<ConnectionManager> {
    init_tracing();
    Arc::new(ConnectionManager::new(env, storage, config))
}

/// Opt-in log output: `RUST_LOG=walletgate_core=debug cargo test`.
fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}
