use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use tokio::sync::mpsc;
use tracing::debug;

use walletgate_core::{EvmProviderEvent, EvmProviderPort, PortError};

/// EIP-1193 provider adapter.
///
/// Scripted mode backs tests and native binaries with a fully in-memory
/// provider whose responses are set up front. Browser mode (wasm only)
/// reflects over `window.ethereum`; the synchronous trait surface reads
/// provider fields directly, while prompt-driven calls go through the
/// inherent `browser_*` async methods because their futures hold JS
/// values.
pub struct Eip1193Adapter {
    #[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
    mode: ProviderMode,
    state: Arc<Mutex<ScriptedState>>,
    senders: Mutex<Vec<mpsc::UnboundedSender<EvmProviderEvent>>>,
}

#[derive(Debug, Clone, Copy)]
enum ProviderMode {
    Scripted,
    #[cfg(target_arch = "wasm32")]
    Browser,
}

#[derive(Debug, Default)]
struct ScriptedState {
    flags: Vec<String>,
    selected: Option<String>,
    granted: Vec<String>,
    authorized: bool,
    failure: Option<(i64, String)>,
    chain_id: String,
    balances: HashMap<String, String>,
}

impl Eip1193Adapter {
    pub fn scripted() -> Self {
        Self {
            mode: ProviderMode::Scripted,
            state: Arc::new(Mutex::new(ScriptedState {
                chain_id: "0x1".to_owned(),
                ..ScriptedState::default()
            })),
            senders: Mutex::new(Vec::new()),
        }
    }

    /// Browser-backed adapter, or `None` when `window.ethereum` is not
    /// injected.
    #[cfg(target_arch = "wasm32")]
    pub fn browser() -> Option<Self> {
        browser_provider().ok()?;
        Some(Self {
            mode: ProviderMode::Browser,
            state: Arc::new(Mutex::new(ScriptedState::default())),
            senders: Mutex::new(Vec::new()),
        })
    }

    pub fn with_flag(self, flag: &str) -> Self {
        self.lock_state().flags.push(flag.to_owned());
        self
    }

    pub fn with_selected(self, selected: Option<&str>) -> Self {
        self.lock_state().selected = selected.map(str::to_owned);
        self
    }

    /// Accounts granted when the user approves `eth_requestAccounts`.
    pub fn with_granted(self, accounts: &[&str]) -> Self {
        self.lock_state().granted = accounts.iter().map(|a| (*a).to_owned()).collect();
        self
    }

    /// Scripts an RPC failure for the next authorization request.
    pub fn with_failure(self, code: i64, message: &str) -> Self {
        self.lock_state().failure = Some((code, message.to_owned()));
        self
    }

    pub fn with_chain(self, chain_id: &str) -> Self {
        self.lock_state().chain_id = chain_id.to_owned();
        self
    }

    pub fn with_balance(self, address: &str, balance_hex: &str) -> Self {
        self.lock_state()
            .balances
            .insert(address.to_lowercase(), balance_hex.to_owned());
        self
    }

    pub fn debug_inject_accounts_changed(&self, accounts: &[&str]) {
        let accounts: Vec<String> = accounts.iter().map(|a| (*a).to_owned()).collect();
        {
            let mut g = self.lock_state();
            g.granted = accounts.clone();
            g.selected = accounts.first().cloned();
        }
        self.emit(EvmProviderEvent::AccountsChanged(accounts));
    }

    pub fn debug_inject_chain_changed(&self, chain_id: &str) {
        self.lock_state().chain_id = chain_id.to_owned();
        self.emit(EvmProviderEvent::ChainChanged(chain_id.to_owned()));
    }

    pub fn debug_inject_disconnect(&self) {
        self.emit(EvmProviderEvent::Disconnect);
    }

    fn emit(&self, event: EvmProviderEvent) {
        let mut senders = self.senders.lock().unwrap_or_else(|e| e.into_inner());
        senders.retain(|tx| tx.send(event.clone()).is_ok());
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ScriptedState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Live `eth_requestAccounts` through the injected provider. Updates
    /// the snapshot the trait methods serve.
    #[cfg(target_arch = "wasm32")]
    pub async fn browser_request_accounts(&self) -> Result<Vec<String>, PortError> {
        let accounts = string_array(self.browser_request("eth_requestAccounts", &[]).await?)?;
        let mut g = self.lock_state();
        g.granted = accounts.clone();
        g.selected = accounts.first().cloned();
        g.authorized = !accounts.is_empty();
        Ok(accounts)
    }

    #[cfg(target_arch = "wasm32")]
    pub async fn browser_accounts(&self) -> Result<Vec<String>, PortError> {
        let accounts = string_array(self.browser_request("eth_accounts", &[]).await?)?;
        let mut g = self.lock_state();
        g.granted = accounts.clone();
        g.authorized = !accounts.is_empty();
        Ok(accounts)
    }

    #[cfg(target_arch = "wasm32")]
    pub async fn browser_get_balance(&self, address: &str) -> Result<String, PortError> {
        let result = self
            .browser_request(
                "eth_getBalance",
                &[
                    serde_json::Value::String(address.to_owned()),
                    serde_json::Value::String("latest".to_owned()),
                ],
            )
            .await?;
        let raw = result
            .as_string()
            .ok_or_else(|| PortError::Transport("eth_getBalance must return hex".to_owned()))?;
        self.lock_state()
            .balances
            .insert(address.to_lowercase(), raw.clone());
        Ok(raw)
    }

    #[cfg(target_arch = "wasm32")]
    async fn browser_request(
        &self,
        method: &str,
        params: &[serde_json::Value],
    ) -> Result<wasm_bindgen::JsValue, PortError> {
        use wasm_bindgen::JsCast;

        let provider = browser_provider()?;
        let request_fn = get_prop(&provider, "request")
            .ok()
            .and_then(|v| v.dyn_into::<js_sys::Function>().ok())
            .ok_or(PortError::NotImplemented(
                "window.ethereum.request is unavailable",
            ))?;

        let request = serde_json::json!({ "method": method, "params": params });
        let request_js = serde_wasm_bindgen::to_value(&request)
            .map_err(|e| PortError::Transport(format!("failed to encode request: {e}")))?;
        let promise_js = request_fn
            .call1(&provider, &request_js)
            .map_err(|e| js_rpc_error(method, e))?;
        let promise = promise_js.dyn_into::<js_sys::Promise>().map_err(|_| {
            PortError::Transport("provider request did not return Promise".to_owned())
        })?;
        wasm_bindgen_futures::JsFuture::from(promise)
            .await
            .map_err(|e| js_rpc_error(method, e))
    }

    /// Hooks the provider's `on("accountsChanged"|"chainChanged"|
    /// "disconnect")` registration into the given sender. The closures
    /// hold JS values, so they live in a thread-local registry instead of
    /// the adapter.
    #[cfg(target_arch = "wasm32")]
    fn register_browser_hooks(
        &self,
        tx: mpsc::UnboundedSender<EvmProviderEvent>,
    ) -> Result<(), PortError> {
        use wasm_bindgen::{closure::Closure, JsCast, JsValue};

        let provider = browser_provider()?;
        let on_fn = get_prop(&provider, "on")
            .ok()
            .and_then(|v| v.dyn_into::<js_sys::Function>().ok())
            .ok_or(PortError::NotImplemented("provider does not expose on()"))?;

        let accounts_tx = tx.clone();
        let accounts_cb = Closure::<dyn FnMut(JsValue)>::new(move |value: JsValue| {
            let mut accounts = Vec::new();
            if js_sys::Array::is_array(&value) {
                for item in js_sys::Array::from(&value).iter() {
                    if let Some(raw) = item.as_string() {
                        accounts.push(raw);
                    }
                }
            }
            let _ = accounts_tx.send(EvmProviderEvent::AccountsChanged(accounts));
        });

        let chain_tx = tx.clone();
        let chain_cb = Closure::<dyn FnMut(JsValue)>::new(move |value: JsValue| {
            if let Some(chain) = value.as_string() {
                let _ = chain_tx.send(EvmProviderEvent::ChainChanged(chain));
            }
        });

        let disconnect_cb = Closure::<dyn FnMut(JsValue)>::new(move |_: JsValue| {
            let _ = tx.send(EvmProviderEvent::Disconnect);
        });

        for (name, cb) in [
            ("accountsChanged", &accounts_cb),
            ("chainChanged", &chain_cb),
            ("disconnect", &disconnect_cb),
        ] {
            on_fn
                .call2(&provider, &JsValue::from_str(name), cb.as_ref().unchecked_ref())
                .map_err(|e| PortError::Transport(format!("register {name} failed: {e:?}")))?;
        }

        BROWSER_HOOKS.with(|hooks| {
            hooks
                .borrow_mut()
                .extend([accounts_cb, chain_cb, disconnect_cb]);
        });
        Ok(())
    }
}

#[async_trait]
impl EvmProviderPort for Eip1193Adapter {
    fn selected_address(&self) -> Result<Option<String>, PortError> {
        #[cfg(target_arch = "wasm32")]
        if matches!(self.mode, ProviderMode::Browser) {
            let provider = browser_provider()?;
            let selected = get_prop(&provider, "selectedAddress")?;
            return Ok(selected.as_string().filter(|s| !s.is_empty()));
        }

        Ok(self.lock_state().selected.clone())
    }

    fn has_flag(&self, flag: &str) -> bool {
        #[cfg(target_arch = "wasm32")]
        if matches!(self.mode, ProviderMode::Browser) {
            return browser_provider()
                .and_then(|provider| get_prop(&provider, flag))
                .map(|v| v.is_truthy())
                .unwrap_or(false);
        }

        self.lock_state().flags.iter().any(|f| f == flag)
    }

    async fn request_accounts(&self) -> Result<Vec<String>, PortError> {
        #[cfg(target_arch = "wasm32")]
        if matches!(self.mode, ProviderMode::Browser) {
            // The prompt future holds JS values; only the pre-approved
            // snapshot is reachable from here.
            let g = self.lock_state();
            if !g.granted.is_empty() {
                return Ok(g.granted.clone());
            }
            return Err(PortError::NotImplemented(
                "browser prompt requires browser_request_accounts",
            ));
        }

        let mut g = self.lock_state();
        if let Some((code, message)) = g.failure.clone() {
            debug!(code, "scripted authorization failure");
            return Err(PortError::Rpc { code, message });
        }
        g.authorized = true;
        g.selected = g.granted.first().cloned();
        Ok(g.granted.clone())
    }

    async fn accounts(&self) -> Result<Vec<String>, PortError> {
        let g = self.lock_state();
        #[cfg(target_arch = "wasm32")]
        if matches!(self.mode, ProviderMode::Browser) {
            return Ok(g.granted.clone());
        }

        if g.authorized {
            Ok(g.granted.clone())
        } else {
            Ok(Vec::new())
        }
    }

    async fn chain_id(&self) -> Result<String, PortError> {
        #[cfg(target_arch = "wasm32")]
        if matches!(self.mode, ProviderMode::Browser) {
            let provider = browser_provider()?;
            let chain = get_prop(&provider, "chainId")?;
            return chain
                .as_string()
                .ok_or_else(|| PortError::Transport("provider chainId unreadable".to_owned()));
        }

        Ok(self.lock_state().chain_id.clone())
    }

    async fn get_balance(&self, address: &str) -> Result<String, PortError> {
        // In browser mode this serves the cache maintained by
        // browser_get_balance; a zero answer is fine downstream.
        Ok(self
            .lock_state()
            .balances
            .get(&address.to_lowercase())
            .cloned()
            .unwrap_or_else(|| "0x0".to_owned()))
    }

    fn subscribe(&self) -> Result<mpsc::UnboundedReceiver<EvmProviderEvent>, PortError> {
        let (tx, rx) = mpsc::unbounded_channel();

        #[cfg(target_arch = "wasm32")]
        if matches!(self.mode, ProviderMode::Browser) {
            self.register_browser_hooks(tx)?;
            return Ok(rx);
        }

        self.senders
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(tx);
        Ok(rx)
    }
}

#[cfg(target_arch = "wasm32")]
thread_local! {
    static BROWSER_HOOKS: std::cell::RefCell<
        Vec<wasm_bindgen::closure::Closure<dyn FnMut(wasm_bindgen::JsValue)>>,
    > = std::cell::RefCell::new(Vec::new());
}

#[cfg(target_arch = "wasm32")]
fn browser_provider() -> Result<wasm_bindgen::JsValue, PortError> {
    let window =
        web_sys::window().ok_or_else(|| PortError::Transport("missing window".to_owned()))?;
    let provider = get_prop(&window.into(), "ethereum")?;
    if provider.is_null() || provider.is_undefined() {
        return Err(PortError::NotFound("window.ethereum missing".to_owned()));
    }
    Ok(provider)
}

#[cfg(target_arch = "wasm32")]
pub(crate) fn get_prop(
    target: &wasm_bindgen::JsValue,
    key: &str,
) -> Result<wasm_bindgen::JsValue, PortError> {
    js_sys::Reflect::get(target, &wasm_bindgen::JsValue::from_str(key))
        .map_err(|e| PortError::Transport(format!("read provider property {key} failed: {e:?}")))
}

/// Maps a rejected provider promise into a port error, preserving the
/// vendor `{code, message}` shape when present.
#[cfg(target_arch = "wasm32")]
pub(crate) fn js_rpc_error(method: &str, value: wasm_bindgen::JsValue) -> PortError {
    let code = get_prop(&value, "code")
        .ok()
        .and_then(|v| v.as_f64())
        .map(|n| n as i64);
    let message = get_prop(&value, "message")
        .ok()
        .and_then(|v| v.as_string())
        .unwrap_or_else(|| format!("{method} rejected"));
    match code {
        Some(code) => PortError::Rpc { code, message },
        None => PortError::Transport(format!("{method} failed: {message}")),
    }
}

#[cfg(target_arch = "wasm32")]
fn string_array(value: wasm_bindgen::JsValue) -> Result<Vec<String>, PortError> {
    if !js_sys::Array::is_array(&value) {
        return Err(PortError::Transport("expected array response".to_owned()));
    }
    Ok(js_sys::Array::from(&value)
        .iter()
        .filter_map(|v| v.as_string())
        .collect())
}
