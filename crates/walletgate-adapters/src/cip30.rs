use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use walletgate_core::{CardanoApiPort, CardanoProviderPort, PortError};

/// CIP-30 initial-object adapter for one key of the cardano namespace.
///
/// Scripted mode is fully in-memory. Browser mode (wasm only) reflects
/// over `window.cardano[key]`; `enable()` returns a promise holding JS
/// values, so the live prompt goes through the inherent `browser_enable`
/// and the trait surface serves the cached authorization flag.
pub struct Cip30Adapter {
    key: String,
    name: Option<String>,
    enabled: AtomicBool,
    refuse: bool,
    api: Arc<Cip30ApiAdapter>,
    #[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
    browser: bool,
}

impl Cip30Adapter {
    pub fn scripted(key: &str, api: Cip30ApiAdapter) -> Self {
        Self {
            key: key.to_owned(),
            name: None,
            enabled: AtomicBool::new(false),
            refuse: false,
            api: Arc::new(api),
            browser: false,
        }
    }

    #[cfg(target_arch = "wasm32")]
    pub fn browser(key: &str) -> Option<Self> {
        wallet_object(key).ok()?;
        let name = wallet_object(key)
            .ok()
            .and_then(|obj| crate::eip1193::get_prop(&obj, "name").ok())
            .and_then(|v| v.as_string());
        Some(Self {
            key: key.to_owned(),
            name,
            enabled: AtomicBool::new(false),
            refuse: false,
            api: Arc::new(Cip30ApiAdapter::browser(key)),
            browser: true,
        })
    }

    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_owned());
        self
    }

    /// Marks a prior grant, so `enable()` resolves without a prompt.
    pub fn with_enabled(self, enabled: bool) -> Self {
        self.enabled.store(enabled, Ordering::SeqCst);
        self
    }

    /// Scripts the user declining the authorization prompt.
    pub fn refusing(mut self) -> Self {
        self.refuse = true;
        self
    }

    pub fn key(&self) -> &str {
        &self.key
    }

    /// Live `isEnabled()` through the injected wallet; refreshes the
    /// cached flag the trait serves.
    #[cfg(target_arch = "wasm32")]
    pub async fn browser_is_enabled(&self) -> Result<bool, PortError> {
        let wallet = wallet_object(&self.key)?;
        let result = call_js_method(&wallet, "isEnabled", &self.key).await?;
        let enabled = result.is_truthy();
        self.enabled.store(enabled, Ordering::SeqCst);
        Ok(enabled)
    }

    /// Live `enable()` prompt. On success the returned capability object
    /// is parked in a thread-local registry and its data pulled into the
    /// snapshot the api adapter serves.
    #[cfg(target_arch = "wasm32")]
    pub async fn browser_enable(&self) -> Result<Arc<Cip30ApiAdapter>, PortError> {
        let wallet = wallet_object(&self.key)?;
        let api_object = call_js_method(&wallet, "enable", &self.key).await?;
        API_OBJECTS.with(|objects| {
            objects
                .borrow_mut()
                .insert(self.key.clone(), api_object);
        });
        self.enabled.store(true, Ordering::SeqCst);
        self.api.browser_refresh().await?;
        Ok(Arc::clone(&self.api))
    }
}

#[async_trait]
impl CardanoProviderPort for Cip30Adapter {
    fn display_name(&self) -> Option<String> {
        self.name.clone()
    }

    async fn is_enabled(&self) -> Result<bool, PortError> {
        Ok(self.enabled.load(Ordering::SeqCst))
    }

    async fn enable(&self) -> Result<Arc<dyn CardanoApiPort>, PortError> {
        #[cfg(target_arch = "wasm32")]
        if self.browser {
            return Err(PortError::NotImplemented(
                "browser prompt requires browser_enable",
            ));
        }

        if self.refuse {
            return Err(PortError::Rpc {
                code: -3,
                message: "user declined to sign the data".to_owned(),
            });
        }
        self.enabled.store(true, Ordering::SeqCst);
        Ok(Arc::clone(&self.api) as Arc<dyn CardanoApiPort>)
    }
}

/// Capability object backing a connected Cardano session. Serves a
/// snapshot in both modes; browser mode refills it from the live api
/// object via `browser_refresh`.
pub struct Cip30ApiAdapter {
    #[cfg_attr(not(target_arch = "wasm32"), allow(dead_code))]
    key: Option<String>,
    state: Mutex<ApiState>,
}

#[derive(Debug, Default, Clone)]
struct ApiState {
    network_id: u8,
    balance_hex: String,
    change: Option<String>,
    used: Vec<String>,
    unused: Vec<String>,
    reward: Vec<String>,
}

impl Default for Cip30ApiAdapter {
    fn default() -> Self {
        Self {
            key: None,
            state: Mutex::new(ApiState {
                network_id: 1,
                ..ApiState::default()
            }),
        }
    }
}

impl Cip30ApiAdapter {
    #[cfg(target_arch = "wasm32")]
    fn browser(key: &str) -> Self {
        Self {
            key: Some(key.to_owned()),
            state: Mutex::new(ApiState::default()),
        }
    }

    pub fn with_network(self, network_id: u8) -> Self {
        self.lock_state().network_id = network_id;
        self
    }

    /// CBOR hex as `cardano.getBalance()` returns it.
    pub fn with_balance(self, balance_hex: &str) -> Self {
        self.lock_state().balance_hex = balance_hex.to_owned();
        self
    }

    pub fn with_change(self, change: Option<&str>) -> Self {
        self.lock_state().change = change.map(str::to_owned);
        self
    }

    pub fn with_used(self, used: &[&str]) -> Self {
        self.lock_state().used = used.iter().map(|a| (*a).to_owned()).collect();
        self
    }

    pub fn with_unused(self, unused: &[&str]) -> Self {
        self.lock_state().unused = unused.iter().map(|a| (*a).to_owned()).collect();
        self
    }

    pub fn with_reward(self, reward: &[&str]) -> Self {
        self.lock_state().reward = reward.iter().map(|a| (*a).to_owned()).collect();
        self
    }

    fn lock_state(&self) -> std::sync::MutexGuard<'_, ApiState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Pulls every read method of the live capability object into the
    /// snapshot. Individual method failures leave the previous value.
    #[cfg(target_arch = "wasm32")]
    pub async fn browser_refresh(&self) -> Result<(), PortError> {
        let key = self
            .key
            .as_deref()
            .ok_or(PortError::NotImplemented("scripted api has no live object"))?;
        let api = API_OBJECTS.with(|objects| {
            objects
                .borrow()
                .get(key)
                .cloned()
                .ok_or_else(|| PortError::NotFound(format!("no enabled api object for {key}")))
        })?;

        let mut next = ApiState::default();
        if let Ok(value) = call_js_method(&api, "getNetworkId", key).await {
            next.network_id = value.as_f64().unwrap_or(0.0) as u8;
        }
        if let Ok(value) = call_js_method(&api, "getBalance", key).await {
            next.balance_hex = value.as_string().unwrap_or_default();
        }
        if let Ok(value) = call_js_method(&api, "getChangeAddress", key).await {
            next.change = value.as_string().filter(|s| !s.is_empty());
        }
        for (name, slot) in [
            ("getUsedAddresses", &mut next.used),
            ("getUnusedAddresses", &mut next.unused),
            ("getRewardAddresses", &mut next.reward),
        ] {
            if let Ok(value) = call_js_method(&api, name, key).await {
                if js_sys::Array::is_array(&value) {
                    *slot = js_sys::Array::from(&value)
                        .iter()
                        .filter_map(|v| v.as_string())
                        .collect();
                }
            }
        }
        *self.lock_state() = next;
        Ok(())
    }
}

#[async_trait]
impl CardanoApiPort for Cip30ApiAdapter {
    async fn network_id(&self) -> Result<u8, PortError> {
        Ok(self.lock_state().network_id)
    }

    async fn balance(&self) -> Result<String, PortError> {
        Ok(self.lock_state().balance_hex.clone())
    }

    async fn change_address(&self) -> Result<Option<String>, PortError> {
        Ok(self.lock_state().change.clone())
    }

    async fn used_addresses(&self) -> Result<Vec<String>, PortError> {
        Ok(self.lock_state().used.clone())
    }

    async fn unused_addresses(&self) -> Result<Vec<String>, PortError> {
        Ok(self.lock_state().unused.clone())
    }

    async fn reward_addresses(&self) -> Result<Vec<String>, PortError> {
        Ok(self.lock_state().reward.clone())
    }
}

#[cfg(target_arch = "wasm32")]
thread_local! {
    /// Enabled capability objects, keyed by wallet key. JS values cannot
    /// live inside the Send adapters.
    static API_OBJECTS: std::cell::RefCell<
        std::collections::HashMap<String, wasm_bindgen::JsValue>,
    > = std::cell::RefCell::new(std::collections::HashMap::new());
}

#[cfg(target_arch = "wasm32")]
pub(crate) fn cardano_namespace() -> Result<wasm_bindgen::JsValue, PortError> {
    let window =
        web_sys::window().ok_or_else(|| PortError::Transport("missing window".to_owned()))?;
    let namespace = crate::eip1193::get_prop(&window.into(), "cardano")?;
    if namespace.is_null() || namespace.is_undefined() {
        return Err(PortError::NotFound("window.cardano missing".to_owned()));
    }
    Ok(namespace)
}

#[cfg(target_arch = "wasm32")]
fn wallet_object(key: &str) -> Result<wasm_bindgen::JsValue, PortError> {
    let namespace = cardano_namespace()?;
    let wallet = crate::eip1193::get_prop(&namespace, key)?;
    if wallet.is_null() || wallet.is_undefined() {
        return Err(PortError::NotFound(format!("window.cardano.{key} missing")));
    }
    Ok(wallet)
}

#[cfg(target_arch = "wasm32")]
async fn call_js_method(
    target: &wasm_bindgen::JsValue,
    name: &str,
    key: &str,
) -> Result<wasm_bindgen::JsValue, PortError> {
    use wasm_bindgen::JsCast;

    let method = crate::eip1193::get_prop(target, name)
        .ok()
        .and_then(|v| v.dyn_into::<js_sys::Function>().ok())
        .ok_or_else(|| PortError::NotFound(format!("window.cardano.{key}.{name} missing")))?;
    let result = method
        .call0(target)
        .map_err(|e| crate::eip1193::js_rpc_error(name, e))?;
    match result.dyn_into::<js_sys::Promise>() {
        Ok(promise) => wasm_bindgen_futures::JsFuture::from(promise)
            .await
            .map_err(|e| crate::eip1193::js_rpc_error(name, e)),
        // Some vendors return plain values from isEnabled().
        Err(value) => Ok(value),
    }
}
