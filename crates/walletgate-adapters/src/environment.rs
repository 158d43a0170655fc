use std::collections::BTreeMap;
use std::sync::Arc;

use walletgate_core::{
    CardanoProviderPort, EvmProviderPort, InjectedEnvironment,
};

use crate::cip30::Cip30Adapter;
use crate::eip1193::Eip1193Adapter;

/// In-memory injected-global surface for tests and native binaries.
#[derive(Default)]
pub struct ScriptedEnvironment {
    evm: Option<Arc<Eip1193Adapter>>,
    cardano: BTreeMap<String, Arc<Cip30Adapter>>,
}

impl ScriptedEnvironment {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_evm(mut self, adapter: Eip1193Adapter) -> Self {
        self.evm = Some(Arc::new(adapter));
        self
    }

    /// Injects a Cardano wallet under the adapter's namespace key.
    pub fn with_wallet(mut self, adapter: Cip30Adapter) -> Self {
        self.cardano
            .insert(adapter.key().to_owned(), Arc::new(adapter));
        self
    }

    pub fn evm(&self) -> Option<Arc<Eip1193Adapter>> {
        self.evm.clone()
    }

    pub fn wallet(&self, key: &str) -> Option<Arc<Cip30Adapter>> {
        self.cardano.get(key).cloned()
    }
}

impl InjectedEnvironment for ScriptedEnvironment {
    fn evm_provider(&self) -> Option<Arc<dyn EvmProviderPort>> {
        self.evm.clone().map(|p| p as Arc<dyn EvmProviderPort>)
    }

    fn cardano_keys(&self) -> Vec<String> {
        self.cardano.keys().cloned().collect()
    }

    fn cardano_provider(&self, key: &str) -> Option<Arc<dyn CardanoProviderPort>> {
        self.cardano
            .get(key)
            .cloned()
            .map(|p| p as Arc<dyn CardanoProviderPort>)
    }
}

/// Reads the real `window.ethereum` / `window.cardano` globals.
#[cfg(target_arch = "wasm32")]
#[derive(Default)]
pub struct BrowserEnvironment;

#[cfg(target_arch = "wasm32")]
impl BrowserEnvironment {
    pub fn new() -> Self {
        Self
    }
}

#[cfg(target_arch = "wasm32")]
impl InjectedEnvironment for BrowserEnvironment {
    fn evm_provider(&self) -> Option<Arc<dyn EvmProviderPort>> {
        Eip1193Adapter::browser().map(|p| Arc::new(p) as Arc<dyn EvmProviderPort>)
    }

    fn cardano_keys(&self) -> Vec<String> {
        use wasm_bindgen::JsCast;

        let namespace = match crate::cip30::cardano_namespace() {
            Ok(namespace) => namespace,
            Err(_) => return Vec::new(),
        };
        let object = match namespace.dyn_into::<js_sys::Object>() {
            Ok(object) => object,
            Err(_) => return Vec::new(),
        };
        js_sys::Object::keys(&object)
            .iter()
            .filter_map(|k| k.as_string())
            .collect()
    }

    fn cardano_provider(&self, key: &str) -> Option<Arc<dyn CardanoProviderPort>> {
        Cip30Adapter::browser(key).map(|p| Arc::new(p) as Arc<dyn CardanoProviderPort>)
    }
}
