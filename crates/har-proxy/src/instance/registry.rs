//! ProxyRegistry - lifecycle management for multiple proxy instances.
//!
//! Each instance runs on its own port. The registry lock only guards the
//! port map and is never held across an await.

use super::core::ProxyInstance;
use super::types::{InstanceSummary, ProxyError};
use crate::config::{CaptureConfig, Config, RecorderConfig};
use crate::har::Har;
use crate::proxy::{StoppableListener, Transport};
use crate::rewrite::HostRule;
use parking_lot::RwLock;
use std::collections::hash_map::Entry;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{info, warn};

/// Settings every new instance is created with.
#[derive(Debug, Clone)]
pub struct InstanceSettings {
    pub bind_host: String,
    pub capture: CaptureConfig,
    pub recorder: RecorderConfig,
}

impl InstanceSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            bind_host: config.proxy.bind_host.clone(),
            capture: config.capture.clone(),
            recorder: config.recorder.clone(),
        }
    }
}

/// Port → instance map.
pub struct ProxyRegistry {
    instances: RwLock<HashMap<u16, Arc<ProxyInstance>>>,
    settings: InstanceSettings,
    transport: Transport,
}

impl ProxyRegistry {
    pub fn new(config: &Config) -> Self {
        Self::with_transport(
            InstanceSettings::from_config(config),
            Transport::new(&config.proxy.connection_pool),
        )
    }

    pub fn with_transport(settings: InstanceSettings, transport: Transport) -> Self {
        Self {
            instances: RwLock::new(HashMap::new()),
            settings,
            transport,
        }
    }

    /// Create and start an instance. Port 0 binds any free port.
    /// Returns the port actually bound.
    pub async fn create(&self, requested_port: u16) -> Result<u16, ProxyError> {
        if requested_port != 0 && self.instances.read().contains_key(&requested_port) {
            return Err(ProxyError::PortInUse(requested_port));
        }

        let bind_host = &self.settings.bind_host;
        let listener = StoppableListener::bind(bind_host, requested_port)
            .await
            .map_err(|e| ProxyError::BindError(requested_port, e.to_string()))?;
        let port = listener.local_addr().port();
        info!("Proxy bound to {}:{}", bind_host, port);

        let instance = ProxyInstance::launch(
            listener,
            &self.settings.capture,
            &self.settings.recorder,
            self.transport.clone(),
        );

        let displaced = match self.instances.write().entry(port) {
            Entry::Vacant(slot) => {
                slot.insert(instance);
                None
            }
            // The port is still held by an instance finishing its stop
            Entry::Occupied(_) => Some(instance),
        };
        if let Some(instance) = displaced {
            warn!("Port {} is still registered, discarding new proxy", port);
            instance.stop().await;
            return Err(ProxyError::PortInUse(port));
        }

        Ok(port)
    }

    /// Live instance on `port`.
    pub fn get(&self, port: u16) -> Result<Arc<ProxyInstance>, ProxyError> {
        self.instances
            .read()
            .get(&port)
            .filter(|instance| instance.is_live())
            .cloned()
            .ok_or(ProxyError::NotFound(port))
    }

    /// Run the stop handshake, then unregister the instance.
    ///
    /// Only the first of concurrent callers stops it; the others wait for the
    /// handshake to finish and get `NotFound`.
    pub async fn stop(&self, port: u16) -> Result<(), ProxyError> {
        let instance = self
            .instances
            .read()
            .get(&port)
            .cloned()
            .ok_or(ProxyError::NotFound(port))?;

        if !instance.stop().await {
            return Err(ProxyError::NotFound(port));
        }

        let mut instances = self.instances.write();
        if instances
            .get(&port)
            .is_some_and(|current| Arc::ptr_eq(current, &instance))
        {
            instances.remove(&port);
        }
        Ok(())
    }

    /// Stop and remove an instance.
    pub async fn delete(&self, port: u16) -> Result<(), ProxyError> {
        self.stop(port).await?;
        info!("Proxy on port {} deleted", port);
        Ok(())
    }

    /// Summaries of live instances, by port.
    pub fn list(&self) -> Vec<InstanceSummary> {
        let instances: Vec<Arc<ProxyInstance>> = self.instances.read().values().cloned().collect();
        let mut summaries: Vec<InstanceSummary> = instances
            .iter()
            .filter(|instance| instance.is_live())
            .map(|instance| instance.summary())
            .collect();
        summaries.sort_by_key(|summary| summary.port);
        summaries
    }

    pub fn ports(&self) -> Vec<u16> {
        let mut ports: Vec<u16> = self.instances.read().keys().copied().collect();
        ports.sort_unstable();
        ports
    }

    pub fn count(&self) -> usize {
        self.instances.read().len()
    }

    pub fn add_host_rules(&self, port: u16, rules: Vec<HostRule>) -> Result<usize, ProxyError> {
        let instance = self.get(port)?;
        Ok(instance.add_host_rules(rules)?)
    }

    pub fn host_rules(&self, port: u16) -> Result<Vec<HostRule>, ProxyError> {
        Ok(self.get(port)?.host_rules())
    }

    pub fn har(&self, port: u16) -> Result<Har, ProxyError> {
        Ok(self.get(port)?.har())
    }

    /// Drain outstanding entries, return the log and reset it.
    pub async fn drain_and_take_har(&self, port: u16) -> Result<Har, ProxyError> {
        let instance = self.get(port)?;
        Ok(instance.drain_and_take().await)
    }

    /// Stop and remove every instance.
    pub async fn shutdown(&self) {
        let ports = self.ports();
        if ports.is_empty() {
            return;
        }
        info!("Stopping {} proxies", ports.len());
        let stops = ports.into_iter().map(|port| self.stop(port));
        for result in futures::future::join_all(stops).await {
            if let Err(e) = result {
                warn!("Stopping proxy during shutdown: {}", e);
            }
        }
    }
}
