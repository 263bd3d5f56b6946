use std::net::IpAddr;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use thiserror::Error;
use tracing::{info, warn};

use crate::config::{MonitorConfig, Thresholds};
use crate::feed::SubscriberFeed;
use crate::monitor::{spawn_monitor, MonitorHandle, SharedMonitor};
use crate::probe::ProbeClient;
use crate::project::{ProjectElement, ProjectFile};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    pub address: IpAddr,
    pub name: String,
    pub show_graph: bool,
}

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("a check already exists for {0}")]
    DuplicateAddress(IpAddr),
    #[error("no check exists for {0}")]
    UnknownAddress(IpAddr),
    #[error("display name must not be empty")]
    EmptyName,
}

/// Owns one monitor per target, keyed and deduplicated by address. Insertion
/// order is preserved for listings and snapshots.
pub struct TargetRegistry {
    handles: RwLock<Vec<Arc<MonitorHandle>>>,
    thresholds: Arc<RwLock<Thresholds>>,
    probe: Arc<dyn ProbeClient>,
    feed: Arc<SubscriberFeed>,
    probe_interval: Duration,
    graph_height: AtomicU32,
}

impl TargetRegistry {
    pub fn new(probe: Arc<dyn ProbeClient>, config: &MonitorConfig, feed: Arc<SubscriberFeed>) -> Self {
        Self {
            handles: RwLock::new(Vec::new()),
            thresholds: Arc::new(RwLock::new(config.thresholds)),
            probe,
            feed,
            probe_interval: config.probe_interval,
            graph_height: AtomicU32::new(100),
        }
    }

    pub fn thresholds(&self) -> Thresholds {
        *self.thresholds.read().unwrap()
    }

    pub fn set_thresholds(&self, thresholds: Thresholds) {
        *self.thresholds.write().unwrap() = thresholds;
    }

    pub fn graph_height(&self) -> u32 {
        self.graph_height.load(Ordering::Relaxed)
    }

    pub fn set_graph_height(&self, height: u32) {
        self.graph_height.store(height, Ordering::Relaxed);
    }

    pub fn create(&self, name: &str, address: IpAddr, graph_hidden: bool) -> Result<(), RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }

        let mut handles = self.handles.write().unwrap();
        if handles.iter().any(|h| h.address() == address) {
            return Err(RegistryError::DuplicateAddress(address));
        }

        handles.push(Arc::new(self.start_monitor(address, name.to_string(), !graph_hidden)));
        info!(%address, name, "check added");
        Ok(())
    }

    pub async fn remove(&self, address: IpAddr) -> Result<(), RegistryError> {
        let handle = {
            let mut handles = self.handles.write().unwrap();
            let index = handles
                .iter()
                .position(|h| h.address() == address)
                .ok_or(RegistryError::UnknownAddress(address))?;
            handles.remove(index)
        };

        handle.dispose().await;
        info!(%address, "check removed");
        Ok(())
    }

    pub fn rename(&self, address: IpAddr, name: &str) -> Result<(), RegistryError> {
        if name.is_empty() {
            return Err(RegistryError::EmptyName);
        }
        self.find(address)
            .ok_or(RegistryError::UnknownAddress(address))?
            .set_name(name);
        Ok(())
    }

    /// Move a check to a new address. The old monitor is disposed (emitting a
    /// removal event) and a fresh one starts at the new address with the same
    /// display name and graph flag, counters reset.
    pub async fn re_address(&self, old: IpAddr, new: IpAddr) -> Result<(), RegistryError> {
        if old == new {
            return Ok(());
        }

        let old_handle = {
            let mut handles = self.handles.write().unwrap();
            let index = handles
                .iter()
                .position(|h| h.address() == old)
                .ok_or(RegistryError::UnknownAddress(old))?;
            if handles.iter().any(|h| h.address() == new) {
                return Err(RegistryError::DuplicateAddress(new));
            }

            let replacement =
                self.start_monitor(new, handles[index].name(), handles[index].show_graph());
            std::mem::replace(&mut handles[index], Arc::new(replacement))
        };

        old_handle.dispose().await;
        info!(%old, %new, "check re-addressed");
        Ok(())
    }

    pub async fn pause(&self, address: IpAddr) -> Result<(), RegistryError> {
        self.find(address)
            .ok_or(RegistryError::UnknownAddress(address))?
            .pause()
            .await;
        Ok(())
    }

    pub async fn resume(&self, address: IpAddr) -> Result<(), RegistryError> {
        self.find(address)
            .ok_or(RegistryError::UnknownAddress(address))?
            .resume()
            .await;
        Ok(())
    }

    pub async fn toggle(&self, address: IpAddr) -> Result<(), RegistryError> {
        let handle = self
            .find(address)
            .ok_or(RegistryError::UnknownAddress(address))?;
        if handle.is_paused() {
            handle.resume().await;
        } else {
            handle.pause().await;
        }
        Ok(())
    }

    pub async fn pause_all(&self) {
        for handle in self.handles() {
            handle.pause().await;
        }
    }

    pub async fn resume_all(&self) {
        for handle in self.handles() {
            handle.resume().await;
        }
    }

    pub fn find(&self, address: IpAddr) -> Option<Arc<MonitorHandle>> {
        self.handles
            .read()
            .unwrap()
            .iter()
            .find(|h| h.address() == address)
            .cloned()
    }

    pub fn handles(&self) -> Vec<Arc<MonitorHandle>> {
        self.handles.read().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.handles.read().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.read().unwrap().is_empty()
    }

    /// Ordered snapshot of the current targets, not a live view.
    pub fn list(&self) -> Vec<Target> {
        self.handles()
            .iter()
            .map(|h| Target {
                address: h.address(),
                name: h.name(),
                show_graph: h.show_graph(),
            })
            .collect()
    }

    pub fn snapshot(&self) -> ProjectFile {
        let thresholds = self.thresholds();
        ProjectFile {
            ping_elements: self
                .handles()
                .iter()
                .map(|h| ProjectElement {
                    address: h.address().to_string(),
                    name: h.name(),
                    graph_hidden: !h.show_graph(),
                })
                .collect(),
            warning_ms: thresholds.warning_ms,
            timeout_ms: thresholds.timeout_ms,
            sound_warning_count: thresholds.sound_warning_count,
            sound_timeout_count: thresholds.sound_timeout_count,
            chat_warning_count: thresholds.chat_warning_count,
            chat_timeout_count: thresholds.chat_timeout_count,
            notification_enabled: thresholds.notification_enabled,
            graph_height: self.graph_height(),
        }
    }

    /// Replace everything with the contents of a project document. Existing
    /// monitors are disposed before any element is applied; elements that
    /// fail to import are skipped with a warning.
    pub async fn restore(&self, project: &ProjectFile) {
        self.clear_all().await;

        {
            let mut thresholds = self.thresholds.write().unwrap();
            thresholds.warning_ms = project.warning_ms;
            thresholds.timeout_ms = project.timeout_ms;
            thresholds.sound_warning_count = project.sound_warning_count;
            thresholds.sound_timeout_count = project.sound_timeout_count;
            thresholds.chat_warning_count = project.chat_warning_count;
            thresholds.chat_timeout_count = project.chat_timeout_count;
            thresholds.notification_enabled = project.notification_enabled;
        }
        self.set_graph_height(project.graph_height);

        for element in &project.ping_elements {
            let Ok(address) = element.address.parse::<IpAddr>() else {
                warn!(address = %element.address, name = %element.name, "skipping element with invalid address");
                continue;
            };
            if let Err(err) = self.create(&element.name, address, element.graph_hidden) {
                warn!(%address, error = %err, "skipping element");
            }
        }
    }

    pub async fn clear_all(&self) {
        let drained: Vec<_> = {
            let mut handles = self.handles.write().unwrap();
            handles.drain(..).collect()
        };
        for handle in drained {
            handle.dispose().await;
        }
    }

    fn start_monitor(&self, address: IpAddr, name: String, show_graph: bool) -> MonitorHandle {
        spawn_monitor(
            Arc::new(SharedMonitor::new(address, name, show_graph)),
            Arc::clone(&self.probe),
            Arc::clone(&self.thresholds),
            self.probe_interval,
            Arc::clone(&self.feed),
        )
    }
}
