//! Fake collaborators for in-crate tests.

use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;

use crate::config::{MonitorConfig, Thresholds};
use crate::coordinator::AlertSound;
use crate::notify::ChatNotifier;
use crate::probe::{ProbeClient, ProbeError, ProbeResult};

pub(crate) fn addr(text: &str) -> IpAddr {
    text.parse().expect("test address")
}

pub(crate) fn reply(rtt_ms: u64) -> ProbeResult {
    ProbeResult::Reply {
        rtt: Duration::from_millis(rtt_ms),
        bytes: 32,
        ttl: 64,
    }
}

pub(crate) fn test_config(interval_ms: u64, thresholds: Thresholds) -> MonitorConfig {
    MonitorConfig {
        probe_interval: Duration::from_millis(interval_ms),
        sweep_interval: Duration::from_millis(500),
        feed_capacity: 64,
        thresholds,
    }
}

/// Let spawned tasks (monitor commands, chat deliveries) run without moving
/// the paused clock.
pub(crate) async fn settle() {
    for _ in 0..16 {
        tokio::task::yield_now().await;
    }
}

/// Probe that plays a scripted sequence of outcomes, then repeats a settable
/// fallback. Calls are counted at probe start.
pub(crate) struct ScriptedProbe {
    script: Mutex<VecDeque<ProbeResult>>,
    fallback: Mutex<ProbeResult>,
    delay: Duration,
    calls: AtomicUsize,
}

impl ScriptedProbe {
    pub(crate) fn new(script: Vec<ProbeResult>, fallback: ProbeResult) -> Self {
        Self {
            script: Mutex::new(script.into()),
            fallback: Mutex::new(fallback),
            delay: Duration::ZERO,
            calls: AtomicUsize::new(0),
        }
    }

    pub(crate) fn replies(rtt_ms: u64) -> Self {
        Self::new(Vec::new(), reply(rtt_ms))
    }

    pub(crate) fn timeouts() -> Self {
        Self::new(Vec::new(), ProbeResult::TimedOut)
    }

    pub(crate) fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub(crate) fn set_fallback(&self, result: ProbeResult) {
        *self.fallback.lock().unwrap() = result;
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl ProbeClient for ScriptedProbe {
    async fn probe(&self, _address: IpAddr, _timeout: Duration) -> Result<ProbeResult, ProbeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        let scripted = self.script.lock().unwrap().pop_front();
        Ok(scripted.unwrap_or_else(|| self.fallback.lock().unwrap().clone()))
    }
}

#[derive(Default)]
pub(crate) struct RecordingNotifier {
    pub(crate) sent: Mutex<Vec<(String, String)>>,
}

impl RecordingNotifier {
    pub(crate) fn count(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

#[async_trait]
impl ChatNotifier for RecordingNotifier {
    async fn send_message(&self, text: &str, markdown: &str) -> bool {
        self.sent
            .lock()
            .unwrap()
            .push((text.to_string(), markdown.to_string()));
        true
    }
}

#[derive(Default)]
pub(crate) struct CountingSound {
    pub(crate) starts: AtomicUsize,
    pub(crate) stops: AtomicUsize,
}

impl AlertSound for CountingSound {
    fn start(&self) {
        self.starts.fetch_add(1, Ordering::SeqCst);
    }

    fn stop(&self) {
        self.stops.fetch_add(1, Ordering::SeqCst);
    }
}
