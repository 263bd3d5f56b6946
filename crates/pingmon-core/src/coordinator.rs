use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

use crate::monitor::AlertView;
use crate::notify::ChatNotifier;
use crate::registry::TargetRegistry;

/// The looping alert cue. Start and stop must be idempotent; the coordinator
/// is the only caller, so they are never raced.
pub trait AlertSound: Send + Sync {
    fn start(&self);
    fn stop(&self);
}

/// Default cue when no audio device is wired up: the on/off edges land in the
/// log instead.
pub struct TracingAlertSound;

impl AlertSound for TracingAlertSound {
    fn start(&self) {
        info!("alert cue started");
    }

    fn stop(&self) {
        info!("alert cue stopped");
    }
}

/// Cross-target aggregation: unions the per-target breach flags into the
/// audio cue and converts sustained chat breaches into edge-triggered
/// notifications. Runs on its own cadence, independent of probe intervals.
pub struct AlertCoordinator {
    registry: Arc<TargetRegistry>,
    sound: Arc<dyn AlertSound>,
    notifier: Option<Arc<dyn ChatNotifier>>,
    sweep_interval: Duration,
    playing: bool,
}

impl AlertCoordinator {
    pub fn new(
        registry: Arc<TargetRegistry>,
        sound: Arc<dyn AlertSound>,
        notifier: Option<Arc<dyn ChatNotifier>>,
        sweep_interval: Duration,
    ) -> Self {
        Self {
            registry,
            sound,
            notifier,
            sweep_interval,
            playing: false,
        }
    }

    pub async fn run(mut self) {
        let mut ticker = tokio::time::interval(self.sweep_interval);
        loop {
            ticker.tick().await;
            self.sweep();
        }
    }

    /// One pass over every target. Counter reads race the monitors by design;
    /// a sweep tolerates values up to one probe interval stale.
    pub fn sweep(&mut self) {
        let thresholds = self.registry.thresholds();
        let mut any_alerting = false;

        for handle in self.registry.handles() {
            let view = handle.alert_view();

            let audio_breach = thresholds.notification_enabled
                && breaches(
                    &view,
                    thresholds.sound_warning_count,
                    thresholds.sound_timeout_count,
                );
            if audio_breach {
                any_alerting = true;
                handle.set_alerting(true);
                if !self.playing {
                    self.playing = true;
                    self.sound.start();
                }
            } else {
                handle.set_alerting(false);
            }

            if let Some(notifier) = &self.notifier {
                let chat_breach = breaches(
                    &view,
                    thresholds.chat_warning_count,
                    thresholds.chat_timeout_count,
                );
                if chat_breach && !handle.is_notified() {
                    handle.set_notified(true);
                    send_alert(Arc::clone(notifier), &view);
                } else if !chat_breach && handle.is_notified() {
                    handle.set_notified(false);
                    send_cleared(Arc::clone(notifier), &view);
                }
            }
        }

        if !any_alerting && self.playing {
            self.playing = false;
            self.sound.stop();
        }
    }
}

fn breaches(view: &AlertView, warning_count: u32, timeout_count: u32) -> bool {
    (warning_count > 0 && view.warning_failures >= warning_count)
        || (timeout_count > 0 && view.timeout_failures >= timeout_count)
}

fn send_alert(notifier: Arc<dyn ChatNotifier>, view: &AlertView) {
    let status = if view.warning_failures != 0 {
        "HIGH RESPONSE TIME"
    } else {
        "TIMEOUT"
    };
    let base = format!(
        "Host '{}' has entered state '{}'.\n\nLast contact: '{}'",
        view.name, status, view.last_contact
    );
    let markdown = format!("**ALERT**: {base}\n```\n{}\n```", view.context.join("\n"));
    deliver(notifier, format!("ALERT: {base}"), markdown);
}

fn send_cleared(notifier: Arc<dyn ChatNotifier>, view: &AlertView) {
    let base = format!(
        "Host '{}' has cleared alert state.\n\nLast contact: '{}'",
        view.name, view.last_contact
    );
    let markdown = format!("**OK**: {base}\n```\n{}\n```", view.context.join("\n"));
    deliver(notifier, format!("OK: {base}"), markdown);
}

/// Delivery happens off the sweep so a slow chat API never stalls it;
/// failures are logged and otherwise ignored.
fn deliver(notifier: Arc<dyn ChatNotifier>, text: String, markdown: String) {
    tokio::spawn(async move {
        if !notifier.send_message(&text, &markdown).await {
            warn!("chat notification was not delivered");
        }
    });
}
