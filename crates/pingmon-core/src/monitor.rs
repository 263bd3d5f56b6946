use std::collections::VecDeque;
use std::net::IpAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};
use tokio::sync::mpsc;
use tokio::time::{Interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::config::Thresholds;
use crate::event::{TargetEvent, REMOVED_MESSAGE};
use crate::feed::SubscriberFeed;
use crate::probe::{ProbeClient, ProbeResult, UnreachableKind};

const LOG_LINE_LIMIT: usize = 50;
const PAUSED_LINE: &str = "Ping check paused";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColourClass {
    Neutral,
    Success,
    Warning,
    Failure,
}

impl ColourClass {
    /// `#AARRGGBB` brush string understood by the dashboard client.
    pub fn brush(&self) -> &'static str {
        match self {
            ColourClass::Neutral => "#FF808080",
            ColourClass::Success => "#FF008000",
            ColourClass::Warning => "#FFFFA500",
            ColourClass::Failure => "#FFFF0000",
        }
    }
}

impl Serialize for ColourClass {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.brush())
    }
}

/// Per-target counters and message log. Only the owning monitor task mutates
/// this; everyone else reads a possibly slightly stale snapshot.
#[derive(Debug)]
pub struct MonitorState {
    consecutive_ok: u32,
    warning_failures: u32,
    timeout_failures: u32,
    colour: ColourClass,
    last_contact: Option<DateTime<Utc>>,
    lines: VecDeque<String>,
}

impl Default for MonitorState {
    fn default() -> Self {
        Self::new()
    }
}

impl MonitorState {
    pub fn new() -> Self {
        Self {
            consecutive_ok: 1,
            warning_failures: 0,
            timeout_failures: 0,
            colour: ColourClass::Neutral,
            last_contact: None,
            lines: VecDeque::new(),
        }
    }

    pub fn colour(&self) -> ColourClass {
        self.colour
    }

    pub fn consecutive_ok(&self) -> u32 {
        self.consecutive_ok
    }

    pub fn warning_failures(&self) -> u32 {
        self.warning_failures
    }

    pub fn timeout_failures(&self) -> u32 {
        self.timeout_failures
    }

    pub fn last_contact(&self) -> Option<DateTime<Utc>> {
        self.last_contact
    }

    pub fn last_contact_text(&self) -> String {
        match self.last_contact {
            Some(ts) => ts.format("%Y-%m-%d %H:%M:%S").to_string(),
            None => "Just Now".to_string(),
        }
    }

    pub fn last_lines(&self, count: usize) -> Vec<String> {
        let skip = self.lines.len().saturating_sub(count);
        self.lines.iter().skip(skip).cloned().collect()
    }

    /// Fold one probe outcome into the counters and derive the colour.
    /// Returns the log line describing the outcome.
    pub fn apply(&mut self, address: IpAddr, result: &ProbeResult, thresholds: &Thresholds) -> String {
        let line = match result {
            ProbeResult::Reply { rtt, bytes, ttl } => {
                self.record_reply(address, *rtt, *bytes, *ttl, thresholds)
            }
            ProbeResult::Unreachable(UnreachableKind::Host) => {
                self.record_failure("Destination host unreachable".to_string(), thresholds)
            }
            ProbeResult::Unreachable(UnreachableKind::Net) => {
                self.record_failure("Destination net unreachable".to_string(), thresholds)
            }
            ProbeResult::TimedOut => {
                self.record_failure("Request Timed Out".to_string(), thresholds)
            }
            ProbeResult::TransmitFailed => {
                self.record_failure("transmit failed. General failure".to_string(), thresholds)
            }
            ProbeResult::Unknown(status) => {
                self.record_failure(format!("Unexpected reply status: {status}"), thresholds)
            }
        };

        self.push_line(line.clone());
        line
    }

    fn record_reply(
        &mut self,
        address: IpAddr,
        rtt: Duration,
        bytes: usize,
        ttl: u8,
        thresholds: &Thresholds,
    ) -> String {
        let millis = rtt.as_millis();

        // Strictly greater than the threshold; an rtt equal to it is healthy.
        if millis > u128::from(thresholds.warning_ms) {
            self.colour = ColourClass::Warning;
            self.warning_failures = (self.warning_failures + 1).min(thresholds.warning_cap);
            self.timeout_failures = 0;
        } else {
            self.colour = ColourClass::Success;
            self.warning_failures = 0;
            self.timeout_failures = 0;
        }

        self.consecutive_ok = self.consecutive_ok.saturating_add(1);
        self.last_contact = Some(Utc::now());

        let time = if millis < 1 {
            "<1ms".to_string()
        } else {
            format!("={millis}ms")
        };
        format!("Reply from {address}: bytes={bytes} time{time} TTL={ttl}")
    }

    fn record_failure(&mut self, line: String, thresholds: &Thresholds) -> String {
        self.colour = ColourClass::Failure;
        self.timeout_failures = (self.timeout_failures + 1).min(thresholds.timeout_cap);
        self.warning_failures = 0;
        self.consecutive_ok = 1;
        line
    }

    fn push_line(&mut self, line: String) {
        self.lines.push_back(line);
        while self.lines.len() > LOG_LINE_LIMIT {
            self.lines.pop_front();
        }
    }

    pub(crate) fn clear_for_pause(&mut self) {
        self.lines.clear();
        self.warning_failures = 0;
        self.timeout_failures = 0;
        self.colour = ColourClass::Neutral;
        self.push_line(PAUSED_LINE.to_string());
    }

    pub(crate) fn clear_for_resume(&mut self) {
        self.lines.clear();
        self.consecutive_ok = 1;
    }
}

/// State shared between the monitor task and its readers. Writer split:
/// the monitor task owns `state` and `paused`, the alert coordinator owns
/// `alerting` and `notified`, the registry owns `name` and `show_graph`.
pub(crate) struct SharedMonitor {
    pub(crate) address: IpAddr,
    pub(crate) name: RwLock<String>,
    pub(crate) show_graph: AtomicBool,
    pub(crate) state: RwLock<MonitorState>,
    pub(crate) paused: AtomicBool,
    pub(crate) alerting: AtomicBool,
    pub(crate) notified: AtomicBool,
}

impl SharedMonitor {
    pub(crate) fn new(address: IpAddr, name: String, show_graph: bool) -> Self {
        Self {
            address,
            name: RwLock::new(name),
            show_graph: AtomicBool::new(show_graph),
            state: RwLock::new(MonitorState::new()),
            paused: AtomicBool::new(false),
            alerting: AtomicBool::new(false),
            notified: AtomicBool::new(false),
        }
    }

    fn is_paused(&self) -> bool {
        self.paused.load(Ordering::Relaxed)
    }

    fn event(&self, message: String) -> TargetEvent {
        let state = self.state.read().unwrap();
        TargetEvent {
            display_name: self.name.read().unwrap().clone(),
            address: self.address,
            colour: state.colour(),
            last_contact: state.last_contact_text(),
            is_paused: self.is_paused(),
            alerting: self.alerting.load(Ordering::Relaxed),
            message,
        }
    }
}

/// Snapshot the alert coordinator takes of one target per sweep.
pub(crate) struct AlertView {
    pub(crate) name: String,
    pub(crate) warning_failures: u32,
    pub(crate) timeout_failures: u32,
    pub(crate) last_contact: String,
    pub(crate) context: Vec<String>,
}

pub(crate) enum MonitorCommand {
    Pause,
    Resume,
    Dispose,
}

/// Handle to one running monitor task.
pub struct MonitorHandle {
    shared: Arc<SharedMonitor>,
    commands: mpsc::Sender<MonitorCommand>,
}

impl MonitorHandle {
    pub fn address(&self) -> IpAddr {
        self.shared.address
    }

    pub fn name(&self) -> String {
        self.shared.name.read().unwrap().clone()
    }

    pub(crate) fn set_name(&self, name: &str) {
        *self.shared.name.write().unwrap() = name.to_string();
    }

    pub fn show_graph(&self) -> bool {
        self.shared.show_graph.load(Ordering::Relaxed)
    }

    pub(crate) fn set_show_graph(&self, show: bool) {
        self.shared.show_graph.store(show, Ordering::Relaxed);
    }

    pub fn is_paused(&self) -> bool {
        self.shared.is_paused()
    }

    pub fn is_alerting(&self) -> bool {
        self.shared.alerting.load(Ordering::Relaxed)
    }

    pub(crate) fn set_alerting(&self, alerting: bool) {
        self.shared.alerting.store(alerting, Ordering::Relaxed);
    }

    pub(crate) fn is_notified(&self) -> bool {
        self.shared.notified.load(Ordering::Relaxed)
    }

    pub(crate) fn set_notified(&self, notified: bool) {
        self.shared.notified.store(notified, Ordering::Relaxed);
    }

    pub fn colour(&self) -> ColourClass {
        self.shared.state.read().unwrap().colour()
    }

    pub fn consecutive_ok(&self) -> u32 {
        self.shared.state.read().unwrap().consecutive_ok()
    }

    pub fn warning_failures(&self) -> u32 {
        self.shared.state.read().unwrap().warning_failures()
    }

    pub fn timeout_failures(&self) -> u32 {
        self.shared.state.read().unwrap().timeout_failures()
    }

    pub fn last_lines(&self, count: usize) -> Vec<String> {
        self.shared.state.read().unwrap().last_lines(count)
    }

    /// Synthetic event carrying the target's current state, used to bring a
    /// freshly authenticated subscriber up to date.
    pub fn snapshot_event(&self) -> TargetEvent {
        let message = self
            .shared
            .state
            .read()
            .unwrap()
            .last_lines(1)
            .pop()
            .unwrap_or_default();
        self.shared.event(message)
    }

    pub(crate) fn alert_view(&self) -> AlertView {
        let state = self.shared.state.read().unwrap();
        AlertView {
            name: self.name(),
            warning_failures: state.warning_failures(),
            timeout_failures: state.timeout_failures(),
            last_contact: state.last_contact_text(),
            context: state.last_lines(3),
        }
    }

    pub(crate) async fn pause(&self) {
        let _ = self.commands.send(MonitorCommand::Pause).await;
    }

    pub(crate) async fn resume(&self) {
        let _ = self.commands.send(MonitorCommand::Resume).await;
    }

    pub(crate) async fn dispose(&self) {
        let _ = self.commands.send(MonitorCommand::Dispose).await;
    }
}

pub(crate) fn spawn_monitor(
    shared: Arc<SharedMonitor>,
    probe: Arc<dyn ProbeClient>,
    thresholds: Arc<RwLock<Thresholds>>,
    interval: Duration,
    feed: Arc<SubscriberFeed>,
) -> MonitorHandle {
    let (commands, receiver) = mpsc::channel(8);
    let task = MonitorTask {
        shared: Arc::clone(&shared),
        probe,
        thresholds,
        feed,
    };
    tokio::spawn(task.run(receiver, interval));

    MonitorHandle { shared, commands }
}

#[derive(PartialEq)]
enum Flow {
    Continue,
    Stop,
}

struct MonitorTask {
    shared: Arc<SharedMonitor>,
    probe: Arc<dyn ProbeClient>,
    thresholds: Arc<RwLock<Thresholds>>,
    feed: Arc<SubscriberFeed>,
}

impl MonitorTask {
    async fn run(self, mut commands: mpsc::Receiver<MonitorCommand>, interval: Duration) {
        let mut ticker = tokio::time::interval(interval);
        // A tick that fires while the previous probe is still in flight is
        // dropped, never queued.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            let paused = self.shared.is_paused();
            let flow = tokio::select! {
                command = commands.recv() => self.on_command(command, &mut ticker),
                _ = ticker.tick(), if !paused => self.probe_once(&mut commands, &mut ticker).await,
            };
            if flow == Flow::Stop {
                break;
            }
        }

        debug!(address = %self.shared.address, "monitor stopped");
    }

    /// Run one probe, racing it against the control channel so that a pause
    /// or dispose arriving mid-probe discards the in-flight result.
    async fn probe_once(
        &self,
        commands: &mut mpsc::Receiver<MonitorCommand>,
        ticker: &mut Interval,
    ) -> Flow {
        let thresholds = *self.thresholds.read().unwrap();
        let timeout = Duration::from_millis(thresholds.timeout_ms);
        let probe = Arc::clone(&self.probe);
        let address = self.shared.address;

        let outcome = tokio::select! {
            command = commands.recv() => return self.on_command(command, ticker),
            outcome = probe.probe(address, timeout) => outcome,
        };

        let result = outcome.unwrap_or_else(|err| {
            debug!(address = %address, error = %err, "probe client error");
            ProbeResult::TransmitFailed
        });

        let line = self
            .shared
            .state
            .write()
            .unwrap()
            .apply(address, &result, &thresholds);
        self.publish(line);

        Flow::Continue
    }

    fn on_command(&self, command: Option<MonitorCommand>, ticker: &mut Interval) -> Flow {
        match command {
            Some(MonitorCommand::Pause) => {
                if !self.shared.paused.swap(true, Ordering::Relaxed) {
                    self.shared.state.write().unwrap().clear_for_pause();
                    info!(address = %self.shared.address, "check paused");
                    self.publish(String::new());
                }
                Flow::Continue
            }
            Some(MonitorCommand::Resume) => {
                if self.shared.paused.swap(false, Ordering::Relaxed) {
                    self.shared.state.write().unwrap().clear_for_resume();
                    info!(address = %self.shared.address, "check resumed");
                    ticker.reset_immediately();
                }
                Flow::Continue
            }
            // A closed channel means the registry dropped us; clean up the
            // same way an explicit dispose does.
            Some(MonitorCommand::Dispose) | None => {
                self.publish(REMOVED_MESSAGE.to_string());
                Flow::Stop
            }
        }
    }

    fn publish(&self, message: String) {
        self.feed.publish(self.shared.event(message));
    }
}
