pub mod config;
pub mod coordinator;
pub mod event;
pub mod feed;
pub mod monitor;
pub mod notify;
pub mod probe;
pub mod project;
pub mod registry;

#[cfg(test)]
mod registry_tests;
#[cfg(test)]
mod support;

pub use config::{MonitorConfig, Thresholds};
pub use coordinator::{AlertCoordinator, AlertSound, TracingAlertSound};
pub use event::{ApiReply, AuthRequest, TargetEvent, REMOVED_MESSAGE};
pub use feed::SubscriberFeed;
pub use monitor::{ColourClass, MonitorHandle, MonitorState};
pub use notify::{ChatNotifier, Room, WebexNotifier};
pub use probe::{IcmpProbeClient, ProbeClient, ProbeError, ProbeResult, UnreachableKind};
pub use project::{ProjectElement, ProjectFile};
pub use registry::{RegistryError, Target, TargetRegistry};
