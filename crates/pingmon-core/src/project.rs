use serde::{Deserialize, Serialize};

/// On-disk project document: the monitored targets plus the threshold and
/// notification settings that belong to them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectFile {
    pub ping_elements: Vec<ProjectElement>,
    pub warning_ms: u64,
    pub timeout_ms: u64,
    #[serde(default)]
    pub sound_warning_count: u32,
    #[serde(default = "default_sound_timeout_count")]
    pub sound_timeout_count: u32,
    #[serde(default)]
    pub chat_warning_count: u32,
    #[serde(default)]
    pub chat_timeout_count: u32,
    #[serde(default)]
    pub notification_enabled: bool,
    #[serde(default = "default_graph_height")]
    pub graph_height: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProjectElement {
    pub address: String,
    pub name: String,
    #[serde(default)]
    pub graph_hidden: bool,
}

fn default_sound_timeout_count() -> u32 {
    5
}

fn default_graph_height() -> u32 {
    100
}
