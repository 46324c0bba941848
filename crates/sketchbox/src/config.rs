//! Session configuration

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration for the virtual file tree.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TreeConfig {
    /// Maximum number of undo records kept across all files
    pub history_limit: usize,
}

impl Default for TreeConfig {
    fn default() -> Self {
        Self { history_limit: 100 }
    }
}

/// Configuration for import resolution and the preview renderer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PreviewConfig {
    /// Candidate entry modules, in priority order
    pub entry_points: Vec<String>,
    /// Import prefix standing for the tree root
    pub root_alias: String,
    /// Extensions probed for extensionless specifiers, in priority order
    pub extensions: Vec<String>,
    /// Quiet period before a rebuild starts
    #[serde(with = "duration_ms")]
    pub debounce: Duration,
    /// Base URL external packages are loaded from
    pub cdn_url: String,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            entry_points: [
                "/App.jsx",
                "/App.tsx",
                "/index.jsx",
                "/index.tsx",
                "/src/App.jsx",
                "/src/App.tsx",
            ]
            .map(String::from)
            .to_vec(),
            root_alias: "@/".to_string(),
            extensions: [".jsx", ".tsx", ".js", ".ts"].map(String::from).to_vec(),
            debounce: Duration::from_millis(150),
            cdn_url: "https://esm.sh".to_string(),
        }
    }
}

/// Top-level configuration for a project session.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Tree settings
    pub tree: TreeConfig,
    /// Preview settings
    pub preview: PreviewConfig,
}

/// Helper for serializing Duration as milliseconds
mod duration_ms {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serialize, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        (duration.as_millis() as u64).serialize(serializer)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let ms = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(ms))
    }
}
