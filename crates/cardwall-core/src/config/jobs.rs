//! Job submission and retention policy.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Job policy configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobsConfig {
    /// Terminal jobs older than this many days are purged with their files.
    #[serde(default = "default_retention_days")]
    pub retention_days: u32,
    /// Cron expression (with seconds) for the retention sweep.
    #[serde(default = "default_cleanup_cron")]
    pub cleanup_cron: String,
    /// Accepted upload file extensions keyed by job kind.
    #[serde(default = "default_allowed_extensions")]
    pub allowed_extensions: BTreeMap<String, Vec<String>>,
}

impl JobsConfig {
    /// Extensions accepted for uploads of the given job kind.
    pub fn extensions_for(&self, kind: &str) -> &[String] {
        self.allowed_extensions
            .get(kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}

impl Default for JobsConfig {
    fn default() -> Self {
        Self {
            retention_days: default_retention_days(),
            cleanup_cron: default_cleanup_cron(),
            allowed_extensions: default_allowed_extensions(),
        }
    }
}

fn default_retention_days() -> u32 {
    7
}

fn default_cleanup_cron() -> String {
    "0 30 3 * * *".to_string()
}

fn default_allowed_extensions() -> BTreeMap<String, Vec<String>> {
    let mut map = BTreeMap::new();
    map.insert(
        "import_cards".to_string(),
        vec!["txt".to_string(), "tsv".to_string()],
    );
    map.insert(
        "import_program".to_string(),
        vec!["json".to_string(), "cardwall".to_string()],
    );
    map.insert("import_dependencies".to_string(), vec!["json".to_string()]);
    map
}
