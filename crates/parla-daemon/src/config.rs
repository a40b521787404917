//! Configuration file management.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use parla_payout::PayoutPolicy;
use parla_types::{INVITE_TTL_SECS, TREE_VIEW_DEPTH};
use parla_workflow::{HashingParams, WorkflowConfig};

/// Complete daemon configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DaemonConfig {
    /// Socket and storage locations.
    #[serde(default)]
    pub server: ServerConfig,
    /// Commission, match and weekly profit parameters.
    #[serde(default)]
    pub payout: PayoutPolicy,
    /// Background jobs.
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Argon2id cost for new password hashes.
    #[serde(default)]
    pub security: HashingParams,
    /// Registration and referral settings.
    #[serde(default)]
    pub accounts: AccountsConfig,
    /// Advanced settings.
    #[serde(default)]
    pub advanced: AdvancedConfig,
}

/// Server configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Data directory. Empty = platform default.
    #[serde(default)]
    pub data_dir: String,
    /// Socket file name inside the data directory.
    #[serde(default = "default_socket_name")]
    pub socket_name: String,
}

/// Scheduler configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Credit the weekly profit once per ISO week without an admin trigger.
    #[serde(default = "default_true")]
    pub auto_weekly_distribution: bool,
    /// How often the scheduler wakes up to look for an unpaid week.
    #[serde(default = "default_check_interval")]
    pub check_interval_secs: u64,
}

/// Account configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccountsConfig {
    /// Lifetime of a single-use invite.
    #[serde(default = "default_invite_ttl")]
    pub invite_ttl_secs: u64,
    /// Deepest network tree a dashboard may request.
    #[serde(default = "default_tree_view_depth")]
    pub tree_view_depth: u32,
    /// The account registered into an empty database becomes admin.
    #[serde(default = "default_true")]
    pub first_user_is_admin: bool,
}

/// Advanced configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdvancedConfig {
    /// Log level: "debug" | "info" | "warn" | "error".
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

// Default value functions

fn default_socket_name() -> String {
    "parla.sock".to_string()
}

fn default_true() -> bool {
    true
}

fn default_check_interval() -> u64 {
    60 * 60
}

fn default_invite_ttl() -> u64 {
    INVITE_TTL_SECS
}

fn default_tree_view_depth() -> u32 {
    TREE_VIEW_DEPTH
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            data_dir: String::new(),
            socket_name: default_socket_name(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            auto_weekly_distribution: true,
            check_interval_secs: default_check_interval(),
        }
    }
}

impl Default for AccountsConfig {
    fn default() -> Self {
        Self {
            invite_ttl_secs: default_invite_ttl(),
            tree_view_depth: default_tree_view_depth(),
            first_user_is_admin: true,
        }
    }
}

impl Default for AdvancedConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default config file location.
    ///
    /// Falls back to defaults if the file does not exist.
    pub fn load() -> anyhow::Result<Self> {
        let config_path = Self::config_path();
        let config = if config_path.exists() {
            let content = std::fs::read_to_string(&config_path)?;
            toml::from_str::<DaemonConfig>(&content)?
        } else {
            Self::default()
        };
        config.payout.validate()?;
        Ok(config)
    }

    /// Get the data directory path.
    pub fn data_dir(&self) -> PathBuf {
        if self.server.data_dir.is_empty() {
            Self::default_data_dir()
        } else {
            PathBuf::from(&self.server.data_dir)
        }
    }

    pub fn socket_path(&self) -> PathBuf {
        self.data_dir().join(&self.server.socket_name)
    }

    pub fn db_path(&self) -> PathBuf {
        self.data_dir().join("parla.db")
    }

    /// Settings handed to every workflow call.
    pub fn workflow(&self) -> WorkflowConfig {
        WorkflowConfig {
            payout: self.payout,
            hashing: self.security,
            invite_ttl_secs: self.accounts.invite_ttl_secs,
            tree_view_depth: self.accounts.tree_view_depth,
            first_user_is_admin: self.accounts.first_user_is_admin,
        }
    }

    fn config_path() -> PathBuf {
        Self::default_data_dir().join("config.toml")
    }

    fn default_data_dir() -> PathBuf {
        if let Ok(dir) = std::env::var("PARLA_DATA_DIR") {
            return PathBuf::from(dir);
        }
        std::env::var("HOME")
            .map(|h| PathBuf::from(h).join(".parla"))
            .unwrap_or_else(|_| PathBuf::from("/tmp/parla"))
    }
}
