//! Provisioning configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Limits applied by the [`Provisioner`](super::Provisioner).
///
/// # Example
///
/// ```
/// use realty_persistence::provision::ProvisioningConfig;
///
/// let config = ProvisioningConfig {
///     timeout_ms: 5_000,
///     ..Default::default()
/// };
/// assert_eq!(config.timeout().as_secs(), 5);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProvisioningConfig {
    /// Time budget for building one partition, in milliseconds.
    ///
    /// A build that exceeds it is abandoned and the partition marked `failed`.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,

    /// Highest collision suffix tried when allocating a partition identifier.
    #[serde(default = "default_max_collision_suffix")]
    pub max_collision_suffix: u32,
}

fn default_timeout_ms() -> u64 {
    30_000
}

fn default_max_collision_suffix() -> u32 {
    99
}

impl Default for ProvisioningConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            max_collision_suffix: default_max_collision_suffix(),
        }
    }
}

impl ProvisioningConfig {
    /// Returns the time budget as a [`Duration`].
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}
