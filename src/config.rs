use std::{path::Path, time::Duration};

use serde::{Deserialize, Serialize};

macro_rules! default_vals {
    ($($mod_name:ident {
        $($name:ident: $t:ty = $val:expr);* $(;)*
    });* $(;)*) => {
        $(
            mod $mod_name {
                $(
                    default_vals!($name,$t,$val);
                )*
            }
        )*
    };
    ($name:ident,$t:ty,$val:expr) => {
        pub(super) fn $name() -> $t {
            $val
        }
    };
}

default_vals! {
    semaphore {
        initial_count: i32 = 0;
    };
    workload {
        waiters: usize = 8;
        signals: usize = 4;
        wait_timeout: std::time::Duration = std::time::Duration::from_millis(250);
        signal_interval: std::time::Duration = std::time::Duration::ZERO;
    };
}

#[derive(Deserialize, Serialize, Default, Debug, Clone)]
pub struct StressConfig {
    #[serde(default)]
    pub semaphore: SemaphoreConfig,
    #[serde(default)]
    pub workload: WorkloadConfig,
}

impl StressConfig {
    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<StressConfig> {
        Ok(toml::from_str(&std::fs::read_to_string(path)?)?)
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SemaphoreConfig {
    #[serde(default = "semaphore::initial_count")]
    pub initial_count: i32,
}

impl Default for SemaphoreConfig {
    fn default() -> Self {
        Self {
            initial_count: semaphore::initial_count(),
        }
    }
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct WorkloadConfig {
    #[serde(default = "workload::waiters")]
    pub waiters: usize,
    #[serde(default = "workload::signals")]
    pub signals: usize,
    #[serde(default = "workload::wait_timeout", with = "humantime_serde")]
    pub wait_timeout: Duration,
    #[serde(default = "workload::signal_interval", with = "humantime_serde")]
    pub signal_interval: Duration,
}

impl Default for WorkloadConfig {
    fn default() -> Self {
        Self {
            waiters: workload::waiters(),
            signals: workload::signals(),
            wait_timeout: workload::wait_timeout(),
            signal_interval: workload::signal_interval(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_uses_defaults() {
        let config: StressConfig = toml::from_str("").unwrap();
        assert_eq!(config.semaphore.initial_count, 0);
        assert_eq!(config.workload.waiters, 8);
        assert_eq!(config.workload.signals, 4);
        assert_eq!(config.workload.wait_timeout, Duration::from_millis(250));
        assert_eq!(config.workload.signal_interval, Duration::ZERO);
    }

    #[test]
    fn parses_humantime_durations() {
        let config: StressConfig = toml::from_str(
            r#"
            [semaphore]
            initial_count = 3

            [workload]
            waiters = 16
            wait_timeout = "1s 500ms"
            signal_interval = "2ms"
            "#,
        )
        .unwrap();

        assert_eq!(config.semaphore.initial_count, 3);
        assert_eq!(config.workload.waiters, 16);
        assert_eq!(config.workload.signals, 4);
        assert_eq!(config.workload.wait_timeout, Duration::from_millis(1500));
        assert_eq!(config.workload.signal_interval, Duration::from_millis(2));
    }
}
