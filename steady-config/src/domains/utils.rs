//! Utility functions and helpers for configuration

use serde::{Deserialize, Deserializer, Serializer};
use std::time::Duration;

/// Serde helper module for Duration serialization as whole milliseconds
pub mod serde_duration_ms {
    use super::*;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

/// Default functions for serde
pub fn default_false() -> bool {
    false
}

#[cfg(test)]
mod tests {
    use serde::{Deserialize, Serialize};
    use std::time::Duration;

    #[derive(Serialize, Deserialize)]
    struct Holder {
        #[serde(with = "super::serde_duration_ms")]
        delay: Duration,
    }

    #[test]
    fn test_duration_is_plain_milliseconds() {
        let yaml = serde_yaml::to_string(&Holder {
            delay: Duration::from_millis(1500),
        })
        .unwrap();
        assert_eq!(yaml.trim(), "delay: 1500");

        let parsed: Holder = serde_yaml::from_str("delay: 250").unwrap();
        assert_eq!(parsed.delay, Duration::from_millis(250));
    }
}
