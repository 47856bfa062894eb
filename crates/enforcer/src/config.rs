use serde::{Deserialize, Serialize};

/// [`VirtualMachine`](crate::VirtualMachine) settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Settings {
    /// Gas available to a fresh execution.
    pub gas_limit: u64,
    /// Memory ceiling in 32-byte words; growing past it faults with `INTERNAL_ERROR`.
    pub max_memory_words: usize,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            gas_limit: 0x000f_ffff_ffff_ffff,
            max_memory_words: 1 << 20,
        }
    }
}

impl Settings {
    /// Parses settings from JSON; missing fields take their default values.
    ///
    /// # Errors
    ///
    /// Returns the deserialization error for malformed input.
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_uses_defaults() {
        let settings = Settings::from_json(r#"{ "maxMemoryWords": 16 }"#).unwrap();
        assert_eq!(settings.max_memory_words, 16);
        assert_eq!(settings.gas_limit, Settings::default().gas_limit);
        assert!(Settings::from_json("[]").is_err());
    }
}
