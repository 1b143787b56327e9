// Hash algorithm selection and lenient input normalization

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Hash iterations per difficulty unit
pub const ITERATIONS_PER_CYCLE: u64 = 50_000;

/// Closed set of supported hash functions
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HashAlgorithm {
    #[default]
    Sha256,
    Sha512,
    #[serde(rename = "sha3_256")]
    Sha3_256,
    #[serde(rename = "sha3_512")]
    Sha3_512,
    Blake2b,
}

impl HashAlgorithm {
    pub const ALL: [HashAlgorithm; 5] = [
        HashAlgorithm::Sha256,
        HashAlgorithm::Sha512,
        HashAlgorithm::Sha3_256,
        HashAlgorithm::Sha3_512,
        HashAlgorithm::Blake2b,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256 => "sha256",
            HashAlgorithm::Sha512 => "sha512",
            HashAlgorithm::Sha3_256 => "sha3_256",
            HashAlgorithm::Sha3_512 => "sha3_512",
            HashAlgorithm::Blake2b => "blake2b",
        }
    }

    pub fn parse(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|a| a.as_str() == name)
    }

    /// Unknown names and non-string values fall back to the default
    pub fn normalize(value: Option<&Value>) -> Self {
        value
            .and_then(Value::as_str)
            .and_then(Self::parse)
            .unwrap_or_default()
    }
}

impl std::fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Total hash iterations performed for a difficulty
pub fn total_iterations(difficulty: u32) -> u64 {
    difficulty as u64 * ITERATIONS_PER_CYCLE
}

/// Lenient difficulty parsing: integers, floats (truncated), numeric strings
/// and booleans are accepted; anything else becomes 1. Never below 1.
pub fn normalize_difficulty(value: Option<&Value>) -> u64 {
    let parsed: i64 = match value {
        Some(Value::Number(n)) => n
            .as_i64()
            .or_else(|| n.as_f64().map(|f| f.trunc() as i64))
            .unwrap_or(1),
        Some(Value::String(s)) => s.trim().parse::<i64>().unwrap_or(1),
        Some(Value::Bool(b)) => i64::from(*b),
        _ => 1,
    };
    parsed.max(1) as u64
}
