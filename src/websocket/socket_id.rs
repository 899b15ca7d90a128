//! Socket ID generation: `"<1..1e9>.<1..1e9>"` (§3, GLOSSARY).

use std::fmt;

use rand::Rng;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SocketId(String);

impl SocketId {
    pub fn generate() -> Self {
        let mut rng = rand::rng();
        let a: u32 = rng.random_range(1..1_000_000_000);
        let b: u32 = rng.random_range(1..1_000_000_000);
        Self(format!("{a}.{b}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SocketId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for SocketId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generates_two_dot_separated_integers() {
        let id = SocketId::generate();
        let parts: Vec<&str> = id.as_str().split('.').collect();
        assert_eq!(parts.len(), 2);
        for part in parts {
            let n: u64 = part.parse().expect("socket id segment is numeric");
            assert!(n >= 1 && n < 1_000_000_000);
        }
    }
}
