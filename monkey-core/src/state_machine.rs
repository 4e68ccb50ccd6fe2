use crate::hashing::Hasher64;
use crate::{MonkeyError, Result};
use bytes::Bytes;
use std::collections::BTreeMap;

/// Replicated state machine of the system under test.
///
/// `digest` is the state machine's own hash function. State machines that do
/// not support hashing return an error, which the harness treats as fatal.
pub trait StateMachine: Send + 'static {
    fn apply(&mut self, cmd: &[u8]) -> Result<Bytes>;

    /// Read-only query served through the read-index path.
    fn lookup(&self, query: &[u8]) -> Result<Bytes>;

    fn digest(&self) -> Result<u64>;

    fn save_snapshot(&self) -> Result<Vec<u8>>;

    fn recover_from_snapshot(&mut self, data: &[u8]) -> Result<()>;
}

/// Key-value state machine understanding `SET k v`, `GET k` and `DEL k`.
#[derive(Debug, Clone, Default)]
pub struct KvStateMachine {
    pub state: BTreeMap<String, Bytes>,
    pub version: u64,
}

impl KvStateMachine {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateMachine for KvStateMachine {
    fn apply(&mut self, cmd: &[u8]) -> Result<Bytes> {
        let command_str = String::from_utf8_lossy(cmd);
        let parts: Vec<&str> = command_str.split_whitespace().collect();

        match parts.as_slice() {
            ["SET", key, value] => {
                self.state
                    .insert(key.to_string(), Bytes::copy_from_slice(value.as_bytes()));
                self.version += 1;
                Ok(Bytes::from("OK"))
            }
            ["GET", key] => Ok(self
                .state
                .get(*key)
                .cloned()
                .unwrap_or_else(|| Bytes::from("NOT_FOUND"))),
            ["DEL", key] => match self.state.remove(*key) {
                Some(_) => {
                    self.version += 1;
                    Ok(Bytes::from("OK"))
                }
                None => Ok(Bytes::from("NOT_FOUND")),
            },
            [] => Ok(Bytes::from("ERROR: Empty command")),
            _ => Ok(Bytes::from("ERROR: Invalid command")),
        }
    }

    fn lookup(&self, query: &[u8]) -> Result<Bytes> {
        let key = String::from_utf8_lossy(query);
        Ok(self
            .state
            .get(key.trim())
            .cloned()
            .unwrap_or_else(|| Bytes::from("NOT_FOUND")))
    }

    fn digest(&self) -> Result<u64> {
        let mut hasher = Hasher64::new();
        hasher.write_u64(self.state.len() as u64);
        for (key, value) in &self.state {
            hasher.write_str(key);
            hasher.write_bytes(value);
        }
        Ok(hasher.finish())
    }

    fn save_snapshot(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(&(self.version, &self.state))?)
    }

    fn recover_from_snapshot(&mut self, data: &[u8]) -> Result<()> {
        let (version, state): (u64, BTreeMap<String, Bytes>) = bincode::deserialize(data)
            .map_err(|e| MonkeyError::snapshot(format!("corrupted kv snapshot: {}", e)))?;
        self.version = version;
        self.state = state;
        Ok(())
    }
}
