use crate::ClientId;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

/// Per-client record used to deduplicate retried proposals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    pub client_id: ClientId,
    pub responded_up_to: u64,
    pub history: BTreeMap<u64, Bytes>,
}

impl Session {
    pub fn new(client_id: ClientId) -> Self {
        Self {
            client_id,
            responded_up_to: 0,
            history: BTreeMap::new(),
        }
    }

    /// Drops results the client has acknowledged.
    pub fn clear_to(&mut self, responded_to: u64) {
        if responded_to <= self.responded_up_to {
            return;
        }
        self.responded_up_to = responded_to;
        match responded_to.checked_add(1) {
            Some(first_kept) => self.history = self.history.split_off(&first_kept),
            None => self.history.clear(),
        }
    }
}

/// In-memory client session table of a replica.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionTable {
    pub sessions: HashMap<ClientId, Session>,
}

impl SessionTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, client_id: ClientId) -> &mut Session {
        self.sessions
            .entry(client_id)
            .or_insert_with(|| Session::new(client_id))
    }

    pub fn unregister(&mut self, client_id: ClientId) -> Option<Session> {
        self.sessions.remove(&client_id)
    }

    pub fn get(&self, client_id: ClientId) -> Option<&Session> {
        self.sessions.get(&client_id)
    }

    /// Result of an already applied proposal, if `series_id` was seen before.
    ///
    /// Series at or below `responded_up_to` count as applied even though
    /// their results were cleared.
    pub fn applied_result(&self, client_id: ClientId, series_id: u64) -> Option<Option<&Bytes>> {
        let session = self.sessions.get(&client_id)?;
        if series_id <= session.responded_up_to {
            return Some(None);
        }
        session.history.get(&series_id).map(Some)
    }

    pub fn record(&mut self, client_id: ClientId, series_id: u64, result: Bytes) {
        self.register(client_id).history.insert(series_id, result);
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}
