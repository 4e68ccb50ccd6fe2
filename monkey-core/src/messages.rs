use crate::{Entry, GroupId, ReplicaId};
use bytes::Bytes;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MessageKind {
    Replicate,
    ReplicateAck,
    Heartbeat,
    HeartbeatAck,
    SnapshotReceived,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Message {
    pub kind: MessageKind,
    pub group_id: GroupId,
    pub from: ReplicaId,
    pub to: ReplicaId,
    pub term: u64,
    /// Index of the entry preceding `entries`, or the acknowledged index.
    pub log_index: u64,
    pub log_term: u64,
    pub commit: u64,
    pub entries: Vec<Entry>,
}

impl Message {
    pub fn new(kind: MessageKind, group_id: GroupId, from: ReplicaId, to: ReplicaId) -> Self {
        Self {
            kind,
            group_id,
            from,
            to,
            term: 0,
            log_index: 0,
            log_term: 0,
            commit: 0,
            entries: Vec::new(),
        }
    }

    pub fn replicate(
        group_id: GroupId,
        from: ReplicaId,
        to: ReplicaId,
        term: u64,
        prev: (u64, u64),
        commit: u64,
        entries: Vec<Entry>,
    ) -> Self {
        Self {
            term,
            log_index: prev.0,
            log_term: prev.1,
            commit,
            entries,
            ..Self::new(MessageKind::Replicate, group_id, from, to)
        }
    }

    pub fn ack(group_id: GroupId, from: ReplicaId, to: ReplicaId, term: u64, index: u64) -> Self {
        Self {
            term,
            log_index: index,
            ..Self::new(MessageKind::ReplicateAck, group_id, from, to)
        }
    }
}

/// Messages headed to one target address, sent as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageBatch {
    pub source_address: String,
    pub messages: Vec<Message>,
}

impl MessageBatch {
    pub fn new(source_address: impl Into<String>, messages: Vec<Message>) -> Self {
        Self {
            source_address: source_address.into(),
            messages,
        }
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn entry_count(&self) -> usize {
        self.messages.iter().map(|m| m.entries.len()).sum()
    }
}

/// One chunk of a snapshot stream.
///
/// Every chunk carries a CRC32 of its data so the receiving side can detect
/// payloads mutated in flight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamChunk {
    pub group_id: GroupId,
    pub from: ReplicaId,
    pub to: ReplicaId,
    /// Log index covered by the snapshot.
    pub index: u64,
    pub term: u64,
    pub chunk_id: u64,
    pub chunk_count: u64,
    pub data: Bytes,
    pub checksum: u32,
}

impl StreamChunk {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        group_id: GroupId,
        from: ReplicaId,
        to: ReplicaId,
        index: u64,
        term: u64,
        chunk_id: u64,
        chunk_count: u64,
        data: impl Into<Bytes>,
    ) -> Self {
        let data = data.into();
        let checksum = crc32fast::hash(&data);
        Self {
            group_id,
            from,
            to,
            index,
            term,
            chunk_id,
            chunk_count,
            data,
            checksum,
        }
    }

    pub fn verify_checksum(&self) -> bool {
        crc32fast::hash(&self.data) == self.checksum
    }

    pub fn is_last(&self) -> bool {
        self.chunk_id + 1 == self.chunk_count
    }
}

/// Splits snapshot bytes into checksummed stream chunks.
///
/// An empty payload still produces one (empty) chunk so the receiver learns
/// about the snapshot.
pub fn split_snapshot(
    group_id: GroupId,
    from: ReplicaId,
    to: ReplicaId,
    index: u64,
    term: u64,
    data: &[u8],
    chunk_size: usize,
) -> Vec<StreamChunk> {
    let chunk_size = chunk_size.max(1);
    let pieces: Vec<&[u8]> = if data.is_empty() {
        vec![data]
    } else {
        data.chunks(chunk_size).collect()
    };
    let chunk_count = pieces.len() as u64;
    pieces
        .into_iter()
        .enumerate()
        .map(|(i, piece)| {
            StreamChunk::new(
                group_id,
                from,
                to,
                index,
                term,
                i as u64,
                chunk_count,
                Bytes::copy_from_slice(piece),
            )
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_snapshot_chunk_layout() {
        let data = vec![7u8; 250];
        let chunks = split_snapshot(GroupId(1), ReplicaId(1), ReplicaId(2), 40, 1, &data, 100);

        assert_eq!(chunks.len(), 3);
        assert!(chunks.iter().all(|c| c.chunk_count == 3 && c.index == 40));
        assert_eq!(chunks[2].data.len(), 50);
        assert!(chunks[2].is_last());
        assert!(chunks.iter().all(StreamChunk::verify_checksum));
    }

    #[test]
    fn test_corrupted_chunk_fails_checksum() {
        let mut chunk = StreamChunk::new(
            GroupId(1),
            ReplicaId(1),
            ReplicaId(2),
            1,
            1,
            0,
            1,
            Bytes::from_static(b"snapshot"),
        );
        chunk.data = Bytes::from_static(b"snapsh0t");
        assert!(!chunk.verify_checksum());
    }

    #[test]
    fn test_empty_snapshot_still_has_one_chunk() {
        let chunks = split_snapshot(GroupId(1), ReplicaId(1), ReplicaId(2), 0, 0, &[], 16);
        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].is_last());
    }
}
