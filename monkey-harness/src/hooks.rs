//! Pre-send interceptors for outbound traffic.
//!
//! Hooks run synchronously on the sender's send path, before the payload
//! reaches the network layer. A slow hook delays all outbound traffic from its
//! node; hooks are expected to be fast and non-blocking. Reordering is
//! emulated by sleeping inside a hook.
//!
//! Each hook kind holds an ordered chain. `set_*` swaps in a chain containing
//! only the new hook, so the previous hooks are never invoked again.
//! `push_*` appends to the chain so several fault injectors compose.

use monkey_core::{MessageBatch, StreamChunk};
use parking_lot::RwLock;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Outcome of running one hook over a payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HookVerdict<T> {
    /// Forward the payload unchanged
    Pass,
    /// Do not send the payload
    Drop,
    /// Forward this payload instead
    Replace(T),
}

pub type Hook<T> = Arc<dyn Fn(&T) -> HookVerdict<T> + Send + Sync>;
pub type MessageBatchHook = Hook<MessageBatch>;
pub type StreamChunkHook = Hook<StreamChunk>;

struct HookChain<T> {
    hooks: RwLock<Arc<[Hook<T>]>>,
    dropped: AtomicU64,
    replaced: AtomicU64,
}

impl<T> HookChain<T> {
    fn new() -> Self {
        Self {
            hooks: RwLock::new(Arc::from(Vec::new())),
            dropped: AtomicU64::new(0),
            replaced: AtomicU64::new(0),
        }
    }

    fn set(&self, hook: Hook<T>) {
        *self.hooks.write() = Arc::from(vec![hook]);
    }

    fn push(&self, hook: Hook<T>) {
        let mut hooks = self.hooks.write();
        let mut chain = hooks.to_vec();
        chain.push(hook);
        *hooks = Arc::from(chain);
    }

    fn clear(&self) {
        *self.hooks.write() = Arc::from(Vec::new());
    }

    fn len(&self) -> usize {
        self.hooks.read().len()
    }

    fn apply(&self, payload: T) -> Option<T> {
        // hooks run outside the lock; a concurrent swap is seen by the next send
        let chain = self.hooks.read().clone();
        let mut current = payload;
        for hook in chain.iter() {
            match hook(&current) {
                HookVerdict::Pass => {}
                HookVerdict::Drop => {
                    self.dropped.fetch_add(1, Ordering::Relaxed);
                    return None;
                }
                HookVerdict::Replace(replacement) => {
                    self.replaced.fetch_add(1, Ordering::Relaxed);
                    current = replacement;
                }
            }
        }
        Some(current)
    }
}

/// Counters of hook verdicts, for test assertions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct HookStats {
    pub batches_dropped: u64,
    pub batches_replaced: u64,
    pub chunks_dropped: u64,
    pub chunks_replaced: u64,
}

/// Interceptors for message batches and snapshot stream chunks of one node.
///
/// With nothing registered every payload passes through unchanged.
pub struct TrafficHooks {
    message_batch: HookChain<MessageBatch>,
    stream_chunk: HookChain<StreamChunk>,
}

impl Default for TrafficHooks {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TrafficHooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TrafficHooks")
            .field("message_batch_hooks", &self.message_batch.len())
            .field("stream_chunk_hooks", &self.stream_chunk.len())
            .finish()
    }
}

impl TrafficHooks {
    pub fn new() -> Self {
        Self {
            message_batch: HookChain::new(),
            stream_chunk: HookChain::new(),
        }
    }

    /// Replaces every message batch hook with `hook`.
    pub fn set_message_batch_hook<F>(&self, hook: F)
    where
        F: Fn(&MessageBatch) -> HookVerdict<MessageBatch> + Send + Sync + 'static,
    {
        self.message_batch.set(Arc::new(hook));
        debug!("message batch hook replaced");
    }

    /// Replaces every stream chunk hook with `hook`.
    pub fn set_stream_chunk_hook<F>(&self, hook: F)
    where
        F: Fn(&StreamChunk) -> HookVerdict<StreamChunk> + Send + Sync + 'static,
    {
        self.stream_chunk.set(Arc::new(hook));
        debug!("stream chunk hook replaced");
    }

    /// Appends `hook` to the message batch chain.
    pub fn push_message_batch_interceptor<F>(&self, hook: F)
    where
        F: Fn(&MessageBatch) -> HookVerdict<MessageBatch> + Send + Sync + 'static,
    {
        self.message_batch.push(Arc::new(hook));
    }

    /// Appends `hook` to the stream chunk chain.
    pub fn push_stream_chunk_interceptor<F>(&self, hook: F)
    where
        F: Fn(&StreamChunk) -> HookVerdict<StreamChunk> + Send + Sync + 'static,
    {
        self.stream_chunk.push(Arc::new(hook));
    }

    pub fn clear_message_batch_hooks(&self) {
        self.message_batch.clear();
    }

    pub fn clear_stream_chunk_hooks(&self) {
        self.stream_chunk.clear();
    }

    pub fn message_batch_hook_count(&self) -> usize {
        self.message_batch.len()
    }

    pub fn stream_chunk_hook_count(&self) -> usize {
        self.stream_chunk.len()
    }

    /// Runs the message batch chain. `None` means the batch must not be sent.
    pub fn apply_message_batch(&self, batch: MessageBatch) -> Option<MessageBatch> {
        self.message_batch.apply(batch)
    }

    /// Runs the stream chunk chain. `None` means the chunk must not be sent.
    pub fn apply_stream_chunk(&self, chunk: StreamChunk) -> Option<StreamChunk> {
        self.stream_chunk.apply(chunk)
    }

    pub fn stats(&self) -> HookStats {
        HookStats {
            batches_dropped: self.message_batch.dropped.load(Ordering::Relaxed),
            batches_replaced: self.message_batch.replaced.load(Ordering::Relaxed),
            chunks_dropped: self.stream_chunk.dropped.load(Ordering::Relaxed),
            chunks_replaced: self.stream_chunk.replaced.load(Ordering::Relaxed),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bytes::Bytes;
    use monkey_core::{GroupId, Message, MessageKind, ReplicaId};
    use std::sync::atomic::AtomicUsize;

    fn batch(messages: usize) -> MessageBatch {
        let message = Message::new(
            MessageKind::Heartbeat,
            GroupId(1),
            ReplicaId(1),
            ReplicaId(2),
        );
        MessageBatch::new("node-1", vec![message; messages])
    }

    fn chunk() -> StreamChunk {
        StreamChunk::new(
            GroupId(1),
            ReplicaId(1),
            ReplicaId(2),
            10,
            1,
            0,
            1,
            Bytes::from_static(b"data"),
        )
    }

    #[test]
    fn test_no_hook_passes_through() {
        let hooks = TrafficHooks::new();
        assert_eq!(hooks.apply_message_batch(batch(2)), Some(batch(2)));
        assert_eq!(hooks.apply_stream_chunk(chunk()), Some(chunk()));
    }

    #[test]
    fn test_set_replaces_previous_hook() {
        let hooks = TrafficHooks::new();
        let a_calls = Arc::new(AtomicUsize::new(0));
        let b_calls = Arc::new(AtomicUsize::new(0));

        let a = a_calls.clone();
        hooks.set_message_batch_hook(move |_| {
            a.fetch_add(1, Ordering::SeqCst);
            HookVerdict::Drop
        });
        assert_eq!(hooks.apply_message_batch(batch(1)), None);

        let b = b_calls.clone();
        hooks.set_message_batch_hook(move |_| {
            b.fetch_add(1, Ordering::SeqCst);
            HookVerdict::Pass
        });
        for _ in 0..5 {
            assert!(hooks.apply_message_batch(batch(1)).is_some());
        }

        assert_eq!(a_calls.load(Ordering::SeqCst), 1);
        assert_eq!(b_calls.load(Ordering::SeqCst), 5);
        assert_eq!(hooks.message_batch_hook_count(), 1);
    }

    #[test]
    fn test_replace_forwards_mutated_payload() {
        let hooks = TrafficHooks::new();
        hooks.set_message_batch_hook(|b| {
            let mut trimmed = b.clone();
            trimmed.messages.truncate(1);
            HookVerdict::Replace(trimmed)
        });

        let out = hooks.apply_message_batch(batch(3)).unwrap();
        assert_eq!(out.len(), 1);
        assert_eq!(hooks.stats().batches_replaced, 1);
    }

    #[test]
    fn test_chain_composes_in_order_and_drop_short_circuits() {
        let hooks = TrafficHooks::new();
        let reached_last = Arc::new(AtomicUsize::new(0));

        hooks.push_stream_chunk_interceptor(|c| {
            let mut corrupted = c.clone();
            corrupted.data = Bytes::from_static(b"evil");
            HookVerdict::Replace(corrupted)
        });
        hooks.push_stream_chunk_interceptor(|c| {
            if c.data == Bytes::from_static(b"evil") {
                HookVerdict::Drop
            } else {
                HookVerdict::Pass
            }
        });
        let reached = reached_last.clone();
        hooks.push_stream_chunk_interceptor(move |_| {
            reached.fetch_add(1, Ordering::SeqCst);
            HookVerdict::Pass
        });

        assert_eq!(hooks.apply_stream_chunk(chunk()), None);
        assert_eq!(reached_last.load(Ordering::SeqCst), 0);
        assert_eq!(hooks.stats().chunks_dropped, 1);

        hooks.clear_stream_chunk_hooks();
        assert_eq!(hooks.apply_stream_chunk(chunk()), Some(chunk()));
    }

    #[test]
    fn test_hook_kinds_are_independent() {
        let hooks = TrafficHooks::new();
        hooks.set_stream_chunk_hook(|_| HookVerdict::Drop);

        assert!(hooks.apply_message_batch(batch(1)).is_some());
        assert!(hooks.apply_stream_chunk(chunk()).is_none());
    }

    #[test]
    fn test_swap_during_concurrent_sends() {
        let hooks = Arc::new(TrafficHooks::new());
        hooks.set_message_batch_hook(|_| HookVerdict::Pass);

        let senders: Vec<_> = (0..4)
            .map(|_| {
                let hooks = hooks.clone();
                std::thread::spawn(move || {
                    for _ in 0..1_000 {
                        // either verdict is fine, a torn chain is not
                        let _ = hooks.apply_message_batch(batch(1));
                    }
                })
            })
            .collect();
        for _ in 0..100 {
            hooks.set_message_batch_hook(|_| HookVerdict::Drop);
            hooks.set_message_batch_hook(|_| HookVerdict::Pass);
        }
        for sender in senders {
            sender.join().unwrap();
        }
        assert_eq!(hooks.message_batch_hook_count(), 1);
    }
}
