//! Drop reporting
//!
//! After every callback the renderer reports how many render tasks were
//! cancelled for missing their deadline. The count is 0 in steady state.
//!
//! The default hook logs a warning for non-zero counts. Hosts that must keep
//! logging off the audio thread can use [`drop_channel`] instead, which
//! forwards counts through a lock-free `rtrb` ring to a monitor thread.

/// Receives the per-callback drop count (audio thread)
pub trait DropHook: Send {
    fn on_drop_audio_worklets(&mut self, count: u32);
}

/// Logs a warning whenever renders were dropped
#[derive(Debug, Default, Clone, Copy)]
pub struct LogDropHook;

impl DropHook for LogDropHook {
    fn on_drop_audio_worklets(&mut self, count: u32) {
        if count > 0 {
            log::warn!("Dropped {} audio render task(s) past their deadline", count);
        }
    }
}

/// Closures work as hooks, e.g. for counting in tests
impl<F> DropHook for F
where
    F: FnMut(u32) + Send,
{
    fn on_drop_audio_worklets(&mut self, count: u32) {
        self(count)
    }
}

/// Capacity of the drop report ring (callbacks with drops)
pub const DROP_REPORT_CAPACITY: usize = 256;

/// Audio-side end of a drop report channel
pub struct ChannelDropHook {
    producer: rtrb::Producer<u32>,
    /// Drops that could not be pushed because the ring was full
    overflow: u32,
}

impl DropHook for ChannelDropHook {
    fn on_drop_audio_worklets(&mut self, count: u32) {
        if count == 0 {
            return;
        }
        let pending = self.overflow.saturating_add(count);
        match self.producer.push(pending) {
            Ok(()) => self.overflow = 0,
            Err(rtrb::PushError::Full(value)) => self.overflow = value,
        }
    }
}

/// Monitor-side end of a drop report channel
pub struct DropReceiver {
    consumer: rtrb::Consumer<u32>,
    total: u64,
}

impl DropReceiver {
    /// Drain pending reports; returns the drops reported since the last call
    pub fn drain(&mut self) -> u64 {
        let mut drained = 0u64;
        while let Ok(count) = self.consumer.pop() {
            drained += count as u64;
        }
        self.total += drained;
        drained
    }

    /// Drops received over the channel's lifetime
    pub fn total(&self) -> u64 {
        self.total
    }
}

/// Create a drop report channel: (hook for the renderer, receiver for the host)
pub fn drop_channel() -> (ChannelDropHook, DropReceiver) {
    let (producer, consumer) = rtrb::RingBuffer::new(DROP_REPORT_CAPACITY);
    (
        ChannelDropHook {
            producer,
            overflow: 0,
        },
        DropReceiver { consumer, total: 0 },
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_skips_zero_counts() {
        let (mut hook, mut receiver) = drop_channel();
        hook.on_drop_audio_worklets(0);
        hook.on_drop_audio_worklets(2);
        hook.on_drop_audio_worklets(0);
        hook.on_drop_audio_worklets(1);

        assert_eq!(receiver.drain(), 3);
        assert_eq!(receiver.drain(), 0);
        assert_eq!(receiver.total(), 3);
    }

    #[test]
    fn test_channel_carries_overflow() {
        let (mut hook, mut receiver) = drop_channel();
        for _ in 0..DROP_REPORT_CAPACITY + 10 {
            hook.on_drop_audio_worklets(1);
        }
        assert_eq!(receiver.drain(), DROP_REPORT_CAPACITY as u64);

        hook.on_drop_audio_worklets(1);
        assert_eq!(receiver.drain(), 11);
    }

    #[test]
    fn test_closure_hook() {
        let mut seen = Vec::new();
        {
            let mut hook = |count: u32| seen.push(count);
            hook.on_drop_audio_worklets(4);
        }
        assert_eq!(seen, vec![4]);
    }
}
