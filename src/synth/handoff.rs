//! Lock-free handoff of parameter snapshots from the control thread to the
//! audio thread.

use log::debug;
use rtrb::{Consumer, Producer, PushError, RingBuffer};

use crate::synth::params::ParameterSnapshot;

/// Create a connected publisher/receiver pair holding up to `capacity`
/// snapshots in flight.
pub fn snapshot_channel(capacity: usize) -> (ParamPublisher, ParamReceiver) {
    let (producer, consumer) = RingBuffer::new(capacity.max(1));
    (
        ParamPublisher {
            producer,
            pending: None,
        },
        ParamReceiver { consumer },
    )
}

/// Control-thread end. Never blocks.
pub struct ParamPublisher {
    producer: Producer<ParameterSnapshot>,
    pending: Option<ParameterSnapshot>,
}

impl ParamPublisher {
    /// Queue `snapshot`. If the ring is full it is held back and retried on
    /// the next `publish` or `flush`; an older held-back snapshot is dropped.
    pub fn publish(&mut self, snapshot: ParameterSnapshot) -> bool {
        self.pending = Some(snapshot);
        self.flush()
    }

    /// Retry a held-back snapshot. Returns true once nothing is pending.
    pub fn flush(&mut self) -> bool {
        let Some(snapshot) = self.pending.take() else {
            return true;
        };

        match self.producer.push(snapshot) {
            Ok(()) => true,
            Err(PushError::Full(snapshot)) => {
                debug!("snapshot ring full, holding latest snapshot back");
                self.pending = Some(snapshot);
                false
            }
        }
    }

    pub fn has_pending(&self) -> bool {
        self.pending.is_some()
    }

    /// True once the receiver has been dropped.
    pub fn is_abandoned(&self) -> bool {
        self.producer.is_abandoned()
    }
}

/// Audio-thread end.
pub struct ParamReceiver {
    consumer: Consumer<ParameterSnapshot>,
}

impl ParamReceiver {
    /// Drain the ring and return the newest snapshot, if any arrived.
    ///
    /// Call once per block before rendering; older snapshots are skipped.
    #[inline]
    pub fn latest(&mut self) -> Option<ParameterSnapshot> {
        let mut newest = None;
        while let Ok(snapshot) = self.consumer.pop() {
            newest = Some(snapshot);
        }
        newest
    }
}
