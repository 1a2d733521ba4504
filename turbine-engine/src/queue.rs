//! Three-band FIFO wait queue for worker acquisition

use std::collections::VecDeque;
use tokio::sync::oneshot;

use crate::descriptor::Priority;
use crate::pool::Acquisition;

/// A waiter blocked because no worker was available
pub(crate) struct QueuedTask {
    pub resolver: oneshot::Sender<Acquisition>,
}

/// Bounded-by-caller wait queue with strict band priority
///
/// FIFO within a band; every `high` waiter dequeues before any `normal`,
/// every `normal` before any `low`. Deadlines are not enforced here.
#[derive(Default)]
pub(crate) struct WaitQueue {
    high: VecDeque<QueuedTask>,
    normal: VecDeque<QueuedTask>,
    low: VecDeque<QueuedTask>,
}

impl WaitQueue {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enqueue(&mut self, task: QueuedTask, priority: Priority) {
        match priority {
            Priority::High => self.high.push_back(task),
            Priority::Normal => self.normal.push_back(task),
            Priority::Low => self.low.push_back(task),
        }
    }

    /// Pop from the first non-empty band in priority order
    pub fn dequeue_highest(&mut self) -> Option<QueuedTask> {
        self.high
            .pop_front()
            .or_else(|| self.normal.pop_front())
            .or_else(|| self.low.pop_front())
    }

    pub fn len(&self) -> usize {
        self.high.len() + self.normal.len() + self.low.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every waiter; their acquisition futures resolve as closed
    pub fn clear(&mut self) {
        self.high.clear();
        self.normal.clear();
        self.low.clear();
    }
}
