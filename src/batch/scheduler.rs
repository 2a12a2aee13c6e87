//! Priority-ordered dispatch queue shared by a batch's workers.

use std::cmp::Reverse;
use std::collections::VecDeque;
use std::sync::{Mutex, MutexGuard, PoisonError};

use super::types::BatchItem;

/// Hands out items highest priority first, ties in submission order.
///
/// The order is fixed at construction; workers pop from the front until the
/// queue is empty or the batch is drained on timeout.
#[derive(Debug)]
pub struct ItemScheduler {
    queue: Mutex<VecDeque<BatchItem>>,
}

impl ItemScheduler {
    pub fn new(mut items: Vec<BatchItem>) -> Self {
        items.sort_by_key(|item| (Reverse(item.priority), item.index));
        Self {
            queue: Mutex::new(items.into()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<BatchItem>> {
        self.queue.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Take the next item to dispatch.
    pub fn next(&self) -> Option<BatchItem> {
        self.lock().pop_front()
    }

    /// Remove and return everything not yet dispatched, in dispatch order.
    pub fn drain(&self) -> Vec<BatchItem> {
        self.lock().drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;

    fn item(index: usize, priority: i64) -> BatchItem {
        BatchItem {
            item_id: format!("i{index}"),
            index,
            content: String::new(),
            frameworks: vec![],
            metadata: Value::Null,
            priority,
        }
    }

    #[test]
    fn highest_priority_first_ties_by_index() {
        let scheduler = ItemScheduler::new(vec![
            item(0, 1),
            item(1, 5),
            item(2, 1),
            item(3, 5),
            item(4, -3),
        ]);
        let order: Vec<usize> = std::iter::from_fn(|| scheduler.next())
            .map(|item| item.index)
            .collect();
        assert_eq!(order, vec![1, 3, 0, 2, 4]);
    }

    #[test]
    fn drain_empties_queue() {
        let scheduler = ItemScheduler::new(vec![item(0, 0), item(1, 0), item(2, 0)]);
        scheduler.next();
        let rest = scheduler.drain();
        let order: Vec<usize> = rest.iter().map(|item| item.index).collect();
        assert_eq!(order, vec![1, 2]);
        assert!(scheduler.next().is_none());
        assert!(scheduler.drain().is_empty());
    }
}
