use std::sync::{Arc, Mutex, MutexGuard};

/// Append-only queue of captured PCM frames.
///
/// The capture worker pushes; the controller drains once after the worker
/// has been joined or abandoned. Cloning yields another handle to the same
/// queue.
#[derive(Debug, Clone, Default)]
pub struct FrameQueue {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
}

impl FrameQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one frame.
    pub fn push(&self, frame: Vec<u8>) {
        self.lock().push(frame);
    }

    /// Take every queued frame in capture order, leaving the queue empty.
    pub fn drain(&self) -> Vec<Vec<u8>> {
        std::mem::take(&mut *self.lock())
    }

    /// Number of queued frames.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Total bytes across queued frames.
    pub fn total_bytes(&self) -> usize {
        self.lock().iter().map(Vec::len).sum()
    }

    // A panicking pusher cannot leave a half-written frame behind, so frames
    // in a poisoned queue are still valid.
    fn lock(&self) -> MutexGuard<'_, Vec<Vec<u8>>> {
        self.frames
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_preserves_order_once() {
        let queue = FrameQueue::new();
        for i in 0..5u8 {
            queue.push(vec![i; 4]);
        }
        assert_eq!(queue.len(), 5);
        assert_eq!(queue.total_bytes(), 20);

        let frames = queue.drain();
        let firsts: Vec<u8> = frames.iter().map(|f| f[0]).collect();
        assert_eq!(firsts, vec![0, 1, 2, 3, 4]);

        assert!(queue.is_empty());
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_clones_share_frames() {
        let queue = FrameQueue::new();
        let writer = queue.clone();
        writer.push(vec![7, 7]);
        assert_eq!(queue.drain(), vec![vec![7, 7]]);
        assert!(writer.is_empty());
    }

    #[test]
    fn test_push_from_other_thread() {
        let queue = FrameQueue::new();
        let writer = queue.clone();
        std::thread::spawn(move || {
            for i in 0..100u8 {
                writer.push(vec![i]);
            }
        })
        .join()
        .unwrap();

        let frames = queue.drain();
        assert_eq!(frames.len(), 100);
        assert!(frames.windows(2).all(|w| w[0][0] < w[1][0]));
    }

    #[test]
    fn test_empty_queue() {
        let queue = FrameQueue::default();
        assert!(queue.is_empty());
        assert_eq!(queue.total_bytes(), 0);
    }
}
