//! Queued-closure actors.
//!
//! An actor owns some state on a thread of its own. Other threads never touch
//! that state directly; they hand the actor a closure through its [`Mailbox`]
//! and the actor runs closures one at a time, in the order they arrived.

use crate::error::EnqueueError;
use crossbeam_channel::{Receiver, Sender};
use std::io;

pub type Task<T> = Box<dyn FnOnce(&mut T) + Send>;

/// Handle for sending work to an actor owning a `T`.
pub struct Mailbox<T> {
    tx: Sender<Task<T>>,
}
impl<T> Clone for Mailbox<T> {
    fn clone(&self) -> Self {
        Self { tx: self.tx.clone() }
    }
}
impl<T> std::fmt::Debug for Mailbox<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Mailbox").field("queued", &self.tx.len()).finish()
    }
}
impl<T> Mailbox<T> {
    pub fn bounded(capacity: usize) -> (Self, Receiver<Task<T>>) {
        let (tx, rx) = crossbeam_channel::bounded(capacity);
        (Self { tx }, rx)
    }
    /// Queues `f`, waiting for room if the queue is full.
    ///
    /// Must not be called from inside one of this actor's own tasks with a
    /// full queue, the actor would be waiting on itself.
    pub fn enqueue(&self, f: impl FnOnce(&mut T) + Send + 'static) -> Result<(), EnqueueError> {
        Ok(self.tx.send(Box::new(f))?)
    }
    /// Queues `f` only if that can be done without waiting.
    pub fn try_enqueue(&self, f: impl FnOnce(&mut T) + Send + 'static) -> Result<(), EnqueueError> {
        Ok(self.tx.try_send(Box::new(f))?)
    }
}

/// Runs queued tasks against `state` until every [`Mailbox`] is gone.
pub fn run<T>(mut state: T, tasks: Receiver<Task<T>>) -> T {
    while let Ok(task) = tasks.recv() {
        task(&mut state);
    }
    state
}

/// Moves `state` onto a new named thread and returns its mailbox.
pub fn spawn<T: Send + 'static>(name: String, state: T, capacity: usize) -> io::Result<Mailbox<T>> {
    let (mailbox, tasks) = Mailbox::bounded(capacity);
    std::thread::Builder::new().name(name.clone()).spawn(move || {
        run(state, tasks);
        log::trace!("actor {name} stopped");
    })?;
    Ok(mailbox)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn tasks_run_in_enqueue_order() {
        let (mailbox, tasks) = Mailbox::<Vec<u32>>::bounded(16);
        for i in 0..10 {
            mailbox.enqueue(move |log| log.push(i)).unwrap();
        }
        drop(mailbox);
        assert_eq!(run(vec![], tasks), (0..10).collect::<Vec<_>>());
    }

    #[test]
    fn tasks_from_many_threads_never_overlap() {
        let busy = Arc::new(AtomicUsize::new(0));
        let (done_tx, done_rx) = crossbeam_channel::unbounded();
        let mailbox = spawn("overlap".into(), Vec::<(usize, u32)>::new(), 4).unwrap();

        let producers: Vec<_> = (0..4)
            .map(|producer| {
                let mailbox = mailbox.clone();
                let busy = busy.clone();
                std::thread::spawn(move || {
                    for i in 0..50 {
                        let busy = busy.clone();
                        mailbox
                            .enqueue(move |seen| {
                                assert_eq!(busy.fetch_add(1, Ordering::SeqCst), 0);
                                seen.push((producer, i));
                                busy.fetch_sub(1, Ordering::SeqCst);
                            })
                            .unwrap();
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }
        mailbox
            .enqueue(move |seen| done_tx.send(seen.clone()).unwrap())
            .unwrap();
        let seen = done_rx.recv().unwrap();

        assert_eq!(seen.len(), 200);
        for producer in 0..4 {
            let order: Vec<u32> = seen.iter().filter(|s| s.0 == producer).map(|s| s.1).collect();
            assert_eq!(order, (0..50).collect::<Vec<_>>());
        }
    }

    #[test]
    fn try_enqueue_reports_full_then_closed() {
        let (mailbox, tasks) = Mailbox::<()>::bounded(1);
        mailbox.try_enqueue(|_| {}).unwrap();
        assert_eq!(mailbox.try_enqueue(|_| {}), Err(EnqueueError::Full));
        drop(tasks);
        assert_eq!(mailbox.enqueue(|_| {}), Err(EnqueueError::Closed));
    }
}
