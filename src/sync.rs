#[cfg(feature = "loom")]
mod imp {
    pub(crate) use loom::{
        sync::{
            Arc, Condvar, Mutex, MutexGuard,
            atomic::{AtomicBool, AtomicU64, Ordering},
        },
        thread::yield_now,
    };

    /// Bounded MPSC channel with the subset of the `crossbeam-channel` API the
    /// crate uses, built on loom primitives so the handoff protocol can be
    /// model-checked. Reuses `crossbeam-channel`'s error types.
    pub(crate) mod channel {
        use super::{Arc, Condvar, Mutex};
        use core::time::Duration;
        pub(crate) use crossbeam_channel::{RecvError, SendTimeoutError, TrySendError};
        use std::collections::VecDeque;

        struct State<T> {
            items: VecDeque<T>,
            senders: usize,
            receiver_alive: bool,
        }

        struct Shared<T> {
            state: Mutex<State<T>>,
            not_empty: Condvar,
            not_full: Condvar,
            capacity: usize,
        }

        pub(crate) struct Sender<T>(Arc<Shared<T>>);
        pub(crate) struct Receiver<T>(Arc<Shared<T>>);

        pub(crate) fn bounded<T>(capacity: usize) -> (Sender<T>, Receiver<T>) {
            let shared = Arc::new(Shared {
                state: Mutex::new(State {
                    items: VecDeque::with_capacity(capacity),
                    senders: 1,
                    receiver_alive: true,
                }),
                not_empty: Condvar::new(),
                not_full: Condvar::new(),
                capacity,
            });
            (Sender(shared.clone()), Receiver(shared))
        }

        impl<T> Sender<T> {
            pub(crate) fn try_send(&self, item: T) -> Result<(), TrySendError<T>> {
                let mut state = self.0.state.lock().unwrap();
                if !state.receiver_alive {
                    return Err(TrySendError::Disconnected(item));
                }
                if state.items.len() == self.0.capacity {
                    return Err(TrySendError::Full(item));
                }
                state.items.push_back(item);
                self.0.not_empty.notify_one();
                Ok(())
            }

            /// Loom has no clock; the timeout is ignored and the send blocks.
            pub(crate) fn send_timeout(
                &self,
                item: T,
                _timeout: Duration,
            ) -> Result<(), SendTimeoutError<T>> {
                let mut state = self.0.state.lock().unwrap();
                loop {
                    if !state.receiver_alive {
                        return Err(SendTimeoutError::Disconnected(item));
                    }
                    if state.items.len() < self.0.capacity {
                        state.items.push_back(item);
                        self.0.not_empty.notify_one();
                        return Ok(());
                    }
                    state = self.0.not_full.wait(state).unwrap();
                }
            }

            pub(crate) fn send(&self, item: T) -> Result<(), crossbeam_channel::SendError<T>> {
                self.send_timeout(item, Duration::MAX).map_err(|err| {
                    crossbeam_channel::SendError(err.into_inner())
                })
            }
        }

        impl<T> Clone for Sender<T> {
            fn clone(&self) -> Self {
                self.0.state.lock().unwrap().senders += 1;
                Self(self.0.clone())
            }
        }

        impl<T> Drop for Sender<T> {
            fn drop(&mut self) {
                let mut state = self.0.state.lock().unwrap();
                state.senders -= 1;
                if state.senders == 0 {
                    self.0.not_empty.notify_all();
                }
            }
        }

        impl<T> Receiver<T> {
            pub(crate) fn recv(&self) -> Result<T, RecvError> {
                let mut state = self.0.state.lock().unwrap();
                loop {
                    if let Some(item) = state.items.pop_front() {
                        self.0.not_full.notify_one();
                        return Ok(item);
                    }
                    if state.senders == 0 {
                        return Err(RecvError);
                    }
                    state = self.0.not_empty.wait(state).unwrap();
                }
            }
        }

        impl<T> Drop for Receiver<T> {
            fn drop(&mut self) {
                self.0.state.lock().unwrap().receiver_alive = false;
                self.0.not_full.notify_all();
            }
        }
    }
}

#[cfg(not(feature = "loom"))]
mod imp {
    pub(crate) use crossbeam_channel as channel;
    pub(crate) use std::{
        sync::{
            Mutex, MutexGuard,
            atomic::{AtomicBool, AtomicU64, Ordering},
        },
        thread::yield_now,
    };
}

pub(crate) use imp::*;

/// Locks `mutex`, ignoring poisoning. A panic while holding the lock already
/// fails the run through the join that observed it.
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
}

/// Run-wide flag raised by the first fatal error so sibling subtrees stop
/// dispatching new work.
pub(crate) struct AbortFlag(AtomicBool);

impl AbortFlag {
    pub(crate) fn new() -> Self {
        Self(AtomicBool::new(false))
    }

    pub(crate) fn raise(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub(crate) fn is_raised(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}
