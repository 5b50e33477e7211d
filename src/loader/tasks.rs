//! Deferred values and the cooperative task queue.
//!
//! There is no parallelism anywhere in the loader: "asynchronous" means a
//! job parked on this queue until the host's event loop drains it. A
//! [`Promise`] is the explicit deferred-result cell both dynamic import and
//! top-level suspension are built from; suspension is "a callback parked on
//! a pending promise", resumption is "the promise settled, callbacks ran".

use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use log::warn;

use crate::loader::ds::error::LoadError;

type Job = Box<dyn FnOnce()>;

/// A FIFO of parked jobs, drained by the host between turns.
pub struct TaskQueue {
    jobs: RefCell<VecDeque<Job>>,
}

impl TaskQueue {
    pub fn new() -> Self {
        TaskQueue {
            jobs: RefCell::new(VecDeque::new()),
        }
    }

    pub fn enqueue(&self, job: impl FnOnce() + 'static) {
        self.jobs.borrow_mut().push_back(Box::new(job));
    }

    pub fn is_idle(&self) -> bool {
        self.jobs.borrow().is_empty()
    }

    /// Run jobs until the queue is empty, including jobs enqueued by the
    /// jobs themselves. Returns how many ran.
    pub fn run_until_idle(&self) -> usize {
        let mut ran = 0;
        loop {
            // Take one job at a time so a running job can enqueue more
            // without the queue being borrowed.
            let job = self.jobs.borrow_mut().pop_front();
            match job {
                Some(job) => {
                    job();
                    ran += 1;
                }
                None => return ran,
            }
        }
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new()
    }
}

enum PromiseState<T> {
    Pending(Vec<Box<dyn FnOnce(&Result<T, LoadError>)>>),
    Settled(Result<T, LoadError>),
}

/// A single-threaded deferred result. Settling runs all parked callbacks;
/// callbacks attached after settlement run immediately.
pub struct Promise<T> {
    inner: Rc<RefCell<PromiseState<T>>>,
}

impl<T> Clone for Promise<T> {
    fn clone(&self) -> Self {
        Promise {
            inner: self.inner.clone(),
        }
    }
}

impl<T: Clone> Promise<T> {
    pub fn pending() -> Self {
        Promise {
            inner: Rc::new(RefCell::new(PromiseState::Pending(Vec::new()))),
        }
    }

    pub fn resolved(value: T) -> Self {
        Promise {
            inner: Rc::new(RefCell::new(PromiseState::Settled(Ok(value)))),
        }
    }

    pub fn rejected(error: LoadError) -> Self {
        Promise {
            inner: Rc::new(RefCell::new(PromiseState::Settled(Err(error)))),
        }
    }

    pub fn resolve(&self, value: T) {
        self.settle(Ok(value));
    }

    pub fn reject(&self, error: LoadError) {
        self.settle(Err(error));
    }

    fn settle(&self, result: Result<T, LoadError>) {
        let callbacks = {
            let mut state = self.inner.borrow_mut();
            match &mut *state {
                PromiseState::Pending(callbacks) => {
                    let callbacks = std::mem::replace(callbacks, Vec::new());
                    *state = PromiseState::Settled(result.clone());
                    callbacks
                }
                PromiseState::Settled(_) => {
                    warn!("promise settled twice; second settlement ignored");
                    return;
                }
            }
        };
        // Borrow released before callbacks run: a callback may attach more
        // callbacks, query this promise, or settle other promises.
        for callback in callbacks {
            callback(&result);
        }
    }

    /// Attach a settlement callback. Runs immediately when already settled.
    pub fn when_settled(&self, callback: impl FnOnce(&Result<T, LoadError>) + 'static) {
        let mut unparked = Some(callback);
        {
            let mut state = self.inner.borrow_mut();
            if let PromiseState::Pending(callbacks) = &mut *state {
                if let Some(callback) = unparked.take() {
                    callbacks.push(Box::new(callback));
                }
            }
        }
        if let Some(callback) = unparked {
            let result = self.settled_result();
            if let Some(result) = result {
                callback(&result);
            }
        }
    }

    pub fn is_settled(&self) -> bool {
        matches!(&*self.inner.borrow(), PromiseState::Settled(_))
    }

    /// The settled result, or `None` while still pending.
    pub fn settled_result(&self) -> Option<Result<T, LoadError>> {
        match &*self.inner.borrow() {
            PromiseState::Settled(result) => Some(result.clone()),
            PromiseState::Pending(_) => None,
        }
    }
}

/// Drain the queue until `promise` settles. Used where the caller needs a
/// synchronous answer (top-level static loads of modules that suspend).
/// An idle queue with the promise still pending means the host never
/// scheduled the completion; that is reported rather than spun on.
pub fn await_settled<T: Clone>(
    promise: &Promise<T>,
    queue: &TaskQueue,
) -> Result<T, LoadError> {
    loop {
        if let Some(result) = promise.settled_result() {
            return result;
        }
        if queue.run_until_idle() == 0 {
            return Err(LoadError::evaluation(
                None,
                "deferred module load never completed (task queue is idle)",
            ));
        }
    }
}
