/*
    Copyright © 2023, ParallelChain Lab
    Licensed under the Apache License, Version 2.0: http://www.apache.org/licenses/LICENSE-2.0
*/

//! Cooperative shutdown shared by every component.
//!
//! Each worker loop polls a [`StopSignal`] at least once per poll interval. A component's
//! [`Stoppable::stop`] sets the signal, joins the component's own workers, and then stops the
//! layer it is built on. Layers of the same stack share one signal, so blocking calls anywhere in
//! the stack give up as soon as the top layer starts stopping.

use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc, Mutex,
    },
    thread::JoinHandle,
};

/// A cloneable handle to a shared stop flag.
#[derive(Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self(Arc::new(AtomicBool::new(false)))
    }

    /// Set the flag. Returns `true` if this call was the one that set it.
    pub fn set(&self) -> bool {
        !self.0.swap(true, Ordering::SeqCst)
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Implemented by every component that owns worker threads.
pub trait Stoppable {
    /// Stop the component and everything it is built on. Blocks until all owned workers have
    /// exited. Calling `stop` more than once has no further effect.
    ///
    /// Must not be called from inside a delivery callback, since the callback runs on one of the
    /// workers being joined.
    fn stop(&self);

    /// Whether `stop` has been requested on this component's signal.
    fn is_stopped(&self) -> bool;
}

/// The join handles of a component's workers, taken exactly once on shutdown.
#[derive(Default)]
pub(crate) struct Workers(Mutex<Vec<JoinHandle<()>>>);

impl Workers {
    pub(crate) fn new(handles: Vec<JoinHandle<()>>) -> Self {
        Self(Mutex::new(handles))
    }

    /// Join every worker that has not been joined yet. A worker that panicked is reported, not
    /// propagated, so that the remaining workers are still joined.
    pub(crate) fn join_all(&self) {
        let handles: Vec<JoinHandle<()>> = self
            .0
            .lock()
            .expect("worker handle lock poisoned")
            .drain(..)
            .collect();
        for handle in handles {
            if handle.join().is_err() {
                log::warn!("a worker thread panicked before shutdown");
            }
        }
    }
}
