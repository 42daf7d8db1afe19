// This is free and unencumbered software released into the public domain.

//! Ordered single-worker task queues.
//!
//! A queue owns one named thread and runs tasks in submission order. Many
//! producers may submit concurrently; only the worker ever runs them.
//! The channel is unbounded; submission only waits out a concurrent
//! shutdown, so a task accepted by `submit` always runs.

use crate::shared::CameraError;
use std::{
    sync::{
        Arc, RwLock,
        mpsc::{Sender, channel},
    },
    thread::{JoinHandle, ThreadId},
};
use tracing::{debug, trace};

pub type Task = Box<dyn FnOnce() + Send + 'static>;

enum QueueMsg {
    Run(Task),
    Stop,
}

/// Cloneable submission side of a [`TaskQueue`].
#[derive(Clone)]
pub struct QueueHandle {
    name: &'static str,
    tx: Sender<QueueMsg>,
    closed: Arc<RwLock<bool>>,
}

impl core::fmt::Debug for QueueHandle {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("QueueHandle")
            .field("name", &self.name)
            .field("closed", &self.is_closed())
            .finish()
    }
}

impl QueueHandle {
    pub fn name(&self) -> &'static str {
        self.name
    }

    pub fn is_closed(&self) -> bool {
        *self.closed.read().unwrap_or_else(|p| p.into_inner())
    }

    /// Enqueues `task`. Returns `false` if the queue has shut down, in which
    /// case the task is dropped without running.
    pub fn submit(&self, task: impl FnOnce() + Send + 'static) -> bool {
        // Held across the send so `Stop` cannot slip in ahead of the task.
        let closed = self.closed.read().unwrap_or_else(|p| p.into_inner());
        if *closed {
            trace!(queue = self.name, "submit after shutdown");
            return false;
        }
        self.tx.send(QueueMsg::Run(Box::new(task))).is_ok()
    }
}

pub struct TaskQueue {
    handle: QueueHandle,
    worker: Option<ThreadId>,
    join: Option<JoinHandle<()>>,
}

impl core::fmt::Debug for TaskQueue {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TaskQueue")
            .field("name", &self.handle.name)
            .field("running", &self.join.is_some())
            .finish()
    }
}

impl TaskQueue {
    pub fn spawn(name: &'static str) -> Result<Self, CameraError> {
        let (tx, rx) = channel::<QueueMsg>();
        let closed = Arc::new(RwLock::new(false));

        let join = std::thread::Builder::new()
            .name(name.to_string())
            .spawn(move || {
                debug!(queue = name, "worker started");
                // Tasks enqueued before `Stop` still run; anything queued
                // after it is dropped along with the receiver.
                while let Ok(msg) = rx.recv() {
                    match msg {
                        QueueMsg::Run(task) => task(),
                        QueueMsg::Stop => break,
                    }
                }
                debug!(queue = name, "worker stopped");
            })
            .map_err(|e| CameraError::driver("spawning task queue worker", e))?;

        Ok(Self {
            handle: QueueHandle { name, tx, closed },
            worker: Some(join.thread().id()),
            join: Some(join),
        })
    }

    pub fn name(&self) -> &'static str {
        self.handle.name
    }

    pub fn handle(&self) -> QueueHandle {
        self.handle.clone()
    }

    pub fn submit(&self, task: impl FnOnce() + Send + 'static) -> bool {
        self.handle.submit(task)
    }

    /// Runs every task submitted so far, then stops the worker. Idempotent.
    pub fn shutdown(&mut self) {
        {
            let mut closed = self.handle.closed.write().unwrap_or_else(|p| p.into_inner());
            if *closed {
                return;
            }
            *closed = true;
            let _ = self.handle.tx.send(QueueMsg::Stop);
        }
        if let Some(join) = self.join.take() {
            if Some(std::thread::current().id()) == self.worker {
                // Called from one of our own tasks: the loop exits on `Stop`.
                return;
            }
            let _ = join.join();
        }
    }
}

impl Drop for TaskQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}
