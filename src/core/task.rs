//! Execution contexts: a serial foreground queue, background spawning, and a
//! one-shot completion used to hand results between them.
//!
//! Nothing here supports cancellation. A unit of work runs to completion or
//! fails; dropping a `Resolver` without resolving reads as abandoned.

use futures::channel::{mpsc, oneshot};
use futures::executor::block_on;
use futures::{StreamExt, future};
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::task::{Context, Poll};
use std::thread::{self, JoinHandle};

pub type Job = Box<dyn FnOnce() + Send + 'static>;

/// Somewhere jobs run one at a time, in dispatch order.
pub trait Executor: Send + Sync {
    fn dispatch(&self, job: Job);
}

/// Foreground executor: one named thread draining an unbounded job channel.
pub struct SerialQueue {
    sender: Mutex<Option<mpsc::UnboundedSender<Job>>>,
    worker: Mutex<Option<JoinHandle<()>>>,
}

impl SerialQueue {
    pub fn new(name: &str) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::unbounded::<Job>();
        let worker = thread::Builder::new().name(name.to_string()).spawn(move || {
            block_on(receiver.for_each(|job| {
                job();
                future::ready(())
            }))
        })?;
        Ok(Self {
            sender: Mutex::new(Some(sender)),
            worker: Mutex::new(Some(worker)),
        })
    }

    /// Blocks until every job dispatched before this call has run.
    pub fn drain(&self) {
        let (resolver, completion) = completion();
        self.dispatch(Box::new(move || resolver.resolve(())));
        let _ = completion.wait();
    }

    /// Stops accepting jobs, runs what is queued, and joins the worker.
    pub fn shutdown(&self) {
        self.sender.lock().unwrap_or_else(|p| p.into_inner()).take();
        let worker = self.worker.lock().unwrap_or_else(|p| p.into_inner()).take();
        if let Some(worker) = worker {
            if worker.thread().id() != thread::current().id() {
                let _ = worker.join();
            }
        }
    }
}

impl Executor for SerialQueue {
    fn dispatch(&self, job: Job) {
        let sender = self.sender.lock().unwrap_or_else(|p| p.into_inner());
        match sender.as_ref() {
            Some(sender) => {
                if sender.unbounded_send(job).is_err() {
                    tracing::warn!("foreground queue worker is gone; job dropped");
                }
            }
            None => tracing::warn!("foreground queue is shut down; job dropped"),
        }
    }
}

impl Drop for SerialQueue {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Write side of a one-shot completion.
pub struct Resolver<T> {
    sender: oneshot::Sender<T>,
}

impl<T> Resolver<T> {
    pub fn resolve(self, value: T) {
        // The waiter may have given up; that is not an error for the producer.
        let _ = self.sender.send(value);
    }
}

/// Read side of a one-shot completion. Awaitable from async hosts, or
/// blocked on with [`Completion::wait`].
pub struct Completion<T> {
    receiver: oneshot::Receiver<T>,
}

impl<T> Completion<T> {
    /// `None` if the resolver was dropped unresolved.
    pub fn wait(self) -> Option<T> {
        block_on(self)
    }
}

impl<T> Future for Completion<T> {
    type Output = Option<T>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.receiver).poll(cx).map(Result::ok)
    }
}

pub fn completion<T>() -> (Resolver<T>, Completion<T>) {
    let (sender, receiver) = oneshot::channel();
    (Resolver { sender }, Completion { receiver })
}

/// Runs `work` on a new named thread.
pub fn spawn_background<F>(name: &str, work: F) -> std::io::Result<JoinHandle<()>>
where
    F: FnOnce() + Send + 'static,
{
    thread::Builder::new().name(name.to_string()).spawn(work)
}
