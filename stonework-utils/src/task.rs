//
// Copyright (c) The Holo Core Contributors
//
// SPDX-License-Identifier: MIT
//

use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;

use tokio::task::{self, JoinSet};
use tracing::{Instrument, error};

/// A handle which can be used to manipulate the task created by the
/// [`Task::spawn`] function.
///
/// Dropping this handle cancels the task.
#[derive(Debug)]
pub struct Task<T> {
    join_handle: task::JoinHandle<T>,
}

/// A list of fire-and-forget background tasks.
///
/// Tasks added to the group are never canceled individually. They run to
/// completion (or failure) and are reaped either opportunistically or when
/// the group is drained with [`TaskGroup::drain`].
#[derive(Debug, Default)]
pub struct TaskGroup {
    tasks: Mutex<JoinSet<()>>,
}

// ===== impl Task =====

impl<T> Task<T> {
    /// Spawns a new asynchronous task, returning a handle for it.
    pub fn spawn<Fut>(future: Fut) -> Task<T>
    where
        Fut: Future<Output = T> + Send + 'static,
        T: Send + 'static,
    {
        Task {
            join_handle: task::spawn(future.in_current_span()),
        }
    }
}

impl<T> Future for Task<T> {
    type Output = Result<T, task::JoinError>;

    fn poll(
        mut self: Pin<&mut Self>,
        cx: &mut std::task::Context<'_>,
    ) -> std::task::Poll<Self::Output> {
        Pin::new(&mut self.join_handle).poll(cx)
    }
}

impl<T> Drop for Task<T> {
    fn drop(&mut self) {
        self.join_handle.abort();
    }
}

// ===== impl TaskGroup =====

impl TaskGroup {
    /// Spawns a new background task in the group.
    pub fn spawn<Fut>(&self, future: Fut)
    where
        Fut: Future<Output = ()> + Send + 'static,
    {
        let mut tasks = self.tasks.lock().unwrap();

        // Reap tasks that have already finished.
        while let Some(result) = tasks.try_join_next() {
            log_join_error(result);
        }

        tasks.spawn(future.in_current_span());
    }

    /// Returns the number of tasks that haven't been reaped yet.
    pub fn len(&self) -> usize {
        self.tasks.lock().unwrap().len()
    }

    /// Returns true if there are no tasks left to reap.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Waits for all tasks of the group to complete, including the ones that
    /// are spawned while draining.
    pub async fn drain(&self) {
        loop {
            let mut tasks = std::mem::take(&mut *self.tasks.lock().unwrap());
            if tasks.is_empty() {
                break;
            }
            while let Some(result) = tasks.join_next().await {
                log_join_error(result);
            }
        }
    }
}

// ===== helper functions =====

fn log_join_error(result: Result<(), task::JoinError>) {
    if let Err(error) = result {
        error!(%error, "background task failed");
    }
}

// ===== unit tests =====
