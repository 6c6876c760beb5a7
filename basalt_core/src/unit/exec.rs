// Copyright 2026 the Basalt Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Where claimed tasks run.
//!
//! Inline execution runs the task on the thread that dispatched it and
//! returns once it is ready. Worker execution hands the task to a dedicated
//! thread that sleeps on a [`Signal`] while idle, runs exactly one task per
//! wake-up, marks it ready, and requests a redispatch. The worker exits when
//! its unit is dropped, after finishing any task it was already handed.

use alloc::sync::Arc;

use super::{Backend, Core, Job};

/// How a render unit executes claimed tasks.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum ExecutionMode {
    /// On the dispatching thread, before `dispatch` returns.
    #[default]
    Inline,
    /// On a dedicated worker thread.
    #[cfg(feature = "std")]
    Worker,
}

pub(super) enum Executor {
    Inline,
    #[cfg(feature = "std")]
    Worker(worker::Worker),
}

impl Executor {
    pub(super) fn new<B: Backend>(core: &Arc<Core<B>>, mode: ExecutionMode) -> Self {
        match mode {
            ExecutionMode::Inline => Self::Inline,
            #[cfg(feature = "std")]
            ExecutionMode::Worker => match worker::Worker::spawn(core) {
                Ok(w) => Self::Worker(w),
                Err(e) => {
                    log::warn!("unit {:?}: cannot spawn worker ({e}), running inline", core.id);
                    Self::Inline
                }
            },
        }
    }

    pub(super) fn mode(&self) -> ExecutionMode {
        match self {
            Self::Inline => ExecutionMode::Inline,
            #[cfg(feature = "std")]
            Self::Worker(_) => ExecutionMode::Worker,
        }
    }

    pub(super) fn start<B: Backend>(&self, core: &Core<B>, job: Job) {
        match self {
            Self::Inline => core.run(job),
            #[cfg(feature = "std")]
            Self::Worker(w) => w.post(job),
        }
    }
}

#[cfg(feature = "std")]
mod worker {
    use alloc::format;
    use alloc::sync::Arc;
    use core::sync::atomic::{AtomicBool, Ordering};
    use std::thread::JoinHandle;

    use crate::sync::Signal;
    use crate::unit::{Backend, Core, Job};

    struct Mailbox {
        job: spin::Mutex<Option<Job>>,
        wake: Signal,
        shutdown: AtomicBool,
    }

    pub(crate) struct Worker {
        mailbox: Arc<Mailbox>,
        handle: Option<JoinHandle<()>>,
    }

    impl Worker {
        pub(crate) fn spawn<B: Backend>(core: &Arc<Core<B>>) -> std::io::Result<Self> {
            let mailbox = Arc::new(Mailbox {
                job: spin::Mutex::new(None),
                wake: Signal::new(),
                shutdown: AtomicBool::new(false),
            });
            let handle = std::thread::Builder::new()
                .name(format!("basalt-unit-{}-{}", core.ctx.display.0, core.id.0))
                .spawn({
                    let core = Arc::clone(core);
                    let mailbox = Arc::clone(&mailbox);
                    move || run(&core, &mailbox)
                })?;
            Ok(Self {
                mailbox,
                handle: Some(handle),
            })
        }

        pub(crate) fn post(&self, job: Job) {
            *self.mailbox.job.lock() = Some(job);
            self.mailbox.wake.notify();
        }
    }

    fn run<B: Backend>(core: &Core<B>, mailbox: &Mailbox) {
        let mut seen = 0;
        loop {
            seen = mailbox.wake.wait_past(seen);
            // A job posted before shutdown was already claimed; it must finish.
            let job = mailbox.job.lock().take();
            if let Some(job) = job {
                core.run(job);
            }
            if mailbox.shutdown.load(Ordering::Acquire) {
                break;
            }
        }
        log::debug!("unit {:?}: worker exiting", core.id);
    }

    impl Drop for Worker {
        fn drop(&mut self) {
            self.mailbox.shutdown.store(true, Ordering::Release);
            self.mailbox.wake.notify();
            if let Some(handle) = self.handle.take()
                && handle.join().is_err()
            {
                log::error!("render worker panicked");
            }
        }
    }
}
