use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{mpsc, Arc};
use std::thread;

use tracing::{debug, info_span};

/// Shared flag that keeps further work from starting once raised. Work
/// already running is never interrupted.
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// One independently runnable unit, typically a scenario.
pub trait DriverTask: Sync {
    type Output: Send;

    fn name(&self) -> &str;

    fn run(&self, stop: &StopSignal) -> Self::Output;
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TaskOutcome<T> {
    Finished(T),
    /// The stop signal was raised before the task started.
    Skipped,
}

impl<T> TaskOutcome<T> {
    pub fn finished(&self) -> Option<&T> {
        match self {
            Self::Finished(output) => Some(output),
            Self::Skipped => None,
        }
    }
}

/// Runs `tasks` over `jobs` worker threads and returns their outcomes in input
/// order. `on_finished` is called on the caller's thread as each task
/// completes.
pub fn run_all<T, F>(
    tasks: &[T],
    jobs: usize,
    stop: &StopSignal,
    mut on_finished: F,
) -> Vec<TaskOutcome<T::Output>>
where
    T: DriverTask,
    F: FnMut(&T, &T::Output),
{
    let total = tasks.len();
    let jobs = jobs.clamp(1, total.max(1));

    if jobs == 1 {
        let mut outcomes = Vec::with_capacity(total);
        for task in tasks {
            if stop.is_raised() {
                debug!(task = task.name(), "skipping after stop");
                outcomes.push(TaskOutcome::Skipped);
                continue;
            }
            let output = run_task(task, stop);
            on_finished(task, &output);
            outcomes.push(TaskOutcome::Finished(output));
        }
        return outcomes;
    }

    debug!(jobs, total, "running tasks in parallel");
    let mut ordered: Vec<Option<T::Output>> = (0..total).map(|_| None).collect();
    let (tx, rx) = mpsc::channel::<(usize, T::Output)>();
    let next_index = AtomicUsize::new(0);
    thread::scope(|scope| {
        for _ in 0..jobs {
            let tx = tx.clone();
            let next_index = &next_index;
            scope.spawn(move || loop {
                if stop.is_raised() {
                    break;
                }
                let index = next_index.fetch_add(1, Ordering::Relaxed);
                if index >= total {
                    break;
                }
                let output = run_task(&tasks[index], stop);
                if tx.send((index, output)).is_err() {
                    break;
                }
            });
        }

        drop(tx);
        for (index, output) in rx {
            on_finished(&tasks[index], &output);
            ordered[index] = Some(output);
        }
    });

    ordered
        .into_iter()
        .map(|output| output.map_or(TaskOutcome::Skipped, TaskOutcome::Finished))
        .collect()
}

fn run_task<T: DriverTask>(task: &T, stop: &StopSignal) -> T::Output {
    let span = info_span!("scenario", name = task.name());
    let _entered = span.enter();
    task.run(stop)
}
