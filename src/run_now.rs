use std::sync::mpsc;
use std::sync::Mutex;
use std::thread;
use std::time::{Duration, Instant};

/// Terminal state of a manual trigger as seen by the caller.
#[derive(Debug, Clone, PartialEq)]
pub enum RunOutcome {
    /// The callable finished within the budget.
    Completed { duration: Duration },
    /// The shared budget ran out. The callable may still be running; only
    /// the wait is abandoned, not the execution.
    TimedOut,
    /// The callable returned an error.
    Failed { error: String },
}

struct BudgetState {
    active: usize,
    deadline: Option<Instant>,
}

/// Runs a job's callable on demand, outside its schedule, with one wait
/// budget shared by every concurrently outstanding trigger.
///
/// The deadline is fixed when the first trigger of a burst starts and
/// cleared when the last one finishes, so a trigger arriving against an
/// almost-spent budget waits only for the remainder. Intended for short
/// -lived request contexts where blocking indefinitely is unacceptable.
pub struct RunNowCoordinator {
    budget: Duration,
    state: Mutex<BudgetState>,
}

impl RunNowCoordinator {
    pub fn new(budget: Duration) -> Self {
        Self {
            budget,
            state: Mutex::new(BudgetState {
                active: 0,
                deadline: None,
            }),
        }
    }

    /// Runs `job` on a worker thread and blocks the calling thread until it
    /// finishes or the shared deadline passes.
    ///
    /// On timeout the worker thread is left running; side effects in `job`
    /// (such as recording its terminal execution event) still happen when it
    /// eventually completes. A panicking callable tears down its worker
    /// thread and surfaces as `Failed`.
    pub fn run<F>(&self, job: F) -> RunOutcome
    where
        F: FnOnce() -> anyhow::Result<()> + Send + 'static,
    {
        let deadline = self.begin();
        let started = Instant::now();

        let (sender, receiver) = mpsc::channel();
        thread::spawn(move || {
            let result = job().map_err(|e| e.to_string());
            let _ = sender.send(result);
        });

        let remaining = deadline.saturating_duration_since(Instant::now());
        let outcome = match receiver.recv_timeout(remaining) {
            Ok(Ok(())) => RunOutcome::Completed {
                duration: started.elapsed(),
            },
            Ok(Err(error)) => RunOutcome::Failed { error },
            Err(mpsc::RecvTimeoutError::Timeout) => RunOutcome::TimedOut,
            Err(mpsc::RecvTimeoutError::Disconnected) => RunOutcome::Failed {
                error: "job worker thread terminated unexpectedly".to_string(),
            },
        };

        self.finish();
        outcome
    }

    fn begin(&self) -> Instant {
        let mut state = self.state.lock().unwrap();
        state.active += 1;
        *state
            .deadline
            .get_or_insert_with(|| Instant::now() + self.budget)
    }

    fn finish(&self) {
        let mut state = self.state.lock().unwrap();
        state.active -= 1;
        if state.active == 0 {
            state.deadline = None;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::anyhow;
    use std::sync::Arc;

    #[test]
    fn completes_within_the_budget() {
        let coordinator = RunNowCoordinator::new(Duration::from_secs(5));

        let outcome = coordinator.run(|| Ok(()));
        assert!(matches!(outcome, RunOutcome::Completed { .. }));
    }

    #[test]
    fn reports_callable_failures() {
        let coordinator = RunNowCoordinator::new(Duration::from_secs(5));

        let outcome = coordinator.run(|| Err(anyhow!("boom")));
        assert_eq!(
            outcome,
            RunOutcome::Failed {
                error: "boom".to_string()
            }
        );
    }

    #[test]
    fn a_panicking_callable_surfaces_as_failed() {
        let coordinator = RunNowCoordinator::new(Duration::from_secs(5));

        let outcome = coordinator.run(|| panic!("task exploded"));
        assert!(matches!(outcome, RunOutcome::Failed { .. }));
    }

    #[test]
    fn stops_waiting_when_the_budget_is_spent() {
        let coordinator = RunNowCoordinator::new(Duration::from_millis(100));
        let started = Instant::now();

        let outcome = coordinator.run(|| {
            thread::sleep(Duration::from_secs(2));
            Ok(())
        });

        assert_eq!(outcome, RunOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[test]
    fn the_budget_is_shared_across_concurrent_triggers() {
        let coordinator = Arc::new(RunNowCoordinator::new(Duration::from_millis(600)));

        // First trigger consumes the whole budget.
        let first = Arc::clone(&coordinator);
        let first_handle = thread::spawn(move || {
            first.run(|| {
                thread::sleep(Duration::from_secs(2));
                Ok(())
            })
        });

        // A second trigger arriving mid-burst gets only the remainder, not a
        // fresh budget of its own.
        thread::sleep(Duration::from_millis(300));
        let started = Instant::now();
        let outcome = coordinator.run(|| {
            thread::sleep(Duration::from_secs(2));
            Ok(())
        });

        assert_eq!(outcome, RunOutcome::TimedOut);
        assert!(started.elapsed() < Duration::from_millis(500));

        assert_eq!(first_handle.join().unwrap(), RunOutcome::TimedOut);
    }

    #[test]
    fn the_budget_resets_once_all_triggers_finish() {
        let coordinator = RunNowCoordinator::new(Duration::from_millis(300));

        for _ in 0..3 {
            let outcome = coordinator.run(|| {
                thread::sleep(Duration::from_millis(150));
                Ok(())
            });
            // Each sequential run gets a fresh deadline; with a shared stale
            // deadline the second and third would time out.
            assert!(matches!(outcome, RunOutcome::Completed { .. }));
        }
    }
}
