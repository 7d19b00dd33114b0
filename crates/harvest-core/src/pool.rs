use std::sync::{mpsc, Arc, Mutex};
use std::thread;

/// Run `work` over `jobs` on at most `workers` scoped threads.
///
/// Jobs are fed through a channel bounded to the worker count; results are
/// handed to `collect` on the calling thread in completion order. A worker
/// panic is re-raised once the remaining jobs have drained.
pub(crate) fn run_bounded<J, R, W, C>(jobs: Vec<J>, workers: usize, work: W, mut collect: C)
where
    J: Send,
    R: Send,
    W: Fn(J) -> R + Sync,
    C: FnMut(R),
{
    if jobs.is_empty() {
        return;
    }
    let worker_count = workers.clamp(1, jobs.len());
    thread::scope(|scope| {
        let (job_tx, job_rx) = mpsc::sync_channel::<J>(worker_count);
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (result_tx, result_rx) = mpsc::channel();

        for _ in 0..worker_count {
            let job_rx = Arc::clone(&job_rx);
            let result_tx = result_tx.clone();
            let work = &work;
            scope.spawn(move || loop {
                let job = {
                    let guard = job_rx.lock().expect("lock job receiver");
                    match guard.recv() {
                        Ok(job) => job,
                        Err(_) => break,
                    }
                };
                if result_tx.send(work(job)).is_err() {
                    break;
                }
            });
        }
        // Once every worker is gone the feeder's sends fail instead of blocking.
        drop(job_rx);
        drop(result_tx);

        scope.spawn(move || {
            for job in jobs {
                if job_tx.send(job).is_err() {
                    break;
                }
            }
        });

        for result in result_rx {
            collect(result);
        }
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;
    use std::panic::{self, AssertUnwindSafe};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[test]
    fn every_job_is_collected_once() {
        let mut seen = Vec::new();
        run_bounded((0..100).collect(), 8, |n: u32| n * 2, |n| seen.push(n));
        seen.sort_unstable();
        assert_eq!(seen, (0..100).map(|n| n * 2).collect::<Vec<_>>());
    }

    #[test]
    fn never_exceeds_the_worker_bound() {
        let running = AtomicUsize::new(0);
        let peak = AtomicUsize::new(0);
        run_bounded(
            (0..32).collect(),
            3,
            |_: u32| {
                let now = running.fetch_add(1, Ordering::SeqCst) + 1;
                peak.fetch_max(now, Ordering::SeqCst);
                thread::sleep(Duration::from_millis(5));
                running.fetch_sub(1, Ordering::SeqCst);
            },
            |()| {},
        );
        let peak = peak.load(Ordering::SeqCst);
        assert!((1..=3).contains(&peak), "peak concurrency {peak}");
    }

    #[test]
    fn worker_panic_surfaces_after_other_results_are_collected() {
        let mut seen = BTreeSet::new();
        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            run_bounded(
                vec!["a", "b", "boom", "c"],
                1,
                |job: &str| {
                    assert_ne!(job, "boom", "worker failure");
                    job.to_string()
                },
                |name| {
                    seen.insert(name);
                },
            );
        }));
        assert!(result.is_err());
        assert!(seen.contains("a") && seen.contains("b"));
    }

    #[test]
    fn empty_job_list_spawns_nothing() {
        let mut calls = 0;
        run_bounded(Vec::<u8>::new(), 4, |n| n, |_| calls += 1);
        assert_eq!(calls, 0);
    }
}
