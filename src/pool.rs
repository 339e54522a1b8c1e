use std::collections::VecDeque;
use std::sync::Mutex;
use std::thread;

/// Run `job` over `tasks` on a fixed-size pool of worker threads.
///
/// The pool holds `min(workers, tasks.len())` threads; zero pending tasks
/// means no thread is spawned at all. Each worker pulls from a shared queue
/// and runs one task to completion; there is no way to cancel a task once
/// it has been picked up. The call joins every worker and returns results in
/// task-submission order regardless of completion order.
pub fn map_bounded<T, R, F>(workers: usize, tasks: Vec<T>, job: F) -> Vec<R>
where
    T: Send,
    R: Send,
    F: Fn(T) -> R + Sync,
{
    let worker_count = workers.min(tasks.len());
    if worker_count == 0 {
        return Vec::new();
    }

    let task_count = tasks.len();
    let queue: Mutex<VecDeque<(usize, T)>> = Mutex::new(tasks.into_iter().enumerate().collect());
    let results: Mutex<Vec<(usize, R)>> = Mutex::new(Vec::with_capacity(task_count));

    thread::scope(|scope| {
        for _ in 0..worker_count {
            scope.spawn(|| {
                loop {
                    let next = queue.lock().expect("task queue poisoned").pop_front();
                    let Some((index, task)) = next else {
                        break;
                    };
                    let result = job(task);
                    results
                        .lock()
                        .expect("result list poisoned")
                        .push((index, result));
                }
            });
        }
    });

    let mut results = results.into_inner().expect("result list poisoned");
    results.sort_by_key(|(index, _)| *index);
    results.into_iter().map(|(_, result)| result).collect()
}
