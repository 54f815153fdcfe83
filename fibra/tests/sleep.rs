use fibra::sync::Mutex;
use fibra::task;
use fibra::time::{sleep, sleep_until};
use fibra::yield_now;
use std::sync::Arc;
use std::time::{Duration, Instant};

#[fibra::test(worker_threads = 2)]
async fn test_sleep_while_holding_lock_delays_waiters() {
    let mutex = Arc::new(Mutex::new(Vec::new()));

    let holder = {
        let m = mutex.clone();
        task::spawn(async move {
            let mut guard = m.lock().await;
            sleep(Duration::from_millis(50)).await;
            guard.push("holder");
        })
    };
    while !mutex.is_locked() {
        yield_now().await;
    }

    let start = Instant::now();
    mutex.lock().await.push("waiter");

    assert!(start.elapsed() >= Duration::from_millis(20));
    holder.await;
    assert_eq!(*mutex.lock().await, ["holder", "waiter"]);
}

#[fibra::test(worker_threads = 1)]
async fn test_sleeping_holder_lets_other_tasks_run() {
    let mutex = Arc::new(Mutex::new(()));
    let guard = mutex.lock().await;

    let bystander = task::spawn(async { 3 + 4 });
    sleep(Duration::from_millis(10)).await;

    assert!(bystander.is_finished());
    assert_eq!(bystander.await, 7);
    drop(guard);
}

#[fibra::test]
async fn test_sleep_until_past_instant_is_immediate() {
    let start = Instant::now();
    sleep_until(start - Duration::from_millis(5)).await;

    assert!(start.elapsed() < Duration::from_millis(10));
}
