use fibra::sync::{Mutex, RawMutex};
use fibra::task::{self, JoinHandle};
use fibra::time::{sleep, timeout};
use fibra::{RuntimeBuilder, yield_now};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

async fn join_all<T: Send + 'static>(handles: Vec<JoinHandle<T>>) -> Vec<T> {
    let mut out = Vec::with_capacity(handles.len());
    for handle in handles {
        out.push(handle.await);
    }
    out
}

#[fibra::test(worker_threads = 4)]
async fn test_critical_sections_never_overlap() {
    let mutex = Arc::new(Mutex::new(0usize));
    let inside = Arc::new(AtomicUsize::new(0));
    let max_inside = Arc::new(AtomicUsize::new(0));

    let handles = (0..16)
        .map(|_| {
            let mutex = mutex.clone();
            let inside = inside.clone();
            let max_inside = max_inside.clone();

            task::spawn(async move {
                for _ in 0..50 {
                    let mut guard = mutex.lock().await;

                    let now = inside.fetch_add(1, Ordering::SeqCst) + 1;
                    max_inside.fetch_max(now, Ordering::SeqCst);

                    yield_now().await;
                    *guard += 1;

                    inside.fetch_sub(1, Ordering::SeqCst);
                }
            })
        })
        .collect();

    join_all(handles).await;

    assert_eq!(max_inside.load(Ordering::SeqCst), 1);
    assert_eq!(*mutex.lock().await, 16 * 50);
    assert_eq!(mutex.waiters(), 0);
}

#[fibra::test(worker_threads = 4)]
async fn test_every_waiter_eventually_acquires() {
    let mutex = Arc::new(RawMutex::with_label("contended"));
    let acquired = Arc::new(AtomicUsize::new(0));

    let handles = (0..32)
        .map(|_| {
            let mutex = mutex.clone();
            let acquired = acquired.clone();

            task::spawn(async move {
                for _ in 0..20 {
                    mutex.lock().await;
                    acquired.fetch_add(1, Ordering::SeqCst);
                    mutex.unlock();
                }
            })
        })
        .collect();

    let finished = timeout(Duration::from_secs(20), join_all(handles)).await;

    assert!(finished.is_ok(), "a waiter was never resumed");
    assert_eq!(acquired.load(Ordering::SeqCst), 32 * 20);
    assert!(!mutex.is_locked());
    assert_eq!(mutex.waiters(), 0);
    assert_eq!(mutex.queued(), 0);
}

#[fibra::test(worker_threads = 1)]
async fn test_waiters_acquire_in_arrival_order() {
    let mutex = Arc::new(Mutex::new(Vec::new()));
    let guard = mutex.lock().await;

    let mut handles = Vec::new();
    for i in 0..5u32 {
        let m = mutex.clone();
        handles.push(task::spawn(async move {
            m.lock().await.push(i);
        }));

        while mutex.waiters() < i + 1 {
            yield_now().await;
        }
    }

    drop(guard);
    join_all(handles).await;

    assert_eq!(*mutex.lock().await, [0, 1, 2, 3, 4]);
}

#[fibra::test]
async fn test_try_lock_fails_while_another_task_holds() {
    let mutex = Arc::new(Mutex::new(()));
    let guard = mutex.lock().await;

    let m = mutex.clone();
    let other = task::spawn(async move { m.try_lock().is_some() }).await;
    assert!(!other, "try_lock must fail while the lock is held");

    drop(guard);

    let m = mutex.clone();
    let other = task::spawn(async move { m.try_lock().is_some() }).await;
    assert!(other, "try_lock must succeed once released");
}

#[fibra::test]
async fn test_abandoned_lock_leaves_no_trace() {
    let mutex = Arc::new(Mutex::new(1));
    let guard = mutex.lock().await;

    let result = timeout(Duration::from_millis(20), mutex.lock()).await;
    assert!(result.is_err());
    assert_eq!(mutex.waiters(), 0);

    drop(guard);
    assert!(!mutex.is_locked());
    assert_eq!(*mutex.lock().await, 1);
}

#[fibra::test(worker_threads = 2)]
async fn test_guard_survives_suspension_and_migration() {
    let mutex = Arc::new(Mutex::new(String::new()));
    let holding = Arc::new(AtomicBool::new(false));

    let (m, h) = (mutex.clone(), holding.clone());
    let writer = task::spawn(async move {
        let mut guard = m.lock().await;
        h.store(true, Ordering::SeqCst);

        guard.push_str("hello");
        sleep(Duration::from_millis(20)).await;
        guard.push_str(" world");
    });

    while !holding.load(Ordering::SeqCst) {
        yield_now().await;
    }

    let text = mutex.lock().await.clone();
    writer.await;

    assert_eq!(text, "hello world");
}

#[test]
fn test_mutex_outlives_many_runtimes() {
    static SHARED: Mutex<u32> = Mutex::new(0);

    for _ in 0..3 {
        let rt = RuntimeBuilder::new().worker_threads(2).build();
        rt.block_on(async {
            *SHARED.lock().await += 1;
        });
    }

    assert_eq!(*SHARED.try_lock().expect("no task left"), 3);
}
