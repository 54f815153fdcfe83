use fibra::sync::Mutex;
use fibra::task;
use fibra::time::{sleep, timeout};
use std::sync::Arc;
use std::time::Duration;

#[fibra::test]
async fn test_timeout_around_lock_leaves_no_waiter_behind() {
    let mutex = Mutex::new(0);
    let _guard = mutex.lock().await;

    let result = timeout(Duration::from_millis(20), mutex.lock()).await;

    assert!(result.is_err());
    assert_eq!(mutex.waiters(), 0);
    assert!(mutex.is_locked());
}

#[fibra::test(worker_threads = 2)]
async fn test_timeout_around_lock_succeeds_when_released() {
    let mutex = Arc::new(Mutex::new(0));
    let guard = mutex.lock().await;

    let m = mutex.clone();
    let waiter = task::spawn(async move {
        match timeout(Duration::from_secs(5), m.lock()).await {
            Ok(mut guard) => {
                *guard += 1;
                true
            }
            Err(_) => false,
        }
    });

    sleep(Duration::from_millis(10)).await;
    drop(guard);

    assert!(waiter.await);
    assert_eq!(*mutex.lock().await, 1);
    assert_eq!(mutex.waiters(), 0);
}

#[fibra::test]
async fn test_timeout_on_unbounded_sleep() {
    let result = timeout(Duration::from_millis(10), sleep(Duration::MAX)).await;

    let Err(elapsed) = result else {
        panic!("sleep should not finish first");
    };
    assert_eq!(elapsed.to_string(), "deadline has elapsed");
}

#[fibra::test]
async fn test_timeout_on_join_handle() {
    let handle = task::spawn(async {
        sleep(Duration::from_millis(10)).await;
        123
    });

    assert_eq!(timeout(Duration::from_secs(5), handle).await.ok(), Some(123));
}
