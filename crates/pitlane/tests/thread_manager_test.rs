//! Thread manager lifecycle tests across real OS threads.

use std::sync::atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::thread;
use std::time::{Duration, Instant};

use pitlane::{ThreadError, ThreadKind, ThreadManager, ThreadPriority, ThreadStatus};

fn wait_until(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if condition() {
            return true;
        }
        thread::sleep(Duration::from_millis(1));
    }
    condition()
}

fn ticking(counter: &Arc<AtomicU32>) -> impl FnMut() + Send + 'static {
    let counter = Arc::clone(counter);
    move || {
        counter.fetch_add(1, Ordering::SeqCst);
        thread::sleep(Duration::from_millis(1));
    }
}

#[test]
fn test_duplicate_name_has_no_side_effects() {
    let manager = ThreadManager::new();
    manager.initialize(4).unwrap();

    let first = Arc::new(AtomicU32::new(0));
    manager
        .create_thread("Physics", ThreadKind::Looping, ThreadPriority::High, ticking(&first))
        .unwrap();

    let second_ran = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&second_ran);
    let err = manager
        .create_thread("Physics", ThreadKind::Transient, ThreadPriority::Low, move || {
            flag.store(true, Ordering::SeqCst);
        })
        .unwrap_err();

    assert!(matches!(err, ThreadError::DuplicateThread(ref name) if name == "Physics"));
    assert_eq!(manager.live_thread_count(), 1);

    let info = manager.thread_info("Physics").unwrap();
    assert_eq!(info.kind, ThreadKind::Looping);
    assert_eq!(info.priority, ThreadPriority::High);

    thread::sleep(Duration::from_millis(20));
    assert!(!second_ran.load(Ordering::SeqCst));
    manager.shutdown();
}

#[test]
fn test_pause_then_resume() {
    let manager = ThreadManager::new();
    manager.initialize(2).unwrap();

    let ticks = Arc::new(AtomicU32::new(0));
    manager
        .create_thread("Audio", ThreadKind::Looping, ThreadPriority::Normal, ticking(&ticks))
        .unwrap();
    assert!(wait_until(Duration::from_secs(2), || ticks.load(Ordering::SeqCst) > 0));

    manager.pause_thread("Audio").unwrap();
    assert_eq!(manager.thread_status("Audio").unwrap(), ThreadStatus::Paused);

    // At most the invocation in flight during the pause call completes
    thread::sleep(Duration::from_millis(10));
    let parked_at = ticks.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(30));
    assert_eq!(ticks.load(Ordering::SeqCst), parked_at);
    assert_eq!(manager.thread_status("Audio").unwrap(), ThreadStatus::Paused);

    manager.resume_thread("Audio").unwrap();
    assert!(wait_until(Duration::from_secs(2), || {
        ticks.load(Ordering::SeqCst) > parked_at
    }));
    assert_eq!(manager.thread_status("Audio").unwrap(), ThreadStatus::Running);

    manager.stop_thread("Audio").unwrap();
    assert_eq!(manager.thread_status("Audio").unwrap(), ThreadStatus::Stopped);
}

#[test]
fn test_stop_paused_thread() {
    let manager = ThreadManager::new();
    manager.initialize(2).unwrap();

    let ticks = Arc::new(AtomicU32::new(0));
    manager
        .create_thread("AI", ThreadKind::Looping, ThreadPriority::Low, ticking(&ticks))
        .unwrap();
    manager.pause_thread("AI").unwrap();

    let started = Instant::now();
    manager.stop_thread("AI").unwrap();
    assert!(started.elapsed() < Duration::from_secs(1));
    assert_eq!(manager.thread_status("AI").unwrap(), ThreadStatus::Stopped);
    assert_eq!(manager.active_thread_count(), 0);
}

#[test]
fn test_shutdown_with_paused_threads() {
    let manager = ThreadManager::new();
    manager.initialize(4).unwrap();

    let ticks = Arc::new(AtomicU32::new(0));
    for name in ["Render", "Input", "Race"] {
        manager
            .create_thread(name, ThreadKind::Looping, ThreadPriority::Normal, ticking(&ticks))
            .unwrap();
    }
    assert!(wait_until(Duration::from_secs(2), || manager.active_thread_count() == 3));

    manager.pause_thread("Render").unwrap();
    manager.pause_thread("Input").unwrap();

    let started = Instant::now();
    manager.shutdown();
    assert!(started.elapsed() < Duration::from_secs(1));

    assert!(!manager.is_initialized());
    assert_eq!(manager.active_thread_count(), 0);
    assert!(!manager.thread_exists("Render"));

    // Nothing keeps running after shutdown
    let after = ticks.load(Ordering::SeqCst);
    thread::sleep(Duration::from_millis(20));
    assert_eq!(ticks.load(Ordering::SeqCst), after);
}

#[test]
fn test_transient_thread_runs_exactly_once() {
    let manager = ThreadManager::new();
    manager.initialize(2).unwrap();

    let runs = Arc::new(AtomicU32::new(0));
    let counter = Arc::clone(&runs);
    // The name deliberately looks like a pool worker
    manager
        .create_thread("Fake_Worker0", ThreadKind::Transient, ThreadPriority::Normal, move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .unwrap();

    assert!(wait_until(Duration::from_secs(2), || {
        manager.thread_status("Fake_Worker0").unwrap() == ThreadStatus::Stopped
    }));
    thread::sleep(Duration::from_millis(10));
    assert_eq!(runs.load(Ordering::SeqCst), 1);
}

#[test]
fn test_capacity_accounting() {
    let manager = ThreadManager::new();
    manager.initialize(3).unwrap();

    let ticks = Arc::new(AtomicU32::new(0));
    manager
        .create_thread_pool("Physics", 2, ThreadPriority::High)
        .unwrap();
    manager
        .create_thread("Render", ThreadKind::Looping, ThreadPriority::Normal, ticking(&ticks))
        .unwrap();

    let err = manager
        .create_thread("Audio", ThreadKind::Looping, ThreadPriority::Normal, ticking(&ticks))
        .unwrap_err();
    assert!(matches!(
        err,
        ThreadError::CapacityExceeded { live: 3, requested: 1, max: 3 }
    ));
    assert!(matches!(
        manager.create_thread_pool("AI", 1, ThreadPriority::Normal),
        Err(ThreadError::CapacityExceeded { live: 3, requested: 1, max: 3 })
    ));

    // A stopped record frees its slot but stays queryable
    manager.stop_thread("Render").unwrap();
    assert_eq!(manager.live_thread_count(), 2);
    assert!(manager.thread_exists("Render"));
    manager
        .create_thread("Audio", ThreadKind::Looping, ThreadPriority::Normal, ticking(&ticks))
        .unwrap();

    // Pools check the whole batch up front
    manager.stop_thread("Audio").unwrap();
    assert!(matches!(
        manager.create_thread_pool("AI", 2, ThreadPriority::Normal),
        Err(ThreadError::CapacityExceeded { live: 2, requested: 2, max: 3 })
    ));
    assert!(!manager.thread_exists("AI_Worker0"));
}

#[test]
fn test_pool_runs_every_task() {
    let manager = ThreadManager::new();
    manager.initialize(4).unwrap();
    manager
        .create_thread_pool("GeneralPool", 3, ThreadPriority::Normal)
        .unwrap();

    let done = Arc::new(AtomicUsize::new(0));
    for _ in 0..200 {
        let done = Arc::clone(&done);
        manager
            .submit_task("GeneralPool", move || {
                done.fetch_add(1, Ordering::SeqCst);
            })
            .unwrap();
    }

    assert!(wait_until(Duration::from_secs(5), || done.load(Ordering::SeqCst) == 200));
    assert_eq!(manager.pending_tasks("GeneralPool").unwrap(), 0);
}

#[test]
fn test_task_panic_does_not_kill_worker() {
    let manager = ThreadManager::new();
    manager.initialize(2).unwrap();
    manager
        .create_thread_pool("Collision", 1, ThreadPriority::Normal)
        .unwrap();

    manager
        .submit_task("Collision", || panic!("broadphase overflow"))
        .unwrap();

    let survived = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&survived);
    manager
        .submit_task("Collision", move || flag.store(true, Ordering::SeqCst))
        .unwrap();

    assert!(wait_until(Duration::from_secs(2), || survived.load(Ordering::SeqCst)));
    assert_eq!(
        manager.thread_status("Collision_Worker0").unwrap(),
        ThreadStatus::Running
    );
}

#[test]
fn test_paused_worker_leaves_tasks_queued() {
    let manager = ThreadManager::new();
    manager.initialize(2).unwrap();
    manager
        .create_thread_pool("Streaming", 1, ThreadPriority::Low)
        .unwrap();
    assert!(wait_until(Duration::from_secs(2), || manager.active_thread_count() == 1));

    manager.pause_thread("Streaming_Worker0").unwrap();
    // Let an in-flight idle iteration finish
    thread::sleep(Duration::from_millis(10));

    let done = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&done);
    manager
        .submit_task("Streaming", move || flag.store(true, Ordering::SeqCst))
        .unwrap();

    thread::sleep(Duration::from_millis(20));
    assert!(!done.load(Ordering::SeqCst));
    assert_eq!(manager.pending_tasks("Streaming").unwrap(), 1);

    manager.resume_thread("Streaming_Worker0").unwrap();
    assert!(wait_until(Duration::from_secs(2), || done.load(Ordering::SeqCst)));
}

#[test]
fn test_thread_body_can_call_back_into_manager() {
    let manager = Arc::new(ThreadManager::new());
    manager.initialize(4).unwrap();
    manager
        .create_thread_pool("GeneralPool", 1, ThreadPriority::Normal)
        .unwrap();

    let done = Arc::new(AtomicBool::new(false));
    let inner = Arc::clone(&manager);
    let flag = Arc::clone(&done);
    manager
        .create_thread("Spawner", ThreadKind::Transient, ThreadPriority::Normal, move || {
            let flag = Arc::clone(&flag);
            inner
                .submit_task("GeneralPool", move || flag.store(true, Ordering::SeqCst))
                .unwrap();
        })
        .unwrap();

    assert!(wait_until(Duration::from_secs(2), || done.load(Ordering::SeqCst)));
    manager.shutdown();
}

#[test]
fn test_concurrent_stops_both_wait_for_exit() {
    let manager = Arc::new(ThreadManager::new());
    manager.initialize(2).unwrap();

    let in_body = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&in_body);
    manager
        .create_thread("Telemetry", ThreadKind::Looping, ThreadPriority::Normal, move || {
            flag.store(true, Ordering::SeqCst);
            thread::sleep(Duration::from_millis(50));
            flag.store(false, Ordering::SeqCst);
        })
        .unwrap();
    assert!(wait_until(Duration::from_secs(2), || in_body.load(Ordering::SeqCst)));

    let barrier = Arc::new(Barrier::new(2));
    let stoppers: Vec<_> = (0..2)
        .map(|_| {
            let manager = Arc::clone(&manager);
            let barrier = Arc::clone(&barrier);
            let in_body = Arc::clone(&in_body);
            thread::spawn(move || {
                barrier.wait();
                manager.stop_thread("Telemetry").unwrap();
                // Whichever caller returns, the body has already finished
                (manager.thread_status("Telemetry").unwrap(), in_body.load(Ordering::SeqCst))
            })
        })
        .collect();

    for stopper in stoppers {
        let (status, still_running) = stopper.join().unwrap();
        assert_eq!(status, ThreadStatus::Stopped);
        assert!(!still_running);
    }
    assert_eq!(manager.active_thread_count(), 0);
    manager.shutdown();
}

#[test]
fn test_self_stop_keeps_thread_live_until_it_returns() {
    let manager = Arc::new(ThreadManager::new());
    manager.initialize(4).unwrap();

    let status_after_stop = Arc::new(parking_lot::Mutex::new(None));
    let reuse_refused = Arc::new(AtomicBool::new(false));
    let invocations = Arc::new(AtomicU32::new(0));

    let inner = Arc::clone(&manager);
    let seen = Arc::clone(&status_after_stop);
    let refused = Arc::clone(&reuse_refused);
    let count = Arc::clone(&invocations);
    manager
        .create_thread("PitWall", ThreadKind::Looping, ThreadPriority::Normal, move || {
            count.fetch_add(1, Ordering::SeqCst);
            inner.stop_thread("PitWall").unwrap();
            *seen.lock() = Some(inner.thread_status("PitWall").unwrap());

            let reuse = inner.create_thread("PitWall", ThreadKind::Transient, ThreadPriority::Normal, || {});
            refused.store(matches!(reuse, Err(ThreadError::DuplicateThread(_))), Ordering::SeqCst);
            thread::sleep(Duration::from_millis(20));
        })
        .unwrap();

    assert!(wait_until(Duration::from_secs(2), || {
        manager.thread_status("PitWall").unwrap() == ThreadStatus::Stopped
    }));
    assert_eq!(*status_after_stop.lock(), Some(ThreadStatus::Running));
    assert!(reuse_refused.load(Ordering::SeqCst));
    assert_eq!(invocations.load(Ordering::SeqCst), 1);

    // Stopped is terminal
    thread::sleep(Duration::from_millis(10));
    assert_eq!(manager.thread_status("PitWall").unwrap(), ThreadStatus::Stopped);
    manager.shutdown();
}
