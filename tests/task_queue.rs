use netbase::{Error, TaskQueue};
use std::os::unix::process::ExitStatusExt;
use std::process::Command;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc;
use std::sync::{Arc, Mutex};
use std::thread;
use std::time::Duration;

#[test]
fn single_worker_runs_tasks_in_submission_order() {
    let queue = TaskQueue::builder().name("ordered").build();
    queue.start(1).expect("start failed");

    let seen = Arc::new(Mutex::new(Vec::new()));
    for i in 0..5 {
        let seen = seen.clone();
        queue.submit(move || seen.lock().unwrap().push(i));
    }

    queue.stop();

    assert_eq!(*seen.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    assert!(!queue.is_running());
    assert_eq!(queue.worker_count(), 0);
}

#[test]
fn bounded_queue_blocks_producer_when_full() {
    let queue = Arc::new(TaskQueue::builder().name("bounded").max_queue_size(2).build());
    queue.start(1).expect("start failed");

    // Occupy the only worker until the gate opens.
    let (gate_tx, gate_rx) = mpsc::channel::<()>();
    let (busy_tx, busy_rx) = mpsc::channel::<()>();
    queue.submit(move || {
        busy_tx.send(()).unwrap();
        gate_rx.recv().unwrap();
    });
    busy_rx
        .recv_timeout(Duration::from_secs(5))
        .expect("worker never picked up the gate task");

    let ran = Arc::new(AtomicUsize::new(0));
    for _ in 0..2 {
        let ran = ran.clone();
        queue.submit(move || {
            ran.fetch_add(1, Ordering::SeqCst);
        });
    }
    assert_eq!(queue.queue_size(), 2);

    let submitted = Arc::new(AtomicUsize::new(0));
    let producer = {
        let queue = queue.clone();
        let ran = ran.clone();
        let submitted = submitted.clone();
        thread::spawn(move || {
            queue.submit(move || {
                ran.fetch_add(1, Ordering::SeqCst);
            });
            submitted.store(1, Ordering::SeqCst);
        })
    };

    thread::sleep(Duration::from_millis(100));
    assert_eq!(submitted.load(Ordering::SeqCst), 0, "third submit should block");
    assert!(queue.queue_size() <= 2);

    gate_tx.send(()).unwrap();
    producer.join().expect("producer panicked");
    queue.stop();

    assert_eq!(submitted.load(Ordering::SeqCst), 1);
    assert_eq!(ran.load(Ordering::SeqCst), 3);
}

#[test]
fn zero_workers_run_tasks_inline() {
    let hook_calls = Arc::new(AtomicUsize::new(0));
    let counter = hook_calls.clone();
    let queue = TaskQueue::builder()
        .name("inline")
        .on_worker_start(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build();

    queue.start(0).expect("start failed");
    assert_eq!(hook_calls.load(Ordering::SeqCst), 1);

    let caller = thread::current().id();
    let (tx, rx) = mpsc::channel();
    queue.submit(move || tx.send(thread::current().id()).unwrap());

    assert_eq!(rx.try_recv().expect("task did not run inline"), caller);
    assert_eq!(queue.queue_size(), 0);
    queue.stop();
}

#[test]
fn init_hook_runs_once_per_worker() {
    let hook_calls = Arc::new(AtomicUsize::new(0));
    let counter = hook_calls.clone();
    let queue = TaskQueue::builder()
        .on_worker_start(move || {
            counter.fetch_add(1, Ordering::SeqCst);
        })
        .build();

    queue.start(3).expect("start failed");
    assert_eq!(queue.worker_count(), 3);
    queue.stop();

    assert_eq!(hook_calls.load(Ordering::SeqCst), 3);
}

#[test]
fn worker_threads_carry_queue_name() {
    let queue = TaskQueue::builder().name("compute").build();
    queue.start(2).expect("start failed");

    let (tx, rx) = mpsc::channel();
    for _ in 0..4 {
        let tx = tx.clone();
        queue.submit(move || {
            let name = thread::current().name().map(str::to_owned);
            tx.send(name).unwrap();
        });
    }
    queue.stop();
    drop(tx);

    let names: Vec<_> = rx.iter().collect();
    assert_eq!(names.len(), 4);
    for name in names {
        let name = name.expect("worker thread is unnamed");
        assert!(
            name == "compute1" || name == "compute2",
            "unexpected worker name {name}"
        );
    }
}

#[test]
fn second_start_is_rejected() {
    let queue = TaskQueue::builder().name("twice").build();
    queue.start(1).expect("start failed");

    let result = queue.start(1);

    assert!(matches!(result, Err(Error::AlreadyRunning(ref name)) if name == "twice"));
    assert_eq!(queue.worker_count(), 1);
    queue.stop();
}

#[test]
fn queue_can_restart_after_stop() {
    let queue = TaskQueue::new();
    queue.start(1).expect("start failed");
    queue.stop();

    queue.start(2).expect("restart failed");
    assert!(queue.is_running());
    assert_eq!(queue.worker_count(), 2);
    queue.stop();
}

#[test]
fn dropping_queue_finishes_pending_tasks() {
    let ran = Arc::new(AtomicUsize::new(0));
    {
        let queue = TaskQueue::new();
        queue.start(2).expect("start failed");
        for _ in 0..20 {
            let ran = ran.clone();
            queue.submit(move || {
                thread::sleep(Duration::from_millis(1));
                ran.fetch_add(1, Ordering::SeqCst);
            });
        }
    }

    assert_eq!(ran.load(Ordering::SeqCst), 20);
}

#[test]
fn submit_after_stop_runs_inline() {
    let queue = TaskQueue::new();
    queue.start(1).expect("start failed");
    queue.stop();

    let caller = thread::current().id();
    let (tx, rx) = mpsc::channel();
    queue.submit(move || tx.send(thread::current().id()).unwrap());

    assert_eq!(rx.try_recv().expect("task did not run"), caller);
}

#[test]
fn many_producers_share_a_bounded_queue() {
    let queue = Arc::new(TaskQueue::builder().name("shared").max_queue_size(8).build());
    queue.start(4).expect("start failed");
    let ran = Arc::new(AtomicUsize::new(0));

    let producers: Vec<_> = (0..4)
        .map(|_| {
            let queue = queue.clone();
            let ran = ran.clone();
            thread::spawn(move || {
                for _ in 0..250 {
                    let ran = ran.clone();
                    queue.submit(move || {
                        ran.fetch_add(1, Ordering::SeqCst);
                    });
                    assert!(queue.queue_size() <= 8);
                }
            })
        })
        .collect();

    for producer in producers {
        producer.join().expect("producer panicked");
    }
    queue.stop();

    assert_eq!(ran.load(Ordering::SeqCst), 1000);
}

/// Set in the child process spawned by `panicking_task_aborts_the_process`.
const PANIC_CHILD_ENV: &str = "NETBASE_PANICKING_TASK_CHILD";

#[test]
fn panicking_task_aborts_the_process() {
    if std::env::var_os(PANIC_CHILD_ENV).is_some() {
        let queue = TaskQueue::builder().name("doomed").build();
        queue.start(1).expect("start failed");
        queue.submit(|| panic!("task failure"));
        queue.stop();

        // Only reached if the worker did not abort.
        std::process::exit(0);
    }

    let test_binary = std::env::current_exe().expect("test binary path");
    let output = Command::new(test_binary)
        .args([
            "panicking_task_aborts_the_process",
            "--exact",
            "--nocapture",
            "--test-threads=1",
        ])
        .env(PANIC_CHILD_ENV, "1")
        .output()
        .expect("failed to spawn child test process");

    assert!(!output.status.success(), "child exited cleanly");
    assert_eq!(output.status.signal(), Some(libc::SIGABRT));

    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("task failure"), "stderr: {stderr}");
}
