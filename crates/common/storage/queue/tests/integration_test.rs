// Copyright 2025 Crrow
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//      http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use std::{
    collections::BTreeMap,
    env,
    path::{Path, PathBuf},
    process::{Child, Command},
    sync::Arc,
    thread,
    time::{Duration, Instant},
};

use filequeue::{CodecKind, FileLock, Queue, QueueBuilder, QueueError, Timeout};
use filequeue_common_telemetry::init_default_ut_logging;
use serde::{Deserialize, Serialize};
use tempfile::TempDir;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct Task {
    id:       u64,
    kind:     TaskKind,
    payload:  Vec<u8>,
    labels:   BTreeMap<String, String>,
    children: Vec<Task>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
enum TaskKind {
    Resize { width: u32, height: u32 },
    Notify(String),
    Noop,
}

fn task(id: u64) -> Task {
    Task {
        id,
        kind: TaskKind::Notify(format!("task-{id}")),
        payload: vec![id as u8; 4],
        labels: BTreeMap::new(),
        children: vec![],
    }
}

fn create_queue<T>(temp_dir: &TempDir) -> Queue<T>
where
    T: Serialize + serde::de::DeserializeOwned,
{
    init_default_ut_logging();
    QueueBuilder::new(temp_dir.path().join("queue.fq"))
        .poll_interval(Duration::from_millis(5))
        .sync_on_write(false)
        .build()
        .unwrap()
}

#[test]
fn test_put_then_get_all_preserves_order() {
    let temp_dir = TempDir::new().unwrap();
    let queue = create_queue::<u64>(&temp_dir);

    for i in 0..20 {
        queue.put(i, Timeout::Infinite).unwrap();
    }

    assert_eq!(
        queue.get_all(Timeout::Infinite).unwrap(),
        (0..20).collect::<Vec<_>>()
    );
    // get_all is read-only.
    assert_eq!(queue.size(Timeout::Infinite).unwrap(), 20);
}

#[test]
fn test_get_drains_fifo() {
    let temp_dir = TempDir::new().unwrap();
    let queue = create_queue::<String>(&temp_dir);

    for word in ["one", "two", "three"] {
        queue.put(word.to_string(), Timeout::Infinite).unwrap();
    }

    assert_eq!(queue.get(0, Timeout::Infinite).unwrap(), "one");
    assert_eq!(queue.get(0, Timeout::Infinite).unwrap(), "two");
    assert_eq!(queue.pop().unwrap(), "three");
    assert!(queue.get(0, Timeout::Infinite).unwrap_err().is_empty_queue());
}

#[test]
fn test_get_tail_keeps_relative_order() {
    let temp_dir = TempDir::new().unwrap();
    let queue = create_queue::<u32>(&temp_dir);
    queue.put_batch([1, 2, 3, 4], Timeout::Infinite).unwrap();

    assert_eq!(queue.get(-1, Timeout::Infinite).unwrap(), 4);
    assert_eq!(queue.get_all(Timeout::Infinite).unwrap(), vec![1, 2, 3]);
}

#[test]
fn test_get_error_kinds() {
    let temp_dir = TempDir::new().unwrap();
    let queue = create_queue::<u32>(&temp_dir);

    let err = queue.get(0, Timeout::Infinite).unwrap_err();
    assert!(matches!(err, QueueError::EmptyQueue { .. }));

    queue.put_batch([10, 20], Timeout::Infinite).unwrap();
    let err = queue.get(5, Timeout::Infinite).unwrap_err();
    assert!(matches!(err, QueueError::IndexOutOfRange { .. }));
}

#[test]
fn test_get_batch_returns_short_batches() {
    let temp_dir = TempDir::new().unwrap();
    let queue = create_queue::<u32>(&temp_dir);
    queue.put_batch([1, 2, 3, 4, 5], Timeout::Infinite).unwrap();

    assert_eq!(queue.get_batch(3, Timeout::Infinite).unwrap(), vec![1, 2, 3]);
    assert_eq!(queue.size(Timeout::Infinite).unwrap(), 2);

    assert_eq!(queue.get_batch(10, Timeout::Infinite).unwrap(), vec![4, 5]);
    assert!(
        queue
            .get_batch(10, Timeout::Infinite)
            .unwrap_err()
            .is_empty_queue()
    );
}

#[test]
fn test_size_tracks_every_operation() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("queue.fq");
    let queue = create_queue::<u32>(&temp_dir);

    assert_eq!(queue.size(Timeout::Infinite).unwrap(), 0);
    queue.put_batch(0..7, Timeout::Infinite).unwrap();
    assert_eq!(queue.size(Timeout::Infinite).unwrap(), 7);
    queue.get(3, Timeout::Infinite).unwrap();
    queue.get_batch(2, Timeout::Infinite).unwrap();
    assert_eq!(queue.size(Timeout::Infinite).unwrap(), 4);

    queue.clear(Timeout::Infinite).unwrap();
    assert_eq!(queue.size(Timeout::Infinite).unwrap(), 0);

    queue.put(9, Timeout::Infinite).unwrap();
    queue.delete(Timeout::Infinite).unwrap();
    assert_eq!(queue.size(Timeout::Infinite).unwrap(), 0);

    // A fresh store bound to the same path agrees.
    let fresh: Queue<u32> = Queue::open(&path);
    assert_eq!(fresh.size(Timeout::Infinite).unwrap(), 0);
}

#[test]
fn test_put_batch_appends_after_existing() {
    let temp_dir = TempDir::new().unwrap();
    let queue = create_queue::<String>(&temp_dir);
    queue.put("existing".into(), Timeout::Infinite).unwrap();

    queue
        .put_batch(
            vec!["a".to_string(), "b".to_string(), "c".to_string()],
            Timeout::Infinite,
        )
        .unwrap();

    assert_eq!(
        queue.get_all(Timeout::Infinite).unwrap(),
        vec!["existing", "a", "b", "c"]
    );
}

#[test]
fn test_nested_values_round_trip() {
    let temp_dir = TempDir::new().unwrap();
    let queue = create_queue::<Task>(&temp_dir);

    let mut parent = task(1);
    parent.kind = TaskKind::Resize {
        width:  1920,
        height: 1080,
    };
    parent.labels.insert("owner".into(), "ops".into());
    parent.children = vec![task(2), Task {
        kind: TaskKind::Noop,
        ..task(3)
    }];

    queue.put(parent.clone(), Timeout::Infinite).unwrap();
    assert_eq!(queue.get(0, Timeout::Infinite).unwrap(), parent);
}

#[test]
fn test_json_codec_file_is_readable_by_second_instance() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("queue.json.fq");

    let writer: Queue<Task> = QueueBuilder::new(&path)
        .codec(CodecKind::Json)
        .build()
        .unwrap();
    writer.put_batch([task(1), task(2)], Timeout::Infinite).unwrap();

    let reader: Queue<Task> = QueueBuilder::new(&path)
        .codec(CodecKind::Json)
        .build()
        .unwrap();
    assert_eq!(reader.get_all(Timeout::Infinite).unwrap(), vec![
        task(1),
        task(2)
    ]);
}

#[test]
fn test_immediate_timeout_leaves_queue_unchanged() {
    let temp_dir = TempDir::new().unwrap();
    let queue = create_queue::<u32>(&temp_dir);
    queue.put_batch([1, 2, 3], Timeout::Infinite).unwrap();

    let other_holder = FileLock::new(queue.lock_path(), Duration::from_millis(5));
    let guard = other_holder.acquire(Timeout::Infinite).unwrap();

    let started = Instant::now();
    assert!(queue.put(4, Timeout::Immediate).unwrap_err().is_lock_timeout());
    assert!(queue.get(0, Timeout::Immediate).unwrap_err().is_lock_timeout());
    assert!(queue.clear(Timeout::Immediate).unwrap_err().is_lock_timeout());
    assert!(queue.delete(Timeout::Immediate).unwrap_err().is_lock_timeout());
    assert!(started.elapsed() < Duration::from_secs(1));

    drop(guard);
    assert_eq!(queue.get_all(Timeout::Immediate).unwrap(), vec![1, 2, 3]);
}

#[test]
fn test_bounded_timeout_waits_for_budget() {
    let temp_dir = TempDir::new().unwrap();
    let queue = create_queue::<u32>(&temp_dir);

    let other_holder = FileLock::new(queue.lock_path(), Duration::from_millis(5));
    let _guard = other_holder.acquire(Timeout::Infinite).unwrap();

    let started = Instant::now();
    let err = queue
        .size(Timeout::Bounded(Duration::from_millis(200)))
        .unwrap_err();
    assert!(err.is_lock_timeout());
    assert!(started.elapsed() >= Duration::from_millis(200));
}

#[test]
fn test_infinite_timeout_waits_for_release() {
    let temp_dir = TempDir::new().unwrap();
    let queue = Arc::new(create_queue::<u32>(&temp_dir));

    let other_holder = FileLock::new(queue.lock_path(), Duration::from_millis(5));
    let guard = other_holder.acquire(Timeout::Infinite).unwrap();

    let waiter = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.put(7, Timeout::Infinite))
    };

    thread::sleep(Duration::from_millis(100));
    assert!(!waiter.is_finished());
    drop(guard);

    waiter.join().unwrap().unwrap();
    assert_eq!(queue.get_all(Timeout::Infinite).unwrap(), vec![7]);
}

#[test]
fn test_concurrent_threads_lose_no_items() {
    const THREADS: u64 = 8;
    const PER_THREAD: u64 = 25;

    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("queue.fq");
    init_default_ut_logging();

    let handles: Vec<_> = (0..THREADS)
        .map(|t| {
            let path = path.clone();
            thread::spawn(move || {
                // Independent instances, as separate processes would have.
                let queue: Queue<u64> = QueueBuilder::new(path)
                    .poll_interval(Duration::from_millis(1))
                    .sync_on_write(false)
                    .build()
                    .unwrap();
                for i in 0..PER_THREAD {
                    queue.put(t * 1000 + i, Timeout::Infinite).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let queue: Queue<u64> = Queue::open(&path);
    let mut items = queue.get_all(Timeout::Infinite).unwrap();
    assert_eq!(items.len() as u64, THREADS * PER_THREAD);

    // Each producer's items stay in its own insertion order.
    for t in 0..THREADS {
        let own: Vec<_> = items.iter().copied().filter(|v| v / 1000 == t).collect();
        assert_eq!(own, (0..PER_THREAD).map(|i| t * 1000 + i).collect::<Vec<_>>());
    }

    items.sort_unstable();
    items.dedup();
    assert_eq!(items.len() as u64, THREADS * PER_THREAD);
}

#[test]
fn test_concurrent_consumers_get_each_item_once() {
    let temp_dir = TempDir::new().unwrap();
    let queue = Arc::new(create_queue::<u32>(&temp_dir));
    queue.put_batch(0..100, Timeout::Infinite).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let queue = Arc::clone(&queue);
            thread::spawn(move || {
                let mut taken = Vec::new();
                loop {
                    match queue.get_batch(3, Timeout::Infinite) {
                        Ok(batch) => taken.extend(batch),
                        Err(e) if e.is_empty_queue() => return taken,
                        Err(e) => panic!("unexpected error: {e}"),
                    }
                }
            })
        })
        .collect();

    let mut all: Vec<u32> = handles
        .into_iter()
        .flat_map(|h| h.join().unwrap())
        .collect();
    all.sort_unstable();
    assert_eq!(all, (0..100).collect::<Vec<_>>());
}

#[test]
fn test_delete_racing_put_yields_fresh_queue() {
    let temp_dir = TempDir::new().unwrap();
    let queue = Arc::new(create_queue::<u32>(&temp_dir));
    queue.put_batch([1, 2], Timeout::Infinite).unwrap();

    let holder = FileLock::new(queue.lock_path(), Duration::from_millis(5));
    let guard = holder.acquire(Timeout::Infinite).unwrap();

    // The put queues up behind the holder, then the holder deletes.
    let waiter = {
        let queue = Arc::clone(&queue);
        thread::spawn(move || queue.put(3, Timeout::Bounded(Duration::from_secs(10))))
    };
    thread::sleep(Duration::from_millis(50));
    std::fs::remove_file(queue.path()).unwrap();
    holder.remove().unwrap();
    drop(guard);

    waiter.join().unwrap().unwrap();
    assert_eq!(queue.get_all(Timeout::Infinite).unwrap(), vec![3]);
}

// ----------------------------------------------------------------------------
// Cross-process
// ----------------------------------------------------------------------------

const CHILD_MODE: &str = "FILEQUEUE_TEST_CHILD";
const CHILD_QUEUE: &str = "FILEQUEUE_TEST_QUEUE";
const CHILD_DIR: &str = "FILEQUEUE_TEST_DIR";

/// Entry point for child processes spawned by the tests below. A no-op when
/// run as a regular test.
#[test]
fn child_process_entry() {
    let Ok(mode) = env::var(CHILD_MODE) else {
        return;
    };
    let queue_path = PathBuf::from(env::var(CHILD_QUEUE).unwrap());
    let dir = PathBuf::from(env::var(CHILD_DIR).unwrap());
    let queue: Queue<u64> = QueueBuilder::new(&queue_path)
        .poll_interval(Duration::from_millis(2))
        .build()
        .unwrap();

    match mode.as_str() {
        "hold" => {
            let lock = FileLock::new(queue.lock_path(), Duration::from_millis(2));
            let _guard = lock.acquire(Timeout::Infinite).unwrap();
            std::fs::write(dir.join("ready"), b"").unwrap();
            // Also stop if the parent test went away and its temp dir with it.
            while !dir.join("release").exists() && dir.exists() {
                thread::sleep(Duration::from_millis(5));
            }
        }
        "produce" => {
            let base: u64 = env::var("FILEQUEUE_TEST_BASE").unwrap().parse().unwrap();
            for i in 0..50 {
                queue.put(base + i, Timeout::Infinite).unwrap();
            }
        }
        other => panic!("unknown child mode {other}"),
    }
}

fn spawn_child(mode: &str, queue_path: &Path, dir: &Path, base: u64) -> Child {
    Command::new(env::current_exe().unwrap())
        .args(["child_process_entry", "--exact", "--test-threads=1"])
        .env(CHILD_MODE, mode)
        .env(CHILD_QUEUE, queue_path)
        .env(CHILD_DIR, dir)
        .env("FILEQUEUE_TEST_BASE", base.to_string())
        .spawn()
        .unwrap()
}

fn wait_for(path: &Path, budget: Duration) {
    let started = Instant::now();
    while !path.exists() {
        assert!(started.elapsed() < budget, "timed out waiting for {path:?}");
        thread::sleep(Duration::from_millis(5));
    }
}

#[test]
fn test_lock_held_by_other_process() {
    let temp_dir = TempDir::new().unwrap();
    let queue = create_queue::<u64>(&temp_dir);
    queue.put_batch([1, 2, 3], Timeout::Infinite).unwrap();

    let mut child = spawn_child("hold", queue.path(), temp_dir.path(), 0);
    wait_for(&temp_dir.path().join("ready"), Duration::from_secs(30));

    let started = Instant::now();
    assert!(queue.put(4, Timeout::Immediate).unwrap_err().is_lock_timeout());
    assert!(started.elapsed() < Duration::from_secs(1));
    assert!(
        queue
            .get_all(Timeout::Bounded(Duration::from_millis(100)))
            .unwrap_err()
            .is_lock_timeout()
    );

    std::fs::write(temp_dir.path().join("release"), b"").unwrap();
    assert!(child.wait().unwrap().success());

    assert_eq!(queue.get_all(Timeout::Immediate).unwrap(), vec![1, 2, 3]);
}

#[test]
fn test_producers_in_separate_processes() {
    let temp_dir = TempDir::new().unwrap();
    let queue = create_queue::<u64>(&temp_dir);

    let children: Vec<_> = [0_u64, 1000, 2000]
        .into_iter()
        .map(|base| spawn_child("produce", queue.path(), temp_dir.path(), base))
        .collect();
    for mut child in children {
        assert!(child.wait().unwrap().success());
    }

    let mut items = queue.get_all(Timeout::Infinite).unwrap();
    assert_eq!(items.len(), 150);
    items.sort_unstable();
    let expected: Vec<u64> = [0_u64, 1000, 2000]
        .into_iter()
        .flat_map(|base| base..base + 50)
        .collect();
    assert_eq!(items, expected);
}
