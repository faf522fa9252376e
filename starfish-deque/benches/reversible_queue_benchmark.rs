//! Benchmark for ReversibleQueue against a Mutex<VecDeque> baseline.
//!
//! Run with: cargo bench --package starfish-deque --bench reversible_queue_benchmark

use criterion::BenchmarkId;
use criterion::Criterion;
use criterion::black_box;
use criterion::criterion_group;
use criterion::criterion_main;
use mimalloc::MiMalloc;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, mpsc};
use std::thread;

use starfish_deque::QueueError;
use starfish_deque::data_structures::ReversibleQueue;

#[global_allocator]
static GLOBAL: MiMalloc = MiMalloc;

const OPS_PER_THREAD: usize = 10_000;
const TRAVERSAL_LEN: usize = 10_000;

// ============================================================================
// Boundary push/pop
// ============================================================================

fn bench_reversible_push_pop(thread_count: usize, ops_per_thread: usize) {
    let queue: Arc<ReversibleQueue<usize>> = Arc::new(ReversibleQueue::new());
    let mut handles = vec![];

    for t in 0..thread_count {
        let queue = Arc::clone(&queue);
        handles.push(thread::spawn(move || {
            for i in 0..ops_per_thread {
                if (t + i) % 2 == 0 {
                    queue.push_back(i);
                    let _ = queue.pop_front();
                } else {
                    queue.push_front(i);
                    let _ = queue.pop_back();
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

fn bench_mutex_deque_push_pop(thread_count: usize, ops_per_thread: usize) {
    let queue: Arc<Mutex<VecDeque<usize>>> = Arc::new(Mutex::new(VecDeque::new()));
    let mut handles = vec![];

    for t in 0..thread_count {
        let queue = Arc::clone(&queue);
        handles.push(thread::spawn(move || {
            for i in 0..ops_per_thread {
                if (t + i) % 2 == 0 {
                    queue.lock().unwrap().push_back(i);
                    let _ = queue.lock().unwrap().pop_front();
                } else {
                    queue.lock().unwrap().push_front(i);
                    let _ = queue.lock().unwrap().pop_back();
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

// ============================================================================
// Cursor traversal
// ============================================================================

fn sum_forward(queue: &ReversibleQueue<usize>) -> usize {
    let mut cursor = queue.cursor();
    if cursor.go_to_front().is_err() {
        return 0;
    }

    let mut sum = 0;
    loop {
        sum += *cursor.data().unwrap();
        match cursor.move_forward() {
            Ok(()) => {}
            Err(QueueError::BoundaryReached) => return sum,
            Err(error) => panic!("{}", error),
        }
    }
}

fn sum_backward(queue: &ReversibleQueue<usize>) -> usize {
    let mut cursor = queue.cursor();
    if cursor.go_to_back().is_err() {
        return 0;
    }

    let mut sum = 0;
    loop {
        sum += *cursor.data().unwrap();
        match cursor.move_backward() {
            Ok(()) => {}
            Err(QueueError::BoundaryReached) => return sum,
            Err(error) => panic!("{}", error),
        }
    }
}

fn bench_concurrent_traversal(queue: &Arc<ReversibleQueue<usize>>, thread_count: usize) {
    let mut handles = vec![];

    for t in 0..thread_count {
        let queue = Arc::clone(queue);
        handles.push(thread::spawn(move || {
            if t % 2 == 0 {
                black_box(sum_forward(&queue));
            } else {
                black_box(sum_backward(&queue));
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

// ============================================================================
// Cursor insert/erase at scattered positions
// ============================================================================

fn bench_cursor_insert_erase(thread_count: usize, ops_per_thread: usize) {
    let queue: Arc<ReversibleQueue<usize>> = Arc::new((0..thread_count * 64).collect());
    let (positioned_tx, positioned_rx) = mpsc::channel();
    let mut handles = vec![];

    // Deepest cursor first, so no thread has to walk past a parked one
    for t in (0..thread_count).rev() {
        let queue = Arc::clone(&queue);
        let positioned_tx = positioned_tx.clone();
        handles.push(thread::spawn(move || {
            let mut cursor = queue.cursor();
            cursor.go_to_front().unwrap();
            for _ in 0..t * 64 {
                cursor.move_forward().unwrap();
            }
            positioned_tx.send(()).unwrap();

            for i in 0..ops_per_thread {
                if cursor.insert(i).is_ok() {
                    let _ = cursor.erase();
                }
            }
        }));
        positioned_rx.recv().unwrap();
    }

    for handle in handles {
        handle.join().unwrap();
    }
}

// ============================================================================
// Criterion benchmark groups
// ============================================================================

fn push_pop_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("push_pop_benchmark");

    for threads in [1, 2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::new("push_pop_reversible_queue", threads),
            &threads,
            |b, &threads| {
                b.iter(|| bench_reversible_push_pop(black_box(threads), black_box(OPS_PER_THREAD)))
            },
        );

        group.bench_with_input(
            BenchmarkId::new("push_pop_mutex_vec_deque", threads),
            &threads,
            |b, &threads| {
                b.iter(|| bench_mutex_deque_push_pop(black_box(threads), black_box(OPS_PER_THREAD)))
            },
        );
    }

    group.finish();
}

fn traversal_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("traversal_benchmark");
    let queue: Arc<ReversibleQueue<usize>> = Arc::new((0..TRAVERSAL_LEN).collect());

    for threads in [1, 2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::new("traversal_both_directions", threads),
            &threads,
            |b, &threads| b.iter(|| bench_concurrent_traversal(&queue, black_box(threads))),
        );
    }

    group.finish();
}

fn reverse_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("reverse_benchmark");

    for len in [1_000, 10_000, 100_000] {
        let queue: ReversibleQueue<usize> = (0..len).collect();
        group.bench_with_input(BenchmarkId::new("reverse", len), &len, |b, _| {
            b.iter(|| queue.reverse().unwrap())
        });
    }

    group.finish();
}

fn cursor_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("cursor_benchmark");

    for threads in [1, 2, 4, 8] {
        group.bench_with_input(
            BenchmarkId::new("cursor_insert_erase", threads),
            &threads,
            |b, &threads| {
                b.iter(|| bench_cursor_insert_erase(black_box(threads), black_box(OPS_PER_THREAD)))
            },
        );
    }

    group.finish();
}

criterion_group!(
    benches,
    push_pop_benchmark,
    traversal_benchmark,
    reverse_benchmark,
    cursor_benchmark,
);
criterion_main!(benches);
