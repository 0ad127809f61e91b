//! Tracker benchmarks
//!
//! ```bash
//! cargo bench --package swinglab-vision --bench tracking
//! ```

use std::time::Duration;

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use swinglab_models::{BoundingBox, Detection, ObjectClass};
use swinglab_vision::{MultiObjectTracker, TrackerConfig, TrackingCoordinator};

/// `count` boxes drifting right by a few pixels per frame.
fn detections(frame: usize, count: usize) -> Vec<Detection> {
    (0..count)
        .map(|i| {
            let x = 50.0 + i as f64 * 120.0 + frame as f64 * 3.0;
            Detection::new(
                BoundingBox::new(x, 100.0, x + 80.0, 300.0),
                0.9,
                ObjectClass::Person,
            )
        })
        .collect()
}

fn bench_multi_object_update(c: &mut Criterion) {
    let mut group = c.benchmark_group("multi_object_update");
    group.warm_up_time(Duration::from_secs(1));
    group.measurement_time(Duration::from_secs(3));

    for count in [1usize, 3, 10] {
        let frames: Vec<Vec<Detection>> = (0..60).map(|f| detections(f, count)).collect();

        group.throughput(Throughput::Elements(frames.len() as u64));
        group.bench_with_input(BenchmarkId::new("objects", count), &frames, |b, frames| {
            b.iter(|| {
                let mut tracker = MultiObjectTracker::new(TrackerConfig::default());
                for dets in frames {
                    black_box(tracker.update(black_box(dets)));
                }
            })
        });
    }

    group.finish();
}

fn bench_coordinator(c: &mut Criterion) {
    let person = Detection::new(BoundingBox::new(100.0, 50.0, 200.0, 350.0), 0.9, ObjectClass::Person);
    let bat = Detection::new(BoundingBox::new(180.0, 150.0, 260.0, 170.0), 0.8, ObjectClass::Bat)
        .with_angle(20.0);

    c.bench_function("coordinator_update_frame", |b| {
        b.iter(|| {
            let mut coordinator = TrackingCoordinator::new();
            for i in 0..60 {
                black_box(coordinator.update_frame(Some(&person), Some(&bat), None, None, i));
            }
        })
    });
}

criterion_group!(benches, bench_multi_object_update, bench_coordinator);
criterion_main!(benches);
