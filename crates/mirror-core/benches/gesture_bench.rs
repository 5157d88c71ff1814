//! Criterion benchmarks for [`GestureClassifier`] press/release classification.
//!
//! Run with:
//! ```bash
//! cargo bench --package mirror-core --bench gesture_bench
//! ```

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use mirror_core::{GestureClassifier, Point};

fn bench_classify(c: &mut Criterion) {
    let mut group = c.benchmark_group("gesture_classify");

    group.bench_function("tap", |b| {
        let mut classifier = GestureClassifier::default();
        b.iter(|| {
            classifier.press(black_box(Some(Point::new(100, 100))));
            classifier.release(black_box(Some(Point::new(102, 101))))
        })
    });

    group.bench_function("drag", |b| {
        let mut classifier = GestureClassifier::default();
        b.iter(|| {
            classifier.press(black_box(Some(Point::new(100, 100))));
            classifier.release(black_box(Some(Point::new(500, 900))))
        })
    });

    // Release with no press: the drop path.
    group.bench_function("orphan_release", |b| {
        let mut classifier = GestureClassifier::default();
        b.iter(|| classifier.release(black_box(Some(Point::new(1, 1)))))
    });

    group.finish();
}

criterion_group!(benches, bench_classify);
criterion_main!(benches);
