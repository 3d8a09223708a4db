use std::io::Write;

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use relclass_core::dataset::DatasetProvider;
use relclass_core::padding::{one_hot, pad_sequences};

fn bench_dataset(c: &mut Criterion) {
    let mut train = tempfile::NamedTempFile::new().unwrap();
    let lines = [
        "the tablet contains 81 mg of aspirin contains",
        "aspirin is contained in the coated tablet contains-1",
        "patients reported mild headaches after the second dose other",
        "ibuprofen was administered alongside the placebo other",
    ];
    for i in 0..500 {
        writeln!(train, "w{i} {}", lines[i % lines.len()]).unwrap();
    }

    c.bench_function("build_vocabulary_500", |b| {
        b.iter(|| DatasetProvider::build_vocabulary(black_box(train.path())).unwrap());
    });

    let provider = DatasetProvider::build_vocabulary(train.path()).unwrap();
    let examples = provider.load(train.path(), None).unwrap();
    let width = examples.max_len();

    c.bench_function("pad_and_encode_500", |b| {
        b.iter(|| {
            let xs = pad_sequences(black_box(&examples.sequences), width);
            let ys = one_hot(black_box(&examples.labels), provider.labels().len()).unwrap();
            (xs, ys)
        });
    });
}

criterion_group!(benches, bench_dataset);
criterion_main!(benches);
