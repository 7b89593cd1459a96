use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rand::Rng;
use ringparse::{InputParser, ParserConfig, RecordSource, VecSource};

const RECORDS: usize = 100_000;
const FEATURES: usize = 32;

/// Source that fills the slot's vector in place, like a dense text reader
/// reusing its output buffer.
struct SyntheticSource {
    remaining: usize,
    row: Vec<f32>,
}

impl SyntheticSource {
    fn new(records: usize) -> Self {
        let mut rng = rand::thread_rng();
        Self {
            remaining: records,
            row: (0..FEATURES).map(|_| rng.gen::<f32>()).collect(),
        }
    }
}

impl RecordSource<f32> for SyntheticSource {
    fn read_vector(&mut self, vector: &mut Vec<f32>) -> isize {
        if self.remaining == 0 {
            return -1;
        }
        self.remaining -= 1;
        vector.clear();
        vector.extend_from_slice(&self.row);
        vector.len() as isize
    }

    fn read_vector_and_label(&mut self, vector: &mut Vec<f32>, label: &mut f64) -> isize {
        *label = (self.remaining % 2) as f64;
        self.read_vector(vector)
    }
}

fn drain(parser: &mut InputParser<f32>) -> usize {
    parser.start_parser().unwrap();
    let mut count = 0;
    while let Some(example) = parser.get_next_example() {
        black_box(example.vector());
        parser.finalize_example();
        count += 1;
    }
    parser.end_parser().unwrap();
    count
}

fn bench_ring_capacity(c: &mut Criterion) {
    let mut group = c.benchmark_group("ring_capacity");
    group.throughput(Throughput::Elements(RECORDS as u64));

    for capacity in [1usize, 16, 100, 1024] {
        for recycle in [false, true] {
            let id = format!("{}/{}", capacity, if recycle { "recycle" } else { "free" });
            group.bench_function(BenchmarkId::from_parameter(id), |b| {
                b.iter(|| {
                    let config = ParserConfig::default()
                        .with_ring_capacity(capacity)
                        .with_free_vector_after_release(!recycle);
                    let mut parser =
                        InputParser::new(SyntheticSource::new(RECORDS), config).unwrap();
                    assert_eq!(drain(&mut parser), RECORDS);
                });
            });
        }
    }

    group.finish();
}

fn bench_in_memory_source(c: &mut Criterion) {
    let mut group = c.benchmark_group("vec_source");
    group.throughput(Throughput::Elements(RECORDS as u64));

    group.bench_function("default_config", |b| {
        b.iter_with_setup(
            || {
                let records = (0..RECORDS).map(|i| (vec![i as f32; FEATURES], 1.0));
                InputParser::new(VecSource::new(records), ParserConfig::default()).unwrap()
            },
            |mut parser| {
                assert_eq!(drain(&mut parser), RECORDS);
            },
        );
    });

    group.finish();
}

criterion_group!(benches, bench_ring_capacity, bench_in_memory_source);
criterion_main!(benches);
