use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use metapop_codec::{Codec, SparseZ, Unpacked, UnpackedZ};
use rand::Rng;
use std::hint::black_box;

/// A patches x lineages matrix where each patch holds one lineage at capacity.
fn occupancy(patches: usize, lineages: usize, capacity: u32) -> Vec<u32> {
    let mut rng = rand::rng();
    let mut values = vec![0u32; patches * lineages];
    for p in 0..patches {
        let l = rng.random_range(0..lineages);
        values[p * lineages + l] = capacity;
    }
    values
}

fn bench_codecs(c: &mut Criterion) {
    let strategies: Vec<(&str, Box<dyn Codec>)> = vec![
        ("Unpacked", Box::new(Unpacked)),
        ("UnpackedZ", Box::new(UnpackedZ)),
        ("SparseZ", Box::new(SparseZ)),
    ];

    let shapes = vec![("Small", 1_000, 10), ("Medium", 10_000, 100), ("Wide", 5_000, 1_000)];

    for (shape_name, patches, lineages) in shapes {
        let input = occupancy(patches, lineages, 1);
        for (name, codec) in &strategies {
            let size = codec.encode(&input).map(|e| e.len()).unwrap_or(0);
            eprintln!("{shape_name} {name}: {size} bytes");
        }

        let mut group_encode = c.benchmark_group(format!("Encode_{shape_name}"));
        group_encode.throughput(Throughput::Bytes((input.len() * 4) as u64));
        for (name, codec) in &strategies {
            group_encode.bench_with_input(BenchmarkId::from_parameter(name), &input, |b, i| {
                b.iter(|| codec.encode(black_box(i)).unwrap())
            });
        }
        group_encode.finish();

        let mut group_decode = c.benchmark_group(format!("Decode_{shape_name}"));
        group_decode.throughput(Throughput::Bytes((input.len() * 4) as u64));
        for (name, codec) in &strategies {
            let encoded = codec.encode(&input).unwrap();
            group_decode.bench_with_input(BenchmarkId::from_parameter(name), &encoded, |b, e| {
                b.iter(|| codec.decode(black_box(e)).unwrap())
            });
        }
        group_decode.finish();
    }
}

criterion_group!(benches, bench_codecs);
criterion_main!(benches);
