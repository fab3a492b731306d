use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use modfeat_core::insertion::pack_insertion;
use modfeat_core::{encode_read, AlignedRead, Region, Strand};
use noodles::sam::alignment::record::cigar::{op::Kind, Op};

/// Long read with an insertion and a deletion every 50 bases.
fn generate_read(strand: Strand, length: usize) -> AlignedRead {
    let mut cigar = Vec::new();
    let mut read_len = 0;
    while read_len + 52 <= length {
        cigar.push(Op::new(Kind::Match, 50));
        cigar.push(Op::new(Kind::Insertion, 2));
        cigar.push(Op::new(Kind::Deletion, 1));
        read_len += 52;
    }
    cigar.push(Op::new(Kind::Match, length - read_len));

    let sequence = b"ACGTTGCA".iter().cycle().take(length).copied().collect();
    let qualities = (0..length).map(|i| (i % 40) as u8 + 5).collect();
    AlignedRead::new(strand, 0, cigar, sequence, qualities)
}

fn bench_encode_read(c: &mut Criterion) {
    let mut group = c.benchmark_group("encode_read");

    for window in [21u64, 201, 1001] {
        let forward = generate_read(Strand::Forward, 20_000);
        let reverse = generate_read(Strand::Reverse, 20_000);
        let plus = Region::new("chr1", 5_000, 5_000 + window, Strand::Forward).unwrap();
        let minus = Region::new("chr1", 5_000, 5_000 + window, Strand::Reverse).unwrap();

        group.bench_with_input(BenchmarkId::new("forward", window), &window, |b, _| {
            b.iter(|| black_box(encode_read(black_box(&forward), &plus)))
        });
        group.bench_with_input(BenchmarkId::new("reverse", window), &window, |b, _| {
            b.iter(|| black_box(encode_read(black_box(&reverse), &minus)))
        });
    }

    group.finish();
}

fn bench_pack_insertion(c: &mut Criterion) {
    let short = b"ACGTA".to_vec();
    let long: Vec<u8> = b"ACGT".iter().cycle().take(500).copied().collect();

    c.bench_function("pack_insertion_5", |b| b.iter(|| black_box(pack_insertion(black_box(&short)))));
    c.bench_function("pack_insertion_500", |b| b.iter(|| black_box(pack_insertion(black_box(&long)))));
}

criterion_group!(benches, bench_encode_read, bench_pack_insertion);
criterion_main!(benches);
