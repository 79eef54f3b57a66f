use criterion::{criterion_group, criterion_main, Criterion, Throughput};
use std::hint::black_box;

use interlace::buffer::ByteBuffer;
use interlace::encoding::Encoding;
use interlace::interp::{Caret, Interpretation};

fn setup_interp(lines: usize) -> Interpretation {
    let mut text = Vec::new();
    for i in 0..lines {
        text.extend_from_slice(format!("line number {} with some text\r\n", i).as_bytes());
    }
    Interpretation::new(ByteBuffer::new(text), Encoding::Utf8)
}

fn interp_insertion(c: &mut Criterion) {
    let mut group = c.benchmark_group("interp_insertion");

    group.bench_function("insert_char_middle", |b| {
        b.iter_batched(
            || setup_interp(1_000),
            |mut interp| {
                let mid = interp.num_chars() / 2;
                for i in 0..100 {
                    interp.insert(&[Caret::at(black_box(mid + i))], b"a");
                }
            },
            criterion::BatchSize::SmallInput,
        )
    });

    group.bench_function("multi_caret_insert", |b| {
        b.iter_batched(
            || setup_interp(1_000),
            |mut interp| {
                let step = interp.num_chars() / 32;
                let carets: Vec<Caret> = (0..32).map(|i| Caret::at(i * step)).collect();
                interp.insert(black_box(&carets), b"_");
            },
            criterion::BatchSize::SmallInput,
        )
    });

    static CLIP: &str = "pasted\r\nclip with\r\nseveral lines\r\n";
    group.throughput(Throughput::Bytes(CLIP.len() as u64));
    group.bench_function("insert_multiline_clip", |b| {
        b.iter_batched(
            || setup_interp(1_000),
            |mut interp| {
                let mid = interp.num_chars() / 2;
                interp.insert(&[Caret::at(black_box(mid))], CLIP.as_bytes());
            },
            criterion::BatchSize::SmallInput,
        )
    });

    group.finish();
}

fn interp_deletion(c: &mut Criterion) {
    let mut group = c.benchmark_group("interp_deletion");

    group.bench_function("backspace_run", |b| {
        b.iter_batched(
            || setup_interp(1_000),
            |mut interp| {
                let mid = interp.num_chars() / 2;
                for i in 0..100 {
                    interp.backspace(&[Caret::at(black_box(mid - i))]);
                }
            },
            criterion::BatchSize::SmallInput,
        )
    });

    group.bench_function("delete_selection", |b| {
        b.iter_batched(
            || setup_interp(1_000),
            |mut interp| {
                let mid = interp.num_chars() / 2;
                interp.delete(&[Caret::selecting(mid, mid + 500)]);
            },
            criterion::BatchSize::SmallInput,
        )
    });

    group.finish();
}

criterion_group!(benches, interp_insertion, interp_deletion);
criterion_main!(benches);
