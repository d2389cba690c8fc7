// SPDX-License-Identifier: MIT
// Copyright (c) 2026 Alfred Jean LLC

//! Benchmarks for sync planning and output normalization.

#![allow(clippy::expect_used)]

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use cs_core::{
    plan, Capabilities, ContentHash, Direction, FileRecord, OsFamily, Permissions, PlanOptions,
    RelPath, Snapshot,
};
use crossync::normalize::{normalize, Conversion};

/// `dirs` directories of `files` files each.
fn tree(dirs: usize, files: usize, salt: &str) -> Snapshot {
    let mut records = Vec::with_capacity(dirs * (files + 1));
    for d in 0..dirs {
        let dir = RelPath::new(format!("dir{}", d)).expect("valid path");
        for f in 0..files {
            let path = dir.join(&format!("file{}.txt", f)).expect("valid path");
            let content = format!("{}{}{}", salt, d, f);
            records.push(FileRecord::file(
                path,
                content.len() as u64,
                ContentHash::of_bytes(content.as_bytes()),
                Permissions::mode(0o644),
            ));
        }
        records.push(FileRecord::dir(dir, Permissions::mode(0o755)));
    }
    Snapshot::from_records(records)
}

fn planning(c: &mut Criterion) {
    let mut group = c.benchmark_group("plan");
    let options = PlanOptions::new(Direction::LocalToRemote);

    for size in [10usize, 100] {
        let source = tree(size, 50, "a");
        let same = source.clone();
        let changed = tree(size, 50, "b");
        let empty = Snapshot::new();

        for (os, caps) in [
            ("linux", Capabilities::for_os(OsFamily::Linux)),
            ("windows", Capabilities::for_os(OsFamily::Windows)),
        ] {
            let id = format!("{}_{}", os, size * 50);
            group.bench_with_input(BenchmarkId::new("create_all", &id), &empty, |b, dest| {
                b.iter(|| plan(&source, dest, None, &options, &caps))
            });
            group.bench_with_input(BenchmarkId::new("up_to_date", &id), &same, |b, dest| {
                b.iter(|| plan(&source, dest, None, &options, &caps))
            });
            group.bench_with_input(BenchmarkId::new("update_all", &id), &changed, |b, dest| {
                b.iter(|| plan(&source, dest, None, &options, &caps))
            });
        }
    }
    group.finish();
}

fn line_endings(c: &mut Criterion) {
    let mut group = c.benchmark_group("normalize");
    let crlf = "some output line\r\n".repeat(4096).into_bytes();
    let lf = "some output line\n".repeat(4096).into_bytes();

    group.bench_function("crlf_to_lf", |b| {
        b.iter(|| normalize(&crlf, Conversion::CrlfToLf))
    });
    group.bench_function("lf_to_crlf", |b| {
        b.iter(|| normalize(&lf, Conversion::LfToCrlf))
    });
    group.finish();
}

criterion_group!(benches, planning, line_endings);
criterion_main!(benches);
