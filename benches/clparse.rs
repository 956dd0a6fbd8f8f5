//! Criterion benchmarks for command list parsing.
//!
//! Parsing runs once per configuration when a device is mapped and again on
//! every `set_state_values`, so long command lists with several patterns are
//! the interesting case.
//!
//! Run with: cargo bench --bench clparse

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use daq_control_map::container::{FieldInfo, Group, MemoryContainer};
use daq_control_map::dtype::DType;
use daq_control_map::parser::{CommandList, CommandListParser, PatternSet};
use daq_control_map::MapperRegistry;

const FREQ: &str = r"(?P<FREQ>(\bFREQ\s)(?P<VALUE>(\d+\.\d*|\.\d+|\d+\b)))";
const VOLT: &str = r"(?P<VOLT>(\bVOLT\s)(?P<VALUE>(\d+\.\d*|\.\d+|\d+\b)))";

fn command_list(rows: usize) -> CommandList {
    (0..rows)
        .map(|i| format!("FREQ {}.0 VOLT {} OUTP ON", 50_000 + 10 * i, i % 20))
        .collect::<Vec<String>>()
        .into()
}

/// Parse command lists of increasing length with two patterns.
fn clparse_rows(c: &mut Criterion) {
    let mut group = c.benchmark_group("clparse_rows");
    let patterns = PatternSet::from([FREQ, VOLT]);

    for rows in [10, 100, 1000] {
        let parser = CommandListParser::new(command_list(rows));
        group.throughput(Throughput::Elements(rows as u64));
        group.bench_with_input(BenchmarkId::from_parameter(rows), &parser, |b, parser| {
            b.iter(|| black_box(parser.apply(patterns.clone()).unwrap()));
        });
    }

    group.finish();
}

/// Pattern validation alone, which precedes every parse.
fn pattern_compile(c: &mut Criterion) {
    let patterns = PatternSet::from([FREQ, VOLT]);
    c.bench_function("pattern_compile", |b| {
        b.iter(|| black_box(patterns.compile().unwrap()));
    });
}

/// Build every device of a synthetic container with many waveform
/// configurations.
fn registry_build(c: &mut Criterion) {
    let mut mem = MemoryContainer::new();
    let cl = command_list(50).as_slice().join("\n");
    for i in 0..20 {
        mem.set_attr(
            &format!("/Raw data + config/Waveform/waveform_{i:02}"),
            "Waveform command list",
            cl.as_str(),
        );
    }
    mem.add_dataset(
        "/Raw data + config/Waveform/Run time list",
        vec![
            FieldInfo::scalar("Shot number", DType::Int32),
            FieldInfo::scalar("Command index", DType::Int32),
        ],
    );
    let root = Group::open(mem.into_shared(), "/Raw data + config").unwrap();
    let registry = MapperRegistry::new();

    c.bench_function("registry_build_waveform_20", |b| {
        b.iter(|| black_box(registry.build(&root)));
    });
}

criterion_group!(benches, clparse_rows, pattern_compile, registry_build);
criterion_main!(benches);
