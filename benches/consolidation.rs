use std::fmt::Write as _;
use std::fs;
use std::hint::black_box;
use std::path::Path;

use cnpj_etl::config::PipelineConfig;
use cnpj_etl::ingestion::ConsolidationEngine;
use cnpj_etl::processing::AggregationEngine;
use criterion::{BenchmarkId, Criterion, Throughput, criterion_group, criterion_main};

/// Writes a synthetic export with `companies` entities: one company row, one establishment row
/// and two partner rows each.
fn write_export(working: &Path, companies: usize) {
    let mut empresas = String::new();
    let mut estab = String::new();
    let mut socios = String::new();
    for i in 0..companies {
        let key = 10_000_000 + i;
        let status = if i % 3 == 0 { "08" } else { "02" };
        writeln!(
            empresas,
            "\"{key}\";\"EMPRESA {i} LTDA\";\"2062\";\"49\";\"{i},00\";\"01\";\"\""
        )
        .unwrap();
        writeln!(
            estab,
            "\"{key}\";\"0001\";\"00\";\"1\";\"LOJA {i}\";\"{status}\";\"20200101\";\"00\";\"\";\"\";\"20100101\";\"4711302\";\"4712100,4721102\";\"RUA\";\"A\";\"{i}\";\"\";\"CENTRO\";\"01001000\";\"SP\";\"7107\";\"11\";\"30000000\";\"\";\"\";\"\";\"\";\"x@y.com\";\"\";\"\""
        )
        .unwrap();
        for name in ["ANA", "BRUNO"] {
            writeln!(
                socios,
                "\"{key}\";\"2\";\"{name} {i}\";\"***000000**\";\"49\";\"20100101\";\"\";\"***000000**\";\"\";\"00\";\"4\""
            )
            .unwrap();
        }
    }

    for (dir, file, body) in [
        ("Empresas0", "K3241.K03200Y0.D50111.EMPRECSV", empresas),
        ("Estabelecimentos0", "K3241.K03200Y0.D50111.ESTABELE", estab),
        ("Socios0", "K3241.K03200Y0.D50111.SOCIOCSV", socios),
    ] {
        fs::create_dir_all(working.join(dir)).unwrap();
        fs::write(working.join(dir).join(file), body).unwrap();
    }
}

fn bench_consolidation(c: &mut Criterion) {
    let config = PipelineConfig::default();
    let engine = ConsolidationEngine::standard(&config);
    let mut group = c.benchmark_group("consolidate");
    for companies in [1_000usize, 10_000] {
        let dir = tempfile::tempdir().unwrap();
        let working = dir.path().join("Temp_brutos");
        write_export(&working, companies);
        let artifact = dir.path().join("CSV_Mestre_Final.csv");

        group.throughput(Throughput::Elements((companies * 4) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(companies), &companies, |b, _| {
            b.iter(|| black_box(engine.consolidate(&working, &artifact).unwrap()))
        });
    }
    group.finish();
}

fn bench_aggregation(c: &mut Criterion) {
    let config = PipelineConfig::default();
    let consolidator = ConsolidationEngine::standard(&config);
    let aggregator = AggregationEngine::from_config(&config);
    let mut group = c.benchmark_group("aggregate");
    for companies in [1_000usize, 10_000] {
        let dir = tempfile::tempdir().unwrap();
        let working = dir.path().join("Temp_brutos");
        write_export(&working, companies);
        let artifact = dir.path().join("CSV_Mestre_Final.csv");
        consolidator.consolidate(&working, &artifact).unwrap();

        group.throughput(Throughput::Elements((companies * 4) as u64));
        group.bench_with_input(BenchmarkId::from_parameter(companies), &companies, |b, _| {
            b.iter(|| black_box(aggregator.aggregate(&artifact).unwrap()))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_consolidation, bench_aggregation);
criterion_main!(benches);
