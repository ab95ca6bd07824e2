mod common;

use std::fs;
use std::path::{Path, PathBuf};

use cnpj_etl::config::{AggregationConfig, PipelineConfig};
use cnpj_etl::ingestion::ConsolidationEngine;
use cnpj_etl::processing::{load_dataset, AggregationEngine};
use cnpj_etl::types::{DataType, Field, Value};
use cnpj_etl::PipelineError;

use common::copy_fixture_export;

fn consolidated_fixture(dir: &Path) -> PathBuf {
    let working = dir.join("Temp_brutos");
    copy_fixture_export(&working);
    let artifact = dir.join("CSV_Mestre_Final.csv");
    ConsolidationEngine::standard(&PipelineConfig::default())
        .consolidate(&working, &artifact)
        .unwrap();
    artifact
}

#[test]
fn aggregates_fixture_export_to_active_companies() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = consolidated_fixture(dir.path());

    let engine = AggregationEngine::from_config(&PipelineConfig::default());
    let out = engine.aggregate(&artifact).unwrap();

    assert_eq!(out.summary.rows_read, 10);
    // Code-table rows carry no company key.
    assert_eq!(out.summary.dropped_empty_key, 2);
    assert_eq!(out.summary.groups, 2);
    assert_eq!(out.summary.filtered_out, 1);

    let ds = &out.dataset;
    assert_eq!(ds.row_count(), 1);
    let cell = |name: &str| ds.cell_text(0, name).unwrap().into_owned();
    assert_eq!(cell("cnpj_basico"), "10000000");
    assert_eq!(cell("razao_social"), "ACME COMERCIO LTDA");
    assert_eq!(cell("nome_fantasia"), "ACME");
    assert_eq!(cell("situacao_cadastral"), "02");
    assert_eq!(cell("natureza_juridica"), "2062");
    assert_eq!(cell("porte_empresa"), "01");
    assert_eq!(cell("cep"), "01001000");
    assert_eq!(cell("complemento"), "");
    assert_eq!(cell("opcao_simples"), "S");
    assert_eq!(cell("opcao_mei"), "N");
    assert_eq!(cell("nome_socio"), "ANA | BRUNO");
    assert_eq!(cell("qualificacao_socio"), "49 | 22");
    assert_eq!(cell("cnae_fiscal_secundario"), "4712100,4721102");

    let capital = ds.schema.index_of("capital_social").unwrap();
    assert_eq!(ds.rows[0][capital], Value::Float64(1000.0));
}

#[test]
fn disabling_the_status_filter_keeps_every_entity() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = consolidated_fixture(dir.path());

    let config = AggregationConfig {
        status_filter: None,
        ..AggregationConfig::default()
    };
    let out = AggregationEngine::new(config, b';').aggregate(&artifact).unwrap();
    assert_eq!(out.dataset.row_count(), 2);
    assert_eq!(out.dataset.cell_text(1, "cnpj_basico").as_deref(), Some("20000000"));
    assert_eq!(out.dataset.cell_text(1, "situacao_cadastral").as_deref(), Some("08"));
    assert_eq!(out.dataset.cell_text(1, "nome_socio").as_deref(), Some(""));
}

#[test]
fn owners_collect_in_first_seen_order_across_interleaving() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("unified.csv");
    fs::write(
        &artifact,
        "cnpj_basico;razao_social;situacao_cadastral;nome_socio;qualificacao_socio;cnae_fiscal_secundario;TABELA_ORIGEM\n\
         10000000;;;C;;;SOCIO\n\
         20000000;;;A;;;SOCIO\n\
         10000000;;;A;;;SOCIO\n\
         20000000;;;C;;;SOCIO\n\
         10000000;;;C;;;SOCIO\n\
         10000000;;;B;;;SOCIO\n",
    )
    .unwrap();

    let config = AggregationConfig {
        first_wins: vec!["razao_social".into(), "situacao_cadastral".into()],
        categorical: vec!["situacao_cadastral".into()],
        numeric: vec![],
        status_filter: None,
        ..AggregationConfig::default()
    };
    let out = AggregationEngine::new(config, b';').aggregate(&artifact).unwrap();
    assert_eq!(out.dataset.cell_text(0, "nome_socio").as_deref(), Some("C | A | B"));
    assert_eq!(out.dataset.cell_text(1, "nome_socio").as_deref(), Some("A | C"));
}

#[test]
fn written_report_reloads_with_leading_zeros() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = consolidated_fixture(dir.path());
    let engine = AggregationEngine::from_config(&PipelineConfig::default());
    let out = engine.aggregate(&artifact).unwrap();

    let target = dir.path().join("Empresas_Ativas.csv");
    engine.write_csv(&out.dataset, &target).unwrap();

    let reloaded = load_dataset(
        &target,
        b';',
        vec![
            Field::new("cnpj_basico", DataType::Utf8),
            Field::new("cep", DataType::Utf8),
            Field::new("nome_socio", DataType::Utf8),
        ],
    )
    .unwrap();
    assert_eq!(reloaded.row_count(), 1);
    assert_eq!(reloaded.rows[0][1], Value::Utf8("01001000".into()));
    assert_eq!(reloaded.rows[0][2], Value::Utf8("ANA | BRUNO".into()));
}

#[test]
fn artifact_without_configured_column_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let artifact = dir.path().join("unified.csv");
    fs::write(&artifact, "cnpj_basico;razao_social\n10000000;ACME\n").unwrap();

    let err = AggregationEngine::from_config(&PipelineConfig::default())
        .aggregate(&artifact)
        .unwrap_err();
    assert!(matches!(err, PipelineError::Load { .. }));
}

#[test]
fn missing_artifact_fails_to_load() {
    let dir = tempfile::tempdir().unwrap();
    let err = AggregationEngine::from_config(&PipelineConfig::default())
        .aggregate(&dir.path().join("CSV_Mestre_Final.csv"))
        .unwrap_err();
    assert!(matches!(err, PipelineError::Load { .. }));
}
