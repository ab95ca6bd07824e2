//! The fixed table of positional field mappings and the canonical header derived from it.

use std::collections::{HashMap, HashSet};

use crate::error::{PipelineError, PipelineResult};

use super::SourceTableKind;

/// Name of the trailing column that records which table produced a row.
pub const PROVENANCE_FIELD: &str = "TABELA_ORIGEM";

const CNAES: &[(usize, &str)] = &[(0, "codigo_cnae"), (1, "descricao_cnae")];
const MOTIVOS: &[(usize, &str)] = &[(0, "codigo_motivo"), (1, "descricao_motivo")];
const MUNIC: &[(usize, &str)] = &[(0, "codigo_municipio"), (1, "nome_municipio")];
const NATJU: &[(usize, &str)] = &[
    (0, "codigo_natureza_juridica"),
    (1, "descricao_natureza_juridica"),
];
const PAIS: &[(usize, &str)] = &[(0, "codigo_pais"), (1, "descricao_pais")];
const QUALS: &[(usize, &str)] = &[(0, "codigo_qualificacao"), (1, "descricao_qualificacao")];
const EMPRE: &[(usize, &str)] = &[
    (0, "cnpj_basico"),
    (1, "razao_social"),
    (2, "natureza_juridica"),
    (3, "qualificacao_socio_responsavel"),
    (4, "capital_social"),
    (5, "porte_empresa"),
    (6, "ente_federativo_responsavel"),
];
const ESTABELE: &[(usize, &str)] = &[
    (0, "cnpj_basico"),
    (1, "cnpj_ordem"),
    (2, "cnpj_dv"),
    (3, "matriz_filial"),
    (4, "nome_fantasia"),
    (5, "situacao_cadastral"),
    (6, "data_situacao_cadastral"),
    (7, "motivo_situacao_cadastral"),
    (8, "nome_cidade_exterior"),
    (9, "pais"),
    (10, "data_inicio_atividade"),
    (11, "cnae_fiscal_principal"),
    (12, "cnae_fiscal_secundario"),
    (13, "logradouro"),
    (14, "numero"),
    (15, "complemento"),
    (16, "bairro"),
    (17, "cep"),
    (18, "uf"),
    (19, "codigo_municipio"),
    (20, "ddd_1"),
    (21, "telefone_1"),
    (22, "ddd_2"),
    (23, "telefone_2"),
    (24, "ddd_fax"),
    (25, "fax"),
    (26, "correio_eletronico"),
    (27, "situacao_especial"),
    (28, "data_situacao_especial"),
];
const SOCIO: &[(usize, &str)] = &[
    (0, "cnpj_basico"),
    (1, "tipo_socio"),
    (2, "nome_socio"),
    (3, "cpf_cnpj_socio"),
    (4, "qualificacao_socio"),
    (5, "data_entrada_sociedade"),
    (6, "pais"),
    (7, "representante_legal"),
    (8, "nome_representante"),
    (9, "qualificacao_representante"),
    (10, "data_entrada_representante"),
];
const SIMPLES: &[(usize, &str)] = &[
    (0, "cnpj_basico"),
    (1, "opcao_simples"),
    (2, "data_opcao_simples"),
    (3, "data_exclusao_simples"),
    (4, "opcao_mei"),
    (5, "data_opcao_mei"),
    (6, "data_exclusao_mei"),
];

/// Output column order. Names that no mapping produces are filtered out.
const PRIORITY: &[&str] = &[
    "cnpj_basico",
    "razao_social",
    "cnpj_ordem",
    "cnpj_dv",
    "matriz_filial",
    "nome_fantasia",
    "situacao_cadastral",
    "data_situacao_cadastral",
    "motivo_situacao_cadastral",
    "logradouro",
    "numero",
    "complemento",
    "bairro",
    "cep",
    "uf",
    "codigo_municipio",
    "ddd_1",
    "telefone_1",
    "correio_eletronico",
    "capital_social",
    "porte_empresa",
    "ente_federativo_responsavel",
    "data_inicio_atividade",
    "situacao_especial",
    "data_situacao_especial",
    "tipo_socio",
    "nome_socio",
    "cpf_cnpj_socio",
    "qualificacao_socio",
    "data_entrada_sociedade",
    "representante_legal",
    "nome_representante",
    "qualificacao_representante",
    "opcao_simples",
    "data_opcao_simples",
    "data_exclusao_simples",
    "opcao_mei",
    "data_opcao_mei",
    "data_exclusao_mei",
    "natureza_juridica",
    "codigo_natureza_juridica",
    "descricao_natureza_juridica",
    "qualificacao_socio_responsavel",
    "codigo_qualificacao",
    "descricao_qualificacao",
    "codigo_pais",
    "descricao_pais",
    "pais",
    "nome_cidade_exterior",
    "codigo_cnae",
    "descricao_cnae",
    "cnae_fiscal_principal",
    "cnae_fiscal_secundario",
    "codigo_motivo",
    "descricao_motivo",
    "nome_municipio",
];

/// Positional mapping of one table kind onto canonical field names.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldMapping {
    pub kind: SourceTableKind,
    /// `(source column index, canonical field name)`, in source order.
    pub fields: Vec<(usize, String)>,
}

impl FieldMapping {
    pub fn new(kind: SourceTableKind, fields: &[(usize, &str)]) -> Self {
        Self {
            kind,
            fields: fields.iter().map(|(i, n)| (*i, n.to_string())).collect(),
        }
    }
}

/// The unified artifact's column list: priority-ordered canonical names plus the provenance
/// field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CanonicalHeader {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl CanonicalHeader {
    /// Keeps the names of `priority` that some mapping produces, then appends
    /// [`PROVENANCE_FIELD`]. Duplicates in `priority` keep their first position.
    pub fn derive(priority: &[&str], mappings: &[FieldMapping]) -> Self {
        let produced: HashSet<&str> = mappings
            .iter()
            .flat_map(|m| m.fields.iter().map(|(_, name)| name.as_str()))
            .collect();

        let mut names: Vec<String> = Vec::with_capacity(priority.len() + 1);
        for name in priority {
            if produced.contains(name) && !names.iter().any(|n| n == name) {
                names.push(name.to_string());
            }
        }
        names.push(PROVENANCE_FIELD.to_string());

        let positions = names
            .iter()
            .enumerate()
            .map(|(i, n)| (n.clone(), i))
            .collect();
        Self { names, positions }
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    /// Index of the provenance column (always the last one).
    pub fn provenance_index(&self) -> usize {
        self.names.len() - 1
    }
}

/// Immutable registry of mappings, built once and shared by the classifier and engines.
#[derive(Debug, Clone)]
pub struct SchemaRegistry {
    mappings: HashMap<SourceTableKind, FieldMapping>,
    /// Per kind: `(source index, header position)` for every mapped name present in the header.
    projections: HashMap<SourceTableKind, Vec<(usize, usize)>>,
    header: CanonicalHeader,
}

impl SchemaRegistry {
    /// The registry export layout.
    pub fn standard() -> Self {
        let mappings = [
            (SourceTableKind::ClassificationCode, CNAES),
            (SourceTableKind::ReasonCode, MOTIVOS),
            (SourceTableKind::Municipality, MUNIC),
            (SourceTableKind::LegalNature, NATJU),
            (SourceTableKind::Country, PAIS),
            (SourceTableKind::QualificationCode, QUALS),
            (SourceTableKind::EntityMaster, EMPRE),
            (SourceTableKind::Establishment, ESTABELE),
            (SourceTableKind::Owner, SOCIO),
            (SourceTableKind::SimplifiedTaxRegime, SIMPLES),
        ]
        .into_iter()
        .map(|(kind, fields)| FieldMapping::new(kind, fields))
        .collect::<Vec<_>>();
        Self::build(mappings, PRIORITY)
    }

    /// Builds a registry from custom mappings, rejecting duplicate kinds, duplicate source
    /// indices within a kind, and any field named [`PROVENANCE_FIELD`].
    pub fn new(mappings: Vec<FieldMapping>, priority: &[&str]) -> PipelineResult<Self> {
        let mut kinds = HashSet::new();
        for mapping in &mappings {
            if !kinds.insert(mapping.kind) {
                return Err(PipelineError::Config {
                    message: format!("duplicate mapping for table kind {}", mapping.kind),
                });
            }
            let mut seen = HashSet::new();
            for (idx, name) in &mapping.fields {
                if name == PROVENANCE_FIELD {
                    return Err(PipelineError::Config {
                        message: format!(
                            "table kind {} maps source index {idx} to the reserved column \
                             {PROVENANCE_FIELD}",
                            mapping.kind
                        ),
                    });
                }
                if !seen.insert(*idx) {
                    return Err(PipelineError::Config {
                        message: format!(
                            "table kind {} maps source index {idx} twice (second: '{name}')",
                            mapping.kind
                        ),
                    });
                }
            }
        }
        Ok(Self::build(mappings, priority))
    }

    fn build(mappings: Vec<FieldMapping>, priority: &[&str]) -> Self {
        let header = CanonicalHeader::derive(priority, &mappings);
        let projections = mappings
            .iter()
            .map(|m| {
                let projection = m
                    .fields
                    .iter()
                    .filter_map(|(src, name)| header.position(name).map(|pos| (*src, pos)))
                    .collect();
                (m.kind, projection)
            })
            .collect();
        let mappings = mappings.into_iter().map(|m| (m.kind, m)).collect();
        Self {
            mappings,
            projections,
            header,
        }
    }

    pub fn header(&self) -> &CanonicalHeader {
        &self.header
    }

    pub fn mapping(&self, kind: SourceTableKind) -> Option<&FieldMapping> {
        self.mappings.get(&kind)
    }

    /// `(source index, header position)` pairs for `kind`; empty for an unmapped kind.
    pub fn projection(&self, kind: SourceTableKind) -> &[(usize, usize)] {
        self.projections
            .get(&kind)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }
}
