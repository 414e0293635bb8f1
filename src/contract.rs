//! Maps raw Base.gov CSV rows into structured [`Contract`] entities and
//! derives the three-year [`AuditContext`] window.

use crate::error::{AuditError, Result};
use crate::normalize::{
    extract_contract_types, normalize_text, parse_date, parse_price, parse_year,
};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap};

/// One raw export row: source header → cell value. The CSV reader itself is
/// an external collaborator; the engine only consumes materialized rows.
pub type RawRow = HashMap<String, String>;

pub mod headers {
    pub const OBJETO: &str = "Objeto do Contrato";
    pub const TIPO_PROCEDIMENTO: &str = "Tipo de Procedimento";
    pub const TIPOS_CONTRATO: &str = "Tipo(s) de Contrato";
    pub const FUNDAMENTACAO: &str = "Fundamentação";
    pub const CPV: &str = "CPV";
    pub const ADJUDICANTE: &str = "Entidade(s) Adjudicante(s)";
    pub const ADJUDICATARIA: &str = "Entidade(s) Adjudicatária(s)";
    pub const PRECO_CONTRATUAL: &str = "Preço Contratual";
    pub const DATA_PUBLICACAO: &str = "Data de Publicação";
    pub const DATA_CELEBRACAO: &str = "Data de Celebração do Contrato";
    pub const PRAZO_EXECUCAO: &str = "Prazo de Execução";
    pub const LOCAL_EXECUCAO: &str = "Local de Execução";
    pub const NUMERO_ACORDO_QUADRO: &str = "N.º registo do Acordo Quadro";
    pub const ESTADO: &str = "Estado";
}

/// A procurement contract, immutable after construction. Text fields keep
/// their verbatim form; normalization happens at comparison time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contract {
    /// Composite key used for de-duplicated flagging. Not guaranteed globally
    /// unique.
    pub id: String,
    /// Fiscal year from the signing date, falling back to the publication
    /// date; 0 when neither parses.
    pub year: i32,
    /// Which file/year batch the row came from.
    pub source: String,
    pub objeto: String,
    pub tipo_procedimento: String,
    pub tipos_contrato: String,
    pub fundamentacao: String,
    pub cpv: String,
    pub adjudicante: String,
    pub adjudicataria: String,
    pub preco_contratual: f64,
    pub data_publicacao: String,
    pub data_celebracao: String,
    pub prazo_execucao: String,
    pub local_execucao: String,
    pub numero_acordo_quadro: String,
    pub estado: String,
}

fn field(row: &RawRow, key: &str) -> String {
    row.get(key).cloned().unwrap_or_default()
}

impl Contract {
    /// Builds a contract from one raw row. Construction never fails:
    /// malformed cells degrade to defaulted/zero values.
    pub fn from_row(row: &RawRow, source: &str) -> Self {
        let raw_price = field(row, headers::PRECO_CONTRATUAL);
        let data_celebracao = field(row, headers::DATA_CELEBRACAO).trim().to_string();
        let year = parse_year(&data_celebracao)
            .or_else(|| parse_year(&field(row, headers::DATA_PUBLICACAO)))
            .unwrap_or(0);

        Contract {
            id: format!(
                "{}::{}::{}::{}",
                field(row, headers::OBJETO),
                field(row, headers::ADJUDICATARIA),
                data_celebracao,
                raw_price
            ),
            year,
            source: source.to_string(),
            objeto: field(row, headers::OBJETO),
            tipo_procedimento: field(row, headers::TIPO_PROCEDIMENTO),
            tipos_contrato: field(row, headers::TIPOS_CONTRATO),
            fundamentacao: field(row, headers::FUNDAMENTACAO),
            cpv: field(row, headers::CPV),
            adjudicante: field(row, headers::ADJUDICANTE),
            adjudicataria: field(row, headers::ADJUDICATARIA),
            preco_contratual: parse_price(&raw_price).max(0.0),
            data_publicacao: field(row, headers::DATA_PUBLICACAO).trim().to_string(),
            data_celebracao,
            prazo_execucao: field(row, headers::PRAZO_EXECUCAO).trim().to_string(),
            local_execucao: field(row, headers::LOCAL_EXECUCAO).trim().to_string(),
            numero_acordo_quadro: field(row, headers::NUMERO_ACORDO_QUADRO).trim().to_string(),
            estado: field(row, headers::ESTADO).trim().to_string(),
        }
    }

    /// The multi-valued contract-type cell, split and normalized.
    pub fn contract_types(&self) -> Vec<String> {
        extract_contract_types(&self.tipos_contrato)
    }

    pub fn matches_any_contract_type(&self, allowed: &BTreeSet<String>) -> bool {
        self.contract_types().iter().any(|t| allowed.contains(t))
    }

    pub fn matches_fundamentacao(&self, normalized: &str) -> bool {
        normalize_text(&self.fundamentacao) == normalized
    }

    pub fn matches_procedimento(&self, targets: &BTreeSet<String>) -> bool {
        targets.contains(&normalize_text(&self.tipo_procedimento))
    }

    /// Working days between signing and publication. Errors when either date
    /// is missing or unparseable; callers that only gate on the deadline
    /// skip the contract instead of aborting.
    pub fn publication_delay(&self) -> Result<u32> {
        let signed = parse_date(&self.data_celebracao).ok_or_else(|| {
            AuditError::DateUnparseable(format!("data de celebração: {:?}", self.data_celebracao))
        })?;
        let published = parse_date(&self.data_publicacao).ok_or_else(|| {
            AuditError::DateUnparseable(format!("data de publicação: {:?}", self.data_publicacao))
        })?;
        crate::calendar::working_days_between(signed, published).ok_or_else(|| {
            AuditError::DateUnparseable(format!(
                "publicação ({}) anterior à celebração ({})",
                self.data_publicacao, self.data_celebracao
            ))
        })
    }
}

/// Maps a whole batch of raw rows, tagging each contract with its source
/// label.
pub fn contracts_from_rows(rows: &[RawRow], source: &str) -> Vec<Contract> {
    rows.iter().map(|row| Contract::from_row(row, source)).collect()
}

/// The rolling three-year analysis window, computed once per audit run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditContext {
    /// Latest positive fiscal year present across all records.
    pub year_n: Option<i32>,
    pub year_n_minus_1: Option<i32>,
    pub year_n_minus_2: Option<i32>,
}

impl AuditContext {
    pub fn from_contracts(contracts: &[Contract]) -> Self {
        let years: BTreeSet<i32> = contracts
            .iter()
            .map(|c| c.year)
            .filter(|&y| y > 0)
            .collect();
        let year_n = years.iter().next_back().copied();
        let present = |y: Option<i32>| y.filter(|candidate| years.contains(candidate));
        AuditContext {
            year_n,
            year_n_minus_1: present(year_n.map(|y| y - 1)),
            year_n_minus_2: present(year_n.map(|y| y - 2)),
        }
    }
}
