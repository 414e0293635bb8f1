//! # Procurement Audit
//!
//! A rule-based compliance audit engine for Portuguese public-procurement
//! contract exports. Three yearly Base.gov CSV snapshots (years n-2, n-1, n)
//! are checked against a fixed set of rules derived from the Código dos
//! Contratos Públicos, producing a categorized findings report.
//!
//! ## Core Concepts
//!
//! - **Contract**: one export row, normalized into a structured entity.
//! - **AuditContext**: the rolling three-year window (n, n-1, n-2).
//! - **Section**: one of nine rule categories (A–I); each holds the
//!   findings of its rule, sorted by object description.
//! - **Cumulative ceilings**: four parametrized CCP value ceilings with
//!   three-year carry-over per awarded entity.
//! - **Cross-reference**: per-supplier reconciliation of contracts,
//!   e-invoices and ledger movements keyed by tax id.
//!
//! ## Example
//!
//! ```rust,ignore
//! use procurement_audit::*;
//!
//! let batches = vec![
//!     ContractBatch { source: "contratos-2024.csv".into(), rows: rows_n },
//!     ContractBatch { source: "contratos-2023.csv".into(), rows: rows_n1 },
//!     ContractBatch { source: "contratos-2022.csv".into(), rows: rows_n2 },
//! ];
//!
//! let outcome = run_audit(&batches)?;
//! for section in &outcome.sections {
//!     println!("{}: {} achado(s)", section.title, section.findings.len());
//! }
//! ```

pub mod calendar;
pub mod contract;
pub mod crossref;
pub mod error;
pub mod history;
pub mod normalize;
pub mod report;
pub mod rules;

pub use calendar::working_days_between;
pub use contract::{contracts_from_rows, AuditContext, Contract, RawRow};
pub use crossref::{
    cross_reference, extract_nif, normalize_nif, parse_invoices, parse_ledger,
    CrossReferenceRecord, Invoice, LedgerMovement,
};
pub use error::{AuditError, Result};
pub use history::{save_with_fallback, AuditRecord, FileHistoryStore, HistoryStore};
pub use normalize::{
    extract_contract_types, format_euro, format_year_with_words, normalize_for_search,
    normalize_text, number_to_portuguese_words, parse_date, parse_price, parse_year,
};
pub use report::{
    adjudicantes_for_cover, describe_contract, section_counts, AuditReport, ReportMetadata,
};
pub use rules::{audit_contracts, Finding, Section, SectionId};

use log::{debug, info};

/// One year batch of raw export rows and the file it came from.
#[derive(Debug, Clone)]
pub struct ContractBatch {
    pub source: String,
    pub rows: Vec<RawRow>,
}

/// Everything one audit invocation produces. Build-once, read-only; no state
/// survives between invocations.
#[derive(Debug, Clone)]
pub struct AuditOutcome {
    pub contracts: Vec<Contract>,
    pub context: AuditContext,
    pub sections: Vec<Section>,
}

/// Runs the full audit over all year batches: rows → contracts → context →
/// sections. Fails only when no contracts at all could be extracted;
/// malformed individual rows degrade to defaulted values instead.
pub fn run_audit(batches: &[ContractBatch]) -> Result<AuditOutcome> {
    let mut contracts = Vec::new();
    for batch in batches {
        let mapped = contracts_from_rows(&batch.rows, &batch.source);
        debug!("Batch {}: {} contract(s)", batch.source, mapped.len());
        contracts.extend(mapped);
    }

    if contracts.is_empty() {
        return Err(AuditError::InputMissing);
    }

    let context = AuditContext::from_contracts(&contracts);
    info!(
        "Auditing {} contract(s), audit year {:?}",
        contracts.len(),
        context.year_n
    );

    let sections = audit_contracts(&contracts, &context);
    Ok(AuditOutcome {
        contracts,
        context,
        sections,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::headers;

    fn row(objeto: &str, price: &str, signed: &str) -> RawRow {
        [
            (headers::OBJETO, objeto),
            (headers::PRECO_CONTRATUAL, price),
            (headers::DATA_CELEBRACAO, signed),
            (headers::ADJUDICATARIA, "Fornecedor A"),
            (headers::FUNDAMENTACAO, "Artigo 99.º do Código dos Contratos Públicos"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
    }

    #[test]
    fn test_run_audit_end_to_end() {
        let batches = vec![
            ContractBatch {
                source: "2024.csv".to_string(),
                rows: vec![row("Serviço de limpeza", "1.000,00", "10-01-2024")],
            },
            ContractBatch {
                source: "2023.csv".to_string(),
                rows: vec![row("Serviço de vigilância", "2.000,00", "10-01-2023")],
            },
        ];

        let outcome = run_audit(&batches).unwrap();
        assert_eq!(outcome.contracts.len(), 2);
        assert_eq!(outcome.context.year_n, Some(2024));
        assert_eq!(outcome.sections.len(), 9);

        // The unknown fundamentação of the year-n contract lands in I.
        let section_i = outcome.sections.last().unwrap();
        assert_eq!(section_i.findings.len(), 1);
        assert_eq!(section_i.findings[0].contract.objeto, "Serviço de limpeza");
    }

    #[test]
    fn test_run_audit_rejects_empty_input() {
        assert!(matches!(run_audit(&[]), Err(AuditError::InputMissing)));
        let empty_batch = ContractBatch {
            source: "vazio.csv".to_string(),
            rows: Vec::new(),
        };
        assert!(matches!(run_audit(&[empty_batch]), Err(AuditError::InputMissing)));
    }
}
