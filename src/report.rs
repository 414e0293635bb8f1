//! The input contract consumed by the downstream report renderer: run
//! metadata, the serializable report payload and the small description
//! helpers the preview uses. Rendering itself (PDF/HTML pagination) is an
//! external collaborator.

use crate::contract::{AuditContext, Contract};
use crate::crossref::CrossReferenceRecord;
use crate::normalize::format_euro;
use crate::rules::{Section, SectionId};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Cover-page and run metadata handed to the renderer and the history store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportMetadata {
    pub auditor_name: String,
    /// Distinct awarding entities of the audit year, for the cover page.
    pub adjudicantes: Vec<String>,
    /// DD/MM/YYYY.
    pub report_date: String,
    pub total_contracts: usize,
    pub cross_reference: Option<Vec<CrossReferenceRecord>>,
}

impl ReportMetadata {
    pub fn new(auditor_name: &str, contracts: &[Contract], context: &AuditContext) -> Self {
        ReportMetadata {
            auditor_name: auditor_name.to_string(),
            adjudicantes: adjudicantes_for_cover(contracts, context),
            report_date: chrono::Local::now().format("%d/%m/%Y").to_string(),
            total_contracts: contracts.len(),
            cross_reference: None,
        }
    }

    pub fn with_cross_reference(mut self, records: Vec<CrossReferenceRecord>) -> Self {
        self.cross_reference = Some(records);
        self
    }
}

/// The full payload the renderer paginates and the history store persists.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditReport {
    pub sections: Vec<Section>,
    pub context: AuditContext,
    pub metadata: ReportMetadata,
}

/// Distinct non-empty awarding entities among year-n contracts, in first-seen
/// order.
pub fn adjudicantes_for_cover(contracts: &[Contract], context: &AuditContext) -> Vec<String> {
    let mut seen = HashSet::new();
    contracts
        .iter()
        .filter(|c| Some(c.year) == context.year_n)
        .map(|c| c.adjudicante.clone())
        .filter(|name| !name.is_empty() && seen.insert(name.clone()))
        .collect()
}

/// Multi-line human description of one contract, as shown in the preview.
pub fn describe_contract(contract: &Contract) -> String {
    let or_placeholder = |value: &str, placeholder: &str| {
        if value.is_empty() {
            placeholder.to_string()
        } else {
            value.to_string()
        }
    };
    [
        format!("Objeto: {}", or_placeholder(&contract.objeto, "(sem descrição)")),
        format!(
            "Adjudicatária: {}",
            or_placeholder(&contract.adjudicataria, "(desconhecida)")
        ),
        format!("Preço contratual: {}", format_euro(contract.preco_contratual)),
        format!(
            "Data de celebração: {}",
            or_placeholder(&contract.data_celebracao, "(não indicada)")
        ),
        format!("Tipo de procedimento: {}", contract.tipo_procedimento),
        format!("Fundamentação: {}", contract.fundamentacao),
    ]
    .join("\n")
}

/// Findings per section, in section order. The preview's analysis table.
pub fn section_counts(sections: &[Section]) -> Vec<(SectionId, usize)> {
    sections.iter().map(|s| (s.id, s.findings.len())).collect()
}
