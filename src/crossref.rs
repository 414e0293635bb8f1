//! Cross-references contracts, e-invoices and accounting-ledger movements by
//! supplier tax id (NIF), surfacing per-supplier balance discrepancies.
//!
//! Invoice and ledger exports arrive with loosely standardized headers, so
//! each logical field is resolved through an ordered list of candidate
//! column names. A source that cannot be parsed degrades to "ignored", never
//! failing the reconciliation.

use crate::contract::{Contract, RawRow};
use crate::normalize::parse_price;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const INVOICE_NIF_COLUMNS: [&str; 5] = [
    "NIF",
    "NIF Fornecedor",
    "Contribuinte",
    "NIF Contribuinte",
    "NIF Emitente",
];
const INVOICE_VALUE_COLUMNS: [&str; 5] =
    ["Valor", "Valor Total", "Montante", "Importe", "Valor da Fatura"];
const INVOICE_DATE_COLUMNS: [&str; 4] = ["Data", "Data Emissão", "Data Fatura", "Data Documento"];
const INVOICE_TYPE_COLUMNS: [&str; 3] = ["Tipo", "Tipo Documento", "Natureza"];

const LEDGER_NIF_COLUMNS: [&str; 4] = ["NIF", "Contribuinte", "NIF Fornecedor", "Entidade"];
const LEDGER_VALUE_COLUMNS: [&str; 4] = ["Valor", "Montante", "Importe", "Movimento"];
const LEDGER_TYPE_COLUMNS: [&str; 4] = ["Tipo", "Natureza", "Movimento", "Débito/Crédito"];
const LEDGER_DATE_COLUMNS: [&str; 3] = ["Data", "Data Movimento", "Data Operação"];

/// Placeholder supplier name for tax ids seen only in invoices or ledger.
const UNKNOWN_SUPPLIER: &str = "Não encontrado no Base.gov";

/// First run of exactly nine digits found in free text (a NIF quoted inside
/// parentheses, after "NIF:", etc.).
pub fn extract_nif(text: &str) -> Option<String> {
    let mut run = String::new();
    for c in text.chars().chain(std::iter::once(' ')) {
        if c.is_ascii_digit() {
            run.push(c);
        } else {
            if run.len() == 9 {
                return Some(run);
            }
            run.clear();
        }
    }
    None
}

/// Strips non-digits and left-pads to nine digits. `None` when no digits
/// remain.
pub fn normalize_nif(raw: &str) -> Option<String> {
    let digits: String = raw.chars().filter(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return None;
    }
    Some(format!("{:0>9}", digits))
}

fn first_present<'a>(row: &'a RawRow, aliases: &[&str]) -> Option<&'a str> {
    aliases
        .iter()
        .filter_map(|alias| row.get(*alias))
        .map(|value| value.as_str())
        .find(|value| !value.trim().is_empty())
}

/// Resolves a NIF from the alias columns, falling back to scanning every
/// cell. Cells are scanned in sorted column order so the result does not
/// depend on map iteration order.
fn resolve_nif(row: &RawRow, aliases: &[&str]) -> Option<String> {
    if let Some(cell) = first_present(row, aliases) {
        if let Some(nif) = extract_nif(cell).as_deref().or(Some(cell)).and_then(normalize_nif) {
            return Some(nif);
        }
    }
    let mut keys: Vec<&String> = row.keys().collect();
    keys.sort();
    for key in keys {
        if let Some(nif) = row.get(key).and_then(|cell| extract_nif(cell)) {
            return normalize_nif(&nif);
        }
    }
    None
}

/// One e-invoice line. Credit notes carry a negative value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Invoice {
    pub nif: String,
    pub value: f64,
    pub date: String,
    pub kind: String,
}

/// One accounting-ledger movement, split into credit/debit by the
/// type-column heuristic.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerMovement {
    pub nif: String,
    pub value: f64,
    pub is_credit: bool,
    pub date: String,
}

fn is_credit_note(kind: &str) -> bool {
    let lower = kind.to_lowercase();
    lower.contains("crédito") || lower.contains("credito")
}

/// Maps e-invoice rows. Rows without a resolvable NIF are skipped.
pub fn parse_invoices(rows: &[RawRow]) -> Vec<Invoice> {
    rows.iter()
        .filter_map(|row| {
            let nif = resolve_nif(row, &INVOICE_NIF_COLUMNS)?;
            let value = first_present(row, &INVOICE_VALUE_COLUMNS)
                .map(parse_price)
                .unwrap_or(0.0);
            let kind = first_present(row, &INVOICE_TYPE_COLUMNS)
                .unwrap_or("Fatura")
                .to_string();
            let signed = if is_credit_note(&kind) {
                -value.abs()
            } else {
                value.abs()
            };
            Some(Invoice {
                nif,
                value: signed,
                date: first_present(row, &INVOICE_DATE_COLUMNS)
                    .unwrap_or_default()
                    .to_string(),
                kind,
            })
        })
        .collect()
}

/// Maps ledger rows. Without a type column, non-negative amounts count as
/// credit.
pub fn parse_ledger(rows: &[RawRow]) -> Vec<LedgerMovement> {
    rows.iter()
        .filter_map(|row| {
            let nif = resolve_nif(row, &LEDGER_NIF_COLUMNS)?;
            let value = first_present(row, &LEDGER_VALUE_COLUMNS)
                .map(parse_price)
                .unwrap_or(0.0);
            let is_credit = match first_present(row, &LEDGER_TYPE_COLUMNS) {
                Some(kind) => {
                    let lower = kind.to_lowercase();
                    lower.contains("crédito")
                        || lower.contains("credito")
                        || lower.contains("fatura")
                }
                None => value >= 0.0,
            };
            Some(LedgerMovement {
                nif,
                value: value.abs(),
                is_credit,
                date: first_present(row, &LEDGER_DATE_COLUMNS)
                    .unwrap_or_default()
                    .to_string(),
            })
        })
        .collect()
}

/// Aggregated totals for one supplier, keyed by normalized NIF.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrossReferenceRecord {
    pub nif: String,
    pub name: String,
    pub total_invoiced: f64,
    pub total_contracted: f64,
    pub credit_movements: f64,
    pub debit_movements: f64,
    /// credit − debit.
    pub ledger_balance: f64,
    /// invoiced − ledger balance. Signed; ordered by descending magnitude in
    /// the output.
    pub discrepancy: f64,
    /// Absolute total of credit-note lines.
    pub credit_notes: f64,
    pub num_contracts: usize,
    pub num_invoices: usize,
    pub num_movements: usize,
}

#[derive(Default)]
struct SupplierAccumulator {
    name: Option<String>,
    contracts: Vec<f64>,
    invoices: Vec<f64>,
    credits: Vec<f64>,
    debits: Vec<f64>,
}

/// Builds one record per tax id seen in any of the three sources, sorted by
/// descending absolute discrepancy so the largest mismatches surface first.
pub fn cross_reference(
    contracts: &[Contract],
    invoices: &[Invoice],
    movements: &[LedgerMovement],
) -> Vec<CrossReferenceRecord> {
    let mut suppliers: BTreeMap<String, SupplierAccumulator> = BTreeMap::new();

    for contract in contracts {
        let Some(nif) = extract_nif(&contract.adjudicataria).as_deref().and_then(normalize_nif)
        else {
            continue;
        };
        let entry = suppliers.entry(nif).or_default();
        if entry.name.is_none() && !contract.adjudicataria.is_empty() {
            entry.name = Some(contract.adjudicataria.clone());
        }
        entry.contracts.push(contract.preco_contratual);
    }

    for invoice in invoices {
        suppliers
            .entry(invoice.nif.clone())
            .or_default()
            .invoices
            .push(invoice.value);
    }

    for movement in movements {
        let entry = suppliers.entry(movement.nif.clone()).or_default();
        if movement.is_credit {
            entry.credits.push(movement.value);
        } else {
            entry.debits.push(movement.value);
        }
    }

    let mut records: Vec<CrossReferenceRecord> = suppliers
        .into_iter()
        .map(|(nif, acc)| {
            let total_invoiced: f64 = acc.invoices.iter().sum();
            let total_contracted: f64 = acc.contracts.iter().sum();
            let credit_movements: f64 = acc.credits.iter().sum();
            let debit_movements: f64 = acc.debits.iter().sum();
            let ledger_balance = credit_movements - debit_movements;
            CrossReferenceRecord {
                name: acc.name.unwrap_or_else(|| UNKNOWN_SUPPLIER.to_string()),
                total_invoiced,
                total_contracted,
                credit_movements,
                debit_movements,
                ledger_balance,
                discrepancy: total_invoiced - ledger_balance,
                credit_notes: acc.invoices.iter().filter(|v| **v < 0.0).map(|v| v.abs()).sum(),
                num_contracts: acc.contracts.len(),
                num_invoices: acc.invoices.len(),
                num_movements: acc.credits.len() + acc.debits.len(),
                nif,
            }
        })
        .collect();

    records.sort_by(|a, b| b.discrepancy.abs().total_cmp(&a.discrepancy.abs()));
    debug!("Cross-reference produced {} supplier record(s)", records.len());
    records
}
