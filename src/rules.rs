//! The rule engine: classifies every contract of the audit window into the
//! nine report sections A–I derived from the Código dos Contratos Públicos.
//!
//! Sections are evaluated in the fixed order A→I. Each finding records the
//! contract id in a shared flagged set; rules that gate on "not yet flagged"
//! (the cumulative sub-rules 2 and 3 and the catch-all section I) consult it
//! so a contract captured by a more specific rule is not flagged twice.

use crate::contract::{AuditContext, Contract};
use crate::normalize::{format_euro, normalize_for_search, normalize_text, parse_date};
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// Report section identifiers, in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SectionId {
    A,
    B,
    C,
    D,
    E,
    F,
    G,
    H,
    I,
}

impl SectionId {
    pub const ALL: [SectionId; 9] = [
        SectionId::A,
        SectionId::B,
        SectionId::C,
        SectionId::D,
        SectionId::E,
        SectionId::F,
        SectionId::G,
        SectionId::H,
        SectionId::I,
    ];

    pub fn title(self) -> &'static str {
        match self {
            SectionId::A => "A - Contratos que excederam o limite do procedimento",
            SectionId::B => "B - Contratos publicitados após o prazo de 20 dias úteis",
            SectionId::C => {
                "C - Contratos por \"Acordo Quadro\" que não mencionam o número do contrato"
            }
            SectionId::D => "D - Contração especializada excecionada",
            SectionId::E => "E - Contração excluída",
            SectionId::F => "F - Concursos públicos urgentes",
            SectionId::G => {
                "G - Contratos a solicitar a fiscalização prévia do Tribunal de Contas"
            }
            SectionId::H => {
                "H - Contratação nos sectores da água, da energia, dos transportes e dos serviços postais"
            }
            SectionId::I => "I – Outras Contratações não enquadradas acima",
        }
    }
}

/// One contract matched by one rule, with a fine-grained rule code (e.g.
/// "A1", "A2", "A3" distinguish the ceiling sub-conditions) and a
/// human-readable explanation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Finding {
    pub contract: Contract,
    pub rule: String,
    pub details: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Section {
    pub id: SectionId,
    pub title: String,
    pub findings: Vec<Finding>,
}

impl Section {
    fn new(id: SectionId) -> Self {
        Section {
            id,
            title: id.title().to_string(),
            findings: Vec::new(),
        }
    }
}

fn register_finding(
    section: &mut Section,
    rule: &str,
    contract: &Contract,
    details: String,
    flagged: &mut HashSet<String>,
) {
    section.findings.push(Finding {
        contract: contract.clone(),
        rule: rule.to_string(),
        details,
    });
    flagged.insert(contract.id.clone());
}

// Legal citations matched exactly (after normalization) against the
// fundamentação and procedure-type columns.

const FUNDAMENTACAO_ART_20_D: &str =
    "Artigo 20.º, n.º 1, alínea d) do Código dos Contratos Públicos";
const FUNDAMENTACAO_ART_19_D: &str = "Artigo 19.º, alínea d) do Código dos Contratos Públicos";
const FUNDAMENTACAO_ART_20_C: &str =
    "Artigo 20.º, n.º 1, alínea c) do Código dos Contratos Públicos";
const FUNDAMENTACAO_ART_19_C: &str = "Artigo 19.º, alínea c) do Código dos Contratos Públicos";
const PROCEDIMENTO_ART_6A: &str = "artigo 6.º-A n.º 1 do Código dos Contratos Públicos";
const FUNDAMENTACAO_ART_11: &str = "Artigo 11.º do Código dos Contratos Públicos";
const FUNDAMENTACAO_ART_11_SEM_PONTO: &str = "Artigo 11º do Código dos Contratos Públicos";

const PROCEDIMENTOS_EXCECAO: [&str; 15] = [
    "Artigo 24.º, n.º 1, alínea a) do Código dos Contratos Públicos",
    "Artigo 24.º, n.º 1, alínea b) do Código dos Contratos Públicos",
    "Artigo 24.º, n.º 1, alínea c) do Código dos Contratos Públicos",
    "Artigo 24.º, n.º 1, alínea d) do Código dos Contratos Públicos",
    "Artigo 24.º, n.º 1, alínea e), subalínea i) do Código dos Contratos Públicos",
    "Artigo 24.º, n.º 1, alínea e), subalínea ii) do Código dos Contratos Públicos",
    "Artigo 24.º, n.º 1, alínea e), subalínea iii) do Código dos Contratos Públicos",
    "Artigo 27.º, n.º 1, alínea a) do Código dos Contratos Públicos",
    "Artigo 27.º, n.º 1, alínea b) do Código dos Contratos Públicos",
    "Artigo 27.º, n.º 1, alínea c) do Código dos Contratos Públicos",
    "Artigo 27.º, n.º 1, alínea d) do Código dos Contratos Públicos",
    "Artigo 27.º, n.º 1, alínea e) do Código dos Contratos Públicos",
    "Artigo 27.º, n.º 1, alínea g) do Código dos Contratos Públicos",
    "Artigo 27.º, n.º 1, alínea h) do Código dos Contratos Públicos",
    "Artigo 27.º, n.º 1, alínea i) do Código dos Contratos Públicos",
];

const PROCEDIMENTOS_URGENTES: [&str; 3] = [
    "Artigo 155.º do Código dos Contratos Públicos",
    "Artigo 155.º, alínea a) do Código dos Contratos Públicos",
    "Artigo 155.º, alínea b) do Código dos Contratos Públicos",
];

const PROCEDIMENTOS_ACORDO_QUADRO: [&str; 3] = [
    "Artigo 258.º do Código dos Contratos Públicos",
    "Artigo 259.º do Código dos Contratos Públicos",
    "Artigo 252.º, n.º 1, alínea b) do Código dos Contratos Públicos",
];

const GOODS_AND_SERVICES: [&str; 3] = [
    "aquisição de bens móveis",
    "aquisição de serviços",
    "locação de bens móveis",
];

const PUBLIC_WORKS: [&str; 1] = ["empreitadas de obras públicas"];

const CONCESSIONS: [&str; 2] = [
    "Concessão de obras públicas",
    "Concessão de serviços públicos",
];

/// Tribunal de Contas prior-review threshold, also used by the article
/// 6.º-A ceiling check.
const TC_LIMIT: f64 = 750_000.0;

/// Working-day publication deadline of article 8(j), Portaria 318-B/2023.
const PUBLICATION_DEADLINE_DAYS: u32 = 20;

fn normalized_set(values: &[&str]) -> BTreeSet<String> {
    values.iter().map(|v| normalize_text(v)).collect()
}

/// One parametrized cumulative-threshold rule (CCP articles 19/20). Applied
/// four times with different (ceiling, fundamentação, contract-type) tuples.
struct CumulativeLimitRule {
    rule_code: &'static str,
    limit: f64,
    fundamentacao: String,
    contract_types: BTreeSet<String>,
    description: &'static str,
}

impl CumulativeLimitRule {
    fn qualifying<'a>(&self, contracts: &'a [Contract]) -> Vec<&'a Contract> {
        contracts
            .iter()
            .filter(|c| {
                c.matches_fundamentacao(&self.fundamentacao)
                    && c.matches_any_contract_type(&self.contract_types)
            })
            .collect()
    }

    /// Three angles on the same ceiling: single-contract breach (sub-rule 1),
    /// breach reached progressively during year n (sub-rule 2), and breach
    /// inherited from years n-1/n-2 (sub-rule 3).
    fn apply(
        &self,
        context: &AuditContext,
        contracts: &[Contract],
        section: &mut Section,
        flagged: &mut HashSet<String>,
    ) {
        let qualifying = self.qualifying(contracts);
        let in_year_n = |c: &Contract| Some(c.year) == context.year_n;

        // Sub-rule 1: hard per-contract ceiling, regardless of accumulation
        // and of earlier flags.
        for contract in qualifying.iter().filter(|c| in_year_n(c)) {
            if contract.preco_contratual > self.limit {
                register_finding(
                    section,
                    &format!("{}1", self.rule_code),
                    contract,
                    format!(
                        "{}: valor individual ({}) acima do limite de {}.",
                        self.description,
                        format_euro(contract.preco_contratual),
                        format_euro(self.limit)
                    ),
                    flagged,
                );
            }
        }

        // Combined qualifying totals of years n-1 and n-2, per awarded
        // entity. Seeds the running sum and drives sub-rule 3.
        let mut past_year_sums: BTreeMap<String, f64> = BTreeMap::new();
        for contract in qualifying.iter().filter(|c| {
            Some(c.year) == context.year_n_minus_1 || Some(c.year) == context.year_n_minus_2
        }) {
            *past_year_sums
                .entry(normalize_text(&contract.adjudicataria))
                .or_insert(0.0) += contract.preco_contratual;
        }

        // Sub-rule 2: walk each entity's year-n contracts by signing date and
        // flag every contract whose running total, current contract included,
        // exceeds the ceiling. Reaching the ceiling exactly is lawful, as in
        // sub-rule 1.
        let mut grouped: BTreeMap<String, Vec<&Contract>> = BTreeMap::new();
        for contract in qualifying.iter().filter(|c| in_year_n(c)) {
            grouped
                .entry(normalize_text(&contract.adjudicataria))
                .or_default()
                .push(contract);
        }

        for (entity, mut entity_contracts) in grouped {
            // Missing or unparsable signing dates sort as earliest.
            entity_contracts.sort_by_key(|c| {
                parse_date(&c.data_celebracao).unwrap_or(chrono::NaiveDate::MIN)
            });

            let mut cumulative = past_year_sums.get(&entity).copied().unwrap_or(0.0);
            for contract in entity_contracts {
                cumulative += contract.preco_contratual;
                if cumulative > self.limit && !flagged.contains(&contract.id) {
                    register_finding(
                        section,
                        &format!("{}2", self.rule_code),
                        contract,
                        format!(
                            "{}: soma acumulada (anos anteriores + ano n) atinge {} com este contrato, excedendo {}.",
                            self.description,
                            format_euro(cumulative),
                            format_euro(self.limit)
                        ),
                        flagged,
                    );
                }
            }
        }

        // Sub-rule 3: overflow inherited from the prior years alone, covering
        // entities whose n-1+n-2 total already exceeds the ceiling before any
        // year-n contract is walked individually.
        for contract in qualifying.iter().filter(|c| in_year_n(c)) {
            let accumulated = past_year_sums
                .get(&normalize_text(&contract.adjudicataria))
                .copied()
                .unwrap_or(0.0);
            if accumulated > self.limit && !flagged.contains(&contract.id) {
                register_finding(
                    section,
                    &format!("{}3", self.rule_code),
                    contract,
                    format!(
                        "{}: soma nos anos n-2 e n-1 ({}) ultrapassou o limite antes do contrato em {}.",
                        self.description,
                        format_euro(accumulated),
                        context.year_n.unwrap_or(0)
                    ),
                    flagged,
                );
            }
        }
    }
}

fn limit_rules() -> [CumulativeLimitRule; 4] {
    [
        CumulativeLimitRule {
            rule_code: "A",
            limit: 20_000.0,
            fundamentacao: normalize_text(FUNDAMENTACAO_ART_20_D),
            contract_types: normalized_set(&GOODS_AND_SERVICES),
            description: "Limite de 20.000 € (Artigo 20.º, n.º 1, alínea d))",
        },
        CumulativeLimitRule {
            rule_code: "B",
            limit: 30_000.0,
            fundamentacao: normalize_text(FUNDAMENTACAO_ART_19_D),
            contract_types: normalized_set(&PUBLIC_WORKS),
            description: "Limite de 30.000 € (Artigo 19.º, alínea d))",
        },
        CumulativeLimitRule {
            rule_code: "C",
            limit: 75_000.0,
            fundamentacao: normalize_text(FUNDAMENTACAO_ART_20_C),
            contract_types: normalized_set(&GOODS_AND_SERVICES),
            description: "Limite de 75.000 € (Artigo 20.º, n.º 1, alínea c))",
        },
        CumulativeLimitRule {
            rule_code: "D",
            limit: 150_000.0,
            fundamentacao: normalize_text(FUNDAMENTACAO_ART_19_C),
            contract_types: normalized_set(&PUBLIC_WORKS),
            description: "Limite de 150.000 € (Artigo 19.º, alínea c))",
        },
    ]
}

fn is_artigo_11(normalized: &str) -> bool {
    normalized == normalize_text(FUNDAMENTACAO_ART_11)
        || normalized == normalize_text(FUNDAMENTACAO_ART_11_SEM_PONTO)
}

/// True for the article-5 family only: "artigo 5.º", "artigo 5º" or a bare
/// "artigo 5" that is not actually a longer article number (15, 25, … 95).
fn is_artigo_5_family(normalized: &str) -> bool {
    if normalized.contains("artigo 5.º") || normalized.contains("artigo 5º") {
        return true;
    }
    normalized.contains("artigo 5")
        && !(15..=95)
            .step_by(10)
            .any(|n| normalized.contains(&format!("artigo {}", n)))
}

/// Evaluates the nine rule sections against the full contract set. Findings
/// within each section come back sorted by object description (pt collation
/// approximated by an accent/case-folded key).
pub fn audit_contracts(contracts: &[Contract], context: &AuditContext) -> Vec<Section> {
    let mut sections: Vec<Section> = SectionId::ALL.into_iter().map(Section::new).collect();
    let mut flagged: HashSet<String> = HashSet::new();

    let in_year_n = |c: &&Contract| Some(c.year) == context.year_n;
    let year_n_contracts: Vec<&Contract> = contracts.iter().filter(in_year_n).collect();

    // Section A: the four parametrized ceilings plus the article 6.º-A check.
    {
        let section_a = &mut sections[0];
        for rule in limit_rules() {
            rule.apply(context, contracts, section_a, &mut flagged);
        }

        let procedimento_6a = normalize_text(PROCEDIMENTO_ART_6A);
        for contract in &year_n_contracts {
            if normalize_text(&contract.tipo_procedimento) == procedimento_6a
                && contract.preco_contratual > TC_LIMIT
            {
                register_finding(
                    section_a,
                    "E",
                    contract,
                    "Contratação excluída pelo Artigo 6.º-A acima de 750.000 €.".to_string(),
                    &mut flagged,
                );
            }
        }
    }

    // Section B: publication later than 20 working days after signing.
    // Contracts with an unparseable date pair are skipped, never fatal.
    {
        let section_b = &mut sections[1];
        for contract in &year_n_contracts {
            if let Ok(working_days) = contract.publication_delay() {
                if working_days > PUBLICATION_DEADLINE_DAYS {
                    register_finding(
                        section_b,
                        "B",
                        contract,
                        format!(
                            "Contrato publicitado após {} dias úteis (limite: {} dias úteis). Data de celebração: {}, Data de publicação: {}.",
                            working_days,
                            PUBLICATION_DEADLINE_DAYS,
                            contract.data_celebracao,
                            contract.data_publicacao
                        ),
                        &mut flagged,
                    );
                }
            }
        }
    }

    // Section C: framework-agreement procedures without a numeric
    // registration number.
    {
        let section_c = &mut sections[2];
        let acordo_quadro = normalized_set(&PROCEDIMENTOS_ACORDO_QUADRO);
        for contract in &year_n_contracts {
            if contract.matches_procedimento(&acordo_quadro)
                && !crate::normalize::has_numeric_value(&contract.numero_acordo_quadro)
            {
                register_finding(
                    section_c,
                    "C",
                    contract,
                    "Contrato de acordo-quadro sem número de registo válido.".to_string(),
                    &mut flagged,
                );
            }
        }
    }

    // Section D: specialised procurement exceptions (informational).
    {
        let section_d = &mut sections[3];
        let excecoes = normalized_set(&PROCEDIMENTOS_EXCECAO);
        for contract in &year_n_contracts {
            if contract.matches_procedimento(&excecoes) {
                register_finding(
                    section_d,
                    "D",
                    contract,
                    "Contratação especializada excecionada (Artigo 24.º ou 27.º do CCP)."
                        .to_string(),
                    &mut flagged,
                );
            }
        }
    }

    // Section E: article 5 exclusions (informational).
    {
        let section_e = &mut sections[4];
        for contract in &year_n_contracts {
            if normalize_text(&contract.fundamentacao).contains("artigo 5") {
                register_finding(
                    section_e,
                    "E",
                    contract,
                    "Contratação excluída ao abrigo do Artigo 5.º do CCP.".to_string(),
                    &mut flagged,
                );
            }
        }
    }

    // Section F: urgent public tenders.
    {
        let section_f = &mut sections[5];
        let urgentes = normalized_set(&PROCEDIMENTOS_URGENTES);
        for contract in &year_n_contracts {
            if contract.matches_procedimento(&urgentes) {
                register_finding(
                    section_f,
                    "F",
                    contract,
                    "Concurso público urgente ao abrigo do Artigo 155.º.".to_string(),
                    &mut flagged,
                );
            }
        }
    }

    // Section G: Tribunal de Contas prior review.
    {
        let section_g = &mut sections[6];
        let goods_services = normalized_set(&GOODS_AND_SERVICES);
        let public_works = normalized_set(&PUBLIC_WORKS);
        let concessions = normalized_set(&CONCESSIONS);
        for contract in &year_n_contracts {
            let types: BTreeSet<String> = contract.contract_types().into_iter().collect();
            let is_public_works = types.iter().any(|t| public_works.contains(t));
            let is_goods_services = types.iter().any(|t| goods_services.contains(t));
            let is_concession = types.iter().any(|t| concessions.contains(t));

            if ((is_public_works || is_goods_services) && contract.preco_contratual > TC_LIMIT)
                || is_concession
            {
                register_finding(
                    section_g,
                    "G",
                    contract,
                    "Contrato sujeito a fiscalização prévia do Tribunal de Contas (valor superior a 750.000€ ou concessão).".to_string(),
                    &mut flagged,
                );
            }
        }
    }

    // Section H: water/energy/transport/postal sectors (article 11).
    {
        let section_h = &mut sections[7];
        for contract in &year_n_contracts {
            if is_artigo_11(&normalize_text(&contract.fundamentacao)) {
                register_finding(
                    section_h,
                    "H",
                    contract,
                    "Contratação nos sectores da água, da energia, dos transportes e dos serviços postais (Artigo 11.º do CCP).".to_string(),
                    &mut flagged,
                );
            }
        }
    }

    // Section I: residual catch-all. The exclusion set is computed fully
    // before the filtering pass so its contents cannot depend on iteration
    // order.
    {
        let mut known_fundamentacoes: BTreeSet<String> = BTreeSet::new();
        known_fundamentacoes.insert(normalize_text(FUNDAMENTACAO_ART_20_D));
        known_fundamentacoes.insert(normalize_text(FUNDAMENTACAO_ART_19_D));
        known_fundamentacoes.insert(normalize_text(FUNDAMENTACAO_ART_20_C));
        known_fundamentacoes.insert(normalize_text(FUNDAMENTACAO_ART_19_C));
        known_fundamentacoes.extend(normalized_set(&PROCEDIMENTOS_EXCECAO));
        known_fundamentacoes.extend(normalized_set(&PROCEDIMENTOS_URGENTES));
        known_fundamentacoes.extend(normalized_set(&PROCEDIMENTOS_ACORDO_QUADRO));
        known_fundamentacoes.insert(normalize_text(PROCEDIMENTO_ART_6A));
        known_fundamentacoes.insert(normalize_text(FUNDAMENTACAO_ART_11));

        // Article-5 and article-11 variants actually observed in the data are
        // treated as known, so only structurally similar texts are excluded.
        for contract in &year_n_contracts {
            let fundamentacao = normalize_text(&contract.fundamentacao);
            if is_artigo_5_family(&fundamentacao) || is_artigo_11(&fundamentacao) {
                known_fundamentacoes.insert(fundamentacao);
            }
        }

        let section_i = &mut sections[8];
        for contract in &year_n_contracts {
            if flagged.contains(&contract.id) {
                continue;
            }
            let fundamentacao = normalize_text(&contract.fundamentacao);
            if !fundamentacao.is_empty() && !known_fundamentacoes.contains(&fundamentacao) {
                register_finding(
                    section_i,
                    "I",
                    contract,
                    "Fundamentação não enquadrada nas regras A-H (outras contratações)."
                        .to_string(),
                    &mut flagged,
                );
            }
        }
    }

    for section in &mut sections {
        section
            .findings
            .sort_by_cached_key(|f| {
                (normalize_for_search(&f.contract.objeto), f.contract.objeto.clone())
            });
        debug!(
            "Section {}: {} finding(s)",
            section.id.title(),
            section.findings.len()
        );
    }

    sections
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::contract::Contract;

    fn goods_contract(
        objeto: &str,
        adjudicataria: &str,
        price: f64,
        signed: &str,
    ) -> Contract {
        Contract {
            id: format!("{}::{}::{}::{}", objeto, adjudicataria, signed, price),
            year: crate::normalize::parse_year(signed).unwrap_or(0),
            source: "teste.csv".to_string(),
            objeto: objeto.to_string(),
            tipo_procedimento: "Ajuste Direto Regime Geral".to_string(),
            tipos_contrato: "Aquisição de bens móveis".to_string(),
            fundamentacao: FUNDAMENTACAO_ART_20_D.to_string(),
            cpv: String::new(),
            adjudicante: "Município de Teste".to_string(),
            adjudicataria: adjudicataria.to_string(),
            preco_contratual: price,
            data_publicacao: String::new(),
            data_celebracao: signed.to_string(),
            prazo_execucao: String::new(),
            local_execucao: String::new(),
            numero_acordo_quadro: String::new(),
            estado: "Contratado".to_string(),
        }
    }

    fn context_for(contracts: &[Contract]) -> AuditContext {
        AuditContext::from_contracts(contracts)
    }

    fn section<'a>(sections: &'a [Section], id: SectionId) -> &'a Section {
        sections.iter().find(|s| s.id == id).unwrap()
    }

    #[test]
    fn test_hard_ceiling_flags_above_limit_only() {
        let contracts = vec![
            goods_contract("Material de escritório", "Fornecedor A", 20_001.0, "10-02-2024"),
            goods_contract("Consumíveis", "Fornecedor B", 20_000.0, "11-02-2024"),
        ];
        let sections = audit_contracts(&contracts, &context_for(&contracts));
        let a = section(&sections, SectionId::A);

        assert_eq!(a.findings.len(), 1);
        assert_eq!(a.findings[0].rule, "A1");
        assert_eq!(a.findings[0].contract.adjudicataria, "Fornecedor A");
    }

    #[test]
    fn test_running_total_flags_second_contract() {
        let contracts = vec![
            goods_contract("Primeiro fornecimento", "Fornecedor A", 12_000.0, "05-01-2024"),
            goods_contract("Segundo fornecimento", "Fornecedor A", 9_000.0, "20-06-2024"),
        ];
        let sections = audit_contracts(&contracts, &context_for(&contracts));
        let a = section(&sections, SectionId::A);

        assert_eq!(a.findings.len(), 1);
        assert_eq!(a.findings[0].rule, "A2");
        assert_eq!(a.findings[0].contract.objeto, "Segundo fornecimento");
    }

    #[test]
    fn test_running_total_seeds_from_prior_years() {
        // 15 000 € in year n-1 seeds the walk, but 15 000 + 1 000 stays below
        // the 20 000 € ceiling and the prior-year sum alone does not exceed
        // it either.
        let contracts = vec![
            goods_contract("Fornecimento antigo", "Fornecedor A", 15_000.0, "05-01-2023"),
            goods_contract("Fornecimento novo", "Fornecedor A", 1_000.0, "05-01-2024"),
        ];
        let sections = audit_contracts(&contracts, &context_for(&contracts));
        assert!(section(&sections, SectionId::A).findings.is_empty());

        // With 21 000 € in prior years the year-n contract is flagged. The
        // sub-rule 2 walk sees the seed first, so the code is A2.
        let contracts = vec![
            goods_contract("Fornecimento antigo", "Fornecedor A", 21_000.0, "05-01-2023"),
            goods_contract("Fornecimento novo", "Fornecedor A", 1_000.0, "05-01-2024"),
        ];
        let sections = audit_contracts(&contracts, &context_for(&contracts));
        let a = section(&sections, SectionId::A);
        assert_eq!(a.findings.len(), 1);
        assert_eq!(a.findings[0].rule, "A2");
    }

    #[test]
    fn test_running_total_exact_ceiling_is_lawful() {
        // 12 000 + 8 000 reaches the 20 000 € ceiling exactly. As in
        // sub-rule 1, only strict exceedance is flagged.
        let contracts = vec![
            goods_contract("Primeiro fornecimento", "Fornecedor A", 12_000.0, "05-01-2024"),
            goods_contract("Segundo fornecimento", "Fornecedor A", 8_000.0, "20-06-2024"),
        ];
        let sections = audit_contracts(&contracts, &context_for(&contracts));
        assert!(section(&sections, SectionId::A).findings.is_empty());
    }

    #[test]
    fn test_prior_year_overflow_ignores_entities_below_limit() {
        let contracts = vec![
            goods_contract("Fornecimento antigo", "Fornecedor A", 19_000.0, "05-01-2022"),
            goods_contract("Fornecimento novo", "Fornecedor A", 500.0, "05-01-2024"),
        ];
        let sections = audit_contracts(&contracts, &context_for(&contracts));
        assert!(section(&sections, SectionId::A).findings.is_empty());
    }

    #[test]
    fn test_unparsable_signing_dates_sort_first() {
        // The undated contract is walked first, so the dated one sees the
        // accumulated total and gets flagged.
        let mut undated =
            goods_contract("Sem data", "Fornecedor A", 20_000.0, "10-03-2024");
        undated.data_celebracao = "sem data".to_string();
        undated.year = 2024;
        let contracts = vec![
            goods_contract("Com data", "Fornecedor A", 1_000.0, "02-01-2024"),
            undated,
        ];
        let sections = audit_contracts(&contracts, &context_for(&contracts));
        let a = section(&sections, SectionId::A);
        assert_eq!(a.findings.len(), 1);
        assert_eq!(a.findings[0].rule, "A2");
        assert_eq!(a.findings[0].contract.objeto, "Com data");
    }

    #[test]
    fn test_article_6a_ceiling() {
        let mut contract =
            goods_contract("Grande aquisição", "Fornecedor A", 800_000.0, "10-03-2024");
        contract.tipo_procedimento = PROCEDIMENTO_ART_6A.to_string();
        contract.fundamentacao = "Outra".to_string();
        let contracts = vec![contract];
        let sections = audit_contracts(&contracts, &context_for(&contracts));
        let a = section(&sections, SectionId::A);
        assert_eq!(a.findings.len(), 1);
        assert_eq!(a.findings[0].rule, "E");
    }

    #[test]
    fn test_late_publication_flagged_in_b() {
        let mut late = goods_contract("Publicado tarde", "Fornecedor A", 500.0, "02-01-2024");
        late.data_publicacao = "01-03-2024".to_string();
        let mut on_time = goods_contract("Publicado a tempo", "Fornecedor B", 500.0, "02-01-2024");
        on_time.data_publicacao = "05-01-2024".to_string();
        let contracts = vec![late, on_time];
        let sections = audit_contracts(&contracts, &context_for(&contracts));
        let b = section(&sections, SectionId::B);
        assert_eq!(b.findings.len(), 1);
        assert_eq!(b.findings[0].contract.objeto, "Publicado tarde");
    }

    #[test]
    fn test_framework_agreement_without_number() {
        let mut missing =
            goods_contract("Call-off sem registo", "Fornecedor A", 500.0, "02-01-2024");
        missing.tipo_procedimento = PROCEDIMENTOS_ACORDO_QUADRO[0].to_string();
        missing.fundamentacao = "Outra".to_string();
        let mut valid = missing.clone();
        valid.objeto = "Call-off com registo".to_string();
        valid.id = "outro".to_string();
        valid.numero_acordo_quadro = "12345".to_string();

        let contracts = vec![missing, valid];
        let sections = audit_contracts(&contracts, &context_for(&contracts));
        let c = section(&sections, SectionId::C);
        assert_eq!(c.findings.len(), 1);
        assert_eq!(c.findings[0].contract.objeto, "Call-off sem registo");
    }

    #[test]
    fn test_exception_procedure_lands_in_d_not_i() {
        let mut contract =
            goods_contract("Serviços de emergência", "Fornecedor A", 500.0, "02-01-2024");
        contract.tipo_procedimento = PROCEDIMENTOS_EXCECAO[0].to_string();
        contract.fundamentacao = "Outra".to_string();
        let contracts = vec![contract];
        let sections = audit_contracts(&contracts, &context_for(&contracts));
        let d = section(&sections, SectionId::D);
        assert_eq!(d.findings.len(), 1);
        assert_eq!(d.findings[0].rule, "D");
        // Flagged by D, so the catch-all skips it despite the unknown
        // fundamentação.
        assert!(section(&sections, SectionId::I).findings.is_empty());
    }

    #[test]
    fn test_every_exception_citation_matches() {
        let contracts: Vec<Contract> = PROCEDIMENTOS_EXCECAO
            .iter()
            .enumerate()
            .map(|(i, citation)| {
                let mut c = goods_contract(
                    &format!("Contratação excecionada {}", i),
                    "Fornecedor A",
                    500.0,
                    "02-01-2024",
                );
                c.tipo_procedimento = citation.to_string();
                c.fundamentacao = "Outra".to_string();
                c
            })
            .collect();
        let sections = audit_contracts(&contracts, &context_for(&contracts));
        let d = section(&sections, SectionId::D);
        assert_eq!(d.findings.len(), PROCEDIMENTOS_EXCECAO.len());
    }

    #[test]
    fn test_urgent_tender_lands_in_f() {
        let mut contract =
            goods_contract("Obras de inverno", "Fornecedor A", 500.0, "02-01-2024");
        contract.tipo_procedimento = PROCEDIMENTOS_URGENTES[1].to_string();
        contract.fundamentacao = "Outra".to_string();
        let contracts = vec![contract];
        let sections = audit_contracts(&contracts, &context_for(&contracts));
        let f = section(&sections, SectionId::F);
        assert_eq!(f.findings.len(), 1);
        assert_eq!(f.findings[0].rule, "F");
        assert!(section(&sections, SectionId::I).findings.is_empty());
    }

    #[test]
    fn test_article_11_variants_land_in_h_not_i() {
        // The source data writes the citation both with and without the
        // ordinal dot.
        let with_dot = {
            let mut c = goods_contract("Fornecimento de água", "Fornecedor A", 500.0, "02-01-2024");
            c.fundamentacao = FUNDAMENTACAO_ART_11.to_string();
            c.tipos_contrato = "Outro".to_string();
            c
        };
        let without_dot = {
            let mut c = goods_contract("Distribuição postal", "Fornecedor B", 500.0, "03-01-2024");
            c.fundamentacao = FUNDAMENTACAO_ART_11_SEM_PONTO.to_string();
            c.tipos_contrato = "Outro".to_string();
            c
        };
        let contracts = vec![with_dot, without_dot];
        let sections = audit_contracts(&contracts, &context_for(&contracts));
        let h = section(&sections, SectionId::H);
        assert_eq!(h.findings.len(), 2);
        assert!(section(&sections, SectionId::I).findings.is_empty());
    }

    #[test]
    fn test_concession_flagged_regardless_of_price() {
        let mut concession = goods_contract("Concessão", "Fornecedor A", 100.0, "02-01-2024");
        concession.tipos_contrato = "Concessão de serviços públicos".to_string();
        concession.fundamentacao = "Outra".to_string();
        let contracts = vec![concession];
        let sections = audit_contracts(&contracts, &context_for(&contracts));
        assert_eq!(section(&sections, SectionId::G).findings.len(), 1);
    }

    #[test]
    fn test_catch_all_skips_flagged_and_known() {
        let unknown = {
            let mut c = goods_contract("Contrato residual", "Fornecedor Z", 500.0, "02-01-2024");
            c.fundamentacao = "Artigo 99.º do Código dos Contratos Públicos".to_string();
            c.tipos_contrato = "Outro".to_string();
            c
        };
        let flagged_elsewhere =
            goods_contract("Acima do limite", "Fornecedor A", 25_000.0, "03-01-2024");
        let empty_fundamentacao = {
            let mut c = goods_contract("Sem fundamentação", "Fornecedor B", 500.0, "04-01-2024");
            c.fundamentacao = "  ".to_string();
            c.tipos_contrato = "Outro".to_string();
            c
        };

        let contracts = vec![unknown, flagged_elsewhere, empty_fundamentacao];
        let sections = audit_contracts(&contracts, &context_for(&contracts));
        let i = section(&sections, SectionId::I);
        assert_eq!(i.findings.len(), 1);
        assert_eq!(i.findings[0].contract.objeto, "Contrato residual");
    }

    #[test]
    fn test_article_5_family_detection() {
        assert!(is_artigo_5_family("artigo 5.º do ccp"));
        assert!(is_artigo_5_family("contratação excluída - artigo 5º"));
        assert!(!is_artigo_5_family("artigo 15.º do ccp"));
        assert!(!is_artigo_5_family("artigo 95.º, alínea a)"));
    }

    #[test]
    fn test_article_5_lands_in_e_not_i() {
        let mut contract = goods_contract("Excluído", "Fornecedor A", 500.0, "02-01-2024");
        contract.fundamentacao = "Artigo 5.º, n.º 4 do Código dos Contratos Públicos".to_string();
        contract.tipos_contrato = "Outro".to_string();
        let contracts = vec![contract];
        let sections = audit_contracts(&contracts, &context_for(&contracts));
        assert_eq!(section(&sections, SectionId::E).findings.len(), 1);
        assert!(section(&sections, SectionId::I).findings.is_empty());
    }

    #[test]
    fn test_findings_sorted_by_object() {
        let contracts = vec![
            goods_contract("Zinco", "Fornecedor A", 25_000.0, "02-01-2024"),
            goods_contract("Água engarrafada", "Fornecedor B", 25_000.0, "03-01-2024"),
            goods_contract("Material", "Fornecedor C", 25_000.0, "04-01-2024"),
        ];
        let sections = audit_contracts(&contracts, &context_for(&contracts));
        let objects: Vec<&str> = section(&sections, SectionId::A)
            .findings
            .iter()
            .map(|f| f.contract.objeto.as_str())
            .collect();
        // "Água" sorts under A with the folded collation key.
        assert_eq!(objects, vec!["Água engarrafada", "Material", "Zinco"]);
    }

    #[test]
    fn test_audit_is_idempotent() {
        let contracts = vec![
            goods_contract("Primeiro", "Fornecedor A", 12_000.0, "05-01-2024"),
            goods_contract("Segundo", "Fornecedor A", 9_000.0, "20-06-2024"),
            goods_contract("Antigo", "Fornecedor A", 30_000.0, "05-01-2023"),
        ];
        let context = context_for(&contracts);
        let first = audit_contracts(&contracts, &context);
        let second = audit_contracts(&contracts, &context);

        let flatten = |sections: &[Section]| -> Vec<(String, String)> {
            sections
                .iter()
                .flat_map(|s| {
                    s.findings
                        .iter()
                        .map(|f| (f.rule.clone(), f.contract.id.clone()))
                })
                .collect()
        };
        assert_eq!(flatten(&first), flatten(&second));
    }
}
