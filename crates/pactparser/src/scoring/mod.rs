//! Completeness scoring.
//!
//! Maps extracted contract data to a 0-100 score and an ordered list of
//! gaps. Only presence of fields is measured, never whether their values
//! are correct. Categories are evaluated in a fixed order and each one
//! contributes its gaps in sequence.

pub mod gaps;

use serde::Serialize;
use serde_json::Value;

use crate::contract::{self, ExtractedContract, FinancialDetails, Party, PaymentStructure};

/// Scoring categories in evaluation order.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Financial,
    Parties,
    Payment,
    ServiceLevel,
    Contact,
}

impl Category {
    pub const ALL: [Category; 5] = [
        Category::Financial,
        Category::Parties,
        Category::Payment,
        Category::ServiceLevel,
        Category::Contact,
    ];

    /// Maximum points for the category. Weights sum to 100.
    pub const fn weight(self) -> f64 {
        match self {
            Category::Financial => 30.0,
            Category::Parties => 25.0,
            Category::Payment => 20.0,
            Category::ServiceLevel => 15.0,
            Category::Contact => 10.0,
        }
    }
}

/// Result of scoring one extraction.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompletenessReport {
    /// 0.0..=100.0, rounded to two decimals.
    pub score: f64,
    pub gaps: Vec<String>,
    /// False when the input failed structural validation. The score is then
    /// 0.0 and `gaps` holds a single parse-failure entry.
    pub structurally_valid: bool,
}

/// Scores untyped extraction output.
pub fn score_and_gaps(raw: &Value) -> (f64, Vec<String>) {
    let report = assess(raw);
    (report.score, report.gaps)
}

/// Validates `raw` and scores it, folding a structural failure into a zero
/// score with one gap.
pub fn assess(raw: &Value) -> CompletenessReport {
    match contract::validate(raw) {
        Ok(contract) => score_contract(&contract),
        Err(violation) => CompletenessReport {
            score: 0.0,
            gaps: vec![format!("{} {violation}", gaps::STRUCTURAL_PARSE_FAILURE)],
            structurally_valid: false,
        },
    }
}

/// Scores already-validated data.
pub fn score_contract(contract: &ExtractedContract) -> CompletenessReport {
    let mut tally = Tally::default();

    for category in Category::ALL {
        match category {
            Category::Financial => financial(&mut tally, contract.financial_details.as_ref()),
            Category::Parties => parties(&mut tally, contract.parties.as_deref()),
            Category::Payment => payment(&mut tally, contract.payment_structure.as_ref()),
            Category::ServiceLevel => service_level(&mut tally, contract),
            Category::Contact => contact(&mut tally, contract),
        }
    }

    CompletenessReport {
        score: round2(tally.points.clamp(0.0, 100.0)),
        gaps: tally.gaps,
        structurally_valid: true,
    }
}

#[derive(Default)]
struct Tally {
    points: f64,
    gaps: Vec<String>,
}

impl Tally {
    fn award(&mut self, points: f64) {
        self.points += points;
    }

    fn gap(&mut self, message: &str) {
        self.gaps.push(message.to_string());
    }

    /// Awards `points` when `present`, otherwise records `message`.
    fn check(&mut self, present: bool, points: f64, message: &str) {
        if present {
            self.award(points);
        } else {
            self.gap(message);
        }
    }
}

fn financial(tally: &mut Tally, block: Option<&FinancialDetails>) {
    let Some(block) = block else {
        tally.gap(gaps::FINANCIAL_ABSENT);
        return;
    };

    let half = Category::Financial.weight() / 2.0;
    tally.check(
        has_amount(block.total_contract_value) || has_amount(block.monthly_recurring_revenue),
        half,
        gaps::FINANCIAL_VALUE_MISSING,
    );
    tally.check(has_items(&block.line_items), half, gaps::FINANCIAL_LINE_ITEMS_MISSING);
}

fn parties(tally: &mut Tally, list: Option<&[Party]>) {
    let Some(list) = list else {
        tally.gap(gaps::PARTIES_ABSENT);
        return;
    };

    let named = list.iter().filter(|p| has_text(&p.legal_name)).count();
    match named {
        0 => tally.gap(gaps::PARTIES_NONE_NAMED),
        1 => {
            tally.award(Category::Parties.weight() / 2.0);
            tally.gap(gaps::PARTIES_ONLY_ONE);
        }
        _ => tally.award(Category::Parties.weight()),
    }
}

fn payment(tally: &mut Tally, block: Option<&PaymentStructure>) {
    let Some(block) = block else {
        tally.gap(gaps::PAYMENT_ABSENT);
        return;
    };

    let half = Category::Payment.weight() / 2.0;
    tally.check(has_text(&block.payment_terms), half, gaps::PAYMENT_TERMS_MISSING);
    tally.check(
        has_text(&block.payment_schedule) || has_text(&block.due_dates),
        half,
        gaps::PAYMENT_SCHEDULE_MISSING,
    );
}

fn service_level(tally: &mut Tally, contract: &ExtractedContract) {
    match &contract.service_level_agreements {
        None => tally.gap(gaps::SLA_ABSENT),
        Some(sla) => tally.check(
            has_items(&sla.sla_details) || has_text(&sla.penalty_clauses),
            Category::ServiceLevel.weight(),
            gaps::SLA_WITHOUT_TERMS,
        ),
    }
}

fn contact(tally: &mut Tally, contract: &ExtractedContract) {
    match &contract.account_info {
        None => tally.gap(gaps::CONTACT_ABSENT),
        Some(account) => tally.check(
            has_text(&account.billing_contact_name) || has_text(&account.billing_contact_email),
            Category::Contact.weight(),
            gaps::CONTACT_BILLING_MISSING,
        ),
    }
}

fn has_text(value: &Option<String>) -> bool {
    value.as_deref().is_some_and(|s| !s.is_empty())
}

fn has_amount(value: Option<f64>) -> bool {
    value.is_some_and(|n| n != 0.0)
}

fn has_items<T>(value: &Option<Vec<T>>) -> bool {
    value.as_ref().is_some_and(|items| !items.is_empty())
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
