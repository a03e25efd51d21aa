use serde::{Deserialize, Serialize};

/// A person authorized to sign on behalf of a party.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Signatory {
    pub name: Option<String>,
    /// Title, e.g. "VP of Sales".
    pub role: Option<String>,
}

/// One contracting party.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Party {
    /// Full legal name of the company or person.
    pub legal_name: Option<String>,
    /// Role in the contract, e.g. customer or vendor.
    pub role: Option<String>,
    /// Registration info such as a tax ID.
    pub registration_details: Option<String>,
    pub address: Option<String>,
    pub signatories: Option<Vec<Signatory>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AccountInfo {
    pub account_number: Option<String>,
    pub billing_contact_name: Option<String>,
    pub billing_contact_email: Option<String>,
    pub billing_contact_phone: Option<String>,
    pub technical_contact_name: Option<String>,
    pub technical_contact_email: Option<String>,
    pub technical_contact_phone: Option<String>,
}

/// Whether a charge repeats.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ChargeType {
    Recurring,
    OneTime,
}

impl ChargeType {
    pub const ALL: [(&'static str, ChargeType); 2] = [
        ("recurring", ChargeType::Recurring),
        ("one-time", ChargeType::OneTime),
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LineItem {
    pub description: Option<String>,
    pub quantity: Option<f64>,
    pub unit_price: Option<f64>,
    /// Total for the line (quantity * unit price).
    pub total: Option<f64>,
    pub item_type: Option<ChargeType>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FinancialDetails {
    /// Value over the full term of the contract.
    pub total_contract_value: Option<f64>,
    pub monthly_recurring_revenue: Option<f64>,
    /// Setup, implementation and other one-time charges.
    pub total_one_time_fees: Option<f64>,
    pub currency: Option<String>,
    pub tax_information: Option<String>,
    pub line_items: Option<Vec<LineItem>>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BankingDetails {
    pub bank_name: Option<String>,
    pub account_number: Option<String>,
    pub routing_number: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PaymentStructure {
    /// e.g. "Net 30".
    pub payment_terms: Option<String>,
    /// e.g. "Monthly recurring billing".
    pub payment_schedule: Option<String>,
    /// e.g. "30th of each month".
    pub due_dates: Option<String>,
    pub payment_method: Option<String>,
    pub late_payment_clause: Option<String>,
    pub banking_details: Option<BankingDetails>,
}

/// Primary type of revenue a contract generates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ContractType {
    Recurring,
    OneTime,
    Both,
}

impl ContractType {
    pub const ALL: [(&'static str, ContractType); 3] = [
        ("recurring", ContractType::Recurring),
        ("one-time", ContractType::OneTime),
        ("both", ContractType::Both),
    ];
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RevenueClassification {
    pub contract_type: Option<ContractType>,
    /// e.g. "Monthly", "Annually".
    pub billing_cycle: Option<String>,
    pub renewal_terms: Option<String>,
    pub auto_renewal: Option<bool>,
}

/// A single measured commitment, e.g. "Uptime" / "99.9%".
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SlaCommitment {
    pub metric: Option<String>,
    pub commitment: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ServiceLevelAgreement {
    pub sla_details: Option<Vec<SlaCommitment>>,
    pub penalty_clauses: Option<String>,
    /// Service credits and other remedies.
    pub remedies: Option<String>,
    /// e.g. "24/7 support".
    pub support_terms: Option<String>,
}

/// Best-effort structured view of one contract.
///
/// Every field is independently optional: extraction may find any subset of
/// the information, and absence is meaningful to the completeness score.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ExtractedContract {
    pub parties: Option<Vec<Party>>,
    pub account_info: Option<AccountInfo>,
    pub financial_details: Option<FinancialDetails>,
    pub payment_structure: Option<PaymentStructure>,
    pub revenue_classification: Option<RevenueClassification>,
    pub service_level_agreements: Option<ServiceLevelAgreement>,
    pub effective_date: Option<String>,
    /// e.g. "24 months".
    pub term_length: Option<String>,
    /// e.g. "State of California".
    pub governing_law: Option<String>,
}
