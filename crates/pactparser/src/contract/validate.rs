//! Structural check of raw extraction output.
//!
//! The extraction step returns loosely-typed JSON. Before scoring, the value
//! is walked field by field and converted into an [`ExtractedContract`]. The
//! walk is lenient where a model is likely to drift (numbers given as
//! numeric strings, booleans as `"true"`) and strict everywhere else. Nulls
//! and absent keys are always accepted; unknown keys are ignored. The first
//! violation is reported together with its location.

use serde_json::{Map, Value};
use thiserror::Error;

use super::schema::*;

/// The first place where a value did not match the expected structure.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{path}: {reason}")]
pub struct SchemaViolation {
    /// JSONPath-style location, e.g. `$.parties[0].legal_name`.
    pub path: String,
    pub reason: String,
}

impl SchemaViolation {
    fn expected(path: String, expected: &str, found: &Value) -> Self {
        Self {
            path,
            reason: format!("expected {expected}, found {}", kind_of(found)),
        }
    }
}

type Result<T> = std::result::Result<T, SchemaViolation>;

/// Validates `value` against the extracted-contract structure.
pub fn validate(value: &Value) -> Result<ExtractedContract> {
    let root = Fields::object(value, "$".to_string())?;

    Ok(ExtractedContract {
        parties: root.list("parties", party)?,
        account_info: root.nested("account_info", account_info)?,
        financial_details: root.nested("financial_details", financial_details)?,
        payment_structure: root.nested("payment_structure", payment_structure)?,
        revenue_classification: root.nested("revenue_classification", revenue_classification)?,
        service_level_agreements: root.nested("service_level_agreements", service_level)?,
        effective_date: root.string("effective_date")?,
        term_length: root.string("term_length")?,
        governing_law: root.string("governing_law")?,
    })
}

fn party(f: Fields<'_>) -> Result<Party> {
    Ok(Party {
        legal_name: f.string("legal_name")?,
        role: f.string("role")?,
        registration_details: f.string("registration_details")?,
        address: f.string("address")?,
        signatories: f.list("signatories", |s| {
            Ok(Signatory {
                name: s.string("name")?,
                role: s.string("role")?,
            })
        })?,
    })
}

fn account_info(f: Fields<'_>) -> Result<AccountInfo> {
    Ok(AccountInfo {
        account_number: f.string("account_number")?,
        billing_contact_name: f.string("billing_contact_name")?,
        billing_contact_email: f.string("billing_contact_email")?,
        billing_contact_phone: f.string("billing_contact_phone")?,
        technical_contact_name: f.string("technical_contact_name")?,
        technical_contact_email: f.string("technical_contact_email")?,
        technical_contact_phone: f.string("technical_contact_phone")?,
    })
}

fn financial_details(f: Fields<'_>) -> Result<FinancialDetails> {
    Ok(FinancialDetails {
        total_contract_value: f.number("total_contract_value")?,
        monthly_recurring_revenue: f.number("monthly_recurring_revenue")?,
        total_one_time_fees: f.number("total_one_time_fees")?,
        currency: f.string("currency")?,
        tax_information: f.string("tax_information")?,
        line_items: f.list("line_items", |item| {
            Ok(LineItem {
                description: item.string("description")?,
                quantity: item.number("quantity")?,
                unit_price: item.number("unit_price")?,
                total: item.number("total")?,
                item_type: item.choice("item_type", &ChargeType::ALL)?,
            })
        })?,
    })
}

fn payment_structure(f: Fields<'_>) -> Result<PaymentStructure> {
    Ok(PaymentStructure {
        payment_terms: f.string("payment_terms")?,
        payment_schedule: f.string("payment_schedule")?,
        due_dates: f.string("due_dates")?,
        payment_method: f.string("payment_method")?,
        late_payment_clause: f.string("late_payment_clause")?,
        banking_details: f.nested("banking_details", |b| {
            Ok(BankingDetails {
                bank_name: b.string("bank_name")?,
                account_number: b.string("account_number")?,
                routing_number: b.string("routing_number")?,
            })
        })?,
    })
}

fn revenue_classification(f: Fields<'_>) -> Result<RevenueClassification> {
    Ok(RevenueClassification {
        contract_type: f.choice("contract_type", &ContractType::ALL)?,
        billing_cycle: f.string("billing_cycle")?,
        renewal_terms: f.string("renewal_terms")?,
        auto_renewal: f.boolean("auto_renewal")?,
    })
}

fn service_level(f: Fields<'_>) -> Result<ServiceLevelAgreement> {
    Ok(ServiceLevelAgreement {
        sla_details: f.list("sla_details", |d| {
            Ok(SlaCommitment {
                metric: d.string("metric")?,
                commitment: d.string("commitment")?,
            })
        })?,
        penalty_clauses: f.string("penalty_clauses")?,
        remedies: f.string("remedies")?,
        support_terms: f.string("support_terms")?,
    })
}

/// An object being walked, with its location for error reporting.
struct Fields<'a> {
    map: &'a Map<String, Value>,
    path: String,
}

impl<'a> Fields<'a> {
    fn object(value: &'a Value, path: String) -> Result<Self> {
        match value {
            Value::Object(map) => Ok(Self { map, path }),
            other => Err(SchemaViolation::expected(path, "object", other)),
        }
    }

    fn path_of(&self, key: &str) -> String {
        format!("{}.{}", self.path, key)
    }

    /// Present and non-null.
    fn get(&self, key: &str) -> Option<&'a Value> {
        self.map.get(key).filter(|v| !v.is_null())
    }

    fn string(&self, key: &str) -> Result<Option<String>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(other) => Err(SchemaViolation::expected(self.path_of(key), "string", other)),
        }
    }

    fn number(&self, key: &str) -> Result<Option<f64>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Number(n)) => Ok(n.as_f64()),
            Some(Value::String(s)) => match s.trim().parse::<f64>() {
                Ok(n) if n.is_finite() => Ok(Some(n)),
                _ => Err(SchemaViolation {
                    path: self.path_of(key),
                    reason: format!("expected number, found non-numeric string {s:?}"),
                }),
            },
            Some(other) => Err(SchemaViolation::expected(self.path_of(key), "number", other)),
        }
    }

    fn boolean(&self, key: &str) -> Result<Option<bool>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::Bool(b)) => Ok(Some(*b)),
            Some(Value::String(s)) if s.eq_ignore_ascii_case("true") => Ok(Some(true)),
            Some(Value::String(s)) if s.eq_ignore_ascii_case("false") => Ok(Some(false)),
            Some(other) => Err(SchemaViolation::expected(self.path_of(key), "boolean", other)),
        }
    }

    fn choice<T: Copy>(&self, key: &str, options: &[(&str, T)]) -> Result<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(Value::String(s)) => options
                .iter()
                .find(|(name, _)| *name == s.as_str())
                .map(|(_, v)| Some(*v))
                .ok_or_else(|| {
                    let allowed: Vec<&str> = options.iter().map(|(name, _)| *name).collect();
                    SchemaViolation {
                        path: self.path_of(key),
                        reason: format!("expected one of {allowed:?}, found {s:?}"),
                    }
                }),
            Some(other) => Err(SchemaViolation::expected(self.path_of(key), "string", other)),
        }
    }

    fn nested<T>(&self, key: &str, build: impl Fn(Fields<'a>) -> Result<T>) -> Result<Option<T>> {
        match self.get(key) {
            None => Ok(None),
            Some(value) => build(Fields::object(value, self.path_of(key))?).map(Some),
        }
    }

    fn list<T>(&self, key: &str, build: impl Fn(Fields<'a>) -> Result<T>) -> Result<Option<Vec<T>>> {
        let items = match self.get(key) {
            None => return Ok(None),
            Some(Value::Array(items)) => items,
            Some(other) => {
                return Err(SchemaViolation::expected(self.path_of(key), "array", other))
            }
        };

        items
            .iter()
            .enumerate()
            .map(|(i, item)| build(Fields::object(item, format!("{}[{i}]", self.path_of(key)))?))
            .collect::<Result<Vec<_>>>()
            .map(Some)
    }
}

fn kind_of(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(n) if n.is_f64() => "number",
        Value::Number(_) => "integer",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
