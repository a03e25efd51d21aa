//! Builders for extraction replies and scripted collaborators.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use serde_json::{json, Map, Value};

use pactparser::error::IntelligenceError;
use pactparser::intelligence::IntelligenceClient;

/// Builder for the JSON a model would return for a contract.
pub struct ContractBuilder {
    fields: Map<String, Value>,
}

impl ContractBuilder {
    /// Nothing extracted at all.
    pub fn empty() -> Self {
        Self { fields: Map::new() }
    }

    /// Every scored category fully populated.
    pub fn complete() -> Self {
        Self::empty()
            .parties(&[("Acme Corp", "Customer"), ("Globex LLC", "Vendor")])
            .financials(120000.0, &[("Platform licence", 100000.0), ("Onboarding", 20000.0)])
            .payment("Net 30", "Quarterly in advance")
            .sla(&[("Uptime", "99.9% monthly")])
            .billing_contact("Dana Price", "billing@acme.example")
    }

    pub fn parties(mut self, parties: &[(&str, &str)]) -> Self {
        let parties: Vec<Value> = parties
            .iter()
            .map(|(name, role)| json!({ "legal_name": name, "role": role }))
            .collect();
        self.fields.insert("parties".to_string(), Value::Array(parties));
        self
    }

    pub fn financials(mut self, total_value: f64, line_items: &[(&str, f64)]) -> Self {
        let items: Vec<Value> = line_items
            .iter()
            .map(|(description, price)| json!({ "description": description, "total": price }))
            .collect();
        self.fields.insert(
            "financial_details".to_string(),
            json!({ "total_contract_value": total_value, "currency": "USD", "line_items": items }),
        );
        self
    }

    pub fn payment(mut self, terms: &str, schedule: &str) -> Self {
        self.fields.insert(
            "payment_structure".to_string(),
            json!({ "payment_terms": terms, "payment_schedule": schedule }),
        );
        self
    }

    pub fn sla(mut self, commitments: &[(&str, &str)]) -> Self {
        let details: Vec<Value> = commitments
            .iter()
            .map(|(metric, commitment)| json!({ "metric": metric, "commitment": commitment }))
            .collect();
        self.fields.insert(
            "service_level_agreements".to_string(),
            json!({ "sla_details": details }),
        );
        self
    }

    pub fn billing_contact(mut self, name: &str, email: &str) -> Self {
        self.fields.insert(
            "account_info".to_string(),
            json!({ "billing_contact_name": name, "billing_contact_email": email }),
        );
        self
    }

    /// Overrides or adds a top-level field verbatim.
    pub fn field(mut self, key: &str, value: Value) -> Self {
        self.fields.insert(key.to_string(), value);
        self
    }

    pub fn without(mut self, key: &str) -> Self {
        self.fields.remove(key);
        self
    }

    pub fn build(self) -> Value {
        Value::Object(self.fields)
    }
}

/// One scripted model answer.
#[derive(Debug, Clone)]
pub enum Reply {
    Json(Value),
    /// The model endpoint answers with an HTTP error.
    Unavailable,
    Panic,
}

/// Model stand-in that answers from a script. The last reply repeats once
/// the script runs out.
pub struct ScriptedModel {
    replies: Mutex<VecDeque<Reply>>,
    last: Reply,
    prompts: Mutex<Vec<String>>,
}

impl ScriptedModel {
    pub fn new(replies: Vec<Reply>) -> Self {
        let last = replies.last().cloned().unwrap_or(Reply::Unavailable);
        Self {
            replies: Mutex::new(replies.into()),
            last,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn always(reply: Reply) -> Self {
        Self::new(vec![reply])
    }

    /// Texts the model was asked about, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts.lock().unwrap().clone()
    }

    pub fn calls(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    fn next_reply(&self) -> Reply {
        let mut replies = self.replies.lock().unwrap();
        replies.pop_front().unwrap_or_else(|| self.last.clone())
    }
}

impl IntelligenceClient for ScriptedModel {
    fn extract_structured(&self, text: &str) -> Result<Value, IntelligenceError> {
        self.prompts.lock().unwrap().push(text.to_string());

        match self.next_reply() {
            Reply::Json(value) => Ok(value),
            Reply::Unavailable => Err(IntelligenceError::Service {
                status: 503,
                body: "upstream overloaded".to_string(),
            }),
            Reply::Panic => panic!("model client crashed"),
        }
    }
}
