//! Gap wording. Each category owns a distinct set of messages so callers can
//! tell "block absent" apart from "block present but incomplete".

pub const FINANCIAL_VALUE_MISSING: &str = "Missing Total Contract Value or MRR.";
pub const FINANCIAL_LINE_ITEMS_MISSING: &str = "Missing detailed line items.";
pub const FINANCIAL_ABSENT: &str = "Missing all financial details.";

pub const PARTIES_ONLY_ONE: &str = "Only one party was clearly identified with a legal name.";
pub const PARTIES_NONE_NAMED: &str = "Failed to identify any parties with a legal name.";
pub const PARTIES_ABSENT: &str = "Missing all contract party details.";

pub const PAYMENT_TERMS_MISSING: &str = "Missing payment terms (e.g., Net 30).";
pub const PAYMENT_SCHEDULE_MISSING: &str = "Missing payment schedule or due dates.";
pub const PAYMENT_ABSENT: &str = "Missing all payment structure details.";

pub const SLA_WITHOUT_TERMS: &str =
    "SLA section found, but no specific metrics or penalties defined.";
pub const SLA_ABSENT: &str = "Missing all service level agreement (SLA) details.";

pub const CONTACT_BILLING_MISSING: &str = "Missing billing contact details (name or email).";
pub const CONTACT_ABSENT: &str = "Missing all account and contact information.";

/// Prefix of the single gap emitted for structurally invalid input.
pub const STRUCTURAL_PARSE_FAILURE: &str =
    "Critical parse error: invalid data structure from extraction.";
