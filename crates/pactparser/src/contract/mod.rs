//! Extracted contract data: the nested, optional-everywhere structure
//! produced by the extraction step, and the structural check that turns an
//! untyped JSON value into it.

pub mod schema;
pub mod validate;

pub use schema::{
    AccountInfo, BankingDetails, ChargeType, ContractType, ExtractedContract, FinancialDetails,
    LineItem, Party, PaymentStructure, RevenueClassification, ServiceLevelAgreement, Signatory,
    SlaCommitment,
};
pub use validate::{validate, SchemaViolation};
