//! Entity records produced and consumed by the masking engine.

use serde::{Deserialize, Serialize};

/// Fixed set of PII categories the engine detects.
///
/// The snake_case wire names (`email`, `phone_number`, ...) are part of the
/// API contract and also appear inside placeholder tokens, so renaming a
/// variant is a breaking change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PiiClass {
    Email,
    PhoneNumber,
    CreditDebitNo,
    CvvNo,
    ExpiryNo,
    AadharNum,
    Dob,
    FullName,
}

impl PiiClass {
    pub fn as_str(&self) -> &'static str {
        match self {
            PiiClass::Email => "email",
            PiiClass::PhoneNumber => "phone_number",
            PiiClass::CreditDebitNo => "credit_debit_no",
            PiiClass::CvvNo => "cvv_no",
            PiiClass::ExpiryNo => "expiry_no",
            PiiClass::AadharNum => "aadhar_num",
            PiiClass::Dob => "dob",
            PiiClass::FullName => "full_name",
        }
    }

    /// Placeholder token substituted for a detected span.
    pub fn placeholder(&self) -> &'static str {
        match self {
            PiiClass::Email => "[email]",
            PiiClass::PhoneNumber => "[phone_number]",
            PiiClass::CreditDebitNo => "[credit_debit_no]",
            PiiClass::CvvNo => "[cvv_no]",
            PiiClass::ExpiryNo => "[expiry_no]",
            PiiClass::AadharNum => "[aadhar_num]",
            PiiClass::Dob => "[dob]",
            PiiClass::FullName => "[full_name]",
        }
    }
}

/// One detected-and-replaced PII occurrence.
///
/// `position` is a half-open character range in the **final masked text**,
/// i.e. the span currently occupied by the placeholder token, not the span
/// the original substring had in the input. It serializes as
/// `[start, end]`. `entity` holds the original substring, which is all
/// [`demask`](super::demask) needs to reverse the substitution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PiiEntity {
    pub position: (usize, usize),
    pub classification: PiiClass,
    pub entity: String,
}

/// Result of a [`MaskingEngine::mask`](super::MaskingEngine::mask) call:
/// the masked text plus its entity records sorted by ascending start.
#[derive(Debug, Clone)]
pub struct MaskOutcome {
    pub masked: String,
    pub entities: Vec<PiiEntity>,
}
