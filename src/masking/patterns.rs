//! Compiled structured-PII patterns.

use regex::Regex;

use super::types::PiiClass;

/// Structured-PII rules in their scan order.
///
/// Order is load-bearing: several patterns can match overlapping digit runs
/// (a card number also looks like a phone number), and each category's pass
/// rewrites the text before the next category scans it, so earlier entries
/// claim characters first. Placeholder tokens contain no digits or `@`, so
/// no rule can re-match text a previous pass already replaced.
pub struct PiiPatterns {
    rules: Vec<(PiiClass, Regex)>,
}

impl PiiPatterns {
    pub fn new() -> Self {
        let rules = vec![
            (
                PiiClass::Email,
                Regex::new(r"[a-zA-Z0-9._%+-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,}").unwrap(),
            ),
            (
                PiiClass::PhoneNumber,
                Regex::new(r"\+?\d{1,3}[-.\s]?\d{1,4}[-.\s]?\d{1,4}[-.\s]?\d{1,4}").unwrap(),
            ),
            (
                PiiClass::CreditDebitNo,
                Regex::new(r"\d{4}[-.\s]?\d{4}[-.\s]?\d{4}[-.\s]?\d{4}").unwrap(),
            ),
            // Also matches incidental 3-4 digit runs (amounts, fragments of
            // dates). Accepted over-masking; do not narrow.
            (PiiClass::CvvNo, Regex::new(r"\b\d{3,4}\b").unwrap()),
            (
                PiiClass::ExpiryNo,
                Regex::new(r"\b(0[1-9]|1[0-2])/(\d{2}|\d{4})\b").unwrap(),
            ),
            (
                PiiClass::AadharNum,
                Regex::new(r"\d{4}\s?\d{4}\s?\d{4}").unwrap(),
            ),
            (
                PiiClass::Dob,
                Regex::new(r"\b(\d{1,2}[-/\s]\d{1,2}[-/\s]\d{2,4})\b").unwrap(),
            ),
        ];
        Self { rules }
    }

    pub fn rules(&self) -> &[(PiiClass, Regex)] {
        &self.rules
    }
}

impl Default for PiiPatterns {
    fn default() -> Self {
        Self::new()
    }
}
