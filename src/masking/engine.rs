//! Mask and demask operations with offset bookkeeping.
//!
//! Every substitution changes the length of the text, which shifts the
//! offsets of everything to its right. Each detection pass therefore runs
//! as a builder over an immutable input: matches are spliced into a fresh
//! buffer and entity offsets recorded against that buffer as it grows.
//! After a pass completes, the offsets of entities found by earlier passes
//! are shifted through the pass's length deltas, so the positions in the
//! returned list are always valid against the final masked text.
//!
//! All positions are character offsets, matching the `[start, end]` ranges
//! exposed on the wire.

use std::ops::Range;
use std::sync::Arc;

use crate::errors::{AppError, Result};
use crate::ner::{NameRecognizer, PersonSpan};

use super::patterns::PiiPatterns;
use super::types::{MaskOutcome, PiiClass, PiiEntity};

/// Length delta introduced by one substitution, in character coordinates
/// of the pass input.
struct Shift {
    input_end: usize,
    delta: isize,
}

/// Detects PII spans and replaces them with placeholder tokens.
///
/// Structured categories are scanned in the fixed order of
/// [`PiiPatterns`]; person names are found afterwards over the already
/// structurally-masked text by the injected recognizer. The engine holds
/// no mutable state, so one instance can serve concurrent calls.
pub struct MaskingEngine {
    patterns: PiiPatterns,
    recognizer: Arc<dyn NameRecognizer>,
}

impl MaskingEngine {
    pub fn new(recognizer: Arc<dyn NameRecognizer>) -> Self {
        Self {
            patterns: PiiPatterns::new(),
            recognizer,
        }
    }

    pub fn with_patterns(patterns: PiiPatterns, recognizer: Arc<dyn NameRecognizer>) -> Self {
        Self {
            patterns,
            recognizer,
        }
    }

    /// Replace every detected PII span with its placeholder token.
    ///
    /// Returns the masked text plus the entity records needed to reverse
    /// the substitutions, sorted by ascending start position. A recognizer
    /// failure aborts the whole call with
    /// [`AppError::DetectorUnavailable`]; partial masking is never
    /// returned.
    pub fn mask(&self, text: &str) -> Result<MaskOutcome> {
        let mut masked = text.to_string();
        let mut entities: Vec<PiiEntity> = Vec::new();

        for (class, pattern) in self.patterns.rules() {
            let spans: Vec<Range<usize>> = pattern.find_iter(&masked).map(|m| m.range()).collect();
            if spans.is_empty() {
                continue;
            }
            masked = apply_pass(&masked, &spans, *class, &mut entities);
        }

        let name_spans = self
            .recognizer
            .person_spans(&masked)
            .map_err(|e| AppError::DetectorUnavailable(e.to_string()))?;
        let name_spans = accepted_name_spans(&masked, name_spans, &entities);
        if !name_spans.is_empty() {
            masked = apply_pass(&masked, &name_spans, PiiClass::FullName, &mut entities);
        }

        entities.sort_by_key(|e| e.position.0);
        Ok(MaskOutcome { masked, entities })
    }
}

/// Run one substitution pass.
///
/// `spans` are byte ranges in `input`, ascending and non-overlapping. New
/// entities are recorded in character coordinates of the returned buffer;
/// previously recorded entity positions are shifted to stay valid. A span
/// from a later pass never lands inside an existing placeholder (no
/// pattern matches placeholder text, and recognizer spans are filtered),
/// so prior spans only ever move as a whole.
fn apply_pass(
    input: &str,
    spans: &[Range<usize>],
    class: PiiClass,
    entities: &mut Vec<PiiEntity>,
) -> String {
    let placeholder = class.placeholder();
    let placeholder_chars = placeholder.chars().count();

    let mut out = String::with_capacity(input.len());
    let mut shifts: Vec<Shift> = Vec::with_capacity(spans.len());
    let mut found: Vec<PiiEntity> = Vec::with_capacity(spans.len());

    let mut last_byte = 0usize;
    let mut out_chars = 0usize;
    let mut in_chars = 0usize;

    for span in spans {
        let gap_chars = input[last_byte..span.start].chars().count();
        out.push_str(&input[last_byte..span.start]);
        out_chars += gap_chars;
        in_chars += gap_chars;

        let original = &input[span.clone()];
        let original_chars = original.chars().count();

        found.push(PiiEntity {
            position: (out_chars, out_chars + placeholder_chars),
            classification: class,
            entity: original.to_string(),
        });
        shifts.push(Shift {
            input_end: in_chars + original_chars,
            delta: placeholder_chars as isize - original_chars as isize,
        });

        out.push_str(placeholder);
        out_chars += placeholder_chars;
        in_chars += original_chars;
        last_byte = span.end;
    }
    out.push_str(&input[last_byte..]);

    for entity in entities.iter_mut() {
        entity.position = shifted(entity.position, &shifts);
    }
    entities.append(&mut found);
    out
}

/// Shift a character range recorded against the pass input into the
/// coordinates of the pass output. Only substitutions entirely left of
/// the range move it.
fn shifted((start, end): (usize, usize), shifts: &[Shift]) -> (usize, usize) {
    let mut delta = 0isize;
    for shift in shifts {
        if shift.input_end <= start {
            delta += shift.delta;
        } else {
            break;
        }
    }
    (
        (start as isize + delta) as usize,
        (end as isize + delta) as usize,
    )
}

/// Sanitize recognizer output into byte spans the builder can splice.
///
/// Spans are clamped to valid char boundaries, sorted, and deduplicated;
/// a span intersecting an existing placeholder is dropped, because the
/// recognizer occasionally tags a placeholder token as part of a name and
/// replacing it would make the substitution irreversible.
fn accepted_name_spans(
    text: &str,
    spans: Vec<PersonSpan>,
    entities: &[PiiEntity],
) -> Vec<Range<usize>> {
    let mut spans: Vec<(usize, usize)> = spans
        .into_iter()
        .filter(|s| {
            s.start < s.end
                && s.end <= text.len()
                && text.is_char_boundary(s.start)
                && text.is_char_boundary(s.end)
        })
        .map(|s| (s.start, s.end))
        .collect();
    spans.sort_unstable();

    let mut accepted: Vec<Range<usize>> = Vec::with_capacity(spans.len());
    let mut prev_end = 0usize;
    for (start, end) in spans {
        if start < prev_end {
            tracing::debug!(start, end, "dropping overlapping person span");
            continue;
        }
        let char_start = text[..start].chars().count();
        let char_end = char_start + text[start..end].chars().count();
        let hits_placeholder = entities
            .iter()
            .any(|e| char_start < e.position.1 && e.position.0 < char_end);
        if hits_placeholder {
            tracing::debug!(start, end, "dropping person span over a placeholder");
            continue;
        }
        accepted.push(start..end);
        prev_end = end;
    }
    accepted
}

/// Restore the original text from a masked copy and its entity list.
///
/// Entities are spliced rightmost-first, so a replacement can never
/// invalidate the position of one still pending (everything pending lies
/// strictly to its left). The list must be the one produced by the
/// `mask` call that yielded `masked`: a span that is out of bounds or
/// does not hold its classification's placeholder fails with
/// [`AppError::MalformedEntityList`] instead of corrupting the text.
pub fn demask(masked: &str, entities: &[PiiEntity]) -> Result<String> {
    let mut text = masked.to_string();
    for entity in entities.iter().rev() {
        let (start, end) = entity.position;
        if start >= end {
            return Err(AppError::MalformedEntityList(format!(
                "empty or inverted span {start}..{end}"
            )));
        }
        let total_chars = text.chars().count();
        let (byte_start, byte_end) = match (char_to_byte(&text, start), char_to_byte(&text, end)) {
            (Some(s), Some(e)) => (s, e),
            _ => {
                return Err(AppError::MalformedEntityList(format!(
                    "span {start}..{end} out of bounds for text of {total_chars} chars"
                )))
            }
        };
        let placeholder = entity.classification.placeholder();
        if &text[byte_start..byte_end] != placeholder {
            return Err(AppError::MalformedEntityList(format!(
                "span {start}..{end} does not hold the {placeholder} token"
            )));
        }
        text.replace_range(byte_start..byte_end, &entity.entity);
    }
    Ok(text)
}

/// Byte offset of the `char_idx`-th character; `Some(len)` when the index
/// is one past the final character.
fn char_to_byte(text: &str, char_idx: usize) -> Option<usize> {
    let mut count = 0usize;
    for (byte, _) in text.char_indices() {
        if count == char_idx {
            return Some(byte);
        }
        count += 1;
    }
    (count == char_idx).then_some(text.len())
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Recognizer that reports every occurrence of the configured names.
    struct FixedNames(Vec<&'static str>);

    impl NameRecognizer for FixedNames {
        fn person_spans(&self, text: &str) -> anyhow::Result<Vec<PersonSpan>> {
            let mut spans = Vec::new();
            for name in &self.0 {
                let mut from = 0;
                while let Some(at) = text[from..].find(name) {
                    let start = from + at;
                    spans.push(PersonSpan {
                        start,
                        end: start + name.len(),
                    });
                    from = start + name.len();
                }
            }
            Ok(spans)
        }
    }

    struct BrokenRecognizer;

    impl NameRecognizer for BrokenRecognizer {
        fn person_spans(&self, _text: &str) -> anyhow::Result<Vec<PersonSpan>> {
            anyhow::bail!("model not loaded")
        }
    }

    fn engine(names: Vec<&'static str>) -> MaskingEngine {
        MaskingEngine::new(Arc::new(FixedNames(names)))
    }

    #[test]
    fn test_mask_empty_input() {
        let outcome = engine(vec![]).mask("").unwrap();
        assert_eq!(outcome.masked, "");
        assert!(outcome.entities.is_empty());
    }

    #[test]
    fn test_mask_no_pii() {
        let outcome = engine(vec![]).mask("Build succeeded.").unwrap();
        assert_eq!(outcome.masked, "Build succeeded.");
        assert!(outcome.entities.is_empty());
    }

    #[test]
    fn test_mask_single_email() {
        let outcome = engine(vec![]).mask("mail me at a@b.com please").unwrap();
        assert_eq!(outcome.masked, "mail me at [email] please");
        assert_eq!(outcome.entities.len(), 1);
        let e = &outcome.entities[0];
        assert_eq!(e.classification, PiiClass::Email);
        assert_eq!(e.entity, "a@b.com");
        assert_eq!(e.position, (11, 18));
    }

    #[test]
    fn test_later_pass_shifts_earlier_entities() {
        // The email pass runs first; the phone pass then replaces a span
        // to its LEFT, which must shift the recorded email position.
        let outcome = engine(vec![])
            .mask("9876543210 or write a@b.com")
            .unwrap();
        assert_eq!(outcome.masked, "[phone_number] or write [email]");
        assert_eq!(outcome.entities.len(), 2);
        assert_eq!(outcome.entities[0].classification, PiiClass::PhoneNumber);
        assert_eq!(outcome.entities[1].classification, PiiClass::Email);
        for e in &outcome.entities {
            let span: String = outcome
                .masked
                .chars()
                .skip(e.position.0)
                .take(e.position.1 - e.position.0)
                .collect();
            assert_eq!(span, e.classification.placeholder());
        }
    }

    #[test]
    fn test_phone_priority_over_cvv() {
        let outcome = engine(vec![]).mask("call 123-456-7890").unwrap();
        assert_eq!(outcome.entities.len(), 1);
        assert_eq!(outcome.entities[0].classification, PiiClass::PhoneNumber);
        assert_eq!(outcome.entities[0].entity, "123-456-7890");
    }

    #[test]
    fn test_name_detection_runs_on_masked_text() {
        let outcome = engine(vec!["John Doe"])
            .mask("Hi, I am John Doe (john@x.io)")
            .unwrap();
        assert_eq!(outcome.masked, "Hi, I am [full_name] ([email])");
        assert_eq!(outcome.entities.len(), 2);
        assert_eq!(outcome.entities[0].classification, PiiClass::FullName);
        assert_eq!(outcome.entities[0].entity, "John Doe");
    }

    #[test]
    fn test_name_span_over_placeholder_is_dropped() {
        // A recognizer that tags the masked email token as a name must not
        // clobber the placeholder.
        let outcome = engine(vec!["[email]"]).mask("from a@b.com").unwrap();
        assert_eq!(outcome.masked, "from [email]");
        assert_eq!(outcome.entities.len(), 1);
        assert_eq!(outcome.entities[0].classification, PiiClass::Email);
    }

    #[test]
    fn test_recognizer_failure_is_hard_error() {
        let engine = MaskingEngine::new(Arc::new(BrokenRecognizer));
        let err = engine.mask("anything").unwrap_err();
        assert!(matches!(err, AppError::DetectorUnavailable(_)));
    }

    #[test]
    fn test_round_trip_multibyte_text() {
        let text = "héllo 😀 reach me at a@b.com or 123-456-7890, danke";
        let outcome = engine(vec![]).mask(text).unwrap();
        assert_eq!(demask(&outcome.masked, &outcome.entities).unwrap(), text);
    }

    #[test]
    fn test_demask_reverses_mask() {
        let text = "Card 1234-5678-9012-3456 cvv 123, dob 12/12/1990, a@b.com";
        let outcome = engine(vec![]).mask(text).unwrap();
        assert_eq!(demask(&outcome.masked, &outcome.entities).unwrap(), text);
    }

    #[test]
    fn test_demask_rejects_out_of_bounds_span() {
        let entities = vec![PiiEntity {
            position: (2, 99),
            classification: PiiClass::Email,
            entity: "a@b.com".to_string(),
        }];
        let err = demask("short", &entities).unwrap_err();
        assert!(matches!(err, AppError::MalformedEntityList(_)));
    }

    #[test]
    fn test_demask_rejects_span_without_placeholder() {
        let entities = vec![PiiEntity {
            position: (0, 7),
            classification: PiiClass::Email,
            entity: "a@b.com".to_string(),
        }];
        let err = demask("not a token here", &entities).unwrap_err();
        assert!(matches!(err, AppError::MalformedEntityList(_)));
    }

    #[test]
    fn test_entities_sorted_and_disjoint() {
        let outcome = engine(vec!["Jane Roe"])
            .mask("Jane Roe, card 1111 2222 3333 4444, a@b.com, pin 999")
            .unwrap();
        for pair in outcome.entities.windows(2) {
            assert!(pair[0].position.0 < pair[1].position.0);
            assert!(pair[0].position.1 <= pair[1].position.0);
        }
    }
}
