//! Person-name recognition backed by ONNX Runtime.
//!
//! Runs a BERT token-classification model (bert-tiny-NER export, BIO
//! tagging over 9 labels) and keeps only PER spans. The model is small
//! enough (~17MB quantized) to load eagerly at startup, which is also
//! what the error contract wants: a recognizer that cannot load must
//! fail the service up front rather than silently skip name redaction.
//!
//! The engine depends only on the [`NameRecognizer`] trait, so tests and
//! alternative backends can plug in anything that yields person spans.

use anyhow::{Context, Result};
use ort::session::Session;
use ort::value::Value;
use parking_lot::Mutex;
use std::path::PathBuf;
use tokenizers::Tokenizer;

/// One person-name occurrence, as a byte range into the scanned text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PersonSpan {
    pub start: usize,
    pub end: usize,
}

/// Capability the masking engine needs: find person-name spans.
///
/// Implementations must be safe to share across concurrent `mask` calls;
/// spans are expected to be non-overlapping (the engine drops violations
/// defensively rather than panicking).
pub trait NameRecognizer: Send + Sync {
    fn person_spans(&self, text: &str) -> Result<Vec<PersonSpan>>;
}

/// BIO tag set of the bert-tiny-NER ONNX export.
/// Index mapping: O=0, B-MISC=1, I-MISC=2, B-ORG=3, I-ORG=4, B-LOC=5,
/// I-LOC=6, B-PER=7, I-PER=8. This ordering differs from bert-base-NER.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum EntityKind {
    Misc,
    Org,
    Loc,
    Person,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum BioTag {
    Outside,
    Begin(EntityKind),
    Inside(EntityKind),
}

impl BioTag {
    fn from_index(idx: usize) -> Self {
        match idx {
            1 => BioTag::Begin(EntityKind::Misc),
            2 => BioTag::Inside(EntityKind::Misc),
            3 => BioTag::Begin(EntityKind::Org),
            4 => BioTag::Inside(EntityKind::Org),
            5 => BioTag::Begin(EntityKind::Loc),
            6 => BioTag::Inside(EntityKind::Loc),
            7 => BioTag::Begin(EntityKind::Person),
            8 => BioTag::Inside(EntityKind::Person),
            _ => BioTag::Outside,
        }
    }
}

const NUM_LABELS: usize = 9;

/// Configuration for the NER model files.
#[derive(Debug, Clone)]
pub struct NerConfig {
    /// Path to the ONNX model file
    pub model_path: PathBuf,
    /// Path to the tokenizer file
    pub tokenizer_path: PathBuf,
    /// Maximum sequence length (bert-tiny uses 128)
    pub max_length: usize,
    /// Minimum average confidence for a span to count
    pub confidence_threshold: f32,
}

impl Default for NerConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl NerConfig {
    /// Create configuration from environment variables.
    ///
    /// Search order for model files:
    /// 1. MAILGUARD_NER_PATH environment variable
    /// 2. ./models/bert-ner (local)
    /// 3. ../models/bert-ner (parent)
    /// 4. system data dir, e.g. ~/.local/share/mailguard/models/bert-ner
    pub fn from_env() -> Self {
        let base_path = std::env::var("MAILGUARD_NER_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let candidates: Vec<Option<PathBuf>> = vec![
                    Some(PathBuf::from("./models/bert-ner")),
                    Some(PathBuf::from("../models/bert-ner")),
                    dirs::data_dir().map(|p| p.join("mailguard/models/bert-ner")),
                ];

                candidates
                    .into_iter()
                    .flatten()
                    .find(|p| p.join("model.onnx").exists())
                    .unwrap_or_else(|| PathBuf::from("./models/bert-ner"))
            });

        let confidence_threshold = std::env::var("MAILGUARD_NER_CONFIDENCE")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(0.7);

        Self {
            model_path: base_path.join("model.onnx"),
            tokenizer_path: base_path.join("tokenizer.json"),
            max_length: 128,
            confidence_threshold,
        }
    }
}

/// Neural person-name recognizer.
///
/// The ONNX session is held behind a mutex: sessions are cheap to share
/// but not to run concurrently, so concurrent `mask` calls serialize on
/// inference while everything around it stays lock-free.
pub struct BertNameRecognizer {
    config: NerConfig,
    session: Mutex<Session>,
    tokenizer: Tokenizer,
}

impl BertNameRecognizer {
    /// Load the model and tokenizer eagerly; failure here means the
    /// recognizer resource is unavailable and the caller should refuse to
    /// serve rather than run without name redaction.
    pub fn load(config: NerConfig) -> Result<Self> {
        let num_threads = std::env::var("MAILGUARD_ONNX_THREADS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2);

        tracing::info!(
            "Loading NER model from {:?} with {} threads",
            config.model_path,
            num_threads
        );

        let session = Session::builder()
            .context("Failed to create NER session builder")?
            .with_intra_threads(num_threads)
            .context("Failed to set NER thread count")?
            .commit_from_file(&config.model_path)
            .context("Failed to load NER ONNX model")?;

        let tokenizer = Tokenizer::from_file(&config.tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load NER tokenizer: {e}"))?;

        tracing::info!("NER model loaded");

        Ok(Self {
            config,
            session: Mutex::new(session),
            tokenizer,
        })
    }

    fn decode_person_spans(
        &self,
        text: &str,
        logits: &[f32],
        attention: &[i64],
        offsets: &[(usize, usize)],
        seq_len: usize,
    ) -> Vec<(PersonSpan, f32)> {
        let mut spans = Vec::new();
        let mut current: Option<(EntityKind, Vec<usize>, f32)> = None;

        let flush = |current: &mut Option<(EntityKind, Vec<usize>, f32)>,
                     spans: &mut Vec<(PersonSpan, f32)>| {
            if let Some((kind, indices, acc_prob)) = current.take() {
                if kind == EntityKind::Person {
                    if let Some(span) = build_span(text, &indices, offsets) {
                        spans.push((span, acc_prob / indices.len() as f32));
                    }
                }
            }
        };

        for i in 0..seq_len {
            // [CLS] and padding carry no entity signal
            if i == 0 || attention[i] == 0 {
                continue;
            }

            let token_logits = &logits[i * NUM_LABELS..(i + 1) * NUM_LABELS];
            let probs = softmax(token_logits);
            let (best_idx, best_prob) = probs
                .iter()
                .enumerate()
                .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
                .unwrap_or((0, &0.0));

            match BioTag::from_index(best_idx) {
                BioTag::Begin(kind) => {
                    flush(&mut current, &mut spans);
                    current = Some((kind, vec![i], *best_prob));
                }
                BioTag::Inside(kind)
                    if current.as_ref().is_some_and(|(k, _, _)| *k == kind) =>
                {
                    if let Some((_, indices, acc_prob)) = current.as_mut() {
                        indices.push(i);
                        *acc_prob += best_prob;
                    }
                }
                // stray I- tag with no open entity of that kind, or O
                _ => flush(&mut current, &mut spans),
            }
        }
        flush(&mut current, &mut spans);

        spans
    }
}

impl NameRecognizer for BertNameRecognizer {
    fn person_spans(&self, text: &str) -> Result<Vec<PersonSpan>> {
        if text.trim().is_empty() {
            return Ok(Vec::new());
        }

        let encoding = self
            .tokenizer
            .encode(text, true)
            .map_err(|e| anyhow::anyhow!("NER tokenization failed: {e}"))?;

        let tokens = encoding.get_ids();
        let attention_mask = encoding.get_attention_mask();
        let offsets = encoding.get_offsets();
        let max_length = self.config.max_length;

        let mut input_ids = vec![0i64; max_length];
        let mut attention = vec![0i64; max_length];
        for (i, &token) in tokens.iter().take(max_length).enumerate() {
            input_ids[i] = token as i64;
        }
        for (i, &mask) in attention_mask.iter().take(max_length).enumerate() {
            attention[i] = mask as i64;
        }
        // token_type_ids: all zeros for a single segment
        let token_type_ids = vec![0i64; max_length];

        let input_ids_value = Value::from_array((vec![1, max_length], input_ids))
            .context("Failed to create input_ids tensor")?;
        let attention_mask_value = Value::from_array((vec![1, max_length], attention.clone()))
            .context("Failed to create attention_mask tensor")?;
        let token_type_ids_value = Value::from_array((vec![1, max_length], token_type_ids))
            .context("Failed to create token_type_ids tensor")?;

        let mut session = self.session.lock();
        let outputs = session
            .run(ort::inputs![
                "input_ids" => &input_ids_value,
                "attention_mask" => &attention_mask_value,
                "token_type_ids" => &token_type_ids_value,
            ])
            .context("NER inference failed")?;

        // logits shape: [1, seq_len, NUM_LABELS]
        let (_shape, logits) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Failed to extract NER output tensor")?;

        let seq_len = tokens.len().min(max_length);
        let scored = self.decode_person_spans(text, logits, &attention, offsets, seq_len);

        let threshold = self.config.confidence_threshold;
        let spans: Vec<PersonSpan> = dedupe_spans(
            scored
                .into_iter()
                .filter(|(_, confidence)| *confidence >= threshold)
                .collect(),
        );

        Ok(spans)
    }
}

/// Map a run of token indices back to a byte span, trimmed of the
/// whitespace the tokenizer's offsets sometimes include.
fn build_span(text: &str, token_indices: &[usize], offsets: &[(usize, usize)]) -> Option<PersonSpan> {
    let first = *token_indices.first()?;
    let last = *token_indices.last()?;
    if first >= offsets.len() || last >= offsets.len() {
        return None;
    }

    let start = offsets[first].0;
    let end = offsets[last].1;
    if start >= end || end > text.len() {
        return None;
    }
    if !text.is_char_boundary(start) || !text.is_char_boundary(end) {
        return None;
    }

    let slice = &text[start..end];
    let start = start + (slice.len() - slice.trim_start().len());
    let end = end - (slice.len() - slice.trim_end().len());
    if start >= end {
        return None;
    }

    Some(PersonSpan { start, end })
}

/// Keep one span per region, preferring longer spans with higher
/// confidence when the model emits overlapping detections.
fn dedupe_spans(mut scored: Vec<(PersonSpan, f32)>) -> Vec<PersonSpan> {
    if scored.len() <= 1 {
        return scored.into_iter().map(|(s, _)| s).collect();
    }

    scored.sort_by(|a, b| {
        a.0.start
            .cmp(&b.0.start)
            .then_with(|| (b.0.end - b.0.start).cmp(&(a.0.end - a.0.start)))
            .then_with(|| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal))
    });

    let mut result: Vec<PersonSpan> = Vec::with_capacity(scored.len());
    for (span, _) in scored {
        let overlaps = result.iter().any(|s| span.start < s.end && span.end > s.start);
        if !overlaps {
            result.push(span);
        }
    }
    result
}

/// Softmax over one token's logits.
fn softmax(logits: &[f32]) -> Vec<f32> {
    let max_logit = logits.iter().cloned().fold(f32::NEG_INFINITY, f32::max);
    let exp_sum: f32 = logits.iter().map(|x| (x - max_logit).exp()).sum();
    logits
        .iter()
        .map(|x| (x - max_logit).exp() / exp_sum)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bio_tag_index_mapping() {
        assert_eq!(BioTag::from_index(0), BioTag::Outside);
        assert_eq!(BioTag::from_index(7), BioTag::Begin(EntityKind::Person));
        assert_eq!(BioTag::from_index(8), BioTag::Inside(EntityKind::Person));
        assert_eq!(BioTag::from_index(3), BioTag::Begin(EntityKind::Org));
        assert_eq!(BioTag::from_index(99), BioTag::Outside);
    }

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }

    #[test]
    fn test_build_span_trims_whitespace() {
        let text = "hi John Doe!";
        // tokens covering " John Doe" with a leading space in the offsets
        let offsets = vec![(0, 0), (2, 8), (8, 11)];
        let span = build_span(text, &[1, 2], &offsets).unwrap();
        assert_eq!(&text[span.start..span.end], "John Doe");
    }

    #[test]
    fn test_build_span_rejects_out_of_range() {
        assert!(build_span("ab", &[0], &[(5, 9)]).is_none());
        assert!(build_span("ab", &[3], &[(0, 1)]).is_none());
    }

    #[test]
    fn test_dedupe_prefers_longer_span() {
        let spans = dedupe_spans(vec![
            (PersonSpan { start: 0, end: 4 }, 0.9),
            (PersonSpan { start: 0, end: 8 }, 0.8),
            (PersonSpan { start: 10, end: 14 }, 0.9),
        ]);
        assert_eq!(
            spans,
            vec![
                PersonSpan { start: 0, end: 8 },
                PersonSpan { start: 10, end: 14 }
            ]
        );
    }

    #[test]
    fn test_default_config_threshold() {
        let config = NerConfig {
            model_path: PathBuf::from("x"),
            tokenizer_path: PathBuf::from("y"),
            max_length: 128,
            confidence_threshold: 0.7,
        };
        assert_eq!(config.max_length, 128);
        assert!(config.confidence_threshold > 0.5);
    }
}
