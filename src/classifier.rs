//! Ticket-category classification of masked emails.
//!
//! The serving path feeds the classifier masked text only; raw emails
//! never reach the model. The ONNX implementation wraps a fine-tuned
//! DistilBERT sequence-classification export (4 labels). The model is
//! produced by the offline training pipeline, which is a separate
//! concern; this module only runs inference.
//!
//! Configuration via environment variables:
//! - MAILGUARD_CLASSIFIER_PATH: base path to model files (default: ./models/classifier)
//! - MAILGUARD_ONNX_THREADS: ONNX intra-op threads (default: 2)

use anyhow::{Context, Result};
use ort::session::Session;
use ort::value::Value;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::sync::{Arc, OnceLock};
use tokenizers::Tokenizer;

/// Fixed label vocabulary of the support-ticket corpus.
///
/// The integer codes are the ones the training pipeline uses for the
/// model head, so `from_index` must stay aligned with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TicketCategory {
    Incident,
    Request,
    Problem,
    Change,
}

impl TicketCategory {
    pub const ALL: [TicketCategory; 4] = [
        TicketCategory::Incident,
        TicketCategory::Request,
        TicketCategory::Problem,
        TicketCategory::Change,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TicketCategory::Incident => "Incident",
            TicketCategory::Request => "Request",
            TicketCategory::Problem => "Problem",
            TicketCategory::Change => "Change",
        }
    }

    pub fn from_index(idx: usize) -> Option<Self> {
        Self::ALL.get(idx).copied()
    }
}

/// Capability the serving layer needs: turn masked text into a category.
pub trait Classifier: Send + Sync {
    fn classify(&self, masked_text: &str) -> Result<TicketCategory>;
}

/// Configuration for the classifier model files.
#[derive(Debug, Clone)]
pub struct ClassifierConfig {
    /// Path to the ONNX model file
    pub model_path: PathBuf,
    /// Path to the tokenizer file
    pub tokenizer_path: PathBuf,
    /// Maximum sequence length (DistilBERT: 512)
    pub max_length: usize,
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self::from_env()
    }
}

impl ClassifierConfig {
    /// Create configuration from environment variables.
    ///
    /// Search order for model files:
    /// 1. MAILGUARD_CLASSIFIER_PATH environment variable
    /// 2. ./models/classifier (local)
    /// 3. ../models/classifier (parent)
    /// 4. system data dir, e.g. ~/.local/share/mailguard/models/classifier
    pub fn from_env() -> Self {
        let base_path = std::env::var("MAILGUARD_CLASSIFIER_PATH")
            .map(PathBuf::from)
            .unwrap_or_else(|_| {
                let candidates: Vec<Option<PathBuf>> = vec![
                    Some(PathBuf::from("./models/classifier")),
                    Some(PathBuf::from("../models/classifier")),
                    dirs::data_dir().map(|p| p.join("mailguard/models/classifier")),
                ];

                candidates
                    .into_iter()
                    .flatten()
                    .find(|p| p.join("model.onnx").exists())
                    .unwrap_or_else(|| PathBuf::from("./models/classifier"))
            });

        Self {
            model_path: base_path.join("model.onnx"),
            tokenizer_path: base_path.join("tokenizer.json"),
            max_length: 512,
        }
    }
}

/// Lazily initialized ONNX session and tokenizer.
struct LazyModel {
    session: Mutex<Session>,
    tokenizer: Tokenizer,
}

impl LazyModel {
    fn new(config: &ClassifierConfig) -> Result<Self> {
        let num_threads = std::env::var("MAILGUARD_ONNX_THREADS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(2);

        tracing::info!(
            "Loading classifier model from {:?} with {} threads",
            config.model_path,
            num_threads
        );

        let session = Session::builder()
            .context("Failed to create classifier session builder")?
            .with_intra_threads(num_threads)
            .context("Failed to set classifier thread count")?
            .commit_from_file(&config.model_path)
            .context("Failed to load classifier ONNX model")?;

        let tokenizer = Tokenizer::from_file(&config.tokenizer_path)
            .map_err(|e| anyhow::anyhow!("Failed to load classifier tokenizer: {e}"))?;

        tracing::info!("Classifier model loaded");

        Ok(Self {
            session: Mutex::new(session),
            tokenizer,
        })
    }
}

/// DistilBERT sequence classifier with lazy model loading: the server can
/// start before the (comparatively large) model is touched, and the first
/// classify call pays the load cost once.
pub struct OnnxTicketClassifier {
    config: ClassifierConfig,
    lazy_model: OnceLock<std::result::Result<Arc<LazyModel>, String>>,
}

impl OnnxTicketClassifier {
    pub fn new(config: ClassifierConfig) -> Self {
        Self {
            config,
            lazy_model: OnceLock::new(),
        }
    }

    fn ensure_model_loaded(&self) -> Result<&Arc<LazyModel>> {
        let result = self.lazy_model.get_or_init(|| {
            LazyModel::new(&self.config)
                .map(Arc::new)
                .map_err(|e| e.to_string())
        });

        match result {
            Ok(model) => Ok(model),
            Err(e) => Err(anyhow::anyhow!("Failed to load classifier model: {e}")),
        }
    }

    /// Whether the model files exist on disk (used by readiness probes;
    /// does not force a load).
    pub fn model_files_present(&self) -> bool {
        self.config.model_path.exists() && self.config.tokenizer_path.exists()
    }
}

impl Classifier for OnnxTicketClassifier {
    fn classify(&self, masked_text: &str) -> Result<TicketCategory> {
        let model = self.ensure_model_loaded()?;

        let encoding = model
            .tokenizer
            .encode(masked_text, true)
            .map_err(|e| anyhow::anyhow!("Classifier tokenization failed: {e}"))?;

        let tokens = encoding.get_ids();
        let attention_mask = encoding.get_attention_mask();
        let max_length = self.config.max_length;

        let seq_len = tokens.len().min(max_length);
        let mut input_ids = vec![0i64; seq_len];
        let mut attention = vec![0i64; seq_len];
        for i in 0..seq_len {
            input_ids[i] = tokens[i] as i64;
            attention[i] = attention_mask[i] as i64;
        }

        // DistilBERT takes no token_type_ids
        let input_ids_value = Value::from_array((vec![1, seq_len], input_ids))
            .context("Failed to create input_ids tensor")?;
        let attention_mask_value = Value::from_array((vec![1, seq_len], attention))
            .context("Failed to create attention_mask tensor")?;

        let mut session = model.session.lock();
        let outputs = session
            .run(ort::inputs![
                "input_ids" => &input_ids_value,
                "attention_mask" => &attention_mask_value,
            ])
            .context("Classifier inference failed")?;

        // logits shape: [1, 4]; argmax of logits equals argmax of softmax
        let (_shape, logits) = outputs[0]
            .try_extract_tensor::<f32>()
            .context("Failed to extract classifier output tensor")?;

        let best = logits
            .iter()
            .take(TicketCategory::ALL.len())
            .enumerate()
            .max_by(|a, b| a.1.partial_cmp(b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(idx, _)| idx)
            .unwrap_or(0);

        TicketCategory::from_index(best)
            .ok_or_else(|| anyhow::anyhow!("classifier produced out-of-range label {best}"))
    }
}
