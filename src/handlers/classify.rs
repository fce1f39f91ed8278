//! Classification endpoint.
//!
//! Masks the raw email, classifies the masked copy, and returns both plus
//! the entity records. The response field names and the shape of each
//! entity (`position` as `[start, end]`, `classification`, `entity`) are a
//! frozen wire contract consumed by existing clients; do not rename them.

use axum::{extract::State, response::Json};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use super::state::AppState;
use crate::classifier::TicketCategory;
use crate::errors::{AppError, Result};
use crate::masking::PiiEntity;
use crate::metrics;
use crate::validation;

/// Classification request
#[derive(Debug, Deserialize)]
pub struct ClassifyRequest {
    pub email_body: String,
}

/// Classification response (frozen wire contract)
#[derive(Debug, Serialize)]
pub struct ClassifyResponse {
    pub input_email_body: String,
    pub list_of_masked_entities: Vec<PiiEntity>,
    pub masked_email: String,
    pub category_of_the_email: TicketCategory,
}

/// POST /classify
pub async fn classify(
    State(state): State<AppState>,
    Json(req): Json<ClassifyRequest>,
) -> Result<Json<ClassifyResponse>> {
    validation::validate_email_body(&req.email_body, state.config.max_email_bytes)?;

    let mask_start = Instant::now();
    let outcome = state.engine.mask(&req.email_body)?;
    metrics::MASK_DURATION.observe(mask_start.elapsed().as_secs_f64());

    for entity in &outcome.entities {
        metrics::PII_ENTITIES_TOTAL
            .with_label_values(&[entity.classification.as_str()])
            .inc();
    }

    let classify_start = Instant::now();
    let category = state.classifier.classify(&outcome.masked).map_err(|e| {
        metrics::CLASSIFY_TOTAL
            .with_label_values(&["none", "error"])
            .inc();
        AppError::ClassifierError(e.to_string())
    })?;
    metrics::CLASSIFY_DURATION.observe(classify_start.elapsed().as_secs_f64());
    metrics::CLASSIFY_TOTAL
        .with_label_values(&[category.as_str(), "success"])
        .inc();

    tracing::info!(
        category = category.as_str(),
        entities = outcome.entities.len(),
        "email classified"
    );

    Ok(Json(ClassifyResponse {
        input_email_body: req.email_body,
        list_of_masked_entities: outcome.entities,
        masked_email: outcome.masked,
        category_of_the_email: category,
    }))
}
