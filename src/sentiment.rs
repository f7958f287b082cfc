//! Boundary to the downstream sentiment component.
//!
//! The pipeline does not score text itself; it exposes the review texts and
//! aggregates whatever a [`SentimentScorer`] returns for them.

use serde::{Deserialize, Serialize};
use std::fmt;

#[cfg(test)]
use mockall::automock;

use crate::models::{FieldValue, ProductRecord};
use crate::utils::text::clean_review_text;

/// Labels are decided on the compound score with a ±0.05 neutral band.
pub const POSITIVE_THRESHOLD: f64 = 0.05;
pub const NEGATIVE_THRESHOLD: f64 = -0.05;

#[cfg_attr(test, automock)]
pub trait SentimentScorer: Send + Sync {
    /// Compound polarity in `[-1, 1]` for already-cleaned text.
    fn score(&self, text: &str) -> f64;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SentimentLabel {
    Positive,
    Negative,
    Neutral,
}

impl SentimentLabel {
    pub fn from_score(score: f64) -> Self {
        if score >= POSITIVE_THRESHOLD {
            SentimentLabel::Positive
        } else if score <= NEGATIVE_THRESHOLD {
            SentimentLabel::Negative
        } else {
            SentimentLabel::Neutral
        }
    }
}

impl fmt::Display for SentimentLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SentimentLabel::Positive => "Positive",
            SentimentLabel::Negative => "Negative",
            SentimentLabel::Neutral => "Neutral",
        };
        f.write_str(label)
    }
}

/// Per-product sentiment aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSentiment {
    pub title: FieldValue,
    pub reviews: usize,
    pub average_score: f64,
    pub positive: usize,
    pub negative: usize,
    pub neutral: usize,
}

/// Score one raw review body. Missing or blank text scores 0.0 without
/// consulting the scorer; scores are clamped into `[-1, 1]`.
pub fn score_text(scorer: &dyn SentimentScorer, content: &FieldValue) -> f64 {
    let Some(raw) = content.value() else {
        return 0.0;
    };
    let cleaned = clean_review_text(raw);
    if cleaned.is_empty() {
        return 0.0;
    }
    let score = scorer.score(&cleaned);
    if score.is_nan() { 0.0 } else { score.clamp(-1.0, 1.0) }
}

/// Cleaned `content` of every review that has any, in record order.
pub fn review_texts(records: &[ProductRecord]) -> Vec<String> {
    records
        .iter()
        .flat_map(|record| record.reviews.iter())
        .filter_map(|review| review.content.value())
        .map(clean_review_text)
        .filter(|text| !text.is_empty())
        .collect()
}

pub fn summarize(records: &[ProductRecord], scorer: &dyn SentimentScorer) -> Vec<ProductSentiment> {
    records
        .iter()
        .map(|record| {
            let scores: Vec<f64> = record
                .reviews
                .iter()
                .map(|review| score_text(scorer, &review.content))
                .collect();

            let count = |label: SentimentLabel| {
                scores
                    .iter()
                    .filter(|score| SentimentLabel::from_score(**score) == label)
                    .count()
            };
            let average_score = if scores.is_empty() {
                0.0
            } else {
                scores.iter().sum::<f64>() / scores.len() as f64
            };

            ProductSentiment {
                title: record.title.clone(),
                reviews: scores.len(),
                average_score,
                positive: count(SentimentLabel::Positive),
                negative: count(SentimentLabel::Negative),
                neutral: count(SentimentLabel::Neutral),
            }
        })
        .collect()
}
