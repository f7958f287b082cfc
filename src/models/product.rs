use serde::{Deserialize, Serialize};

use crate::models::{FieldValue, ListingItem};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRecord {
    pub rating: FieldValue,
    pub title: FieldValue,
    pub content: FieldValue,
    pub posted_by: FieldValue,
}

/// Finalized product as written to the output artifact.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ProductRecord {
    pub title: FieldValue,
    pub price: FieldValue,
    pub link: FieldValue,
    pub rating: FieldValue,
    pub review_count: FieldValue,
    pub reviews: Vec<ReviewRecord>,
}

/// A product still being assembled by the drill-down stages.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductDraft {
    pub position: usize,
    title: FieldValue,
    price: FieldValue,
    link: FieldValue,
    rating: FieldValue,
    review_count: FieldValue,
    reviews: Vec<ReviewRecord>,
}

impl ProductDraft {
    pub fn from_listing(item: &ListingItem) -> Self {
        Self {
            position: item.position,
            title: item.title.clone(),
            price: item.price.clone(),
            link: item.link.clone(),
            rating: FieldValue::Missing,
            review_count: FieldValue::Missing,
            reviews: Vec::new(),
        }
    }

    pub fn title(&self) -> &FieldValue {
        &self.title
    }

    pub fn link(&self) -> &FieldValue {
        &self.link
    }

    pub fn set_detail_fields(&mut self, rating: FieldValue, review_count: FieldValue) {
        self.rating = rating;
        self.review_count = review_count;
    }

    pub fn set_reviews(&mut self, reviews: Vec<ReviewRecord>) {
        self.reviews = reviews;
    }

    pub fn finalize(self) -> ProductRecord {
        ProductRecord {
            title: self.title,
            price: self.price,
            link: self.link,
            rating: self.rating,
            review_count: self.review_count,
            reviews: self.reviews,
        }
    }
}
