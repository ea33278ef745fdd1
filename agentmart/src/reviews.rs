//! Client reviews shown on agent profiles.
//!
//! Reviews are read-only, like the catalog. Per agent they can be listed in
//! four orders and summarized as an average plus a 5-to-1 star distribution.

use serde::Deserialize;

/// The embedded mock reviews.
const BUILTIN_REVIEWS: &str = include_str!("../data/reviews.json");

/// Errors raised while ingesting reviews.
#[derive(Debug, thiserror::Error)]
pub enum ReviewError {
    /// The document is not a valid review array.
    #[error("invalid reviews: {0}")]
    Json(#[from] serde_json::Error),
    /// A star rating outside 1 to 5.
    #[error("review {id} has rating {rating}, expected 1 to 5")]
    Rating {
        /// Offending review.
        id: String,
        /// Rating found.
        rating: u8,
    },
    /// A date not in `YYYY-MM-DD` form.
    #[error("review {id} has malformed date {date:?}")]
    Date {
        /// Offending review.
        id: String,
        /// Date found.
        date: String,
    },
}

/// Review order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum ReviewSort {
    /// Newest first.
    #[default]
    Recent,
    /// Highest rating first.
    Highest,
    /// Lowest rating first.
    Lowest,
    /// Most helpful votes first.
    Helpful,
}

/// One client review.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Review {
    /// Review id.
    pub id: String,
    /// Reviewer id.
    pub user_id: String,
    /// Reviewer display name.
    pub user_name: String,
    /// Reviewer avatar URL.
    pub user_avatar: String,
    /// Agent reviewed.
    pub agent_id: String,
    /// Task the review is about.
    pub task_id: String,
    /// Overall stars, 1 to 5.
    pub rating: u8,
    /// Headline.
    pub title: String,
    /// Body text.
    pub review_text: String,
    /// Strengths called out.
    #[serde(default)]
    pub pros: Vec<String>,
    /// Weaknesses called out.
    #[serde(default)]
    pub cons: Vec<String>,
    /// Whether the reviewer would hire the agent again.
    pub would_hire_again: bool,
    /// Responsiveness stars.
    pub response_time_rating: u8,
    /// Work quality stars.
    pub quality_rating: u8,
    /// Communication stars.
    pub communication_rating: u8,
    /// Value for money stars.
    pub value_rating: u8,
    /// Helpful votes from other readers.
    pub helpful_count: u32,
    /// Date written, `YYYY-MM-DD`.
    pub created_at: String,
    /// Whether the review comes from a paid hire.
    pub verified_hire: bool,
}

/// Number of reviews giving one star value.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StarCount {
    /// Star value, 5 down to 1.
    pub star: u8,
    /// Reviews with exactly that rating.
    pub count: u32,
    /// Share of the agent's reviews, 0 to 100.
    pub percentage: f64,
}

/// An agent's reviews in the requested order with their summary.
#[derive(Debug, Clone, PartialEq)]
pub struct ReviewSummary<'a> {
    /// Reviews, sorted.
    pub reviews: Vec<&'a Review>,
    /// Mean rating, `None` without reviews.
    pub average: Option<f64>,
    /// Counts for 5, 4, 3, 2 and 1 stars, in that order.
    pub distribution: [StarCount; 5],
}

/// All reviews, in ingestion order.
#[derive(Debug, Clone, Default)]
pub struct ReviewBook {
    reviews: Vec<Review>,
}

impl ReviewBook {
    /// Parses a JSON array of reviews.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError`] for malformed documents, ratings outside 1 to 5
    /// and dates not in `YYYY-MM-DD` form.
    pub fn from_json(json: &str) -> Result<Self, ReviewError> {
        let reviews: Vec<Review> = serde_json::from_str(json)?;
        for review in &reviews {
            if !(1..=5).contains(&review.rating) {
                return Err(ReviewError::Rating {
                    id: review.id.clone(),
                    rating: review.rating,
                });
            }
            if !is_iso_date(&review.created_at) {
                return Err(ReviewError::Date {
                    id: review.id.clone(),
                    date: review.created_at.clone(),
                });
            }
        }
        Ok(Self { reviews })
    }

    /// The embedded reviews shipped with the binary.
    ///
    /// # Errors
    ///
    /// Returns [`ReviewError`] if the embedded data is invalid.
    pub fn builtin() -> Result<Self, ReviewError> {
        Self::from_json(BUILTIN_REVIEWS)
    }

    /// Reviews of `agent_id` sorted by `sort`, with average and distribution.
    ///
    /// Sorting is stable, so ties keep ingestion order.
    #[must_use]
    pub fn for_agent(&self, agent_id: &str, sort: ReviewSort) -> ReviewSummary<'_> {
        let mut reviews: Vec<&Review> = self
            .reviews
            .iter()
            .filter(|review| review.agent_id == agent_id)
            .collect();
        match sort {
            // ISO dates order lexically.
            ReviewSort::Recent => reviews.sort_by(|a, b| b.created_at.cmp(&a.created_at)),
            ReviewSort::Highest => reviews.sort_by(|a, b| b.rating.cmp(&a.rating)),
            ReviewSort::Lowest => reviews.sort_by_key(|review| review.rating),
            ReviewSort::Helpful => reviews.sort_by(|a, b| b.helpful_count.cmp(&a.helpful_count)),
        }

        let (sum, total) = reviews.iter().fold((0u32, 0u32), |(sum, total), r| {
            (sum + u32::from(r.rating), total + 1)
        });
        let average = (total > 0).then(|| f64::from(sum) / f64::from(total));
        let distribution = [5, 4, 3, 2, 1].map(|star| {
            let count = reviews.iter().fold(0u32, |n, r| n + u32::from(r.rating == star));
            let percentage = if total == 0 {
                0.0
            } else {
                f64::from(count) / f64::from(total) * 100.0
            };
            StarCount {
                star,
                count,
                percentage,
            }
        });

        ReviewSummary {
            reviews,
            average,
            distribution,
        }
    }
}

fn is_iso_date(date: &str) -> bool {
    let bytes = date.as_bytes();
    bytes.len() == 10
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}
