//! The read-only agent catalog.
//!
//! Listings are parsed once, strictly: prices and earnings become exact
//! decimals at ingestion, and a malformed value fails the whole catalog
//! instead of turning into zero.

use std::collections::HashSet;
use std::fmt;

use agentmart_pay::amount::{AmountError, Decimal, MoneyAmount};
use serde::{Deserialize, Deserializer, de};

/// The embedded mock dataset.
const BUILTIN_AGENTS: &str = include_str!("../data/agents.json");

/// Ticker of the native unit earnings are quoted in.
pub const EARNINGS_TICKER: &str = "SOL";

/// Errors raised while ingesting a catalog.
#[derive(Debug, thiserror::Error)]
pub enum CatalogError {
    /// The document is not a valid listing array.
    #[error("invalid catalog: {0}")]
    Json(#[from] serde_json::Error),
    /// Two listings share an id.
    #[error("duplicate listing id {0:?}")]
    DuplicateId(String),
}

/// Work areas a listing can be filed under.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, clap::ValueEnum)]
pub enum Domain {
    /// Finding and fixing defects.
    #[serde(rename = "Code Debugging")]
    CodeDebugging,
    /// Copywriting and editorial work.
    #[serde(rename = "Content Creation")]
    ContentCreation,
    /// Analytics and reporting.
    #[serde(rename = "Data Analysis")]
    DataAnalysis,
    /// Market strategies.
    #[serde(rename = "Trading Strategies")]
    TradingStrategies,
    /// Infrastructure and delivery.
    #[serde(rename = "DevOps")]
    #[value(name = "devops")]
    DevOps,
    /// Visual and product design.
    #[serde(rename = "Design")]
    Design,
    /// Smart contract and application audits.
    #[serde(rename = "Security Audit")]
    SecurityAudit,
    /// Support desks.
    #[serde(rename = "Customer Support")]
    CustomerSupport,
    /// Literature and market research.
    #[serde(rename = "Research")]
    Research,
    /// Campaigns and growth.
    #[serde(rename = "Marketing")]
    Marketing,
}

impl Domain {
    /// Every domain, in display order.
    pub const ALL: [Self; 10] = [
        Self::CodeDebugging,
        Self::ContentCreation,
        Self::DataAnalysis,
        Self::TradingStrategies,
        Self::DevOps,
        Self::Design,
        Self::SecurityAudit,
        Self::CustomerSupport,
        Self::Research,
        Self::Marketing,
    ];

    /// Human-readable label, as it appears in the catalog.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::CodeDebugging => "Code Debugging",
            Self::ContentCreation => "Content Creation",
            Self::DataAnalysis => "Data Analysis",
            Self::TradingStrategies => "Trading Strategies",
            Self::DevOps => "DevOps",
            Self::Design => "Design",
            Self::SecurityAudit => "Security Audit",
            Self::CustomerSupport => "Customer Support",
            Self::Research => "Research",
            Self::Marketing => "Marketing",
        }
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Availability of an agent.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// Taking work.
    Available,
    /// Working, may queue.
    Busy,
    /// Not reachable.
    Offline,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Available => "available",
            Self::Busy => "busy",
            Self::Offline => "offline",
        })
    }
}

/// Billing period of a subscription.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BillingPeriod {
    /// Per week.
    Week,
    /// Per month.
    Month,
    /// Per year.
    Year,
}

impl fmt::Display for BillingPeriod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Week => "week",
            Self::Month => "month",
            Self::Year => "year",
        })
    }
}

/// A task price band, in USD.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceRange {
    /// Lower bound.
    pub min: MoneyAmount,
    /// Upper bound, never below `min`.
    pub max: MoneyAmount,
}

/// A recurring USD price.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recurring {
    /// Price per period.
    pub amount: MoneyAmount,
    /// Billing period.
    pub period: BillingPeriod,
}

/// Strictly parsed pricing of a listing. Every amount is USD.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Pricing {
    /// Hourly rate.
    pub hourly: Option<MoneyAmount>,
    /// Per-task range.
    pub task_based: Option<PriceRange>,
    /// Subscription price.
    pub subscription: Option<Recurring>,
}

/// Error for a price string that does not match any accepted form.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PriceError {
    /// Not a `$`-prefixed amount.
    #[error("price {0:?} is not a dollar amount")]
    NotDollars(String),
    /// The number itself is malformed.
    #[error(transparent)]
    Amount(#[from] AmountError),
    /// A range whose lower bound exceeds its upper bound.
    #[error("price range {0:?} is inverted")]
    InvertedRange(String),
    /// An unknown billing period.
    #[error("unknown billing period in {0:?}")]
    Period(String),
}

fn parse_usd(raw: &str) -> Result<MoneyAmount, PriceError> {
    let trimmed = raw.trim();
    if !trimmed.starts_with('$') {
        return Err(PriceError::NotDollars(trimmed.to_owned()));
    }
    Ok(trimmed.parse()?)
}

impl std::str::FromStr for PriceRange {
    type Err = PriceError;

    /// Parses `"$25-$500"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (min, max) = s
            .split_once('-')
            .ok_or_else(|| PriceError::NotDollars(s.trim().to_owned()))?;
        let range = Self {
            min: parse_usd(min)?,
            max: parse_usd(max)?,
        };
        if range.min.value() > range.max.value() {
            return Err(PriceError::InvertedRange(s.trim().to_owned()));
        }
        Ok(range)
    }
}

impl std::str::FromStr for Recurring {
    type Err = PriceError;

    /// Parses `"$1,200/month"`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (amount, period) = s
            .split_once('/')
            .ok_or_else(|| PriceError::Period(s.trim().to_owned()))?;
        let period = match period.trim().to_ascii_lowercase().as_str() {
            "week" | "wk" => BillingPeriod::Week,
            "month" | "mo" => BillingPeriod::Month,
            "year" | "yr" => BillingPeriod::Year,
            _ => return Err(PriceError::Period(s.trim().to_owned())),
        };
        Ok(Self {
            amount: parse_usd(amount)?,
            period,
        })
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawPricing {
    #[serde(default)]
    hourly_rate: Option<String>,
    #[serde(default)]
    task_based: Option<String>,
    #[serde(default)]
    subscription: Option<String>,
}

impl TryFrom<RawPricing> for Pricing {
    type Error = PriceError;

    fn try_from(raw: RawPricing) -> Result<Self, Self::Error> {
        Ok(Self {
            hourly: raw.hourly_rate.as_deref().map(parse_usd).transpose()?,
            task_based: raw.task_based.as_deref().map(str::parse).transpose()?,
            subscription: raw.subscription.as_deref().map(str::parse).transpose()?,
        })
    }
}

impl<'de> Deserialize<'de> for Pricing {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawPricing::deserialize(deserializer)?;
        Self::try_from(raw).map_err(de::Error::custom)
    }
}

fn deserialize_earnings<'de, D>(deserializer: D) -> Result<MoneyAmount, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    MoneyAmount::parse_with_ticker(&raw, EARNINGS_TICKER).map_err(de::Error::custom)
}

fn deserialize_rating<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    let rating = f64::deserialize(deserializer)?;
    if (0.0..=5.0).contains(&rating) {
        Ok(rating)
    } else {
        Err(de::Error::custom(format!("rating {rating} is outside 0-5")))
    }
}

/// Performance figures of a listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    /// Completed tasks.
    pub tasks_completed: u64,
    /// Success rate, percent.
    pub success_rate: f64,
    /// Average response time, display only.
    pub avg_response_time: String,
    /// Lifetime earnings in SOL.
    #[serde(deserialize_with = "deserialize_earnings")]
    pub total_earnings: MoneyAmount,
    /// Average rating, 0 to 5.
    #[serde(deserialize_with = "deserialize_rating")]
    pub rating: f64,
    /// Number of reviews.
    pub reviews: u64,
}

impl Stats {
    /// Lifetime earnings as an exact decimal of SOL.
    #[must_use]
    pub const fn earnings(&self) -> Decimal {
        self.total_earnings.value()
    }
}

/// A skill claim.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Skill {
    /// Skill name.
    pub name: String,
    /// Proficiency, e.g. `Expert`.
    pub level: String,
    /// Grouping, e.g. `Programming`.
    pub category: String,
}

/// A credential issued to an agent.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// Credential id, unique per listing.
    pub id: String,
    /// Certificate or badge name.
    pub title: String,
    /// Issuing organization.
    pub issuer: String,
    /// Issue date as shown, e.g. `2024-03-15`.
    pub date: String,
    /// Whether the issuer confirmed it.
    pub verified: bool,
    /// Optional detail line.
    #[serde(default)]
    pub description: Option<String>,
    /// Link to the issuer's record.
    #[serde(default)]
    pub credential_url: Option<String>,
}

/// A milestone shown on the profile.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Achievement {
    /// Achievement id, unique per listing.
    pub id: String,
    /// Headline.
    pub title: String,
    /// What was achieved.
    pub description: String,
    /// Date reached.
    pub date: String,
    /// Emoji shown beside the title.
    pub icon: String,
    /// Headline figure, e.g. `10,000 bugs`.
    pub metric: String,
}

/// A listing's standing in one domain's global leaderboard.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardPosition {
    /// Domain ranked in.
    pub domain: Domain,
    /// 1-based rank.
    pub rank: u32,
    /// Agents ranked in that domain.
    pub total_agents: u32,
}

/// One agent listing.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Listing {
    /// Unique id.
    pub id: String,
    /// Display name.
    pub name: String,
    /// One-line pitch.
    pub tagline: String,
    /// Avatar image URL.
    pub avatar: String,
    /// Profile banner URL.
    #[serde(default)]
    pub cover_image: Option<String>,
    /// Long-form description.
    pub description: String,
    /// Domains the agent works in.
    #[serde(rename = "domain")]
    pub domains: Vec<Domain>,
    /// Current availability.
    pub status: Status,
    /// Destination for funding. Validated only when a payment targets it.
    pub wallet_address: String,
    /// Parsed pricing.
    pub pricing: Pricing,
    /// Claimed skills.
    #[serde(default)]
    pub skills: Vec<Skill>,
    /// Issued credentials.
    #[serde(default)]
    pub credentials: Vec<Credential>,
    /// Profile milestones.
    #[serde(default)]
    pub achievements: Vec<Achievement>,
    /// Performance figures.
    pub stats: Stats,
    /// Narrow specialties, searchable.
    #[serde(default)]
    pub specialties: Vec<String>,
    /// Listing creation date.
    pub created_at: String,
    /// Relative last-seen text.
    pub last_active: String,
    /// Whether the marketplace verified the agent.
    #[serde(default)]
    pub verified: bool,
    /// Global leaderboard standings.
    #[serde(rename = "leaderboardRank", default)]
    pub leaderboard_positions: Vec<LeaderboardPosition>,
}

impl Listing {
    /// Returns `true` if the listing is filed under `domain`.
    #[must_use]
    pub fn in_domain(&self, domain: Domain) -> bool {
        self.domains.contains(&domain)
    }
}

/// The in-memory catalog, in its original (featured) order.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    listings: Vec<Listing>,
}

impl Catalog {
    /// Parses a JSON array of listings.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::Json`] for malformed documents, including
    /// unparseable prices or earnings, and [`CatalogError::DuplicateId`] if an
    /// id repeats.
    pub fn from_json(json: &str) -> Result<Self, CatalogError> {
        let listings: Vec<Listing> = serde_json::from_str(json)?;
        Self::from_listings(listings)
    }

    /// Builds a catalog from already parsed listings.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError::DuplicateId`] if an id repeats.
    pub fn from_listings(listings: Vec<Listing>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::with_capacity(listings.len());
        for listing in &listings {
            if !seen.insert(listing.id.as_str()) {
                return Err(CatalogError::DuplicateId(listing.id.clone()));
            }
        }
        Ok(Self { listings })
    }

    /// The embedded catalog shipped with the binary.
    ///
    /// # Errors
    ///
    /// Returns [`CatalogError`] if the embedded data is invalid.
    pub fn builtin() -> Result<Self, CatalogError> {
        Self::from_json(BUILTIN_AGENTS)
    }

    /// All listings in catalog order.
    #[must_use]
    pub fn listings(&self) -> &[Listing] {
        &self.listings
    }

    /// Looks up a listing by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<&Listing> {
        self.listings.iter().find(|listing| listing.id == id)
    }

    /// Listings filed under `domain`, in catalog order.
    pub fn by_domain(&self, domain: Domain) -> impl Iterator<Item = &Listing> {
        self.listings.iter().filter(move |listing| listing.in_domain(domain))
    }

    /// Number of listings.
    #[must_use]
    pub fn len(&self) -> usize {
        self.listings.len()
    }

    /// Returns `true` if the catalog has no listings.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.listings.is_empty()
    }
}
