//! Browse queries over the catalog: filtered listings, the leaderboard,
//! per-domain stats and platform analytics.

use std::cmp::Ordering;

use agentmart_pay::amount::{Decimal, MoneyAmount};

use crate::catalog::{Catalog, Domain, LeaderboardPosition, Listing, Status};

/// Size of each top-performer list in [`PlatformAnalytics`].
pub const TOP_PERFORMERS: usize = 5;

/// Listing order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum SortOrder {
    /// Catalog order.
    #[default]
    Featured,
    /// Highest rating first.
    Rating,
    /// Most completed tasks first.
    Tasks,
    /// Cheapest hourly rate first.
    PriceLow,
    /// Most expensive hourly rate first.
    PriceHigh,
}

/// Filter and sort parameters of the agents listing.
#[derive(Debug, Clone, Default)]
pub struct AgentQuery {
    /// Case-insensitive text search.
    pub search: Option<String>,
    /// Only listings in this domain.
    pub domain: Option<Domain>,
    /// Only listings with this status.
    pub status: Option<Status>,
    /// Minimum rating, inclusive.
    pub min_rating: Option<f64>,
    /// Result order.
    pub sort: SortOrder,
}

impl AgentQuery {
    /// Runs the query.
    #[must_use]
    pub fn run<'a>(&self, catalog: &'a Catalog) -> Vec<&'a Listing> {
        let needle = self
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);
        let mut hits: Vec<&Listing> = catalog
            .listings()
            .iter()
            .filter(|l| needle.as_deref().is_none_or(|n| matches_search(l, n)))
            .filter(|l| self.domain.is_none_or(|d| l.in_domain(d)))
            .filter(|l| self.status.is_none_or(|s| l.status == s))
            .filter(|l| self.min_rating.is_none_or(|r| l.stats.rating >= r))
            .collect();
        match self.sort {
            SortOrder::Featured => {}
            SortOrder::Rating => hits.sort_by(|a, b| by_rating_desc(a, b)),
            SortOrder::Tasks => {
                hits.sort_by(|a, b| b.stats.tasks_completed.cmp(&a.stats.tasks_completed));
            }
            SortOrder::PriceLow => hits.sort_by(|a, b| by_hourly(a, b, false)),
            SortOrder::PriceHigh => hits.sort_by(|a, b| by_hourly(a, b, true)),
        }
        hits
    }
}

fn matches_search(listing: &Listing, needle: &str) -> bool {
    let contains = |haystack: &str| haystack.to_lowercase().contains(needle);
    contains(&listing.name)
        || contains(&listing.tagline)
        || contains(&listing.description)
        || listing.domains.iter().any(|d| contains(d.label()))
        || listing.skills.iter().any(|s| contains(&s.name))
        || listing.specialties.iter().any(|s| contains(s))
}

fn by_rating_desc(a: &Listing, b: &Listing) -> Ordering {
    b.stats.rating.total_cmp(&a.stats.rating)
}

/// Orders by hourly rate; listings without one always sort last.
fn by_hourly(a: &Listing, b: &Listing, descending: bool) -> Ordering {
    match (a.pricing.hourly, b.pricing.hourly) {
        (Some(x), Some(y)) if descending => y.cmp(&x),
        (Some(x), Some(y)) => x.cmp(&y),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}

/// One row of the leaderboard.
#[derive(Debug, Clone, Copy)]
pub struct LeaderboardEntry<'a> {
    /// 1-based rank.
    pub rank: usize,
    /// The ranked listing.
    pub listing: &'a Listing,
}

/// Ranks listings by rating, then completed tasks, optionally within one
/// domain.
#[must_use]
pub fn leaderboard(catalog: &Catalog, domain: Option<Domain>) -> Vec<LeaderboardEntry<'_>> {
    let mut ranked: Vec<&Listing> = catalog
        .listings()
        .iter()
        .filter(|l| domain.is_none_or(|d| l.in_domain(d)))
        .collect();
    ranked.sort_by(|a, b| {
        by_rating_desc(a, b).then_with(|| b.stats.tasks_completed.cmp(&a.stats.tasks_completed))
    });
    ranked
        .into_iter()
        .enumerate()
        .map(|(i, listing)| LeaderboardEntry {
            rank: i + 1,
            listing,
        })
        .collect()
}

/// Aggregates of one domain.
#[derive(Debug, Clone, PartialEq)]
pub struct DomainStats {
    /// The domain.
    pub domain: Domain,
    /// Listings filed under it.
    pub agents: usize,
    /// Sum of completed tasks.
    pub total_tasks: u64,
    /// Mean rating.
    pub average_rating: f64,
    /// Sum of earnings, in SOL.
    pub total_earnings: Decimal,
}

/// Per-domain aggregates, busiest domain first. Domains without listings are
/// omitted.
#[must_use]
pub fn domain_stats(catalog: &Catalog) -> Vec<DomainStats> {
    let mut stats: Vec<DomainStats> = Domain::ALL
        .into_iter()
        .filter_map(|domain| {
            let listings: Vec<&Listing> = catalog.by_domain(domain).collect();
            if listings.is_empty() {
                return None;
            }
            Some(DomainStats {
                domain,
                agents: listings.len(),
                total_tasks: listings.iter().map(|l| l.stats.tasks_completed).sum(),
                average_rating: mean(listings.iter().map(|l| l.stats.rating)),
                total_earnings: listings.iter().map(|l| l.stats.earnings()).sum(),
            })
        })
        .collect();
    stats.sort_by(|a, b| b.total_tasks.cmp(&a.total_tasks));
    stats
}

/// Platform-wide totals and top performers.
#[derive(Debug, Clone)]
pub struct PlatformAnalytics<'a> {
    /// Number of listings.
    pub total_agents: usize,
    /// Listings currently available.
    pub available_agents: usize,
    /// Sum of completed tasks.
    pub total_tasks: u64,
    /// Sum of earnings, in SOL.
    pub total_earnings: MoneyAmount,
    /// Mean rating.
    pub average_rating: f64,
    /// Mean success rate, percent.
    pub average_success_rate: f64,
    /// Best rated.
    pub top_by_rating: Vec<&'a Listing>,
    /// Most completed tasks.
    pub top_by_tasks: Vec<&'a Listing>,
    /// Highest earnings.
    pub top_by_earnings: Vec<&'a Listing>,
}

/// Computes platform analytics.
#[must_use]
pub fn analytics(catalog: &Catalog) -> PlatformAnalytics<'_> {
    let listings = catalog.listings();
    let top = |cmp: fn(&&Listing, &&Listing) -> Ordering| {
        let mut sorted: Vec<&Listing> = listings.iter().collect();
        sorted.sort_by(cmp);
        sorted.truncate(TOP_PERFORMERS);
        sorted
    };
    PlatformAnalytics {
        total_agents: listings.len(),
        available_agents: listings
            .iter()
            .filter(|l| l.status == Status::Available)
            .count(),
        total_tasks: listings.iter().map(|l| l.stats.tasks_completed).sum(),
        total_earnings: MoneyAmount::new(listings.iter().map(|l| l.stats.earnings()).sum()),
        average_rating: mean(listings.iter().map(|l| l.stats.rating)),
        average_success_rate: mean(listings.iter().map(|l| l.stats.success_rate)),
        top_by_rating: top(|a: &&Listing, b: &&Listing| by_rating_desc(a, b)),
        top_by_tasks: top(|a: &&Listing, b: &&Listing| {
            b.stats.tasks_completed.cmp(&a.stats.tasks_completed)
        }),
        top_by_earnings: top(|a: &&Listing, b: &&Listing| {
            b.stats.earnings().cmp(&a.stats.earnings())
        }),
    }
}

fn mean(values: impl Iterator<Item = f64>) -> f64 {
    let (sum, count) = values.fold((0.0, 0u32), |(sum, count), v| (sum + v, count + 1));
    if count == 0 { 0.0 } else { sum / f64::from(count) }
}

/// Where a listing stands within a domain's global leaderboard.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Percentile {
    /// Share of agents at or below this rank, percent.
    pub value: f64,
    /// Rank 1 to 3.
    pub top_three: bool,
    /// Rank 1 to 10.
    pub top_ten: bool,
}

/// Computes `(total - rank + 1) / total * 100` for a leaderboard position.
///
/// An empty board yields zero.
#[must_use]
pub fn percentile(position: &LeaderboardPosition) -> Percentile {
    let total = f64::from(position.total_agents);
    let value = if position.total_agents == 0 {
        0.0
    } else {
        let above = f64::from(position.total_agents.saturating_sub(position.rank)) + 1.0;
        above.min(total) / total * 100.0
    };
    Percentile {
        value,
        top_three: position.rank <= 3,
        top_ten: position.rank <= 10,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::tests::listing_json;

    fn catalog_of(listings: Vec<serde_json::Value>) -> Catalog {
        Catalog::from_json(&serde_json::Value::Array(listings).to_string()).unwrap()
    }

    fn ids<'a>(listings: impl IntoIterator<Item = &'a Listing>) -> Vec<&'a str> {
        listings.into_iter().map(|l| l.id.as_str()).collect()
    }

    #[test]
    fn test_featured_keeps_catalog_order() {
        let catalog = Catalog::builtin().unwrap();
        let all = AgentQuery::default().run(&catalog);
        assert_eq!(ids(all), ids(catalog.listings()));
    }

    #[test]
    fn test_search_is_case_insensitive_across_fields() {
        let catalog = Catalog::builtin().unwrap();
        let by_name = AgentQuery {
            search: Some("codemaster".to_owned()),
            ..AgentQuery::default()
        };
        assert_eq!(ids(by_name.run(&catalog)), vec!["agent-001"]);

        let by_specialty = AgentQuery {
            search: Some("MEMORY LEAK".to_owned()),
            ..AgentQuery::default()
        };
        assert!(ids(by_specialty.run(&catalog)).contains(&"agent-001"));

        let nothing = AgentQuery {
            search: Some("zzz-no-such-agent".to_owned()),
            ..AgentQuery::default()
        };
        assert!(nothing.run(&catalog).is_empty());
    }

    #[test]
    fn test_filters_combine() {
        let catalog = Catalog::builtin().unwrap();
        let query = AgentQuery {
            status: Some(Status::Busy),
            min_rating: Some(4.9),
            ..AgentQuery::default()
        };
        let hits = query.run(&catalog);
        assert!(!hits.is_empty());
        assert!(hits.iter().all(|l| l.status == Status::Busy && l.stats.rating >= 4.9));
    }

    #[test]
    fn test_price_sorts_put_missing_rates_last() {
        let catalog = catalog_of(vec![
            listing_json("none", None, 4.0, 1),
            listing_json("high", Some("$90"), 4.0, 1),
            listing_json("low", Some("$10"), 4.0, 1),
        ]);
        let low = AgentQuery {
            sort: SortOrder::PriceLow,
            ..AgentQuery::default()
        };
        assert_eq!(ids(low.run(&catalog)), vec!["low", "high", "none"]);
        let high = AgentQuery {
            sort: SortOrder::PriceHigh,
            ..AgentQuery::default()
        };
        assert_eq!(ids(high.run(&catalog)), vec!["high", "low", "none"]);
    }

    #[test]
    fn test_rating_sort_is_stable() {
        let catalog = catalog_of(vec![
            listing_json("a", None, 4.5, 1),
            listing_json("b", None, 4.9, 1),
            listing_json("c", None, 4.5, 1),
        ]);
        let query = AgentQuery {
            sort: SortOrder::Rating,
            ..AgentQuery::default()
        };
        assert_eq!(ids(query.run(&catalog)), vec!["b", "a", "c"]);
    }

    #[test]
    fn test_leaderboard_breaks_rating_ties_on_tasks() {
        let catalog = catalog_of(vec![
            listing_json("few", None, 4.8, 10),
            listing_json("many", None, 4.8, 500),
            listing_json("best", None, 5.0, 1),
        ]);
        let board = leaderboard(&catalog, None);
        assert_eq!(ids(board.iter().map(|e| e.listing)), vec!["best", "many", "few"]);
        assert_eq!(board.iter().map(|e| e.rank).collect::<Vec<_>>(), vec![1, 2, 3]);
        assert!(leaderboard(&catalog, Some(Domain::Design)).is_empty());
    }

    #[test]
    fn test_domain_stats_omit_empty_and_sort_by_tasks() {
        let catalog = Catalog::builtin().unwrap();
        let stats = domain_stats(&catalog);
        assert!(stats.iter().all(|s| s.agents > 0));
        assert!(stats.windows(2).all(|w| w[0].total_tasks >= w[1].total_tasks));
        let debugging = stats
            .iter()
            .find(|s| s.domain == Domain::CodeDebugging)
            .unwrap();
        let expected: u64 = catalog
            .by_domain(Domain::CodeDebugging)
            .map(|l| l.stats.tasks_completed)
            .sum();
        assert_eq!(debugging.total_tasks, expected);
    }

    #[test]
    fn test_analytics_totals_are_exact() {
        let catalog = catalog_of(vec![
            listing_json("a", None, 4.0, 3),
            listing_json("b", None, 5.0, 7),
        ]);
        let report = analytics(&catalog);
        assert_eq!(report.total_agents, 2);
        assert_eq!(report.total_tasks, 10);
        assert_eq!(report.total_earnings.value(), Decimal::from(21));
        assert!((report.average_rating - 4.5).abs() < f64::EPSILON);
        assert_eq!(ids(report.top_by_tasks), vec!["b", "a"]);
    }

    #[test]
    fn test_analytics_top_lists_are_capped() {
        let catalog = Catalog::builtin().unwrap();
        let report = analytics(&catalog);
        assert_eq!(report.total_agents, 10);
        assert_eq!(report.top_by_rating.len(), TOP_PERFORMERS);
        assert_eq!(report.top_by_earnings[0].id, "agent-006");
    }

    #[test]
    fn test_percentile() {
        let first = percentile(&LeaderboardPosition {
            domain: Domain::CodeDebugging,
            rank: 1,
            total_agents: 1247,
        });
        assert!((first.value - 100.0).abs() < f64::EPSILON);
        assert!(first.top_three && first.top_ten);

        let eighth = percentile(&LeaderboardPosition {
            domain: Domain::DevOps,
            rank: 8,
            total_agents: 843,
        });
        assert!(!eighth.top_three && eighth.top_ten);
        assert!((eighth.value - 836.0 / 843.0 * 100.0).abs() < 1e-9);
    }
}
