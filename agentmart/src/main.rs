//! The `agentmart` command-line front end.
//!
//! # Usage
//!
//! ```bash
//! # Browse
//! agentmart agents --domain devops --sort rating
//! agentmart show agent-003
//! agentmart reviews agent-001 --sort helpful
//! agentmart leaderboard --domain "code-debugging"
//! agentmart analytics
//!
//! # Fund (needs AGENTMART_KEYPAIR)
//! agentmart fund agent-003 --amount 0.25
//! agentmart hire agent-003
//!
//! # Configure logging level
//! RUST_LOG=debug agentmart hire agent-003
//! ```

use agentmart::catalog::{Catalog, Listing, Pricing};
use agentmart::config::{Cli, Command, Settings};
use agentmart::funding::{FundingAction, FundingOutcome, FundingRequest};
use agentmart::query::{self, AgentQuery, percentile};
use agentmart::reviews::{ReviewBook, ReviewSort, ReviewSummary};
use clap::Parser;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    if let Err(e) = run(Cli::parse()).await {
        tracing::error!("agentmart failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    let catalog = Catalog::builtin()?;
    tracing::debug!(listings = catalog.len(), "Loaded catalog");

    match cli.command {
        Command::Agents(args) => print_listings(&AgentQuery::from(args).run(&catalog)),
        Command::Show { id } => {
            let listing = find(&catalog, &id)?;
            let reviews = ReviewBook::builtin()?;
            print_profile(listing, &reviews.for_agent(&id, ReviewSort::Recent));
        }
        Command::Reviews { id, sort } => {
            let listing = find(&catalog, &id)?;
            let reviews = ReviewBook::builtin()?;
            print_reviews(listing, &reviews.for_agent(&id, sort));
        }
        Command::Leaderboard { domain } => print_leaderboard(&query::leaderboard(&catalog, domain)),
        Command::Analytics => print_analytics(&catalog),
        Command::Fund { id, amount } => {
            let listing = find(&catalog, &id)?;
            let request = FundingRequest::Transfer {
                destination: listing.wallet_address.clone(),
                amount_sol: amount,
            };
            fund(&cli.settings, request).await?;
        }
        Command::Hire { id, url } => {
            let listing = find(&catalog, &id)?;
            tracing::info!(agent = %listing.name, "Hiring agent");
            let url = url.unwrap_or_else(|| cli.settings.hire_url.clone());
            fund(&cli.settings, FundingRequest::hire(url)).await?;
        }
    }
    Ok(())
}

fn find<'a>(catalog: &'a Catalog, id: &str) -> Result<&'a Listing, String> {
    catalog.get(id).ok_or_else(|| format!("no agent with id {id:?}"))
}

async fn fund(
    settings: &Settings,
    request: FundingRequest,
) -> Result<(), Box<dyn std::error::Error>> {
    let wallet = settings.wallet()?;
    let action = FundingAction::new(wallet, settings.ledger(), reqwest::Client::new())
        .with_commitment(settings.commitment.into())
        .with_max_payment(settings.max_payment);
    tracing::info!(network = %settings.network, rpc = settings.rpc_url(), "Funding");

    match action.run(request).await? {
        FundingOutcome::Transferred(signature) => {
            print_line(&format!("Transfer confirmed: {signature}"));
        }
        FundingOutcome::Responded(body) => print_line(&serde_json::to_string_pretty(&body)?),
    }
    Ok(())
}

fn price_summary(pricing: &Pricing) -> String {
    if let Some(hourly) = pricing.hourly {
        return format!("${hourly}/hr");
    }
    if let Some(range) = pricing.task_based {
        return format!("${}-${}/task", range.min, range.max);
    }
    pricing
        .subscription
        .map_or_else(|| "-".to_owned(), |sub| format!("${}/{}", sub.amount, sub.period))
}

#[allow(clippy::print_stdout)]
fn print_line(line: &str) {
    println!("{line}");
}

#[allow(clippy::print_stdout)]
fn print_listings(listings: &[&Listing]) {
    for listing in listings {
        println!(
            "{:<10} {:<24} {:<9} {:>4.1} {:>6} tasks  {}",
            listing.id,
            listing.name,
            listing.status,
            listing.stats.rating,
            listing.stats.tasks_completed,
            price_summary(&listing.pricing),
        );
    }
    println!("{} agents", listings.len());
}

#[allow(clippy::print_stdout)]
fn print_profile(listing: &Listing, reviews: &ReviewSummary<'_>) {
    let verified = if listing.verified { " (verified)" } else { "" };
    println!("{}{verified} - {}", listing.name, listing.tagline);
    println!("{}", listing.description);
    println!();
    let domains: Vec<_> = listing.domains.iter().map(|d| d.label()).collect();
    println!("Domains:   {}", domains.join(", "));
    println!("Status:    {} (last active {})", listing.status, listing.last_active);
    println!("Wallet:    {}", listing.wallet_address);
    println!("Price:     {}", price_summary(&listing.pricing));
    let stats = &listing.stats;
    println!(
        "Stats:     {:.1} rating ({} reviews), {} tasks, {}% success",
        stats.rating, stats.reviews, stats.tasks_completed, stats.success_rate,
    );
    println!(
        "Activity:  {} avg response, {} SOL earned",
        stats.avg_response_time, stats.total_earnings,
    );
    if !listing.skills.is_empty() {
        let skills: Vec<_> = listing
            .skills
            .iter()
            .map(|s| format!("{} ({})", s.name, s.level))
            .collect();
        println!("Skills:    {}", skills.join(", "));
    }
    for position in &listing.leaderboard_positions {
        let pct = percentile(position);
        let badge = if pct.top_three {
            " [top 3]"
        } else if pct.top_ten {
            " [top 10]"
        } else {
            ""
        };
        println!(
            "Rank:      #{} of {} in {} (top {:.0}%){badge}",
            position.rank, position.total_agents, position.domain, pct.value,
        );
    }
    for credential in &listing.credentials {
        let mark = if credential.verified { "+" } else { "-" };
        println!(
            "Credential {mark} {} ({}, {})",
            credential.title, credential.issuer, credential.date,
        );
    }
    for achievement in &listing.achievements {
        println!("Achievement: {} - {}", achievement.title, achievement.metric);
    }
    println!();
    print_rating_summary(reviews);
}

#[allow(clippy::print_stdout)]
fn print_rating_summary(summary: &ReviewSummary<'_>) {
    let Some(average) = summary.average else {
        println!("No reviews yet");
        return;
    };
    println!("Reviews:   {average:.1} average from {}", summary.reviews.len());
    for bucket in &summary.distribution {
        println!("  {} star  {:>3}  {:>5.1}%", bucket.star, bucket.count, bucket.percentage);
    }
}

#[allow(clippy::print_stdout)]
fn print_reviews(listing: &Listing, summary: &ReviewSummary<'_>) {
    println!("{}", listing.name);
    print_rating_summary(summary);
    for review in &summary.reviews {
        let verified = if review.verified_hire {
            " (verified hire)"
        } else {
            ""
        };
        println!();
        println!(
            "{}/5 {} - {}{verified}, {}",
            review.rating, review.title, review.user_name, review.created_at,
        );
        println!("{}", review.review_text);
        if !review.pros.is_empty() {
            println!("Pros: {}", review.pros.join(", "));
        }
        if !review.cons.is_empty() {
            println!("Cons: {}", review.cons.join(", "));
        }
        println!(
            "Response {}/5, quality {}/5, communication {}/5, value {}/5",
            review.response_time_rating,
            review.quality_rating,
            review.communication_rating,
            review.value_rating,
        );
        let again = if review.would_hire_again {
            "would hire again"
        } else {
            "would not hire again"
        };
        println!("{again}, {} found this helpful", review.helpful_count);
    }
}

#[allow(clippy::print_stdout)]
fn print_leaderboard(entries: &[query::LeaderboardEntry<'_>]) {
    for entry in entries {
        let stats = &entry.listing.stats;
        println!(
            "#{:<3} {:<24} {:>4.1} {:>6} tasks  {} SOL",
            entry.rank,
            entry.listing.name,
            stats.rating,
            stats.tasks_completed,
            stats.total_earnings,
        );
    }
}

#[allow(clippy::print_stdout)]
fn print_analytics(catalog: &Catalog) {
    let totals = query::analytics(catalog);
    println!(
        "{} agents ({} available), {} tasks, {} SOL earned",
        totals.total_agents, totals.available_agents, totals.total_tasks, totals.total_earnings,
    );
    println!(
        "Average rating {:.2}, average success rate {:.1}%",
        totals.average_rating, totals.average_success_rate,
    );
    let names = |listings: &[&Listing]| {
        listings
            .iter()
            .map(|l| l.name.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    println!("Top rated:     {}", names(&totals.top_by_rating));
    println!("Most tasks:    {}", names(&totals.top_by_tasks));
    println!("Top earners:   {}", names(&totals.top_by_earnings));
    println!();
    for stats in query::domain_stats(catalog) {
        println!(
            "{:<20} {:>3} agents {:>7} tasks  {:.2} rating  {} SOL",
            stats.domain.label(),
            stats.agents,
            stats.total_tasks,
            stats.average_rating,
            stats.total_earnings.normalize(),
        );
    }
}
