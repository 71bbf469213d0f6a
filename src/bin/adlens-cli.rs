use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::sync::Arc;

use adlens::ads::aggregator::default_dashboard_range;
use adlens::ads::{aggregate, series, validate_data_structure, AdDataSummary, AdField, DateRange, Granularity};
use adlens::config::Config;
use adlens::provider::{AdDataProvider, SystemClock};

#[derive(Parser)]
#[command(name = "adlens-cli")]
#[command(about = "Inspect ad data read from the configured spreadsheet", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch and normalize every row, printing totals and a sample
    Fetch {
        /// Number of records to print
        #[arg(long, default_value_t = 5)]
        sample: usize,
    },
    /// Check that records carry every required field
    Validate,
    /// Aggregate records into daily, weekly or monthly buckets
    Aggregate {
        /// First day, inclusive (YYYY-MM-DD)
        #[arg(long)]
        start: Option<NaiveDate>,
        /// Last day, inclusive (YYYY-MM-DD)
        #[arg(long)]
        end: Option<NaiveDate>,
        /// daily, weekly or monthly
        #[arg(long, default_value = "weekly")]
        view_mode: Granularity,
        /// Print only this metric per bucket (e.g. amountSpent, cpm)
        #[arg(long)]
        metric: Option<AdField>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let config = Config::from_env()?;
    let provider = AdDataProvider::from_config(&config, Arc::new(SystemClock))?;

    match cli.command {
        Commands::Fetch { sample } => {
            let records = provider
                .fetch_ad_data()
                .await
                .context("failed to fetch ad data")?;
            let summary = AdDataSummary::from_records(&records);
            println!("Fetched {} records", summary.total_records);
            println!("{}", serde_json::to_string_pretty(&summary)?);
            for record in records.iter().take(sample) {
                println!("{}", serde_json::to_string(record)?);
            }
        }
        Commands::Validate => {
            let records = provider.fetch_ad_data().await?;
            if validate_data_structure(&records) {
                println!("✓ {} records have a valid structure", records.len());
            } else {
                bail!("ad data is missing required fields");
            }
        }
        Commands::Aggregate {
            start,
            end,
            view_mode,
            metric,
        } => {
            let default = default_dashboard_range(chrono::Utc::now().date_naive());
            let range = DateRange::new(start.unwrap_or(default.start), end.unwrap_or(default.end));
            let records = provider.fetch_ad_data().await?;
            let buckets = aggregate(&records, &range, view_mode);

            match metric {
                Some(metric) => {
                    let Some(points) = series(&buckets, metric) else {
                        bail!("'{}' is not a numeric metric", metric);
                    };
                    println!("{:<12} {}", "Bucket", metric);
                    println!("{}", "-".repeat(30));
                    for point in points {
                        println!("{:<12} {:.2}", point.bucket, point.value);
                    }
                }
                None => {
                    println!(
                        "{:<12} {:>8} {:>12} {:>12} {:>10}",
                        "Bucket", "Records", "Spent", "Impressions", "Clicks"
                    );
                    println!("{}", "-".repeat(58));
                    for bucket in &buckets {
                        println!(
                            "{:<12} {:>8} {:>12.2} {:>12} {:>10}",
                            bucket.bucket_start,
                            bucket.record_count,
                            bucket.counters.amount_spent,
                            bucket.counters.impressions,
                            bucket.counters.link_clicks
                        );
                    }
                }
            }
        }
    }

    Ok(())
}
