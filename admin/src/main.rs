//! Operator tooling.
//!
//! The campaign counter is never auto-initialized by the server; `init-counter`
//! is the explicit seeding step before the first campaign can be created.
//! `reindex` rebuilds the search index from the store after drift.

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};

use nidhi_server::{
    config::Config,
    database::{init_redis, list_campaigns, seed_counter},
    search::{init_meilisearch, upsert_campaigns},
};

#[derive(Parser, Debug)]
#[command(author, version, about)]
struct Args {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Seed the campaign counter. Refuses to overwrite an existing counter.
    InitCounter {
        /// Last-assigned campaign id to start from.
        #[arg(long, default_value_t = 0)]
        value: u64,
    },
    /// Rebuild the search index from every campaign in the store.
    Reindex,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let config = Config::load();

    let mut conn = init_redis(&config.redis_url).await;

    match args.command {
        Command::InitCounter { value } => {
            let seeded = seed_counter(&mut conn, value)
                .await
                .context("Failed to seed counter")?;

            if seeded {
                println!("Campaign counter initialized to {value}");
            } else {
                println!("Campaign counter already exists, leaving it untouched");
            }
        }
        Command::Reindex => {
            let Some(meili_key) = &config.meili_key else {
                bail!("Search is not configured");
            };
            let meili_client = init_meilisearch(&config.meili_url, meili_key).await;

            let campaigns = list_campaigns(&mut conn)
                .await
                .context("Failed to load campaigns")?;

            println!("Loaded campaigns: {}\n", campaigns.len());

            let pb = ProgressBar::new(campaigns.len() as u64);
            pb.set_style(
                ProgressStyle::with_template(
                    "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}",
                )
                .unwrap()
                .progress_chars("=> "),
            );

            for campaign in &campaigns {
                pb.set_message(format!("Indexing campaign {}", campaign.campaign_id));

                upsert_campaigns(&meili_client, std::slice::from_ref(campaign))
                    .await
                    .context("Failed to index campaign")?;

                pb.inc(1);
            }

            pb.finish_with_message("Done");
        }
    }

    Ok(())
}
