mod ai;
mod classify;
mod extract;
mod fetch;
mod models;
mod pipeline;
mod report;
mod store;

use anyhow::{Result, anyhow};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::fetch::Fetcher;
use crate::models::{JobDetail, ListItem};
use crate::pipeline::RunConfig;
use crate::store::DataStore;

#[derive(Parser)]
#[command(name = "duckhunt")]
#[command(about = "Remote job watcher - crawl, screen, and report eleduck postings")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Crawl the listing, classify new postings, and update the stores
    Run {
        /// Listing source URL; repeat for multiple pages
        #[arg(short, long)]
        source: Vec<String>,

        /// Number of leading items to skip
        #[arg(long, default_value = "0")]
        offset: usize,

        /// Maximum number of items to process (0 = unbounded)
        #[arg(long, default_value = "0")]
        limit: usize,

        /// Model for classification (doubao, doubao-pro, gpt-4o, gpt-4o-mini)
        #[arg(short, long, default_value = "doubao")]
        model: String,

        /// Data directory (defaults to the platform data dir)
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Classify without writing any artifacts
        #[arg(long)]
        dry_run: bool,
    },

    /// Classify a single posting URL and print the verdict without persisting
    One {
        /// Detail page URL
        url: String,

        /// Model for classification
        #[arg(short, long, default_value = "doubao")]
        model: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            source,
            offset,
            limit,
            model,
            data_dir,
            dry_run,
        } => {
            let spec = ai::resolve_model(&model)?;
            println!("Using model {}", spec.short_name);
            let provider = ai::create_provider(&spec)?;

            let store = DataStore::open(data_dir)?;
            println!("Data directory: {}\n", store.dir().display());

            let sources = if source.is_empty() {
                vec![pipeline::DEFAULT_SOURCE.to_string()]
            } else {
                source
            };

            let config = RunConfig {
                sources,
                offset,
                limit,
                dry_run,
            };

            let summary = pipeline::run(&config, provider.as_ref(), &store)?;

            println!("\nResults:");
            println!(
                "  Pages fetched:     {} ({} failed)",
                summary.pages_fetched, summary.pages_failed
            );
            println!("  Items listed:      {}", summary.items_listed);
            println!("  Items in window:   {}", summary.items_windowed);
            println!("  Already analyzed:  {}", summary.skipped_seen);
            println!("  Detail failures:   {}", summary.detail_failures);
            println!("  Classified:        {}", summary.classified);
            println!("  Qualified:         {}", summary.qualified);
            if summary.classify_failures > 0 {
                println!("  Classify failures: {}", summary.classify_failures);
            }

            if dry_run {
                println!("\n(Dry run - no artifacts were written)");
            }
        }

        Commands::One { url, model } => {
            let spec = ai::resolve_model(&model)?;
            let provider = ai::create_provider(&spec)?;

            let fetcher = Fetcher::new();
            let html = fetcher
                .fetch_page(&url)
                .ok_or_else(|| anyhow!("Failed to fetch {}", url))?;

            let parsed = extract::parse_detail(&html);
            let detail = detail_from_url(&url, parsed);

            println!("\nClassifying {} ...", detail.list_metadata.id);
            let result = classify::classify(provider.as_ref(), &detail)?;

            let analysis = &result.llm_analysis;
            println!("\nTitle: {}", detail.title);
            println!("URL: {}", url);
            println!(
                "Qualified: {}",
                if analysis.is_qualified { "yes" } else { "no" }
            );
            println!("Reasoning: {}", analysis.analysis.reasoning);

            let info = &analysis.extracted_info;
            let sentinel = report::NOT_MENTIONED;
            println!("\nExtracted:");
            println!(
                "  公司介绍: {}",
                info.company_introduction.as_deref().unwrap_or(sentinel)
            );
            println!(
                "  公司网站: {}",
                info.company_website.as_deref().unwrap_or(sentinel)
            );
            println!(
                "  职位职责: {}",
                info.job_responsibilities.as_deref().unwrap_or(sentinel)
            );
            println!(
                "  技能要求: {}",
                info.skill_requirements.as_deref().unwrap_or(sentinel)
            );
            println!(
                "  薪资待遇: {}",
                info.salary_benefits.as_deref().unwrap_or(sentinel)
            );
        }
    }

    Ok(())
}

/// Wrap a directly fetched detail page in the pipeline's record shape. The
/// id comes from the URL's last segment.
fn detail_from_url(url: &str, parsed: extract::ParsedDetail) -> JobDetail {
    let id = url.trim_end_matches('/').rsplit('/').next().unwrap_or("").to_string();
    let has_meta = parsed.meta_info.reads.is_some() || parsed.meta_info.comments.is_some();

    JobDetail {
        title: parsed.title.clone(),
        content: parsed.content,
        tags: parsed.tags,
        meta_info: has_meta.then_some(parsed.meta_info),
        list_metadata: ListItem {
            id,
            url: url.to_string(),
            created_at: String::new(),
            title: parsed.title,
            full_title: String::new(),
            summary: String::new(),
            views_count: 0,
            comments_count: 0,
            upvotes_count: 0,
            downvotes_count: 0,
            category: String::new(),
            user_nickname: String::new(),
            pinned: false,
            featured: false,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::extract::ParsedDetail;

    #[test]
    fn test_detail_from_url_takes_last_segment() {
        let parsed = ParsedDetail {
            title: "远程前端".to_string(),
            ..Default::default()
        };
        let detail = detail_from_url("https://eleduck.com/posts/z1fn9a", parsed);
        assert_eq!(detail.list_metadata.id, "z1fn9a");
        assert_eq!(detail.title, "远程前端");
        assert!(detail.meta_info.is_none());
    }

    #[test]
    fn test_detail_from_url_trailing_slash() {
        let detail = detail_from_url("https://eleduck.com/posts/abc/", ParsedDetail::default());
        assert_eq!(detail.list_metadata.id, "abc");
    }
}
