use anyhow::Result;
use chrono::Local;
use std::collections::HashMap;

use crate::ai::AIProvider;
use crate::classify;
use crate::extract;
use crate::fetch::Fetcher;
use crate::models::{AnalysisResult, JobDetail, LedgerEntry, ListItem};
use crate::report;
use crate::store::DataStore;

pub const DEFAULT_SOURCE: &str = "https://svc.eleduck.com/api/v1/posts?page=1";

pub struct RunConfig {
    pub sources: Vec<String>,
    /// Leading items to skip after accumulation.
    pub offset: usize,
    /// Cap on items processed; 0 means unbounded.
    pub limit: usize,
    /// Classify but write nothing.
    pub dry_run: bool,
}

#[derive(Debug, Default)]
pub struct RunSummary {
    pub pages_fetched: usize,
    pub pages_failed: usize,
    pub items_listed: usize,
    pub items_windowed: usize,
    pub detail_failures: usize,
    pub skipped_seen: usize,
    pub classified: usize,
    pub qualified: usize,
    pub classify_failures: usize,
}

/// Drive one full crawl–classify–merge run. Fully sequential: list fetches,
/// detail fetches, and classification calls happen one at a time.
pub fn run(config: &RunConfig, provider: &dyn AIProvider, store: &DataStore) -> Result<RunSummary> {
    let fetcher = Fetcher::new();
    let mut summary = RunSummary::default();

    // Step 1: accumulate list items across all source pages, in source order.
    println!("Step 1: fetching listing pages...");
    let mut pages = Vec::new();
    for source in &config.sources {
        match fetcher.fetch_json(source) {
            Some(data) => {
                let items = extract::parse_list(&data);
                println!("  {} items from {}", items.len(), source);
                summary.pages_fetched += 1;
                pages.push(items);
            }
            None => {
                // A failed page contributes zero items; the run continues.
                summary.pages_failed += 1;
            }
        }
    }
    let all_items = accumulate(pages);
    summary.items_listed = all_items.len();
    println!("  {} items total", all_items.len());

    // Step 2: window.
    let windowed = apply_window(all_items, config.offset, config.limit);
    summary.items_windowed = windowed.len();

    // Step 3: fetch detail pages; a failed item is skipped, not fatal.
    println!("\nStep 2: fetching detail pages...");
    let mut details = Vec::new();
    for (i, item) in windowed.iter().enumerate() {
        println!("\n[{}/{}] {}", i + 1, windowed.len(), item.title);
        match fetch_detail(&fetcher, item) {
            Some(detail) => details.push(detail),
            None => {
                eprintln!("  Skipping {}: detail fetch failed", item.id);
                summary.detail_failures += 1;
            }
        }
    }

    // Step 4: drop everything a previous run already classified.
    let ledger = store.load_ledger();
    let existing_count = ledger.len();
    let (unseen, skipped) = ledger.filter_unseen(details);
    summary.skipped_seen = skipped;
    println!(
        "\nStep 3: {} already analyzed, {} new to classify",
        skipped,
        unseen.len()
    );

    // Step 5: classify in order, one ledger entry per successful item.
    let classified_at = Local::now().format("%Y-%m-%dT%H:%M:%S%.3f").to_string();
    let outcome = classify_batch(provider, &unseen, &classified_at);
    summary.classified = outcome.new_entries.len();
    summary.qualified = outcome.new_qualified.len();
    summary.classify_failures = outcome.failures;

    if config.dry_run {
        println!("\n(Dry run - nothing was written)");
        return Ok(summary);
    }

    // Step 6: merge newest-first and commit all artifacts.
    println!("\nStep 4: merging and writing artifacts...");
    let merged_ledger = ledger.merge(outcome.new_entries);
    println!(
        "  ledger: {} entries ({} existing)",
        merged_ledger.len(),
        existing_count
    );
    store.save_ledger(&merged_ledger)?;

    let existing_qualified = store.load_qualified();
    let mut merged_qualified = outcome.new_qualified.clone();
    merged_qualified.extend(existing_qualified);
    println!("  qualified results: {} total", merged_qualified.len());
    store.save_qualified(&merged_qualified)?;

    store.save_report(&report::render_report(&merged_qualified))?;

    if !outcome.new_qualified.is_empty() {
        let stamp = Local::now().format("%Y-%m-%d %H:%M:%S").to_string();
        let block = report::render_notification(&outcome.new_qualified, &stamp);
        store.prepend_notification(&block)?;
        println!("  {} new qualified postings, notification written", outcome.new_qualified.len());
    }

    Ok(summary)
}

/// Flatten pages into one ordered list. A within-run duplicate id keeps the
/// first occurrence's position but the last occurrence's data
/// (overwrite-by-last-seen).
pub fn accumulate(pages: Vec<Vec<ListItem>>) -> Vec<ListItem> {
    let mut items: Vec<ListItem> = Vec::new();
    let mut positions: HashMap<String, usize> = HashMap::new();

    for page in pages {
        for item in page {
            match positions.get(&item.id) {
                Some(&pos) => items[pos] = item,
                None => {
                    positions.insert(item.id.clone(), items.len());
                    items.push(item);
                }
            }
        }
    }

    items
}

/// `(offset, limit)` slice over the accumulated listing. `limit == 0` means
/// unbounded; the default `(0, 0)` is the identity window.
pub fn apply_window(items: Vec<ListItem>, offset: usize, limit: usize) -> Vec<ListItem> {
    let iter = items.into_iter().skip(offset);
    if limit > 0 {
        iter.take(limit).collect()
    } else {
        iter.collect()
    }
}

/// Fetch and parse one posting's detail page, joining the listing metadata.
pub fn fetch_detail(fetcher: &Fetcher, item: &ListItem) -> Option<JobDetail> {
    let html = fetcher.fetch_page(&item.url)?;
    let parsed = extract::parse_detail(&html);
    let has_meta = parsed.meta_info.reads.is_some() || parsed.meta_info.comments.is_some();

    Some(JobDetail {
        title: parsed.title,
        content: parsed.content,
        tags: parsed.tags,
        meta_info: has_meta.then_some(parsed.meta_info),
        list_metadata: item.clone(),
    })
}

pub struct BatchOutcome {
    pub new_entries: Vec<LedgerEntry>,
    pub new_qualified: Vec<AnalysisResult>,
    pub failures: usize,
}

/// Classify each detail in order with per-item try/continue semantics: a
/// malformed reply records no ledger entry for that item and does not abort
/// the batch.
pub fn classify_batch(
    provider: &dyn AIProvider,
    details: &[JobDetail],
    classified_at: &str,
) -> BatchOutcome {
    let mut new_entries = Vec::new();
    let mut new_qualified = Vec::new();
    let mut failures = 0;

    for (i, detail) in details.iter().enumerate() {
        let id = &detail.list_metadata.id;
        println!("\n[{}/{}] classifying {}", i + 1, details.len(), id);

        let result = match classify::classify(provider, detail) {
            Ok(result) => result,
            Err(e) => {
                eprintln!("  Failed to classify {}: {:#}", id, e);
                failures += 1;
                continue;
            }
        };

        let is_qualified = result.llm_analysis.is_qualified;
        new_entries.push(LedgerEntry {
            id: id.clone(),
            url: detail.list_metadata.url.clone(),
            is_qualified,
            created_at: classified_at.to_string(),
            reason: result.llm_analysis.analysis.reasoning.clone(),
        });

        if is_qualified {
            println!("  qualified: {}", result.llm_analysis.analysis.reasoning);
            new_qualified.push(result);
        } else {
            println!("  not qualified: {}", result.llm_analysis.analysis.reasoning);
        }
    }

    BatchOutcome {
        new_entries,
        new_qualified,
        failures,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_fixtures;
    use crate::store::Ledger;
    use anyhow::anyhow;

    struct ScriptedProvider {
        replies: Vec<Result<String, String>>,
        calls: std::cell::RefCell<usize>,
    }

    impl ScriptedProvider {
        fn new(replies: Vec<Result<String, String>>) -> Self {
            Self {
                replies,
                calls: std::cell::RefCell::new(0),
            }
        }

        fn qualified_reply() -> String {
            r#"{
                "is_qualified": true,
                "analysis": {
                    "is_recruitment": true,
                    "is_long_term": true,
                    "is_development": true,
                    "salary_meets_requirement": true,
                    "reasoning": "长期远程开发岗"
                },
                "extracted_info": {
                    "company_introduction": "远程团队",
                    "company_website": "未提及",
                    "job_responsibilities": "开发",
                    "skill_requirements": "Rust",
                    "salary_benefits": "未提及"
                }
            }"#
            .to_string()
        }

        fn unqualified_reply() -> String {
            r#"{
                "is_qualified": false,
                "analysis": {
                    "is_recruitment": true,
                    "is_long_term": false,
                    "is_development": true,
                    "salary_meets_requirement": null,
                    "reasoning": "一次性项目"
                }
            }"#
            .to_string()
        }
    }

    impl AIProvider for ScriptedProvider {
        fn complete(&self, _prompt: &str, _max_tokens: u32) -> Result<String> {
            let mut calls = self.calls.borrow_mut();
            let reply = self
                .replies
                .get(*calls)
                .cloned()
                .unwrap_or_else(|| Err("no scripted reply".to_string()));
            *calls += 1;
            reply.map_err(|e| anyhow!(e))
        }

        fn model_name(&self) -> &str {
            "scripted"
        }
    }

    fn items(ids: &[&str]) -> Vec<ListItem> {
        ids.iter().map(|id| test_fixtures::list_item(id)).collect()
    }

    #[test]
    fn test_window_offset_and_limit() {
        let ten = items(&["1", "2", "3", "4", "5", "6", "7", "8", "9", "10"]);
        let windowed = apply_window(ten.clone(), 3, 4);
        let ids: Vec<&str> = windowed.iter().map(|i| i.id.as_str()).collect();
        // Positions 4-7, 1-indexed.
        assert_eq!(ids, vec!["4", "5", "6", "7"]);

        let identity = apply_window(ten, 0, 0);
        assert_eq!(identity.len(), 10);
    }

    #[test]
    fn test_window_offset_past_end() {
        let few = items(&["1", "2"]);
        assert!(apply_window(few, 5, 0).is_empty());
    }

    #[test]
    fn test_accumulate_preserves_source_order() {
        let merged = accumulate(vec![items(&["a", "b"]), items(&["c"])]);
        let ids: Vec<&str> = merged.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_accumulate_duplicate_id_overwrites_in_place() {
        let mut later = test_fixtures::list_item("a");
        later.title = "updated title".to_string();

        let merged = accumulate(vec![items(&["a", "b"]), vec![later]]);
        let ids: Vec<&str> = merged.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b"]);
        // Last occurrence wins, first position kept.
        assert_eq!(merged[0].title, "updated title");
    }

    #[test]
    fn test_classify_batch_one_entry_per_item() {
        let provider = ScriptedProvider::new(vec![
            Ok(ScriptedProvider::qualified_reply()),
            Ok(ScriptedProvider::unqualified_reply()),
        ]);
        let details = vec![
            test_fixtures::job_detail("a"),
            test_fixtures::job_detail("b"),
        ];

        let outcome = classify_batch(&provider, &details, "2025-08-30T10:00:00");
        assert_eq!(outcome.new_entries.len(), 2);
        assert_eq!(outcome.new_qualified.len(), 1);
        assert_eq!(outcome.failures, 0);
        assert_eq!(outcome.new_entries[0].id, "a");
        assert!(outcome.new_entries[0].is_qualified);
        assert_eq!(outcome.new_entries[1].id, "b");
        assert!(!outcome.new_entries[1].is_qualified);
        assert_eq!(outcome.new_entries[1].reason, "一次性项目");
        assert_eq!(outcome.new_qualified[0].original_data.list_metadata.id, "a");
    }

    #[test]
    fn test_classify_batch_schema_violation_skips_item() {
        let provider = ScriptedProvider::new(vec![
            Ok("this is not json at all".to_string()),
            Ok(ScriptedProvider::qualified_reply()),
        ]);
        let details = vec![
            test_fixtures::job_detail("bad"),
            test_fixtures::job_detail("good"),
        ];

        let outcome = classify_batch(&provider, &details, "2025-08-30T10:00:00");
        // No ledger entry for the malformed item; the batch continues.
        assert_eq!(outcome.failures, 1);
        assert_eq!(outcome.new_entries.len(), 1);
        assert_eq!(outcome.new_entries[0].id, "good");
        assert_eq!(outcome.new_qualified.len(), 1);
    }

    #[test]
    fn test_classify_batch_fenced_reply() {
        let fenced = format!("```json\n{}\n```", ScriptedProvider::qualified_reply());
        let provider = ScriptedProvider::new(vec![Ok(fenced)]);
        let details = vec![test_fixtures::job_detail("a")];

        let outcome = classify_batch(&provider, &details, "2025-08-30T10:00:00");
        assert_eq!(outcome.new_entries.len(), 1);
        assert_eq!(outcome.failures, 0);
    }

    #[test]
    fn test_second_run_classifies_nothing_new() {
        // Run 1 over two items.
        let provider = ScriptedProvider::new(vec![
            Ok(ScriptedProvider::qualified_reply()),
            Ok(ScriptedProvider::unqualified_reply()),
        ]);
        let details = vec![
            test_fixtures::job_detail("a"),
            test_fixtures::job_detail("b"),
        ];
        let outcome = classify_batch(&provider, &details, "2025-08-30T10:00:00");
        let ledger = Ledger::from_entries(outcome.new_entries);

        // Run 2 with an unchanged listing: everything is filtered as seen.
        let again = vec![
            test_fixtures::job_detail("a"),
            test_fixtures::job_detail("b"),
        ];
        let (unseen, skipped) = ledger.filter_unseen(again);
        assert!(unseen.is_empty());
        assert_eq!(skipped, 2);

        let provider2 = ScriptedProvider::new(vec![]);
        let outcome2 = classify_batch(&provider2, &unseen, "2025-08-30T11:00:00");
        assert!(outcome2.new_entries.is_empty());
        assert!(outcome2.new_qualified.is_empty());
        assert_eq!(*provider2.calls.borrow(), 0);
    }

    #[test]
    fn test_exactly_once_across_runs() {
        let provider = ScriptedProvider::new(vec![Ok(ScriptedProvider::qualified_reply())]);
        let details = vec![test_fixtures::job_detail("a")];
        let outcome = classify_batch(&provider, &details, "2025-08-30T10:00:00");
        let mut ledger = Ledger::from_entries(outcome.new_entries);

        // Three more runs listing the same id never add another entry.
        for _ in 0..3 {
            let (unseen, _) = ledger.filter_unseen(vec![test_fixtures::job_detail("a")]);
            let no_provider = ScriptedProvider::new(vec![]);
            let outcome = classify_batch(&no_provider, &unseen, "later");
            ledger = Ledger::from_entries(ledger.merge(outcome.new_entries));
        }

        assert_eq!(ledger.len(), 1);
    }
}
