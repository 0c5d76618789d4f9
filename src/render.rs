//! Terminal output for every command.

use std::path::Path;

use ragdoll::{
    analytics::{AnalyticsOverview, CleanupReport, SearchRecord, TrendingQuery},
    backend::{Context, Document, DocumentStatus, KeywordStats, StoreStats},
    diagnostics::DiagnosticReport,
    error::Result,
    ingestion::IngestSummary,
    listing::ListedDocument,
    projector::{SearchResult, raw_results},
    request::{SearchRequest, SearchType},
};
use serde::Serialize;
use serde_json::Value;

use crate::cli::OutputFormat;

const RULE_WIDTH: usize = 80;

pub fn json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Truncate to `width` characters and pad to exactly that width.
fn fit(text: &str, width: usize) -> String {
    let flat: String = text
        .chars()
        .map(|c| if c.is_whitespace() { ' ' } else { c })
        .take(width)
        .collect();
    format!("{flat:<width$}")
}

/// First `max` characters of `text` on one line, with an ellipsis when cut.
fn preview(text: &str, max: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    match flat.char_indices().nth(max) {
        Some((cut, _)) => format!("{}...", &flat[..cut]),
        None => flat,
    }
}

fn score_label(search_type: SearchType) -> &'static str {
    match search_type {
        SearchType::Semantic => "Similarity",
        SearchType::Keyword => "Match",
        SearchType::Hybrid | SearchType::Fulltext => "Score",
    }
}

fn score_text(score: Option<f64>) -> String {
    score.map_or_else(|| "N/A".to_string(), |s| format!("{s:.3}"))
}

fn rule() {
    println!("{}", "-".repeat(RULE_WIDTH));
}

// -- Search --

pub fn search_results(
    request: &SearchRequest,
    response: &Value,
    results: &[SearchResult],
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => json(response),
        OutputFormat::Plain => {
            for (i, r) in results.iter().enumerate() {
                println!("{}. {}", i + 1, r.title.as_deref().unwrap_or("Untitled"));
                println!("   ID: {}", r.id.as_deref().unwrap_or("N/A"));
                println!(
                    "   {}: {}",
                    score_label(request.search_type),
                    score_text(r.score)
                );
                println!(
                    "   Content: {}",
                    preview(r.content.as_deref().unwrap_or(""), 200)
                );
                println!();
            }
            Ok(())
        }
        OutputFormat::Table => {
            println!(
                "Found {} result(s) for '{}' ({} search):",
                results.len(),
                request.query,
                request.search_type
            );
            println!();
            println!(
                "{}{}{}{}",
                fit("Rank", 5),
                fit("ID", 14),
                fit("Title", 30),
                fit(score_label(request.search_type), 12)
            );
            rule();
            for (i, r) in results.iter().enumerate() {
                println!(
                    "{}{}{}{}{}",
                    fit(&(i + 1).to_string(), 5),
                    fit(r.id.as_deref().unwrap_or(""), 14),
                    fit(r.title.as_deref().unwrap_or("Untitled"), 30),
                    fit(&score_text(r.score), 12),
                    preview(r.content.as_deref().unwrap_or(""), 40)
                );
            }
            println!();
            println!(
                "Use --format json for complete results or --format plain for a detailed view"
            );
            Ok(())
        }
    }
}

pub fn no_results(
    request: &SearchRequest,
    report: Option<&DiagnosticReport>,
    format: OutputFormat,
) -> Result<()> {
    if format == OutputFormat::Json {
        return Ok(());
    }
    println!("No results found for '{}'", request.query);
    if let Some(report) = report {
        diagnostics(report);
    }
    Ok(())
}

pub fn diagnostics(report: &DiagnosticReport) {
    if let Some(stats) = &report.statistics {
        println!();
        println!("Search statistics:");
        let lines = [
            ("Threshold used", stats.threshold_used),
            ("Highest similarity", stats.highest_similarity),
            ("Lowest similarity", stats.lowest_similarity),
            ("Average similarity", stats.average_similarity),
        ];
        for (label, value) in lines {
            if let Some(v) = value {
                println!("  {label}: {v:.3}");
            }
        }
        if let Some(n) = stats.similarities_above_threshold {
            println!("  Above threshold: {n}");
        }
        if let Some(n) = stats.total_embeddings_checked {
            println!("  Embeddings checked: {n}");
        }
    }

    println!();
    println!("Suggestions:");
    for line in &report.guidance {
        println!("  - {line}");
    }
}

// -- Documents --

pub fn add_summary(summary: &IngestSummary, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return json(summary);
    }

    println!("Completed:");
    println!(
        "  Successfully added: {} file(s) ({} replaced)",
        summary.added.len(),
        summary.replaced_count()
    );
    println!("  Errors: {} file(s)", summary.failed.len());

    if !summary.failed.is_empty() {
        println!();
        println!("Errors:");
        for failed in &summary.failed {
            println!("  {}: {}", failed.path.display(), failed.reason);
        }
    }

    if !summary.added.is_empty() {
        println!();
        println!("Added:");
        for outcome in &summary.added {
            println!("  {} (ID: {})", outcome.title, outcome.document_id);
            if format == OutputFormat::Plain {
                println!("    {}", outcome.message);
            }
        }
        println!();
        println!("Use 'ragdoll status <id>' to check processing status.");
    }
    Ok(())
}

pub fn unmatched_inputs(inputs: &[String]) {
    for input in inputs {
        eprintln!("Warning: path not found or no supported files: {input}");
    }
}

pub fn document_list(
    listed: &[ListedDocument],
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => json(listed),
        OutputFormat::Plain => {
            for l in listed {
                println!("{}: {}", l.document.id, l.document.title);
            }
            Ok(())
        }
        OutputFormat::Table => {
            if listed.is_empty() {
                println!("No documents found.");
                return Ok(());
            }
            println!(
                "{}{}{}{}",
                fit("ID", 14),
                fit("Title", 40),
                fit("Status", 12),
                "Embeddings"
            );
            rule();
            for l in listed {
                let doc = &l.document;
                let count = if l.enrichment.is_stale() {
                    format!("{} (stale)", doc.embeddings_count)
                } else {
                    doc.embeddings_count.to_string()
                };
                println!(
                    "{}{}{}{}",
                    fit(&doc.id, 14),
                    fit(&doc.title, 40),
                    fit(&doc.status.to_string(), 12),
                    count
                );
            }
            Ok(())
        }
    }
}

pub fn document(doc: &Document, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return json(doc);
    }
    println!("Document Details for ID: {}", doc.id);
    println!("  Title: {}", doc.title);
    println!("  Location: {}", doc.location);
    println!("  Content type: {}", doc.content_type);
    if let Some(classification) = &doc.classification {
        println!("  Classification: {classification}");
    }
    println!("  Status: {}", doc.status);
    println!("  Embeddings Count: {}", doc.embeddings_count);
    println!("  Content Length: {} characters", doc.content_length());
    println!("  Keywords: {}", join_or_none(&doc.keywords));
    println!("  Tags: {}", join_or_none(&doc.tags));
    println!("  Created: {}", doc.created_at.to_rfc3339());
    println!("  Updated: {}", doc.updated_at.to_rfc3339());
    Ok(())
}

pub fn document_status(
    status: &DocumentStatus,
    format: OutputFormat,
) -> Result<()> {
    if format == OutputFormat::Json {
        return json(status);
    }
    println!("Document Status for ID: {}", status.id);
    println!("  Status: {}", status.status);
    println!("  Embeddings Count: {}", status.embeddings_count);
    println!(
        "  Embeddings Ready: {}",
        if status.embeddings_ready { "Yes" } else { "No" }
    );
    println!("  Message: {}", status.message);
    Ok(())
}

pub fn stats(stats: &StoreStats, data_dir: &Path, format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return json(stats);
    }
    println!("System Statistics:");
    println!("  Data directory: {}", data_dir.display());
    println!("  Total documents: {}", stats.total_documents);
    println!("  Total embeddings: {}", stats.total_embeddings);
    println!("  Storage type: {}", stats.storage_type);
    if !stats.by_status.is_empty() {
        println!("  Documents by status:");
        for (status, count) in &stats.by_status {
            println!("    {status}: {count}");
        }
    }
    if !stats.by_type.is_empty() {
        println!("  Documents by type:");
        for (ty, count) in &stats.by_type {
            println!("    {ty}: {count}");
        }
    }
    Ok(())
}

pub fn context(context: &Context) -> Result<()> {
    json(context)
}

/// The prompt wrapped with retrieved context, or returned unchanged when
/// nothing relevant was found.
pub fn enhanced_prompt(prompt: &str, context: &Context) -> String {
    if context.context_chunks.is_empty() {
        return prompt.to_string();
    }
    format!(
        "You are an AI assistant. Use the following context to help answer the user's question. \
         If the context doesn't contain relevant information, say so.\n\n\
         Context:\n{}\n\nQuestion: {prompt}\n\nAnswer:",
        context.combined_context
    )
}

fn join_or_none(items: &[String]) -> String {
    if items.is_empty() {
        "(none)".to_string()
    } else {
        items.join(", ")
    }
}

// -- Keywords --

pub fn keyword_results(
    response: &Value,
    keywords: &[String],
    format: OutputFormat,
) -> Result<()> {
    let entries = raw_results(response);
    let field = |entry: &Value, key: &str| {
        entry
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or("")
            .to_string()
    };
    let list = |entry: &Value, key: &str| -> Vec<String> {
        entry
            .get(key)
            .and_then(Value::as_array)
            .map(|items| {
                items
                    .iter()
                    .filter_map(Value::as_str)
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default()
    };

    match format {
        OutputFormat::Json => json(response),
        OutputFormat::Plain => {
            for (i, entry) in entries.iter().enumerate() {
                println!("{}. {}", i + 1, field(entry, "title"));
                println!("   ID: {}", field(entry, "document_id"));
                println!("   Keywords: {}", list(entry, "keywords").join(", "));
                let matched = list(entry, "matched_keywords");
                if !matched.is_empty() {
                    println!("   Matching: {}", matched.join(", "));
                }
                println!();
            }
            Ok(())
        }
        OutputFormat::Table => {
            println!("Keywords: {}", keywords.join(", "));
            println!("Found {} document(s):", entries.len());
            println!();
            println!(
                "{}{}{}{}",
                fit("ID", 14),
                fit("Title", 30),
                fit("Keywords", 40),
                "Matches"
            );
            rule();
            for entry in entries {
                println!(
                    "{}{}{}{}",
                    fit(&field(entry, "document_id"), 14),
                    fit(&field(entry, "title"), 30),
                    fit(&list(entry, "keywords").join(", "), 40),
                    list(entry, "matched_keywords").len()
                );
            }
            Ok(())
        }
    }
}

pub fn no_keyword_results(keywords: &[String]) {
    println!("No documents found with keywords: {}", keywords.join(", "));
    println!();
    println!("Suggestions:");
    println!("  - Try different or fewer keywords");
    println!("  - Switch between --all and the default (any) mode");
    println!("  - Check available keywords with: ragdoll keywords list");
}

pub fn keyword_frequencies(
    frequencies: &[(String, usize)],
    min_count: usize,
    format: OutputFormat,
) -> Result<()> {
    match format {
        OutputFormat::Json => json(frequencies),
        OutputFormat::Plain => {
            for (keyword, count) in frequencies {
                println!("{keyword}: {count}");
            }
            Ok(())
        }
        OutputFormat::Table => {
            if frequencies.is_empty() {
                println!("No keywords found.");
                return Ok(());
            }
            println!("Keywords in use (minimum {min_count} document(s)):");
            println!();
            println!("{}Document Count", fit("Keyword", 30));
            rule();
            for (keyword, count) in frequencies {
                println!("{}{count}", fit(keyword, 30));
            }
            println!();
            println!("Total keywords: {}", frequencies.len());
            Ok(())
        }
    }
}

pub fn document_keywords(doc: &Document) {
    println!("Keywords for document {}:", doc.id);
    println!("  Title: {}", doc.title);
    println!("  Keywords: {}", join_or_none(&doc.keywords));
    if doc.keywords.is_empty() {
        println!();
        println!(
            "Add keywords with: ragdoll keywords add {} KEYWORD...",
            doc.id
        );
    }
}

pub fn keyword_stats(stats: &KeywordStats) {
    println!("Keyword Statistics:");
    println!("  Total unique keywords: {}", stats.total_keywords);
    println!(
        "  Documents with keywords: {}",
        stats.documents_with_keywords
    );
    println!(
        "  Average keywords per document: {:.2}",
        stats.avg_keywords_per_document
    );
    println!("  Most common keywords:");
    if stats.top_keywords.is_empty() {
        println!("    (none)");
    }
    for (i, (keyword, count)) in stats.top_keywords.iter().enumerate() {
        println!("    {}. {keyword} ({count} documents)", i + 1);
    }
    println!("  Keywords used once: {}", stats.singleton_keywords);
}

// -- Analytics --

pub fn overview(
    overview: &AnalyticsOverview,
    days: u32,
    format: OutputFormat,
) -> Result<()> {
    if format == OutputFormat::Json {
        return json(overview);
    }
    println!("Search Analytics (last {days} days):");
    println!();
    println!("{}Value", fit("Metric", 30));
    println!("{}", "-".repeat(50));
    println!("{}{}", fit("Total Searches", 30), overview.total_searches);
    println!("{}{}", fit("Unique Queries", 30), overview.unique_queries);
    println!(
        "{}{}",
        fit("Avg Results Per Search", 30),
        overview.avg_results_per_search
    );
    println!(
        "{}{}ms",
        fit("Avg Execution Time", 30),
        overview.avg_execution_time
    );
    println!(
        "{}{}",
        fit("Searches With Results", 30),
        overview.searches_with_results
    );
    for (ty, count) in &overview.search_types {
        println!("{}{count}", fit(&format!("Type: {ty}"), 30));
    }
    Ok(())
}

pub fn history(records: &[SearchRecord], format: OutputFormat) -> Result<()> {
    if format == OutputFormat::Json {
        return json(records);
    }
    if records.is_empty() {
        println!("No search history found.");
        return Ok(());
    }

    if format == OutputFormat::Plain {
        for (i, r) in records.iter().enumerate() {
            println!("{}. {} ({})", i + 1, r.query, r.search_type);
            println!("   Time: {}", r.created_at.to_rfc3339());
            println!("   Results: {}", r.results_count);
            println!("   Execution: {}ms", r.execution_time_ms);
            if let Some(session) = &r.session_id {
                println!("   Session: {session}");
            }
            if let Some(user) = &r.user_id {
                println!("   User: {user}");
            }
            println!();
        }
        return Ok(());
    }

    println!("Recent Search History ({} searches):", records.len());
    println!();
    println!(
        "{}{}{}{}Time(ms)",
        fit("Time", 20),
        fit("Query", 30),
        fit("Type", 10),
        fit("Results", 8)
    );
    rule();
    for r in records {
        println!(
            "{}{}{}{}{}",
            fit(&r.created_at.format("%m/%d %H:%M").to_string(), 20),
            fit(&r.query, 30),
            fit(&r.search_type, 10),
            fit(&r.results_count.to_string(), 8),
            r.execution_time_ms
        );
    }
    Ok(())
}

pub fn trending(
    queries: &[TrendingQuery],
    days: u32,
    format: OutputFormat,
) -> Result<()> {
    if format == OutputFormat::Json {
        return json(queries);
    }
    if queries.is_empty() {
        println!("No trending queries found for the last {days} days.");
        return Ok(());
    }
    println!("Trending Search Queries (last {days} days):");
    println!();
    println!(
        "{}{}{}Avg Results",
        fit("Rank", 5),
        fit("Query", 40),
        fit("Count", 8)
    );
    rule();
    for (i, q) in queries.iter().enumerate() {
        println!(
            "{}{}{}{:.1}",
            fit(&(i + 1).to_string(), 5),
            fit(&q.query, 40),
            fit(&q.count.to_string(), 8),
            q.avg_results
        );
    }
    Ok(())
}

pub fn cleanup(report: &CleanupReport, days: u32) {
    if report.dry_run {
        println!("DRY RUN: nothing was deleted (use --force to clean up)");
    } else {
        println!("Cleaned up search records older than {days} days.");
    }
    println!();
    println!("Cleanup Results:");
    println!("  Orphaned searches: {}", report.orphaned_count);
    println!("  Old unused searches: {}", report.unused_count);
    println!("  Total: {}", report.total());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fit_pads_and_truncates() {
        assert_eq!(fit("abc", 5), "abc  ");
        assert_eq!(fit("abcdef", 3), "abc");
        assert_eq!(fit("a\nb", 4), "a b ");
        assert_eq!(fit("héllo", 2), "hé");
    }

    #[test]
    fn preview_cuts_on_characters() {
        assert_eq!(preview("one   two\nthree", 100), "one two three");
        assert_eq!(preview("ééééé", 2), "éé...");
    }

    #[test]
    fn enhanced_prompt_embeds_context() {
        let empty = Context {
            context_chunks: vec![],
            combined_context: String::new(),
            total_chunks: 0,
        };
        assert_eq!(enhanced_prompt("why?", &empty), "why?");

        let context = Context {
            context_chunks: vec![ragdoll::backend::ContextChunk {
                document_id: "abc".to_string(),
                source: "Notes".to_string(),
                content: "Because.".to_string(),
                similarity: 0.5,
            }],
            combined_context: "Because.".to_string(),
            total_chunks: 1,
        };
        let prompt = enhanced_prompt("why?", &context);
        assert!(prompt.contains("Context:\nBecause."));
        assert!(prompt.contains("Question: why?"));
    }

    #[test]
    fn score_formatting() {
        assert_eq!(score_text(Some(0.12345)), "0.123");
        assert_eq!(score_text(None), "N/A");
        assert_eq!(score_label(SearchType::Semantic), "Similarity");
    }
}
