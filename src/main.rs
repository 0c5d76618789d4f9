use std::{
    io::{IsTerminal, Write},
    path::Path,
    time::Instant,
};

use chrono::Utc;
use clap::Parser;
use ragdoll::{
    analytics::{HistoryFilter, SearchRecord},
    backend::{DocumentStore, DocumentUpdate, Retrieval, SearchAnalytics},
    config::{self, Config, display_value},
    data_dir::DataDir,
    diagnostics::diagnose,
    dispatch::dispatch,
    error::{Error, Result},
    ingestion::ingest_files,
    keywords::KeywordMethod,
    listing,
    local_backend::{BackendSettings, LocalBackend},
    projector::{SearchResult, project},
    request::{
        RawSearchOptions,
        SearchRequest,
        SearchType,
        normalize,
        parse_number,
        split_list,
    },
    walker::discover,
};
use serde_json::Value;
use tracing::{debug, warn};
use tracing_subscriber::EnvFilter;

mod cli;
mod render;

use cli::{
    AddArgs,
    AnalyticsAction,
    Cli,
    Command,
    ConfigAction,
    KeywordsAction,
    OutputFormat,
    SearchArgs,
    keyword_args,
};

const LOG_ENV: &str = "RAGDOLL_LOG";

fn init_tracing(verbose: u8, quiet: bool, configured: &str) {
    let filter = if let Ok(env) = std::env::var(LOG_ENV) {
        EnvFilter::new(env)
    } else if quiet {
        EnvFilter::new("warn")
    } else {
        match verbose {
            0 => EnvFilter::try_new(configured)
                .unwrap_or_else(|_| EnvFilter::new("warn")),
            1 => EnvFilter::new("debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .without_time()
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let config_path = cli.config_file.clone().unwrap_or_else(config::config_path);

    // Tracing needs the configured level, so a load failure is reported
    // once the subscriber is up.
    let (config, load_error) = match Config::load(&config_path) {
        Ok(config) => (config, None),
        Err(e) => (Config::default(), Some(e)),
    };
    init_tracing(cli.verbose, cli.quiet, &config.logging.level);
    if let Some(e) = load_error {
        warn!(
            path = %config_path.display(),
            error = %e,
            "ignoring unreadable config file, using defaults"
        );
    }

    match cli.command {
        Command::Version => {
            println!("ragdoll {}", env!("CARGO_PKG_VERSION"));
        }
        Command::Completions(args) => args.generate(),
        Command::Config { action } => {
            cmd_config(action, &config_path, &config, cli.data_dir.as_deref())?;
        }
        command => {
            let data_dir = DataDir::resolve(
                cli.data_dir.as_deref(),
                config.storage.data_dir.as_deref(),
            )?;
            let backend =
                LocalBackend::open(&data_dir, BackendSettings::from(&config))?;
            run(command, &backend, &data_dir, &config, cli.quiet)?;
        }
    }

    Ok(())
}

fn run(
    command: Command,
    backend: &LocalBackend,
    data_dir: &DataDir,
    config: &Config,
    quiet: bool,
) -> Result<()> {
    match command {
        Command::Search(args) => cmd_search(&args, backend, config),
        Command::Add(args) => cmd_add(&args, backend, quiet),
        Command::List(args) => {
            let listed = listing::list_documents(backend, &args.options())?;
            render::document_list(&listed, args.format)
        }
        Command::Show(args) => {
            render::document(&backend.get_document(&args.id)?, args.format)
        }
        Command::Status(args) => render::document_status(
            &backend.document_status(&args.id)?,
            args.format,
        ),
        Command::Update(args) => {
            let update = DocumentUpdate {
                title: args.title,
                classification: args.classification,
                tags: args
                    .tags
                    .as_deref()
                    .map(|t| split_list(t).unwrap_or_default()),
            };
            let doc = backend.update_document(&args.id, &update)?;
            println!("Document ID {} updated successfully.", doc.id);
            Ok(())
        }
        Command::Delete(args) => cmd_delete(&args.id, args.force, backend),
        Command::Stats(args) => {
            render::stats(&backend.stats()?, data_dir.root(), args.format)
        }
        Command::Health => {
            if !backend.healthy() {
                return Err(Error::Backend("health check failed".to_string()));
            }
            println!("System is healthy");
            println!("  Document store: OK");
            println!("  Full-text index: OK");
            Ok(())
        }
        Command::Context(args) => {
            render::context(&backend.get_context(&args.query, args.limit)?)
        }
        Command::Enhance(args) => {
            let context = backend.get_context(&args.prompt, args.limit)?;
            println!("{}", render::enhanced_prompt(&args.prompt, &context));
            Ok(())
        }
        Command::Keywords { action } => cmd_keywords(action, backend),
        Command::Analytics { action } => cmd_analytics(action, backend),
        Command::Version | Command::Completions(_) | Command::Config { .. } => {
            Ok(())
        }
    }
}

// -- Search --

fn cmd_search(
    args: &SearchArgs,
    backend: &LocalBackend,
    config: &Config,
) -> Result<()> {
    let request = normalize(&args.to_raw(config.search.max_results))?;
    if request.threshold_out_of_range() {
        warn!(
            threshold = ?request.threshold,
            "threshold is outside [0, 1]; passing it through unchanged"
        );
    }

    let started = Instant::now();
    let response = dispatch(&request, backend)?;
    let elapsed_ms = started.elapsed().as_millis() as u64;
    let results = project(&response, request.search_type);

    if request.track_search && config.search.track_searches {
        track_search(backend, &request, &response, &results, elapsed_ms);
    }

    if !results.is_empty() {
        return render::search_results(&request, &response, &results, args.format);
    }

    if request.search_type == SearchType::Keyword {
        return match args.format {
            OutputFormat::Json => render::json(&response),
            _ => {
                render::no_keyword_results(
                    request.keywords.as_deref().unwrap_or_default(),
                );
                Ok(())
            }
        };
    }

    let report = diagnose(&response);
    debug!(condition = ?report.condition, "search returned nothing");
    match args.format {
        OutputFormat::Json => {
            let mut response = response;
            if let Some(map) = response.as_object_mut() {
                map.insert("diagnostics".to_string(), serde_json::to_value(&report)?);
            }
            render::json(&response)
        }
        format => render::no_results(&request, Some(&report), format),
    }
}

/// Record the search. Failures are logged and never fail the command.
fn track_search(
    backend: &LocalBackend,
    request: &SearchRequest,
    response: &Value,
    results: &[SearchResult],
    elapsed_ms: u64,
) {
    let record = SearchRecord {
        query: request.query.clone(),
        search_type: request.search_type.to_string(),
        results_count: results.len(),
        result_ids: results.iter().filter_map(|r| r.id.clone()).collect(),
        execution_time_ms: response
            .get("execution_time_ms")
            .and_then(Value::as_u64)
            .unwrap_or(elapsed_ms),
        session_id: request.session_id.clone(),
        user_id: request.user_id.clone(),
        created_at: Utc::now(),
    };
    if let Err(e) = backend.record_search(&record) {
        warn!(error = %e, "could not record search");
    }
}

// -- Documents --

fn cmd_add(args: &AddArgs, backend: &LocalBackend, quiet: bool) -> Result<()> {
    let discovery = discover(&args.paths, args.discover_options())?;
    render::unmatched_inputs(&discovery.unmatched);

    if discovery.files.is_empty() {
        println!("No files found to process.");
        return Ok(());
    }

    let show_progress = !quiet && std::io::stderr().is_terminal();
    let summary = ingest_files(backend, &discovery.files, show_progress);
    render::add_summary(&summary, args.format)?;

    if summary.added.is_empty() {
        return Err(Error::Backend(format!(
            "none of the {} file(s) could be added",
            summary.failed.len()
        )));
    }
    Ok(())
}

fn cmd_delete(id: &str, force: bool, backend: &LocalBackend) -> Result<()> {
    let doc = backend.get_document(id)?;

    if !force {
        println!(
            "Are you sure you want to delete document {} ({})? This cannot be undone.",
            doc.id, doc.title
        );
        if !confirm("Confirm deletion?")? {
            println!("Deletion cancelled.");
            return Ok(());
        }
    }

    let deleted = backend.delete_document(&doc.id)?;
    println!("Document ID {} deleted successfully.", deleted.id);
    Ok(())
}

fn confirm(question: &str) -> Result<bool> {
    print!("{question} (y/n) ");
    std::io::stdout().flush()?;
    let mut line = String::new();
    std::io::stdin().read_line(&mut line)?;
    Ok(matches!(line.trim().to_lowercase().as_str(), "y" | "yes"))
}

// -- Keywords --

fn keyword_search(
    backend: &LocalBackend,
    keywords: &[String],
    method: KeywordMethod,
    limit: usize,
    format: OutputFormat,
) -> Result<()> {
    let request = normalize(&RawSearchOptions {
        keywords: Some(keywords.join(",")),
        keywords_all: method == KeywordMethod::All,
        limit: Some(limit.to_string()),
        ..Default::default()
    })?;
    let wanted = request.keywords.clone().unwrap_or_default();

    if format == OutputFormat::Table {
        println!("Mode: {}", method.describe());
    }
    let response = dispatch(&request, backend)?;
    if project(&response, SearchType::Keyword).is_empty()
        && format != OutputFormat::Json
    {
        render::no_keyword_results(&wanted);
        return Ok(());
    }
    render::keyword_results(&response, &wanted, format)
}

fn cmd_keywords(action: KeywordsAction, backend: &LocalBackend) -> Result<()> {
    match action {
        KeywordsAction::Search {
            keywords,
            all,
            limit,
            format,
        } => keyword_search(
            backend,
            &keyword_args(&keywords),
            KeywordMethod::from_all_flag(all),
            limit,
            format,
        ),
        KeywordsAction::Find {
            keyword,
            limit,
            format,
        } => keyword_search(
            backend,
            &keyword_args(&[keyword]),
            KeywordMethod::Any,
            limit,
            format,
        ),
        KeywordsAction::List {
            limit,
            min_count,
            format,
        } => render::keyword_frequencies(
            &backend.keyword_frequencies(limit, min_count)?,
            min_count,
            format,
        ),
        KeywordsAction::Add { id, keywords } => {
            let now = backend.add_keywords(&id, &keyword_args(&keywords))?;
            println!("Added keywords to document {id}");
            println!("Document now has keywords: {}", now.join(", "));
            Ok(())
        }
        KeywordsAction::Remove { id, keywords } => {
            let now = backend.remove_keywords(&id, &keyword_args(&keywords))?;
            println!("Removed keywords from document {id}");
            println!("Document now has keywords: {}", now.join(", "));
            Ok(())
        }
        KeywordsAction::Set { id, keywords } => {
            let now = backend.set_keywords(&id, &keyword_args(&keywords))?;
            println!("Set keywords for document {id}: {}", now.join(", "));
            Ok(())
        }
        KeywordsAction::Show { id } => {
            render::document_keywords(&backend.get_document(&id)?);
            Ok(())
        }
        KeywordsAction::Stats => {
            render::keyword_stats(&backend.keyword_statistics()?);
            Ok(())
        }
    }
}

// -- Analytics --

fn cmd_analytics(action: AnalyticsAction, backend: &LocalBackend) -> Result<()> {
    match action {
        AnalyticsAction::Overview { days, format } => {
            let days: u32 = parse_number("days", &days)?;
            render::overview(&backend.search_analytics(days)?, days, format)
        }
        AnalyticsAction::History {
            limit,
            user_id,
            session_id,
            format,
        } => {
            let filter = HistoryFilter {
                user_id,
                session_id,
            };
            render::history(&backend.search_history(limit, &filter)?, format)
        }
        AnalyticsAction::Trending {
            limit,
            days,
            format,
        } => {
            let days: u32 = parse_number("days", &days)?;
            render::trending(
                &backend.trending_queries(limit, days)?,
                days,
                format,
            )
        }
        AnalyticsAction::Cleanup { days, force, .. } => {
            let days: u32 = parse_number("days", &days)?;
            let report = backend.cleanup_searches(days, !force)?;
            render::cleanup(&report, days);
            Ok(())
        }
    }
}

// -- Config --

fn cmd_config(
    action: ConfigAction,
    path: &Path,
    config: &Config,
    data_dir: Option<&Path>,
) -> Result<()> {
    match action {
        ConfigAction::Init { force } => {
            Config::init(path, force)?;
            println!("Configuration file created at: {}", path.display());
        }
        ConfigAction::Show => {
            if !path.exists() {
                println!(
                    "No configuration file at {} (showing defaults). Run 'ragdoll config init' to create one.",
                    path.display()
                );
            } else {
                println!("Configuration from: {}", path.display());
            }
            println!();
            for (key, value) in config.entries()? {
                println!("{key} = {}", display_value(&value));
            }
        }
        ConfigAction::Get { key } => {
            println!("{key} = {}", display_value(&config.get(&key)?));
        }
        ConfigAction::Set { key, value } => {
            // Reload strictly so a broken file is never overwritten.
            let mut current = Config::load(path)?;
            current.set(&key, &value)?;
            current.save(path)?;
            println!("Set {key} = {}", display_value(&current.get(&key)?));
        }
        ConfigAction::Path => println!("{}", path.display()),
        ConfigAction::Database => {
            let data_dir =
                DataDir::resolve(data_dir, config.storage.data_dir.as_deref())?;
            println!("Storage:");
            println!("  Data directory: {}", data_dir.root().display());
            println!("  Documents: {}", data_dir.documents_db().display());
            println!("  Full-text index: {}", data_dir.tantivy_dir()?.display());
            match LocalBackend::open(&data_dir, BackendSettings::from(config)) {
                Ok(backend) if backend.healthy() => {
                    println!("\nStatus: connected");
                }
                Ok(_) => println!("\nStatus: health check failed"),
                Err(e) => println!("\nStatus: error - {e}"),
            }
        }
    }
    Ok(())
}
