use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;
use ragdoll::{
    listing::{DEFAULT_LIST_LIMIT, ListOptions},
    request::{RawSearchOptions, split_list},
    walker::{DiscoverOptions, FileType},
};

#[derive(Debug, Parser)]
#[command(
    name = "ragdoll",
    version,
    about = "Manage and search a local document retrieval store"
)]
pub struct Cli {
    /// Override the data directory
    #[arg(long, global = true)]
    pub data_dir: Option<PathBuf>,

    /// Use this config file instead of ~/.ragdoll/config.yml
    #[arg(long = "config", global = true)]
    pub config_file: Option<PathBuf>,

    /// Increase log verbosity (can be repeated: -v, -vv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log warnings and errors; hide progress bars
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
    Plain,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Search for documents matching a query
    Search(SearchArgs),
    /// Add files, directories or glob patterns
    Add(AddArgs),
    /// List stored documents
    List(ListArgs),
    /// Show a document's details
    Show(ShowArgs),
    /// Show a document's processing status
    Status(ShowArgs),
    /// Update document metadata
    Update(UpdateArgs),
    /// Delete a document
    Delete(DeleteArgs),
    /// Show document and embedding statistics
    Stats(FormatArgs),
    /// Check that the store is reachable
    Health,
    /// Show version information
    Version,
    /// Print the chunks most relevant to a query
    Context(ContextArgs),
    /// Wrap a prompt with relevant context
    Enhance(EnhanceArgs),
    /// Manage and search document keywords
    Keywords {
        #[command(subcommand)]
        action: KeywordsAction,
    },
    /// Review tracked searches
    Analytics {
        #[command(subcommand)]
        action: AnalyticsAction,
    },
    /// Manage the configuration file
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Generate shell completions
    #[command(hide = true)]
    Completions(CompletionsArgs),
}

// -- Search --

#[derive(Debug, Parser)]
pub struct SearchArgs {
    /// The search query (may be omitted when --keywords is given)
    pub query: Option<String>,

    /// Maximum number of results [default: search.max_results]
    #[arg(short, long, allow_negative_numbers = true)]
    pub limit: Option<String>,

    /// Minimum similarity, usually between 0 and 1
    #[arg(long, allow_negative_numbers = true)]
    pub threshold: Option<String>,

    /// Filter by content type (text, markdown, html)
    #[arg(short = 'c', long)]
    pub content_type: Option<String>,

    /// Filter by classification
    #[arg(short = 'C', long)]
    pub classification: Option<String>,

    /// Filter by keywords (comma-separated)
    #[arg(short, long)]
    pub keywords: Option<String>,

    /// Require every keyword to match (AND) instead of any (OR)
    #[arg(long)]
    pub keywords_all: bool,

    /// Filter by tags (comma-separated, all must match)
    #[arg(short = 'T', long)]
    pub tags: Option<String>,

    /// semantic, hybrid, fulltext or keyword
    #[arg(long)]
    pub search_type: Option<String>,

    /// Weight of semantic similarity in hybrid search
    #[arg(long, allow_negative_numbers = true)]
    pub semantic_weight: Option<String>,

    /// Weight of full-text relevance in hybrid search
    #[arg(long, allow_negative_numbers = true)]
    pub text_weight: Option<String>,

    #[arg(long)]
    pub session_id: Option<String>,

    #[arg(long)]
    pub user_id: Option<String>,

    /// Record this search in the analytics log
    #[arg(long, overrides_with = "no_track_search")]
    pub track_search: bool,

    /// Do not record this search
    #[arg(long, overrides_with = "track_search")]
    pub no_track_search: bool,

    #[arg(short, long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

impl SearchArgs {
    /// Raw options for the normalizer. `default_limit` applies when
    /// `--limit` was not given.
    pub fn to_raw(&self, default_limit: usize) -> RawSearchOptions {
        let track_search = if self.no_track_search {
            Some(false)
        } else if self.track_search {
            Some(true)
        } else {
            None
        };

        RawSearchOptions {
            query: self.query.clone().unwrap_or_default(),
            search_type: self.search_type.clone(),
            limit: Some(
                self.limit
                    .clone()
                    .unwrap_or_else(|| default_limit.to_string()),
            ),
            threshold: self.threshold.clone(),
            content_type: self.content_type.clone(),
            classification: self.classification.clone(),
            keywords: self.keywords.clone(),
            keywords_all: self.keywords_all,
            tags: self.tags.clone(),
            semantic_weight: self.semantic_weight.clone(),
            text_weight: self.text_weight.clone(),
            session_id: self.session_id.clone(),
            user_id: self.user_id.clone(),
            track_search,
        }
    }
}

// -- Documents --

#[derive(Debug, Parser)]
pub struct AddArgs {
    /// Files, directories or glob patterns
    #[arg(required = true)]
    pub paths: Vec<String>,

    /// Do not descend into subdirectories
    #[arg(long)]
    pub no_recursive: bool,

    /// Only add files of this type
    #[arg(short = 't', long = "type", value_enum)]
    pub file_type: Option<FileType>,

    #[arg(short, long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

impl AddArgs {
    pub fn discover_options(&self) -> DiscoverOptions {
        DiscoverOptions {
            recursive: !self.no_recursive,
            only: self.file_type,
        }
    }
}

#[derive(Debug, Parser)]
pub struct ListArgs {
    /// Maximum number of documents to list
    #[arg(short, long, default_value_t = DEFAULT_LIST_LIMIT)]
    pub limit: usize,

    /// Only list documents carrying these keywords (comma-separated)
    #[arg(short, long)]
    pub keywords: Option<String>,

    /// Require every keyword (AND) instead of any (OR)
    #[arg(long)]
    pub keywords_all: bool,

    #[arg(short, long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

impl ListArgs {
    pub fn options(&self) -> ListOptions {
        ListOptions {
            limit: self.limit,
            keywords: self.keywords.as_deref().and_then(split_list),
            keywords_all: self.keywords_all,
        }
    }
}

#[derive(Debug, Parser)]
pub struct ShowArgs {
    /// Document id or a unique prefix of it
    pub id: String,

    #[arg(short, long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(Debug, Parser)]
pub struct UpdateArgs {
    pub id: String,

    #[arg(long)]
    pub title: Option<String>,

    /// New classification; an empty value clears it
    #[arg(long)]
    pub classification: Option<String>,

    /// Replace tags (comma-separated)
    #[arg(long)]
    pub tags: Option<String>,
}

#[derive(Debug, Parser)]
pub struct DeleteArgs {
    pub id: String,

    /// Delete without asking for confirmation
    #[arg(short, long)]
    pub force: bool,
}

#[derive(Debug, Parser)]
pub struct FormatArgs {
    #[arg(short, long, value_enum, default_value_t)]
    pub format: OutputFormat,
}

#[derive(Debug, Parser)]
pub struct ContextArgs {
    pub query: String,

    /// Maximum number of context chunks
    #[arg(short, long, default_value = "5")]
    pub limit: usize,
}

#[derive(Debug, Parser)]
pub struct EnhanceArgs {
    pub prompt: String,

    /// Number of context chunks to include
    #[arg(short, long, default_value = "5")]
    pub limit: usize,
}

// -- Keywords --

#[derive(Debug, Subcommand)]
pub enum KeywordsAction {
    /// Search documents by keywords only
    Search {
        /// Keywords (separate arguments or comma-separated)
        #[arg(required = true)]
        keywords: Vec<String>,
        /// Require ALL keywords to match (default: any)
        #[arg(short, long)]
        all: bool,
        #[arg(short, long, default_value = "20")]
        limit: usize,
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Find documents carrying one keyword
    Find {
        keyword: String,
        #[arg(short, long, default_value = "20")]
        limit: usize,
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// List keywords in use with their document counts
    List {
        #[arg(short, long, default_value = "100")]
        limit: usize,
        /// Only keywords used by at least this many documents
        #[arg(short, long, default_value = "1")]
        min_count: usize,
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Add keywords to a document
    Add {
        id: String,
        #[arg(required = true)]
        keywords: Vec<String>,
    },
    /// Remove keywords from a document
    Remove {
        id: String,
        #[arg(required = true)]
        keywords: Vec<String>,
    },
    /// Replace a document's keywords
    Set {
        id: String,
        #[arg(required = true)]
        keywords: Vec<String>,
    },
    /// Show a document's keywords
    Show { id: String },
    /// Show keyword usage statistics
    Stats,
}

/// Flatten keyword arguments, splitting any that hold comma lists.
pub fn keyword_args(raw: &[String]) -> Vec<String> {
    raw.iter()
        .filter_map(|k| split_list(k))
        .flatten()
        .collect()
}

// -- Analytics --

#[derive(Debug, Subcommand)]
pub enum AnalyticsAction {
    /// Summary of recent searches
    Overview {
        #[arg(short, long, default_value = "30", allow_negative_numbers = true)]
        days: String,
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Recent searches, newest first
    History {
        #[arg(short, long, default_value = "20")]
        limit: usize,
        #[arg(short, long)]
        user_id: Option<String>,
        #[arg(short, long)]
        session_id: Option<String>,
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Most repeated queries
    Trending {
        #[arg(short, long, default_value = "10")]
        limit: usize,
        #[arg(short, long, default_value = "7", allow_negative_numbers = true)]
        days: String,
        #[arg(short, long, value_enum, default_value_t)]
        format: OutputFormat,
    },
    /// Remove old unused or orphaned search records
    Cleanup {
        /// Only consider searches older than this many days
        #[arg(short, long, default_value = "30", allow_negative_numbers = true)]
        days: String,
        /// Report without deleting (the default)
        #[arg(short = 'n', long)]
        dry_run: bool,
        /// Actually delete the records
        #[arg(short, long, conflicts_with = "dry_run")]
        force: bool,
    },
}

// -- Config --

#[derive(Debug, Subcommand)]
pub enum ConfigAction {
    /// Write a default configuration file
    Init {
        /// Overwrite an existing file
        #[arg(short, long)]
        force: bool,
    },
    /// Print every setting
    Show,
    /// Print one setting (dotted key, e.g. search.max_results)
    Get { key: String },
    /// Change one setting
    Set { key: String, value: String },
    /// Print the configuration file path
    Path,
    /// Show the storage location and whether it is reachable
    Database,
}

// -- Completions --

#[derive(Debug, Parser)]
pub struct CompletionsArgs {
    /// Shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

impl CompletionsArgs {
    /// Generate shell completions and print to stdout.
    pub fn generate(&self) {
        let mut cmd = Cli::command();
        clap_complete::generate(
            self.shell,
            &mut cmd,
            "ragdoll",
            &mut std::io::stdout(),
        );
    }
}
