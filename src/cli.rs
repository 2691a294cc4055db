//! Command-line interface for repograph.

use std::future::Future;
use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand};
use tracing::{info, warn};

use crate::ai::{AiAnalyzer, OpenAiCompatibleClient};
use crate::analysis::{
    analyze_repository, detect_all_languages, detect_language, AnalysisResult, AnalyzeOptions,
    Language,
};
use crate::config::Config;
use crate::integration::integrate_analysis;
use crate::report;
use crate::store::KnowledgeStore;

/// Exit codes.
pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILED: i32 = 1;
pub const EXIT_ERROR: i32 = 2;

/// Map a repository into a knowledge graph of services, APIs and schemas.
///
/// Repograph reads a checked-out repository, extracts data models, API
/// endpoints, side effects, configuration keys and dependencies, and
/// stores them as typed entities and relations.
#[derive(Parser)]
#[command(name = "repograph")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Log at debug level (RUST_LOG overrides)
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Extract facts from a repository and print them
    Analyze(AnalyzeArgs),
    /// Analyze a repository and add it to a knowledge store
    Build(BuildArgs),
    /// Print the languages detected in a repository
    Detect(DetectArgs),
    /// Print statistics of a knowledge store
    Stats(StatsArgs),
    /// Print the Terraform resource graph as Mermaid
    Diagram(DiagramArgs),
}

/// Options shared by commands that run the analyzers.
#[derive(Parser)]
pub struct SourceArgs {
    /// Repository checkout to analyze
    pub path: PathBuf,

    /// Path to config YAML file (default: auto-discover)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Hosted repository URL used for source links
    #[arg(long)]
    pub base_url: Option<String>,

    /// Branch used in source links
    #[arg(long)]
    pub branch: Option<String>,

    /// Analyze these languages instead of detecting them
    #[arg(short, long = "language")]
    pub languages: Vec<String>,

    /// Also ask a language model to read the sources
    #[arg(long)]
    pub ai: bool,
}

/// Arguments for the analyze command.
#[derive(Parser)]
pub struct AnalyzeArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Output format: pretty or json
    #[arg(short, long, default_value = "pretty")]
    pub format: String,
}

/// Arguments for the build command.
#[derive(Parser)]
pub struct BuildArgs {
    #[command(flatten)]
    pub source: SourceArgs,

    /// Store directory (default: <path>/.repograph or config store_dir)
    #[arg(short, long)]
    pub store: Option<PathBuf>,

    /// Service name (default: repository directory name)
    #[arg(short, long)]
    pub name: Option<String>,
}

#[derive(Parser)]
pub struct DetectArgs {
    pub path: PathBuf,
}

#[derive(Parser)]
pub struct StatsArgs {
    /// Store directory
    #[arg(short, long, default_value = ".repograph")]
    pub store: PathBuf,
}

#[derive(Parser)]
pub struct DiagramArgs {
    pub path: PathBuf,
}

/// Everything resolved from arguments and config before analysis.
struct Prepared {
    root: PathBuf,
    config: Config,
    config_path: Option<PathBuf>,
    options: AnalyzeOptions,
    ai: bool,
}

fn prepare(args: &SourceArgs) -> anyhow::Result<Option<Prepared>> {
    let root = match args.path.canonicalize() {
        Ok(p) => p,
        Err(e) => {
            eprintln!("Error: cannot access path {:?}: {}", args.path, e);
            return Ok(None);
        }
    };
    if !root.is_dir() {
        eprintln!("Error: not a directory: {}", root.display());
        return Ok(None);
    }

    let (config, config_path) = match Config::load(args.config.as_deref(), &root) {
        Ok(loaded) => loaded,
        Err(e) => {
            eprintln!("Error: {}", e);
            return Ok(None);
        }
    };

    let mut options = config.analyze_options()?;
    if args.base_url.is_some() {
        options.base_url = args.base_url.clone();
    }
    if args.branch.is_some() {
        options.branch = args.branch.clone();
    }
    if !args.languages.is_empty() {
        let mut languages = Vec::new();
        for name in &args.languages {
            match name.parse::<Language>() {
                Ok(language) => languages.push(language),
                Err(e) => {
                    eprintln!("Error: {}", e);
                    return Ok(None);
                }
            }
        }
        options.languages = languages;
    }

    let ai = args.ai || config.ai.enabled;
    Ok(Some(Prepared {
        root,
        config,
        config_path,
        options,
        ai,
    }))
}

/// Pattern analysis, plus model-assisted analysis when enabled.
async fn analyze(prepared: &Prepared) -> anyhow::Result<AnalysisResult> {
    let root = prepared.root.clone();
    let options = prepared.options.clone();
    let result = tokio::task::spawn_blocking(move || analyze_repository(&root, &options)).await?;
    if !prepared.ai {
        return Ok(result);
    }

    let ai = &prepared.config.ai;
    let client = OpenAiCompatibleClient::new(&ai.endpoint, &ai.model, ai.api_key(), ai.timeout())?;
    let language = detect_language(&prepared.root)
        .map(|l| l.as_str().to_string())
        .unwrap_or_else(|| "unknown".to_string());
    let analyzer = AiAnalyzer::new(
        prepared.options.context(&prepared.root),
        language,
        client,
        ai.options(),
    );
    let mut assisted = analyzer.analyze().await;
    // Manifests were already read by the pattern pass.
    assisted.dependencies.clear();
    Ok(result.merge(assisted))
}

fn block_on<F: Future>(future: F) -> anyhow::Result<F::Output> {
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    Ok(runtime.block_on(future))
}

fn exit_for(result: &AnalysisResult) -> i32 {
    if result.errors.is_empty() {
        EXIT_SUCCESS
    } else {
        EXIT_FAILED
    }
}

/// Run the analyze command.
pub fn run_analyze(args: &AnalyzeArgs) -> anyhow::Result<i32> {
    if args.format != "pretty" && args.format != "json" {
        eprintln!("Error: invalid format {:?}, must be 'pretty' or 'json'", args.format);
        return Ok(EXIT_ERROR);
    }
    let Some(prepared) = prepare(&args.source)? else {
        return Ok(EXIT_ERROR);
    };

    let result = block_on(analyze(&prepared))??;

    let path_str = args.source.path.to_string_lossy().to_string();
    match args.format.as_str() {
        "json" => report::write_json(&path_str, &result)?,
        _ => {
            let config_str = prepared
                .config_path
                .as_ref()
                .map(|p| p.to_string_lossy().to_string());
            report::write_pretty(&path_str, config_str.as_deref(), &result);
        }
    }

    Ok(exit_for(&result))
}

/// Run the build command.
pub fn run_build(args: &BuildArgs) -> anyhow::Result<i32> {
    let Some(prepared) = prepare(&args.source)? else {
        return Ok(EXIT_ERROR);
    };
    let store_dir = args
        .store
        .clone()
        .unwrap_or_else(|| prepared.config.store_dir(&prepared.root));
    let name = args.name.clone().unwrap_or_else(|| service_name(&prepared.root));

    block_on(async {
        let result = analyze(&prepared).await?;

        let mut store = KnowledgeStore::new(&store_dir);
        store.load().await;
        let summary = integrate_analysis(
            store.graph_mut(),
            &name,
            prepared.options.base_url.as_deref(),
            &result,
        );
        store.save().await?;
        info!(
            service = %summary.service_id,
            schemas = summary.schemas,
            endpoints = summary.endpoints,
            integrations = summary.integrations,
            infrastructure = summary.infrastructure,
            store = %store_dir.display(),
            "service added to knowledge store"
        );
        if !result.errors.is_empty() {
            warn!(errors = result.errors.len(), "analysis finished with errors");
        }

        let checkpoints = store.list_checkpoints().await.unwrap_or_default();
        report::write_stats(
            &store_dir.to_string_lossy(),
            &store.graph().get_statistics(),
            store.documents().count(),
            &checkpoints,
        );
        Ok::<_, anyhow::Error>(exit_for(&result))
    })?
}

/// Run the detect command.
pub fn run_detect(args: &DetectArgs) -> anyhow::Result<i32> {
    if !args.path.is_dir() {
        eprintln!("Error: not a directory: {}", args.path.display());
        return Ok(EXIT_ERROR);
    }
    let primary = detect_language(&args.path);
    let all = detect_all_languages(&args.path);
    report::write_detect(&args.path.to_string_lossy(), primary, &all);

    Ok(if primary.is_some() {
        EXIT_SUCCESS
    } else {
        EXIT_FAILED
    })
}

/// Run the stats command.
pub fn run_stats(args: &StatsArgs) -> anyhow::Result<i32> {
    if !args.store.is_dir() {
        eprintln!("Error: no knowledge store at {}", args.store.display());
        return Ok(EXIT_ERROR);
    }

    block_on(async {
        let mut store = KnowledgeStore::new(&args.store);
        store.load().await;
        let checkpoints = store.list_checkpoints().await?;
        report::write_stats(
            &args.store.to_string_lossy(),
            &store.graph().get_statistics(),
            store.documents().count(),
            &checkpoints,
        );
        Ok::<_, anyhow::Error>(EXIT_SUCCESS)
    })?
}

/// Run the diagram command.
pub fn run_diagram(args: &DiagramArgs) -> anyhow::Result<i32> {
    if !args.path.is_dir() {
        eprintln!("Error: not a directory: {}", args.path.display());
        return Ok(EXIT_ERROR);
    }
    let options = AnalyzeOptions {
        languages: vec![Language::Terraform],
        ..AnalyzeOptions::default()
    };
    let result = analyze_repository(&args.path, &options);

    match result.infrastructure.filter(|d| !d.is_empty()) {
        Some(diagram) => {
            println!("{}", diagram.to_mermaid());
            Ok(EXIT_SUCCESS)
        }
        None => {
            eprintln!("No Terraform resources found in {}", args.path.display());
            Ok(EXIT_FAILED)
        }
    }
}

/// Service name derived from the repository directory.
fn service_name(root: &Path) -> String {
    root.file_name()
        .map(|n| n.to_string_lossy().to_string())
        .filter(|n| !n.is_empty())
        .unwrap_or_else(|| "service".to_string())
}
