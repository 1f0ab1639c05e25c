mod logging;
mod output;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use hashfind_core::{
    CatalogSource, Config, ContentHash, DirSource, HttpSource, IndexHandle, IndexStore, Manifest,
    Resolution, split_object_url,
};
use output::{
    BuildOutput, FindOutput, IndexInfo, InitOutput, LsOutput, OutputWriter, UnresolvedInfo,
    VerifyOutput,
};
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use std::time::Duration;

/// Result code for failed commands.
const EXIT_FAILURE: u8 = 1;
/// Result code for an index that fails verification.
const EXIT_UNVERIFIED: u8 = 2;

/// Hashfind - find the paths of a content hash in a catalog tree
#[derive(Parser)]
#[command(name = "hashfind")]
#[command(about = "Index catalog trees and find every path holding a content hash", long_about = None)]
#[command(version)]
struct Cli {
    /// Store root directory (defaults to HASHFIND_ROOT env var or ./hashfind-store)
    #[arg(short, long, global = true)]
    root: Option<PathBuf>,

    /// Print results as JSON
    #[arg(long, global = true)]
    json: bool,

    /// Increase log verbosity (-v info, -vv debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Initialize a new index store
    Init {
        /// Indexing threads (0 = one per CPU)
        #[arg(long, default_value_t = 0)]
        jobs: usize,

        /// Timeout for HTTP requests, in seconds
        #[arg(long, default_value_t = 30)]
        timeout_secs: u64,

        /// Do not cache fetched catalogs
        #[arg(long)]
        no_cache: bool,
    },

    /// Index a repository and publish the result
    Build {
        /// Repository URL or local mirror directory
        repo: String,

        /// Root catalog hash (defaults to the repository manifest's)
        #[arg(long)]
        root_hash: Option<String>,

        /// Rebuild even if an index for this root is already published
        #[arg(long)]
        force: bool,
    },

    /// Print every path holding a content hash
    Find {
        /// Content hash, or an object URL of the form <repo>/data/xx/yyyy
        target: String,

        /// Repository URL or local mirror directory
        #[arg(long)]
        repo: Option<String>,

        /// Use the published index for this root catalog hash
        #[arg(long, conflicts_with = "repo")]
        index: Option<String>,
    },

    /// List published indexes
    Ls,

    /// Check that every record of a published index resolves to a path
    Verify {
        /// Root catalog hash of the index
        root_hash: String,
    },
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    logging::init_logging(cli.verbose);

    let output = OutputWriter::new(cli.json);

    // Determine store root: CLI arg > HASHFIND_ROOT env var > ./hashfind-store default
    let root = cli
        .root
        .or_else(|| std::env::var("HASHFIND_ROOT").ok().map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from("./hashfind-store"));

    let result = match cli.command {
        Commands::Init {
            jobs,
            timeout_secs,
            no_cache,
        } => cmd_init(&output, &root, jobs, timeout_secs, !no_cache),
        Commands::Build {
            repo,
            root_hash,
            force,
        } => cmd_build(&output, &root, &repo, root_hash.as_deref(), force),
        Commands::Find {
            target,
            repo,
            index,
        } => cmd_find(&output, &root, &target, repo, index.as_deref()),
        Commands::Ls => cmd_ls(&output, &root),
        Commands::Verify { root_hash } => cmd_verify(&output, &root, &root_hash),
    };

    match result {
        Ok(0) => ExitCode::SUCCESS,
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            output.write_error(&e, EXIT_FAILURE);
            ExitCode::from(EXIT_FAILURE)
        }
    }
}

/// A repository to index: remote over HTTP(S) or a local mirror.
enum Repository {
    Http(HttpSource),
    Mirror(DirSource),
}

impl Repository {
    fn open(location: &str, config: &Config) -> Result<Self> {
        if location.starts_with("http://") || location.starts_with("https://") {
            let source = HttpSource::new(location, config.timeout)
                .with_context(|| format!("Failed to set up HTTP source for {}", location))?;
            Ok(Repository::Http(source))
        } else {
            let source = DirSource::open(location)
                .with_context(|| format!("Failed to open mirror at {}", location))?;
            Ok(Repository::Mirror(source))
        }
    }

    fn manifest(&self) -> hashfind_core::Result<Manifest> {
        match self {
            Repository::Http(source) => source.manifest(),
            Repository::Mirror(source) => source.manifest(),
        }
    }

    fn into_source(self) -> Box<dyn CatalogSource> {
        match self {
            Repository::Http(source) => Box::new(source),
            Repository::Mirror(source) => Box::new(source),
        }
    }
}

fn open_store(root: &Path) -> Result<IndexStore> {
    IndexStore::open(root).with_context(|| format!("Failed to open store at {}", root.display()))
}

fn parse_hash(hash_str: &str) -> Result<ContentHash> {
    ContentHash::from_hex(hash_str).with_context(|| format!("Invalid hash: {}", hash_str))
}

/// Root catalog hash to index: explicit, or the repository's current revision.
fn root_catalog(repo: &Repository, location: &str, explicit: Option<&str>) -> Result<ContentHash> {
    match explicit {
        Some(hash_str) => parse_hash(hash_str),
        None => {
            let manifest = repo
                .manifest()
                .with_context(|| format!("Failed to read manifest of {}", location))?;
            tracing::info!(
                repository = location,
                root = %manifest.root_catalog,
                revision = ?manifest.revision,
                "read manifest"
            );
            Ok(manifest.root_catalog)
        }
    }
}

/// Open `location` and get an index for `root_hash` (or the manifest's root).
fn index_repository(
    store: &IndexStore,
    location: &str,
    root_hash: Option<&str>,
    force: bool,
) -> Result<IndexHandle> {
    let repo = Repository::open(location, store.config())?;
    let root = root_catalog(&repo, location, root_hash)?;

    let source = repo.into_source();
    let source: Box<dyn CatalogSource> = if store.config().cache {
        Box::new(
            store
                .cached_source(source)
                .with_context(|| "Failed to open catalog cache")?,
        )
    } else {
        source
    };

    let handle = if force {
        store.rebuild_index(&source, root)
    } else {
        store.build_index(&source, root)
    };
    handle.with_context(|| format!("Failed to index {} at root {}", location, root))
}

fn cmd_init(
    output: &OutputWriter,
    root: &Path,
    jobs: usize,
    timeout_secs: u64,
    cache: bool,
) -> Result<u8> {
    let config = Config {
        jobs,
        timeout: Duration::from_secs(timeout_secs),
        cache,
    };

    IndexStore::init_with(root, config)
        .with_context(|| format!("Failed to initialize store at {}", root.display()))?;

    let data = InitOutput {
        success: true,
        result_code: 0,
        root: root.display().to_string(),
        jobs,
        timeout_secs,
        cache,
    };

    output.write(&data, || {
        format!(
            "Initialized hashfind store at {}\nJobs: {}\nCache: {}\n",
            root.display(),
            if jobs == 0 {
                "auto".to_string()
            } else {
                jobs.to_string()
            },
            if cache { "on" } else { "off" }
        )
    })?;

    Ok(0)
}

fn cmd_build(
    output: &OutputWriter,
    root: &Path,
    repo: &str,
    root_hash: Option<&str>,
    force: bool,
) -> Result<u8> {
    let store = open_store(root)?;
    let handle = index_repository(&store, repo, root_hash, force)?;

    let data = BuildOutput {
        success: true,
        result_code: 0,
        repository: repo.to_string(),
        root_hash: handle.root(),
        reused: handle.reused(),
        records: handle.index().len(),
        index_path: store.index_path(&handle.root()).display().to_string(),
    };

    output.write(&data, || {
        let verb = if data.reused { "Reused" } else { "Built" };
        format!(
            "{} index for {} ({} records)\n{}\n",
            verb, data.root_hash, data.records, data.index_path
        )
    })?;

    Ok(0)
}

fn cmd_find(
    output: &OutputWriter,
    root: &Path,
    target: &str,
    repo: Option<String>,
    index: Option<&str>,
) -> Result<u8> {
    let store = open_store(root)?;

    // An object URL names both the content and the repository serving it.
    let (target, repo) = if target.contains("/data/") {
        let (url_repo, hash) =
            split_object_url(target).with_context(|| format!("Invalid object URL: {}", target))?;
        (hash, repo.or(Some(url_repo)))
    } else {
        (parse_hash(target)?, repo)
    };

    let (root_hash, resolution) = match (index, repo) {
        (Some(index_hash), _) => {
            let root_hash = parse_hash(index_hash)?;

            // Skip loading the whole index when the artifact has no candidate.
            let candidates = store
                .prefilter(&root_hash, &target)
                .with_context(|| format!("Failed to scan index {}", root_hash))?;
            if candidates.is_empty() {
                (root_hash, Resolution::default())
            } else {
                let index = store
                    .load(&root_hash)
                    .with_context(|| format!("Failed to load index {}", root_hash))?;
                (root_hash, IndexHandle::new(index, true).resolve_all(&target))
            }
        }
        (None, Some(location)) => {
            let handle = index_repository(&store, &location, None, false)?;
            (handle.root(), handle.resolve_all(&target))
        }
        (None, None) => {
            anyhow::bail!("No repository given: pass --repo, --index, or an object URL")
        }
    };

    let data = FindOutput {
        success: true,
        result_code: 0,
        target,
        root_hash,
        paths: resolution.paths,
        unresolved: resolution.failures.iter().map(UnresolvedInfo::from).collect(),
    };

    output.write(&data, || {
        let mut text = String::new();
        for path in &data.paths {
            let _ = writeln!(text, "{}", path);
        }
        text
    })?;

    Ok(0)
}

fn cmd_ls(output: &OutputWriter, root: &Path) -> Result<u8> {
    let store = open_store(root)?;

    let indexes: Vec<IndexInfo> = store
        .list()
        .with_context(|| "Failed to list published indexes")?
        .into_iter()
        .map(IndexInfo::from)
        .collect();

    let data = LsOutput {
        success: true,
        result_code: 0,
        indexes,
    };

    output.write(&data, || {
        if data.indexes.is_empty() {
            return "No published indexes (use 'hashfind build' to create one)\n".to_string();
        }

        let mut text = String::new();
        for info in &data.indexes {
            let modified = info
                .modified
                .map(|t| t.format("%Y-%m-%d %H:%M:%S").to_string())
                .unwrap_or_else(|| "-".to_string());
            let _ = writeln!(text, "{} {:>10} {}", info.root_hash, info.size, modified);
        }
        text
    })?;

    Ok(0)
}

fn cmd_verify(output: &OutputWriter, root: &Path, root_hash: &str) -> Result<u8> {
    let store = open_store(root)?;
    let root_hash = parse_hash(root_hash)?;

    let index = store
        .load(&root_hash)
        .with_context(|| format!("Failed to load index {}", root_hash))?;
    index
        .check_parents()
        .with_context(|| format!("Index {} has dangling entries", root_hash))?;

    let report = IndexHandle::new(index, true).verify();
    let result_code = if report.is_ok() { 0 } else { EXIT_UNVERIFIED };

    let data = VerifyOutput {
        success: report.is_ok(),
        result_code,
        root_hash,
        records: report.records,
        directories: report.directories,
        files: report.files,
        failures: report.failures.iter().map(UnresolvedInfo::from).collect(),
    };

    output.write(&data, || {
        let mut text = format!(
            "Root: {}\nRecords: {} ({} directories, {} files)\n",
            data.root_hash, data.records, data.directories, data.files
        );
        if data.failures.is_empty() {
            text.push_str("All records resolve\n");
        } else {
            for failure in &data.failures {
                let _ = writeln!(
                    text,
                    "unresolved {} {:?}: {}",
                    failure.path_hash, failure.name, failure.error
                );
            }
        }
        text
    })?;

    Ok(result_code)
}
