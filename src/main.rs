//! RepoHub - A File-Backed Repository Catalog
//!
//! This is the main entry point for the repohub command-line interface.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use repohub::catalog::{CatalogConfig, CatalogError, CatalogRegistry, RepositoryCatalog};
use repohub::model::{Aggregator, Query, QueryItem, Repository};
use repohub::storage::{ArchiveFormat, Format};

fn main() -> ExitCode {
    let args: Vec<String> = std::env::args().collect();

    // Parse simple command line args.
    let mut data_root = PathBuf::from(".repohub");
    let mut format = Format::Yaml;
    let mut verbose = false;
    let mut force = false;
    let mut positionals: Vec<String> = Vec::new();

    let mut i = 1;
    while i < args.len() {
        match args[i].as_str() {
            "-d" | "--data" => {
                i += 1;
                if i < args.len() {
                    data_root = PathBuf::from(&args[i]);
                }
            }
            "-f" | "--format" => {
                i += 1;
                if i < args.len() {
                    format = match Format::from_extension(&args[i]) {
                        Some(f) => f,
                        None => {
                            eprintln!("Unknown format: {}", args[i]);
                            return ExitCode::FAILURE;
                        }
                    };
                }
            }
            "-v" | "--verbose" => {
                verbose = true;
            }
            "--force" => {
                force = true;
            }
            "-h" | "--help" => {
                print_help();
                return ExitCode::SUCCESS;
            }
            "--version" => {
                println!("repohub v{}", env!("CARGO_PKG_VERSION"));
                return ExitCode::SUCCESS;
            }
            arg => {
                if arg.starts_with('-') {
                    eprintln!("Unknown option: {}", arg);
                    return ExitCode::FAILURE;
                }
                positionals.push(arg.to_string());
            }
        }
        i += 1;
    }

    init_tracing(verbose);

    let registry = CatalogRegistry::new();
    let catalog = match registry.open(CatalogConfig::new(&data_root).format(format)) {
        Ok(catalog) => catalog,
        Err(e) => {
            eprintln!("Error opening catalog: {}", e);
            return ExitCode::FAILURE;
        }
    };

    match run_command(&catalog, &positionals, force) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: bool) {
    let fallback = if verbose { "repohub=debug" } else { "repohub=warn" };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(fallback));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn run_command(
    catalog: &RepositoryCatalog,
    args: &[String],
    force: bool,
) -> Result<(), CatalogError> {
    let command = args.first().map(String::as_str).unwrap_or("list");
    match command {
        "list" => {
            print_repositories(&catalog.list_repositories()?);
        }
        "create" => {
            let name = required(args, 1, "create NAME")?;
            let repository = catalog.create(name)?;
            println!("created {} ({})", repository.name, repository.id);
        }
        "get" => {
            let name = required(args, 1, "get NAME")?;
            print_repository(&catalog.get_by_name(name)?);
        }
        "rename" => {
            let old = required(args, 1, "rename OLD NEW")?;
            let new = required(args, 2, "rename OLD NEW")?;
            catalog.rename(old, new)?;
            println!("renamed {} to {}", old, new);
        }
        "delete" => {
            let name = required(args, 1, "delete NAME")?;
            catalog.delete_by_name(name)?;
            println!("deleted {}", name);
        }
        "purge" => {
            let name = required(args, 1, "purge NAME")?;
            let queries = [Query::new(vec![QueryItem::new("name", name, Aggregator::Eq)])];
            let purged = catalog.purge_repositories(true, &queries)?;
            for entry in &purged {
                println!("purged {} ({})", entry.name, entry.id);
            }
            println!("({} purged)", purged.len());
        }
        "backup" => {
            let name = required(args, 1, "backup NAME ARCHIVE")?;
            let target = Path::new(required(args, 2, "backup NAME ARCHIVE")?);
            let archive_format = archive_format_for(target)?;
            let repository = catalog.get_by_name(name)?;
            catalog.backup(repository.id.as_str(), target, archive_format)?;
            println!("backed up {} to {}", repository.name, target.display());
        }
        "restore" => {
            let source = Path::new(required(args, 1, "restore ARCHIVE")?);
            let archive_format = archive_format_for(source)?;
            let scratch = catalog.restore(source, archive_format)?;
            println!("restored to {}", scratch.display());
            println!("run `repohub adopt {}` to attach it", scratch.display());
        }
        "adopt" => {
            let dir = required(args, 1, "adopt DIR")?;
            let repository = catalog.adopt(Path::new(dir), force)?;
            println!("adopted {} ({})", repository.name, repository.id);
        }
        "charts" => {
            let name = required(args, 1, "charts NAME")?;
            let manager = catalog.chart_manager_by_name(name)?;
            for chart in manager.list() {
                println!("{}\t{}\t{} version(s)", chart.name, chart.state, chart.versions.len());
            }
            println!("({} charts)", manager.list().len());
        }
        "manifests" => {
            let name = required(args, 1, "manifests NAME")?;
            let manager = catalog.manifest_manager_by_name(name)?;
            for manifest in manager.list() {
                println!(
                    "{}\t{}\t{} version(s)",
                    manifest.name,
                    manifest.state,
                    manifest.versions.len()
                );
            }
            println!("({} manifests)", manager.list().len());
        }
        other => {
            return Err(CatalogError::Validation(format!(
                "unknown command: {} (see --help)",
                other
            )));
        }
    }
    Ok(())
}

fn required<'a>(args: &'a [String], index: usize, usage: &str) -> Result<&'a str, CatalogError> {
    args.get(index)
        .map(String::as_str)
        .ok_or_else(|| CatalogError::Validation(format!("usage: repohub {}", usage)))
}

fn archive_format_for(path: &Path) -> Result<ArchiveFormat, CatalogError> {
    let name = path
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or_default();
    if name.ends_with(".zip") {
        Ok(ArchiveFormat::Zip)
    } else if name.ends_with(".tar.gz") || name.ends_with(".tgz") {
        Ok(ArchiveFormat::TarGz)
    } else {
        Err(CatalogError::Validation(format!(
            "cannot infer archive format from {} (use .zip, .tar.gz or .tgz)",
            path.display()
        )))
    }
}

fn print_repositories(repositories: &[Repository]) {
    if repositories.is_empty() {
        println!("(0 repositories)");
        return;
    }
    println!("id\tname\tstate\tcharts\tmanifests");
    for repo in repositories {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            repo.id,
            repo.name,
            repo.state,
            repo.charts.len(),
            repo.manifests.len()
        );
    }
    println!("({} repositories)", repositories.len());
}

fn print_repository(repository: &Repository) {
    println!("id:        {}", repository.id);
    println!("name:      {}", repository.name);
    println!("state:     {}", repository.state);
    println!("charts:    {}", repository.charts.len());
    for chart in &repository.charts {
        println!("  - {} ({})", chart.name, chart.state);
    }
    println!("manifests: {}", repository.manifests.len());
    for manifest in &repository.manifests {
        println!("  - {} ({})", manifest.name, manifest.state);
    }
}

fn print_help() {
    println!("RepoHub - A File-Backed Repository Catalog");
    println!();
    println!("Usage: repohub [OPTIONS] COMMAND [ARGS]");
    println!();
    println!("Options:");
    println!("  -d, --data PATH        Path to the data directory (default: .repohub)");
    println!("  -f, --format FORMAT    Index format: yaml, json or xml (default: yaml)");
    println!("      --force            Replace an existing repository on adopt");
    println!("  -v, --verbose          Enable verbose output");
    println!("  -h, --help             Show this help message");
    println!("  --version              Show version");
    println!();
    println!("Commands:");
    println!("  list                   List repositories");
    println!("  create NAME            Create an empty repository");
    println!("  get NAME               Show one repository with its collections");
    println!("  rename OLD NEW         Rename a repository");
    println!("  delete NAME            Delete a repository and its files");
    println!("  purge NAME             Purge repositories matching the name");
    println!("  backup NAME ARCHIVE    Compress a repository into a .zip or .tar.gz");
    println!("  restore ARCHIVE        Unpack an archive into a scratch directory");
    println!("  adopt DIR              Attach a restored directory to the catalog");
    println!("  charts NAME            List the charts of a repository");
    println!("  manifests NAME         List the manifests of a repository");
    println!();
    println!("Examples:");
    println!("  repohub create 'team charts'");
    println!("  repohub backup team-charts team-charts.zip");
    println!("  repohub -f json -d ./data list");
}
