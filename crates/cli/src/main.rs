//! snapback CLI - deduplicating local file backups

use anyhow::Result;
use clap::{ArgMatches, Args, CommandFactory, FromArgMatches, Parser, Subcommand};
use snapback_core::{FilterConfig, RunOptions, DEFAULT_ARCHIVE};
use std::path::PathBuf;

mod cmd;
mod util;

/// Snapback - deduplicated snapshot backups for local folders
#[derive(Parser)]
#[command(name = "snapback")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Verbose diagnostics
    #[arg(long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

/// Filter options shared by the scanning commands. Exclusive and inclusive
/// filters of the same family are applied in command-line order, so
/// `--exclude "*/" --include /A/B/` behaves differently from the reverse.
#[derive(Args)]
struct FilterArgs {
    /// Exclude folders matching this glob (repeatable)
    #[arg(long, value_name = "FOLDER_FILTER")]
    exclude: Vec<String>,

    /// Put a folder subtree back in scope, ancestors included (repeatable)
    #[arg(long, value_name = "FOLDER")]
    include: Vec<String>,

    /// Exclude files matching this glob (repeatable)
    #[arg(long, value_name = "FILE_FILTER")]
    ignore: Vec<String>,

    /// Put files matching this glob back in scope (repeatable)
    #[arg(long, value_name = "FILE_FILTER")]
    keep: Vec<String>,

    /// Only operate on files matching at least one of these globs
    #[arg(long, value_name = "FILE_FILTER")]
    select: Vec<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Back up a data folder into a repository archive
    Backup {
        /// Folder to back up
        data_folder: PathBuf,
        /// Repository folder (created on first use)
        repository: PathBuf,
        /// Archive name: alphanumeric or '_' (default: DEFAULT)
        archive: Option<String>,

        #[command(flatten)]
        filters: FilterArgs,

        /// Abort on the first per-file error instead of continuing
        #[arg(long)]
        abort: bool,
    },
    /// Verify that a snapshot's blobs are present with the recorded sizes
    Check {
        /// Data folder (accepted for symmetry; not read)
        data_folder: PathBuf,
        /// Repository folder
        repository: PathBuf,
        /// Archive name (default: DEFAULT)
        archive: Option<String>,
        /// Snapshot name (default: most recent)
        snapshot: Option<String>,
    },
    /// Compare a snapshot against the live data folder
    Compare {
        /// Data folder to compare against
        data_folder: PathBuf,
        /// Repository folder
        repository: PathBuf,
        /// Archive name (default: DEFAULT)
        archive: Option<String>,
        /// Snapshot name (default: most recent)
        snapshot: Option<String>,

        #[command(flatten)]
        filters: FilterArgs,

        /// Reserved: mtime tolerance in seconds (parsed, not consulted)
        #[arg(long, value_name = "SECONDS")]
        precision: Option<f64>,
    },
    /// Restore a snapshot into the data folder, pruning extraneous entries
    Restore {
        /// Data folder to restore into
        data_folder: PathBuf,
        /// Repository folder
        repository: PathBuf,
        /// Archive name (default: DEFAULT)
        archive: Option<String>,
        /// Snapshot name (default: most recent)
        snapshot: Option<String>,

        #[command(flatten)]
        filters: FilterArgs,

        /// Abort on the first per-file error instead of continuing
        #[arg(long)]
        abort: bool,

        /// Reserved: mtime tolerance in seconds (parsed, not consulted)
        #[arg(long, value_name = "SECONDS")]
        precision: Option<f64>,
    },
    /// Show details of the snapshots matching the globs
    Find {
        /// Repository folder
        repository: PathBuf,
        /// Archive name glob (default: all archives)
        archive_glob: Option<String>,
        /// Snapshot name glob (default: all snapshots)
        snapshot_glob: Option<String>,
    },
    /// List archives and their snapshot names
    List {
        /// Repository folder
        repository: PathBuf,
        /// Archive name glob (default: all archives)
        archive_glob: Option<String>,
        /// Snapshot name glob (default: all snapshots)
        snapshot_glob: Option<String>,
    },
}

fn main() {
    // Parse through ArgMatches so filter declaration order is recoverable.
    let matches = Cli::command().get_matches();
    let cli = match Cli::from_arg_matches(&matches) {
        Ok(cli) => cli,
        Err(err) => err.exit(),
    };

    let level = if cli.verbose {
        tracing::Level::DEBUG
    } else {
        tracing::Level::WARN
    };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    if let Err(err) = run(cli, &matches) {
        eprintln!("*** ERROR : {:#}", err);
        std::process::exit(1);
    }
}

fn run(cli: Cli, matches: &ArgMatches) -> Result<()> {
    let sub_matches = matches
        .subcommand()
        .map(|(_, m)| m)
        .unwrap_or(matches);

    match cli.command {
        Commands::Backup {
            data_folder,
            repository,
            archive,
            filters,
            abort,
        } => {
            let options = RunOptions {
                archive_name: archive_or_default(archive),
                snapshot_name: None,
                filters: filter_config(sub_matches, &filters),
                abort_on_error: abort,
                precision: None,
            };
            cmd::backup::run(&data_folder, &repository, &options)
        }
        Commands::Check {
            data_folder: _,
            repository,
            archive,
            snapshot,
        } => {
            let options = RunOptions {
                archive_name: archive_or_default(archive),
                snapshot_name: snapshot,
                ..Default::default()
            };
            cmd::check::run(&repository, &options)
        }
        Commands::Compare {
            data_folder,
            repository,
            archive,
            snapshot,
            filters,
            precision,
        } => {
            let options = RunOptions {
                archive_name: archive_or_default(archive),
                snapshot_name: snapshot,
                filters: filter_config(sub_matches, &filters),
                abort_on_error: false,
                precision,
            };
            cmd::compare::run(&data_folder, &repository, &options)
        }
        Commands::Restore {
            data_folder,
            repository,
            archive,
            snapshot,
            filters,
            abort,
            precision,
        } => {
            let options = RunOptions {
                archive_name: archive_or_default(archive),
                snapshot_name: snapshot,
                filters: filter_config(sub_matches, &filters),
                abort_on_error: abort,
                precision,
            };
            cmd::restore::run(&data_folder, &repository, &options)
        }
        Commands::Find {
            repository,
            archive_glob,
            snapshot_glob,
        } => cmd::find::run(&repository, archive_glob.as_deref(), snapshot_glob.as_deref()),
        Commands::List {
            repository,
            archive_glob,
            snapshot_glob,
        } => cmd::list::run(&repository, archive_glob.as_deref(), snapshot_glob.as_deref()),
    }
}

fn archive_or_default(archive: Option<String>) -> String {
    archive.unwrap_or_else(|| DEFAULT_ARCHIVE.to_string())
}

/// Rebuild the filter configuration in command-line declaration order.
/// Clap keeps each option's values separately, so the exclusive/inclusive
/// interleaving is recovered from the argv indices.
fn filter_config(matches: &ArgMatches, filters: &FilterArgs) -> FilterConfig {
    let (folder_filters, folder_filter_is_inclusive) = merge_by_index(
        matches,
        ("exclude", &filters.exclude),
        ("include", &filters.include),
    );
    let (file_filters, file_filter_is_inclusive) =
        merge_by_index(matches, ("ignore", &filters.ignore), ("keep", &filters.keep));
    FilterConfig {
        folder_filters,
        folder_filter_is_inclusive,
        file_filters,
        file_filter_is_inclusive,
        selected_file_filters: filters.select.clone(),
    }
}

fn merge_by_index(
    matches: &ArgMatches,
    exclusive: (&str, &[String]),
    inclusive: (&str, &[String]),
) -> (Vec<String>, Vec<bool>) {
    let mut tagged: Vec<(usize, &String, bool)> = Vec::new();
    for ((id, values), polarity) in [(exclusive, false), (inclusive, true)] {
        let indices = matches
            .indices_of(id)
            .map(|indices| indices.collect::<Vec<_>>())
            .unwrap_or_default();
        for (index, value) in indices.into_iter().zip(values.iter()) {
            tagged.push((index, value, polarity));
        }
    }
    tagged.sort_by_key(|&(index, _, _)| index);
    tagged
        .into_iter()
        .map(|(_, value, polarity)| (value.clone(), polarity))
        .unzip()
}
