// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

use {
    crate::{audit::AuditLog, config::MergeConfig, tasks},
    clap::{Arg, ArgMatches, Command},
    debian_index_merge::error::MergeError,
    std::sync::Arc,
    thiserror::Error,
};

const MERGE_ABOUT: &str = "\
Merge prioritized package indices into one repository.

Each configured (suite, category, architecture) combination yields three
independent merge tasks: the binary `Packages` index, the debian-installer
`Packages` index and the `Sources` index. Tasks run concurrently on a
bounded pool; one task failing does not stop the others.

Within a task, the configured sources are merged in priority order. The
first source always wins when a package name appears in several sources,
regardless of version. Packages unique to a lower priority source are
dropped when they are banned or when one of their dependency clauses can
only be satisfied by banned packages.

# YAML Configuration

The --yaml-config file is a single document with the following keys:

spool_dir (required) (string)
   Directory holding the downloaded archives, one sub-directory per source
   (e.g. `<spool_dir>/debian/dists/<suite>/main/binary-amd64/Packages.gz`).

merged_dir (required) (string)
   Directory the merged repository is written to. Indices are published as
   `Packages.gz`/`Packages.xz` (or `Sources.*`) pairs with identical
   decompressed content.

log_dir (required) (string)
   Directory audit records are appended to: banned packages, obsolete
   version notices and tracked dependencies, one file per category.

suites (required) (list[string])
   Suite names to merge, e.g. `ceres`.

architectures (required) (list[string])
   Architectures to merge binary indices for, e.g. `amd64`.

categories (required) (list[string])
   Repository categories (components) to merge, e.g. `main`.

sources (required) (list[string])
   Source names in priority order; earlier sources win name collisions.

banned_packages (optional) (list[string])
   Names of packages excluded from the merged repository.

packages_fields / sources_fields (optional) (list[string])
   Field allow-lists controlling which fields are emitted to binary and
   source indices, in output order. Sensible defaults are built in.

release_fallback (optional) (string)
   Source whose `Release` files are copied next to indices the merged
   repository has no `Release` for yet. Defaults to the first source.
";

#[derive(Debug, Error)]
pub enum DmtError {
    #[error("argument parsing error: {0:?}")]
    Clap(#[from] clap::Error),

    #[error("{0}")]
    Merge(#[from] MergeError),

    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("YAML error: {0:?}")]
    SerdeYaml(#[from] serde_yaml::Error),

    #[error("invalid sub-command: {0}")]
    InvalidSubCommand(String),

    #[error("{0} of {1} merge tasks failed")]
    TasksFailed(usize, usize),
}

pub type Result<T> = std::result::Result<T, DmtError>;

pub async fn run_cli() -> Result<()> {
    let app = Command::new("Debian Merge Tool")
        .version("0.1")
        .about("Merge prioritized Debian package indices")
        .arg_required_else_help(true)
        .arg(
            Arg::new("max-parallel-tasks")
                .long("--max-parallel-tasks")
                .takes_value(true)
                .default_value("4")
                .global(true)
                .help("Maximum number of merge tasks running concurrently"),
        );

    let mut app = app.subcommand(
        Command::new("merge")
            .about("Merge the configured package indices into one repository")
            .long_about(MERGE_ABOUT)
            .arg(
                Arg::new("yaml-config")
                    .long("--yaml-config")
                    .takes_value(true)
                    .required(true)
                    .allow_invalid_utf8(true)
                    .help("Path to a YAML file defining the merge run"),
            ),
    );

    let matches = app.clone().get_matches();

    match matches.subcommand() {
        Some(("merge", args)) => command_merge(args).await,
        Some((command, _)) => Err(DmtError::InvalidSubCommand(command.to_string())),
        None => {
            app.print_help()?;
            Ok(())
        }
    }
}

async fn command_merge(args: &ArgMatches) -> Result<()> {
    let max_parallel = args.value_of_t::<usize>("max-parallel-tasks")?;

    let yaml_path = args
        .value_of_os("yaml-config")
        .expect("yaml-config argument is required");

    let f = std::fs::File::open(yaml_path)?;
    let config: MergeConfig = serde_yaml::from_reader(f)?;

    let audit = AuditLog::new(&config.log_dir)?;

    let (succeeded, failed) =
        tasks::run_tasks(Arc::new(config), Arc::new(audit), max_parallel).await;

    if failed > 0 {
        return Err(DmtError::TasksFailed(failed, succeeded + failed));
    }

    Ok(())
}
