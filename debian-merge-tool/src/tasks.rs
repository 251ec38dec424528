// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Enumeration and execution of merge tasks.

Every `(suite, category, architecture)` index is one independent unit of
work with no shared mutable state beyond the audit log sink. Tasks run on a
bounded pool; a failing task is reported and counted but never aborts its
siblings.
*/

use {
    crate::{
        audit::{self, AuditLog},
        config::MergeConfig,
    },
    debian_index_merge::{
        banned::BannedSet,
        error::MergeError,
        merge::{merge_sources, MergeEvent, MergeSource},
        package_index::{PackageIndex, PackageRecord},
        publish::{ensure_release_file, write_index_files},
    },
    futures::StreamExt,
    log::{error, info, warn},
    std::sync::{
        atomic::{AtomicUsize, Ordering},
        Arc, Mutex,
    },
};

/// One independent unit of work: a single index merged across all sources.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MergeTask {
    /// A `Packages` index for one architecture.
    Packages {
        suite: String,
        category: String,
        architecture: String,
    },

    /// The debian-installer `Packages` index for one architecture.
    InstallerPackages {
        suite: String,
        category: String,
        architecture: String,
    },

    /// A `Sources` index.
    Sources { suite: String, category: String },
}

impl MergeTask {
    pub fn suite(&self) -> &str {
        match self {
            Self::Packages { suite, .. } => suite,
            Self::InstallerPackages { suite, .. } => suite,
            Self::Sources { suite, .. } => suite,
        }
    }

    /// Repository path of this index, without compression suffix.
    pub fn index_path(&self) -> String {
        match self {
            Self::Packages {
                suite,
                category,
                architecture,
            } => format!("dists/{}/{}/binary-{}/Packages", suite, category, architecture),
            Self::InstallerPackages {
                suite,
                category,
                architecture,
            } => format!(
                "dists/{}/{}/debian-installer/binary-{}/Packages",
                suite, category, architecture
            ),
            Self::Sources { suite, category } => {
                format!("dists/{}/{}/source/Sources", suite, category)
            }
        }
    }

    /// Field allow-list for this index flavor.
    fn fields<'a>(&self, config: &'a MergeConfig) -> &'a [String] {
        match self {
            Self::Sources { .. } => &config.sources_fields,
            _ => &config.packages_fields,
        }
    }

    /// Record field carrying the pool path for this index flavor.
    fn pool_path_field(&self) -> &'static str {
        match self {
            Self::Sources { .. } => "Directory",
            _ => "Filename",
        }
    }
}

/// Expand the configuration into the full task list.
pub fn enumerate_tasks(config: &MergeConfig) -> Vec<MergeTask> {
    let mut tasks = Vec::new();

    for suite in &config.suites {
        for category in &config.categories {
            for architecture in &config.architectures {
                tasks.push(MergeTask::Packages {
                    suite: suite.clone(),
                    category: category.clone(),
                    architecture: architecture.clone(),
                });
                tasks.push(MergeTask::InstallerPackages {
                    suite: suite.clone(),
                    category: category.clone(),
                    architecture: architecture.clone(),
                });
            }

            tasks.push(MergeTask::Sources {
                suite: suite.clone(),
                category: category.clone(),
            });
        }
    }

    tasks
}

/// Per-task tallies for the end-of-run summary.
#[derive(Clone, Copy, Debug, Default)]
pub struct TaskOutcome {
    pub merged: usize,
    pub banned: usize,
    pub obsolete: usize,
}

/// Rewrites a record's pool path so every source keeps its own pool
/// sub-tree inside the merged repository.
fn pool_path_rewriter(field: &'static str) -> impl Fn(PackageRecord, &str) -> PackageRecord + Sync {
    move |mut record, source| {
        if source.is_empty() {
            return record;
        }

        let rewritten = record.field_str(field).and_then(|path| {
            path.strip_prefix("pool/")
                .map(|rest| format!("pool/{}/{}", source, rest))
        });

        if let Some(value) = rewritten {
            record.set_field(field, value);
        }

        record
    }
}

/// Run a single merge task to completion.
pub fn run_task(
    config: &MergeConfig,
    task: &MergeTask,
    audit: &AuditLog,
) -> Result<TaskOutcome, MergeError> {
    let index_path = task.index_path();

    let mut sources = Vec::with_capacity(config.sources.len());
    for name in &config.sources {
        let archive = config
            .spool_dir
            .join(name)
            .join(format!("{}.gz", index_path));

        let index = match PackageIndex::load_path(&archive) {
            Ok(index) => index,
            Err(MergeError::IndexArchiveNotFound(path)) => {
                warn!("{}: treating missing archive as empty: {}", index_path, path);
                PackageIndex::new()
            }
            Err(e) => return Err(e),
        };

        sources.push(MergeSource::new(name, index));
    }

    let banned: BannedSet = config.banned_packages.iter().cloned().collect();
    let rewriter = pool_path_rewriter(task.pool_path_field());

    // Ban and tracked-dependency notices are appended as they happen;
    // obsolete notices are batched and flushed once per task.
    let banned_count = AtomicUsize::new(0);
    let obsolete_lines = Mutex::new(Vec::<String>::new());
    let cb = |event: MergeEvent| match &event {
        MergeEvent::Banned { .. } => {
            banned_count.fetch_add(1, Ordering::Relaxed);
            if let Err(e) = audit.append(audit::BANNED_LOG, &event.to_string()) {
                warn!("failed to append to {}: {}", audit::BANNED_LOG, e);
            }
        }
        MergeEvent::TrackedDependency { .. } => {
            if let Err(e) = audit.append(audit::TRACKED_LOG, &event.to_string()) {
                warn!("failed to append to {}: {}", audit::TRACKED_LOG, e);
            }
        }
        MergeEvent::ObsoleteVersion { .. } => {
            obsolete_lines
                .lock()
                .expect("obsolete notice lock poisoned")
                .push(event.to_string());
        }
    };

    let merged = merge_sources(sources, task.suite(), &banned, Some(&rewriter), Some(&cb))?;

    let dest = config.merged_dir.join(&index_path);
    write_index_files(&merged, &dest, task.fields(config), true)?;

    if let Some(fallback_source) = config.release_fallback_source() {
        let fallback = config
            .spool_dir
            .join(fallback_source)
            .join(&index_path)
            .with_file_name("Release");
        ensure_release_file(&dest, &fallback)?;
    }

    let obsolete_lines = obsolete_lines
        .into_inner()
        .expect("obsolete notice lock poisoned");
    audit.append_many(
        &audit::obsolete_log(task.suite()),
        obsolete_lines.iter().map(String::as_str),
    )?;

    Ok(TaskOutcome {
        merged: merged.len(),
        banned: banned_count.into_inner(),
        obsolete: obsolete_lines.len(),
    })
}

/// Run all configured tasks on a bounded pool.
///
/// Returns `(succeeded, failed)` counts.
pub async fn run_tasks(
    config: Arc<MergeConfig>,
    audit: Arc<AuditLog>,
    max_parallel: usize,
) -> (usize, usize) {
    let tasks = enumerate_tasks(&config);
    info!(
        "{} merge tasks across {} sources",
        tasks.len(),
        config.sources.len()
    );

    let mut running = futures::stream::iter(tasks.into_iter().map(|task| {
        let config = config.clone();
        let audit = audit.clone();

        tokio::task::spawn_blocking(move || {
            let outcome = run_task(&config, &task, &audit);
            (task, outcome)
        })
    }))
    .buffer_unordered(max_parallel.max(1));

    let mut succeeded = 0;
    let mut failed = 0;

    while let Some(joined) = running.next().await {
        match joined {
            Ok((task, Ok(outcome))) => {
                succeeded += 1;
                info!(
                    "{}: {} packages merged, {} banned, {} obsolete",
                    task.index_path(),
                    outcome.merged,
                    outcome.banned,
                    outcome.obsolete
                );
            }
            Ok((task, Err(e))) => {
                failed += 1;
                error!("{}: {}", task.index_path(), e);
            }
            Err(e) => {
                failed += 1;
                error!("merge task panicked: {}", e);
            }
        }
    }

    (succeeded, failed)
}
