// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Prioritized merging of package indices.

Sources are folded left to right, two at a time: the running merged index is
the higher priority side and the next source is the lower priority side. On a
name collision the higher priority record always wins, regardless of version.
Records unique to the lower priority side are subject to ban evaluation
before entering the result; records already in the merged index are not
re-examined.

Merging is pure: the only observable side channel is a stream of
[MergeEvent] values delivered through an optional callback.
*/

use {
    crate::{
        banned::{record_is_banned, BannedSet},
        error::{MergeError, Result},
        package_index::{PackageIndex, PackageRecord},
    },
    std::{collections::BTreeSet, fmt::Display},
};

/// An auditable event raised while merging.
///
/// The [Display] form is the comma-separated record the audit log stores,
/// one event per line.
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum MergeEvent {
    /// A package was excluded from the merged index.
    Banned { suite: String, package: String },

    /// A lower priority source carried a strictly newer version than the
    /// record that won the merge. Informational only.
    ObsoleteVersion {
        suite: String,
        package: String,
        winning: String,
        losing: String,
    },

    /// A record's dependency clauses mention the tracked package.
    TrackedDependency { suite: String, package: String },
}

impl Display for MergeEvent {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Banned { suite, package } => write!(f, "{},{}", suite, package),
            Self::ObsoleteVersion {
                suite,
                package,
                winning,
                losing,
            } => write!(f, "{},{},{},{}", suite, package, winning, losing),
            Self::TrackedDependency { suite, package } => write!(f, "{},{}", suite, package),
        }
    }
}

/// Callback receiving [MergeEvent]s as they are raised.
pub type MergeEventCallback<'a> = dyn Fn(MergeEvent) + Sync + 'a;

/// Rewrites a record as it enters the merged index.
///
/// Receives the record and the name of the source it came from. Must be pure
/// and must not alter the `Package` or `Version` fields; the merge engine
/// verifies this and fails the merge if the identity changed.
pub type RecordRewriter<'a> = dyn Fn(PackageRecord, &str) -> PackageRecord + Sync + 'a;

/// One input to a merge: a named index whose priority is its list position.
#[derive(Clone, Debug, Default)]
pub struct MergeSource {
    name: String,
    index: PackageIndex,
}

impl MergeSource {
    pub fn new(name: impl ToString, index: PackageIndex) -> Self {
        Self {
            name: name.to_string(),
            index,
        }
    }

    /// An empty, unnamed source used to pad short source lists.
    pub fn placeholder() -> Self {
        Self::default()
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn index(&self) -> &PackageIndex {
        &self.index
    }
}

/// Merge sources in priority order into a single index.
///
/// The first source has the highest priority. Fewer than two sources are
/// padded with empty placeholders so the pairwise algorithm always applies;
/// a single source therefore passes through unchanged (modulo the rewriter).
///
/// Each record is rewritten exactly once, with the name of the source it
/// originated from, at the fold step where it enters the merged index.
pub fn merge_sources(
    sources: Vec<MergeSource>,
    suite: &str,
    banned: &BannedSet,
    rewriter: Option<&RecordRewriter<'_>>,
    cb: Option<&MergeEventCallback<'_>>,
) -> Result<PackageIndex> {
    let mut sources = sources.into_iter();

    let (mut merged, seed_name) = match sources.next() {
        Some(source) => (source.index, source.name),
        None => (PackageIndex::new(), String::new()),
    };

    // Records of the seed index have not entered a fold yet; they are
    // rewritten during the first one.
    let mut entering = Some(seed_name);
    let mut folded = false;

    for lower in sources {
        merged = merge_pair(&merged, entering.take().as_deref(), &lower, suite, banned, rewriter, cb)?;
        folded = true;
    }

    if !folded {
        merged = merge_pair(
            &merged,
            entering.as_deref(),
            &MergeSource::placeholder(),
            suite,
            banned,
            rewriter,
            cb,
        )?;
    }

    Ok(merged)
}

/// Fold one lower priority source into the running merged index.
///
/// `entering_name` is the source name of the higher side's records when they
/// have not been through a fold before; `None` means they already entered the
/// merged index earlier and must pass through untouched.
fn merge_pair(
    higher: &PackageIndex,
    entering_name: Option<&str>,
    lower: &MergeSource,
    suite: &str,
    banned: &BannedSet,
    rewriter: Option<&RecordRewriter<'_>>,
    cb: Option<&MergeEventCallback<'_>>,
) -> Result<PackageIndex> {
    // A sorted union of names keeps the merged index deterministic.
    let names = higher
        .names()
        .chain(lower.index.names())
        .collect::<BTreeSet<_>>();

    let mut merged = PackageIndex::new();

    for name in names {
        match (higher.get(name), lower.index.get(name)) {
            (Some(winner), Some(loser)) => {
                if loser.version()? > winner.version()? {
                    if let Some(cb) = cb {
                        cb(MergeEvent::ObsoleteVersion {
                            suite: suite.to_string(),
                            package: name.to_string(),
                            winning: winner.version_str()?.to_string(),
                            losing: loser.version_str()?.to_string(),
                        });
                    }
                }

                merged.insert(enter(winner.clone(), entering_name, rewriter)?)?;
            }
            (Some(winner), None) => {
                merged.insert(enter(winner.clone(), entering_name, rewriter)?)?;
            }
            (None, Some(record)) => {
                if !record_is_banned(record, banned, suite, cb)? {
                    merged.insert(enter(record.clone(), Some(lower.name()), rewriter)?)?;
                }
            }
            (None, None) => unreachable!("name came from one of the two indices"),
        }
    }

    Ok(merged)
}

/// Apply the rewriter to a record entering the merged index.
fn enter(
    record: PackageRecord,
    source_name: Option<&str>,
    rewriter: Option<&RecordRewriter<'_>>,
) -> Result<PackageRecord> {
    let (rewriter, source_name) = match (rewriter, source_name) {
        (Some(rewriter), Some(source_name)) => (rewriter, source_name),
        _ => return Ok(record),
    };

    let package = record.package()?.to_string();
    let version = record.version_str()?.to_string();

    let rewritten = rewriter(record, source_name);

    if rewritten.package()? != package || rewritten.version_str()? != version {
        return Err(MergeError::RewriterChangedIdentity(package));
    }

    Ok(rewritten)
}

#[cfg(test)]
mod tests {
    use {super::*, crate::control::ControlParagraph, std::sync::Mutex};

    fn index(entries: &[(&str, &str)]) -> PackageIndex {
        let mut index = PackageIndex::new();
        for (name, version) in entries {
            let mut paragraph = ControlParagraph::default();
            paragraph.set_field("Package", *name);
            paragraph.set_field("Version", *version);
            index
                .insert(PackageRecord::from(paragraph))
                .expect("test record must carry a Package field");
        }
        index
    }

    fn merge_collecting(
        sources: Vec<MergeSource>,
        banned: &BannedSet,
        rewriter: Option<&RecordRewriter<'_>>,
    ) -> (PackageIndex, Vec<MergeEvent>) {
        let events = Mutex::new(Vec::new());
        let cb = |event: MergeEvent| events.lock().unwrap().push(event);
        let merged = merge_sources(sources, "ceres", banned, rewriter, Some(&cb)).unwrap();
        (merged, events.into_inner().unwrap())
    }

    #[test]
    fn higher_priority_wins_regardless_of_version() {
        let devuan = MergeSource::new("devuan", index(&[("dash", "0.5.10")]));
        let debian = MergeSource::new("debian", index(&[("dash", "0.5.11-2")]));

        let (merged, events) = merge_collecting(vec![devuan, debian], &BannedSet::empty(), None);

        assert_eq!(merged.len(), 1);
        assert_eq!(merged.get("dash").unwrap().version_str().unwrap(), "0.5.10");
        assert_eq!(
            events,
            vec![MergeEvent::ObsoleteVersion {
                suite: "ceres".to_string(),
                package: "dash".to_string(),
                winning: "0.5.10".to_string(),
                losing: "0.5.11-2".to_string(),
            }]
        );
    }

    #[test]
    fn no_obsolete_notice_when_winner_is_newer() {
        let devuan = MergeSource::new("devuan", index(&[("dash", "0.5.11")]));
        let debian = MergeSource::new("debian", index(&[("dash", "0.5.10")]));

        let (_, events) = merge_collecting(vec![devuan, debian], &BannedSet::empty(), None);
        assert!(events.is_empty());
    }

    #[test]
    fn union_of_disjoint_sources() {
        let devuan = MergeSource::new("devuan", index(&[("eudev", "3.2.9")]));
        let debian = MergeSource::new("debian", index(&[("dash", "0.5.10")]));

        let (merged, _) = merge_collecting(vec![devuan, debian], &BannedSet::empty(), None);

        assert_eq!(merged.len(), 2);
        // Sorted union keeps output deterministic.
        assert_eq!(merged.names().collect::<Vec<_>>(), ["dash", "eudev"]);
    }

    #[test]
    fn lower_priority_side_is_ban_checked() {
        let banned: BannedSet = ["systemd".to_string()].into_iter().collect();

        let devuan = MergeSource::new("devuan", index(&[("eudev", "3.2.9")]));
        let debian = MergeSource::new("debian", index(&[("systemd", "247.3")]));

        let (merged, events) = merge_collecting(vec![devuan, debian], &banned, None);

        assert!(!merged.contains("systemd"));
        assert_eq!(
            events,
            vec![MergeEvent::Banned {
                suite: "ceres".to_string(),
                package: "systemd".to_string(),
            }]
        );
    }

    #[test]
    fn higher_priority_side_is_never_ban_checked() {
        let banned: BannedSet = ["vdev".to_string()].into_iter().collect();

        let devuan = MergeSource::new("devuan", index(&[("vdev", "1.0")]));
        let debian = MergeSource::new("debian", index(&[("dash", "0.5.10")]));

        let (merged, _) = merge_collecting(vec![devuan, debian], &banned, None);

        assert!(merged.contains("vdev"));
    }

    #[test]
    fn single_source_passes_through() {
        let banned: BannedSet = ["dash".to_string()].into_iter().collect();
        let devuan = MergeSource::new("devuan", index(&[("dash", "0.5.10"), ("eudev", "3.2.9")]));

        let (merged, events) = merge_collecting(vec![devuan], &banned, None);

        // All records sit on the higher priority side of the padded fold, so
        // even a banned name survives.
        assert_eq!(merged.len(), 2);
        assert!(merged.contains("dash"));
        assert!(events.is_empty());
    }

    #[test]
    fn no_sources_yield_an_empty_index() {
        let (merged, _) = merge_collecting(Vec::new(), &BannedSet::empty(), None);
        assert!(merged.is_empty());
    }

    #[test]
    fn rewriter_runs_once_with_the_originating_source_name() {
        let devuan = MergeSource::new("devuan", index(&[("eudev", "3.2.9")]));
        let debian = MergeSource::new("debian", index(&[("dash", "0.5.10")]));
        let kali = MergeSource::new("kali", index(&[("nmap", "7.91")]));

        let rewriter = |mut record: PackageRecord, source: &str| {
            let seen = record
                .field_str("X-Rewritten-By")
                .map(|v| format!("{} {}", v, source))
                .unwrap_or_else(|| source.to_string());
            record.set_field("X-Rewritten-By", seen);
            record
        };

        let (merged, _) = merge_collecting(
            vec![devuan, debian, kali],
            &BannedSet::empty(),
            Some(&rewriter),
        );

        for (package, source) in [("eudev", "devuan"), ("dash", "debian"), ("nmap", "kali")] {
            assert_eq!(
                merged.get(package).unwrap().field_str("X-Rewritten-By"),
                Some(source),
                "{}",
                package
            );
        }
    }

    #[test]
    fn rewriter_must_not_change_identity() {
        let devuan = MergeSource::new("devuan", index(&[("eudev", "3.2.9")]));

        let rewriter = |mut record: PackageRecord, _source: &str| {
            record.set_field("Version", "9.9.9");
            record
        };

        let res = merge_sources(
            vec![devuan],
            "ceres",
            &BannedSet::empty(),
            Some(&rewriter),
            None,
        );

        assert!(matches!(res, Err(MergeError::RewriterChangedIdentity(_))));
    }

    #[test]
    fn merge_is_deterministic() {
        let make = || {
            vec![
                MergeSource::new("devuan", index(&[("b", "2"), ("a", "1")])),
                MergeSource::new("debian", index(&[("c", "3"), ("a", "0.9")])),
            ]
        };

        let (first, _) = merge_collecting(make(), &BannedSet::empty(), None);
        let (second, _) = merge_collecting(make(), &BannedSet::empty(), None);

        assert_eq!(
            first.names().collect::<Vec<_>>(),
            second.names().collect::<Vec<_>>()
        );
        assert_eq!(first.names().collect::<Vec<_>>(), ["a", "b", "c"]);
    }
}
