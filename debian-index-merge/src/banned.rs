// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Exclusion of banned packages.

A package is excluded from a merged index when it is itself banned or when
one of its dependency clauses can only be satisfied by banned packages. A
package that depends on a banned package but has a non-banned alternative in
every clause is kept.
*/

use {
    crate::{
        error::Result,
        merge::{MergeEvent, MergeEventCallback},
        package_index::PackageRecord,
    },
    std::collections::HashSet,
};

/// Package whose reverse dependencies are recorded for auditing.
///
/// Merely depending on this package never affects the ban decision; the
/// observation exists so downstream distributions can track how much of the
/// archive still links against it.
pub const TRACKED_PACKAGE: &str = "libsystemd0";

/// The set of package names excluded from a merge run.
#[derive(Clone, Debug, Default)]
pub struct BannedSet {
    names: HashSet<String>,
}

impl FromIterator<String> for BannedSet {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        Self {
            names: HashSet::from_iter(iter),
        }
    }
}

impl BannedSet {
    /// Construct an empty set, which bans nothing.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.contains(name)
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Decide whether a record must be excluded from the merged index.
///
/// The record's own name is checked first. Otherwise its `Pre-Depends` and
/// `Depends` clauses (in that order) are parsed and the record is banned iff
/// some single clause has all of its alternatives banned.
///
/// An unparsable dependency field is an error: the caller must fail the
/// containing merge unit rather than assume the record is clean.
pub fn record_is_banned(
    record: &PackageRecord,
    banned: &BannedSet,
    suite: &str,
    cb: Option<&MergeEventCallback<'_>>,
) -> Result<bool> {
    let package = record.package()?;

    if banned.contains(package) {
        if let Some(cb) = cb {
            cb(MergeEvent::Banned {
                suite: suite.to_string(),
                package: package.to_string(),
            });
        }

        return Ok(true);
    }

    let mut clauses = match record.pre_depends() {
        Some(parsed) => parsed?,
        None => Vec::new(),
    };
    if let Some(parsed) = record.depends() {
        clauses.extend(parsed?);
    }

    if clauses
        .iter()
        .any(|clause| clause.package_names().any(|name| name == TRACKED_PACKAGE))
    {
        if let Some(cb) = cb {
            cb(MergeEvent::TrackedDependency {
                suite: suite.to_string(),
                package: package.to_string(),
            });
        }
    }

    let unsatisfiable = clauses
        .iter()
        .any(|clause| clause.package_names().all(|name| banned.contains(name)));

    if unsatisfiable {
        if let Some(cb) = cb {
            cb(MergeEvent::Banned {
                suite: suite.to_string(),
                package: package.to_string(),
            });
        }
    }

    Ok(unsatisfiable)
}
