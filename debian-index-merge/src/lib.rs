// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Prioritized merging of Debian package indices.

This crate implements the engine behind a repository aggregation tool: it
combines the `Packages`/`Sources` indices of several distributions into a
single index, letting an overlay distribution's records take precedence over
the layers below it while excluding packages whose dependencies cannot be
satisfied without banned packages.

# A Tour of Functionality

`Packages` and `Sources` files are *control files*: paragraphs of `Key:
Value` fields. Low-level primitives live in the [control] module:
[control::ControlParagraph] models a paragraph and
[control::ControlParagraphReader] is a streaming parser.

[package_index::PackageRecord] wraps a paragraph with typed accessors for
the fields the merge cares about, and [package_index::PackageIndex] maps
package names to their single record, including a loader for gzip compressed
index archives.

The [package_version] module implements Debian version string parsing and
comparison per the Debian Policy Manual. [package_version::PackageVersion]
is a total order, which the merge uses to detect lower priority sources
carrying newer versions than the record that won.

The [dependency] module parses relationship fields like `Depends` into
clauses of alternatives. The [banned] module builds on it to decide whether
a record must be excluded: [banned::record_is_banned] bans a record whose
own name is banned or that has a dependency clause satisfiable only by
banned packages.

[merge::merge_sources] folds a priority-ordered list of
[merge::MergeSource] into one index, reporting exclusions and obsolete
versions as [merge::MergeEvent] values through an optional callback, and
applying an optional [merge::RecordRewriter] to records as they enter the
result.

Finally, [publish::write_index_files] serializes a merged index into
byte-identical gzip and XZ artifacts, with the emitted fields driven by an
allow-list, and [publish::ensure_release_file] backfills a `Release` file
from a lower layer when none has been generated yet.

Everything in this crate is pure and synchronous; callers own scheduling,
configuration and the storage of audit events.
*/

pub mod banned;
pub mod control;
pub mod dependency;
pub mod error;
pub mod merge;
pub mod package_index;
pub mod package_version;
pub mod publish;
