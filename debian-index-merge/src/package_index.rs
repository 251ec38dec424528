// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Package records and loaded package indices. */

use {
    crate::{
        control::{ControlParagraph, ControlParagraphReader},
        dependency::{parse_depends, DependencyClause},
        error::{MergeError, Result},
        package_version::PackageVersion,
    },
    std::{
        collections::HashMap,
        io::{BufRead, BufReader},
        ops::{Deref, DerefMut},
        path::Path,
    },
};

/// A single package's paragraph from a `Packages` or `Sources` index.
///
/// This is a low-level wrapper around an inner [ControlParagraph]. [Deref]
/// and [DerefMut] can be used to operate on the inner paragraph. Fields the
/// merge engine relies on (`Package`, `Version`, `Depends`, `Pre-Depends`)
/// have dedicated accessors; the mandatory ones return [Result] and error
/// when the field is not present.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PackageRecord {
    paragraph: ControlParagraph,
}

impl Deref for PackageRecord {
    type Target = ControlParagraph;

    fn deref(&self) -> &Self::Target {
        &self.paragraph
    }
}

impl DerefMut for PackageRecord {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.paragraph
    }
}

impl From<ControlParagraph> for PackageRecord {
    fn from(paragraph: ControlParagraph) -> Self {
        Self { paragraph }
    }
}

impl From<PackageRecord> for ControlParagraph {
    fn from(record: PackageRecord) -> Self {
        record.paragraph
    }
}

impl PackageRecord {
    /// The `Package` field value.
    pub fn package(&self) -> Result<&str> {
        self.paragraph.required_field_str("Package")
    }

    /// The `Version` field as its original string.
    pub fn version_str(&self) -> Result<&str> {
        self.paragraph.required_field_str("Version")
    }

    /// The `Version` field parsed into a [PackageVersion].
    pub fn version(&self) -> Result<PackageVersion> {
        PackageVersion::parse(self.version_str()?)
    }

    /// The `Depends` field parsed into dependency clauses.
    pub fn depends(&self) -> Option<Result<Vec<DependencyClause>>> {
        self.paragraph.field_str("Depends").map(parse_depends)
    }

    /// The `Pre-Depends` field parsed into dependency clauses.
    pub fn pre_depends(&self) -> Option<Result<Vec<DependencyClause>>> {
        self.paragraph.field_str("Pre-Depends").map(parse_depends)
    }
}

/// A loaded package index: package name to the single record for that name.
///
/// Insertion order is preserved for iteration. Inserting a record for an
/// already present name replaces the prior record in place.
#[derive(Clone, Debug, Default)]
pub struct PackageIndex {
    records: Vec<(String, PackageRecord)>,
    by_name: HashMap<String, usize>,
}

impl PackageIndex {
    /// Construct an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of packages in the index.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Insert a record, keyed by its `Package` field.
    ///
    /// Errors if the record has no `Package` field.
    pub fn insert(&mut self, record: PackageRecord) -> Result<()> {
        let name = record.package()?.to_string();

        match self.by_name.get(&name) {
            Some(&pos) => {
                self.records[pos].1 = record;
            }
            None => {
                self.by_name.insert(name.clone(), self.records.len());
                self.records.push((name, record));
            }
        }

        Ok(())
    }

    /// Look up the record for a package name.
    pub fn get(&self, name: &str) -> Option<&PackageRecord> {
        self.by_name.get(name).map(|&pos| &self.records[pos].1)
    }

    /// Whether the index holds a record for the given name.
    pub fn contains(&self, name: &str) -> bool {
        self.by_name.contains_key(name)
    }

    /// Iterate `(name, record)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PackageRecord)> {
        self.records.iter().map(|(name, record)| (name.as_str(), record))
    }

    /// Iterate package names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.records.iter().map(|(name, _)| name.as_str())
    }

    /// Parse an index from a reader of uncompressed control file text.
    pub fn from_reader<R: BufRead>(reader: R) -> Result<Self> {
        let mut index = Self::new();

        for paragraph in ControlParagraphReader::new(reader) {
            index.insert(PackageRecord::from(paragraph?))?;
        }

        Ok(index)
    }

    /// Parse an index from a string of control file text.
    pub fn parse_str(s: &str) -> Result<Self> {
        Self::from_reader(std::io::Cursor::new(s))
    }

    /// Load an index from a gzip compressed archive on the filesystem.
    ///
    /// A missing file maps to [MergeError::IndexArchiveNotFound] so callers
    /// can choose to treat an absent source as an empty index.
    pub fn load_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        let file = std::fs::File::open(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                MergeError::IndexArchiveNotFound(format!("{}", path.display()))
            } else {
                MergeError::RepositoryIoPath(format!("{}", path.display()), e)
            }
        })?;

        let decoder = libflate::gzip::Decoder::new(BufReader::new(file))
            .map_err(|e| MergeError::RepositoryIoPath(format!("{}", path.display()), e))?;

        Self::from_reader(BufReader::new(decoder))
    }
}

#[cfg(test)]
mod tests {
    use {super::*, indoc::indoc, std::io::Write};

    const INDEX_TEXT: &str = indoc! {"
        Package: base-files
        Version: 11.1
        Depends: awk

        Package: eudev
        Version: 3.2.9-1
        Pre-Depends: libc6 (>= 2.27)
    "};

    #[test]
    fn parse_and_lookup() -> Result<()> {
        let index = PackageIndex::parse_str(INDEX_TEXT)?;

        assert_eq!(index.len(), 2);
        assert!(index.contains("eudev"));
        assert!(!index.contains("dash"));

        let record = index.get("base-files").unwrap();
        assert_eq!(record.package()?, "base-files");
        assert_eq!(record.version_str()?, "11.1");
        assert_eq!(record.version()?.upstream_version(), "11.1");

        let depends = record.depends().unwrap()?;
        assert_eq!(depends.len(), 1);
        assert_eq!(depends[0].package_names().collect::<Vec<_>>(), ["awk"]);
        assert!(record.pre_depends().is_none());

        Ok(())
    }

    #[test]
    fn duplicate_name_replaces_in_place() -> Result<()> {
        let mut index = PackageIndex::parse_str(INDEX_TEXT)?;

        let mut paragraph = ControlParagraph::default();
        paragraph.set_field("Package", "base-files");
        paragraph.set_field("Version", "12.0");
        index.insert(PackageRecord::from(paragraph))?;

        assert_eq!(index.len(), 2);
        assert_eq!(index.get("base-files").unwrap().version_str()?, "12.0");
        assert_eq!(
            index.names().collect::<Vec<_>>(),
            ["base-files", "eudev"],
            "replacement must not reorder"
        );

        Ok(())
    }

    #[test]
    fn record_without_package_field_is_an_error() {
        let mut paragraph = ControlParagraph::default();
        paragraph.set_field("Version", "1.0");

        let mut index = PackageIndex::new();
        assert!(matches!(
            index.insert(PackageRecord::from(paragraph)),
            Err(MergeError::ControlRequiredFieldMissing("Package"))
        ));
    }

    #[test]
    fn load_gzip_archive() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let path = dir.path().join("Packages.gz");

        let file = std::fs::File::create(&path)?;
        let mut encoder = libflate::gzip::Encoder::new(file)?;
        encoder.write_all(INDEX_TEXT.as_bytes())?;
        encoder.finish().into_result()?;

        let index = PackageIndex::load_path(&path)?;
        assert_eq!(index.len(), 2);

        Ok(())
    }

    #[test]
    fn missing_archive_is_distinguishable() {
        let res = PackageIndex::load_path("/nonexistent/dists/ceres/Packages.gz");

        assert!(matches!(res, Err(MergeError::IndexArchiveNotFound(_))));
    }
}
