// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Merge run configuration. */

use {serde::Deserialize, std::path::PathBuf};

/// Configuration of a merge run, loaded from a YAML document.
#[derive(Clone, Debug, Deserialize)]
pub struct MergeConfig {
    /// Directory holding one sub-directory of downloaded archives per source.
    pub spool_dir: PathBuf,

    /// Directory the merged repository is written to.
    pub merged_dir: PathBuf,

    /// Directory audit log files are appended to.
    pub log_dir: PathBuf,

    /// Suites to merge, e.g. `ceres`.
    pub suites: Vec<String>,

    /// Architectures to merge binary indices for, e.g. `amd64`.
    pub architectures: Vec<String>,

    /// Repository categories (components), e.g. `main` or `contrib`.
    pub categories: Vec<String>,

    /// Sources in priority order; the first wins on name collisions.
    pub sources: Vec<String>,

    /// Packages excluded from the merged repository, together with any
    /// package that cannot be installed without them.
    #[serde(default)]
    pub banned_packages: Vec<String>,

    /// Fields emitted to binary package indices, in output order.
    #[serde(default = "default_packages_fields")]
    pub packages_fields: Vec<String>,

    /// Fields emitted to source package indices, in output order.
    #[serde(default = "default_sources_fields")]
    pub sources_fields: Vec<String>,

    /// Source whose `Release` files are reused where the merged repository
    /// has none. Defaults to the highest priority source.
    #[serde(default)]
    pub release_fallback: Option<String>,
}

impl MergeConfig {
    /// Name of the source providing fallback `Release` files.
    pub fn release_fallback_source(&self) -> Option<&str> {
        self.release_fallback
            .as_deref()
            .or_else(|| self.sources.first().map(String::as_str))
    }
}

fn to_strings(names: &[&str]) -> Vec<String> {
    names.iter().map(|s| s.to_string()).collect()
}

fn default_packages_fields() -> Vec<String> {
    to_strings(&[
        "Package",
        "Version",
        "Essential",
        "Installed-Size",
        "Maintainer",
        "Architecture",
        "Replaces",
        "Breaks",
        "Provides",
        "Conflicts",
        "Depends",
        "Pre-Depends",
        "Recommends",
        "Suggests",
        "Enhances",
        "Description",
        "Homepage",
        "Description-md5",
        "Tag",
        "Section",
        "Priority",
        "Filename",
        "Size",
        "MD5sum",
        "SHA256",
    ])
}

fn default_sources_fields() -> Vec<String> {
    to_strings(&[
        "Package",
        "Binary",
        "Version",
        "Maintainer",
        "Uploaders",
        "Build-Depends",
        "Architecture",
        "Standards-Version",
        "Format",
        "Files",
        "Vcs-Browser",
        "Vcs-Git",
        "Checksums-Sha256",
        "Homepage",
        "Package-List",
        "Directory",
        "Priority",
        "Section",
    ])
}

#[cfg(test)]
mod tests {
    use super::*;

    const CONFIG_YAML: &str = "\
spool_dir: /srv/amprolla/spool
merged_dir: /srv/amprolla/merged
log_dir: /srv/amprolla/log
suites:
  - ceres
architectures:
  - amd64
  - arm64
categories:
  - main
sources:
  - devuan
  - debian
banned_packages:
  - systemd
";

    #[test]
    fn parse_minimal_config() {
        let config: MergeConfig = serde_yaml::from_str(CONFIG_YAML).unwrap();

        assert_eq!(config.sources, ["devuan", "debian"]);
        assert_eq!(config.banned_packages, ["systemd"]);
        assert_eq!(config.release_fallback_source(), Some("devuan"));

        // Allow-lists fall back to the standard field sets.
        assert_eq!(config.packages_fields[0], "Package");
        assert!(config.packages_fields.contains(&"Filename".to_string()));
        assert!(config.sources_fields.contains(&"Directory".to_string()));
    }

    #[test]
    fn explicit_release_fallback_wins() {
        let yaml = format!("{}release_fallback: debian\n", CONFIG_YAML);
        let config: MergeConfig = serde_yaml::from_str(&yaml).unwrap();

        assert_eq!(config.release_fallback_source(), Some("debian"));
    }
}
