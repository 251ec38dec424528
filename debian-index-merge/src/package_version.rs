// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Debian package version string handling. */

use {
    crate::error::{MergeError, Result},
    std::{
        cmp::Ordering,
        fmt::{Display, Formatter},
    },
};

/// A Debian package version.
///
/// The string format is `[epoch:]upstream_version[-revision]` and sorting
/// rules are defined by the Debian Policy Manual, §5.6.12
/// (<https://www.debian.org/doc/debian-policy/ch-controlfields.html#version>).
///
/// An absent epoch is equivalent to `0`. An absent revision is stored as the
/// empty string and compared through the regular component algorithm, where
/// an empty digit run counts as `0` (so `1.0` and `1.0-0` compare equal).
#[derive(Clone, Debug)]
pub struct PackageVersion {
    epoch: u32,
    upstream: String,
    revision: String,
}

impl PackageVersion {
    /// Construct an instance by parsing a version string.
    pub fn parse(s: &str) -> Result<Self> {
        if s.is_empty() || !s.is_ascii() {
            return Err(MergeError::VersionParse(s.to_string()));
        }

        // Epoch is the part before the first colon, if present.
        let (epoch, remainder) = match s.split_once(':') {
            Some((epoch, remainder)) => {
                if epoch.is_empty() || !epoch.bytes().all(|b| b.is_ascii_digit()) {
                    return Err(MergeError::EpochNonNumeric(s.to_string()));
                }

                let epoch = epoch
                    .parse::<u32>()
                    .map_err(|_| MergeError::EpochNonNumeric(s.to_string()))?;

                (epoch, remainder)
            }
            None => (0, s),
        };

        // upstream and revision are separated by the last hyphen. No hyphen
        // means no revision.
        let (upstream, revision) = match remainder.rsplit_once('-') {
            Some((upstream, revision)) => (upstream, revision),
            None => (remainder, ""),
        };

        if upstream.is_empty() {
            return Err(MergeError::VersionParse(s.to_string()));
        }

        // The upstream version may contain alphanumerics and `. + ~`, plus
        // `-` when a revision is present and `:` when an epoch is present.
        if !upstream.chars().all(|c| match c {
            c if c.is_ascii_alphanumeric() => true,
            '.' | '+' | '~' | '-' => true,
            ':' => s.contains(':'),
            _ => false,
        }) {
            return Err(MergeError::UpstreamVersionIllegalChar(s.to_string()));
        }

        // The revision may contain alphanumerics and `+ . ~`.
        if !revision.chars().all(|c| match c {
            c if c.is_ascii_alphanumeric() => true,
            '+' | '.' | '~' => true,
            _ => false,
        }) {
            return Err(MergeError::RevisionIllegalChar(s.to_string()));
        }

        Ok(Self {
            epoch,
            upstream: upstream.to_string(),
            revision: revision.to_string(),
        })
    }

    /// The `epoch` component. `0` when not explicitly present.
    pub fn epoch(&self) -> u32 {
        self.epoch
    }

    /// The `upstream_version` component.
    pub fn upstream_version(&self) -> &str {
        &self.upstream
    }

    /// The `revision` component. Empty when not present.
    pub fn revision(&self) -> &str {
        &self.revision
    }
}

impl Display for PackageVersion {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.epoch != 0 {
            write!(f, "{}:", self.epoch)?;
        }

        f.write_str(&self.upstream)?;

        if !self.revision.is_empty() {
            write!(f, "-{}", self.revision)?;
        }

        Ok(())
    }
}

/// Sort key for a character position in the modified lexical ordering.
///
/// `~` sorts before everything, including the end of the string. The end of
/// the string sorts before any other character. Letters sort before all
/// remaining characters, which compare by code point.
fn char_order(c: Option<char>) -> (u8, u8) {
    match c {
        Some('~') => (0, 0),
        None => (1, 0),
        Some(c) if c.is_ascii_alphabetic() => (2, c as u8),
        Some(c) => (3, c as u8),
    }
}

/// Compare two runs of non-digit characters using the modified lexical order.
fn compare_nondigit_runs(a: &str, b: &str) -> Ordering {
    let mut a_chars = a.chars();
    let mut b_chars = b.chars();

    loop {
        let (x, y) = (a_chars.next(), b_chars.next());

        if x.is_none() && y.is_none() {
            return Ordering::Equal;
        }

        match char_order(x).cmp(&char_order(y)) {
            Ordering::Equal => {}
            res => return res,
        }
    }
}

/// Compare two runs of digit characters numerically.
///
/// Leading zeroes are discarded rather than parsed so arbitrarily long runs
/// cannot overflow. An empty run counts as zero.
fn compare_digit_runs(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');

    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn split_at_first_digit(s: &str) -> (&str, &str) {
    s.split_at(s.find(|c: char| c.is_ascii_digit()).unwrap_or(s.len()))
}

fn split_at_first_nondigit(s: &str) -> (&str, &str) {
    s.split_at(s.find(|c: char| !c.is_ascii_digit()).unwrap_or(s.len()))
}

/// Compare one version component (upstream or revision) per Debian rules.
///
/// Alternating maximal runs of non-digits and digits are peeled off both
/// inputs until a difference is found or both are exhausted.
fn compare_component(a: &str, b: &str) -> Ordering {
    let mut a_remaining = a;
    let mut b_remaining = b;

    loop {
        let (a_run, a_rest) = split_at_first_digit(a_remaining);
        let (b_run, b_rest) = split_at_first_digit(b_remaining);

        match compare_nondigit_runs(a_run, b_run) {
            Ordering::Equal => {}
            res => return res,
        }

        let (a_num, a_rest) = split_at_first_nondigit(a_rest);
        let (b_num, b_rest) = split_at_first_nondigit(b_rest);

        match compare_digit_runs(a_num, b_num) {
            Ordering::Equal => {}
            res => return res,
        }

        if a_rest.is_empty() && b_rest.is_empty() {
            return Ordering::Equal;
        }

        a_remaining = a_rest;
        b_remaining = b_rest;
    }
}

impl Ord for PackageVersion {
    fn cmp(&self, other: &Self) -> Ordering {
        self.epoch
            .cmp(&other.epoch)
            .then_with(|| compare_component(&self.upstream, &other.upstream))
            .then_with(|| compare_component(&self.revision, &other.revision))
    }
}

impl PartialOrd for PackageVersion {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

// Equality is defined by the ordering, not by structure, so `1.00` and `1.0`
// are equal, as are `1.0` and `1.0-0`.
impl PartialEq for PackageVersion {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for PackageVersion {}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> PackageVersion {
        PackageVersion::parse(s).unwrap()
    }

    #[test]
    fn parse() -> Result<()> {
        let version = PackageVersion::parse("1:4.7.0+dfsg1-2")?;
        assert_eq!(version.epoch(), 1);
        assert_eq!(version.upstream_version(), "4.7.0+dfsg1");
        assert_eq!(version.revision(), "2");

        let version = PackageVersion::parse("3.3.2.final~github")?;
        assert_eq!(version.epoch(), 0);
        assert_eq!(version.upstream_version(), "3.3.2.final~github");
        assert_eq!(version.revision(), "");

        // The revision starts at the last hyphen.
        let version = PackageVersion::parse("0.18.0+dfsg-2+b1")?;
        assert_eq!(version.upstream_version(), "0.18.0+dfsg");
        assert_eq!(version.revision(), "2+b1");

        Ok(())
    }

    #[test]
    fn parse_rejects_malformed() {
        assert!(matches!(
            PackageVersion::parse(""),
            Err(MergeError::VersionParse(_))
        ));
        assert!(matches!(
            PackageVersion::parse("1.0\u{e9}"),
            Err(MergeError::VersionParse(_))
        ));
        assert!(matches!(
            PackageVersion::parse("abc:1.0"),
            Err(MergeError::EpochNonNumeric(_))
        ));
        assert!(matches!(
            PackageVersion::parse(":1.0"),
            Err(MergeError::EpochNonNumeric(_))
        ));
        assert!(matches!(
            PackageVersion::parse("1.0_1"),
            Err(MergeError::UpstreamVersionIllegalChar(_))
        ));
        assert!(matches!(
            PackageVersion::parse("1.0-1_2"),
            Err(MergeError::RevisionIllegalChar(_))
        ));
    }

    #[test]
    fn format() -> Result<()> {
        for s in ["1:4.7.0+dfsg1-2", "3.3.2.final~github", "0.18.0+dfsg-2+b1"] {
            assert_eq!(format!("{}", PackageVersion::parse(s)?), s);
        }

        Ok(())
    }

    #[test]
    fn ordering_table() {
        use Ordering::*;

        let cases = vec![
            ("1.0", Equal, "1.0"),
            ("1.0", Equal, "1.00"),
            ("1.0", Equal, "1.0-0"),
            ("1.1.1", Less, "1.1.2"),
            ("1a", Less, "1b"),
            ("1", Less, "1.1"),
            ("1.2", Less, "1.11"),
            ("1.0-1", Less, "1.0-2"),
            ("1.0-1", Less, "1.0-12"),
            ("1:0.5", Greater, "2.0"),
            ("1:500", Less, "1:5000"),
            ("100:500", Greater, "11:5000"),
            ("1.0~rc1", Less, "1.0"),
            ("1.0~", Less, "1.0"),
            ("1.0~beta1~svn1245", Less, "1.0~beta1"),
            ("1.0a", Less, "1.0b"),
            ("1.0a", Less, "1.0+a"),
            ("1.0.4-2", Greater, "1.0pre7-2"),
            ("1.5rc1", Less, "1.5"),
            ("1.5rc1", Less, "1.5+1"),
            ("1.5rc1", Greater, "1.5dev0"),
            ("0.9.2-5", Less, "0.9.2+cvs.1.0.dev.2004.07.28-1"),
            ("2.4.7-1", Less, "2.4.7-z"),
            ("1.002-1+b2", Greater, "1.00"),
        ];

        for (a, expected, b) in cases {
            assert_eq!(v(a).cmp(&v(b)), expected, "{} vs {}", a, b);
            assert_eq!(v(b).cmp(&v(a)), expected.reverse(), "{} vs {}", b, a);
        }
    }

    #[test]
    fn ordering_is_transitive() {
        // A tilde sorts before end of string, which sorts before letters,
        // which sort before other characters.
        let mut sorted = vec!["1.0~~", "1.0~", "1.0", "1.0a", "1.0+", "1.0.1"];
        let original = sorted.clone();

        sorted.sort_by(|a, b| v(a).cmp(&v(b)));
        assert_eq!(sorted, original);
    }

    #[test]
    fn equality_follows_ordering() {
        assert_eq!(v("1.0"), v("1.00"));
        assert_eq!(v("0:1.0"), v("1.0"));
        assert_ne!(v("1.0"), v("1.0.0"));
    }

    #[test]
    fn long_digit_runs_do_not_overflow() {
        let big = "1.184467440737095516161844674407370955161";
        assert_eq!(v(big).cmp(&v(big)), Ordering::Equal);
        assert_eq!(v(big).cmp(&v("1.2")), Ordering::Greater);
    }
}
