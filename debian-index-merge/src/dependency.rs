// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Package relationship fields.

Fields like `Depends` and `Pre-Depends` hold a comma-separated list of
*clauses*; each clause offers one or more `|`-separated *alternatives*. An
alternative names a package, optionally restricted by a parenthesized version
constraint and a bracketed architecture qualifier:

```text
libc6 (>= 2.4), default-mta | mail-transport-agent, foo [amd64]
```

Constraints and qualifiers are validated for well-formedness but carry no
meaning for exclusion decisions, which only look at package names.
*/

use {
    crate::error::{MergeError, Result},
    nom::{
        bytes::complete::{take_while, take_while1},
        character::complete::{char, multispace0},
        combinator::{all_consuming, map_opt, opt, recognize},
        sequence::{delimited, pair, preceded, separated_pair},
        IResult,
    },
};

/// Relation operator inside a version constraint.
///
/// The single-character `<` and `>` forms are deprecated spellings of
/// `<=` and `>=`.
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum VersionRelation {
    StrictlyEarlier,
    EarlierEqual,
    Exactly,
    LaterEqual,
    StrictlyLater,
}

impl VersionRelation {
    fn from_operator(op: &str) -> Option<Self> {
        match op {
            "<<" => Some(Self::StrictlyEarlier),
            "<=" | "<" => Some(Self::EarlierEqual),
            "=" => Some(Self::Exactly),
            ">=" | ">" => Some(Self::LaterEqual),
            ">>" => Some(Self::StrictlyLater),
            _ => None,
        }
    }
}

/// A parenthesized version constraint, e.g. `(>= 1.2.3)`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct VersionConstraint {
    relation: VersionRelation,
    version: String,
}

impl VersionConstraint {
    pub fn relation(&self) -> VersionRelation {
        self.relation
    }

    pub fn version(&self) -> &str {
        &self.version
    }
}

/// One alternative within a dependency clause.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DependencyAlternative {
    package: String,
    constraint: Option<VersionConstraint>,
    architectures: Option<String>,
}

impl DependencyAlternative {
    /// Name of the depended-upon package.
    pub fn package(&self) -> &str {
        &self.package
    }

    /// Version constraint, if one was given.
    pub fn constraint(&self) -> Option<&VersionConstraint> {
        self.constraint.as_ref()
    }

    /// Raw architecture qualifier content, if one was given.
    pub fn architectures(&self) -> Option<&str> {
        self.architectures.as_deref()
    }
}

/// A dependency clause: an ordered sequence of OR alternatives.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct DependencyClause {
    alternatives: Vec<DependencyAlternative>,
}

impl DependencyClause {
    /// The alternatives able to satisfy this clause.
    pub fn alternatives(&self) -> &[DependencyAlternative] {
        &self.alternatives
    }

    /// Iterate the package names of the alternatives.
    pub fn package_names(&self) -> impl Iterator<Item = &str> {
        self.alternatives.iter().map(|a| a.package())
    }
}

fn package_name(i: &str) -> IResult<&str, &str> {
    recognize(pair(
        take_while1(|c: char| c.is_ascii_lowercase() || c.is_ascii_digit()),
        take_while(|c: char| {
            c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '+' | '-' | '.')
        }),
    ))(i)
}

fn relation_operator(i: &str) -> IResult<&str, &str> {
    take_while1(|c| matches!(c, '<' | '>' | '='))(i)
}

fn constraint_version(i: &str) -> IResult<&str, &str> {
    take_while1(|c: char| c.is_ascii_alphanumeric() || matches!(c, '.' | '+' | '-' | '~' | ':'))(i)
}

fn version_constraint(i: &str) -> IResult<&str, VersionConstraint> {
    delimited(
        pair(char('('), multispace0),
        map_opt(
            separated_pair(relation_operator, multispace0, constraint_version),
            |(op, version)| {
                VersionRelation::from_operator(op).map(|relation| VersionConstraint {
                    relation,
                    version: version.to_string(),
                })
            },
        ),
        pair(multispace0, char(')')),
    )(i)
}

fn arch_qualifier(i: &str) -> IResult<&str, &str> {
    delimited(char('['), take_while1(|c| c != ']'), char(']'))(i)
}

fn alternative(i: &str) -> IResult<&str, DependencyAlternative> {
    let (i, _) = multispace0(i)?;
    let (i, package) = package_name(i)?;
    let (i, constraint) = opt(preceded(multispace0, version_constraint))(i)?;
    let (i, architectures) = opt(preceded(multispace0, arch_qualifier))(i)?;
    let (i, _) = multispace0(i)?;

    Ok((
        i,
        DependencyAlternative {
            package: package.to_string(),
            constraint,
            architectures: architectures.map(ToString::to_string),
        },
    ))
}

/// Parse a relationship field value into dependency clauses.
///
/// Absent or empty input yields no clauses. A single malformed alternative
/// fails the whole field; clauses are never silently dropped.
pub fn parse_depends(field: &str) -> Result<Vec<DependencyClause>> {
    let field = field.trim();

    if field.is_empty() {
        return Ok(Vec::new());
    }

    let mut clauses = Vec::new();

    for clause_text in field.split(',') {
        let mut alternatives = Vec::new();

        for alt_text in clause_text.split('|') {
            let (_, alt) = all_consuming(alternative)(alt_text)
                .map_err(|_| MergeError::DependencyParse(alt_text.trim().to_string()))?;

            alternatives.push(alt);
        }

        clauses.push(DependencyClause { alternatives });
    }

    Ok(clauses)
}
