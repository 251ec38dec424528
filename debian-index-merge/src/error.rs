// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Error handling. */

use thiserror::Error;

/// Primary crate error type.
#[derive(Debug, Error)]
pub enum MergeError {
    #[error("I/O error: {0:?}")]
    Io(#[from] std::io::Error),

    #[error("repository I/O error on path {0}: {1:?}")]
    RepositoryIoPath(String, std::io::Error),

    #[error("index archive not found: {0}")]
    IndexArchiveNotFound(String),

    #[error("control file parse error: {0}")]
    ControlParse(String),

    #[error("required control field missing: {0}")]
    ControlRequiredFieldMissing(&'static str),

    #[error("version string is not parseable: {0}")]
    VersionParse(String),

    #[error("the epoch component is not numeric: {0}")]
    EpochNonNumeric(String),

    #[error("upstream version component has illegal character: {0}")]
    UpstreamVersionIllegalChar(String),

    #[error("revision component has illegal character: {0}")]
    RevisionIllegalChar(String),

    #[error("failed to parse dependency expression: {0}")]
    DependencyParse(String),

    #[error("rewriter altered the identity of package {0}")]
    RewriterChangedIdentity(String),
}

/// Result wrapper for this crate.
pub type Result<T> = std::result::Result<T, MergeError>;
