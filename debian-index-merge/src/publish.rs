// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at https://mozilla.org/MPL/2.0/.

/*! Writing merged indices to a repository layout.

A merged index is published as two compressed artifacts next to each other:
a gzip stream for general compatibility and an XZ stream for size. Both
decompress to byte-identical control file text. Which fields are written,
and in which order, is driven by an allow-list so the published index only
carries the fields clients are expected to consume.
*/

use {
    crate::{
        error::{MergeError, Result},
        package_index::PackageIndex,
    },
    std::{
        ffi::OsString,
        io::Write,
        path::{Path, PathBuf},
    },
    xz2::write::XzEncoder,
};

fn io_path_error(path: &Path) -> impl FnOnce(std::io::Error) -> MergeError + '_ {
    move |e| MergeError::RepositoryIoPath(format!("{}", path.display()), e)
}

fn path_with_suffix(path: &Path, suffix: &str) -> PathBuf {
    let mut s = OsString::from(path.as_os_str());
    s.push(suffix);
    PathBuf::from(s)
}

/// Render the index to uncompressed control file text.
///
/// For every record, the fields present in both the record and `keys` are
/// written in `keys` order as `Key: Value` lines, followed by a blank line.
/// Records are ordered by package name when `sort_by_name` is set, else by
/// index insertion order.
fn render_index(index: &PackageIndex, keys: &[String], sort_by_name: bool) -> Vec<u8> {
    let mut entries = index.iter().collect::<Vec<_>>();
    if sort_by_name {
        entries.sort_by_key(|(name, _)| *name);
    }

    let mut body = Vec::new();

    for (_, record) in entries {
        for key in keys {
            if let Some(field) = record.field(key) {
                field
                    .write(&mut body)
                    .expect("write to a Vec cannot fail");
            }
        }

        body.push(b'\n');
    }

    body
}

fn write_gzip(path: &Path, body: &[u8]) -> Result<()> {
    let file = std::fs::File::create(path).map_err(io_path_error(path))?;
    let mut encoder = libflate::gzip::Encoder::new(file).map_err(io_path_error(path))?;
    encoder.write_all(body).map_err(io_path_error(path))?;
    encoder
        .finish()
        .into_result()
        .map_err(io_path_error(path))?;

    Ok(())
}

fn write_xz(path: &Path, body: &[u8]) -> Result<()> {
    let file = std::fs::File::create(path).map_err(io_path_error(path))?;
    let mut encoder = XzEncoder::new(file, 6);
    encoder.write_all(body).map_err(io_path_error(path))?;
    encoder.finish().map_err(io_path_error(path))?;

    Ok(())
}

/// Write the `<dest>.gz` and `<dest>.xz` artifacts for a merged index.
///
/// `dest` is the canonical uncompressed path, e.g.
/// `dists/ceres/main/binary-amd64/Packages`. Parent directories are created
/// as needed. Errors are fatal to this index only; the caller decides
/// whether sibling work continues.
pub fn write_index_files(
    index: &PackageIndex,
    dest: &Path,
    keys: &[String],
    sort_by_name: bool,
) -> Result<()> {
    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent).map_err(io_path_error(parent))?;
    }

    let body = render_index(index, keys, sort_by_name);

    write_gzip(&path_with_suffix(dest, ".gz"), &body)?;
    write_xz(&path_with_suffix(dest, ".xz"), &body)?;

    Ok(())
}

/// Ensure a `Release` file exists next to a just-written index.
///
/// If the sibling `Release` is missing and `fallback` exists, the fallback
/// (typically the lower layer distribution's own `Release`) is copied into
/// place. Returns whether a copy happened.
pub fn ensure_release_file(dest: &Path, fallback: &Path) -> Result<bool> {
    let release = match dest.parent() {
        Some(parent) => parent.join("Release"),
        None => return Ok(false),
    };

    if release.exists() || !fallback.is_file() {
        return Ok(false);
    }

    std::fs::copy(fallback, &release).map_err(io_path_error(&release))?;

    Ok(true)
}
