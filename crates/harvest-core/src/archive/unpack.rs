use std::fs::{self, File};
use std::io::{self, BufReader, Read};
use std::path::{Component, Path, PathBuf};

#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;

use tracing::{trace, warn};
use zip::ZipArchive;

use super::format::Compression;
use crate::HarvestError;

/// What an unpack pass wrote, in the archive's own listing order.
#[derive(Debug, Default)]
pub(crate) struct Unpacked {
    pub(crate) first_member: Option<PathBuf>,
    pub(crate) members: usize,
    pub(crate) skipped: usize,
}

impl Unpacked {
    fn accept(&mut self, relative: &Path) {
        if self.first_member.is_none() {
            self.first_member = Some(relative.to_path_buf());
        }
        self.members += 1;
    }

    fn skip(&mut self, archive: &Path, member: &str, reason: &str) {
        warn!(archive = %archive.display(), member, reason, "skipping archive member");
        self.skipped += 1;
    }
}

/// Where a member path lands once `.` components are dropped.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum MemberPath {
    Inside(PathBuf),
    /// Names the destination itself, e.g. the `./` entry of `tar czf x.tgz .`.
    Empty,
    Escapes,
}

/// Normalize a member path, refusing anything that could land outside the destination.
pub(crate) fn sanitize_member_path(raw: &Path) -> MemberPath {
    let mut clean = PathBuf::new();
    for component in raw.components() {
        match component {
            Component::Normal(part) => clean.push(part),
            Component::CurDir => {}
            Component::ParentDir | Component::RootDir | Component::Prefix(_) => {
                return MemberPath::Escapes
            }
        }
    }
    if clean.as_os_str().is_empty() {
        MemberPath::Empty
    } else {
        MemberPath::Inside(clean)
    }
}

pub(crate) fn unpack_tar(
    archive: &Path,
    compression: Compression,
    dest: &Path,
) -> Result<Unpacked, HarvestError> {
    let file = File::open(archive).map_err(|err| HarvestError::extraction(archive, err))?;
    let reader = compression.decoder(BufReader::new(file));
    let mut tar = tar::Archive::new(reader);
    let mut unpacked = Unpacked::default();
    let entries = tar
        .entries()
        .map_err(|err| HarvestError::extraction(archive, err))?;
    for entry in entries {
        let mut entry = entry.map_err(|err| HarvestError::extraction(archive, err))?;
        let raw = entry
            .path()
            .map_err(|err| HarvestError::extraction(archive, err))?
            .into_owned();
        let member_name = raw.to_string_lossy().into_owned();
        let kind = entry.header().entry_type();
        if kind.is_pax_global_extensions() {
            continue;
        }
        if !(kind.is_file() || kind.is_dir()) {
            unpacked.skip(archive, &member_name, "unsupported entry type");
            continue;
        }
        let relative = match sanitize_member_path(&raw) {
            MemberPath::Inside(relative) => relative,
            MemberPath::Empty => continue,
            MemberPath::Escapes => {
                unpacked.skip(archive, &member_name, "path escapes the destination");
                continue;
            }
        };
        let target = dest.join(&relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|err| HarvestError::extraction(archive, err))?;
        }
        entry
            .unpack(&target)
            .map_err(|err| HarvestError::extraction(archive, format!("{member_name}: {err}")))?;
        trace!(member = %member_name, "unpacked");
        unpacked.accept(&relative);
    }
    Ok(unpacked)
}

pub(crate) fn unpack_zip(archive: &Path, dest: &Path) -> Result<Unpacked, HarvestError> {
    let file = File::open(archive).map_err(|err| HarvestError::extraction(archive, err))?;
    let mut zip =
        ZipArchive::new(BufReader::new(file)).map_err(|err| HarvestError::extraction(archive, err))?;
    let mut unpacked = Unpacked::default();
    for index in 0..zip.len() {
        let mut entry = zip
            .by_index(index)
            .map_err(|err| HarvestError::extraction(archive, err))?;
        let name = entry.name().to_string();
        let relative = match sanitize_member_path(Path::new(&name)) {
            MemberPath::Inside(relative) => relative,
            MemberPath::Empty => continue,
            MemberPath::Escapes => {
                unpacked.skip(archive, &name, "path escapes the destination");
                continue;
            }
        };
        let target = dest.join(&relative);
        if name.ends_with('/') || entry.is_dir() {
            fs::create_dir_all(&target).map_err(|err| HarvestError::extraction(archive, err))?;
            unpacked.accept(&relative);
            continue;
        }
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|err| HarvestError::extraction(archive, err))?;
        }
        write_member(&mut entry, &target)
            .map_err(|err| HarvestError::extraction(archive, format!("{name}: {err}")))?;
        #[cfg(unix)]
        {
            if let Some(mode) = entry.unix_mode() {
                // Keep permission bits only; never restore setuid/setgid.
                fs::set_permissions(&target, fs::Permissions::from_mode(mode & 0o777))
                    .map_err(|err| HarvestError::extraction(archive, err))?;
            }
        }
        trace!(member = %name, "unpacked");
        unpacked.accept(&relative);
    }
    Ok(unpacked)
}

fn write_member(reader: &mut dyn Read, target: &Path) -> io::Result<()> {
    // A previous extraction may have left a read-only copy behind.
    match fs::remove_file(target) {
        Err(err) if err.kind() != io::ErrorKind::NotFound => return Err(err),
        _ => {}
    }
    let mut outfile = File::create(target)?;
    io::copy(reader, &mut outfile)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitize_keeps_relative_paths() {
        assert_eq!(
            sanitize_member_path(Path::new("./demo-1.0/src/demo.py")),
            MemberPath::Inside(PathBuf::from("demo-1.0/src/demo.py"))
        );
        assert_eq!(
            sanitize_member_path(Path::new("demo-1.0/")),
            MemberPath::Inside(PathBuf::from("demo-1.0"))
        );
    }

    #[test]
    fn sanitize_treats_bare_current_dir_as_empty() {
        assert_eq!(sanitize_member_path(Path::new("./")), MemberPath::Empty);
        assert_eq!(sanitize_member_path(Path::new(".")), MemberPath::Empty);
    }

    #[test]
    fn sanitize_rejects_escapes() {
        assert_eq!(sanitize_member_path(Path::new("../evil.py")), MemberPath::Escapes);
        assert_eq!(
            sanitize_member_path(Path::new("demo/../../evil.py")),
            MemberPath::Escapes
        );
        assert_eq!(sanitize_member_path(Path::new("/etc/passwd")), MemberPath::Escapes);
    }
}
