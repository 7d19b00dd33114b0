//! Archive builders for tests. Names are written verbatim so hostile entries can be produced.

use std::io::{Cursor, Write};

use tar::{EntryType, Header};
use zip::write::FileOptions;

#[derive(Clone, Copy)]
pub(crate) enum TarCompression {
    None,
    Gzip,
    Bzip2,
}

/// `None` content marks a directory entry.
pub(crate) type Entry<'a> = (&'a str, Option<&'a str>);

pub(crate) fn tar_bytes(entries: &[Entry<'_>], compression: TarCompression) -> Vec<u8> {
    let mut builder = tar::Builder::new(Vec::new());
    for (name, contents) in entries {
        let mut header = Header::new_ustar();
        let field = &mut header.as_old_mut().name;
        field[..name.len()].copy_from_slice(name.as_bytes());
        header.set_mtime(0);
        match contents {
            Some(data) => {
                header.set_entry_type(EntryType::Regular);
                header.set_mode(0o644);
                header.set_size(data.len() as u64);
                header.set_cksum();
                builder.append(&header, data.as_bytes()).expect("append file");
            }
            None => {
                header.set_entry_type(EntryType::Directory);
                header.set_mode(0o755);
                header.set_size(0);
                header.set_cksum();
                builder.append(&header, std::io::empty()).expect("append dir");
            }
        }
    }
    let raw = builder.into_inner().expect("finish tar");
    match compression {
        TarCompression::None => raw,
        TarCompression::Gzip => {
            let mut encoder =
                flate2::write::GzEncoder::new(Vec::new(), flate2::Compression::default());
            encoder.write_all(&raw).expect("gzip");
            encoder.finish().expect("gzip finish")
        }
        TarCompression::Bzip2 => {
            let mut encoder =
                bzip2::write::BzEncoder::new(Vec::new(), bzip2::Compression::default());
            encoder.write_all(&raw).expect("bzip2");
            encoder.finish().expect("bzip2 finish")
        }
    }
}

pub(crate) fn zip_bytes(entries: &[Entry<'_>]) -> Vec<u8> {
    zip_bytes_with_mode(entries, 0o644)
}

/// Like [`zip_bytes`], with every file member stored under `mode`.
pub(crate) fn zip_bytes_with_mode(entries: &[Entry<'_>], mode: u32) -> Vec<u8> {
    let mut writer = zip::ZipWriter::new(Cursor::new(Vec::new()));
    for (name, contents) in entries {
        match contents {
            Some(data) => {
                writer
                    .start_file(*name, FileOptions::default().unix_permissions(mode))
                    .expect("start file");
                writer.write_all(data.as_bytes()).expect("write zip entry");
            }
            None => writer
                .add_directory(*name, FileOptions::default())
                .expect("add dir"),
        }
    }
    writer.finish().expect("finish zip").into_inner()
}
