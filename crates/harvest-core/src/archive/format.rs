use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use bzip2::read::BzDecoder;
use flate2::read::GzDecoder;
use serde::Serialize;
use zip::ZipArchive;

use crate::HarvestError;

const GZIP_MAGIC: [u8; 2] = [0x1F, 0x8B];
const BZIP2_MAGIC: [u8; 3] = [0x42, 0x5A, 0x68];
const TAR_BLOCK: usize = 512;
const CHECKSUM_FIELD: std::ops::Range<usize> = 148..156;

/// Compression layered over a tar stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    Gzip,
    Bzip2,
}

impl Compression {
    #[must_use]
    pub fn from_magic_bytes(bytes: &[u8]) -> Self {
        if bytes.starts_with(&GZIP_MAGIC) {
            return Self::Gzip;
        }
        if bytes.starts_with(&BZIP2_MAGIC) {
            return Self::Bzip2;
        }
        Self::None
    }

    pub(crate) fn decoder<'r, R: Read + 'r>(self, reader: R) -> Box<dyn Read + 'r> {
        match self {
            Self::None => Box::new(reader),
            Self::Gzip => Box::new(GzDecoder::new(reader)),
            Self::Bzip2 => Box::new(BzDecoder::new(reader)),
        }
    }
}

/// Container format of a downloaded archive, decided once by content sniffing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "container", content = "compression", rename_all = "lowercase")]
pub enum ArchiveFormat {
    Tar(Compression),
    Zip,
}

impl ArchiveFormat {
    /// Tar-family signatures are tried first, then zip.
    ///
    /// # Errors
    ///
    /// `UnknownArchiveFormat` when neither matches, `Extraction` when the file
    /// cannot be read at all.
    pub fn sniff(path: &Path) -> Result<Self, HarvestError> {
        let mut head = Vec::with_capacity(TAR_BLOCK);
        File::open(path)
            .and_then(|file| file.take(TAR_BLOCK as u64).read_to_end(&mut head))
            .map_err(|err| HarvestError::extraction(path, err))?;

        let compression = Compression::from_magic_bytes(&head);
        if is_tar(path, compression) {
            return Ok(Self::Tar(compression));
        }
        if is_zip(path) {
            return Ok(Self::Zip);
        }
        Err(HarvestError::UnknownArchiveFormat {
            path: path.to_path_buf(),
        })
    }
}

fn is_tar(path: &Path, compression: Compression) -> bool {
    let Ok(file) = File::open(path) else {
        return false;
    };
    let mut reader = compression.decoder(BufReader::new(file));
    let mut block = [0_u8; TAR_BLOCK];
    match read_block(&mut reader, &mut block) {
        Ok(true) => header_checksum_matches(&block),
        Ok(false) | Err(_) => false,
    }
}

fn read_block(reader: &mut dyn Read, block: &mut [u8; TAR_BLOCK]) -> io::Result<bool> {
    match reader.read_exact(block) {
        Ok(()) => Ok(true),
        Err(err) if err.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(err) => Err(err),
    }
}

/// A tar header stores the unsigned byte sum of the block, with the checksum
/// field itself counted as spaces, in octal.
pub(crate) fn header_checksum_matches(block: &[u8; TAR_BLOCK]) -> bool {
    let field = &block[CHECKSUM_FIELD];
    let digits: String = field
        .iter()
        .map(|&b| b as char)
        .filter(|c| !matches!(c, '\0' | ' '))
        .collect();
    let Ok(stored) = u32::from_str_radix(&digits, 8) else {
        return false;
    };
    let computed: u32 = block
        .iter()
        .enumerate()
        .map(|(idx, &byte)| {
            if CHECKSUM_FIELD.contains(&idx) {
                u32::from(b' ')
            } else {
                u32::from(byte)
            }
        })
        .sum();
    stored == computed
}

fn is_zip(path: &Path) -> bool {
    File::open(path)
        .ok()
        .is_some_and(|file| ZipArchive::new(BufReader::new(file)).is_ok())
}
