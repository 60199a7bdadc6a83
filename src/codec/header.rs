//! File header protocol: every part file opens with a magic constant and a
//! format version, checked before any body page is read.

use std::io::{Read, Write};

use crate::error::{PartError, Result};

/// Magic constant at the start of every part file.
pub const MAGIC: u32 = 0x1BAD_CAFE;

/// Current format version; loaders reject anything older.
pub const UP_TO_DATE_VERSION: u64 = 1;

/// Byte length of the file header preceding the first page.
pub const FILE_HEADER_LEN: usize = 12;

/// Writes the magic/version header.
pub fn write_file_header(w: &mut impl Write) -> Result<()> {
    w.write_all(&MAGIC.to_le_bytes())?;
    w.write_all(&UP_TO_DATE_VERSION.to_le_bytes())?;
    Ok(())
}

/// Validates the header, returning the file's version on success.
pub fn check_file_header(r: &mut impl Read) -> Result<u64> {
    let mut buf = [0u8; FILE_HEADER_LEN];
    r.read_exact(&mut buf)
        .map_err(|_| PartError::NotAValidFile)?;
    let magic = u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]);
    if magic != MAGIC {
        return Err(PartError::NotAValidFile);
    }
    let version = u64::from_le_bytes(
        buf[4..12]
            .try_into()
            .expect("slice has exactly 8 bytes"),
    );
    if version < UP_TO_DATE_VERSION {
        return Err(PartError::Outdated {
            found: version,
            required: UP_TO_DATE_VERSION,
        });
    }
    Ok(version)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_round_trip() {
        let mut buf = Vec::new();
        write_file_header(&mut buf).expect("write header");
        assert_eq!(buf.len(), FILE_HEADER_LEN);
        let version = check_file_header(&mut Cursor::new(&buf)).expect("check header");
        assert_eq!(version, UP_TO_DATE_VERSION);
    }

    #[test]
    fn corrupted_magic_is_rejected() {
        let mut buf = Vec::new();
        write_file_header(&mut buf).unwrap();
        buf[0] ^= 0xFF;
        assert!(matches!(
            check_file_header(&mut Cursor::new(&buf)),
            Err(PartError::NotAValidFile)
        ));
    }

    #[test]
    fn outdated_version_is_rejected() {
        let mut buf = Vec::new();
        buf.extend_from_slice(&MAGIC.to_le_bytes());
        buf.extend_from_slice(&(UP_TO_DATE_VERSION - 1).to_le_bytes());
        assert!(matches!(
            check_file_header(&mut Cursor::new(&buf)),
            Err(PartError::Outdated { .. })
        ));
    }

    #[test]
    fn truncated_header_is_not_a_valid_file() {
        let buf = MAGIC.to_le_bytes();
        assert!(matches!(
            check_file_header(&mut Cursor::new(&buf[..])),
            Err(PartError::NotAValidFile)
        ));
    }
}
