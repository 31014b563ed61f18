//! DSE sequence header and track chunk table

use super::reader::ByteReader;
use crate::error::{Error, Result};

/// Container identifier
pub const SMDL_MAGIC: &[u8; 4] = b"smdl";

/// Track chunk identifier
pub const TRACK_MAGIC: &[u8; 4] = b"trk ";

/// Length of the sequence name field
pub const NAME_LENGTH: usize = 15;

/// Header offsets (in bytes)
pub mod offset {
    /// "smdl" identifier
    pub const IDENT: usize = 0x00;
    /// File size
    pub const FILE_SIZE: usize = 0x08;
    /// Sequence name
    pub const NAME: usize = 0x20;
    /// Number of tracks
    pub const TRACK_COUNT: usize = 0x56;
    /// First track chunk
    pub const TRACK_TABLE: usize = 0x80;
}

/// Track chunk layout, relative to the chunk start
pub mod track {
    /// Track data length
    pub const LENGTH: usize = 0x0C;
    /// Start of the track data region
    pub const DATA: usize = 0x10;
    /// Track preamble at the start of the data region, before the opcodes
    pub const PREAMBLE: usize = 0x04;
}

/// Location of one track in the container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TrackChunk {
    /// Offset of the "trk " identifier
    pub offset: usize,
    /// Offset of the track data region
    pub data_offset: usize,
    /// Length of the track data region
    pub length: usize,
}

impl TrackChunk {
    /// Offset of the first opcode
    pub fn opcode_offset(&self) -> usize {
        self.data_offset + track::PREAMBLE
    }
}

/// Parsed DSE sequence header
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SequenceHeader {
    pub file_size: u32,
    pub name: String,
    pub track_count: u8,
    pub tracks: Vec<TrackChunk>,
}

impl SequenceHeader {
    /// Validate the container and read the header plus track table
    pub fn parse(data: &[u8]) -> Result<Self> {
        let reader = ByteReader::new(data);

        let found = reader.peek_tag_at(offset::IDENT)?;
        if &found != SMDL_MAGIC {
            return Err(Error::BadMagic { found });
        }

        let file_size = reader.peek_u32_be_at(offset::FILE_SIZE)?;
        if file_size as usize != data.len() {
            tracing::debug!(
                file_size,
                actual = data.len(),
                "header file size differs from input length"
            );
        }

        let name = parse_name(reader.peek_bytes_at(offset::NAME, NAME_LENGTH)?);
        let track_count = reader.peek_u8_at(offset::TRACK_COUNT)?;

        let mut tracks = Vec::with_capacity(usize::from(track_count));
        let mut pos = offset::TRACK_TABLE;
        for index in 0..usize::from(track_count) {
            let found = reader.peek_tag_at(pos)?;
            if &found != TRACK_MAGIC {
                return Err(Error::BadTrackTag {
                    track: index,
                    offset: pos,
                    found,
                });
            }

            let length = reader.peek_u32_be_at(pos + track::LENGTH)? as usize;
            let chunk = TrackChunk {
                offset: pos,
                data_offset: pos + track::DATA,
                length,
            };
            tracks.push(chunk);

            // Chunks are aligned to 4 bytes
            pos = chunk.data_offset + ((length + 3) & !3);
        }

        Ok(Self {
            file_size,
            name,
            track_count,
            tracks,
        })
    }
}

/// Decode the fixed-width ASCII name field
fn parse_name(raw: &[u8]) -> String {
    let trimmed = raw.split(|&b| b == 0).next().unwrap_or_default();
    let text: String = trimmed
        .iter()
        .map(|&b| if b.is_ascii() { b as char } else { '?' })
        .collect();
    text.trim_matches(|c: char| c == ' ' || c == '\0').to_string()
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    /// Build a container with the given track data regions
    pub(crate) fn build_smdl(name: &str, tracks: &[Vec<u8>]) -> Vec<u8> {
        let mut data = vec![0u8; offset::TRACK_TABLE];
        data[0..4].copy_from_slice(SMDL_MAGIC);
        let name = name.as_bytes();
        data[offset::NAME..offset::NAME + name.len()].copy_from_slice(name);
        data[offset::TRACK_COUNT] = tracks.len() as u8;

        for body in tracks {
            data.extend_from_slice(TRACK_MAGIC);
            data.extend_from_slice(&[0; 8]);
            data.extend_from_slice(&(body.len() as u32).to_be_bytes());
            data.extend_from_slice(body);
            while data.len() % 4 != 0 {
                data.push(0);
            }
        }

        let size = data.len() as u32;
        data[offset::FILE_SIZE..offset::FILE_SIZE + 4].copy_from_slice(&size.to_be_bytes());
        data
    }

    #[test]
    fn test_parse_header() {
        let data = build_smdl("bgm0001", &[vec![0, 0, 0, 0, 0x98], vec![0, 0, 0, 0, 0x98]]);
        let header = SequenceHeader::parse(&data).unwrap();

        assert_eq!(header.name, "bgm0001");
        assert_eq!(header.file_size as usize, data.len());
        assert_eq!(header.track_count, 2);
        assert_eq!(
            header.tracks[0],
            TrackChunk {
                offset: 0x80,
                data_offset: 0x90,
                length: 5
            }
        );
        // 5 bytes of data rounded up to 8
        assert_eq!(header.tracks[1].offset, 0x98);
        assert_eq!(header.tracks[1].opcode_offset(), 0x98 + 0x14);
    }

    #[test]
    fn test_name_trimming() {
        assert_eq!(parse_name(b"  song  \0\0\0\0\0\0\0"), "song");
        assert_eq!(parse_name(b"abc\0garbage\0\0\0\0"), "abc");
        assert_eq!(parse_name(b"\xFFx\0\0\0\0\0\0\0\0\0\0\0\0\0"), "?x");
    }

    #[test]
    fn test_bad_magic() {
        let mut data = build_smdl("x", &[]);
        data[0..4].copy_from_slice(b"swdl");
        match SequenceHeader::parse(&data) {
            Err(Error::BadMagic { found }) => assert_eq!(&found, b"swdl"),
            other => panic!("expected BadMagic, got {:?}", other),
        }
    }

    #[test]
    fn test_bad_track_tag() {
        let mut data = build_smdl("x", &[vec![0, 0, 0, 0, 0x98], vec![0, 0, 0, 0, 0x98]]);
        data[0x98..0x9C].copy_from_slice(b"eoc\x20");
        match SequenceHeader::parse(&data) {
            Err(Error::BadTrackTag { track, offset, .. }) => {
                assert_eq!(track, 1);
                assert_eq!(offset, 0x98);
            }
            other => panic!("expected BadTrackTag, got {:?}", other),
        }
    }

    #[test]
    fn test_truncated_table() {
        let mut data = build_smdl("x", &[vec![0, 0, 0, 0, 0x98]]);
        data[offset::TRACK_COUNT] = 2;
        assert!(matches!(
            SequenceHeader::parse(&data),
            Err(Error::TruncatedFile { .. })
        ));
    }

    #[test]
    fn test_truncated_header() {
        assert!(matches!(
            SequenceHeader::parse(b"smdl\0\0\0\0"),
            Err(Error::TruncatedFile { .. })
        ));
    }
}
