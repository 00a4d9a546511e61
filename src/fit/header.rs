//! Fixed-layout pieces of the FIT framing.

use either::Either::{self, Left, Right};
use tartan_bitfield::bitfield;
use zerocopy::FromBytes;

use super::FitError;

pub(super) struct FileInfo {
    /// Number of record bytes following the header.
    pub data_size: u32,
    /// Whether two further header bytes follow the leading twelve.
    pub extended: bool,
}

/// Decode the leading document header.
pub(super) fn parse_file_header(r: [u8; 12]) -> Result<FileInfo, FitError> {
    #[repr(C, packed)]
    #[derive(FromBytes)]
    struct FileHeader {
        header_size: u8,
        protocol_version: u8,
        profile_version: u16,
        data_size: u32,
        data_type: [u8; 4],
    }

    let FileHeader {
        header_size,
        data_size,
        data_type,
        ..
    } = zerocopy::transmute!(r);

    if &data_type != b".FIT" {
        return Err(FitError::NotFitData);
    }

    let extended = match header_size {
        14 => true,
        12 => false,
        n => return Err(FitError::UnknownHeaderLength(n)),
    };

    Ok(FileInfo {
        data_size,
        extended,
    })
}

/// Decode a record header byte into the local message number of a
/// definition record (left) or a data record (right).
pub(super) fn parse_record_header(r: u8, offset: usize) -> Result<Either<u8, u8>, FitError> {
    bitfield! {
        struct RecordHeader(u8) {
            [7] is_compressed,
        }
    }

    if RecordHeader(r).is_compressed() {
        return Err(FitError::CompressedTimestamp { offset });
    }

    bitfield! {
        struct NormalHeader(u8) {
            [0..4] local_message: u8,
            [5] is_developer,
            [6] is_definition,
        }
    }

    let header = NormalHeader(r);

    if header.is_developer() {
        return Err(FitError::DeveloperData { offset });
    }

    Ok(if header.is_definition() {
        Left(header.local_message())
    } else {
        Right(header.local_message())
    })
}

pub(super) struct DefinitionHead {
    pub little_endian: bool,
    pub global: u16,
    pub field_count: u8,
}

/// Decode the fixed prefix of a definition record.
pub(super) fn parse_definition_head(r: [u8; 5]) -> DefinitionHead {
    #[repr(C, packed)]
    #[derive(FromBytes)]
    struct DefinitionMessage {
        _reserved: u8,
        architecture: u8,
        global_message: [u8; 2],
        field_count: u8,
    }

    let DefinitionMessage {
        architecture,
        global_message,
        field_count,
        ..
    } = zerocopy::transmute!(r);

    let little_endian = architecture == 0;
    let global = if little_endian {
        u16::from_le_bytes(global_message)
    } else {
        u16::from_be_bytes(global_message)
    };

    DefinitionHead {
        little_endian,
        global,
        field_count,
    }
}

/// One entry of a definition record's field table.
#[derive(Clone, Copy, Debug)]
pub(super) struct FieldLayout {
    pub number: u8,
    pub size: u8,
    pub base: u8,
}

pub(super) fn parse_field_layout(r: [u8; 3]) -> FieldLayout {
    #[repr(C, packed)]
    #[derive(FromBytes)]
    struct FieldHeader {
        number: u8,
        size: u8,
        base: u8,
    }

    let FieldHeader {
        number,
        size,
        base,
    } = zerocopy::transmute!(r);

    FieldLayout {
        number,
        size,
        base,
    }
}
