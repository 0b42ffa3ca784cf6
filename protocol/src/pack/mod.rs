//! # Packfile Codec
//!
//! Reads and writes the v2 pack container for versioned-content objects.
//! The format, bit for bit:
//!
//! ```text
//! "PACK" | version (u32 BE) | object count (u32 BE)
//! entry*                                  ← one per object
//! SHA-1 of everything above (20 bytes)
//! ```
//!
//! Each entry is a type-and-size header followed by a zlib stream. The
//! first header byte packs the type into bits 6..4 and the low four size
//! bits into bits 3..0; bit 7 says more size bytes follow, MSB-continued
//! 7-bit groups starting at shift 4.
//!
//! Two entry types are deltas rather than whole objects:
//!
//! - `OFS_DELTA` names its base by a backwards distance within the pack,
//!   in the peculiar encoding where each continuation adds one before
//!   shifting (so consecutive byte counts nest without redundancy).
//! - `REF_DELTA` names its base by 20-byte object id. The base may appear
//!   *later* in the pack, so unresolved ref deltas accumulate during the
//!   entry loop and are resolved in passes afterwards; whatever still
//!   dangles is handed to the caller, who may know the base from a store
//!   this pack never saw.
//!
//! Decoding works over the full in-memory buffer, which allows the trailer
//! checksum to be verified before any entry is parsed: a corrupt pack
//! reports [`PackError::ChecksumMismatch`] rather than whatever zlib error
//! the corruption happens to cause downstream.
//!
//! Per-entry offsets are tracked by the decompressor's own consumed-byte
//! count (`flate2::Decompress::total_in`), so the next entry's offset is
//! exact without wrapping the input in a counting reader.

pub mod delta;
pub mod object;

use std::collections::HashMap;
use std::io::Write;

use flate2::write::ZlibEncoder;
use flate2::{Compression, Decompress, FlushDecompress, Status};
use thiserror::Error;
use tracing::debug;

use crate::config::{PACK_MAGIC, PACK_VERSION};
use crate::crypto::hash::sha1_digest;
use crate::types::ObjectId;

pub use delta::patch_delta;
pub use object::{
    GitObject, OBJ_BLOB, OBJ_COMMIT, OBJ_OFS_DELTA, OBJ_REF_DELTA, OBJ_TAG, OBJ_TREE,
};

// ---------------------------------------------------------------------------
// Errors
// ---------------------------------------------------------------------------

/// Everything that can go wrong while reading or writing a pack.
#[derive(Debug, Error)]
pub enum PackError {
    /// The input does not start with the `PACK` magic.
    #[error("not a packfile")]
    NotAPackfile,

    /// The input ended before the structure it promised.
    #[error("truncated packfile at offset {0}")]
    Truncated(usize),

    /// The trailing SHA-1 does not match the content.
    #[error("checksum mismatch: expected {expected}, got {actual}")]
    ChecksumMismatch { expected: String, actual: String },

    /// An entry header declared a type outside {1,2,3,4,6,7}.
    #[error("unknown object type {0}")]
    UnknownObjectType(u8),

    /// An OFS_DELTA pointed at an offset with no entry.
    #[error("no pack entry at offset {0}")]
    UnresolvableOffsetDelta(usize),

    /// A zlib stream failed to inflate or deflate.
    #[error("zlib stream error: {0}")]
    Zlib(String),

    /// A zlib stream produced a different number of bytes than the entry
    /// header declared.
    #[error("inflated size mismatch: expected {expected}, got {actual}")]
    InflatedSizeMismatch { expected: usize, actual: usize },

    /// A delta failed to apply.
    #[error("bad delta: {0}")]
    BadDelta(String),
}

// ---------------------------------------------------------------------------
// Packfile
// ---------------------------------------------------------------------------

/// A ref delta whose base was not in the pack at resolution time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingDelta {
    /// Object id of the missing base.
    pub base_id: ObjectId,
    /// The raw (inflated) delta instruction stream.
    pub delta: Vec<u8>,
}

/// A decoded or to-be-encoded pack: objects, trailer checksum, and any
/// ref deltas left unresolved after decoding.
#[derive(Debug, Default)]
pub struct Packfile {
    /// Pack format version from the header.
    pub version: u32,
    /// All whole objects, in the order they were produced.
    pub objects: Vec<GitObject>,
    /// The trailing SHA-1 over the pack content.
    pub checksum: ObjectId,
    /// Ref deltas whose bases never appeared. The caller may resolve them
    /// against an object store.
    pub deltas: Vec<PendingDelta>,

    /// Entry offset → index into `objects`, for OFS_DELTA bases.
    offsets: HashMap<usize, usize>,
    /// Object id → index into `objects`, for REF_DELTA bases.
    ids: HashMap<ObjectId, usize>,
}

impl Packfile {
    /// A pack over the given whole objects, ready for [`Packfile::write`].
    pub fn new(objects: Vec<GitObject>) -> Self {
        let mut pack = Packfile {
            version: PACK_VERSION,
            ..Packfile::default()
        };
        for object in objects {
            pack.put_object(object);
        }
        pack
    }

    /// Look up an object by content id.
    pub fn object_by_id(&self, id: &ObjectId) -> Option<&GitObject> {
        self.ids.get(id).map(|index| &self.objects[*index])
    }

    /// Look up an object by the pack offset its entry started at.
    pub fn object_by_offset(&self, offset: usize) -> Option<&GitObject> {
        self.offsets.get(&offset).map(|index| &self.objects[*index])
    }

    /// Append an object produced outside any entry (post-loop delta
    /// resolution, or encoder setup).
    fn put_object(&mut self, object: GitObject) -> usize {
        let index = self.objects.len();
        self.ids.insert(object.id(), index);
        self.objects.push(object);
        index
    }

    /// Append an object produced by the entry at `offset`.
    fn put_object_at(&mut self, object: GitObject, offset: usize) {
        let index = self.put_object(object);
        self.offsets.insert(offset, index);
    }

    // -- Decoding ----------------------------------------------------------

    /// Decode a pack from a complete byte buffer.
    pub fn read(input: &[u8]) -> Result<Packfile, PackError> {
        if input.len() < 4 || input[..4] != PACK_MAGIC {
            return Err(PackError::NotAPackfile);
        }
        if input.len() < 12 + 20 {
            return Err(PackError::Truncated(input.len()));
        }

        // Trailer covers every byte before itself.
        let trailer_at = input.len() - 20;
        let computed = sha1_digest(&input[..trailer_at]);
        let mut stored = [0u8; 20];
        stored.copy_from_slice(&input[trailer_at..]);
        if computed != stored {
            return Err(PackError::ChecksumMismatch {
                expected: hex::encode(stored),
                actual: hex::encode(computed),
            });
        }

        let mut reader = PackReader {
            data: &input[..trailer_at],
            pos: 4,
        };
        let version = reader.read_u32_be()?;
        let count = reader.read_u32_be()?;

        let mut pack = Packfile {
            version,
            checksum: stored,
            ..Packfile::default()
        };

        for _ in 0..count {
            let entry_offset = reader.pos;
            read_entry(&mut pack, &mut reader, entry_offset)?;
        }

        pack.resolve_deltas()?;
        if !pack.deltas.is_empty() {
            debug!(
                unresolved = pack.deltas.len(),
                "pack decoded with dangling ref deltas"
            );
        }
        Ok(pack)
    }

    /// Resolve accumulated ref deltas in passes until no pass makes
    /// progress. Delta-of-delta chains resolve regardless of pack order;
    /// whatever remains references objects this pack does not contain.
    fn resolve_deltas(&mut self) -> Result<(), PackError> {
        loop {
            let mut progressed = false;
            let mut remaining = Vec::new();

            for pending in std::mem::take(&mut self.deltas) {
                let patched = match self.object_by_id(&pending.base_id) {
                    Some(base) => {
                        let bytes = patch_delta(base.bytes(), &pending.delta)?;
                        Some(base.with_bytes(bytes))
                    }
                    None => None,
                };
                match patched {
                    Some(object) => {
                        self.put_object(object);
                        progressed = true;
                    }
                    None => remaining.push(pending),
                }
            }

            self.deltas = remaining;
            if self.deltas.is_empty() || !progressed {
                return Ok(());
            }
        }
    }

    // -- Encoding ----------------------------------------------------------

    /// Encode the pack: header, one whole-object entry per object, SHA-1
    /// trailer. Deltas are never emitted; every object is stored complete.
    ///
    /// Stores the computed checksum on `self` and returns the bytes.
    pub fn write(&mut self) -> Result<Vec<u8>, PackError> {
        let mut out = Vec::new();
        out.extend_from_slice(&PACK_MAGIC);
        out.extend_from_slice(&self.version.to_be_bytes());
        out.extend_from_slice(&(self.objects.len() as u32).to_be_bytes());

        for object in &self.objects {
            write_entry(&mut out, object)?;
        }

        self.checksum = sha1_digest(&out);
        out.extend_from_slice(&self.checksum);
        Ok(out)
    }
}

// ---------------------------------------------------------------------------
// Entry decoding
// ---------------------------------------------------------------------------

/// Positioned view over the pack content (trailer excluded).
struct PackReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> PackReader<'a> {
    fn byte(&mut self) -> Result<u8, PackError> {
        let byte = *self
            .data
            .get(self.pos)
            .ok_or(PackError::Truncated(self.pos))?;
        self.pos += 1;
        Ok(byte)
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], PackError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(PackError::Truncated(self.pos))?;
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u32_be(&mut self) -> Result<u32, PackError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// MSB-continued size bytes, each contributing 7 bits starting at
    /// `shift`. Used for the tail of the entry-header size.
    fn msb_size(&mut self, mut shift: u32) -> Result<u64, PackError> {
        let mut size = 0u64;
        loop {
            let byte = self.byte()?;
            size += ((byte & 0x7f) as u64) << shift;
            shift += 7;
            if byte & 0x80 == 0 {
                return Ok(size);
            }
        }
    }

    /// Inflate exactly `size` bytes of zlib stream from the current
    /// position, advancing past precisely the bytes the stream consumed.
    ///
    /// Loops until the decompressor reports stream end; a single call is
    /// never assumed to produce the full output.
    fn inflate(&mut self, size: usize) -> Result<Vec<u8>, PackError> {
        let mut out = vec![0u8; size];
        let mut decompress = Decompress::new(true);

        loop {
            let consumed = decompress.total_in() as usize;
            let produced = decompress.total_out() as usize;
            let input = &self.data[self.pos + consumed..];

            let status = decompress
                .decompress(input, &mut out[produced..], FlushDecompress::Finish)
                .map_err(|err| PackError::Zlib(err.to_string()))?;

            match status {
                Status::StreamEnd => break,
                Status::Ok | Status::BufError => {
                    let stalled = decompress.total_in() as usize == consumed
                        && decompress.total_out() as usize == produced;
                    if stalled && input.is_empty() {
                        return Err(PackError::Truncated(self.pos + consumed));
                    }
                    if stalled {
                        // Input remains but the output window is full: the
                        // stream holds more bytes than the header declared.
                        return Err(PackError::Zlib(format!(
                            "stream exceeds declared size {size}"
                        )));
                    }
                }
            }
        }

        let produced = decompress.total_out() as usize;
        if produced != size {
            return Err(PackError::InflatedSizeMismatch {
                expected: size,
                actual: produced,
            });
        }
        self.pos += decompress.total_in() as usize;
        Ok(out)
    }
}

/// Decode one entry and push its object (or pending delta) into the pack.
fn read_entry(
    pack: &mut Packfile,
    reader: &mut PackReader<'_>,
    entry_offset: usize,
) -> Result<(), PackError> {
    let first = reader.byte()?;
    let type_code = (first >> 4) & 0x07;
    let mut size = (first & 0x0f) as u64;
    if first & 0x80 != 0 {
        size += reader.msb_size(4)?;
    }

    match type_code {
        OBJ_COMMIT | OBJ_TREE | OBJ_BLOB | OBJ_TAG => {
            let bytes = reader.inflate(size as usize)?;
            let object = GitObject::from_type_code(type_code, bytes)
                .ok_or(PackError::UnknownObjectType(type_code))?;
            pack.put_object_at(object, entry_offset);
        }

        OBJ_OFS_DELTA => {
            // Backwards distance: 7 bits per byte, each continuation adds
            // one before shifting.
            let mut byte = reader.byte()?;
            let mut distance = (byte & 0x7f) as usize;
            while byte & 0x80 != 0 {
                distance += 1;
                byte = reader.byte()?;
                distance = (distance << 7) + (byte & 0x7f) as usize;
            }

            let delta = reader.inflate(size as usize)?;
            let base_offset = entry_offset
                .checked_sub(distance)
                .ok_or(PackError::UnresolvableOffsetDelta(0))?;
            let patched = {
                let base = pack
                    .object_by_offset(base_offset)
                    .ok_or(PackError::UnresolvableOffsetDelta(base_offset))?;
                base.with_bytes(patch_delta(base.bytes(), &delta)?)
            };
            pack.put_object_at(patched, entry_offset);
        }

        OBJ_REF_DELTA => {
            let mut base_id = [0u8; 20];
            base_id.copy_from_slice(reader.take(20)?);
            let delta = reader.inflate(size as usize)?;

            let patched = match pack.object_by_id(&base_id) {
                Some(base) => Some(base.with_bytes(patch_delta(base.bytes(), &delta)?)),
                None => None,
            };
            match patched {
                Some(object) => pack.put_object_at(object, entry_offset),
                // Forward reference: the base may still show up later in
                // this pack, or live in the caller's store.
                None => pack.deltas.push(PendingDelta { base_id, delta }),
            }
        }

        other => return Err(PackError::UnknownObjectType(other)),
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Entry encoding
// ---------------------------------------------------------------------------

/// Append one whole-object entry: type/size header, then the zlib stream.
///
/// The continuation bit on the first byte is set only when size bytes
/// actually follow.
fn write_entry(out: &mut Vec<u8>, object: &GitObject) -> Result<(), PackError> {
    let bytes = object.bytes();
    let mut size = bytes.len() as u64;

    let mut first = (object.type_code() << 4) | (size & 0x0f) as u8;
    size >>= 4;
    if size > 0 {
        first |= 0x80;
    }
    out.push(first);
    while size > 0 {
        let mut byte = (size & 0x7f) as u8;
        size >>= 7;
        if size > 0 {
            byte |= 0x80;
        }
        out.push(byte);
    }

    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(bytes)
        .map_err(|err| PackError::Zlib(err.to_string()))?;
    let compressed = encoder
        .finish()
        .map_err(|err| PackError::Zlib(err.to_string()))?;
    out.extend_from_slice(&compressed);
    Ok(())
}
