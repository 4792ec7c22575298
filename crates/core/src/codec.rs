//! Tagged-section binary codec for snapshot files
//!
//! A snapshot file is a flat sequence of records. Each record carries the
//! payload of one section, the payload byte count, and the tag naming the
//! *next* section:
//!
//! ```text
//! [len=0][tag "Version"]            <- header record, empty payload
//! [payload][varuint len][tag]       <- one record per section
//! [payload][varuint len][empty tag] <- trailing record terminates the file
//! ```
//!
//! Tags are string-interned: the first occurrence is written as
//! `(len << 1) | 0` followed by the raw bytes, every re-occurrence as
//! `(index << 1) | 1`. The decoder maintains a parallel table populated on
//! first sight, so both sides agree on indices without negotiation.

use anyhow::{bail, Context, Result};

/// Size of a raw hash field in the stream.
pub const HASH_LEN: usize = 32;

/// Maximum encoded length of a varuint (u64 in 7-bit groups).
const MAX_VARUINT_BYTES: usize = 10;

fn encode_varuint(out: &mut Vec<u8>, mut value: u64) {
    while value >= 0x80 {
        out.push((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    out.push(value as u8);
}

/// Writer for the tagged-section format.
///
/// Sections are opened with [`begin_section`](Self::begin_section); all
/// primitive writes go into the payload of the most recently opened section.
/// The payload is aggregated in a temporary buffer and flushed when the next
/// section begins, which is what lets the byte count precede the tag on disk.
pub struct SectionWriter {
    out: Vec<u8>,
    section: Vec<u8>,
    tags: Vec<String>,
}

impl SectionWriter {
    pub fn new() -> Self {
        Self {
            out: Vec::new(),
            section: Vec::new(),
            tags: Vec::new(),
        }
    }

    /// Flush the pending payload and name the section that follows it.
    pub fn begin_section(&mut self, tag: &str) {
        debug_assert!(!tag.is_empty(), "empty tag is reserved for the terminator");
        self.flush_record(tag);
    }

    /// Flush the final payload, write the empty terminator tag, and return
    /// the finished stream.
    pub fn finish(mut self) -> Vec<u8> {
        self.flush_record("");
        self.out
    }

    fn flush_record(&mut self, next_tag: &str) {
        let payload = std::mem::take(&mut self.section);
        self.out.extend_from_slice(&payload);
        encode_varuint(&mut self.out, payload.len() as u64);
        self.write_tag(next_tag);
    }

    fn write_tag(&mut self, tag: &str) {
        if tag.is_empty() {
            // Terminator: first-occurrence encoding of the empty string.
            self.out.push(0);
            return;
        }
        if let Some(index) = self.tags.iter().position(|t| t == tag) {
            encode_varuint(&mut self.out, ((index as u64) << 1) | 1);
        } else {
            encode_varuint(&mut self.out, (tag.len() as u64) << 1);
            self.out.extend_from_slice(tag.as_bytes());
            self.tags.push(tag.to_string());
        }
    }

    pub fn write_byte(&mut self, value: u8) {
        self.section.push(value);
    }

    pub fn write_bool(&mut self, value: bool) {
        self.section.push(value as u8);
    }

    pub fn write_varuint(&mut self, value: u64) {
        encode_varuint(&mut self.section, value);
    }

    pub fn write_u32(&mut self, value: u32) {
        encode_varuint(&mut self.section, value as u64);
    }

    /// Zig-zag signed variant of [`write_varuint`](Self::write_varuint).
    pub fn write_varint(&mut self, value: i64) {
        encode_varuint(&mut self.section, ((value << 1) ^ (value >> 63)) as u64);
    }

    pub fn write_hash(&mut self, hash: &[u8; HASH_LEN]) {
        self.section.extend_from_slice(hash);
    }

    pub fn write_text(&mut self, text: &str) {
        encode_varuint(&mut self.section, text.len() as u64);
        self.section.extend_from_slice(text.as_bytes());
    }

    /// Tag intern table in first-write order.
    pub fn tag_table(&self) -> &[String] {
        &self.tags
    }
}

impl Default for SectionWriter {
    fn default() -> Self {
        Self::new()
    }
}

/// Reader over a tagged-section stream.
///
/// After construction the reader holds the tag of the first section. Each
/// [`read_section`](Self::read_section) call either consumes the pending
/// section (when the tag matches) or reports it missing by returning
/// `Ok(None)` and leaving the cursor untouched, so the caller can try the
/// next expected name against the same pending tag.
pub struct SectionReader<'a> {
    buf: &'a [u8],
    pos: usize,
    tags: Vec<String>,
    next_tag: Option<String>,
}

impl<'a> SectionReader<'a> {
    pub fn new(buf: &'a [u8]) -> Result<Self> {
        let mut reader = Self {
            buf,
            pos: 0,
            tags: Vec::new(),
            next_tag: None,
        };
        // Header record: empty payload, then the first section's tag.
        let header_len = reader.read_varuint().context("stream header")?;
        if header_len != 0 {
            bail!("corrupt stream: header record has non-empty payload");
        }
        reader.next_tag = reader.read_tag()?;
        Ok(reader)
    }

    /// Read the section named `tag`, parsing its payload with `parse`.
    ///
    /// Returns `Ok(None)` when the pending tag names a different section;
    /// the cursor is left in place. The byte count trailing the payload is
    /// validated against what `parse` actually consumed.
    pub fn read_section<T>(
        &mut self,
        tag: &str,
        parse: impl FnOnce(&mut Self) -> Result<T>,
    ) -> Result<Option<T>> {
        match &self.next_tag {
            Some(pending) if pending == tag => {}
            _ => return Ok(None),
        }
        let start = self.pos;
        let value = parse(self).with_context(|| format!("section '{}'", tag))?;
        let consumed = (self.pos - start) as u64;
        let recorded = self
            .read_varuint()
            .with_context(|| format!("byte count of section '{}'", tag))?;
        if recorded != consumed {
            bail!(
                "corrupt section '{}': byte count {} but {} bytes consumed",
                tag,
                recorded,
                consumed
            );
        }
        self.next_tag = self.read_tag()?;
        Ok(Some(value))
    }

    /// Tag of the section the cursor is parked before, if any.
    pub fn pending_tag(&self) -> Option<&str> {
        self.next_tag.as_deref()
    }

    /// True once the terminator was read and every byte consumed.
    pub fn is_exhausted(&self) -> bool {
        self.next_tag.is_none() && self.pos == self.buf.len()
    }

    /// Bytes remaining past the cursor.
    pub fn remaining(&self) -> usize {
        self.buf.len() - self.pos
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.pos + n > self.buf.len() {
            bail!(
                "unexpected end of stream: wanted {} bytes, {} left",
                n,
                self.buf.len() - self.pos
            );
        }
        let slice = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        Ok(slice)
    }

    pub fn read_byte(&mut self) -> Result<u8> {
        Ok(self.take(1)?[0])
    }

    pub fn read_bool(&mut self) -> Result<bool> {
        Ok(self.read_byte()? != 0)
    }

    pub fn read_varuint(&mut self) -> Result<u64> {
        let mut value: u64 = 0;
        let mut shift = 0u32;
        for _ in 0..MAX_VARUINT_BYTES {
            let byte = self.read_byte()?;
            let group = (byte & 0x7F) as u64;
            if shift == 63 && group > 1 {
                bail!("varuint overflows u64");
            }
            value |= group << shift;
            if byte & 0x80 == 0 {
                return Ok(value);
            }
            shift += 7;
        }
        bail!("varuint longer than {} bytes", MAX_VARUINT_BYTES)
    }

    pub fn read_u32(&mut self) -> Result<u32> {
        let value = self.read_varuint()?;
        u32::try_from(value).map_err(|_| anyhow::anyhow!("varuint {} out of u32 range", value))
    }

    pub fn read_u16(&mut self) -> Result<u16> {
        let value = self.read_varuint()?;
        u16::try_from(value).map_err(|_| anyhow::anyhow!("varuint {} out of u16 range", value))
    }

    pub fn read_varint(&mut self) -> Result<i64> {
        let raw = self.read_varuint()?;
        Ok(((raw >> 1) as i64) ^ -((raw & 1) as i64))
    }

    pub fn read_hash(&mut self) -> Result<[u8; HASH_LEN]> {
        let mut hash = [0u8; HASH_LEN];
        hash.copy_from_slice(self.take(HASH_LEN)?);
        Ok(hash)
    }

    pub fn read_text(&mut self) -> Result<String> {
        let len = self.read_varuint()? as usize;
        let bytes = self.take(len)?;
        Ok(std::str::from_utf8(bytes)
            .context("text field is not valid UTF-8")?
            .to_string())
    }

    fn read_tag(&mut self) -> Result<Option<String>> {
        let word = self.read_varuint().context("tag")?;
        if word & 1 == 1 {
            let index = (word >> 1) as usize;
            let tag = self
                .tags
                .get(index)
                .with_context(|| format!("tag index {} not in intern table", index))?;
            return Ok(Some(tag.clone()));
        }
        let len = (word >> 1) as usize;
        if len == 0 {
            return Ok(None);
        }
        let bytes = self.take(len)?;
        let tag = std::str::from_utf8(bytes)
            .context("tag is not valid UTF-8")?
            .to_string();
        self.tags.push(tag.clone());
        Ok(Some(tag))
    }

    /// Tag intern table in first-read order.
    pub fn tag_table(&self) -> &[String] {
        &self.tags
    }
}
