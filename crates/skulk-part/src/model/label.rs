//! Label pairs and tag set framing.

use crate::buffer::SliceReader;
use crate::encoding::varint::{marshal_uvarint, unmarshal_uvarint};
use crate::error::{PartError, Result};
use std::borrow::Cow;

/// Size of the tag set frame prefix: label count and byte length.
pub const TAG_SET_PREFIX_SIZE: usize = 16;

/// A name/value pair of raw bytes.
///
/// Labels usually borrow from the ingestion buffer they were parsed from.
/// [`Label::into_owned`] copies the bytes when a label has to outlive it.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Label<'a> {
    /// Label name.
    pub name: Cow<'a, [u8]>,
    /// Label value.
    pub value: Cow<'a, [u8]>,
}

impl<'a> Label<'a> {
    /// Creates a label borrowing `name` and `value`.
    pub fn new(name: &'a [u8], value: &'a [u8]) -> Self {
        Self {
            name: Cow::Borrowed(name),
            value: Cow::Borrowed(value),
        }
    }

    /// Creates a label owning its bytes.
    pub fn owned(name: Vec<u8>, value: Vec<u8>) -> Label<'static> {
        Label {
            name: Cow::Owned(name),
            value: Cow::Owned(value),
        }
    }

    /// Copies borrowed bytes so the label no longer depends on its source.
    pub fn into_owned(self) -> Label<'static> {
        Label {
            name: Cow::Owned(self.name.into_owned()),
            value: Cow::Owned(self.value.into_owned()),
        }
    }

    /// Bytes taken by [`Label::marshal`].
    pub fn marshaled_size(&self) -> usize {
        uvarint_size(self.name.len() as u64)
            + self.name.len()
            + uvarint_size(self.value.len() as u64)
            + self.value.len()
    }

    /// Appends `[name len][name][value len][value]`, lengths as uvarints.
    pub fn marshal(&self, dst: &mut Vec<u8>) {
        marshal_uvarint(dst, self.name.len() as u64);
        dst.extend_from_slice(&self.name);
        marshal_uvarint(dst, self.value.len() as u64);
        dst.extend_from_slice(&self.value);
    }

    /// Reads a label borrowing from `src`, returning it with the unread tail.
    pub fn unmarshal(src: &'a [u8]) -> Result<(Self, &'a [u8])> {
        let (name, tail) = read_len_prefixed(src, "label name")?;
        let (value, tail) = read_len_prefixed(tail, "label value")?;
        Ok((Label::new(name, value), tail))
    }
}

/// Appends a framed tag set: `[count u64][byte length u64][labels]`.
///
/// An empty label list produces sixteen zero bytes.
pub fn marshal_tag_set(dst: &mut Vec<u8>, labels: &[Label<'_>]) {
    let size: usize = labels.iter().map(Label::marshaled_size).sum();
    // Label count (8 bytes)
    dst.extend_from_slice(&(labels.len() as u64).to_le_bytes());
    // Byte length (8 bytes)
    dst.extend_from_slice(&(size as u64).to_le_bytes());
    dst.reserve(size);
    for label in labels {
        label.marshal(dst);
    }
}

/// Reads one framed tag set, appending its labels to `dst`.
///
/// Returns the unread tail.
pub fn unmarshal_tag_set<'a>(dst: &mut Vec<Label<'a>>, src: &'a [u8]) -> Result<&'a [u8]> {
    let mut r = SliceReader::new(src, "tag set");
    let count = r.read_u64()?;
    let size = r.read_u64()?;
    let size = usize::try_from(size)
        .map_err(|_| PartError::Corrupted(format!("tag set length {} overflows", size)))?;
    let mut body = r.read_bytes(size)?;

    for _ in 0..count {
        let (label, tail) = Label::unmarshal(body)?;
        dst.push(label);
        body = tail;
    }
    if !body.is_empty() {
        return Err(PartError::Corrupted(format!(
            "tag set holds {} bytes beyond its {} labels",
            body.len(),
            count
        )));
    }
    Ok(r.remaining())
}

fn read_len_prefixed<'a>(src: &'a [u8], what: &'static str) -> Result<(&'a [u8], &'a [u8])> {
    let (len, tail) = unmarshal_uvarint(src)?;
    let len = usize::try_from(len)
        .map_err(|_| PartError::Corrupted(format!("{} length {} overflows", what, len)))?;
    let mut r = SliceReader::new(tail, what);
    let bytes = r.read_bytes(len)?;
    Ok((bytes, r.remaining()))
}

fn uvarint_size(mut v: u64) -> usize {
    let mut n = 1;
    while v >= 0x80 {
        v >>= 7;
        n += 1;
    }
    n
}
