//! Backing storage for documents and the policy deciding when and how far it grows.

use crate::{
    error::{Error, ErrorKind, Result},
    raw::{INLINE_CAPACITY, MAX_DOCUMENT_SIZE},
};

/// The capacity a buffer that must hold `required` bytes grows to: the next power of two,
/// clamped to the largest length a BSON length prefix can express.
pub(crate) fn grow_target(required: usize) -> usize {
    required
        .checked_next_power_of_two()
        .unwrap_or(usize::MAX)
        .min(MAX_DOCUMENT_SIZE)
        .max(required)
}

/// A byte region that encoded elements are appended to.
///
/// Every mutation is preceded by a successful [`Arena::reserve_total`]; the mutating methods
/// themselves cannot fail, which keeps appends all-or-nothing.
pub(crate) trait Arena {
    fn bytes(&self) -> &[u8];

    /// Make room for the arena to hold `total` bytes, or refuse without changing anything.
    fn reserve_total(&mut self, total: usize) -> Result<()>;

    fn truncate(&mut self, len: usize);

    fn extend_from_slice(&mut self, bytes: &[u8]);

    /// Overwrite `bytes.len()` bytes starting at `at`.
    fn patch(&mut self, at: usize, bytes: &[u8]);

    fn is_writable(&self) -> bool {
        true
    }
}

/// Storage owned by a [`RawDocumentBuf`](crate::raw::RawDocumentBuf).
pub(crate) enum Storage {
    /// Small documents live in a fixed array inside the value.
    Inline {
        buf: [u8; INLINE_CAPACITY],
        len: usize,
    },

    /// Documents that outgrew the inline array. Capacity is kept at a power of two.
    Heap(Vec<u8>),

    /// Memory the document does not own. Never written to.
    Static(&'static [u8]),
}

impl Storage {
    pub(crate) fn inline(bytes: &[u8]) -> Self {
        debug_assert!(bytes.len() <= INLINE_CAPACITY);
        let mut buf = [0u8; INLINE_CAPACITY];
        buf[..bytes.len()].copy_from_slice(bytes);
        Storage::Inline {
            buf,
            len: bytes.len(),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        match self {
            Storage::Inline { .. } => INLINE_CAPACITY,
            Storage::Heap(v) => v.capacity(),
            Storage::Static(s) => s.len(),
        }
    }

    pub(crate) fn is_inline(&self) -> bool {
        matches!(self, Storage::Inline { .. })
    }

    pub(crate) fn into_vec(self) -> Vec<u8> {
        match self {
            Storage::Inline { buf, len } => buf[..len].to_vec(),
            Storage::Heap(v) => v,
            Storage::Static(s) => s.to_vec(),
        }
    }
}

impl Clone for Storage {
    fn clone(&self) -> Self {
        match self {
            Storage::Inline { buf, len } => Storage::Inline {
                buf: *buf,
                len: *len,
            },
            // Vec::clone would shrink the capacity to the length.
            Storage::Heap(v) => {
                let mut copy = Vec::with_capacity(v.capacity());
                copy.extend_from_slice(v);
                Storage::Heap(copy)
            }
            Storage::Static(s) => Storage::Static(*s),
        }
    }
}

impl Arena for Storage {
    fn bytes(&self) -> &[u8] {
        match self {
            Storage::Inline { buf, len } => &buf[..*len],
            Storage::Heap(v) => v,
            Storage::Static(s) => s,
        }
    }

    fn reserve_total(&mut self, total: usize) -> Result<()> {
        if total > MAX_DOCUMENT_SIZE {
            return Err(Error::too_large(total));
        }
        match self {
            Storage::Inline { buf, len } => {
                if total <= INLINE_CAPACITY {
                    return Ok(());
                }
                let capacity = grow_target(total);
                tracing::debug!(capacity, "moving document from inline to heap storage");
                let mut heap = Vec::with_capacity(capacity);
                heap.extend_from_slice(&buf[..*len]);
                *self = Storage::Heap(heap);
                Ok(())
            }
            Storage::Heap(v) => {
                if total > v.capacity() {
                    let capacity = grow_target(total);
                    tracing::trace!(from = v.capacity(), to = capacity, "growing document");
                    v.reserve_exact(capacity - v.len());
                }
                Ok(())
            }
            Storage::Static(_) => Err(ErrorKind::ReadOnly.into()),
        }
    }

    fn truncate(&mut self, new_len: usize) {
        match self {
            Storage::Inline { len, .. } => *len = (*len).min(new_len),
            Storage::Heap(v) => v.truncate(new_len),
            Storage::Static(_) => {}
        }
    }

    fn extend_from_slice(&mut self, bytes: &[u8]) {
        match self {
            Storage::Inline { buf, len } => {
                buf[*len..*len + bytes.len()].copy_from_slice(bytes);
                *len += bytes.len();
            }
            Storage::Heap(v) => v.extend_from_slice(bytes),
            Storage::Static(_) => {}
        }
    }

    fn patch(&mut self, at: usize, bytes: &[u8]) {
        match self {
            Storage::Inline { buf, .. } => buf[at..at + bytes.len()].copy_from_slice(bytes),
            Storage::Heap(v) => v[at..at + bytes.len()].copy_from_slice(bytes),
            Storage::Static(_) => {}
        }
    }

    fn is_writable(&self) -> bool {
        !matches!(self, Storage::Static(_))
    }
}
