//! Encoding of elements into an [`Arena`], including documents that are still open for
//! appending while nested inside a parent.
//!
//! A [`Tape`] holds one root document plus a stack of open children. Each open child is the
//! last element of the frame enclosing it, so while `k` children are open the arena ends in
//! `k + 1` terminating nul bytes: one per open frame. Appending to the innermost frame splices
//! the new element in front of those terminators and then rewrites every open frame's length
//! prefix. Ending a child only pops the stack; its bytes are already final.

use crate::{
    error::{Error, ErrorKind, Result},
    raw::{
        buffer::Arena,
        RawBsonRef,
        RawElement,
        MAX_DEPTH,
        MAX_DOCUMENT_SIZE,
        MIN_BSON_DOCUMENT_SIZE,
    },
    spec::{BinarySubtype, ElementType},
};

const TERMINATORS: [u8; MAX_DEPTH + 2] = [0; MAX_DEPTH + 2];

/// The seam between the builders and the byte arena they write into. Implemented by [`Tape`]
/// for each kind of arena so that builders stay agnostic of where their bytes live.
pub(crate) trait Encoder {
    /// Append one element to the frame at `depth`, which must be the innermost open frame.
    fn append_element(
        &mut self,
        depth: usize,
        element_type: ElementType,
        key: &str,
        payload: &[&[u8]],
    ) -> Result<()>;

    /// Append already-encoded elements verbatim to the frame at `depth`.
    fn append_raw_elements(&mut self, depth: usize, elements: &[u8]) -> Result<()>;

    /// Open an empty document or array under `key` in the frame at `depth`. The new frame is at
    /// `depth + 1`.
    fn begin_child(&mut self, depth: usize, element_type: ElementType, key: &str) -> Result<()>;

    /// Close the frame at `depth`.
    fn end_child(&mut self, depth: usize) -> Result<()>;

    /// The encoded bytes of the frame at `depth` as they currently stand.
    fn frame_bytes(&self, depth: usize) -> &[u8];
}

/// A root document in an arena together with its open children.
#[derive(Clone)]
pub(crate) struct Tape<A> {
    arena: A,
    root: usize,
    open: Vec<usize>,
}

impl<A: Arena> Tape<A> {
    /// Wrap an arena whose bytes from `root` onwards are one complete document.
    pub(crate) fn new(arena: A, root: usize) -> Self {
        Self {
            arena,
            root,
            open: Vec::new(),
        }
    }

    /// Write an empty document at the end of `arena` and wrap it.
    pub(crate) fn with_empty_document(mut arena: A) -> Result<Self> {
        let root = arena.bytes().len();
        let total = root
            .checked_add(MIN_BSON_DOCUMENT_SIZE as usize)
            .ok_or_else(|| Error::too_large(usize::MAX))?;
        arena.reserve_total(total)?;
        arena.extend_from_slice(&MIN_BSON_DOCUMENT_SIZE.to_le_bytes());
        arena.extend_from_slice(&[0]);
        Ok(Self::new(arena, root))
    }

    pub(crate) fn arena(&self) -> &A {
        &self.arena
    }

    pub(crate) fn arena_mut(&mut self) -> &mut A {
        &mut self.arena
    }

    pub(crate) fn into_arena(self) -> A {
        self.arena
    }

    pub(crate) fn root(&self) -> usize {
        self.root
    }

    pub(crate) fn as_bytes(&self) -> &[u8] {
        &self.arena.bytes()[self.root..]
    }

    fn check_depth(&self, depth: usize) -> Result<()> {
        if depth != self.open.len() {
            return Err(ErrorKind::Locked.into());
        }
        Ok(())
    }

    /// Splice `header` and `parts` in front of the terminators. When `open_child` is set, the
    /// last part is the length prefix of a new child, which gets its own terminator.
    fn splice(
        &mut self,
        header: Option<(ElementType, &str)>,
        parts: &[&[u8]],
        open_child: bool,
    ) -> Result<()> {
        let mut added = parts.iter().map(|p| p.len()).sum::<usize>() + usize::from(open_child);
        if let Some((_, key)) = header {
            if key.as_bytes().contains(&0) {
                return Err(ErrorKind::InvalidKey {
                    key: key.to_string(),
                }
                .into());
            }
            added += 1 + key.len() + 1;
        }

        let requested = self.as_bytes().len().saturating_add(added);
        if requested > MAX_DOCUMENT_SIZE {
            return Err(Error::too_large(requested));
        }
        let end = self.arena.bytes().len();
        self.arena.reserve_total(end + added)?;

        // Nothing below can fail.
        let terminators = self.open.len() + 1;
        self.arena.truncate(end - terminators);
        if let Some((element_type, key)) = header {
            self.arena.extend_from_slice(&[element_type as u8]);
            self.arena.extend_from_slice(key.as_bytes());
            self.arena.extend_from_slice(&[0]);
        }
        for part in parts {
            self.arena.extend_from_slice(part);
        }
        if open_child {
            let start = self.arena.bytes().len() - 4;
            self.open.push(start);
        }
        self.arena
            .extend_from_slice(&TERMINATORS[..self.open.len() + 1]);
        self.rewrite_lengths();
        Ok(())
    }

    fn rewrite_lengths(&mut self) {
        let end = self.arena.bytes().len();
        let root_len = (end - self.root) as i32;
        self.arena.patch(self.root, &root_len.to_le_bytes());
        for (i, start) in self.open.iter().enumerate() {
            // Frame i + 1 is followed by the terminators of the i + 1 frames enclosing it.
            let len = (end - start - (i + 1)) as i32;
            self.arena.patch(*start, &len.to_le_bytes());
        }
    }

    /// Overwrite the payload of a fixed-width element in the root frame.
    pub(crate) fn overwrite(&mut self, at: usize, bytes: &[u8]) -> Result<()> {
        if !self.arena.is_writable() {
            return Err(ErrorKind::ReadOnly.into());
        }
        self.check_depth(0)?;
        self.arena.patch(self.root + at, bytes);
        Ok(())
    }
}

impl<A: Arena> Encoder for Tape<A> {
    fn append_element(
        &mut self,
        depth: usize,
        element_type: ElementType,
        key: &str,
        payload: &[&[u8]],
    ) -> Result<()> {
        self.check_depth(depth)?;
        self.splice(Some((element_type, key)), payload, false)
    }

    fn append_raw_elements(&mut self, depth: usize, elements: &[u8]) -> Result<()> {
        self.check_depth(depth)?;
        self.splice(None, &[elements], false)
    }

    fn begin_child(&mut self, depth: usize, element_type: ElementType, key: &str) -> Result<()> {
        self.check_depth(depth)?;
        if depth + 1 > MAX_DEPTH {
            return Err(Error::depth_exceeded());
        }
        self.splice(
            Some((element_type, key)),
            &[&MIN_BSON_DOCUMENT_SIZE.to_le_bytes()],
            true,
        )
    }

    fn end_child(&mut self, depth: usize) -> Result<()> {
        if depth == 0 {
            return Ok(());
        }
        self.check_depth(depth)?;
        self.open.pop();
        Ok(())
    }

    fn frame_bytes(&self, depth: usize) -> &[u8] {
        let bytes = self.arena.bytes();
        match depth.checked_sub(1).and_then(|i| self.open.get(i)) {
            Some(start) => &bytes[*start..bytes.len() - depth],
            None => &bytes[self.root..],
        }
    }
}

fn len_prefix(len: usize) -> Result<[u8; 4]> {
    i32::try_from(len)
        .map(i32::to_le_bytes)
        .map_err(|_| Error::too_large(len))
}

fn check_cstring(value: &str) -> Result<()> {
    if value.as_bytes().contains(&0) {
        return Err(Error::malformed_value(format!(
            "{value:?} contains a nul byte and cannot be encoded as a cstring"
        )));
    }
    Ok(())
}

/// Encode `value` under `key` into the frame at `depth`.
pub(crate) fn append_value(
    encoder: &mut dyn Encoder,
    depth: usize,
    key: &str,
    value: RawBsonRef<'_>,
) -> Result<()> {
    let element_type = value.element_type();
    let mut append = |payload: &[&[u8]]| encoder.append_element(depth, element_type, key, payload);

    match value {
        RawBsonRef::Double(d) => append(&[&d.to_le_bytes()]),
        RawBsonRef::String(s) | RawBsonRef::JavaScriptCode(s) | RawBsonRef::Symbol(s) => {
            append(&[&len_prefix(s.len() + 1)?, s.as_bytes(), &[0]])
        }
        RawBsonRef::Document(d) => append(&[d.as_bytes()]),
        RawBsonRef::Array(a) => append(&[a.as_bytes()]),
        RawBsonRef::Binary(b) => {
            let subtype = [u8::from(b.subtype)];
            if let BinarySubtype::BinaryOld = b.subtype {
                let outer = len_prefix(b.bytes.len() + 4)?;
                let inner = len_prefix(b.bytes.len())?;
                append(&[&outer, &subtype, &inner, b.bytes])
            } else {
                append(&[&len_prefix(b.bytes.len())?, &subtype, b.bytes])
            }
        }
        RawBsonRef::ObjectId(oid) => append(&[&oid.bytes()]),
        RawBsonRef::Boolean(b) => append(&[&[b as u8]]),
        RawBsonRef::DateTime(dt) => append(&[&dt.timestamp_millis().to_le_bytes()]),
        RawBsonRef::RegularExpression(re) => {
            check_cstring(re.pattern)?;
            check_cstring(re.options)?;
            append(&[re.pattern.as_bytes(), &[0], re.options.as_bytes(), &[0]])
        }
        RawBsonRef::DbPointer(p) => append(&[
            &len_prefix(p.namespace.len() + 1)?,
            p.namespace.as_bytes(),
            &[0],
            &p.id.bytes(),
        ]),
        RawBsonRef::JavaScriptCodeWithScope(cws) => {
            let scope = cws.scope.as_bytes();
            let total = 4 + 4 + cws.code.len() + 1 + scope.len();
            append(&[
                &len_prefix(total)?,
                &len_prefix(cws.code.len() + 1)?,
                cws.code.as_bytes(),
                &[0],
                scope,
            ])
        }
        RawBsonRef::Int32(i) => append(&[&i.to_le_bytes()]),
        RawBsonRef::Timestamp(ts) => append(&[&ts.to_le_bytes()]),
        RawBsonRef::Int64(i) => append(&[&i.to_le_bytes()]),
        RawBsonRef::Null | RawBsonRef::Undefined | RawBsonRef::MinKey | RawBsonRef::MaxKey => {
            append(&[])
        }
    }
}

/// Copy a located element (type, payload and, unless renamed, key) into the frame at `depth`.
pub(crate) fn append_element(
    encoder: &mut dyn Encoder,
    depth: usize,
    key: Option<&str>,
    element: &RawElement<'_>,
) -> Result<()> {
    let key = match key {
        Some(key) => key,
        None => element.key()?,
    };
    encoder.append_element(depth, element.element_type(), key, &[element.value_bytes()])
}
