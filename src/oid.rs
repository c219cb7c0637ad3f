//! Module containing functionality related to BSON ObjectIds.
//! For more information, see the documentation for the [`ObjectId`] type.

use std::{
    cell::Cell,
    fmt,
    str::FromStr,
    sync::atomic::{AtomicU32, AtomicU64, Ordering},
    time::SystemTime,
};

use once_cell::sync::Lazy;
use rand::{Rng, random};

use crate::error::{Error, ObjectIdErrorKind, Result};

const TIMESTAMP_SIZE: usize = 4;
const MACHINE_ID_SIZE: usize = 3;
const PROCESS_ID_SIZE: usize = 2;
const COUNTER_SIZE: usize = 3;

const TIMESTAMP_OFFSET: usize = 0;
const MACHINE_ID_OFFSET: usize = TIMESTAMP_OFFSET + TIMESTAMP_SIZE;
const PROCESS_ID_OFFSET: usize = MACHINE_ID_OFFSET + MACHINE_ID_SIZE;
const COUNTER_OFFSET: usize = PROCESS_ID_OFFSET + PROCESS_ID_SIZE;

const MAX_U24: u32 = 0xFF_FFFF;

static DEFAULT_CONTEXT: Lazy<Context> = Lazy::new(|| Context::new(ContextOptions::default()));

/// A wrapper around a raw 12-byte ObjectId.
///
/// Ordering and equality are byte-wise over the big-endian layout, so ids sort by creation
/// second first.
#[derive(Clone, Copy, PartialEq, PartialOrd, Eq, Ord, Hash)]
pub struct ObjectId {
    id: [u8; 12],
}

impl Default for ObjectId {
    fn default() -> Self {
        Self::new()
    }
}

impl FromStr for ObjectId {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse_str(s)
    }
}

impl From<[u8; 12]> for ObjectId {
    fn from(bytes: [u8; 12]) -> Self {
        Self { id: bytes }
    }
}

impl ObjectId {
    /// Generates a new [`ObjectId`] from the process-wide default [`Context`].
    pub fn new() -> ObjectId {
        Context::global().generate()
    }

    /// Constructs a new ObjectId wrapper around the raw byte representation.
    pub const fn from_bytes(bytes: [u8; 12]) -> ObjectId {
        ObjectId { id: bytes }
    }

    /// Assembles an id from its four components. Only the low 24 bits of `counter` are kept.
    pub fn from_parts(timestamp: u32, machine_id: [u8; 3], process_id: u16, counter: u32) -> Self {
        let mut buf = [0u8; 12];
        buf[TIMESTAMP_OFFSET..MACHINE_ID_OFFSET].copy_from_slice(&timestamp.to_be_bytes());
        buf[MACHINE_ID_OFFSET..PROCESS_ID_OFFSET].copy_from_slice(&machine_id);
        buf[PROCESS_ID_OFFSET..COUNTER_OFFSET].copy_from_slice(&process_id.to_be_bytes());
        buf[COUNTER_OFFSET..COUNTER_OFFSET + COUNTER_SIZE]
            .copy_from_slice(&(counter & MAX_U24).to_be_bytes()[4 - COUNTER_SIZE..]);
        Self::from_bytes(buf)
    }

    /// An id made of a timestamp followed by a big-endian 64-bit sequence number, in place of
    /// the machine id, process id and counter. Ids from one sequence sort in generation order.
    pub fn from_sequence(timestamp: u32, sequence: u64) -> Self {
        let mut buf = [0u8; 12];
        buf[TIMESTAMP_OFFSET..MACHINE_ID_OFFSET].copy_from_slice(&timestamp.to_be_bytes());
        buf[MACHINE_ID_OFFSET..].copy_from_slice(&sequence.to_be_bytes());
        Self::from_bytes(buf)
    }

    /// Parses 24 hex digits, in either case.
    pub fn parse_str(s: impl AsRef<str>) -> Result<ObjectId> {
        let s = s.as_ref();
        if s.len() != 24 {
            return Err(Error::object_id(ObjectIdErrorKind::InvalidLength { length: s.len() }));
        }
        let mut id = [0u8; 12];
        hex::decode_to_slice(s, &mut id).map_err(|e| Error::from_hex_error(e, s.len()))?;
        Ok(ObjectId::from_bytes(id))
    }

    /// Whether `s` is exactly 24 hexadecimal characters, i.e. whether [`ObjectId::parse_str`]
    /// would accept it.
    pub fn is_valid(s: impl AsRef<str>) -> bool {
        let s = s.as_ref();
        s.len() == 24 && s.bytes().all(|b| b.is_ascii_hexdigit())
    }

    /// Creates a dummy ObjectId with a specific generation time.
    /// This method should only be used to do range queries on a field
    /// containing ObjectId instances.
    pub fn with_timestamp(time: u32) -> ObjectId {
        let mut buf: [u8; 12] = [0; 12];
        buf[TIMESTAMP_OFFSET..MACHINE_ID_OFFSET].copy_from_slice(&time.to_be_bytes());
        ObjectId::from_bytes(buf)
    }

    /// Retrieves the timestamp from an [`ObjectId`].
    pub fn timestamp(&self) -> crate::DateTime {
        let mut buf = [0; 4];
        buf.copy_from_slice(&self.id[TIMESTAMP_OFFSET..MACHINE_ID_OFFSET]);
        let seconds_since_epoch = u32::from_be_bytes(buf);

        // This doesn't overflow since u32::MAX * 1000 < i64::MAX
        crate::DateTime::from_millis(seconds_since_epoch as i64 * 1000)
    }

    /// Returns the raw byte representation of an ObjectId.
    pub const fn bytes(&self) -> [u8; 12] {
        self.id
    }

    /// Convert this [`ObjectId`] to its hex string representation.
    pub fn to_hex(self) -> String {
        hex::encode(self.id)
    }

    /// Retrieves the increment counter from an ObjectId.
    pub fn counter(&self) -> u32 {
        let mut buf = [0u8; 4];
        buf[4 - COUNTER_SIZE..].copy_from_slice(&self.id[COUNTER_OFFSET..]);
        u32::from_be_bytes(buf)
    }
}

impl fmt::Display for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for ObjectId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        f.debug_tuple("ObjectId").field(&self.to_hex()).finish()
    }
}

/// Options controlling an object id [`Context`] or [`LocalContext`].
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[non_exhaustive]
pub struct ContextOptions {
    /// Read the process id once when the context is created instead of on every generation.
    /// Forked children sharing a cached context would reuse the parent's process id.
    pub cache_pid: bool,
}

impl ContextOptions {
    /// Sets [`ContextOptions::cache_pid`].
    pub fn cache_pid(mut self, cache_pid: bool) -> Self {
        self.cache_pid = cache_pid;
        self
    }
}

/// The per-context constant part of every generated id.
#[derive(Debug)]
struct Seed {
    machine_id: [u8; 3],
    cached_pid: Option<u16>,
}

impl Seed {
    fn new(options: &ContextOptions) -> Self {
        Self {
            machine_id: random(),
            cached_pid: options.cache_pid.then(gen_process_id),
        }
    }

    fn process_id(&self) -> u16 {
        self.cached_pid.unwrap_or_else(gen_process_id)
    }
}

/// A thread-safe object id generator.
///
/// The counter is advanced with an atomic fetch-and-add, so ids generated concurrently from any
/// number of threads never share a counter value until the 24-bit counter wraps.
#[derive(Debug)]
pub struct Context {
    seed: Seed,
    counter: AtomicU32,
    sequence: AtomicU64,
}

impl Context {
    /// Creates an isolated generator with a fresh random machine id and counter seed.
    pub fn new(options: ContextOptions) -> Self {
        Self {
            seed: Seed::new(&options),
            counter: AtomicU32::new(rand::rng().random_range(0..=MAX_U24)),
            sequence: AtomicU64::new(rand::rng().random_range(0..=u64::from(u32::MAX))),
        }
    }

    /// The process-wide default generator, initialised on first use.
    pub fn global() -> &'static Context {
        &DEFAULT_CONTEXT
    }

    /// Generates the next id.
    pub fn generate(&self) -> ObjectId {
        let counter = self.counter.fetch_add(1, Ordering::SeqCst);
        ObjectId::from_parts(
            gen_timestamp(),
            self.seed.machine_id,
            self.seed.process_id(),
            counter,
        )
    }

    /// Generates the next id of this context's 64-bit sequence. See [`ObjectId::from_sequence`].
    pub fn generate_sequence(&self) -> ObjectId {
        let sequence = self.sequence.fetch_add(1, Ordering::SeqCst);
        ObjectId::from_sequence(gen_timestamp(), sequence)
    }
}

/// A generator for single-threaded use. The counter is a plain cell, so this type is `!Sync`.
#[derive(Debug)]
pub struct LocalContext {
    seed: Seed,
    counter: Cell<u32>,
    sequence: Cell<u64>,
}

impl LocalContext {
    /// Creates an isolated generator with a fresh random machine id and counter seed.
    pub fn new(options: ContextOptions) -> Self {
        Self {
            seed: Seed::new(&options),
            counter: Cell::new(rand::rng().random_range(0..=MAX_U24)),
            sequence: Cell::new(rand::rng().random_range(0..=u64::from(u32::MAX))),
        }
    }

    /// Generates the next id.
    pub fn generate(&self) -> ObjectId {
        let counter = self.counter.get();
        self.counter.set(counter.wrapping_add(1));
        ObjectId::from_parts(
            gen_timestamp(),
            self.seed.machine_id,
            self.seed.process_id(),
            counter,
        )
    }

    pub fn generate_sequence(&self) -> ObjectId {
        let sequence = self.sequence.get();
        self.sequence.set(sequence.wrapping_add(1));
        ObjectId::from_sequence(gen_timestamp(), sequence)
    }
}

// Seconds since the epoch, truncated to 32 bits.
fn gen_timestamp() -> u32 {
    SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_secs() as u32)
        .unwrap_or(0)
}

fn gen_process_id() -> u16 {
    std::process::id() as u16
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn counter_is_big_endian() {
        let oid = ObjectId::from_parts(0, [0; 3], 0, 1_122_867);
        assert_eq!(0x11u8, oid.bytes()[COUNTER_OFFSET]);
        assert_eq!(0x22u8, oid.bytes()[COUNTER_OFFSET + 1]);
        assert_eq!(0x33u8, oid.bytes()[COUNTER_OFFSET + 2]);
    }

    #[test]
    fn counter_wraps_at_24_bits() {
        let oid = ObjectId::from_parts(0, [0; 3], 0, MAX_U24 + 2);
        assert_eq!(oid.counter(), 1);
    }

    #[test]
    fn sequence_fills_the_last_eight_bytes() {
        let oid = ObjectId::from_sequence(7, 0x0102_0304_0506_0708);
        assert_eq!(oid.bytes(), [0, 0, 0, 7, 1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn process_id_is_big_endian() {
        let oid = ObjectId::from_parts(0, [0; 3], 0x0102, 0);
        assert_eq!(&oid.bytes()[PROCESS_ID_OFFSET..COUNTER_OFFSET], &[0x01, 0x02]);
    }

    #[test]
    fn cached_pid_is_stable() {
        let ctx = LocalContext::new(ContextOptions::default().cache_pid(true));
        let a = ctx.generate().bytes();
        let b = ctx.generate().bytes();
        assert_eq!(a[MACHINE_ID_OFFSET..COUNTER_OFFSET], b[MACHINE_ID_OFFSET..COUNTER_OFFSET]);
        assert_eq!(
            &a[PROCESS_ID_OFFSET..COUNTER_OFFSET],
            &(std::process::id() as u16).to_be_bytes()
        );
    }
}
