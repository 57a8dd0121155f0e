//! Byte-exact persisted layout of the [`SettingsRecord`].
//!
//! ```text
//! ┌────────┬──────┬───────────────────────────┐
//! │ offset │ size │ field                     │
//! ├────────┼──────┼───────────────────────────┤
//! │      0 │    2 │ sentinel (u16 LE)         │
//! │      2 │  100 │ ssid                      │
//! │    102 │   50 │ wifi password             │
//! │    152 │   30 │ broker address            │
//! │    182 │    2 │ broker port (u16 LE)      │
//! │    184 │   50 │ broker username           │
//! │    234 │   50 │ broker password           │
//! │    284 │  150 │ topic root                │
//! │    434 │    4 │ sleep seconds (u32 LE)    │
//! │    438 │   25 │ client id                 │
//! │    463 │    1 │ debug (0 / 1)             │
//! │    464 │   30 │ static address            │
//! │    494 │   30 │ static netmask            │
//! └────────┴──────┴───────────────────────────┘
//! ```
//!
//! Text slots hold NUL-terminated, NUL-padded UTF-8.  The layout must stay
//! byte-for-byte stable across firmware updates on the same device.

use super::{
    ADDRESS_SLOT, CLIENT_ID_SLOT, PASSWORD_SLOT, SSID_SLOT, SettingsRecord, TOPIC_SLOT,
    USERNAME_SLOT,
};

/// Offset of the record inside the storage region.
pub const RECORD_OFFSET: usize = 0;

/// Total encoded size.
pub const RECORD_LEN: usize = 2
    + SSID_SLOT
    + PASSWORD_SLOT
    + ADDRESS_SLOT
    + 2
    + USERNAME_SLOT
    + PASSWORD_SLOT
    + TOPIC_SLOT
    + 4
    + CLIENT_ID_SLOT
    + 1
    + ADDRESS_SLOT
    + ADDRESS_SLOT;

/// Sentinel of a record written while complete.
pub const MAGIC: u16 = 0xDAB0;

/// Sentinel of a record written while incomplete.
pub const INCOMPLETE: u16 = 0x0000;

pub type RecordBytes = [u8; RECORD_LEN];

/// Classification of what was found in storage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    /// Written while complete, and still complete.
    Valid,
    /// Written, but not (or no longer) complete.
    Incomplete,
    /// Never written, or not decodable as a record.
    Blank,
}

// ---------------------------------------------------------------------------
// Encode
// ---------------------------------------------------------------------------

struct Writer<'a> {
    buf: &'a mut [u8],
    pos: usize,
}

impl Writer<'_> {
    fn bytes(&mut self, data: &[u8]) {
        self.buf[self.pos..self.pos + data.len()].copy_from_slice(data);
        self.pos += data.len();
    }

    /// Text plus NUL padding up to `slot`.  Callers guarantee
    /// `text.len() < slot` through the bounded string types.
    fn text(&mut self, text: &str, slot: usize) {
        let field = &mut self.buf[self.pos..self.pos + slot];
        field.fill(0);
        field[..text.len()].copy_from_slice(text.as_bytes());
        self.pos += slot;
    }
}

/// Encode `record` into its fixed layout.  The sentinel is taken from
/// `record.valid` as-is.
pub fn encode(record: &SettingsRecord) -> RecordBytes {
    let mut out = [0u8; RECORD_LEN];
    let mut w = Writer {
        buf: &mut out,
        pos: 0,
    };

    let sentinel = if record.valid { MAGIC } else { INCOMPLETE };
    w.bytes(&sentinel.to_le_bytes());
    w.text(&record.ssid, SSID_SLOT);
    w.text(&record.wifi_password, PASSWORD_SLOT);
    w.text(&record.broker_address, ADDRESS_SLOT);
    w.bytes(&record.broker_port.to_le_bytes());
    w.text(&record.broker_username, USERNAME_SLOT);
    w.text(&record.broker_password, PASSWORD_SLOT);
    w.text(&record.topic_root, TOPIC_SLOT);
    w.bytes(&record.sleep_seconds.to_le_bytes());
    w.text(&record.client_id, CLIENT_ID_SLOT);
    w.bytes(&[u8::from(record.debug)]);
    w.text(&record.static_address, ADDRESS_SLOT);
    w.text(&record.static_netmask, ADDRESS_SLOT);
    debug_assert_eq!(w.pos, RECORD_LEN);

    out
}

// ---------------------------------------------------------------------------
// Decode
// ---------------------------------------------------------------------------

struct Reader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn take(&mut self, n: usize) -> &'a [u8] {
        let out = &self.buf[self.pos..self.pos + n];
        self.pos += n;
        out
    }

    fn u16(&mut self) -> u16 {
        let b = self.take(2);
        u16::from_le_bytes([b[0], b[1]])
    }

    fn u32(&mut self) -> u32 {
        let b = self.take(4);
        u32::from_le_bytes([b[0], b[1], b[2], b[3]])
    }

    /// Text up to the first NUL.  `None` without terminator or on bad UTF-8.
    fn text<const N: usize>(&mut self, slot: usize) -> Option<heapless::String<N>> {
        let raw = self.take(slot);
        let end = raw.iter().position(|&b| b == 0)?;
        let s = core::str::from_utf8(&raw[..end]).ok()?;
        heapless::String::try_from(s).ok()
    }
}

/// Decode a stored record and classify it.
///
/// Anything that is not a well-formed record under a known sentinel is
/// [`RecordStatus::Blank`] and comes back as the in-memory default.
pub fn decode(bytes: &RecordBytes) -> (SettingsRecord, RecordStatus) {
    match decode_fields(bytes) {
        Some((record, sentinel)) => {
            let status = if sentinel == MAGIC && record.is_complete() {
                RecordStatus::Valid
            } else {
                RecordStatus::Incomplete
            };
            let record = SettingsRecord {
                valid: status == RecordStatus::Valid,
                ..record
            };
            (record, status)
        }
        None => (SettingsRecord::default(), RecordStatus::Blank),
    }
}

fn decode_fields(bytes: &RecordBytes) -> Option<(SettingsRecord, u16)> {
    let mut r = Reader { buf: bytes, pos: 0 };

    let sentinel = r.u16();
    if sentinel != MAGIC && sentinel != INCOMPLETE {
        return None;
    }

    let ssid = r.text(SSID_SLOT)?;
    let wifi_password = r.text(PASSWORD_SLOT)?;
    let broker_address = r.text(ADDRESS_SLOT)?;
    let broker_port = r.u16();
    let broker_username = r.text(USERNAME_SLOT)?;
    let broker_password = r.text(PASSWORD_SLOT)?;
    let topic_root = r.text(TOPIC_SLOT)?;
    let sleep_seconds = r.u32();
    let client_id = r.text(CLIENT_ID_SLOT)?;
    let debug = match r.take(1)[0] {
        0 => false,
        1 => true,
        _ => return None,
    };
    let static_address = r.text(ADDRESS_SLOT)?;
    let static_netmask = r.text(ADDRESS_SLOT)?;

    let record = SettingsRecord {
        valid: sentinel == MAGIC,
        ssid,
        wifi_password,
        broker_address,
        broker_port,
        broker_username,
        broker_password,
        topic_root,
        sleep_seconds,
        client_id,
        debug,
        static_address,
        static_netmask,
    };
    Some((record, sentinel))
}
