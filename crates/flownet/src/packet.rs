use glam::{Quat, Vec3};

/// A read asked for more bytes than remain in the buffer. The packet is
/// malformed from the reader's point of view and should be discarded;
/// no partial value is ever returned.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PacketError {
    #[error("buffer underrun reading {what}: {wanted} bytes needed, {remaining} remaining")]
    BufferUnderrun {
        what: &'static str,
        wanted: usize,
        remaining: usize,
    },
}

/// A single wire message: a growable byte buffer plus a read cursor.
///
/// Outgoing packets are built with [`Packet::new`] or [`Packet::with_id`]
/// and only appended to. Incoming packets are opened with
/// [`Packet::from_bytes`] and only read from; the buffer itself is never
/// mutated after construction, only `read_pos` advances.
///
/// All scalars are little-endian. Booleans are encoded as one byte
/// (1 = true, 0 = false). Strings are an `i32` byte count followed by
/// that many ASCII-range bytes, no terminator.
#[derive(Debug, Clone, Default)]
pub struct Packet {
    buffer: Vec<u8>,
    read_pos: usize,
}

impl Packet {
    /// Creates an empty packet with no leading ID.
    pub fn new() -> Self {
        Self {
            buffer: Vec::new(),
            read_pos: 0,
        }
    }

    /// Creates an outgoing packet pre-seeded with an action ID.
    pub fn with_id(id: i32) -> Self {
        let mut packet = Self::new();
        packet.write_i32(id);
        packet
    }

    /// Opens received bytes for reading.
    pub fn from_bytes(data: Vec<u8>) -> Self {
        Self {
            buffer: data,
            read_pos: 0,
        }
    }

    pub fn len(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    /// Number of bytes the cursor has not yet consumed.
    pub fn unread_len(&self) -> usize {
        self.buffer.len() - self.read_pos
    }

    pub fn read_pos(&self) -> usize {
        self.read_pos
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.buffer
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Clears the packet so the instance can be reused for a new message.
    pub fn reset(&mut self) {
        self.buffer.clear();
        self.read_pos = 0;
    }

    /// Prepends the current total byte length as an `i32`, for channels
    /// that need self-describing message boundaries.
    pub fn write_length_prefix(&mut self) {
        let len = self.buffer.len() as i32;
        self.insert_int(len);
    }

    /// Prepends an `i32` ahead of everything written so far. Used to stamp
    /// the sender identity onto an already-built packet just before send.
    pub fn insert_int(&mut self, value: i32) {
        self.buffer.splice(0..0, value.to_le_bytes());
    }

    /// Moves the cursor back by one `i32`, so the next read sees the last
    /// peeked dispatch ID again from its start.
    pub fn unread_int(&mut self) {
        self.read_pos = self.read_pos.saturating_sub(4);
    }

    // Write ops. Appending to an in-memory buffer cannot fail.

    pub fn write_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    pub fn write_bytes(&mut self, value: &[u8]) {
        self.buffer.extend_from_slice(value);
    }

    pub fn write_i16(&mut self, value: i16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i32(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_i64(&mut self, value: i64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_f32(&mut self, value: f32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    pub fn write_bool(&mut self, value: bool) {
        self.buffer.push(value as u8);
    }

    /// Length-prefixed ASCII string: `i32` byte count, then the bytes.
    pub fn write_string(&mut self, value: &str) {
        self.write_i32(value.len() as i32);
        self.buffer.extend_from_slice(value.as_bytes());
    }

    pub fn write_vec3(&mut self, value: Vec3) {
        self.write_f32(value.x);
        self.write_f32(value.y);
        self.write_f32(value.z);
    }

    pub fn write_quat(&mut self, value: Quat) {
        self.write_f32(value.x);
        self.write_f32(value.y);
        self.write_f32(value.z);
        self.write_f32(value.w);
    }

    // Read ops. Each validates the full width remains before touching the
    // cursor, so a failed read leaves the packet untouched.

    fn take(&mut self, wanted: usize, what: &'static str) -> Result<&[u8], PacketError> {
        let remaining = self.unread_len();
        if remaining < wanted {
            return Err(PacketError::BufferUnderrun {
                what,
                wanted,
                remaining,
            });
        }
        let start = self.read_pos;
        self.read_pos += wanted;
        Ok(&self.buffer[start..start + wanted])
    }

    fn peek(&self, wanted: usize, what: &'static str) -> Result<&[u8], PacketError> {
        let remaining = self.unread_len();
        if remaining < wanted {
            return Err(PacketError::BufferUnderrun {
                what,
                wanted,
                remaining,
            });
        }
        Ok(&self.buffer[self.read_pos..self.read_pos + wanted])
    }

    pub fn read_u8(&mut self) -> Result<u8, PacketError> {
        Ok(self.take(1, "u8")?[0])
    }

    pub fn read_bytes(&mut self, length: usize) -> Result<Vec<u8>, PacketError> {
        Ok(self.take(length, "bytes")?.to_vec())
    }

    pub fn read_i16(&mut self) -> Result<i16, PacketError> {
        let bytes = self.take(2, "i16")?;
        Ok(i16::from_le_bytes([bytes[0], bytes[1]]))
    }

    pub fn read_i32(&mut self) -> Result<i32, PacketError> {
        let bytes = self.take(4, "i32")?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Reads the next `i32` without advancing the cursor, so a subsequent
    /// normal read re-reads the same bytes.
    pub fn peek_i32(&self) -> Result<i32, PacketError> {
        let bytes = self.peek(4, "i32")?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    pub fn read_i64(&mut self) -> Result<i64, PacketError> {
        let bytes = self.take(8, "i64")?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(bytes);
        Ok(i64::from_le_bytes(raw))
    }

    pub fn read_f32(&mut self) -> Result<f32, PacketError> {
        let bytes = self.take(4, "f32")?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Any non-zero byte decodes as `true`.
    pub fn read_bool(&mut self) -> Result<bool, PacketError> {
        Ok(self.take(1, "bool")?[0] != 0)
    }

    /// Reads a length-prefixed string. The length read and the byte-range
    /// read are one failure domain: anything wrong (missing prefix,
    /// negative length, truncated body, non-UTF-8 bytes) is a
    /// `BufferUnderrun` for the whole string, and the cursor is restored.
    pub fn read_string(&mut self) -> Result<String, PacketError> {
        let start = self.read_pos;
        match self.read_string_inner() {
            Ok(value) => Ok(value),
            Err(_) => {
                let remaining = self.buffer.len() - start;
                self.read_pos = start;
                Err(PacketError::BufferUnderrun {
                    what: "string",
                    wanted: remaining + 1,
                    remaining,
                })
            }
        }
    }

    fn read_string_inner(&mut self) -> Result<String, PacketError> {
        let length = self.read_i32()?;
        let length = usize::try_from(length).map_err(|_| PacketError::BufferUnderrun {
            what: "string",
            wanted: 0,
            remaining: self.unread_len(),
        })?;
        let bytes = self.take(length, "string")?.to_vec();
        String::from_utf8(bytes).map_err(|_| PacketError::BufferUnderrun {
            what: "string",
            wanted: length,
            remaining: 0,
        })
    }

    pub fn read_vec3(&mut self) -> Result<Vec3, PacketError> {
        Ok(Vec3::new(
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
        ))
    }

    pub fn read_quat(&mut self) -> Result<Quat, PacketError> {
        Ok(Quat::from_xyzw(
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
            self.read_f32()?,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn primitive_round_trip() {
        let mut packet = Packet::new();
        packet.write_u8(0xAB);
        packet.write_i16(-1234);
        packet.write_i32(i32::MIN);
        packet.write_i64(i64::MAX);
        packet.write_f32(3.25);
        packet.write_bool(true);
        packet.write_bool(false);

        let mut packet = Packet::from_bytes(packet.into_bytes());
        assert_eq!(packet.read_u8().unwrap(), 0xAB);
        assert_eq!(packet.read_i16().unwrap(), -1234);
        assert_eq!(packet.read_i32().unwrap(), i32::MIN);
        assert_eq!(packet.read_i64().unwrap(), i64::MAX);
        assert_eq!(packet.read_f32().unwrap(), 3.25);
        assert!(packet.read_bool().unwrap());
        assert!(!packet.read_bool().unwrap());
        assert_eq!(packet.unread_len(), 0);
    }

    #[test]
    fn string_round_trip() {
        let mut packet = Packet::new();
        packet.write_string("hello world");
        packet.write_string("");
        packet.write_i32(7);

        let mut packet = Packet::from_bytes(packet.into_bytes());
        assert_eq!(packet.read_string().unwrap(), "hello world");
        assert_eq!(packet.read_string().unwrap(), "");
        assert_eq!(packet.read_i32().unwrap(), 7);
    }

    #[test]
    fn vector_round_trip() {
        let mut packet = Packet::new();
        packet.write_vec3(Vec3::new(1.0, -2.5, 100.125));
        packet.write_quat(Quat::from_xyzw(0.0, 0.5, -0.5, 1.0));

        let mut packet = Packet::from_bytes(packet.into_bytes());
        assert_eq!(packet.read_vec3().unwrap(), Vec3::new(1.0, -2.5, 100.125));
        assert_eq!(
            packet.read_quat().unwrap(),
            Quat::from_xyzw(0.0, 0.5, -0.5, 1.0)
        );
    }

    #[test]
    fn encoding_is_little_endian() {
        let mut packet = Packet::new();
        packet.write_i32(0x01020304);
        assert_eq!(packet.as_bytes(), &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn cursor_advances_by_exact_widths() {
        let mut packet = Packet::new();
        packet.write_i32(1);
        packet.write_i16(2);
        packet.write_f32(3.0);
        packet.write_bool(true);

        let mut packet = Packet::from_bytes(packet.into_bytes());
        packet.read_i32().unwrap();
        assert_eq!(packet.read_pos(), 4);
        packet.read_i16().unwrap();
        assert_eq!(packet.read_pos(), 6);
        packet.read_f32().unwrap();
        assert_eq!(packet.read_pos(), 10);
        packet.read_bool().unwrap();
        assert_eq!(packet.read_pos(), 11);
    }

    #[test]
    fn peek_then_read_sees_same_value() {
        let mut packet = Packet::new();
        packet.write_i32(42);
        packet.write_i32(99);

        let mut packet = Packet::from_bytes(packet.into_bytes());
        assert_eq!(packet.peek_i32().unwrap(), 42);
        assert_eq!(packet.read_pos(), 0);
        assert_eq!(packet.read_i32().unwrap(), 42);
        assert_eq!(packet.read_pos(), 4);
        assert_eq!(packet.read_i32().unwrap(), 99);
    }

    #[test]
    fn unread_rewinds_one_int() {
        let mut packet = Packet::new();
        packet.write_i32(5);

        let mut packet = Packet::from_bytes(packet.into_bytes());
        assert_eq!(packet.read_i32().unwrap(), 5);
        packet.unread_int();
        assert_eq!(packet.read_i32().unwrap(), 5);

        // Rewinding past the start clamps to zero.
        packet.unread_int();
        packet.unread_int();
        assert_eq!(packet.read_pos(), 0);
    }

    #[test]
    fn underrun_on_every_width() {
        let mut packet = Packet::from_bytes(vec![0x01]);
        assert!(matches!(
            packet.read_i32(),
            Err(PacketError::BufferUnderrun { wanted: 4, .. })
        ));
        assert!(matches!(
            packet.read_i16(),
            Err(PacketError::BufferUnderrun { wanted: 2, .. })
        ));
        assert!(matches!(
            packet.read_i64(),
            Err(PacketError::BufferUnderrun { wanted: 8, .. })
        ));
        // A failed read must not consume anything.
        assert_eq!(packet.read_pos(), 0);
        assert_eq!(packet.read_u8().unwrap(), 0x01);
        assert!(packet.read_u8().is_err());
    }

    #[test]
    fn string_underrun_is_atomic() {
        // Length prefix claims 10 bytes, only 2 present.
        let mut packet = Packet::new();
        packet.write_i32(10);
        packet.write_u8(b'h');
        packet.write_u8(b'i');

        let mut packet = Packet::from_bytes(packet.into_bytes());
        assert!(matches!(
            packet.read_string(),
            Err(PacketError::BufferUnderrun { what: "string", .. })
        ));
        // Cursor restored, no partial string consumed.
        assert_eq!(packet.read_pos(), 0);
    }

    #[test]
    fn string_negative_length_is_underrun() {
        let mut packet = Packet::new();
        packet.write_i32(-1);

        let mut packet = Packet::from_bytes(packet.into_bytes());
        assert!(packet.read_string().is_err());
    }

    #[test]
    fn insert_int_prepends() {
        let mut packet = Packet::with_id(2);
        packet.write_i32(42);
        packet.insert_int(7);

        let mut packet = Packet::from_bytes(packet.into_bytes());
        assert_eq!(packet.read_i32().unwrap(), 7);
        assert_eq!(packet.read_i32().unwrap(), 2);
        assert_eq!(packet.read_i32().unwrap(), 42);
    }

    // The full outgoing framing path: action ID, payload, length prefix,
    // sender stamp, then the receive-side unwrap.
    #[test]
    fn framed_packet_round_trip() {
        let mut packet = Packet::with_id(2);
        packet.write_i32(42);
        packet.write_string("go");
        packet.write_length_prefix();
        packet.insert_int(7);

        let mut wire = Packet::from_bytes(packet.into_bytes());
        let sender = wire.read_i32().unwrap();
        assert_eq!(sender, 7);
        let frame_len = wire.read_i32().unwrap();
        assert_eq!(frame_len as usize, wire.unread_len());

        let mut inner = Packet::from_bytes(wire.read_bytes(frame_len as usize).unwrap());
        assert_eq!(inner.read_i32().unwrap(), 2);
        assert_eq!(inner.read_i32().unwrap(), 42);
        assert_eq!(inner.read_string().unwrap(), "go");
        assert_eq!(inner.unread_len(), 0);
    }

    #[test]
    fn reset_allows_reuse() {
        let mut packet = Packet::with_id(1);
        packet.write_string("data");
        packet.reset();
        assert!(packet.is_empty());
        assert_eq!(packet.read_pos(), 0);
    }
}
