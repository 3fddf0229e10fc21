//! Frame header and codec.

use bytes::{BufMut, Bytes, BytesMut};
use serde::{Serialize, de::DeserializeOwned};
use zerocopy::{
    FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned,
    byteorder::{BigEndian, U16, U32, U64},
};

use crate::{
    error::ProtoError,
    payloads::{BasisAnnouncement, Hello},
};

/// Largest payload a frame may declare.
pub const MAX_PAYLOAD_SIZE: usize = 64 * 1024;

const MAGIC: [u8; 4] = *b"GHZS";
const VERSION: u8 = 1;

/// Frame kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum Opcode {
    /// Stream preamble carrying [`Hello`].
    Hello = 1,
    /// Basis announcement carrying [`BasisAnnouncement`].
    Announce = 2,
}

impl TryFrom<u8> for Opcode {
    type Error = ProtoError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(Self::Hello),
            2 => Ok(Self::Announce),
            other => Err(ProtoError::UnknownOpcode(other)),
        }
    }
}

/// Fixed 20-byte frame header.
#[repr(C)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, KnownLayout, Immutable, Unaligned,
)]
pub struct FrameHeader {
    magic: [u8; 4],
    version: u8,
    opcode: u8,
    reserved: U16<BigEndian>,
    round: U64<BigEndian>,
    payload_size: U32<BigEndian>,
}

impl FrameHeader {
    /// Encoded header size in bytes.
    pub const SIZE: usize = 20;

    /// New header with no payload.
    pub fn new(opcode: Opcode, round: u64) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            opcode: opcode as u8,
            reserved: U16::new(0),
            round: U64::new(round),
            payload_size: U32::new(0),
        }
    }

    /// Parse and validate a header from the front of `bytes`.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtoError> {
        let head = bytes
            .get(..Self::SIZE)
            .ok_or(ProtoError::Truncated { needed: Self::SIZE, available: bytes.len() })?;
        let header = Self::read_from_bytes(head)
            .map_err(|_| ProtoError::Truncated { needed: Self::SIZE, available: bytes.len() })?;

        if header.magic != MAGIC {
            return Err(ProtoError::BadMagic(header.magic));
        }
        if header.version != VERSION {
            return Err(ProtoError::UnsupportedVersion(header.version));
        }
        Opcode::try_from(header.opcode)?;
        if header.payload_size() > MAX_PAYLOAD_SIZE {
            return Err(ProtoError::PayloadTooLarge(header.payload_size()));
        }

        Ok(header)
    }

    /// Frame kind. Headers built by [`FrameHeader::from_bytes`] always carry a
    /// known opcode.
    pub fn opcode(&self) -> Option<Opcode> {
        Opcode::try_from(self.opcode).ok()
    }

    /// Round number.
    pub fn round(&self) -> u64 {
        self.round.get()
    }

    /// Declared payload length.
    pub fn payload_size(&self) -> usize {
        self.payload_size.get() as usize
    }

    fn set_payload_size(&mut self, size: usize) -> Result<(), ProtoError> {
        if size > MAX_PAYLOAD_SIZE {
            return Err(ProtoError::PayloadTooLarge(size));
        }
        let size = u32::try_from(size).map_err(|_| ProtoError::PayloadTooLarge(size))?;
        self.payload_size = U32::new(size);
        Ok(())
    }
}

/// A header plus its CBOR payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// Frame header.
    pub header: FrameHeader,
    /// Encoded payload.
    pub payload: Bytes,
}

impl Frame {
    /// Frame with a CBOR-encoded payload.
    pub fn new<T: Serialize>(opcode: Opcode, round: u64, payload: &T) -> Result<Self, ProtoError> {
        let mut buf = Vec::new();
        ciborium::into_writer(payload, &mut buf).map_err(|e| ProtoError::Cbor(e.to_string()))?;

        let mut header = FrameHeader::new(opcode, round);
        header.set_payload_size(buf.len())?;

        Ok(Self { header, payload: Bytes::from(buf) })
    }

    /// Stream preamble frame.
    pub fn hello(hello: &Hello) -> Result<Self, ProtoError> {
        Self::new(Opcode::Hello, 0, hello)
    }

    /// Announcement frame. The header round mirrors the payload round.
    pub fn announce(announcement: &BasisAnnouncement) -> Result<Self, ProtoError> {
        Self::new(Opcode::Announce, announcement.round, announcement)
    }

    /// Total encoded length.
    pub fn encoded_len(&self) -> usize {
        FrameHeader::SIZE + self.payload.len()
    }

    /// Append the encoded frame to `dst`.
    pub fn encode(&self, dst: &mut impl BufMut) {
        dst.put_slice(self.header.as_bytes());
        dst.put_slice(&self.payload);
    }

    /// Encode into a fresh buffer.
    pub fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::with_capacity(self.encoded_len());
        self.encode(&mut buf);
        buf.freeze()
    }

    /// Decode one complete frame from `bytes`.
    pub fn decode(bytes: &[u8]) -> Result<Self, ProtoError> {
        let header = FrameHeader::from_bytes(bytes)?;
        let end = FrameHeader::SIZE + header.payload_size();
        let payload = bytes
            .get(FrameHeader::SIZE..end)
            .ok_or(ProtoError::Truncated { needed: end, available: bytes.len() })?;

        Ok(Self { header, payload: Bytes::copy_from_slice(payload) })
    }

    /// Decode the payload as `T`.
    pub fn payload_as<T: DeserializeOwned>(&self) -> Result<T, ProtoError> {
        ciborium::from_reader(&self.payload[..]).map_err(|e| ProtoError::Cbor(e.to_string()))
    }

    /// Decode an announcement, checking that header and payload agree on the
    /// round.
    pub fn announcement(&self) -> Result<BasisAnnouncement, ProtoError> {
        if self.header.opcode() != Some(Opcode::Announce) {
            return Err(ProtoError::UnknownOpcode(self.header.opcode));
        }
        let announcement: BasisAnnouncement = self.payload_as()?;
        if announcement.round != self.header.round() {
            return Err(ProtoError::Cbor(format!(
                "round mismatch: header {}, payload {}",
                self.header.round(),
                announcement.round
            )));
        }
        Ok(announcement)
    }

    /// Decode a stream preamble.
    pub fn hello_payload(&self) -> Result<Hello, ProtoError> {
        if self.header.opcode() != Some(Opcode::Hello) {
            return Err(ProtoError::UnknownOpcode(self.header.opcode));
        }
        self.payload_as()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Basis, PartyId};

    #[test]
    fn header_is_twenty_bytes() {
        assert_eq!(std::mem::size_of::<FrameHeader>(), FrameHeader::SIZE);
    }

    #[test]
    fn header_rejects_bad_magic() {
        let mut bytes = FrameHeader::new(Opcode::Announce, 3).as_bytes().to_vec();
        bytes[0] = b'X';
        assert!(matches!(FrameHeader::from_bytes(&bytes), Err(ProtoError::BadMagic(_))));
    }

    #[test]
    fn header_rejects_short_buffer() {
        let result = FrameHeader::from_bytes(&[0u8; 7]);
        assert_eq!(result, Err(ProtoError::Truncated { needed: 20, available: 7 }));
    }

    #[test]
    fn announcement_frame_carries_round() {
        let ann = BasisAnnouncement::own(9, PartyId::new("Bob"), Basis::Y);
        let frame = Frame::announce(&ann).unwrap();

        assert_eq!(frame.header.round(), 9);
        assert_eq!(frame.header.opcode(), Some(Opcode::Announce));
        assert_eq!(frame.announcement().unwrap(), ann);
    }

    #[test]
    fn hello_frame_is_not_an_announcement() {
        let frame = Frame::hello(&Hello { sender: PartyId::new("Alice") }).unwrap();
        assert!(frame.announcement().is_err());
        assert_eq!(frame.hello_payload().unwrap().sender.as_str(), "Alice");
    }
}
