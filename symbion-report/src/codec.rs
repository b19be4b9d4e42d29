//! Encodage fil des rapports.
//!
//! Binaire : un octet de version, puis MessagePack (champs nommés) compressé
//! en gzip. JSON : même contenu logique, pour le debug et l'interop.
//! Flux : trames `u32` big-endian de longueur suivies du payload.

use crate::error::CodecError;
use flate2::read::GzDecoder;
use flate2::write::GzEncoder;
use flate2::Compression;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::io::{ErrorKind, Read, Write};

pub const WIRE_VERSION: u8 = 1;

/// Largest frame `read_frame` accepts, and largest inflated payload
/// `decode` accepts.
pub const MAX_FRAME_LEN: usize = 64 * 1024 * 1024;

pub fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    let packed = rmp_serde::to_vec_named(value)?;
    let mut out = vec![WIRE_VERSION];
    let mut gz = GzEncoder::new(&mut out, Compression::fast());
    gz.write_all(&packed)?;
    gz.finish()?;
    Ok(out)
}

pub fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    let (version, body) = bytes.split_first().ok_or(CodecError::Empty)?;
    if *version != WIRE_VERSION {
        return Err(CodecError::UnsupportedVersion(*version));
    }
    let packed = inflate(body, MAX_FRAME_LEN)?;
    Ok(rmp_serde::from_slice(&packed)?)
}

fn inflate(body: &[u8], limit: usize) -> Result<Vec<u8>, CodecError> {
    let mut packed = Vec::new();
    GzDecoder::new(body).take(limit as u64 + 1).read_to_end(&mut packed)?;
    if packed.len() > limit {
        return Err(CodecError::FrameTooLarge(packed.len()));
    }
    Ok(packed)
}

pub fn encode_json<T: Serialize>(value: &T) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(value)?)
}

pub fn decode_json<T: DeserializeOwned>(bytes: &[u8]) -> Result<T, CodecError> {
    if bytes.is_empty() {
        return Err(CodecError::Empty);
    }
    Ok(serde_json::from_slice(bytes)?)
}

pub fn write_frame<W: Write>(w: &mut W, payload: &[u8]) -> Result<(), CodecError> {
    if payload.len() > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLarge(payload.len()));
    }
    w.write_all(&(payload.len() as u32).to_be_bytes())?;
    w.write_all(payload)?;
    Ok(())
}

/// Next frame of the stream, `None` on a clean end of stream.
pub fn read_frame<R: Read>(r: &mut R) -> Result<Option<Vec<u8>>, CodecError> {
    let mut len = [0u8; 4];
    match r.read_exact(&mut len) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }
    let len = u32::from_be_bytes(len) as usize;
    if len > MAX_FRAME_LEN {
        return Err(CodecError::FrameTooLarge(len));
    }
    let mut payload = vec![0u8; len];
    r.read_exact(&mut payload)?;
    Ok(Some(payload))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edge_metadata::EdgeMetadata;
    use crate::node::Node;
    use crate::report::Report;
    use crate::topology::Topology;
    use std::io::Cursor;

    fn sample() -> Report {
        let md = EdgeMetadata { egress_packet_count: Some(0), ingress_byte_count: Some(9), ..Default::default() };
        Report::new().with_topology(
            "endpoint",
            &Topology::new().with_node(Node::new("a;1.2.3.4;80").with_counter("conns", 2).with_edge("b", md)),
        )
    }

    #[test]
    fn test_binary_round_trip() {
        let r = sample();
        let bytes = encode(&r).unwrap();
        assert_eq!(bytes[0], WIRE_VERSION);
        assert_eq!(decode::<Report>(&bytes).unwrap(), r);
    }

    #[test]
    fn test_decode_rejects_bad_input() {
        assert!(matches!(decode::<Report>(&[]), Err(CodecError::Empty)));
        assert!(matches!(decode::<Report>(&[9, 1, 2]), Err(CodecError::UnsupportedVersion(9))));
        assert!(matches!(decode::<Report>(&[WIRE_VERSION, 1, 2, 3]), Err(CodecError::Io(_))));
    }

    #[test]
    fn test_inflated_size_is_bounded() {
        let bytes = encode(&vec![0u8; 4096]).unwrap();
        assert!(inflate(&bytes[1..], 1 << 20).is_ok());
        assert!(matches!(inflate(&bytes[1..], 64), Err(CodecError::FrameTooLarge(65))));
    }

    #[test]
    fn test_frames() {
        let mut buf = Vec::new();
        write_frame(&mut buf, b"one").unwrap();
        write_frame(&mut buf, b"").unwrap();
        let mut cursor = Cursor::new(buf);
        assert_eq!(read_frame(&mut cursor).unwrap(), Some(b"one".to_vec()));
        assert_eq!(read_frame(&mut cursor).unwrap(), Some(Vec::new()));
        assert_eq!(read_frame(&mut cursor).unwrap(), None);
    }

    #[test]
    fn test_oversized_frame_header() {
        let mut cursor = Cursor::new(u32::MAX.to_be_bytes().to_vec());
        assert!(matches!(read_frame(&mut cursor), Err(CodecError::FrameTooLarge(_))));
    }
}
