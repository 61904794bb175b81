//! Seam over the OSC wire codec.
//!
//! All packet encoding and decoding goes through `rosc`; this module
//! pins the error mapping and the few helpers the rest of the crate
//! needs, so swapping the codec touches one file.

pub use rosc::{OscBundle, OscMessage, OscPacket, OscType};

use crate::error::{Error, Result};

/// Decode one UDP datagram into an OSC packet (message or bundle).
pub fn decode(bytes: &[u8]) -> Result<OscPacket> {
    let (_rest, packet) =
        rosc::decoder::decode_udp(bytes).map_err(|e| Error::Decode(e.to_string()))?;
    Ok(packet)
}

/// Encode an OSC packet to wire bytes.
pub fn encode(packet: &OscPacket) -> Result<Vec<u8>> {
    rosc::encoder::encode(packet).map_err(|e| Error::Encode(e.to_string()))
}

/// Build a single-message packet from an address pattern and arguments.
pub fn message(addr: impl Into<String>, args: Vec<OscType>) -> OscPacket {
    OscPacket::Message(OscMessage {
        addr: addr.into(),
        args,
    })
}

/// One-line rendering of a packet for event display.
pub fn packet_summary(packet: &OscPacket) -> String {
    match packet {
        OscPacket::Message(msg) => {
            if msg.args.is_empty() {
                msg.addr.clone()
            } else {
                let args: Vec<String> = msg.args.iter().map(arg_summary).collect();
                format!("{} {}", msg.addr, args.join(" "))
            }
        }
        OscPacket::Bundle(bundle) => {
            let inner: Vec<String> = bundle.content.iter().map(packet_summary).collect();
            format!("#bundle[{}]", inner.join(", "))
        }
    }
}

fn arg_summary(arg: &OscType) -> String {
    match arg {
        OscType::Int(v) => v.to_string(),
        OscType::Long(v) => v.to_string(),
        OscType::Float(v) => format!("{v:.4}"),
        OscType::Double(v) => format!("{v:.4}"),
        OscType::String(v) => format!("\"{v}\""),
        OscType::Bool(v) => v.to_string(),
        OscType::Char(v) => format!("'{v}'"),
        OscType::Blob(v) => format!("blob({} bytes)", v.len()),
        OscType::Nil => "nil".into(),
        OscType::Inf => "inf".into(),
        other => format!("{other:?}"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip_message() {
        let original = message(
            "/hello",
            vec![
                OscType::String("world".into()),
                OscType::Int(7),
                OscType::Float(1.5),
            ],
        );

        let bytes = encode(&original).unwrap();
        let decoded = decode(&bytes).unwrap();

        // Structural equality; the codec may normalize padding.
        assert_eq!(original, decoded);
    }

    #[test]
    fn test_decode_rejects_garbage() {
        let err = decode(&[0xff, 0x00, 0x13, 0x37]).unwrap_err();
        assert!(matches!(err, Error::Decode(_)));
    }

    #[test]
    fn test_packet_summary() {
        let packet = message("/fader/1", vec![OscType::Float(0.25), OscType::Int(3)]);
        let line = packet_summary(&packet);
        assert!(line.starts_with("/fader/1"));
        assert!(line.contains("0.2500"));
        assert!(line.contains('3'));

        let bare = message("/ping", vec![]);
        assert_eq!(packet_summary(&bare), "/ping");
    }
}
