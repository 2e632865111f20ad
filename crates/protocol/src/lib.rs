//! parley-protocol – Envelope-Protokoll und Wire-Format
//!
//! Definiert die Umschlaege (Envelopes) die zwischen Clients und dem Relay
//! ausgetauscht werden, sowie das frame-basierte Wire-Format fuer die
//! TCP-Verbindung (u32 BE Laenge + JSON-Payload).
//!
//! Das Relay behandelt die Signalisierungs-Inhalte (SDP-Beschreibungen,
//! Netzwerk-Kandidaten) als opake Daten – es leitet sie nur weiter.

pub mod envelope;
pub mod wire;

// Bequeme Re-Exporte
pub use envelope::{
    Envelope, EnvelopePayload, IceCandidate, SdpKind, SessionDescription,
};
pub use wire::FrameCodec;
