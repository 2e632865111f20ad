//! parley-session – Client-seitige Anruflogik
//!
//! Dieser Crate implementiert die Client-Seite von Parley: die
//! Zustandsmaschine eines Anrufs, die Anbindung an das Relay und die
//! Schnittstellen zu den beiden externen Mitspielern – dem
//! Verhandlungs-Engine (Transportaufbau) und dem Aufnahmegeraet
//! (lokale Medien).
//!
//! ## Architektur
//!
//! ```text
//! RelayClient (TCP-Verbindung zum Relay)
//!     |  Ereignisschleife: eingehende Envelopes verteilen,
//!     |  ausgehende Signale schreiben
//!     v
//! CallController (Zustandsmaschine, eine Sitzung zur Zeit)
//!     |
//!     +-- NegotiationEngine  (Trait: Offer/Answer/Kandidaten, extern)
//!     +-- MediaSource        (Trait: Kamera/Mikrofon, extern)
//!     +-- ChatVerlauf        (lokales Chat-Protokoll)
//! ```
//!
//! Der Controller haelt hoechstens eine aktive Sitzung. Engine-Handle und
//! Medien-Handle werden immer gemeinsam mit der Sitzung freigegeben.

pub mod chat;
pub mod connection;
pub mod controller;
pub mod engine;
pub mod error;
pub mod media;

#[cfg(test)]
mod tests;

// Bequeme Re-Exporte
pub use chat::{ChatEintrag, ChatVerlauf};
pub use connection::RelayClient;
pub use controller::{
    AnrufPhase, AnrufRolle, AusgehendesSignal, CallController, EingehenderAnruf,
};
pub use engine::{
    EngineEreignis, EngineError, EngineFabrik, NegotiationEngine, RemoteStream, TransportZustand,
};
pub use error::{SessionError, SessionResult};
pub use media::{LocalMedia, MediaError, MediaSource, MediaTrack, TrackArt, VideoSink};
