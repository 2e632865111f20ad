//! parley-relay – Presence- und Signalisierungs-Relay
//!
//! Dieser Crate implementiert die Server-Seite von Parley. Das Relay
//! verwaltet TCP-Verbindungen, fuehrt Buch darueber wer gerade erreichbar
//! ist, und stellt adressierte Envelopes (Signalisierung und Chat) dem
//! richtigen Endpunkt zu. Medieninhalte sieht das Relay nie.
//!
//! ## Architektur
//!
//! ```text
//! TCP Listener (RelayServer)
//!     |
//!     v
//! EndpointConnection (pro Verbindung ein Task)
//!     |
//!     v
//! EnvelopeDispatcher
//!     |
//!     +-- EnvelopeRouter  (adressierte Signalisierung weiterleiten)
//!     +-- ChatRelay       (Chat-Nachrichten weiterleiten)
//!
//! EndpointRegistry     – Wer ist gerade verbunden
//! EnvelopeBroadcaster  – Send-Queues aller verbundenen Endpunkte
//! ```
//!
//! ## Zustellgarantie
//!
//! Die Zustellung ist best-effort: ein Envelope an einen nicht (mehr)
//! verbundenen Endpunkt wird kommentarlos verworfen, der Absender erhaelt
//! keine Fehlermeldung. Pro Empfaenger bleibt die Reihenfolge erhalten;
//! ueber Empfaenger hinweg gibt es keine Ordnungsgarantie.

pub mod broadcast;
pub mod chat;
pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod registry;
pub mod router;
pub mod server_state;
pub mod tcp;

// Bequeme Re-Exporte
pub use broadcast::EnvelopeBroadcaster;
pub use chat::ChatRelay;
pub use connection::EndpointConnection;
pub use dispatcher::EnvelopeDispatcher;
pub use error::{RelayError, RelayResult};
pub use registry::EndpointRegistry;
pub use router::EnvelopeRouter;
pub use server_state::{RelayConfig, RelayState};
pub use tcp::RelayServer;
