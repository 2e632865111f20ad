//! Envelope-Protokoll
//!
//! Definiert alle Nachrichten die zwischen Clients und dem Relay
//! ausgetauscht werden.
//!
//! ## Design
//! - Ein einziger Wire-Typ `Envelope` in beide Richtungen
//! - JSON-Serialisierung via serde, Tagged Enum fuer typsichere Inhalte
//! - `from` ist nur in Richtung Relay -> Client verbindlich: das Relay
//!   ueberschreibt jede Absenderangabe mit der eigenen Buchfuehrung,
//!   damit kein Client eine fremde Identitaet vortaeuschen kann
//! - `to` ist nur in Richtung Client -> Relay relevant

use parley_core::types::EndpointId;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Verhandlungs-Inhalte (opak fuer das Relay)
// ---------------------------------------------------------------------------

/// Art einer Sitzungsbeschreibung
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SdpKind {
    Offer,
    Answer,
}

/// Sitzungsbeschreibung des Verhandlungs-Engines
///
/// Das Relay interpretiert den Inhalt nicht; nur die beiden Endpunkte
/// und ihre Engines verstehen das SDP.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionDescription {
    pub kind: SdpKind,
    pub sdp: String,
}

impl SessionDescription {
    /// Erstellt ein Offer
    pub fn offer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Offer,
            sdp: sdp.into(),
        }
    }

    /// Erstellt ein Answer
    pub fn answer(sdp: impl Into<String>) -> Self {
        Self {
            kind: SdpKind::Answer,
            sdp: sdp.into(),
        }
    }
}

/// Netzwerk-Erreichbarkeits-Kandidat
///
/// Wird vom Verhandlungs-Engine asynchron gesammelt und ueber das Relay
/// an die Gegenseite weitergereicht.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IceCandidate {
    pub candidate: String,
    pub sdp_mid: Option<String>,
    pub sdp_mline_index: Option<u32>,
}

// ---------------------------------------------------------------------------
// Envelope-Inhalte
// ---------------------------------------------------------------------------

/// Inhalt eines Envelopes (typsicher via Tagged Enum)
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum EnvelopePayload {
    // --- Relay -> Client ---
    /// Begruessung nach Verbindungsaufbau: teilt dem Client seine ID mit
    Welcome { endpoint_id: EndpointId },
    /// Vollstaendige Liste aller verbundenen Endpunkte (nie ein Delta)
    Presence { endpoints: Vec<EndpointId> },

    // --- Keepalive ---
    Ping { timestamp_ms: u64 },
    Pong { echo_timestamp_ms: u64 },

    // --- Signalisierung (adressiert, wird verbatim weitergeleitet) ---
    /// Anrufwunsch mit dem initialen Offer
    CallRequest { offer: SessionDescription },
    /// Nachverhandlung waehrend eines laufenden Gespraechs
    Offer { description: SessionDescription },
    /// Antwort des Angerufenen auf ein Offer
    Answer { description: SessionDescription },
    /// Netzwerk-Kandidat der Gegenseite
    Candidate { candidate: IceCandidate },
    /// Anruf wurde abgelehnt
    CallRejected,
    /// Gespraech wurde beendet
    Hangup,

    // --- Chat ---
    ChatMessage { text: String },
}

impl EnvelopePayload {
    /// Ob dieser Inhalt von Client zu Client geroutet wird
    ///
    /// Relay-eigene Inhalte (Welcome, Presence, Ping, Pong) sind nie
    /// adressierbar; ein Client der sie einreicht verletzt das Protokoll.
    pub fn ist_adressierbar(&self) -> bool {
        matches!(
            self,
            EnvelopePayload::CallRequest { .. }
                | EnvelopePayload::Offer { .. }
                | EnvelopePayload::Answer { .. }
                | EnvelopePayload::Candidate { .. }
                | EnvelopePayload::CallRejected
                | EnvelopePayload::Hangup
                | EnvelopePayload::ChatMessage { .. }
        )
    }
}

// ---------------------------------------------------------------------------
// Envelope (Umschlag fuer alle Nachrichten)
// ---------------------------------------------------------------------------

/// Adressierte, typisierte Nachricht – die Wire-Einheit des Protokolls
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Envelope {
    /// Absender. Wird vom Relay gesetzt; Angaben des Clients zaehlen nicht.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub from: Option<EndpointId>,
    /// Empfaenger. Nur in Richtung Client -> Relay relevant.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub to: Option<EndpointId>,
    /// Inhalt der Nachricht
    pub payload: EnvelopePayload,
}

impl Envelope {
    /// Erstellt ein adressiertes Envelope (Client -> Relay)
    pub fn adressiert(to: EndpointId, payload: EnvelopePayload) -> Self {
        Self {
            from: None,
            to: Some(to),
            payload,
        }
    }

    /// Erstellt ein Zustellungs-Envelope mit verbindlichem Absender
    /// (Relay -> Client)
    pub fn zustellung(from: EndpointId, payload: EnvelopePayload) -> Self {
        Self {
            from: Some(from),
            to: None,
            payload,
        }
    }

    /// Erstellt die Begruessungsnachricht des Relays
    pub fn welcome(endpoint_id: EndpointId) -> Self {
        Self {
            from: None,
            to: None,
            payload: EnvelopePayload::Welcome { endpoint_id },
        }
    }

    /// Erstellt einen Presence-Broadcast mit der vollen Endpunktliste
    pub fn presence(endpoints: Vec<EndpointId>) -> Self {
        Self {
            from: None,
            to: None,
            payload: EnvelopePayload::Presence { endpoints },
        }
    }

    /// Erstellt einen Keepalive-Ping
    pub fn ping(timestamp_ms: u64) -> Self {
        Self {
            from: None,
            to: None,
            payload: EnvelopePayload::Ping { timestamp_ms },
        }
    }

    /// Erstellt die Pong-Antwort auf einen Ping
    pub fn pong(echo_timestamp_ms: u64) -> Self {
        Self {
            from: None,
            to: None,
            payload: EnvelopePayload::Pong { echo_timestamp_ms },
        }
    }

    /// Serialisiert das Envelope als JSON
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Deserialisiert ein Envelope aus JSON
    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
