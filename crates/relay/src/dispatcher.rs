//! Envelope-Dispatcher – Verarbeitet eingereichte Envelopes
//!
//! Der Dispatcher empfaengt Envelopes von einer EndpointConnection und
//! entscheidet: Keepalive beantworten, Chat ueber das ChatRelay leiten,
//! alle anderen adressierbaren Inhalte ueber den Router leiten.
//!
//! Die Absenderangabe im eingereichten Envelope wird grundsaetzlich
//! ignoriert; verbindlich ist die Endpunkt-ID der einliefernden
//! Verbindung. Damit kann kein Client eine fremde Identitaet vortaeuschen.

use parley_core::types::EndpointId;
use parley_protocol::envelope::{Envelope, EnvelopePayload};
use std::sync::Arc;

use crate::error::{RelayError, RelayResult};
use crate::server_state::RelayState;

/// Zentraler Envelope-Dispatcher
pub struct EnvelopeDispatcher {
    state: Arc<RelayState>,
}

impl EnvelopeDispatcher {
    /// Erstellt einen neuen Dispatcher
    pub fn neu(state: Arc<RelayState>) -> Self {
        Self { state }
    }

    /// Verarbeitet ein eingehendes Envelope des Endpunkts `von`
    ///
    /// Gibt optional eine direkte Antwort an die einliefernde Verbindung
    /// zurueck (derzeit nur Pong auf Ping). Protokollverstoesse werden als
    /// Fehler gemeldet; die Verbindung entscheidet wie damit umzugehen ist.
    pub fn verarbeiten(
        &self,
        von: EndpointId,
        envelope: Envelope,
    ) -> RelayResult<Option<Envelope>> {
        match envelope.payload {
            // -------------------------------------------------------------------
            // Keepalive
            // -------------------------------------------------------------------
            EnvelopePayload::Ping { timestamp_ms } => Ok(Some(Envelope::pong(timestamp_ms))),

            EnvelopePayload::Pong { .. } => {
                // Empfangszeitpunkt verbucht die Connection selbst
                tracing::trace!(von = %von, "Pong empfangen");
                Ok(None)
            }

            // -------------------------------------------------------------------
            // Relay-eigene Inhalte duerfen nie von Clients kommen
            // -------------------------------------------------------------------
            EnvelopePayload::Welcome { .. } | EnvelopePayload::Presence { .. } => Err(
                RelayError::protokoll("Relay-eigener Nachrichtentyp vom Client eingereicht"),
            ),

            // -------------------------------------------------------------------
            // Chat
            // -------------------------------------------------------------------
            EnvelopePayload::ChatMessage { text } => {
                let an = envelope.to.ok_or_else(|| {
                    RelayError::protokoll("Chat-Nachricht ohne Empfaenger")
                })?;
                self.state.chat.senden(von, an, text);
                Ok(None)
            }

            // -------------------------------------------------------------------
            // Signalisierung (adressiert)
            // -------------------------------------------------------------------
            payload => {
                let an = envelope.to.ok_or_else(|| {
                    RelayError::protokoll("Adressierte Nachricht ohne Empfaenger")
                })?;
                self.state.router.weiterleiten(von, an, payload);
                Ok(None)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
