//! Envelope-Router – Stellt adressierte Envelopes dem Zielendpunkt zu
//!
//! Der Router prueft das Ziel gegen die Registry und reiht das Envelope
//! in die Send-Queue des Empfaengers ein. Der Absender wird dabei immer
//! mit der ID der sendenden Verbindung ueberschrieben – die Angabe im
//! eingereichten Envelope zaehlt nicht.
//!
//! ## Zustellpolitik
//!
//! Fire-and-forget: ist das Ziel nicht (mehr) verbunden, wird das
//! Envelope verworfen und der Absender erfaehrt nichts davon. Es gibt
//! keine Warteschlange fuer abwesende Empfaenger und keine Wiederholung.

use parley_core::types::EndpointId;
use parley_protocol::envelope::{Envelope, EnvelopePayload};

use crate::broadcast::EnvelopeBroadcaster;
use crate::registry::EndpointRegistry;

/// Stellt adressierte Envelopes zu
#[derive(Clone)]
pub struct EnvelopeRouter {
    registry: EndpointRegistry,
    broadcaster: EnvelopeBroadcaster,
}

impl EnvelopeRouter {
    /// Erstellt einen neuen Router
    pub fn neu(registry: EndpointRegistry, broadcaster: EnvelopeBroadcaster) -> Self {
        Self {
            registry,
            broadcaster,
        }
    }

    /// Leitet einen adressierten Inhalt an `an` weiter
    ///
    /// `von` ist die verbindliche Absender-ID der einliefernden Verbindung.
    /// Gibt `true` zurueck wenn das Envelope eingereiht wurde; `false`
    /// bedeutet verworfen (Ziel abwesend oder Queue nicht aufnahmefaehig).
    pub fn weiterleiten(
        &self,
        von: EndpointId,
        an: EndpointId,
        payload: EnvelopePayload,
    ) -> bool {
        if !payload.ist_adressierbar() {
            tracing::warn!(von = %von, an = %an, "Nicht adressierbarer Inhalt – verworfen");
            return false;
        }

        if !self.registry.ist_verbunden(&an) {
            tracing::debug!(von = %von, an = %an, "Ziel nicht verbunden – Envelope verworfen");
            return false;
        }

        self.broadcaster
            .an_endpunkt_senden(&an, Envelope::zustellung(von, payload))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
