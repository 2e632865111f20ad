//! Envelope-Broadcaster – Verwaltet die Send-Queues aller Endpunkte
//!
//! Der EnvelopeBroadcaster haelt pro verbundenem Endpunkt eine begrenzte
//! Send-Queue. Die `EndpointConnection` liest aus ihrer Queue und schreibt
//! via TCP. Die Queue ist damit der ausgehende Kanal eines Endpunkts;
//! ihre FIFO-Ordnung ist die Zustellreihenfolge pro Empfaenger.

use dashmap::DashMap;
use parley_core::types::EndpointId;
use parley_protocol::envelope::Envelope;
use std::sync::Arc;
use tokio::sync::mpsc;

// ---------------------------------------------------------------------------
// Konfiguration
// ---------------------------------------------------------------------------

/// Groesse der Send-Queue pro Endpunkt
const SEND_QUEUE_GROESSE: usize = 64;

// ---------------------------------------------------------------------------
// EndpointSender
// ---------------------------------------------------------------------------

/// Handle auf die Send-Queue eines verbundenen Endpunkts
#[derive(Clone, Debug)]
pub struct EndpointSender {
    pub endpoint_id: EndpointId,
    pub tx: mpsc::Sender<Envelope>,
}

impl EndpointSender {
    /// Reiht ein Envelope nicht-blockierend in die Queue ein
    ///
    /// Gibt `false` zurueck wenn die Queue voll oder geschlossen ist.
    pub fn senden(&self, envelope: Envelope) -> bool {
        match self.tx.try_send(envelope) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(
                    endpoint_id = %self.endpoint_id,
                    "Send-Queue voll – Envelope verworfen"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(
                    endpoint_id = %self.endpoint_id,
                    "Send-Queue geschlossen (Endpunkt getrennt)"
                );
                false
            }
        }
    }
}

// ---------------------------------------------------------------------------
// EnvelopeBroadcaster
// ---------------------------------------------------------------------------

/// Zentraler Broadcaster fuer alle verbundenen Endpunkte
///
/// Thread-safe via Arc + DashMap. Clone teilt den inneren Zustand.
#[derive(Clone)]
pub struct EnvelopeBroadcaster {
    inner: Arc<EnvelopeBroadcasterInner>,
}

struct EnvelopeBroadcasterInner {
    /// Endpunkt-Sender, indiziert nach EndpointId
    endpunkte: DashMap<EndpointId, EndpointSender>,
}

impl EnvelopeBroadcaster {
    /// Erstellt einen neuen EnvelopeBroadcaster
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(EnvelopeBroadcasterInner {
                endpunkte: DashMap::new(),
            }),
        }
    }

    /// Registriert einen Endpunkt und gibt seine Empfangs-Queue zurueck
    ///
    /// Die `EndpointConnection` liest aus dieser Queue und sendet via TCP.
    pub fn registrieren(&self, endpoint_id: EndpointId) -> mpsc::Receiver<Envelope> {
        let (tx, rx) = mpsc::channel(SEND_QUEUE_GROESSE);
        let sender = EndpointSender { endpoint_id, tx };
        self.inner.endpunkte.insert(endpoint_id, sender);
        tracing::debug!(endpoint_id = %endpoint_id, "Endpunkt im Broadcaster registriert");
        rx
    }

    /// Entfernt einen Endpunkt aus dem Broadcaster
    pub fn entfernen(&self, endpoint_id: &EndpointId) {
        self.inner.endpunkte.remove(endpoint_id);
        tracing::debug!(endpoint_id = %endpoint_id, "Endpunkt aus Broadcaster entfernt");
    }

    /// Sendet ein Envelope an einen einzelnen Endpunkt
    ///
    /// Gibt `true` zurueck wenn der Endpunkt gefunden und das Envelope
    /// eingereiht wurde.
    pub fn an_endpunkt_senden(&self, endpoint_id: &EndpointId, envelope: Envelope) -> bool {
        match self.inner.endpunkte.get(endpoint_id) {
            Some(sender) => sender.senden(envelope),
            None => {
                tracing::debug!(endpoint_id = %endpoint_id, "Senden an unbekannten Endpunkt");
                false
            }
        }
    }

    /// Sendet ein Envelope an alle verbundenen Endpunkte
    ///
    /// Gibt die Anzahl der erfolgreichen Sendungen zurueck.
    pub fn an_alle_senden(&self, envelope: Envelope) -> usize {
        let mut gesendet = 0;
        self.inner.endpunkte.iter().for_each(|entry| {
            if entry.value().senden(envelope.clone()) {
                gesendet += 1;
            }
        });
        gesendet
    }

    /// Prueft ob ein Endpunkt registriert ist
    pub fn ist_registriert(&self, endpoint_id: &EndpointId) -> bool {
        self.inner.endpunkte.contains_key(endpoint_id)
    }

    /// Gibt die Anzahl der registrierten Endpunkte zurueck
    pub fn anzahl(&self) -> usize {
        self.inner.endpunkte.len()
    }
}

impl Default for EnvelopeBroadcaster {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
