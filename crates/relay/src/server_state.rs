//! Gemeinsamer Relay-Zustand
//!
//! Haelt Registry, Broadcaster, Router und Chat-Relay zusammen und
//! buendelt An- und Abmeldung eines Endpunkts: jede Mutation der
//! Registry loest genau einen Presence-Broadcast mit der vollstaendigen
//! Endpunktliste aus. Clients gleichen immer gegen den vollen Schnappschuss
//! ab, nie gegen Deltas.

use parley_core::types::EndpointId;
use parley_protocol::envelope::Envelope;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;

use crate::broadcast::EnvelopeBroadcaster;
use crate::chat::ChatRelay;
use crate::registry::EndpointRegistry;
use crate::router::EnvelopeRouter;

/// Konfiguration fuer das Relay
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Anzeigename des Relays
    pub name: String,
    /// Maximale Anzahl gleichzeitig verbundener Endpunkte
    pub max_endpunkte: u32,
    /// Keepalive-Intervall in Sekunden
    pub keepalive_sek: u64,
    /// Timeout fuer inaktive Verbindungen in Sekunden
    pub verbindungs_timeout_sek: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            name: "Parley Relay".to_string(),
            max_endpunkte: 512,
            keepalive_sek: 30,
            verbindungs_timeout_sek: 90,
        }
    }
}

/// Gemeinsamer Relay-Zustand (thread-safe, Arc-geteilt)
pub struct RelayState {
    /// Relay-Konfiguration
    pub config: Arc<RelayConfig>,
    /// Registry (wer ist verbunden)
    pub registry: EndpointRegistry,
    /// Broadcaster (Send-Queues der Endpunkte)
    pub broadcaster: EnvelopeBroadcaster,
    /// Router (adressierte Zustellung)
    pub router: EnvelopeRouter,
    /// Chat-Relay
    pub chat: ChatRelay,
    /// Startzeitpunkt des Relays (fuer Uptime-Berechnung)
    pub start_zeit: Instant,
}

impl RelayState {
    /// Erstellt einen neuen RelayState
    pub fn neu(config: RelayConfig) -> Arc<Self> {
        let registry = EndpointRegistry::neu();
        let broadcaster = EnvelopeBroadcaster::neu();
        let router = EnvelopeRouter::neu(registry.clone(), broadcaster.clone());
        let chat = ChatRelay::neu(router.clone());

        Arc::new(Self {
            config: Arc::new(config),
            registry,
            broadcaster,
            router,
            chat,
            start_zeit: Instant::now(),
        })
    }

    /// Meldet einen neuen Endpunkt an
    ///
    /// Vergibt eine frische ID, registriert den Endpunkt in Broadcaster
    /// und Registry, reiht die Begruessung ein und verteilt den
    /// Presence-Broadcast. Gibt ID und Empfangs-Queue der Verbindung
    /// zurueck. Schlaegt nie fehl.
    pub fn endpunkt_anmelden(&self) -> (EndpointId, mpsc::Receiver<Envelope>) {
        let endpoint_id = EndpointId::new();

        // Queue zuerst, damit der neue Endpunkt Begruessung und eigenen
        // Presence-Broadcast in dieser Reihenfolge erhaelt
        let rx = self.broadcaster.registrieren(endpoint_id);
        self.broadcaster
            .an_endpunkt_senden(&endpoint_id, Envelope::welcome(endpoint_id));

        self.registry.registrieren(endpoint_id);
        self.presence_verteilen();

        (endpoint_id, rx)
    }

    /// Meldet einen Endpunkt ab und verteilt den Presence-Broadcast
    pub fn endpunkt_abmelden(&self, endpoint_id: &EndpointId) {
        self.registry.entfernen(endpoint_id);
        self.broadcaster.entfernen(endpoint_id);
        self.presence_verteilen();
    }

    /// Gibt die Uptime in Sekunden zurueck
    pub fn uptime_sek(&self) -> u64 {
        self.start_zeit.elapsed().as_secs()
    }

    fn presence_verteilen(&self) {
        let liste = self.registry.liste();
        tracing::debug!(anzahl = liste.len(), "Presence-Broadcast");
        self.broadcaster.an_alle_senden(Envelope::presence(liste));
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
