//! Endpunkt-Registry – Verwaltet wer gerade verbunden ist
//!
//! Die Registry ist die einzige Quelle der Wahrheit fuer die Menge der
//! erreichbaren Endpunkte. Sie haelt ausschliesslich ephemeren Zustand:
//! ein Endpunkt existiert vom Verbindungsaufbau bis zum Trennen.

use dashmap::DashMap;
use parley_core::types::EndpointId;
use std::sync::Arc;
use std::time::Instant;

/// Verwaltet die Menge der verbundenen Endpunkte
///
/// Thread-safe via Arc + DashMap. Clone der Registry teilt den inneren
/// Zustand.
#[derive(Clone)]
pub struct EndpointRegistry {
    inner: Arc<RegistryInner>,
}

struct RegistryInner {
    /// Verbundene Endpunkte mit Verbindungszeitpunkt
    endpunkte: DashMap<EndpointId, Instant>,
}

impl EndpointRegistry {
    /// Erstellt eine neue, leere Registry
    pub fn neu() -> Self {
        Self {
            inner: Arc::new(RegistryInner {
                endpunkte: DashMap::new(),
            }),
        }
    }

    /// Nimmt einen Endpunkt in die Menge der Verbundenen auf
    pub fn registrieren(&self, endpoint_id: EndpointId) {
        self.inner.endpunkte.insert(endpoint_id, Instant::now());
        tracing::info!(endpoint_id = %endpoint_id, "Endpunkt online");
    }

    /// Entfernt einen Endpunkt (No-op wenn unbekannt)
    pub fn entfernen(&self, endpoint_id: &EndpointId) {
        if self.inner.endpunkte.remove(endpoint_id).is_some() {
            tracing::info!(endpoint_id = %endpoint_id, "Endpunkt offline");
        }
    }

    /// Prueft ob ein Endpunkt verbunden ist
    pub fn ist_verbunden(&self, endpoint_id: &EndpointId) -> bool {
        self.inner.endpunkte.contains_key(endpoint_id)
    }

    /// Momentaufnahme aller verbundenen Endpunkte, stabil sortiert
    pub fn liste(&self) -> Vec<EndpointId> {
        let mut ids: Vec<EndpointId> = self.inner.endpunkte.iter().map(|e| *e.key()).collect();
        ids.sort();
        ids
    }

    /// Gibt die Anzahl der verbundenen Endpunkte zurueck
    pub fn anzahl(&self) -> usize {
        self.inner.endpunkte.len()
    }
}

impl Default for EndpointRegistry {
    fn default() -> Self {
        Self::neu()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
