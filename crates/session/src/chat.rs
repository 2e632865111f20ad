//! Chat-Verlauf – lokales, geordnetes Nachrichtenprotokoll
//!
//! Jeder Client fuehrt seinen eigenen Verlauf. Der Absender traegt seine
//! ausgehende Nachricht sofort selbst ein; seine Kopie laeuft nie ueber
//! das Relay. Es gibt keine Zustellbestaetigung – eine verlorene
//! Nachricht fehlt nur im Verlauf des Empfaengers.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use parley_core::types::EndpointId;

/// Einzelner Eintrag im Chat-Verlauf
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatEintrag {
    pub von: EndpointId,
    pub text: String,
    pub zeit: DateTime<Utc>,
}

/// Lokales Chat-Protokoll eines Clients
pub struct ChatVerlauf {
    eigene_id: EndpointId,
    eintraege: Mutex<Vec<ChatEintrag>>,
}

impl ChatVerlauf {
    /// Erstellt einen leeren Verlauf
    pub fn neu(eigene_id: EndpointId) -> Self {
        Self {
            eigene_id,
            eintraege: Mutex::new(Vec::new()),
        }
    }

    /// Traegt die eigene ausgehende Nachricht ein
    pub fn ausgehend_erfassen(&self, text: impl Into<String>) {
        self.eintraege.lock().push(ChatEintrag {
            von: self.eigene_id,
            text: text.into(),
            zeit: Utc::now(),
        });
    }

    /// Traegt eine zugestellte Nachricht ein
    pub fn eingehend_erfassen(&self, von: EndpointId, text: impl Into<String>) {
        self.eintraege.lock().push(ChatEintrag {
            von,
            text: text.into(),
            zeit: Utc::now(),
        });
    }

    /// Momentaufnahme des Verlaufs in Eintragsreihenfolge
    pub fn eintraege(&self) -> Vec<ChatEintrag> {
        self.eintraege.lock().clone()
    }

    /// Gibt die Anzahl der Eintraege zurueck
    pub fn anzahl(&self) -> usize {
        self.eintraege.lock().len()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
