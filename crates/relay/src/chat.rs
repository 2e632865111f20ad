//! Chat-Relay – Leitet Textnachrichten zwischen Endpunkten weiter
//!
//! Zustandslose Variante des Routers: keine Historie, keine Bestaetigung,
//! dieselbe Best-Effort-Zustellung. Der Empfaenger fuehrt sein eigenes
//! lokales Protokoll; der Absender ebenso (seine Kopie laeuft nie ueber
//! das Relay).

use parley_core::types::EndpointId;
use parley_protocol::envelope::EnvelopePayload;

use crate::router::EnvelopeRouter;

/// Zustandsloses Chat-Relay
#[derive(Clone)]
pub struct ChatRelay {
    router: EnvelopeRouter,
}

impl ChatRelay {
    /// Erstellt ein neues ChatRelay
    pub fn neu(router: EnvelopeRouter) -> Self {
        Self { router }
    }

    /// Leitet eine Textnachricht an `an` weiter
    ///
    /// Gibt `true` zurueck wenn die Nachricht eingereiht wurde.
    pub fn senden(&self, von: EndpointId, an: EndpointId, text: String) -> bool {
        tracing::debug!(von = %von, an = %an, "Chat-Nachricht");
        self.router
            .weiterleiten(von, an, EnvelopePayload::ChatMessage { text })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::broadcast::EnvelopeBroadcaster;
    use crate::registry::EndpointRegistry;

    fn test_chat() -> (ChatRelay, EndpointRegistry, EnvelopeBroadcaster) {
        let registry = EndpointRegistry::neu();
        let broadcaster = EnvelopeBroadcaster::neu();
        let router = EnvelopeRouter::neu(registry.clone(), broadcaster.clone());
        (ChatRelay::neu(router), registry, broadcaster)
    }

    #[tokio::test]
    async fn nachricht_wird_mit_absender_zugestellt() {
        let (chat, registry, broadcaster) = test_chat();
        let von = EndpointId::new();
        let an = EndpointId::new();

        registry.registrieren(an);
        let mut rx = broadcaster.registrieren(an);

        assert!(chat.senden(von, an, "hallo".into()));

        let env = rx.try_recv().expect("Nachricht erwartet");
        assert_eq!(env.from, Some(von));
        match env.payload {
            EnvelopePayload::ChatMessage { text } => assert_eq!(text, "hallo"),
            _ => panic!("Erwartet ChatMessage-Payload"),
        }
    }

    #[tokio::test]
    async fn nachricht_an_unbekannten_endpunkt_geht_verloren() {
        let (chat, _registry, _broadcaster) = test_chat();
        assert!(!chat.senden(EndpointId::new(), EndpointId::new(), "hi".into()));
    }
}
