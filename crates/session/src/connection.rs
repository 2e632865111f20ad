//! Client-seitige Verbindung zum Parley-Relay
//!
//! Nutzt den FrameCodec aus parley-protocol fuer das Wire-Format
//! (u32 BE Laenge + JSON-Payload). Nach dem Verbindungsaufbau meldet das
//! Relay als erstes die zugewiesene Endpunkt-ID; danach treibt eine
//! Ereignisschleife die Verteilung eingehender Envelopes und das
//! Schreiben der ausgehenden Signale des Controllers.

use futures_util::{SinkExt, StreamExt};
use parking_lot::Mutex;
use parley_core::types::EndpointId;
use parley_protocol::envelope::{Envelope, EnvelopePayload};
use parley_protocol::wire::FrameCodec;
use std::sync::Arc;
use tokio::net::TcpStream;
use tokio::sync::mpsc;
use tokio_util::codec::Framed;

use crate::chat::ChatVerlauf;
use crate::controller::{AusgehendesSignal, CallController};
use crate::engine::EngineFabrik;
use crate::error::{SessionError, SessionResult};
use crate::media::MediaSource;

/// Groesse der ausgehenden Signal-Queue
const AUSGANGS_QUEUE_GROESSE: usize = 64;

/// Verbindung eines Clients zum Relay
///
/// Besitzt den Anruf-Controller und den Chat-Verlauf. Die
/// Ereignisschleife laeuft in einem eigenen tokio-Task bis die
/// Verbindung endet; danach werden die Gespraechsressourcen abgebaut.
pub struct RelayClient {
    eigene_id: EndpointId,
    controller: Arc<CallController>,
    chat: Arc<ChatVerlauf>,
    presence: Arc<Mutex<Vec<EndpointId>>>,
    ausgang_tx: mpsc::Sender<AusgehendesSignal>,
    schliessen_tx: tokio::sync::watch::Sender<bool>,
}

impl RelayClient {
    /// Verbindet sich mit dem Relay und wartet auf die Begruessung
    pub async fn verbinden(
        adresse: &str,
        engine_fabrik: Arc<dyn EngineFabrik>,
        medien_quelle: Arc<dyn MediaSource>,
    ) -> SessionResult<Self> {
        tracing::info!(adresse = %adresse, "Verbinde mit Relay");
        let stream = TcpStream::connect(adresse).await?;
        let mut framed = Framed::new(stream, FrameCodec::new());

        // Erste Nachricht muss die Begruessung mit der eigenen ID sein
        let eigene_id = match framed.next().await {
            Some(Ok(env)) => match env.payload {
                EnvelopePayload::Welcome { endpoint_id } => endpoint_id,
                andere => {
                    return Err(SessionError::Protokoll(format!(
                        "Begruessung erwartet, erhalten: {:?}",
                        andere
                    )))
                }
            },
            Some(Err(e)) => return Err(e.into()),
            None => {
                return Err(SessionError::Protokoll(
                    "Verbindung vor der Begruessung getrennt".into(),
                ))
            }
        };
        tracing::info!(endpoint_id = %eigene_id, "Am Relay angemeldet");

        let (ausgang_tx, ausgang_rx) = mpsc::channel(AUSGANGS_QUEUE_GROESSE);
        let (schliessen_tx, schliessen_rx) = tokio::sync::watch::channel(false);
        let controller = CallController::neu(
            eigene_id,
            engine_fabrik,
            medien_quelle,
            ausgang_tx.clone(),
        );
        let chat = Arc::new(ChatVerlauf::neu(eigene_id));
        let presence = Arc::new(Mutex::new(Vec::new()));

        tokio::spawn(ereignis_schleife(
            framed,
            Arc::clone(&controller),
            Arc::clone(&chat),
            Arc::clone(&presence),
            ausgang_rx,
            schliessen_rx,
        ));

        Ok(Self {
            eigene_id,
            controller,
            chat,
            presence,
            ausgang_tx,
            schliessen_tx,
        })
    }

    /// Trennt die Verbindung zum Relay
    ///
    /// Die Ereignisschleife beendet sich und baut ein laufendes Gespraech
    /// ab; das Relay bemerkt das Verbindungsende und verteilt die
    /// aktualisierte Presence-Menge.
    pub fn trennen(&self) {
        let _ = self.schliessen_tx.send(true);
    }

    /// Gibt die vom Relay zugewiesene Endpunkt-ID zurueck
    pub fn eigene_id(&self) -> EndpointId {
        self.eigene_id
    }

    /// Zugriff auf den Anruf-Controller
    pub fn controller(&self) -> &Arc<CallController> {
        &self.controller
    }

    /// Zugriff auf den Chat-Verlauf
    pub fn chat(&self) -> &Arc<ChatVerlauf> {
        &self.chat
    }

    /// Momentaufnahme der zuletzt gemeldeten Presence-Menge
    pub fn presence(&self) -> Vec<EndpointId> {
        self.presence.lock().clone()
    }

    /// Sendet eine Chat-Nachricht und traegt die eigene Kopie ein
    ///
    /// Die eigene Kopie steht unabhaengig vom Zustellerfolg im Verlauf;
    /// das Relay bestaetigt nichts.
    pub fn chat_senden(&self, an: EndpointId, text: impl Into<String>) -> SessionResult<()> {
        let text = text.into();
        self.chat.ausgehend_erfassen(text.clone());
        self.ausgang_tx
            .try_send(AusgehendesSignal {
                an,
                payload: EnvelopePayload::ChatMessage { text },
            })
            .map_err(|_| SessionError::SendeFehler)
    }
}

/// Ereignisschleife der Client-Verbindung
async fn ereignis_schleife(
    mut framed: Framed<TcpStream, FrameCodec>,
    controller: Arc<CallController>,
    chat: Arc<ChatVerlauf>,
    presence: Arc<Mutex<Vec<EndpointId>>>,
    mut ausgang_rx: mpsc::Receiver<AusgehendesSignal>,
    mut schliessen_rx: tokio::sync::watch::Receiver<bool>,
) {
    loop {
        tokio::select! {
            // Eingehendes Envelope vom Relay
            frame = framed.next() => {
                match frame {
                    Some(Ok(env)) => match env.payload {
                        EnvelopePayload::Welcome { .. } => {
                            tracing::debug!("Wiederholte Begruessung ignoriert");
                        }
                        EnvelopePayload::Presence { endpoints } => {
                            tracing::debug!(anzahl = endpoints.len(), "Presence aktualisiert");
                            *presence.lock() = endpoints;
                        }
                        EnvelopePayload::Ping { timestamp_ms } => {
                            if framed.send(Envelope::pong(timestamp_ms)).await.is_err() {
                                break;
                            }
                        }
                        EnvelopePayload::Pong { .. } => {}
                        EnvelopePayload::ChatMessage { text } => match env.from {
                            Some(von) => chat.eingehend_erfassen(von, text),
                            None => tracing::warn!("Chat-Nachricht ohne Absender verworfen"),
                        },
                        payload => match env.from {
                            Some(von) => controller.signal_verarbeiten(von, payload).await,
                            None => tracing::warn!("Signal ohne Absender verworfen"),
                        },
                    },
                    Some(Err(e)) => {
                        tracing::warn!(fehler = %e, "Frame-Lesefehler");
                        break;
                    }
                    None => {
                        tracing::info!("Verbindung vom Relay getrennt");
                        break;
                    }
                }
            }

            // Ausgehendes Signal des Controllers
            Some(signal) = ausgang_rx.recv() => {
                let envelope = Envelope::adressiert(signal.an, signal.payload);
                if let Err(e) = framed.send(envelope).await {
                    tracing::warn!(fehler = %e, "Senden an Relay fehlgeschlagen");
                    break;
                }
            }

            // Lokales Trennen
            Ok(()) = schliessen_rx.changed() => {
                if *schliessen_rx.borrow() {
                    tracing::info!("Verbindung zum Relay wird getrennt");
                    break;
                }
            }
        }
    }

    // Verbindungsende: laufendes Gespraech abbauen
    controller.relay_getrennt().await;
    tracing::info!("Client-Ereignisschleife beendet");
}
