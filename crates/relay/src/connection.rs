//! Endpunkt-Verbindung – Verwaltet eine einzelne TCP-Verbindung
//!
//! Jede TCP-Verbindung bekommt eine `EndpointConnection` in einem eigenen
//! tokio-Task. Die Anmeldung geschieht sofort beim Verbindungsaufbau:
//! der Endpunkt erhaelt eine frische ID, die Begruessung und den ersten
//! Presence-Broadcast. Pro Verbindung wird ein Ereignis vollstaendig
//! verarbeitet bevor das naechste betrachtet wird; unabhaengige
//! Verbindungen laufen nebenlaeufig.
//!
//! ## Keepalive
//! - Relay sendet alle `keepalive_sek` einen Ping
//! - Kommt innerhalb von `verbindungs_timeout_sek` kein Frame an,
//!   wird die Verbindung getrennt

use futures_util::{SinkExt, StreamExt};
use parley_protocol::envelope::Envelope;
use parley_protocol::wire::FrameCodec;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::net::TcpStream;
use tokio_util::codec::Framed;

use crate::dispatcher::EnvelopeDispatcher;
use crate::server_state::RelayState;

/// Verarbeitet eine einzelne TCP-Verbindung
///
/// Liest Frames via `FrameCodec`, dispatcht an den `EnvelopeDispatcher`
/// und leert die Send-Queue des Endpunkts in den Socket. Laeuft in einem
/// eigenen tokio-Task.
pub struct EndpointConnection {
    state: Arc<RelayState>,
    peer_addr: SocketAddr,
}

impl EndpointConnection {
    /// Erstellt eine neue EndpointConnection
    pub fn neu(state: Arc<RelayState>, peer_addr: SocketAddr) -> Self {
        Self { state, peer_addr }
    }

    /// Startet die Verbindungs-Verarbeitungsschleife
    ///
    /// Diese Methode laeuft bis die Verbindung getrennt wird oder ein
    /// Shutdown-Signal eingeht. Beim Verlassen wird der Endpunkt
    /// abgemeldet und der Presence-Broadcast verteilt.
    pub async fn verarbeiten(
        self,
        stream: TcpStream,
        mut shutdown_rx: tokio::sync::watch::Receiver<bool>,
    ) {
        let peer_addr = self.peer_addr;
        let keepalive_intervall = Duration::from_secs(self.state.config.keepalive_sek);
        let timeout_dauer = Duration::from_secs(self.state.config.verbindungs_timeout_sek);

        tracing::info!(peer = %peer_addr, "Neue Verbindung");

        let mut framed = Framed::new(stream, FrameCodec::new());

        // Anmeldung: ID vergeben, Begruessung + Presence einreihen
        let (endpoint_id, mut sende_rx) = self.state.endpunkt_anmelden();
        let dispatcher = EnvelopeDispatcher::neu(Arc::clone(&self.state));

        // Zeitpunkt des letzten empfangenen Frames
        let mut letzter_empfang = Instant::now();
        // Zeitpunkt des naechsten Ping
        let mut naechster_ping = Instant::now() + keepalive_intervall;

        loop {
            let jetzt = Instant::now();

            // Timeout-Pruefung
            if jetzt.duration_since(letzter_empfang) > timeout_dauer {
                tracing::warn!(peer = %peer_addr, endpoint_id = %endpoint_id, "Verbindungs-Timeout");
                break;
            }

            // Naechsten Ping-Zeitpunkt berechnen
            let ping_verzoegerung = if jetzt < naechster_ping {
                naechster_ping.duration_since(jetzt)
            } else {
                Duration::from_millis(1)
            };

            tokio::select! {
                // Eingehendes Envelope vom Client
                frame = framed.next() => {
                    match frame {
                        Some(Ok(envelope)) => {
                            letzter_empfang = Instant::now();

                            match dispatcher.verarbeiten(endpoint_id, envelope) {
                                Ok(Some(antwort)) => {
                                    if let Err(e) = framed.send(antwort).await {
                                        tracing::warn!(
                                            peer = %peer_addr,
                                            fehler = %e,
                                            "Senden fehlgeschlagen"
                                        );
                                        break;
                                    }
                                }
                                Ok(None) => {}
                                Err(e) => {
                                    // Protokollverstoesse trennen die Verbindung
                                    // nicht; das Envelope wird ignoriert
                                    tracing::warn!(
                                        peer = %peer_addr,
                                        endpoint_id = %endpoint_id,
                                        fehler = %e,
                                        "Envelope ignoriert"
                                    );
                                }
                            }
                        }
                        Some(Err(e)) => {
                            tracing::warn!(
                                peer = %peer_addr,
                                fehler = %e,
                                "Frame-Lesefehler"
                            );
                            break;
                        }
                        None => {
                            // Verbindung geschlossen
                            tracing::info!(peer = %peer_addr, "Verbindung vom Client getrennt");
                            break;
                        }
                    }
                }

                // Ausgehendes Envelope aus der Send-Queue
                Some(ausgehend) = sende_rx.recv() => {
                    if let Err(e) = framed.send(ausgehend).await {
                        tracing::warn!(
                            peer = %peer_addr,
                            fehler = %e,
                            "Zustellung fehlgeschlagen"
                        );
                        break;
                    }
                }

                // Keepalive-Ping
                _ = tokio::time::sleep(ping_verzoegerung) => {
                    if jetzt >= naechster_ping {
                        let ts = std::time::SystemTime::now()
                            .duration_since(std::time::UNIX_EPOCH)
                            .unwrap_or_default()
                            .as_millis() as u64;

                        if let Err(e) = framed.send(Envelope::ping(ts)).await {
                            tracing::warn!(
                                peer = %peer_addr,
                                fehler = %e,
                                "Ping-Senden fehlgeschlagen"
                            );
                            break;
                        }
                        naechster_ping = Instant::now() + keepalive_intervall;
                    }
                }

                // Shutdown-Signal
                Ok(()) = shutdown_rx.changed() => {
                    if *shutdown_rx.borrow() {
                        tracing::info!(peer = %peer_addr, "Shutdown-Signal – Verbindung wird getrennt");
                        break;
                    }
                }
            }
        }

        // Abmeldung beim Verbindungsende verteilt den Presence-Broadcast
        self.state.endpunkt_abmelden(&endpoint_id);

        tracing::info!(peer = %peer_addr, endpoint_id = %endpoint_id, "Verbindungs-Task beendet");
    }
}
