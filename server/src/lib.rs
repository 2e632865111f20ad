//! parley-server – Bibliotheks-Root
//!
//! Deklariert die Server-Module und verdrahtet Relay-Zustand,
//! TCP-Listener und Shutdown-Signal.

pub mod config;

use anyhow::Result;
use config::ServerConfig;
use parley_relay::{RelayServer, RelayState};
use std::net::SocketAddr;

/// Haelt den laufenden Server-Zustand zusammen
pub struct Server {
    pub config: ServerConfig,
}

impl Server {
    /// Erstellt einen neuen Server aus der gegebenen Konfiguration
    pub fn neu(config: ServerConfig) -> Self {
        Self { config }
    }

    /// Startet das Relay und laeuft bis zum Shutdown-Signal
    pub async fn starten(self) -> Result<()> {
        let bind_adresse: SocketAddr = self.config.tcp_bind_adresse().parse().map_err(|e| {
            anyhow::anyhow!(
                "Ungueltige Bind-Adresse '{}': {}",
                self.config.tcp_bind_adresse(),
                e
            )
        })?;

        tracing::info!(
            server_name = %self.config.server.name,
            adresse = %bind_adresse,
            max_endpunkte = self.config.server.max_endpunkte,
            "Server startet"
        );

        let state = RelayState::neu(self.config.relay_config());
        let relay = RelayServer::binden(state, bind_adresse).await?;
        tracing::info!(adresse = %relay.lokale_adresse()?, "Relay bereit");

        let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
        let relay_task = tokio::spawn(async move { relay.starten(shutdown_rx).await });

        tracing::info!("Server laeuft. Warte auf Shutdown-Signal (Ctrl-C)...");
        tokio::signal::ctrl_c().await?;
        tracing::info!("Shutdown-Signal empfangen, Server wird beendet");

        let _ = shutdown_tx.send(true);
        relay_task.await??;

        Ok(())
    }
}
