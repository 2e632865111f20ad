//! Verhandlungs-Engine – Schnittstelle zum externen Transportaufbau
//!
//! Der Engine ist fuer den Controller eine Black Box: er erzeugt und
//! verbraucht Offer, Answer und Kandidaten, meldet seinen
//! Transportzustand und den eintreffenden Medienstrom der Gegenseite.
//! Die Zustandsmaschine haengt nur von diesem Vertrag ab und ist damit
//! gegen einen geskripteten Engine testbar.

use async_trait::async_trait;
use parley_protocol::envelope::{IceCandidate, SessionDescription};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::media::MediaTrack;

// ---------------------------------------------------------------------------
// Ereignisse
// ---------------------------------------------------------------------------

/// Transportzustand des Engines
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportZustand {
    /// Frisch erstellt, noch keine Verhandlung
    Neu,
    /// Handshake und Kandidatenpruefung laufen
    Verbindend,
    /// Direkter Medientransport steht
    Verbunden,
    /// Gegenseite nicht mehr erreichbar
    Getrennt,
    /// Transportaufbau endgueltig gescheitert
    Fehlgeschlagen,
    /// Engine wurde geschlossen
    Geschlossen,
}

/// Eingetroffener Medienstrom der Gegenseite
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteStream {
    pub id: String,
}

/// Ereignisse die der Engine asynchron meldet
#[derive(Debug, Clone)]
pub enum EngineEreignis {
    /// Transportzustand hat sich geaendert
    Transport(TransportZustand),
    /// Lokal gesammelter Kandidat, zur Weiterleitung an die Gegenseite
    LokalerKandidat(IceCandidate),
    /// Medienstrom der Gegenseite ist eingetroffen
    RemoteMedien(RemoteStream),
}

// ---------------------------------------------------------------------------
// Fehler
// ---------------------------------------------------------------------------

/// Fehler des Verhandlungs-Engines
#[derive(Debug, Error)]
pub enum EngineError {
    /// Beschreibung unpassend oder ausser der Reihe
    #[error("Beschreibung nicht anwendbar: {0}")]
    Beschreibung(String),

    /// Kandidat nicht anwendbar (nach Abbau erwartbar und harmlos)
    #[error("Kandidat nicht anwendbar: {0}")]
    Kandidat(String),

    /// Engine wurde bereits geschlossen
    #[error("Engine ist geschlossen")]
    Geschlossen,

    /// Interner Engine-Fehler
    #[error("Interner Engine-Fehler: {0}")]
    Intern(String),
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// Schnittstelle zum externen Verhandlungs-Engine
///
/// Eine Instanz gehoert zu genau einem Anrufversuch und wird beim Abbau
/// der Sitzung geschlossen.
#[async_trait]
pub trait NegotiationEngine: Send + Sync {
    /// Erzeugt das initiale Offer
    async fn offer_erstellen(&self) -> Result<SessionDescription, EngineError>;

    /// Erzeugt das Answer auf das zuvor gesetzte Remote-Offer
    async fn answer_erstellen(&self) -> Result<SessionDescription, EngineError>;

    /// Setzt die lokale Beschreibung
    async fn lokale_beschreibung_setzen(
        &self,
        beschreibung: SessionDescription,
    ) -> Result<(), EngineError>;

    /// Setzt die Beschreibung der Gegenseite
    async fn remote_beschreibung_setzen(
        &self,
        beschreibung: SessionDescription,
    ) -> Result<(), EngineError>;

    /// Fuegt einen Kandidaten der Gegenseite hinzu
    async fn kandidat_hinzufuegen(&self, kandidat: IceCandidate) -> Result<(), EngineError>;

    /// Fuegt einen lokalen Medien-Track hinzu
    async fn lokalen_track_hinzufuegen(&self, track: MediaTrack) -> Result<(), EngineError>;

    /// Abonniert die Ereignisse des Engines
    fn ereignisse_abonnieren(&self) -> broadcast::Receiver<EngineEreignis>;

    /// Schliesst den Engine und gibt alle Transportressourcen frei
    /// (idempotent)
    async fn schliessen(&self);
}

/// Stellt pro Anruf einen frischen Engine bereit
pub trait EngineFabrik: Send + Sync {
    /// Erstellt einen neuen Engine fuer genau einen Anruf
    fn engine_erstellen(&self) -> Result<Arc<dyn NegotiationEngine>, EngineError>;
}
