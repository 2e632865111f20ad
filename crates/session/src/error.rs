//! Fehlertypen fuer die Client-Seite

use thiserror::Error;

use crate::engine::EngineError;
use crate::media::MediaError;

/// Fehlertyp fuer die Client-Seite
#[derive(Debug, Error)]
pub enum SessionError {
    /// IO-Fehler (TCP, Socket)
    #[error("IO-Fehler: {0}")]
    Io(#[from] std::io::Error),

    /// Protokollfehler (unerwartete Nachricht vom Relay)
    #[error("Protokollfehler: {0}")]
    Protokoll(String),

    /// Es laeuft bereits ein Anruf oder einer wartet auf Entscheidung
    #[error("Bereits in einem Gespraech")]
    Besetzt,

    /// Annahme/Ablehnung ohne wartenden eingehenden Anruf
    #[error("Kein eingehender Anruf vorhanden")]
    KeinEingehenderAnruf,

    /// Aufnahmegeraet verweigert oder nicht verfuegbar
    #[error("Medienfehler: {0}")]
    Medien(#[from] MediaError),

    /// Verhandlungs-Engine hat den Anrufaufbau abgebrochen
    #[error("Engine-Fehler: {0}")]
    Engine(#[from] EngineError),

    /// Ausgehende Signal-Queue voll oder geschlossen
    #[error("Signal konnte nicht eingereiht werden")]
    SendeFehler,
}

/// Result-Typ fuer die Client-Seite
pub type SessionResult<T> = Result<T, SessionError>;
