//! Medienaufnahme – Schnittstelle zum lokalen Aufnahmegeraet
//!
//! Kamera und Mikrofon sind fuer den Controller eine Black Box hinter
//! dem `MediaSource`-Trait. Ein geoeffnetes Geraet liefert ein
//! `LocalMedia`-Handle; das Stoppen ist idempotent und wirkt auf alle
//! Kopien des Handles.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Tracks
// ---------------------------------------------------------------------------

/// Art eines Medien-Tracks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackArt {
    Audio,
    Video,
}

/// Einzelner Track der lokalen Aufnahme
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaTrack {
    pub id: String,
    pub art: TrackArt,
}

// ---------------------------------------------------------------------------
// Fehler
// ---------------------------------------------------------------------------

/// Fehler der Medienaufnahme
#[derive(Debug, Error)]
pub enum MediaError {
    /// Benutzer oder System verweigert den Geraetezugriff
    #[error("Zugriff auf das Aufnahmegeraet verweigert")]
    Verweigert,

    /// Kein passendes Geraet vorhanden
    #[error("Kein Aufnahmegeraet verfuegbar")]
    KeinGeraet,

    /// Sonstiger Geraetefehler
    #[error("Medienfehler: {0}")]
    Intern(String),
}

// ---------------------------------------------------------------------------
// LocalMedia
// ---------------------------------------------------------------------------

/// Handle auf eine laufende lokale Medienaufnahme
///
/// Clone teilt das Handle; `stoppen` wirkt auf alle Kopien.
#[derive(Debug, Clone)]
pub struct LocalMedia {
    stream_id: String,
    tracks: Vec<MediaTrack>,
    gestoppt: Arc<AtomicBool>,
}

impl LocalMedia {
    /// Erstellt ein neues Handle auf eine laufende Aufnahme
    pub fn neu(stream_id: impl Into<String>, tracks: Vec<MediaTrack>) -> Self {
        Self {
            stream_id: stream_id.into(),
            tracks,
            gestoppt: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Gibt die Stream-ID der Aufnahme zurueck
    pub fn stream_id(&self) -> &str {
        &self.stream_id
    }

    /// Gibt die Tracks der Aufnahme zurueck
    pub fn tracks(&self) -> &[MediaTrack] {
        &self.tracks
    }

    /// Stoppt alle Tracks (idempotent)
    pub fn stoppen(&self) {
        if !self.gestoppt.swap(true, Ordering::SeqCst) {
            tracing::debug!(stream_id = %self.stream_id, "Lokale Medien gestoppt");
        }
    }

    /// Prueft ob die Aufnahme gestoppt wurde
    pub fn ist_gestoppt(&self) -> bool {
        self.gestoppt.load(Ordering::SeqCst)
    }
}

// ---------------------------------------------------------------------------
// MediaSource
// ---------------------------------------------------------------------------

/// Schnittstelle zum Aufnahmegeraet
pub trait MediaSource: Send + Sync {
    /// Oeffnet Kamera und Mikrofon
    ///
    /// Fehler (Geraet verweigert oder nicht vorhanden) werden dem
    /// Aufrufer synchron gemeldet; ein Anrufversuch kommt dann nicht
    /// zustande.
    fn oeffnen(&self) -> Result<LocalMedia, MediaError>;
}

// ---------------------------------------------------------------------------
// VideoSink
// ---------------------------------------------------------------------------

/// Video-Senke – haelt die Stream-ID die eine Anzeigeflaeche rendert
///
/// Clone teilt die Senke; die UI liest `aktuell`, der Controller setzt
/// und leert.
#[derive(Debug, Clone, Default)]
pub struct VideoSink {
    inner: Arc<Mutex<Option<String>>>,
}

impl VideoSink {
    /// Erstellt eine leere Senke
    pub fn neu() -> Self {
        Self::default()
    }

    /// Setzt die anzuzeigende Stream-ID
    pub fn setzen(&self, stream_id: impl Into<String>) {
        *self.inner.lock() = Some(stream_id.into());
    }

    /// Leert die Senke
    pub fn leeren(&self) {
        *self.inner.lock() = None;
    }

    /// Gibt die aktuell angezeigte Stream-ID zurueck
    pub fn aktuell(&self) -> Option<String> {
        self.inner.lock().clone()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
