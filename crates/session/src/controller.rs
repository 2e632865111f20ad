//! Anruf-Controller – Client-seitige Zustandsmaschine
//!
//! Der Controller besitzt hoechstens eine aktive Gespraechssitzung und
//! dazu den Engine- und den Medien-Handle dieser Sitzung. Jede
//! Zustandsaenderung laeuft ueber eine explizite Operation (Bedienung
//! durch die UI, zugestelltes Signal vom Relay oder Ereignis des
//! Engines).
//!
//! ## Zustandsmaschine
//! ```text
//!          anrufen                    Answer             Transport verbunden
//! Frei ------------- > Rufend ------------------ > Verbindend -------------- > Verbunden
//!  |                      |                             |                         |
//!  |  CallRequest         |  CallRejected               |      Auflegen / Hangup  |
//!  + ------ > Klingelnd   + ------------- > Frei < ---- + --------- < ----------- +
//!                |  annehmen -> Verbindend
//!                +  ablehnen -> Frei
//! ```
//!
//! Eingehende Signale werden implizit ueber den aktuellen
//! Gespraechspartner zugeordnet: ein Envelope von einem fremden Endpunkt
//! wird ignoriert. Ein Anrufwunsch im besetzten Zustand wird mit einem
//! Besetztzeichen (`CallRejected`) beantwortet statt den wartenden
//! Anruf zu ueberschreiben.

use parking_lot::Mutex;
use parley_core::types::EndpointId;
use parley_protocol::envelope::{EnvelopePayload, IceCandidate, SessionDescription};
use std::sync::{Arc, Weak};
use tokio::sync::mpsc;

use crate::engine::{
    EngineEreignis, EngineError, EngineFabrik, NegotiationEngine, TransportZustand,
};
use crate::error::{SessionError, SessionResult};
use crate::media::{LocalMedia, MediaSource, VideoSink};

// ---------------------------------------------------------------------------
// Zustandstypen
// ---------------------------------------------------------------------------

/// Lebenszyklus-Phase eines Anrufs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnrufPhase {
    /// Kein Anruf aktiv
    Frei,
    /// Offer gesendet, warte auf Answer
    Rufend,
    /// Eingehender Anruf wartet auf Entscheidung
    Klingelnd,
    /// Answer ausgetauscht, Transportaufbau laeuft
    Verbindend,
    /// Medienverbindung steht
    Verbunden,
}

/// Rolle innerhalb eines Anrufs
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnrufRolle {
    Anrufer,
    Angerufener,
}

/// Eingehender, noch unbeantworteter Anruf
#[derive(Debug, Clone)]
pub struct EingehenderAnruf {
    pub von: EndpointId,
    pub offer: SessionDescription,
}

/// Ausgehendes, adressiertes Signal Richtung Relay
#[derive(Debug, Clone)]
pub struct AusgehendesSignal {
    pub an: EndpointId,
    pub payload: EnvelopePayload,
}

/// Aktive Gespraechssitzung
///
/// Invariante: Engine und Medien gehoeren zur Sitzung und werden immer
/// gemeinsam mit ihr freigegeben, nie einzeln.
struct AktiveSitzung {
    peer: EndpointId,
    rolle: AnrufRolle,
    engine: Arc<dyn NegotiationEngine>,
    medien: LocalMedia,
}

struct ControllerInner {
    phase: AnrufPhase,
    sitzung: Option<AktiveSitzung>,
    /// Vor dem ersten Anruf gestartete Medien
    vorab_medien: Option<LocalMedia>,
    eingehend: Option<EingehenderAnruf>,
    status: Option<String>,
}

// ---------------------------------------------------------------------------
// CallController
// ---------------------------------------------------------------------------

/// Client-seitiger Anruf-Controller
pub struct CallController {
    eigene_id: EndpointId,
    engine_fabrik: Arc<dyn EngineFabrik>,
    medien_quelle: Arc<dyn MediaSource>,
    ausgang: mpsc::Sender<AusgehendesSignal>,
    lokale_senke: VideoSink,
    remote_senke: VideoSink,
    inner: Mutex<ControllerInner>,
    /// Eigene Referenz fuer die Ereignis-Pumpe eines Engines
    selbst: Weak<CallController>,
}

impl CallController {
    /// Erstellt einen neuen Controller
    pub fn neu(
        eigene_id: EndpointId,
        engine_fabrik: Arc<dyn EngineFabrik>,
        medien_quelle: Arc<dyn MediaSource>,
        ausgang: mpsc::Sender<AusgehendesSignal>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|selbst| Self {
            eigene_id,
            engine_fabrik,
            medien_quelle,
            ausgang,
            lokale_senke: VideoSink::neu(),
            remote_senke: VideoSink::neu(),
            inner: Mutex::new(ControllerInner {
                phase: AnrufPhase::Frei,
                sitzung: None,
                vorab_medien: None,
                eingehend: None,
                status: None,
            }),
            selbst: selbst.clone(),
        })
    }

    // -----------------------------------------------------------------------
    // Beobachtbarer Zustand
    // -----------------------------------------------------------------------

    /// Gibt die eigene Endpunkt-ID zurueck
    pub fn eigene_id(&self) -> EndpointId {
        self.eigene_id
    }

    /// Aktuelle Lebenszyklus-Phase
    pub fn phase(&self) -> AnrufPhase {
        self.inner.lock().phase
    }

    /// Aktueller Gespraechspartner (Sitzung oder klingelnder Anrufer)
    pub fn aktueller_peer(&self) -> Option<EndpointId> {
        let inner = self.inner.lock();
        inner
            .sitzung
            .as_ref()
            .map(|s| s.peer)
            .or_else(|| inner.eingehend.as_ref().map(|e| e.von))
    }

    /// Eigene Rolle im laufenden Gespraech
    pub fn rolle(&self) -> Option<AnrufRolle> {
        self.inner.lock().sitzung.as_ref().map(|s| s.rolle)
    }

    /// Wartender eingehender Anruf
    pub fn eingehender_anruf(&self) -> Option<EingehenderAnruf> {
        self.inner.lock().eingehend.clone()
    }

    /// Letzte Statusmeldung
    pub fn status(&self) -> Option<String> {
        self.inner.lock().status.clone()
    }

    /// Senke fuer das eigene Videobild
    pub fn lokale_senke(&self) -> VideoSink {
        self.lokale_senke.clone()
    }

    /// Senke fuer das Videobild der Gegenseite
    pub fn remote_senke(&self) -> VideoSink {
        self.remote_senke.clone()
    }

    // -----------------------------------------------------------------------
    // Bedienoperationen
    // -----------------------------------------------------------------------

    /// Startet Kamera und Mikrofon, falls noch nicht aktiv
    pub fn lokale_medien_starten(&self) -> SessionResult<()> {
        {
            let inner = self.inner.lock();
            if inner.vorab_medien.is_some() || inner.sitzung.is_some() {
                return Ok(());
            }
        }

        let medien = self.medien_quelle.oeffnen()?;
        self.lokale_senke.setzen(medien.stream_id());
        self.inner.lock().vorab_medien = Some(medien);
        Ok(())
    }

    /// Ruft einen anderen Endpunkt an
    ///
    /// Startet die Medien falls noetig, erstellt einen frischen Engine,
    /// erzeugt das Offer und reiht den Anrufwunsch zum Versand ein.
    /// Waehrend eines laufenden oder klingelnden Gespraechs ist ein
    /// weiterer Anrufversuch besetzt.
    pub async fn anrufen(&self, peer: EndpointId) -> SessionResult<()> {
        {
            let inner = self.inner.lock();
            if inner.phase != AnrufPhase::Frei
                || inner.sitzung.is_some()
                || inner.eingehend.is_some()
            {
                return Err(SessionError::Besetzt);
            }
        }

        // Medien zuerst: schlaegt die Aufnahme fehl, bleibt alles unveraendert
        let medien = self.medien_beschaffen()?;
        let engine = self.engine_fabrik.engine_erstellen()?;

        {
            let mut inner = self.inner.lock();
            if inner.phase != AnrufPhase::Frei || inner.sitzung.is_some() {
                return Err(SessionError::Besetzt);
            }
            inner.vorab_medien = None;
            inner.phase = AnrufPhase::Rufend;
            inner.status = None;
            inner.sitzung = Some(AktiveSitzung {
                peer,
                rolle: AnrufRolle::Anrufer,
                engine: Arc::clone(&engine),
                medien: medien.clone(),
            });
        }
        tracing::info!(peer = %peer, "Anruf wird aufgebaut");

        self.ereignis_pumpe_starten(&engine, peer);

        let offer = match self.offer_vorbereiten(&engine, &medien).await {
            Ok(offer) => offer,
            Err(e) => {
                tracing::warn!(peer = %peer, fehler = %e, "Anrufaufbau fehlgeschlagen");
                self.abbauen("Anrufaufbau fehlgeschlagen").await;
                return Err(e.into());
            }
        };

        if let Err(e) = self.signal_senden(peer, EnvelopePayload::CallRequest { offer }) {
            self.abbauen("Anrufaufbau fehlgeschlagen").await;
            return Err(e);
        }
        Ok(())
    }

    /// Nimmt den wartenden eingehenden Anruf an
    pub async fn anruf_annehmen(&self) -> SessionResult<()> {
        // Den wartenden Anruf erst nach erfolgreicher Medienaufnahme
        // verbrauchen, damit er bei einem Geraetefehler erhalten bleibt
        let (von, offer) = {
            let inner = self.inner.lock();
            match &inner.eingehend {
                Some(e) => (e.von, e.offer.clone()),
                None => return Err(SessionError::KeinEingehenderAnruf),
            }
        };

        let medien = self.medien_beschaffen()?;
        let engine = self.engine_fabrik.engine_erstellen()?;

        {
            let mut inner = self.inner.lock();
            if inner.eingehend.as_ref().map(|e| e.von) != Some(von) {
                return Err(SessionError::KeinEingehenderAnruf);
            }
            inner.eingehend = None;
            inner.vorab_medien = None;
            inner.phase = AnrufPhase::Verbindend;
            inner.status = None;
            inner.sitzung = Some(AktiveSitzung {
                peer: von,
                rolle: AnrufRolle::Angerufener,
                engine: Arc::clone(&engine),
                medien: medien.clone(),
            });
        }
        tracing::info!(peer = %von, "Eingehender Anruf angenommen");

        self.ereignis_pumpe_starten(&engine, von);

        let answer = match self.answer_vorbereiten(&engine, &medien, offer).await {
            Ok(answer) => answer,
            Err(e) => {
                tracing::warn!(peer = %von, fehler = %e, "Annahme fehlgeschlagen");
                self.abbauen("Annahme fehlgeschlagen").await;
                return Err(e.into());
            }
        };

        if let Err(e) = self.signal_senden(von, EnvelopePayload::Answer { description: answer }) {
            self.abbauen("Annahme fehlgeschlagen").await;
            return Err(e);
        }
        Ok(())
    }

    /// Lehnt den wartenden eingehenden Anruf ab
    pub fn anruf_ablehnen(&self) -> SessionResult<()> {
        let von = {
            let mut inner = self.inner.lock();
            let eingehend = inner
                .eingehend
                .take()
                .ok_or(SessionError::KeinEingehenderAnruf)?;
            if inner.sitzung.is_none() {
                inner.phase = AnrufPhase::Frei;
            }
            eingehend.von
        };
        tracing::info!(peer = %von, "Eingehender Anruf abgelehnt");
        self.signal_senden(von, EnvelopePayload::CallRejected)
    }

    /// Beendet das laufende Gespraech (idempotent)
    ///
    /// Informiert den Gespraechspartner und baut alle Ressourcen ab.
    /// Mehrfaches Auflegen ist erlaubt.
    pub async fn auflegen(&self) -> SessionResult<()> {
        let peer = {
            let inner = self.inner.lock();
            inner
                .sitzung
                .as_ref()
                .map(|s| s.peer)
                .or_else(|| inner.eingehend.as_ref().map(|e| e.von))
        };

        if let Some(peer) = peer {
            tracing::info!(peer = %peer, "Gespraech wird beendet");
            // Best-effort: auch ohne Zustellung wird lokal abgebaut
            let _ = self.signal_senden(peer, EnvelopePayload::Hangup);
        }

        self.abbauen("Gespraech beendet").await;
        Ok(())
    }

    /// Baut alle Ressourcen ab, weil die Relay-Verbindung weg ist
    pub async fn relay_getrennt(&self) {
        self.abbauen("Verbindung zum Relay verloren").await;
    }

    // -----------------------------------------------------------------------
    // Zugestellte Signale vom Relay
    // -----------------------------------------------------------------------

    /// Verarbeitet ein zugestelltes Signalisierungs-Envelope
    ///
    /// `von` ist die vom Relay gesetzte Absender-ID. Signale die nicht
    /// zum aktuellen Gespraechspartner passen, werden ignoriert.
    pub async fn signal_verarbeiten(&self, von: EndpointId, payload: EnvelopePayload) {
        match payload {
            EnvelopePayload::CallRequest { offer } => self.anrufwunsch_verarbeiten(von, offer),
            EnvelopePayload::Answer { description } => {
                self.answer_verarbeiten(von, description).await
            }
            EnvelopePayload::Offer { description } => {
                self.nachverhandlung_verarbeiten(von, description).await
            }
            EnvelopePayload::Candidate { candidate } => {
                self.kandidat_verarbeiten(von, candidate).await
            }
            EnvelopePayload::CallRejected => self.ablehnung_verarbeiten(von).await,
            EnvelopePayload::Hangup => self.hangup_verarbeiten(von).await,
            andere => {
                tracing::debug!(von = %von, payload = ?andere, "Envelope im Controller ignoriert");
            }
        }
    }

    fn anrufwunsch_verarbeiten(&self, von: EndpointId, offer: SessionDescription) {
        let besetzt = {
            let mut inner = self.inner.lock();
            if inner.phase != AnrufPhase::Frei
                || inner.sitzung.is_some()
                || inner.eingehend.is_some()
            {
                true
            } else {
                inner.eingehend = Some(EingehenderAnruf { von, offer });
                inner.phase = AnrufPhase::Klingelnd;
                inner.status = None;
                false
            }
        };

        if besetzt {
            // Besetztzeichen statt stillem Ueberschreiben des wartenden Anrufs
            tracing::debug!(von = %von, "Anrufwunsch im besetzten Zustand – abgelehnt");
            let _ = self.signal_senden(von, EnvelopePayload::CallRejected);
        } else {
            tracing::info!(von = %von, "Eingehender Anruf");
        }
    }

    async fn answer_verarbeiten(&self, von: EndpointId, description: SessionDescription) {
        let engine = {
            let mut inner = self.inner.lock();
            match &inner.sitzung {
                Some(s) if s.peer == von && inner.phase == AnrufPhase::Rufend => {
                    inner.phase = AnrufPhase::Verbindend;
                    Some(Arc::clone(&s.engine))
                }
                _ => None,
            }
        };

        let Some(engine) = engine else {
            tracing::debug!(von = %von, "Answer ohne passendes Gespraech ignoriert");
            return;
        };

        if let Err(e) = engine.remote_beschreibung_setzen(description).await {
            tracing::warn!(von = %von, fehler = %e, "Answer nicht anwendbar");
            self.abbauen("Verhandlung fehlgeschlagen").await;
        }
    }

    async fn nachverhandlung_verarbeiten(&self, von: EndpointId, description: SessionDescription) {
        let engine = {
            let inner = self.inner.lock();
            match &inner.sitzung {
                Some(s) if s.peer == von => Some(Arc::clone(&s.engine)),
                _ => None,
            }
        };

        let Some(engine) = engine else {
            tracing::debug!(von = %von, "Offer ohne passendes Gespraech ignoriert");
            return;
        };

        // Laufendes Gespraech nicht wegen einer gescheiterten
        // Nachverhandlung beenden
        let ergebnis = async {
            engine.remote_beschreibung_setzen(description).await?;
            let answer = engine.answer_erstellen().await?;
            engine.lokale_beschreibung_setzen(answer.clone()).await?;
            Ok::<_, EngineError>(answer)
        }
        .await;

        match ergebnis {
            Ok(answer) => {
                let _ = self.signal_senden(von, EnvelopePayload::Answer { description: answer });
            }
            Err(e) => {
                tracing::warn!(von = %von, fehler = %e, "Nachverhandlung fehlgeschlagen");
            }
        }
    }

    async fn kandidat_verarbeiten(&self, von: EndpointId, kandidat: IceCandidate) {
        let engine = {
            let inner = self.inner.lock();
            match &inner.sitzung {
                Some(s) if s.peer == von => Some(Arc::clone(&s.engine)),
                _ => None,
            }
        };

        let Some(engine) = engine else {
            tracing::debug!(von = %von, "Kandidat ohne Gespraech verworfen");
            return;
        };

        // Veraltete oder doppelte Kandidaten nach einem Abbau sind
        // erwartbar und harmlos
        if let Err(e) = engine.kandidat_hinzufuegen(kandidat).await {
            tracing::debug!(von = %von, fehler = %e, "Kandidat nicht anwendbar – ignoriert");
        }
    }

    async fn ablehnung_verarbeiten(&self, von: EndpointId) {
        let passt = {
            let inner = self.inner.lock();
            inner.phase == AnrufPhase::Rufend
                && inner.sitzung.as_ref().map(|s| s.peer) == Some(von)
        };

        if passt {
            tracing::info!(von = %von, "Anruf wurde abgelehnt");
            self.abbauen("Anruf abgelehnt").await;
        } else {
            tracing::debug!(von = %von, "Ablehnung ohne passenden Anrufversuch ignoriert");
        }
    }

    async fn hangup_verarbeiten(&self, von: EndpointId) {
        let passt = {
            let inner = self.inner.lock();
            inner.sitzung.as_ref().map(|s| s.peer) == Some(von)
                || inner.eingehend.as_ref().map(|e| e.von) == Some(von)
        };

        if passt {
            tracing::info!(von = %von, "Gespraech vom Partner beendet");
            self.abbauen("Vom Gespraechspartner beendet").await;
        } else {
            tracing::debug!(von = %von, "Hangup ohne passendes Gespraech ignoriert");
        }
    }

    // -----------------------------------------------------------------------
    // Engine-Ereignisse
    // -----------------------------------------------------------------------

    /// Leitet die Ereignisse eines Engines in den Controller
    ///
    /// Die Pumpe endet, sobald der Engine seinen Ereignis-Sender fallen
    /// laesst; Ereignisse einer abgebauten Sitzung laufen ins Leere, weil
    /// die Peer-Pruefung sie verwirft.
    fn ereignis_pumpe_starten(&self, engine: &Arc<dyn NegotiationEngine>, peer: EndpointId) {
        let Some(controller) = self.selbst.upgrade() else {
            return;
        };
        let mut ereignisse = engine.ereignisse_abonnieren();
        tokio::spawn(async move {
            while let Ok(ereignis) = ereignisse.recv().await {
                controller.engine_ereignis_verarbeiten(peer, ereignis).await;
            }
        });
    }

    /// Verarbeitet ein Ereignis des Verhandlungs-Engines
    pub(crate) async fn engine_ereignis_verarbeiten(
        &self,
        peer: EndpointId,
        ereignis: EngineEreignis,
    ) {
        // Ereignisse eines fremden (abgebauten) Engines verwerfen
        let aktuell = {
            let inner = self.inner.lock();
            inner.sitzung.as_ref().map(|s| s.peer) == Some(peer)
        };
        if !aktuell {
            tracing::debug!(peer = %peer, "Engine-Ereignis ohne Sitzung verworfen");
            return;
        }

        match ereignis {
            EngineEreignis::Transport(zustand) => {
                self.transportzustand_verarbeiten(peer, zustand).await;
            }
            EngineEreignis::LokalerKandidat(kandidat) => {
                let _ = self.signal_senden(peer, EnvelopePayload::Candidate { candidate: kandidat });
            }
            EngineEreignis::RemoteMedien(stream) => {
                tracing::debug!(peer = %peer, stream_id = %stream.id, "Medienstrom der Gegenseite");
                self.remote_senke.setzen(stream.id);
            }
        }
    }

    async fn transportzustand_verarbeiten(&self, peer: EndpointId, zustand: TransportZustand) {
        match zustand {
            TransportZustand::Verbunden => {
                let mut inner = self.inner.lock();
                if inner.sitzung.as_ref().map(|s| s.peer) == Some(peer) {
                    tracing::info!(peer = %peer, "Medienverbindung steht");
                    inner.phase = AnrufPhase::Verbunden;
                    inner.status = None;
                }
            }
            TransportZustand::Getrennt
            | TransportZustand::Fehlgeschlagen
            | TransportZustand::Geschlossen => {
                tracing::info!(peer = %peer, zustand = ?zustand, "Transport beendet");
                self.abbauen("Verbindung beendet").await;
            }
            TransportZustand::Neu | TransportZustand::Verbindend => {}
        }
    }

    // -----------------------------------------------------------------------
    // Interne Hilfsmethoden
    // -----------------------------------------------------------------------

    /// Nutzt die vorab gestarteten Medien oder oeffnet das Geraet
    fn medien_beschaffen(&self) -> SessionResult<LocalMedia> {
        let vorhanden = self.inner.lock().vorab_medien.clone();
        match vorhanden {
            Some(medien) => Ok(medien),
            None => {
                let medien = self.medien_quelle.oeffnen()?;
                self.lokale_senke.setzen(medien.stream_id());
                Ok(medien)
            }
        }
    }

    async fn offer_vorbereiten(
        &self,
        engine: &Arc<dyn NegotiationEngine>,
        medien: &LocalMedia,
    ) -> Result<SessionDescription, EngineError> {
        for track in medien.tracks() {
            engine.lokalen_track_hinzufuegen(track.clone()).await?;
        }
        let offer = engine.offer_erstellen().await?;
        engine.lokale_beschreibung_setzen(offer.clone()).await?;
        Ok(offer)
    }

    async fn answer_vorbereiten(
        &self,
        engine: &Arc<dyn NegotiationEngine>,
        medien: &LocalMedia,
        offer: SessionDescription,
    ) -> Result<SessionDescription, EngineError> {
        for track in medien.tracks() {
            engine.lokalen_track_hinzufuegen(track.clone()).await?;
        }
        engine.remote_beschreibung_setzen(offer).await?;
        let answer = engine.answer_erstellen().await?;
        engine.lokale_beschreibung_setzen(answer.clone()).await?;
        Ok(answer)
    }

    /// Reiht ein adressiertes Signal nicht-blockierend zum Versand ein
    fn signal_senden(&self, an: EndpointId, payload: EnvelopePayload) -> SessionResult<()> {
        match self.ausgang.try_send(AusgehendesSignal { an, payload }) {
            Ok(()) => Ok(()),
            Err(mpsc::error::TrySendError::Full(_)) => {
                tracing::warn!(an = %an, "Signal-Queue voll – Nachricht verworfen");
                Err(SessionError::SendeFehler)
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                tracing::debug!(an = %an, "Signal-Queue geschlossen");
                Err(SessionError::SendeFehler)
            }
        }
    }

    /// Vollstaendiger Abbau der Gespraechsressourcen (idempotent)
    ///
    /// Stoppt die Medien, schliesst den Engine, leert beide Video-Senken,
    /// verwirft einen wartenden eingehenden Anruf und setzt die Phase auf
    /// `Frei`. Darf beliebig oft hintereinander aufgerufen werden.
    async fn abbauen(&self, status: &str) {
        let (sitzung, vorab) = {
            let mut inner = self.inner.lock();
            inner.phase = AnrufPhase::Frei;
            inner.eingehend = None;
            inner.status = Some(status.to_string());
            (inner.sitzung.take(), inner.vorab_medien.take())
        };

        if let Some(medien) = vorab {
            medien.stoppen();
        }

        if let Some(sitzung) = sitzung {
            // Engine und Medien gehoeren zusammen: nie eines ohne das andere
            sitzung.medien.stoppen();
            sitzung.engine.schliessen().await;
        }

        self.lokale_senke.leeren();
        self.remote_senke.leeren();
    }
}
