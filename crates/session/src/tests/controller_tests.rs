//! Tests der Anruf-Zustandsmaschine gegen geskriptete Mitspieler

use parley_core::types::EndpointId;
use parley_protocol::envelope::{EnvelopePayload, SessionDescription};
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::controller::{AnrufPhase, AnrufRolle, AusgehendesSignal, CallController};
use crate::engine::{EngineEreignis, TransportZustand};
use crate::error::SessionError;
use crate::tests::fakes::{test_kandidat, FakeEngineFabrik, FakeMediaSource};

fn test_umgebung() -> (
    Arc<CallController>,
    mpsc::Receiver<AusgehendesSignal>,
    Arc<FakeEngineFabrik>,
    Arc<FakeMediaSource>,
) {
    let fabrik = FakeEngineFabrik::neu();
    let quelle = FakeMediaSource::neu();
    let (tx, rx) = mpsc::channel(64);
    let controller = CallController::neu(
        EndpointId::new(),
        Arc::clone(&fabrik),
        Arc::clone(&quelle),
        tx,
    );
    (controller, rx, fabrik, quelle)
}

fn test_offer() -> SessionDescription {
    SessionDescription::offer("v=0\r\nremote-offer")
}

// ---------------------------------------------------------------------------
// Abgehender Anruf
// ---------------------------------------------------------------------------

#[tokio::test]
async fn anruf_erzeugt_offer_und_anrufwunsch() {
    let (controller, mut rx, fabrik, quelle) = test_umgebung();
    let peer = EndpointId::new();

    controller.anrufen(peer).await.unwrap();

    assert_eq!(controller.phase(), AnrufPhase::Rufend);
    assert_eq!(controller.aktueller_peer(), Some(peer));
    assert_eq!(controller.rolle(), Some(AnrufRolle::Anrufer));

    // Medien laufen, Senke zeigt das eigene Bild
    assert_eq!(quelle.anzahl_oeffnungen(), 1);
    assert!(controller.lokale_senke().aktuell().is_some());

    // Engine hat Tracks, Offer und lokale Beschreibung gesehen
    let aufrufe = fabrik.letzter().aufrufe();
    assert!(aufrufe.contains(&"lokalen_track_hinzufuegen".to_string()));
    assert!(aufrufe.contains(&"offer_erstellen".to_string()));
    assert!(aufrufe.contains(&"lokale_beschreibung_setzen".to_string()));

    // Anrufwunsch wurde adressiert eingereiht
    let signal = rx.try_recv().expect("Anrufwunsch erwartet");
    assert_eq!(signal.an, peer);
    assert!(matches!(signal.payload, EnvelopePayload::CallRequest { .. }));
}

#[tokio::test]
async fn answer_und_transport_fuehren_zu_verbunden() {
    let (controller, _rx, fabrik, _quelle) = test_umgebung();
    let peer = EndpointId::new();

    controller.anrufen(peer).await.unwrap();
    controller
        .signal_verarbeiten(peer, EnvelopePayload::Answer {
            description: SessionDescription::answer("v=0\r\nremote-answer"),
        })
        .await;

    assert_eq!(controller.phase(), AnrufPhase::Verbindend);
    assert!(fabrik
        .letzter()
        .aufrufe()
        .contains(&"remote_beschreibung_setzen".to_string()));

    controller
        .engine_ereignis_verarbeiten(peer, EngineEreignis::Transport(TransportZustand::Verbunden))
        .await;

    assert_eq!(controller.phase(), AnrufPhase::Verbunden);
    assert_eq!(controller.status(), None);
    assert_eq!(controller.aktueller_peer(), Some(peer));
}

#[tokio::test]
async fn answer_von_fremdem_endpunkt_wird_ignoriert() {
    let (controller, _rx, fabrik, _quelle) = test_umgebung();
    let peer = EndpointId::new();
    let fremder = EndpointId::new();

    controller.anrufen(peer).await.unwrap();
    controller
        .signal_verarbeiten(fremder, EnvelopePayload::Answer {
            description: SessionDescription::answer("v=0\r\nfremd"),
        })
        .await;

    assert_eq!(controller.phase(), AnrufPhase::Rufend);
    assert!(!fabrik
        .letzter()
        .aufrufe()
        .contains(&"remote_beschreibung_setzen".to_string()));
}

#[tokio::test]
async fn zweiter_anrufversuch_ist_besetzt() {
    let (controller, _rx, fabrik, _quelle) = test_umgebung();

    controller.anrufen(EndpointId::new()).await.unwrap();
    let ergebnis = controller.anrufen(EndpointId::new()).await;

    assert!(matches!(ergebnis, Err(SessionError::Besetzt)));
    assert_eq!(fabrik.anzahl(), 1, "Kein zweiter Engine");
}

#[tokio::test]
async fn medienfehler_verhindert_den_anruf() {
    let (controller, mut rx, fabrik, quelle) = test_umgebung();
    quelle.verweigern();

    let ergebnis = controller.anrufen(EndpointId::new()).await;

    assert!(matches!(ergebnis, Err(SessionError::Medien(_))));
    assert_eq!(controller.phase(), AnrufPhase::Frei);
    assert_eq!(fabrik.anzahl(), 0, "Ohne Medien kein Engine");
    assert!(rx.try_recv().is_err(), "Nichts darf gesendet werden");
}

#[tokio::test]
async fn beschreibungsfehler_beendet_den_versuch_vollstaendig() {
    let (controller, _rx, fabrik, quelle) = test_umgebung();
    fabrik.naechsten_fehlschlagen_lassen();

    let ergebnis = controller.anrufen(EndpointId::new()).await;

    assert!(matches!(ergebnis, Err(SessionError::Engine(_))));
    assert_eq!(controller.phase(), AnrufPhase::Frei);
    assert!(fabrik.letzter().ist_geschlossen(), "Engine muss freigegeben sein");
    assert!(quelle.letzte().ist_gestoppt(), "Medien muessen gestoppt sein");
    assert!(controller.lokale_senke().aktuell().is_none());
}

#[tokio::test]
async fn ablehnung_raeumt_die_anruferseite_auf() {
    let (controller, _rx, fabrik, quelle) = test_umgebung();
    let peer = EndpointId::new();

    controller.anrufen(peer).await.unwrap();
    controller
        .signal_verarbeiten(peer, EnvelopePayload::CallRejected)
        .await;

    assert_eq!(controller.phase(), AnrufPhase::Frei);
    assert_eq!(controller.status(), Some("Anruf abgelehnt".to_string()));
    assert!(fabrik.letzter().ist_geschlossen());
    assert!(quelle.letzte().ist_gestoppt());
    assert_eq!(controller.aktueller_peer(), None);
}

#[tokio::test]
async fn ablehnung_von_fremdem_endpunkt_wird_ignoriert() {
    let (controller, _rx, _fabrik, _quelle) = test_umgebung();
    let peer = EndpointId::new();

    controller.anrufen(peer).await.unwrap();
    controller
        .signal_verarbeiten(EndpointId::new(), EnvelopePayload::CallRejected)
        .await;

    assert_eq!(controller.phase(), AnrufPhase::Rufend);
}

// ---------------------------------------------------------------------------
// Eingehender Anruf
// ---------------------------------------------------------------------------

#[tokio::test]
async fn eingehender_anruf_klingelt() {
    let (controller, _rx, fabrik, _quelle) = test_umgebung();
    let von = EndpointId::new();

    controller
        .signal_verarbeiten(von, EnvelopePayload::CallRequest { offer: test_offer() })
        .await;

    assert_eq!(controller.phase(), AnrufPhase::Klingelnd);
    let eingehend = controller.eingehender_anruf().expect("Anruf muss warten");
    assert_eq!(eingehend.von, von);
    assert_eq!(controller.aktueller_peer(), Some(von));
    assert_eq!(fabrik.anzahl(), 0, "Engine erst bei Annahme");
}

#[tokio::test]
async fn annahme_erzeugt_answer() {
    let (controller, mut rx, fabrik, quelle) = test_umgebung();
    let von = EndpointId::new();

    controller
        .signal_verarbeiten(von, EnvelopePayload::CallRequest { offer: test_offer() })
        .await;
    controller.anruf_annehmen().await.unwrap();

    assert_eq!(controller.phase(), AnrufPhase::Verbindend);
    assert_eq!(controller.rolle(), Some(AnrufRolle::Angerufener));
    assert!(controller.eingehender_anruf().is_none());
    assert_eq!(quelle.anzahl_oeffnungen(), 1);

    // Remote-Offer vor dem Answer angewandt
    let aufrufe = fabrik.letzter().aufrufe();
    let remote_pos = aufrufe
        .iter()
        .position(|a| a == "remote_beschreibung_setzen")
        .expect("Remote-Beschreibung muss gesetzt sein");
    let answer_pos = aufrufe
        .iter()
        .position(|a| a == "answer_erstellen")
        .expect("Answer muss erzeugt sein");
    assert!(remote_pos < answer_pos);

    let signal = rx.try_recv().expect("Answer erwartet");
    assert_eq!(signal.an, von);
    assert!(matches!(signal.payload, EnvelopePayload::Answer { .. }));
}

#[tokio::test]
async fn annahme_ohne_wartenden_anruf_ist_fehler() {
    let (controller, _rx, _fabrik, _quelle) = test_umgebung();
    let ergebnis = controller.anruf_annehmen().await;
    assert!(matches!(ergebnis, Err(SessionError::KeinEingehenderAnruf)));
}

#[tokio::test]
async fn medienfehler_bei_annahme_erhaelt_den_wartenden_anruf() {
    let (controller, _rx, _fabrik, quelle) = test_umgebung();
    let von = EndpointId::new();

    controller
        .signal_verarbeiten(von, EnvelopePayload::CallRequest { offer: test_offer() })
        .await;
    quelle.verweigern();

    let ergebnis = controller.anruf_annehmen().await;

    assert!(matches!(ergebnis, Err(SessionError::Medien(_))));
    assert!(
        controller.eingehender_anruf().is_some(),
        "Der wartende Anruf bleibt bestehen"
    );
    assert_eq!(controller.phase(), AnrufPhase::Klingelnd);
}

#[tokio::test]
async fn ablehnung_sendet_besetztzeichen_und_raeumt_auf() {
    let (controller, mut rx, fabrik, _quelle) = test_umgebung();
    let von = EndpointId::new();

    controller
        .signal_verarbeiten(von, EnvelopePayload::CallRequest { offer: test_offer() })
        .await;
    controller.anruf_ablehnen().unwrap();

    assert_eq!(controller.phase(), AnrufPhase::Frei);
    assert!(controller.eingehender_anruf().is_none());
    assert_eq!(fabrik.anzahl(), 0);

    let signal = rx.try_recv().expect("Ablehnung erwartet");
    assert_eq!(signal.an, von);
    assert!(matches!(signal.payload, EnvelopePayload::CallRejected));
}

#[tokio::test]
async fn zweiter_anrufwunsch_wird_abgelehnt_statt_ueberschrieben() {
    let (controller, mut rx, _fabrik, _quelle) = test_umgebung();
    let erster = EndpointId::new();
    let zweiter = EndpointId::new();

    controller
        .signal_verarbeiten(erster, EnvelopePayload::CallRequest { offer: test_offer() })
        .await;
    controller
        .signal_verarbeiten(zweiter, EnvelopePayload::CallRequest { offer: test_offer() })
        .await;

    // Der erste Anruf wartet weiterhin, der zweite bekommt das Besetztzeichen
    let eingehend = controller.eingehender_anruf().expect("Anruf muss warten");
    assert_eq!(eingehend.von, erster);

    let signal = rx.try_recv().expect("Besetztzeichen erwartet");
    assert_eq!(signal.an, zweiter);
    assert!(matches!(signal.payload, EnvelopePayload::CallRejected));
}

#[tokio::test]
async fn anrufwunsch_waehrend_gespraech_wird_abgelehnt() {
    let (controller, mut rx, _fabrik, _quelle) = test_umgebung();
    let peer = EndpointId::new();
    let stoerer = EndpointId::new();

    controller.anrufen(peer).await.unwrap();
    let _ = rx.try_recv(); // Anrufwunsch abraeumen

    controller
        .signal_verarbeiten(stoerer, EnvelopePayload::CallRequest { offer: test_offer() })
        .await;

    assert_eq!(controller.aktueller_peer(), Some(peer));
    let signal = rx.try_recv().expect("Besetztzeichen erwartet");
    assert_eq!(signal.an, stoerer);
    assert!(matches!(signal.payload, EnvelopePayload::CallRejected));
}

// ---------------------------------------------------------------------------
// Kandidaten
// ---------------------------------------------------------------------------

#[tokio::test]
async fn kandidat_des_partners_wird_dem_engine_gereicht() {
    let (controller, _rx, fabrik, _quelle) = test_umgebung();
    let peer = EndpointId::new();

    controller.anrufen(peer).await.unwrap();
    controller
        .signal_verarbeiten(peer, EnvelopePayload::Candidate {
            candidate: test_kandidat(),
        })
        .await;

    assert!(fabrik
        .letzter()
        .aufrufe()
        .contains(&"kandidat_hinzufuegen".to_string()));
}

#[tokio::test]
async fn kandidat_von_fremdem_endpunkt_wird_verworfen() {
    let (controller, _rx, fabrik, _quelle) = test_umgebung();

    controller.anrufen(EndpointId::new()).await.unwrap();
    controller
        .signal_verarbeiten(EndpointId::new(), EnvelopePayload::Candidate {
            candidate: test_kandidat(),
        })
        .await;

    assert!(!fabrik
        .letzter()
        .aufrufe()
        .contains(&"kandidat_hinzufuegen".to_string()));
}

#[tokio::test]
async fn kandidatenfehler_wird_geschluckt() {
    let (controller, _rx, fabrik, _quelle) = test_umgebung();
    let peer = EndpointId::new();

    controller.anrufen(peer).await.unwrap();
    fabrik.letzter().kandidaten_fehlschlagen_lassen();

    controller
        .signal_verarbeiten(peer, EnvelopePayload::Candidate {
            candidate: test_kandidat(),
        })
        .await;

    // Das Gespraech laeuft unveraendert weiter
    assert_eq!(controller.phase(), AnrufPhase::Rufend);
    assert!(!fabrik.letzter().ist_geschlossen());
}

#[tokio::test]
async fn lokaler_kandidat_wird_an_den_partner_geroutet() {
    let (controller, mut rx, _fabrik, _quelle) = test_umgebung();
    let peer = EndpointId::new();

    controller.anrufen(peer).await.unwrap();
    let _ = rx.try_recv(); // Anrufwunsch abraeumen

    controller
        .engine_ereignis_verarbeiten(peer, EngineEreignis::LokalerKandidat(test_kandidat()))
        .await;

    let signal = rx.try_recv().expect("Kandidat erwartet");
    assert_eq!(signal.an, peer);
    assert!(matches!(signal.payload, EnvelopePayload::Candidate { .. }));
}

// ---------------------------------------------------------------------------
// Beenden und Abbau
// ---------------------------------------------------------------------------

#[tokio::test]
async fn auflegen_gibt_alle_ressourcen_frei_und_ist_idempotent() {
    let (controller, mut rx, fabrik, quelle) = test_umgebung();
    let peer = EndpointId::new();

    controller.anrufen(peer).await.unwrap();
    controller
        .engine_ereignis_verarbeiten(peer, EngineEreignis::Transport(TransportZustand::Verbunden))
        .await;
    let _ = rx.try_recv(); // Anrufwunsch abraeumen

    controller.auflegen().await.unwrap();

    assert_eq!(controller.phase(), AnrufPhase::Frei);
    assert_eq!(controller.aktueller_peer(), None);
    assert!(fabrik.letzter().ist_geschlossen());
    assert!(quelle.letzte().ist_gestoppt());
    assert!(controller.lokale_senke().aktuell().is_none());
    assert!(controller.remote_senke().aktuell().is_none());

    let signal = rx.try_recv().expect("Hangup erwartet");
    assert_eq!(signal.an, peer);
    assert!(matches!(signal.payload, EnvelopePayload::Hangup));

    // Wiederholtes Auflegen ist erlaubt und sendet nichts mehr
    controller.auflegen().await.unwrap();
    assert_eq!(controller.phase(), AnrufPhase::Frei);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn hangup_des_partners_baut_ab() {
    let (controller, _rx, fabrik, quelle) = test_umgebung();
    let peer = EndpointId::new();

    controller.anrufen(peer).await.unwrap();
    controller
        .signal_verarbeiten(peer, EnvelopePayload::Hangup)
        .await;

    assert_eq!(controller.phase(), AnrufPhase::Frei);
    assert_eq!(
        controller.status(),
        Some("Vom Gespraechspartner beendet".to_string())
    );
    assert!(fabrik.letzter().ist_geschlossen());
    assert!(quelle.letzte().ist_gestoppt());
}

#[tokio::test]
async fn hangup_von_fremdem_endpunkt_wird_ignoriert() {
    let (controller, _rx, _fabrik, _quelle) = test_umgebung();
    let peer = EndpointId::new();

    controller.anrufen(peer).await.unwrap();
    controller
        .signal_verarbeiten(EndpointId::new(), EnvelopePayload::Hangup)
        .await;

    assert_eq!(controller.phase(), AnrufPhase::Rufend);
    assert_eq!(controller.aktueller_peer(), Some(peer));
}

#[tokio::test]
async fn transportabbruch_fuehrt_zum_abbau() {
    let (controller, _rx, fabrik, quelle) = test_umgebung();
    let peer = EndpointId::new();

    controller.anrufen(peer).await.unwrap();
    controller
        .engine_ereignis_verarbeiten(
            peer,
            EngineEreignis::Transport(TransportZustand::Fehlgeschlagen),
        )
        .await;

    assert_eq!(controller.phase(), AnrufPhase::Frei);
    assert!(fabrik.letzter().ist_geschlossen());
    assert!(quelle.letzte().ist_gestoppt());
}

#[tokio::test]
async fn remote_medien_fuellen_die_senke() {
    let (controller, _rx, _fabrik, _quelle) = test_umgebung();
    let peer = EndpointId::new();

    controller.anrufen(peer).await.unwrap();
    controller
        .engine_ereignis_verarbeiten(
            peer,
            EngineEreignis::RemoteMedien(crate::engine::RemoteStream {
                id: "remote-stream".into(),
            }),
        )
        .await;

    assert_eq!(
        controller.remote_senke().aktuell(),
        Some("remote-stream".to_string())
    );
}

// ---------------------------------------------------------------------------
// Medien
// ---------------------------------------------------------------------------

#[tokio::test]
async fn vorab_gestartete_medien_werden_wiederverwendet() {
    let (controller, _rx, _fabrik, quelle) = test_umgebung();

    controller.lokale_medien_starten().unwrap();
    assert_eq!(quelle.anzahl_oeffnungen(), 1);
    assert!(controller.lokale_senke().aktuell().is_some());

    // Erneutes Starten oeffnet das Geraet nicht noch einmal
    controller.lokale_medien_starten().unwrap();
    assert_eq!(quelle.anzahl_oeffnungen(), 1);

    controller.anrufen(EndpointId::new()).await.unwrap();
    assert_eq!(quelle.anzahl_oeffnungen(), 1, "Keine zweite Aufnahme");
}

#[tokio::test]
async fn medienfehler_wird_synchron_gemeldet() {
    let (controller, _rx, _fabrik, quelle) = test_umgebung();
    quelle.verweigern();

    let ergebnis = controller.lokale_medien_starten();
    assert!(matches!(ergebnis, Err(SessionError::Medien(_))));
    assert!(controller.lokale_senke().aktuell().is_none());
}
