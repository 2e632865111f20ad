//! Tests fuer die Client-Seite
//!
//! Die Zustandsmaschine wird gegen geskriptete Engine- und
//! Medien-Implementierungen geprueft; die Szenario-Tests treiben
//! zusaetzlich zwei vollstaendige Clients gegen ein echtes Relay.


mod controller_tests;
