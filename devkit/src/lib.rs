/*!
# Symbion DevKit - fixtures et doublures pour les tests

Bibliothèque partagée par les tests des autres crates :
- Rapports de référence (client/serveur, pseudo-nœuds, ids malformés)
- Stub MQTT qui enregistre les publications sans broker
- Reporters et taggers factices (statiques, en échec, compteurs)
*/

pub mod fixture;
pub mod mqtt_stub;
pub mod reporters;
pub mod test_utils;

pub use mqtt_stub::{MockMessage, MockMqttClient};
pub use reporters::{CountingTagger, FailingReporter, FailingTagger, StaticReporter};
pub use test_utils::init_test_logging;
