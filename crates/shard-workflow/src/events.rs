use migration_flow::MigrateState;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Estado alcanzado por una ejecución de migración.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationEvent {
  pub shard_id: i64,
  pub target_height: i32,
  pub state: MigrateState,
}

/// Canal de difusión de estados de migración. Publicar sin suscriptores no
/// es un error.
#[derive(Debug, Clone)]
pub struct MigrationNotifier {
  sender: broadcast::Sender<MigrationEvent>,
}

impl MigrationNotifier {
  pub fn new(capacity: usize) -> Self {
    let (sender, _) = broadcast::channel(capacity.max(1));
    Self { sender }
  }

  pub fn subscribe(&self) -> broadcast::Receiver<MigrationEvent> {
    self.sender.subscribe()
  }

  pub fn publish(&self, event: MigrationEvent) {
    if self.sender.send(event).is_err() {
      log::trace!("evento de migración sin suscriptores");
    }
  }
}

impl Default for MigrationNotifier {
  fn default() -> Self {
    Self::new(64)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn publish_without_subscribers_is_ignored() {
    let notifier = MigrationNotifier::new(4);
    notifier.publish(MigrationEvent { shard_id: 1, target_height: 100, state: MigrateState::Init });
    let mut rx = notifier.subscribe();
    notifier.publish(MigrationEvent { shard_id: 1, target_height: 100, state: MigrateState::DataCopied });
    let ev = tokio_test::block_on(rx.recv()).unwrap();
    assert_eq!(ev.state, MigrateState::DataCopied);
  }
}
