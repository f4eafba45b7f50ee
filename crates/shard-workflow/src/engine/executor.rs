// Archivo: executor.rs
// Propósito: ejecuta la migración de un shard paso a paso, persistiendo el
// checkpoint tras cada paso y reanudando desde él.
use crate::engine::state_machine::{create_operation, remaining_plan};
use crate::errors::{MigrationError, Result};
use crate::events::{MigrationEvent, MigrationNotifier};
use crate::step::{MigrationOperation, MigrationServices, StepContext};
use migration_flow::{MigrateState, MigrationRecord, MigrationStateRepository};
use std::sync::{Arc, Mutex};

/// Operaciones pendientes de una ejecución, ligadas a su contexto.
pub struct MigrationRun {
  pub context: StepContext,
  pub operations: Vec<Box<dyn MigrationOperation>>,
}

pub struct MigrationExecutor {
  services: Arc<MigrationServices>,
  states: Arc<dyn MigrationStateRepository>,
  notifier: MigrationNotifier,
  run_guard: Mutex<()>,
  last_error: Mutex<Option<MigrationError>>,
}

impl MigrationExecutor {
  pub fn new(services: Arc<MigrationServices>,
             states: Arc<dyn MigrationStateRepository>,
             notifier: MigrationNotifier)
             -> Self {
    Self { services,
           states,
           notifier,
           run_guard: Mutex::new(()),
           last_error: Mutex::new(None) }
  }

  pub fn services(&self) -> &Arc<MigrationServices> {
    &self.services
  }

  pub fn notifier(&self) -> &MigrationNotifier {
    &self.notifier
  }

  pub fn current_record(&self) -> Result<Option<MigrationRecord>> {
    Ok(self.states.load_latest()?)
  }

  /// Error del último paso fallido, si lo hubo.
  pub fn take_last_error(&self) -> Option<MigrationError> {
    self.last_error.lock().unwrap_or_else(|e| e.into_inner()).take()
  }

  /// Migra hasta `target_height`, o reanuda la migración pendiente.
  ///
  /// Devuelve `Completed` o `Failed`; `Err` sólo para errores de
  /// configuración detectados antes de correr el primer paso.
  pub fn run(&self, target_height: i32) -> Result<MigrateState> {
    let _guard = self.run_guard.lock().unwrap_or_else(|e| e.into_inner());
    let mut record = self.resolve_record(target_height)?;
    let run = self.operations_for(&record)?;
    log::info!("migración del shard {} a altura {} desde {} ({} pasos)",
               record.shard_id,
               record.target_height,
               record.checkpoint,
               run.operations.len());
    for op in &run.operations {
      if self.execute_step(&mut record, &run.context, op.as_ref()) == MigrateState::Failed {
        return Ok(MigrateState::Failed);
      }
    }
    log::info!("migración del shard {} terminada: {}", record.shard_id, record.status);
    Ok(record.status)
  }

  /// Ejecuta una sola operación sobre la migración pendiente (o una nueva
  /// hacia `target_height`), con la misma persistencia y notificación que
  /// `run`.
  pub fn run_one(&self, target_height: i32, op: &dyn MigrationOperation) -> Result<MigrateState> {
    let _guard = self.run_guard.lock().unwrap_or_else(|e| e.into_inner());
    let mut record = self.resolve_record(target_height)?;
    let ctx = StepContext::new(record.shard_id, record.start_height, record.target_height, self.services.clone());
    Ok(self.execute_step(&mut record, &ctx, op))
  }

  /// Operaciones restantes desde `state` para el shard y altura dados. El
  /// inicio del rango es la altura del último shard terminado, o 0.
  pub fn create_all_operations(&self, shard_id: i64, target_height: i32, state: MigrateState) -> Result<MigrationRun> {
    let start_height = self.start_height()?;
    self.build_run(shard_id, start_height, target_height, state)
  }

  fn operations_for(&self, record: &MigrationRecord) -> Result<MigrationRun> {
    self.build_run(record.shard_id, record.start_height, record.target_height, record.checkpoint)
  }

  fn build_run(&self, shard_id: i64, start_height: i32, target_height: i32, state: MigrateState)
               -> Result<MigrationRun> {
    let plan = remaining_plan(state, self.services.config.backup_db)?;
    let operations = plan.iter().map(|e| create_operation(e.kind)).collect();
    let context = StepContext::new(shard_id, start_height, target_height, self.services.clone());
    Ok(MigrationRun { context, operations })
  }

  /// Altura del último shard terminado o importado; 0 si no hay ninguno.
  pub fn last_shard_height(&self) -> Result<i32> {
    self.start_height()
  }

  fn start_height(&self) -> Result<i32> {
    Ok(self.services
           .registry
           .last_completed_or_archived_shard()?
           .map(|s| s.shard_height)
           .unwrap_or(0))
  }

  fn resolve_record(&self, target_height: i32) -> Result<MigrationRecord> {
    if let Some(record) = self.states.load_latest()? {
      if !record.is_completed() {
        if record.target_height != target_height {
          log::warn!("shard {} pendiente hacia {}; se ignora la altura pedida {}",
                     record.shard_id,
                     record.target_height,
                     target_height);
        }
        return Ok(record);
      }
    }
    if target_height <= 0 {
      return Err(MigrationError::Configuration(format!("altura objetivo inválida: {}", target_height)));
    }
    let start_height = self.start_height()?;
    if target_height <= start_height {
      return Err(MigrationError::Configuration(format!("altura objetivo {} no supera la del último shard ({})",
                                                       target_height, start_height)));
    }
    let shard_id = self.services.catalog.next_shard_id()?;
    let record = MigrationRecord::new(shard_id, start_height, target_height);
    self.states.save(&record)?;
    Ok(record)
  }

  fn execute_step(&self, record: &mut MigrationRecord, ctx: &StepContext, op: &dyn MigrationOperation)
                  -> MigrateState {
    let result = self.mark_started(record, op).and_then(|_| op.execute(ctx));
    match result.and_then(|state| self.persist(record, state).map(|_| state)) {
      Ok(state) => {
        log::info!("shard {}: paso {} -> {}", record.shard_id, op.name(), state);
        state
      }
      Err(e) => {
        let err = MigrationError::step(op.name(), record.shard_id, record.target_height, e);
        log::error!("{}", err);
        record.fail(op.name());
        if let Err(save_err) = self.states.save(record) {
          log::warn!("no se pudo registrar el fallo del shard {}: {}", record.shard_id, save_err);
        }
        self.publish(record, MigrateState::Failed);
        *self.last_error.lock().unwrap_or_else(|e| e.into_inner()) = Some(err);
        MigrateState::Failed
      }
    }
  }

  fn mark_started(&self, record: &mut MigrationRecord, op: &dyn MigrationOperation) -> Result<()> {
    match op.started_state() {
      Some(marker) if record.checkpoint < marker => self.persist(record, marker),
      _ => Ok(()),
    }
  }

  fn persist(&self, record: &mut MigrationRecord, state: MigrateState) -> Result<()> {
    record.advance(state);
    self.states.save(record)?;
    self.publish(record, state);
    Ok(())
  }

  fn publish(&self, record: &MigrationRecord, state: MigrateState) {
    self.notifier.publish(MigrationEvent { shard_id: record.shard_id,
                                           target_height: record.target_height,
                                           state });
  }
}
