use crate::archive::file_digest;
use crate::errors::Result;
use crate::step::{MigrationOperation, StepContext};
use migration_flow::MigrateState;

/// Comprime el export del shard y guarda el digest del archivo en el
/// registro.
#[derive(Debug, Default)]
pub struct ZipArchive;

impl MigrationOperation for ZipArchive {
  fn name(&self) -> &str {
    "ZipArchive"
  }

  fn started_state(&self) -> Option<MigrateState> {
    Some(MigrateState::ZipArchiveStarted)
  }

  fn execute(&self, ctx: &StepContext) -> Result<MigrateState> {
    let source = ctx.export_dir()?;
    let archive = ctx.archive_path()?;
    ctx.services.compressor.compress(&source, &archive)?;
    let digest = file_digest(&archive)?;
    let mut shard = ctx.load_shard()?;
    shard.archive_hash = Some(digest);
    ctx.save_shard(&shard)?;
    log::info!("shard {}: archivo {}", ctx.shard_id, archive.display());
    Ok(MigrateState::ZipArchived)
  }
}
