use anyhow::{anyhow, Context, Result};
use ledger_domain::{DerivedRow, DomainStubs, LedgerStore, ShardRegistry};
use migration_flow::MigrationStateRepository;
use shard_persistence::SqliteShardStoreProvider;
use shard_workflow::{BlockchainConfig, ShardingConfig, ShardingEngineFactory, TrimData};
use std::io::{self, Write};
use std::sync::Arc;

/// Menú interactivo para administrar shards sobre el store configurado en
/// el entorno (`APL_DB_URL`, `APL_DATA_DIR`, ...).
///
/// Opciones soportadas:
/// 1) Listar shards
/// 2) Ver estado de migraciones
/// 3) Migrar hasta una altura
/// 4) Simular un trim (dispara el observador)
/// 5) Sembrar bloques de demostración
/// 6) Salir
fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    env_logger::init_from_env(env_logger::Env::default().default_filter_or("info"));

    let config = ShardingConfig::from_env()?;
    let heights = BlockchainConfig::from_env()?;
    let store = Arc::new(shard_persistence::new_from_env().context("abriendo store principal")?);
    let provider = Arc::new(SqliteShardStoreProvider::new(config.data_dir.clone()));
    let engine = ShardingEngineFactory::from_sqlite(config, heights, store.clone(), provider);
    let runtime = tokio::runtime::Runtime::new()?;
    let observer = engine.observer(runtime.handle().clone());

    loop {
        println!("\n== Shard admin ==");
        println!("1) Listar shards");
        println!("2) Ver estado de migraciones");
        println!("3) Migrar hasta una altura");
        println!("4) Simular trim");
        println!("5) Sembrar bloques de demostración");
        println!("6) Salir");
        print!("Elige una opción: ");
        io::stdout().flush().ok();

        let mut choice = String::new();
        io::stdin().read_line(&mut choice)?;
        match choice.trim() {
            "1" => match store.all_shards() {
                Ok(shards) => {
                    println!("\nID   | ALTURA   | ESTADO             | HASH");
                    println!("----------------------------------------------------------");
                    for s in shards {
                        let hash = s.shard_hash.as_deref().map(hex).unwrap_or_else(|| "-".into());
                        println!("{:<4} | {:<8} | {:<18} | {}", s.shard_id, s.shard_height, s.shard_state, hash);
                    }
                }
                Err(e) => eprintln!("Error listando shards: {}", e),
            },
            "2" => match store.all() {
                Ok(records) => {
                    for r in records {
                        println!("{}", serde_json::to_string_pretty(&r)?);
                    }
                }
                Err(e) => eprintln!("Error leyendo migraciones: {}", e),
            },
            "3" => {
                let height: i32 = match prompt("Altura objetivo: ")?.trim().parse() {
                    Ok(h) => h,
                    Err(_) => { eprintln!("Altura inválida"); continue; }
                };
                match engine.executor.run(height) {
                    Ok(state) => {
                        println!("Resultado: {}", state);
                        if let Some(e) = engine.executor.take_last_error() {
                            eprintln!("Causa: {}", e);
                        }
                    }
                    Err(e) => eprintln!("Migración rechazada: {}", e),
                }
            }
            "4" => {
                let trim: i32 = match prompt("Altura del último trim: ")?.trim().parse() {
                    Ok(h) => h,
                    Err(_) => { eprintln!("Altura inválida"); continue; }
                };
                let head: i32 = match prompt("Altura actual de la cadena: ")?.trim().parse() {
                    Ok(h) => h,
                    Err(_) => { eprintln!("Altura inválida"); continue; }
                };
                engine.blockchain_config
                      .write()
                      .map_err(|_| anyhow!("configuración de alturas envenenada"))?
                      .update_to_height(head);
                match observer.on_trim_done(TrimData::new(trim, head)) {
                    Some(handle) => println!("Resultado: {}", runtime.block_on(handle)?),
                    None => println!("No corresponde crear shard"),
                }
            }
            "5" => {
                let count: i32 = match prompt("Cantidad de bloques: ")?.trim().parse() {
                    Ok(n) if n > 0 => n,
                    _ => { eprintln!("Cantidad inválida"); continue; }
                };
                match seed(&store, count) {
                    Ok((from, to)) => println!("Bloques sembrados: [{}, {})", from, to),
                    Err(e) => eprintln!("Error sembrando: {}", e),
                }
            }
            "6" => {
                println!("Saliendo...");
                engine.catalog.shutdown();
                break;
            }
            other => {
                println!("Opción inválida: {}", other);
            }
        }
    }

    Ok(())
}

/// Agrega `count` bloques después del último, con una transacción y una
/// fila de `account` por bloque.
fn seed(store: &shard_persistence::DieselLedgerStore, count: i32) -> Result<(i32, i32)> {
    let from = store.blocks_before(i32::MAX, 1)?.first().map(|b| b.height + 1).unwrap_or(0);
    let to = from + count;
    let blocks: Vec<_> = (from..to).map(DomainStubs::block).collect();
    let txs: Vec<_> = (from..to).map(|h| DomainStubs::transaction(h as i64 + 1, h, 0)).collect();
    let accounts: Vec<_> = (from..to).map(|h| DerivedRow { db_id: h as i64 + 1,
                                                         height: h,
                                                         latest: true,
                                                         payload: serde_json::json!({ "balance": h }).to_string() })
                                     .collect();
    store.insert_blocks(&blocks)?;
    store.insert_transactions(&txs)?;
    store.insert_derived_rows("account", &accounts)?;
    Ok((from, to))
}

fn hex(bytes: &[u8]) -> String {
    bytes.iter().take(8).map(|b| format!("{:02x}", b)).collect()
}

fn prompt(msg: &str) -> io::Result<String> {
    print!("{}", msg);
    io::stdout().flush()?;
    let mut s = String::new();
    io::stdin().read_line(&mut s)?;
    Ok(s)
}
