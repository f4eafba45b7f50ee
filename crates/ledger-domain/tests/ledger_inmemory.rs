use ledger_domain::{DerivedTablesRegistry, DomainStubs, LedgerStore, Shard, ShardRegistry, ShardState,
                    STUB_TRANSACTION_ID_BASE};

#[test]
fn range_reads_are_half_open_and_cursor_based() {
  let store = DomainStubs::sample_ledger(10, 2).unwrap();

  let blocks = store.blocks_after(0, 2, 5, 100).unwrap();
  assert_eq!(blocks.iter().map(|b| b.height).collect::<Vec<_>>(), vec![2, 3, 4]);

  // el cursor salta los ya leídos
  let next = store.blocks_after(blocks[1].db_id, 2, 5, 100).unwrap();
  assert_eq!(next.len(), 1);
  assert_eq!(next[0].height, 4);

  let limited = store.transactions_after(0, 0, 10, 3).unwrap();
  assert_eq!(limited.iter().map(|t| t.db_id).collect::<Vec<_>>(), vec![1, 2, 3]);

  assert_eq!(store.block_signatures(0, 10).unwrap().len(), 10);
  assert!(store.block_signatures(5, 5).unwrap().is_empty());
}

#[test]
fn blocks_before_is_newest_first() {
  let store = DomainStubs::sample_ledger(10, 0).unwrap();
  let prev = store.blocks_before(6, 3).unwrap();
  assert_eq!(prev.iter().map(|b| b.height).collect::<Vec<_>>(), vec![5, 4, 3]);
}

#[test]
fn unsettled_phased_transactions_only_when_poll_outlives_cut() {
  let store = DomainStubs::sample_ledger(10, 1).unwrap();
  // transacción db_id 3 (altura 2) termina después del corte; db_id 4 antes
  DomainStubs::phase_transaction(&store, STUB_TRANSACTION_ID_BASE + 3, 2, 20).unwrap();
  DomainStubs::phase_transaction(&store, STUB_TRANSACTION_ID_BASE + 4, 3, 6).unwrap();

  let ids = store.unsettled_phased_db_ids(0, 8).unwrap();
  assert_eq!(ids.into_iter().collect::<Vec<_>>(), vec![3]);
}

#[test]
fn unreadable_store_fails_reads() {
  let store = DomainStubs::sample_ledger(3, 0).unwrap();
  store.set_unreadable(true);
  assert!(store.block_signatures(0, 3).is_err());
  store.set_unreadable(false);
  assert!(store.block_signatures(0, 3).is_ok());
}

#[test]
fn registry_allocates_ids_and_finds_last_completed() {
  let store = DomainStubs::sample_ledger(1, 0).unwrap();
  assert_eq!(store.next_shard_id().unwrap(), 1);

  let mut first = Shard::new(1, 100);
  first.shard_state = ShardState::Full;
  store.save_shard(&first).unwrap();
  store.save_shard(&Shard::new(2, 200)).unwrap();

  assert_eq!(store.next_shard_id().unwrap(), 3);
  assert_eq!(store.find_all_shard_ids().unwrap(), vec![1, 2]);
  assert_eq!(store.last_completed_or_archived_shard().unwrap().map(|s| s.shard_id), Some(1));
}

#[test]
fn derived_registry_deduplicates() {
  let registry = DerivedTablesRegistry::with_default_tables();
  registry.register("account");
  registry.register("currency");
  let names = registry.names();
  assert_eq!(names.iter().filter(|n| n.as_str() == "account").count(), 1);
  assert!(names.contains(&"currency".to_string()));
}
