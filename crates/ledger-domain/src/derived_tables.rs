// derived_tables.rs
use std::sync::RwLock;

/// Tablas derivadas registradas por defecto en el store principal.
pub const DEFAULT_DERIVED_TABLES: [&str; 4] = ["account", "account_ledger", "alias", "currency"];

/// Registro de los nombres de tablas derivadas (tablas de funcionalidades)
/// presentes en el store principal.
#[derive(Debug, Default)]
pub struct DerivedTablesRegistry {
  names: RwLock<Vec<String>>,
}

impl DerivedTablesRegistry {
  pub fn new() -> Self {
    Self { names: RwLock::new(Vec::new()) }
  }

  pub fn with_default_tables() -> Self {
    let registry = Self::new();
    for name in DEFAULT_DERIVED_TABLES {
      registry.register(name);
    }
    registry
  }

  /// Registra una tabla. Registrar dos veces el mismo nombre no la duplica.
  pub fn register(&self, name: &str) {
    let mut names = self.names.write().unwrap_or_else(|e| e.into_inner());
    if !names.iter().any(|n| n == name) {
      names.push(name.to_string());
    }
  }

  pub fn names(&self) -> Vec<String> {
    self.names.read().unwrap_or_else(|e| e.into_inner()).clone()
  }
}
