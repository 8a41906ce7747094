use dashmap::DashMap;
use std::{hash::Hash, sync::Arc};
use tokio::time::Instant;
use tracing::debug;

/// Valor almacenado junto con su metadata de acceso.
///
/// Los registros son inmutables: cada actualización construye uno nuevo,
/// así copiar un registro entre tiers nunca comparte estado.
#[derive(Debug, Clone)]
pub struct EntryRecord<V> {
    value: V,
    created_at: Instant,
    last_accessed: Instant,
    access_count: u64,
}

impl<V> EntryRecord<V> {
    pub fn new(value: V) -> Self {
        let now = Instant::now();
        Self {
            value,
            created_at: now,
            last_accessed: now,
            access_count: 0,
        }
    }

    pub fn value(&self) -> &V {
        &self.value
    }

    pub fn into_value(self) -> V {
        self.value
    }

    pub fn created_at(&self) -> Instant {
        self.created_at
    }

    pub fn last_accessed(&self) -> Instant {
        self.last_accessed
    }

    pub fn access_count(&self) -> u64 {
        self.access_count
    }

    /// Registro con un acceso más y `last_accessed` al instante actual.
    pub fn touched(self) -> Self {
        Self {
            last_accessed: Instant::now(),
            access_count: self.access_count.saturating_add(1),
            ..self
        }
    }

    /// Registro con el valor reemplazado; conserva la fecha de creación.
    pub fn with_value(self, value: V) -> Self {
        Self {
            value,
            last_accessed: Instant::now(),
            ..self
        }
    }

    /// Copia limpia para otro tier: mismo valor, contador a cero.
    pub fn promoted(self) -> Self {
        Self::new(self.value)
    }
}

/// Almacén genérico clave → registro con metadata.
///
/// Cada `get` exitoso cuenta como acceso. Para leer sin afectar
/// la metadata usar `peek`.
#[derive(Debug)]
pub struct EntryStore<K: Clone + Eq + Hash, V> {
    data: Arc<DashMap<K, EntryRecord<V>>>,
}

impl<K, V> EntryStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            data: Arc::new(DashMap::new()),
        }
    }

    /// Inserta un valor nuevo y retorna el anterior si existía.
    pub fn create(&self, key: K, value: V) -> Option<V> {
        self.data
            .insert(key, EntryRecord::new(value))
            .map(EntryRecord::into_value)
    }

    pub fn get(&self, key: &K) -> Option<V> {
        let mut entry = self.data.get_mut(key)?;
        let touched = entry.clone().touched();
        *entry = touched;
        Some(entry.value().value().clone())
    }

    pub fn peek(&self, key: &K) -> Option<V> {
        self.data.get(key).map(|entry| entry.value().value().clone())
    }

    pub fn metadata(&self, key: &K) -> Option<EntryRecord<V>> {
        self.data.get(key).map(|entry| entry.clone())
    }

    /// Reemplaza el valor de una entrada existente. Retorna `false` si no existe.
    pub fn update(&self, key: &K, value: V) -> bool {
        match self.data.get_mut(key) {
            Some(mut entry) => {
                let updated = entry.clone().with_value(value);
                *entry = updated;
                true
            }
            None => false,
        }
    }

    pub fn delete(&self, key: &K) -> Option<V> {
        self.data.remove(key).map(|(_, entry)| entry.into_value())
    }

    /// Vacía el almacén y retorna el número de entradas removidas.
    pub fn clear(&self) -> usize {
        let removed = self.data.len();
        self.data.clear();
        if removed > 0 {
            debug!("Limpiadas {} entradas del almacén", removed);
        }
        removed
    }

    pub fn contains(&self, key: &K) -> bool {
        self.data.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

impl<K, V> Default for EntryStore<K, V>
where
    K: Clone + Eq + Hash + Send + Sync + 'static,
    V: Clone + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Clone for EntryStore<K, V>
where
    K: Clone + Eq + Hash,
{
    fn clone(&self) -> Self {
        Self {
            data: self.data.clone(),
        }
    }
}
