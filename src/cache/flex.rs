use super::entry_store::EntryRecord;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use tracing::info;

/// Resultado de un acierto en el tier *flex*.
#[derive(Debug)]
pub enum FlexHit {
    /// La entrada sigue en *flex*, ahora en la posición más nueva.
    /// `evicted` cuenta las entradas desalojadas para reinsertarla.
    Retained { value: Value, evicted: usize },
    /// La entrada alcanzó el umbral y salió de *flex*; el llamador la
    /// inserta en *favorite*.
    Promoted(EntryRecord<Value>),
}

/// Tier acotado ordenado por inserción con desalojo en bloque.
///
/// Tocar una entrada la remueve y la vuelve a insertar como la más nueva,
/// de modo que el orden de desalojo es un LRU aproximado.
#[derive(Debug)]
pub struct FlexTier {
    entries: HashMap<String, (u64, EntryRecord<Value>)>,
    order: BTreeMap<u64, String>,
    next_seq: u64,
    capacity: usize,
    clear_amount: usize,
}

impl FlexTier {
    pub fn new(capacity: usize, clear_amount: usize) -> Self {
        Self {
            entries: HashMap::new(),
            order: BTreeMap::new(),
            next_seq: 0,
            capacity: capacity.max(1),
            clear_amount: clear_amount.max(1),
        }
    }

    /// Registra un acceso a `key`. Retorna `None` si no está en el tier.
    pub fn hit(&mut self, key: &str, promotion_threshold: u64) -> Option<FlexHit> {
        let record = self.remove(key)?.touched();

        if record.access_count() >= promotion_threshold {
            return Some(FlexHit::Promoted(record));
        }

        let value = record.value().clone();
        let evicted = self.push_newest(key.to_string(), record, true);
        Some(FlexHit::Retained { value, evicted })
    }

    /// Inserta una respuesta recién obtenida con su primer acceso contado.
    /// Retorna cuántas entradas se desalojaron para hacerle lugar.
    pub fn insert(&mut self, key: String, value: Value) -> usize {
        // Un fetch concurrente pudo haberla insertado ya: gana la última escritura
        let resident = self.remove(&key).is_some();
        self.push_newest(key, EntryRecord::new(value).touched(), resident)
    }

    pub fn access_count(&self, key: &str) -> Option<u64> {
        self.entries.get(key).map(|(_, record)| record.access_count())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Claves desde la más antigua a la más nueva.
    pub fn keys_oldest_first(&self) -> Vec<String> {
        self.order.values().cloned().collect()
    }

    pub fn clear(&mut self) -> usize {
        let removed = self.entries.len();
        self.entries.clear();
        self.order.clear();
        removed
    }

    /// `resident` indica que la clave ya ocupaba un lugar antes de sacarla
    /// para reinsertarla: cuenta para decidir si el tier está lleno.
    fn push_newest(&mut self, key: String, record: EntryRecord<Value>, resident: bool) -> usize {
        let occupied = self.entries.len() + usize::from(resident);
        let evicted = if occupied >= self.capacity {
            self.evict_oldest()
        } else {
            0
        };
        let seq = self.next_seq;
        self.next_seq += 1;
        self.order.insert(seq, key.clone());
        self.entries.insert(key, (seq, record));
        evicted
    }

    fn remove(&mut self, key: &str) -> Option<EntryRecord<Value>> {
        let (seq, record) = self.entries.remove(key)?;
        self.order.remove(&seq);
        Some(record)
    }

    /// Descarta las más antiguas hasta `capacity - clear_amount` de una sola vez.
    fn evict_oldest(&mut self) -> usize {
        let target = self.capacity.saturating_sub(self.clear_amount);
        let mut evicted = 0;
        while self.entries.len() > target {
            let Some((_, key)) = self.order.pop_first() else {
                break;
            };
            self.entries.remove(&key);
            evicted += 1;
        }

        info!(
            "🧹 Tier flex lleno ({}): desalojadas {} entradas antiguas",
            self.capacity, evicted
        );
        evicted
    }
}
