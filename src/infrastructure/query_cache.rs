use crate::domain::models::Booking;
use crate::infrastructure::error::InfraError;
use std::collections::HashMap;
use std::sync::Mutex;

/// Cached views that mutations can invalidate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum QueryKey {
    /// Every cached booking list, whatever its filter.
    BookingList,
    BookingDetail(String),
}

/// Every `invalidate` or `clear` bumps the generation of the keys it touches.
/// Fetchers read [`QueryCache::generation`] before going to the network and
/// hand it back on `put_*`, so a response that started before an
/// invalidation is never written back.
pub trait QueryCache: Send + Sync {
    fn generation(&self, key: &QueryKey) -> Result<u64, InfraError>;
    fn get_list(&self, filter_key: &str) -> Result<Option<Vec<Booking>>, InfraError>;
    /// Returns false, storing nothing, when the list generation moved on.
    fn put_list(&self, filter_key: &str, bookings: &[Booking], generation: u64) -> Result<bool, InfraError>;
    fn get_detail(&self, booking_id: &str) -> Result<Option<Booking>, InfraError>;
    fn put_detail(&self, booking: &Booking, generation: u64) -> Result<bool, InfraError>;
    fn invalidate(&self, key: &QueryKey) -> Result<(), InfraError>;
    fn clear(&self) -> Result<(), InfraError>;
}

#[derive(Debug, Default)]
struct CacheEntries {
    lists: HashMap<String, Vec<Booking>>,
    details: HashMap<String, Booking>,
    list_generation: u64,
    detail_generations: HashMap<String, u64>,
    // Bumped by `clear`; added to every detail generation.
    cleared: u64,
}

impl CacheEntries {
    fn generation(&self, key: &QueryKey) -> u64 {
        match key {
            QueryKey::BookingList => self.list_generation,
            QueryKey::BookingDetail(booking_id) => {
                let scoped = InMemoryQueryCache::normalized_id(booking_id)
                    .and_then(|booking_id| self.detail_generations.get(&booking_id).copied())
                    .unwrap_or(0);
                self.cleared.wrapping_add(scoped)
            }
        }
    }
}

#[derive(Debug, Default)]
pub struct InMemoryQueryCache {
    entries: Mutex<CacheEntries>,
}

impl InMemoryQueryCache {
    fn normalized_id(booking_id: &str) -> Option<String> {
        let normalized = booking_id.trim();
        if normalized.is_empty() {
            return None;
        }
        Some(normalized.to_string())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, CacheEntries>, InfraError> {
        self.entries
            .lock()
            .map_err(|error| InfraError::InvalidConfig(format!("query cache lock poisoned: {error}")))
    }
}

impl QueryCache for InMemoryQueryCache {
    fn generation(&self, key: &QueryKey) -> Result<u64, InfraError> {
        Ok(self.lock()?.generation(key))
    }

    fn get_list(&self, filter_key: &str) -> Result<Option<Vec<Booking>>, InfraError> {
        Ok(self.lock()?.lists.get(filter_key).cloned())
    }

    fn put_list(&self, filter_key: &str, bookings: &[Booking], generation: u64) -> Result<bool, InfraError> {
        let mut entries = self.lock()?;
        if entries.list_generation != generation {
            return Ok(false);
        }
        entries.lists.insert(filter_key.to_string(), bookings.to_vec());
        Ok(true)
    }

    fn get_detail(&self, booking_id: &str) -> Result<Option<Booking>, InfraError> {
        let Some(booking_id) = Self::normalized_id(booking_id) else {
            return Ok(None);
        };
        Ok(self.lock()?.details.get(&booking_id).cloned())
    }

    fn put_detail(&self, booking: &Booking, generation: u64) -> Result<bool, InfraError> {
        let booking_id = Self::normalized_id(&booking.id).ok_or_else(|| {
            InfraError::InvalidInput("booking id is required for cache upsert".to_string())
        })?;
        let mut entries = self.lock()?;
        if entries.generation(&QueryKey::BookingDetail(booking_id.clone())) != generation {
            return Ok(false);
        }
        entries.details.insert(booking_id, booking.clone());
        Ok(true)
    }

    fn invalidate(&self, key: &QueryKey) -> Result<(), InfraError> {
        let mut entries = self.lock()?;
        match key {
            QueryKey::BookingList => {
                entries.lists.clear();
                entries.list_generation = entries.list_generation.wrapping_add(1);
            }
            QueryKey::BookingDetail(booking_id) => {
                if let Some(booking_id) = Self::normalized_id(booking_id) {
                    entries.details.remove(&booking_id);
                    let generation = entries.detail_generations.entry(booking_id).or_insert(0);
                    *generation = generation.wrapping_add(1);
                }
            }
        }
        Ok(())
    }

    fn clear(&self) -> Result<(), InfraError> {
        let mut entries = self.lock()?;
        entries.lists.clear();
        entries.details.clear();
        entries.list_generation = entries.list_generation.wrapping_add(1);
        entries.cleared = entries.cleared.wrapping_add(1);
        Ok(())
    }
}
