//! Usage counters.

use serde::{Deserialize, Serialize};

use crate::storage::{keys, KeyValueStore, StoreValue};

const MS_PER_DAY: u64 = 86_400_000;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub total_cigarettes: u32,
    /// Timer unlocks in the current emergency window.
    pub today_count: u32,
    /// Wall time of the last timer unlock, epoch ms; 0 when unknown.
    pub last_unlock_epoch_ms: u64,
    pub smoke_free_days: u64,
    pub longest_streak: u64,
}

impl Progress {
    pub fn load(store: &dyn KeyValueStore) -> Self {
        Self {
            total_cigarettes: store.get_i64(keys::TOTAL_CIGARETTES, 0).clamp(0, u32::MAX as i64) as u32,
            today_count: store.get_i64(keys::TODAY_COUNT, 0).clamp(0, u32::MAX as i64) as u32,
            last_unlock_epoch_ms: store.get_u64(keys::LAST_UNLOCK, 0),
            smoke_free_days: store.get_u64(keys::DAYS_SMOKE_FREE, 0),
            longest_streak: store.get_u64(keys::LONGEST_STREAK, 0),
        }
    }

    /// Count a timer unlock at `wall_epoch_ms` (when the wall clock is known).
    pub fn record_unlock(&mut self, wall_epoch_ms: Option<u64>) {
        self.total_cigarettes = self.total_cigarettes.saturating_add(1);
        self.today_count = self.today_count.saturating_add(1);
        if let Some(ms) = wall_epoch_ms {
            self.last_unlock_epoch_ms = ms;
        }
        self.smoke_free_days = 0;
    }

    /// Recompute whole days since the last unlock. Returns true on change.
    pub fn refresh_smoke_free(&mut self, wall_epoch_ms: u64) -> bool {
        if self.last_unlock_epoch_ms == 0 {
            return false;
        }
        let days = wall_epoch_ms.saturating_sub(self.last_unlock_epoch_ms) / MS_PER_DAY;
        let changed = days != self.smoke_free_days;
        self.smoke_free_days = days;
        self.longest_streak = self.longest_streak.max(days);
        changed
    }

    pub fn entries(&self) -> Vec<(&'static str, StoreValue)> {
        vec![
            (keys::TOTAL_CIGARETTES, StoreValue::Int(self.total_cigarettes as i64)),
            (keys::TODAY_COUNT, StoreValue::Int(self.today_count as i64)),
            (keys::LAST_UNLOCK, StoreValue::U64(self.last_unlock_epoch_ms)),
            (keys::DAYS_SMOKE_FREE, StoreValue::U64(self.smoke_free_days)),
            (keys::LONGEST_STREAK, StoreValue::U64(self.longest_streak)),
        ]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn unlock_counts_and_resets_streak() {
        let mut p = Progress {
            smoke_free_days: 3,
            longest_streak: 3,
            ..Default::default()
        };
        p.record_unlock(Some(1_000));
        assert_eq!(p.total_cigarettes, 1);
        assert_eq!(p.today_count, 1);
        assert_eq!(p.last_unlock_epoch_ms, 1_000);
        assert_eq!(p.smoke_free_days, 0);
        assert_eq!(p.longest_streak, 3);
    }

    #[test]
    fn smoke_free_days_follow_the_wall_clock() {
        let mut p = Progress::default();
        assert!(!p.refresh_smoke_free(10 * MS_PER_DAY));

        p.record_unlock(Some(MS_PER_DAY));
        assert!(p.refresh_smoke_free(6 * MS_PER_DAY - 1));
        assert_eq!(p.smoke_free_days, 4);
        assert_eq!(p.longest_streak, 4);
        assert!(!p.refresh_smoke_free(6 * MS_PER_DAY - 2));
    }

    #[test]
    fn survives_reload() {
        let mut store = MemoryStore::new();
        let mut p = Progress::default();
        p.record_unlock(Some(5));
        for (k, v) in p.entries() {
            store.put(k, v).unwrap();
        }
        assert_eq!(Progress::load(&store), p);
    }
}
