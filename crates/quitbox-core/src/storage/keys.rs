//! Persisted key names.

/// Namespace all box keys live under.
pub const NAMESPACE: &str = "smoking_box";

pub const TIMER_MODE: &str = "timer_mode";
pub const INTERVAL_MINUTES: &str = "interval_min";
pub const DAILY_LIMIT: &str = "daily_limit";
pub const LAST_UNLOCK: &str = "last_unlock";
pub const EMERGENCY_COUNT: &str = "emergency_cnt";
pub const TOTAL_CIGARETTES: &str = "total_cigs";
pub const DAYS_SMOKE_FREE: &str = "smoke_free_days";
pub const LONGEST_STREAK: &str = "longest_streak";
pub const DAILY_HOUR: &str = "daily_hour";
pub const DAILY_MINUTE: &str = "daily_minute";
pub const UNLOCK_DURATION: &str = "unlock_duration";
pub const WEEKLY_DAY: &str = "weekly_day";
pub const SCHEDULE_ACTIVE: &str = "schedule_active";
pub const LAST_SCHEDULED_UNLOCK: &str = "last_scheduled";

pub const CURRENT_STATE: &str = "current_state";
pub const LAST_SAVE: &str = "last_save";
pub const LOCK_UNTIL: &str = "lock_until";
pub const REMAINING_MS: &str = "remaining_ms";
/// End of a scheduled unlock window, epoch seconds (0 = none).
pub const RELOCK_AT: &str = "relock_at";
pub const RELOCK_REMAINING_MS: &str = "relock_remaining_ms";
pub const PENDING_PENALTY: &str = "pending_penalty";
pub const TODAY_COUNT: &str = "today_count";
pub const EMERGENCY_DAY: &str = "emergency_day";

pub const CURRENT_LANGUAGE: &str = "current_language";
pub const PRODUCT_NAME: &str = "product_name";
pub const CURRENCY: &str = "currency";
pub const USE_PACK_PRICE: &str = "use_pack_price";
pub const CIGARETTE_COST: &str = "cigarette_cost";
pub const PACK_COST: &str = "pack_cost";
pub const CIGARETTES_PER_PACK: &str = "cigarettes_per_pack";

pub const SERVO_LOCKED_POS: &str = "servo_locked_pos";
pub const SERVO_UNLOCKED_POS: &str = "servo_unlocked_pos";

pub const BLOCK_ON_PUBLIC: &str = "block_on_public";
pub const ALLOWED_NETWORKS: &str = "allowed_networks";
pub const BLOCKED_NETWORKS: &str = "blocked_networks";

pub const AI_ENABLED: &str = "ai_enabled";
pub const AI_PROVIDER: &str = "ai_provider";
pub const AI_PERSONALITY: &str = "ai_personality";
pub const AI_DELAY_MINUTES: &str = "ai_delay_minutes";
pub const AI_API_KEY: &str = "ai_api_key";
/// Marker for a session that was running when the box lost power.
pub const AI_SESSION_ID: &str = "ai_session_id";
