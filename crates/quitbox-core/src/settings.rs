//! Device settings kept in the key-value store.
//!
//! Everything here has a documented default, so a fresh store yields a
//! usable box.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::emergency::NetworkPolicy;
use crate::error::{StoreError, ValidationError};
use crate::gatekeeper::{GatekeeperSettings, Personality};
use crate::limits::{
    AI_EMERGENCY_DELAY_MINUTES, DEFAULT_CIGARETTES_PER_PACK, DEFAULT_CIGARETTE_COST,
    DEFAULT_DAILY_LIMIT, DEFAULT_PACK_COST, MAX_TIMER_MINUTES, SERVO_LOCKED_ANGLE,
    SERVO_UNLOCKED_ANGLE,
};
use crate::storage::{keys, KeyValueStore, StoreValue};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CostSettings {
    pub currency: String,
    pub product_name: String,
    pub use_pack_price: bool,
    pub cigarette_cost: f64,
    pub pack_cost: f64,
    pub cigarettes_per_pack: u32,
}

impl Default for CostSettings {
    fn default() -> Self {
        Self {
            currency: "EUR".into(),
            product_name: "cigarettes".into(),
            use_pack_price: false,
            cigarette_cost: DEFAULT_CIGARETTE_COST,
            pack_cost: DEFAULT_PACK_COST,
            cigarettes_per_pack: DEFAULT_CIGARETTES_PER_PACK,
        }
    }
}

impl CostSettings {
    /// Price of a single cigarette.
    pub fn unit_cost(&self) -> f64 {
        if self.use_pack_price && self.cigarettes_per_pack > 0 {
            self.pack_cost / self.cigarettes_per_pack as f64
        } else {
            self.cigarette_cost
        }
    }

    pub fn money_saved(&self, total_cigarettes: u32) -> f64 {
        total_cigarettes as f64 * self.unit_cost()
    }
}

/// Servo angles for the two lid positions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ServoCalibration {
    pub locked_angle: u8,
    pub unlocked_angle: u8,
}

impl Default for ServoCalibration {
    fn default() -> Self {
        Self {
            locked_angle: SERVO_LOCKED_ANGLE,
            unlocked_angle: SERVO_UNLOCKED_ANGLE,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AiProvider {
    /// Scripted replies only.
    #[default]
    Simple,
    OpenAi,
}

impl AiProvider {
    pub fn as_str(self) -> &'static str {
        match self {
            AiProvider::Simple => "simple",
            AiProvider::OpenAi => "openai",
        }
    }
}

impl fmt::Display for AiProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AiProvider {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "simple" | "" => Ok(AiProvider::Simple),
            "openai" => Ok(AiProvider::OpenAi),
            other => Err(ValidationError::InvalidValue {
                field: "ai_provider".into(),
                message: format!("unknown provider '{other}'"),
            }),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AiSettings {
    pub enabled: bool,
    pub provider: AiProvider,
    pub personality: Personality,
    pub delay_minutes: u32,
    #[serde(default, skip_serializing)]
    pub api_key: String,
}

impl Default for AiSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            provider: AiProvider::default(),
            personality: Personality::default(),
            delay_minutes: AI_EMERGENCY_DELAY_MINUTES,
            api_key: String::new(),
        }
    }
}

impl AiSettings {
    pub fn gatekeeper(&self) -> GatekeeperSettings {
        GatekeeperSettings {
            enabled: self.enabled,
            personality: self.personality,
            delay_minutes: self.delay_minutes,
        }
    }

    pub fn has_api_key(&self) -> bool {
        !self.api_key.trim().is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BoxSettings {
    pub daily_limit: u32,
    pub language: String,
    pub cost: CostSettings,
    pub servo: ServoCalibration,
    pub ai: AiSettings,
    pub network: NetworkPolicy,
}

impl Default for BoxSettings {
    fn default() -> Self {
        Self {
            daily_limit: DEFAULT_DAILY_LIMIT,
            language: "en".into(),
            cost: CostSettings::default(),
            servo: ServoCalibration::default(),
            ai: AiSettings::default(),
            network: NetworkPolicy::default(),
        }
    }
}

impl BoxSettings {
    pub fn load(store: &dyn KeyValueStore) -> Self {
        let d = Self::default();
        let personality = store.get_text(keys::AI_PERSONALITY, d.ai.personality.as_str());
        let provider = store.get_text(keys::AI_PROVIDER, d.ai.provider.as_str());
        Self {
            daily_limit: non_negative(store.get_i64(keys::DAILY_LIMIT, d.daily_limit as i64)),
            language: store.get_text(keys::CURRENT_LANGUAGE, &d.language),
            cost: CostSettings {
                currency: store.get_text(keys::CURRENCY, &d.cost.currency),
                product_name: store.get_text(keys::PRODUCT_NAME, &d.cost.product_name),
                use_pack_price: store.get_bool(keys::USE_PACK_PRICE, d.cost.use_pack_price),
                cigarette_cost: store.get_f64(keys::CIGARETTE_COST, d.cost.cigarette_cost),
                pack_cost: store.get_f64(keys::PACK_COST, d.cost.pack_cost),
                cigarettes_per_pack: non_negative(
                    store.get_i64(keys::CIGARETTES_PER_PACK, d.cost.cigarettes_per_pack as i64),
                ),
            },
            servo: ServoCalibration {
                locked_angle: angle(store.get_i64(keys::SERVO_LOCKED_POS, d.servo.locked_angle as i64)),
                unlocked_angle: angle(
                    store.get_i64(keys::SERVO_UNLOCKED_POS, d.servo.unlocked_angle as i64),
                ),
            },
            ai: AiSettings {
                enabled: store.get_bool(keys::AI_ENABLED, d.ai.enabled),
                provider: provider.parse().unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "falling back to scripted AI");
                    AiProvider::Simple
                }),
                personality: personality.parse().unwrap_or_else(|e| {
                    tracing::warn!(error = %e, "falling back to default personality");
                    Personality::default()
                }),
                delay_minutes: non_negative(
                    store.get_i64(keys::AI_DELAY_MINUTES, d.ai.delay_minutes as i64),
                )
                .min(MAX_TIMER_MINUTES),
                api_key: store.get_text(keys::AI_API_KEY, ""),
            },
            network: NetworkPolicy::from_stored(
                store.get_bool(keys::BLOCK_ON_PUBLIC, false),
                &store.get_text(keys::ALLOWED_NETWORKS, "[]"),
                &store.get_text(keys::BLOCKED_NETWORKS, "[]"),
            ),
        }
    }

    pub fn entries(&self) -> Vec<(&'static str, StoreValue)> {
        vec![
            (keys::DAILY_LIMIT, StoreValue::Int(self.daily_limit as i64)),
            (keys::CURRENT_LANGUAGE, StoreValue::Text(self.language.clone())),
            (keys::CURRENCY, StoreValue::Text(self.cost.currency.clone())),
            (keys::PRODUCT_NAME, StoreValue::Text(self.cost.product_name.clone())),
            (keys::USE_PACK_PRICE, StoreValue::Bool(self.cost.use_pack_price)),
            (keys::CIGARETTE_COST, StoreValue::Float(self.cost.cigarette_cost)),
            (keys::PACK_COST, StoreValue::Float(self.cost.pack_cost)),
            (keys::CIGARETTES_PER_PACK, StoreValue::Int(self.cost.cigarettes_per_pack as i64)),
            (keys::SERVO_LOCKED_POS, StoreValue::Int(self.servo.locked_angle as i64)),
            (keys::SERVO_UNLOCKED_POS, StoreValue::Int(self.servo.unlocked_angle as i64)),
            (keys::AI_ENABLED, StoreValue::Bool(self.ai.enabled)),
            (keys::AI_PROVIDER, StoreValue::Text(self.ai.provider.as_str().into())),
            (keys::AI_PERSONALITY, StoreValue::Text(self.ai.personality.as_str().into())),
            (keys::AI_DELAY_MINUTES, StoreValue::Int(self.ai.delay_minutes as i64)),
            (keys::AI_API_KEY, StoreValue::Text(self.ai.api_key.clone())),
            (keys::BLOCK_ON_PUBLIC, StoreValue::Bool(self.network.block_on_public)),
            (keys::ALLOWED_NETWORKS, StoreValue::Text(self.network.allowed_json())),
            (keys::BLOCKED_NETWORKS, StoreValue::Text(self.network.blocked_json())),
        ]
    }

    pub fn save(&self, store: &mut dyn KeyValueStore) -> Result<(), StoreError> {
        for (key, value) in self.entries() {
            store.put(key, value)?;
        }
        Ok(())
    }

    /// Set one setting from its store key and a text value.
    pub fn apply(&mut self, key: &str, value: &str) -> Result<(), ValidationError> {
        let invalid = |message: String| ValidationError::InvalidValue {
            field: key.to_string(),
            message,
        };
        let parse_bool = |v: &str| v.parse::<bool>().map_err(|e| invalid(e.to_string()));
        let parse_u32 = |v: &str| v.parse::<u32>().map_err(|e| invalid(e.to_string()));
        let parse_f64 = |v: &str| match v.parse::<f64>() {
            Ok(f) if f.is_finite() && f >= 0.0 => Ok(f),
            Ok(_) => Err(invalid("must be a non-negative number".into())),
            Err(e) => Err(invalid(e.to_string())),
        };
        let parse_angle = |v: &str| match v.parse::<u8>() {
            Ok(a) if a <= 180 => Ok(a),
            _ => Err(ValidationError::OutOfRange {
                field: key.to_string(),
                value: v.parse().unwrap_or(-1),
                min: 0,
                max: 180,
            }),
        };
        let parse_list = |v: &str| {
            serde_json::from_str::<Vec<String>>(v).map_err(|e| invalid(e.to_string()))
        };

        match key {
            keys::DAILY_LIMIT => self.daily_limit = parse_u32(value)?,
            keys::CURRENT_LANGUAGE => self.language = value.to_string(),
            keys::CURRENCY => self.cost.currency = value.to_string(),
            keys::PRODUCT_NAME => self.cost.product_name = value.to_string(),
            keys::USE_PACK_PRICE => self.cost.use_pack_price = parse_bool(value)?,
            keys::CIGARETTE_COST => self.cost.cigarette_cost = parse_f64(value)?,
            keys::PACK_COST => self.cost.pack_cost = parse_f64(value)?,
            keys::CIGARETTES_PER_PACK => {
                let n = parse_u32(value)?;
                if n == 0 {
                    return Err(invalid("must be at least 1".into()));
                }
                self.cost.cigarettes_per_pack = n;
            }
            keys::SERVO_LOCKED_POS => self.servo.locked_angle = parse_angle(value)?,
            keys::SERVO_UNLOCKED_POS => self.servo.unlocked_angle = parse_angle(value)?,
            keys::AI_ENABLED => self.ai.enabled = parse_bool(value)?,
            keys::AI_PROVIDER => self.ai.provider = value.parse()?,
            keys::AI_PERSONALITY => self.ai.personality = value.parse()?,
            keys::AI_DELAY_MINUTES => {
                self.ai.delay_minutes = parse_u32(value)?.min(MAX_TIMER_MINUTES)
            }
            keys::AI_API_KEY => self.ai.api_key = value.to_string(),
            keys::BLOCK_ON_PUBLIC => self.network.block_on_public = parse_bool(value)?,
            keys::ALLOWED_NETWORKS => self.network.allowed_networks = parse_list(value)?,
            keys::BLOCKED_NETWORKS => self.network.blocked_networks = parse_list(value)?,
            _ => return Err(invalid("not a device setting".into())),
        }
        Ok(())
    }
}

fn non_negative(v: i64) -> u32 {
    v.clamp(0, u32::MAX as i64) as u32
}

fn angle(v: i64) -> u8 {
    v.clamp(0, 180) as u8
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    #[test]
    fn empty_store_yields_defaults() {
        let store = MemoryStore::new();
        let settings = BoxSettings::load(&store);
        assert_eq!(settings, BoxSettings::default());
        assert_eq!(settings.servo.locked_angle, 0);
        assert_eq!(settings.servo.unlocked_angle, 90);
        assert_eq!(settings.ai.delay_minutes, 10);
        assert_eq!(settings.cost.currency, "EUR");
    }

    #[test]
    fn unit_cost_uses_pack_price_when_enabled() {
        let mut cost = CostSettings::default();
        assert_eq!(cost.unit_cost(), 0.50);
        cost.use_pack_price = true;
        cost.pack_cost = 8.0;
        cost.cigarettes_per_pack = 20;
        assert!((cost.unit_cost() - 0.40).abs() < 1e-9);
        assert!((cost.money_saved(10) - 4.0).abs() < 1e-9);
    }

    #[test]
    fn save_then_load_preserves_everything() {
        let mut store = MemoryStore::new();
        let mut settings = BoxSettings::default();
        settings.apply(keys::AI_PERSONALITY, "humorous").unwrap();
        settings.apply(keys::AI_PROVIDER, "openai").unwrap();
        settings.apply(keys::AI_API_KEY, "sk-1").unwrap();
        settings.apply(keys::ALLOWED_NETWORKS, r#"["Home"]"#).unwrap();
        settings.apply(keys::SERVO_UNLOCKED_POS, "120").unwrap();
        settings.apply(keys::PACK_COST, "9.5").unwrap();
        settings.save(&mut store).unwrap();

        assert_eq!(BoxSettings::load(&store), settings);
    }

    #[test]
    fn apply_rejects_bad_values() {
        let mut settings = BoxSettings::default();
        assert!(settings.apply(keys::SERVO_LOCKED_POS, "200").is_err());
        assert!(settings.apply(keys::CIGARETTES_PER_PACK, "0").is_err());
        assert!(settings.apply(keys::CIGARETTE_COST, "-1").is_err());
        assert!(settings.apply(keys::AI_PERSONALITY, "grumpy").is_err());
        assert!(settings.apply("timer_mode", "1").is_err());
        assert_eq!(settings, BoxSettings::default());
    }

    #[test]
    fn api_key_is_not_serialized() {
        let mut settings = BoxSettings::default();
        settings.ai.api_key = "secret".into();
        let json = serde_json::to_string(&settings).unwrap();
        assert!(!json.contains("secret"));
    }
}
