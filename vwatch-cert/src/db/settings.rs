//! Settings database access
//!
//! Read/write settings from the settings table (key-value store).
//! Every loader clamps to a valid range and falls back to the default when
//! the key is missing.

use crate::certification::CertificationPolicy;
use crate::config::EngineSettings;
use crate::error::{Error, Result};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;

/// Load the certification thresholds
pub async fn load_certification_policy(db: &Pool<Sqlite>) -> Result<CertificationPolicy> {
    let defaults = CertificationPolicy::default();

    let threshold = get_setting::<u32>(db, "long_form_threshold_seconds")
        .await?
        .unwrap_or(defaults.long_form_threshold_seconds)
        .clamp(1, 86_400);
    let ratio = get_setting::<f64>(db, "long_form_ratio")
        .await?
        .unwrap_or(defaults.long_form_ratio)
        .clamp(0.1, 1.0);
    let absolute = get_setting::<u32>(db, "long_form_absolute_seconds")
        .await?
        .unwrap_or(defaults.long_form_absolute_seconds)
        .clamp(1, 86_400);

    Ok(CertificationPolicy {
        long_form_threshold_seconds: threshold,
        long_form_ratio: ratio,
        long_form_absolute_seconds: absolute,
    })
}

/// Load countdown length in seconds (default: 5, range 1-60)
pub async fn load_countdown_seconds(db: &Pool<Sqlite>) -> Result<u32> {
    Ok(get_setting::<u32>(db, "countdown_seconds")
        .await?
        .unwrap_or(5)
        .clamp(1, 60))
}

/// Load rewatch cooldown in milliseconds (default: 1 hour, max 7 days)
pub async fn load_rewatch_cooldown_ms(db: &Pool<Sqlite>) -> Result<i64> {
    Ok(get_setting::<i64>(db, "rewatch_cooldown_ms")
        .await?
        .unwrap_or(3_600_000)
        .clamp(0, 7 * 24 * 3_600_000))
}

/// Load client refresh interval for locked videos (never below 30s)
pub async fn load_rewatch_refresh_interval(db: &Pool<Sqlite>) -> Result<u64> {
    Ok(get_setting::<u64>(db, "rewatch_refresh_interval_secs")
        .await?
        .unwrap_or(30)
        .clamp(30, 3600))
}

/// Load the linear cost curve parameter (seconds of video per token)
pub async fn load_seconds_per_token(db: &Pool<Sqlite>) -> Result<f64> {
    Ok(get_setting::<f64>(db, "seconds_per_token")
        .await?
        .unwrap_or(600.0)
        .clamp(1.0, 1_000_000.0))
}

/// Load id-list batch size for stats lookups (store maximum is 10)
pub async fn load_stats_batch_size(db: &Pool<Sqlite>) -> Result<usize> {
    Ok(get_setting::<usize>(db, "stats_batch_size")
        .await?
        .unwrap_or(10)
        .clamp(1, 10))
}

/// Load event bus capacity (default: 100)
pub async fn load_event_bus_capacity(db: &Pool<Sqlite>) -> Result<usize> {
    Ok(get_setting::<usize>(db, "event_bus_capacity")
        .await?
        .unwrap_or(100)
        .clamp(10, 10_000))
}

/// Load every engine setting concurrently
pub async fn load_engine_settings(db: &Pool<Sqlite>) -> Result<EngineSettings> {
    let (policy, countdown, cooldown, refresh, per_token, batch, capacity) = tokio::join!(
        load_certification_policy(db),
        load_countdown_seconds(db),
        load_rewatch_cooldown_ms(db),
        load_rewatch_refresh_interval(db),
        load_seconds_per_token(db),
        load_stats_batch_size(db),
        load_event_bus_capacity(db),
    );

    Ok(EngineSettings {
        policy: policy?,
        countdown_seconds: countdown?,
        rewatch_cooldown_ms: cooldown?,
        rewatch_refresh_interval_secs: refresh?,
        seconds_per_token: per_token?,
        stats_batch_size: batch?,
        event_bus_capacity: capacity?,
    })
}

/// Generic setting getter
///
/// Returns `None` when the key is absent or NULL.
pub async fn get_setting<T: FromStr>(db: &Pool<Sqlite>, key: &str) -> Result<Option<T>> {
    let value: Option<Option<String>> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(db)
        .await?;

    match value.flatten() {
        Some(s) => match s.trim().parse::<T>() {
            Ok(parsed) => Ok(Some(parsed)),
            Err(_) => Err(Error::Config(format!(
                "Failed to parse setting '{}' value: {}",
                key, s
            ))),
        },
        None => Ok(None),
    }
}

/// Generic setting setter
///
/// Inserts or updates setting in database.
pub async fn set_setting<T: ToString>(db: &Pool<Sqlite>, key: &str, value: T) -> Result<()> {
    let value_str = value.to_string();

    sqlx::query(
        r#"
        INSERT INTO settings (key, value)
        VALUES (?, ?)
        ON CONFLICT(key) DO UPDATE SET value = excluded.value
        "#,
    )
    .bind(key)
    .bind(value_str)
    .execute(db)
    .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::sqlite::SqlitePoolOptions;

    async fn setup_test_db() -> Pool<Sqlite> {
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect("sqlite::memory:")
            .await
            .unwrap();

        vwatch_common::db::create_settings_table(&pool).await.unwrap();
        pool
    }

    #[tokio::test]
    async fn test_missing_settings_use_defaults() {
        let db = setup_test_db().await;
        let settings = load_engine_settings(&db).await.unwrap();
        assert_eq!(settings, EngineSettings::default());
    }

    #[tokio::test]
    async fn test_set_and_get_setting() {
        let db = setup_test_db().await;
        set_setting(&db, "countdown_seconds", 8).await.unwrap();
        assert_eq!(get_setting::<u32>(&db, "countdown_seconds").await.unwrap(), Some(8));
        assert_eq!(load_countdown_seconds(&db).await.unwrap(), 8);
    }

    #[tokio::test]
    async fn test_values_are_clamped() {
        let db = setup_test_db().await;
        set_setting(&db, "countdown_seconds", 500).await.unwrap();
        set_setting(&db, "rewatch_refresh_interval_secs", 5).await.unwrap();
        set_setting(&db, "stats_batch_size", 50).await.unwrap();
        set_setting(&db, "long_form_ratio", 3.0).await.unwrap();

        let settings = load_engine_settings(&db).await.unwrap();
        assert_eq!(settings.countdown_seconds, 60);
        assert_eq!(settings.rewatch_refresh_interval_secs, 30);
        assert_eq!(settings.stats_batch_size, 10);
        assert_eq!(settings.policy.long_form_ratio, 1.0);
    }

    #[tokio::test]
    async fn test_unparseable_setting_is_config_error() {
        let db = setup_test_db().await;
        set_setting(&db, "seconds_per_token", "lots").await.unwrap();
        let result = load_seconds_per_token(&db).await;
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
