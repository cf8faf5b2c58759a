//! Tests for session resolution and DST-aware session windows.

#[cfg(test)]
mod tests {
    use crate::bars::AssetProfile;
    use crate::errors::{ConfigurationError, Error};
    use crate::memory::InMemoryStore;
    use crate::sessions::{SessionDefinition, SessionKey, SessionService, SessionServiceTrait};
    use chrono::{FixedOffset, NaiveDate, NaiveTime, TimeZone, Utc};
    use std::sync::Arc;

    async fn seeded_service() -> SessionService {
        let service = SessionService::new(Arc::new(InMemoryStore::new()));
        service.seed_defaults().await.unwrap();
        service
    }

    fn nyse() -> SessionKey {
        SessionKey::new("equity", "US", "NYSE", "default", "*", "regular")
    }

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[tokio::test]
    async fn test_new_york_windows_shift_across_dst() {
        let service = seeded_service().await;
        // US DST starts Sunday 2024-03-10.
        let windows = service
            .get_session_windows(&nyse(), date(2024, 3, 8), date(2024, 3, 11))
            .unwrap();

        // Weekend dates are skipped for the equity session.
        assert_eq!(windows.len(), 2);
        let friday = &windows[0];
        let monday = &windows[1];
        assert_eq!(friday.date, date(2024, 3, 8));
        assert_eq!(monday.date, date(2024, 3, 11));

        // 09:30 local stays 09:30 local; the UTC instant moves by an hour.
        assert_eq!(friday.open_utc, Utc.with_ymd_and_hms(2024, 3, 8, 14, 30, 0).unwrap());
        assert_eq!(monday.open_utc, Utc.with_ymd_and_hms(2024, 3, 11, 13, 30, 0).unwrap());

        let est = FixedOffset::west_opt(5 * 3600).unwrap();
        let edt = FixedOffset::west_opt(4 * 3600).unwrap();
        assert_eq!(
            friday.open_utc.with_timezone(&est).time(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
        assert_eq!(
            monday.open_utc.with_timezone(&edt).time(),
            NaiveTime::from_hms_opt(9, 30, 0).unwrap()
        );
        assert_eq!(monday.close_utc, Utc.with_ymd_and_hms(2024, 3, 11, 20, 0, 0).unwrap());
    }

    #[tokio::test]
    async fn test_crypto_session_is_24h_every_day() {
        let service = seeded_service().await;
        let key = SessionKey::new("crypto", "GLOBAL", "ANY", "default", "*", "regular");
        let windows = service
            .get_session_windows(&key, date(2024, 3, 8), date(2024, 3, 11))
            .unwrap();
        assert_eq!(windows.len(), 4);
        for window in windows {
            assert_eq!((window.close_utc - window.open_utc).num_hours(), 24);
        }
    }

    #[tokio::test]
    async fn test_unknown_session_is_not_silently_defaulted() {
        let service = seeded_service().await;
        let key = SessionKey::new("equity", "BR", "B3", "default", "*", "regular");
        let err = service
            .get_session_windows(&key, date(2024, 1, 1), date(2024, 1, 2))
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::UnknownSession(_))
        ));
    }

    #[tokio::test]
    async fn test_resolve_prefers_asset_specific_session() {
        let service = seeded_service().await;
        let profile = AssetProfile {
            asset_id: "SPY".to_string(),
            asset_class: "equity".to_string(),
            region: "US".to_string(),
            venue: "NYSE".to_string(),
            asset_key_type: "symbol".to_string(),
            asset_key: "SPY".to_string(),
        };

        // Falls back to the venue default first.
        let resolved = service.resolve_session(&profile, "regular").unwrap();
        assert!(resolved.key.is_venue_default());

        // An extended-hours override discovered later wins.
        let specific = SessionDefinition {
            key: profile.session_key("regular"),
            timezone: "America/New_York".to_string(),
            open_local: NaiveTime::from_hms_opt(4, 0, 0).unwrap(),
            close_local: NaiveTime::from_hms_opt(20, 0, 0).unwrap(),
            is_24h: false,
            weekdays_only: true,
        };
        service.register_session(specific.clone()).await.unwrap();
        assert_eq!(service.resolve_session(&profile, "regular").unwrap(), specific);
    }

    #[tokio::test]
    async fn test_register_rejects_fixed_offset_timezone() {
        let service = seeded_service().await;
        let definition = SessionDefinition {
            key: SessionKey::new("equity", "IN", "NSE", "default", "*", "regular"),
            timezone: "+05:30".to_string(),
            open_local: NaiveTime::from_hms_opt(9, 15, 0).unwrap(),
            close_local: NaiveTime::from_hms_opt(15, 30, 0).unwrap(),
            is_24h: false,
            weekdays_only: true,
        };
        let err = service.register_session(definition).await.unwrap_err();
        assert!(matches!(
            err,
            Error::Configuration(ConfigurationError::InvalidTimezone(..))
        ));
    }

    #[tokio::test]
    async fn test_overnight_session_closes_next_day() {
        let service = seeded_service().await;
        let key = SessionKey::new("futures", "US", "CME", "default", "*", "regular");
        let windows = service
            .get_session_windows(&key, date(2024, 3, 12), date(2024, 3, 12))
            .unwrap();
        assert_eq!(windows.len(), 1);
        assert_eq!((windows[0].close_utc - windows[0].open_utc).num_hours(), 23);
    }
}
