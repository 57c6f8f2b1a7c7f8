use std::env;
use std::path::PathBuf;
use std::time::Duration;

const DEFAULT_BIND: &str = "127.0.0.1:3000";
const DEFAULT_DATA_DIR: &str = "database";
const DEFAULT_SESSION_HOURS: u64 = 24;
/// Longest session lifetime accepted, one year
pub const MAX_SESSION_HOURS: u64 = 24 * 366;
const DEFAULT_STORAGE_LOCATION: &str = "HO - Ciputat";
const DEFAULT_STORAGE_ROOM: &str = "1022 - Gudang Support TOG";

const USERS_FILE: &str = "users.json";
const STORE_FILE: &str = "store.bin.gz";

/// Runtime configuration for the asset tracker.
///
/// Every field has a default; `from_env` overrides them from
/// `ASSET_TRACKER_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP server listens on
    pub bind_addr: String,

    /// Directory holding `users.json` and the store snapshot
    pub data_dir: PathBuf,

    /// Lifetime of a login session in hours
    pub session_hours: u64,

    /// Location an asset is parked at when a repair "store" request is approved
    pub storage_location: String,

    /// Room within `storage_location`
    pub storage_room: String,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: DEFAULT_BIND.to_string(),
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            session_hours: DEFAULT_SESSION_HOURS,
            storage_location: DEFAULT_STORAGE_LOCATION.to_string(),
            storage_room: DEFAULT_STORAGE_ROOM.to_string(),
        }
    }
}

impl Config {
    /// Build a configuration from the process environment.
    ///
    /// Unset variables fall back to the defaults; an unparsable
    /// `ASSET_TRACKER_SESSION_HOURS` is logged and ignored.
    pub fn from_env() -> Self {
        let mut config = Config::default();

        if let Ok(bind) = env::var("ASSET_TRACKER_BIND") {
            config.bind_addr = bind;
        }
        if let Ok(dir) = env::var("ASSET_TRACKER_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Ok(hours) = env::var("ASSET_TRACKER_SESSION_HOURS") {
            match hours.parse::<u64>() {
                Ok(h) if h > 0 && h <= MAX_SESSION_HOURS => config.session_hours = h,
                _ => log::warn!(
                    "ignoring invalid ASSET_TRACKER_SESSION_HOURS={:?}, using {}",
                    hours,
                    config.session_hours
                ),
            }
        }
        if let Ok(location) = env::var("ASSET_TRACKER_STORAGE_LOCATION") {
            config.storage_location = location;
        }
        if let Ok(room) = env::var("ASSET_TRACKER_STORAGE_ROOM") {
            config.storage_room = room;
        }

        config
    }

    /// A configuration rooted at `data_dir`, everything else default.
    pub fn with_data_dir(data_dir: impl Into<PathBuf>) -> Self {
        Config {
            data_dir: data_dir.into(),
            ..Config::default()
        }
    }

    pub fn users_path(&self) -> PathBuf {
        self.data_dir.join(USERS_FILE)
    }

    pub fn store_path(&self) -> PathBuf {
        self.data_dir.join(STORE_FILE)
    }

    pub fn session_ttl(&self) -> Duration {
        Duration::from_secs(self.session_hours.min(MAX_SESSION_HOURS) * 60 * 60)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn paths_live_under_the_data_dir() {
        let config = Config::with_data_dir("/tmp/assets");
        assert_eq!(config.users_path(), PathBuf::from("/tmp/assets/users.json"));
        assert_eq!(config.store_path(), PathBuf::from("/tmp/assets/store.bin.gz"));
    }

    #[test]
    fn default_session_lasts_a_day() {
        assert_eq!(Config::default().session_ttl(), Duration::from_secs(86_400));
    }

    #[test]
    fn oversized_session_hours_are_capped() {
        let config = Config {
            session_hours: 6_000_000_000_000_000,
            ..Config::default()
        };
        assert_eq!(
            config.session_ttl(),
            Duration::from_secs(MAX_SESSION_HOURS * 60 * 60)
        );
    }
}
