//! Captured browser session state and its on-disk store
//!
//! Snapshots use the Playwright `storageState` JSON shape (cookies plus
//! per-origin localStorage) so files written by earlier tooling load
//! unchanged. A `capturedAt` timestamp is added on save; files without
//! one are treated as stale and recaptured on the next run.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::error::Result;

/// Session state captured after a successful login
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSnapshot {
    #[serde(default)]
    pub cookies: Vec<SnapshotCookie>,

    #[serde(default)]
    pub origins: Vec<OriginState>,

    /// When the snapshot was captured. Absent in files written by other tools.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub captured_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotCookie {
    pub name: String,
    pub value: String,
    #[serde(default)]
    pub domain: String,
    #[serde(default = "default_cookie_path")]
    pub path: String,
    /// Unix seconds, -1 for session cookies
    #[serde(default = "default_cookie_expires")]
    pub expires: f64,
    #[serde(default)]
    pub http_only: bool,
    #[serde(default)]
    pub secure: bool,
    /// "Strict", "Lax" or "None"
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub same_site: Option<String>,
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn default_cookie_expires() -> f64 {
    -1.0
}

impl SnapshotCookie {
    /// Session cookies carry a negative expiry and never age out on disk
    pub fn is_session(&self) -> bool {
        self.expires < 0.0
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        !self.is_session() && self.expires <= now.timestamp() as f64
    }
}

/// localStorage contents for one origin
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OriginState {
    pub origin: String,
    #[serde(default)]
    pub local_storage: Vec<StorageItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageItem {
    pub name: String,
    pub value: String,
}

impl StorageSnapshot {
    /// Empty snapshot stamped with the current time, used for services
    /// without a login flow
    pub fn empty_now() -> Self {
        StorageSnapshot { cookies: Vec::new(), origins: Vec::new(), captured_at: Some(Utc::now()) }
    }

    pub fn is_empty(&self) -> bool {
        self.cookies.is_empty() && self.origins.is_empty()
    }

    /// Whether the snapshot should be recaptured instead of reused.
    ///
    /// Stale when the capture timestamp is missing or older than `max_age`,
    /// or when every persistent cookie has expired (a snapshot holding only
    /// localStorage or session cookies is governed by the age check alone).
    pub fn is_stale(&self, max_age: Duration, now: DateTime<Utc>) -> bool {
        match self.captured_at {
            None => return true,
            Some(at) if now - at > max_age => return true,
            Some(_) => {}
        }
        let persistent: Vec<_> = self.cookies.iter().filter(|c| !c.is_session()).collect();
        !persistent.is_empty() && persistent.iter().all(|c| c.is_expired(now))
    }
}

/// Directory of per-service snapshot files, one `<key>.json` each
#[derive(Debug, Clone)]
pub struct SnapshotStore {
    dir: PathBuf,
}

impl SnapshotStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        SnapshotStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }

    /// Load a snapshot. Missing or unreadable files are treated as absent
    /// so a damaged file heals itself through recapture.
    pub fn load(&self, key: &str) -> Result<Option<StorageSnapshot>> {
        let path = self.path_for(key);
        let raw = match fs::read_to_string(&path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                warn!("session {}: unreadable snapshot {}: {}", key, path.display(), e);
                return Ok(None);
            }
        };
        match serde_json::from_str(&raw) {
            Ok(snapshot) => Ok(Some(snapshot)),
            Err(e) => {
                warn!("session {}: corrupt snapshot {}: {}", key, path.display(), e);
                Ok(None)
            }
        }
    }

    /// Atomically write a snapshot, restricting permissions since cookie
    /// values are login-equivalent secrets.
    pub fn save(&self, key: &str, snapshot: &StorageSnapshot) -> Result<PathBuf> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);

        let mut tmp = tempfile::NamedTempFile::new_in(&self.dir)?;
        serde_json::to_writer_pretty(&mut tmp, snapshot)?;
        tmp.write_all(b"\n")?;

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            tmp.as_file().set_permissions(fs::Permissions::from_mode(0o600))?;
        }

        tmp.persist(&path).map_err(|e| e.error)?;
        Ok(path)
    }

    /// Remove a snapshot. Returns whether a file was deleted.
    pub fn invalidate(&self, key: &str) -> Result<bool> {
        match fs::remove_file(self.path_for(key)) {
            Ok(()) => Ok(true),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    fn cookie(name: &str, expires: f64) -> SnapshotCookie {
        SnapshotCookie {
            name: name.to_string(),
            value: "v".to_string(),
            domain: "svc.example.net".to_string(),
            path: "/".to_string(),
            expires,
            http_only: true,
            secure: true,
            same_site: Some("Lax".to_string()),
        }
    }

    fn snapshot_at(age_hours: i64, cookies: Vec<SnapshotCookie>) -> StorageSnapshot {
        StorageSnapshot {
            cookies,
            origins: vec![],
            captured_at: Some(Utc::now() - Duration::hours(age_hours)),
        }
    }

    #[test]
    fn test_save_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        let mut snap = StorageSnapshot::empty_now();
        snap.cookies.push(cookie("JSESSIONID", -1.0));
        snap.origins.push(OriginState {
            origin: "https://jellyfin.example.net".to_string(),
            local_storage: vec![StorageItem {
                name: "jellyfin_credentials".to_string(),
                value: "{\"Servers\":[]}".to_string(),
            }],
        });

        let path = store.save("jellyfin", &snap).unwrap();
        assert_eq!(path, store.path_for("jellyfin"));

        let raw = std::fs::read_to_string(&path).unwrap();
        assert!(raw.contains("\"httpOnly\""));
        assert!(raw.contains("\"localStorage\""));
        assert!(raw.contains("\"capturedAt\""));

        let loaded = store.load("jellyfin").unwrap().unwrap();
        assert_eq!(loaded.cookies.len(), 1);
        assert_eq!(loaded.origins[0].local_storage[0].name, "jellyfin_credentials");
        assert!(loaded.captured_at.is_some());
    }

    #[test]
    fn test_loads_playwright_storage_state() {
        // file written by other tooling: no capturedAt, camelCase fields
        let raw = r#"{
            "cookies": [{
                "name": "grafana_session",
                "value": "abc123",
                "domain": "grafana.example.net",
                "path": "/",
                "expires": -1,
                "httpOnly": true,
                "secure": true,
                "sameSite": "Lax"
            }],
            "origins": [{
                "origin": "https://grafana.example.net",
                "localStorage": [{"name": "grafana.theme", "value": "dark"}]
            }]
        }"#;

        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        std::fs::write(store.path_for("grafana"), raw).unwrap();

        let snap = store.load("grafana").unwrap().unwrap();
        assert!(snap.cookies[0].http_only);
        assert_eq!(snap.origins[0].local_storage[0].value, "dark");
        assert!(snap.captured_at.is_none());
        // no timestamp means we cannot trust it
        assert!(snap.is_stale(Duration::hours(12), Utc::now()));
    }

    #[test]
    fn test_missing_and_corrupt_are_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        assert!(store.load("sonarr").unwrap().is_none());

        std::fs::write(store.path_for("sonarr"), "not json {").unwrap();
        assert!(store.load("sonarr").unwrap().is_none());
    }

    #[test]
    fn test_invalidate() {
        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());

        assert!(!store.invalidate("radarr").unwrap());
        store.save("radarr", &StorageSnapshot::empty_now()).unwrap();
        assert!(store.invalidate("radarr").unwrap());
        assert!(store.load("radarr").unwrap().is_none());
    }

    #[test_case(1, false ; "fresh capture is reusable")]
    #[test_case(13, true ; "older than max age is stale")]
    fn test_staleness_by_age(age_hours: i64, stale: bool) {
        let snap = snapshot_at(age_hours, vec![cookie("sid", -1.0)]);
        assert_eq!(snap.is_stale(Duration::hours(12), Utc::now()), stale);
    }

    #[test]
    fn test_expired_persistent_cookies_are_stale() {
        let past = (Utc::now() - Duration::hours(2)).timestamp() as f64;
        let future = (Utc::now() + Duration::hours(2)).timestamp() as f64;

        let snap = snapshot_at(1, vec![cookie("auth", past)]);
        assert!(snap.is_stale(Duration::hours(12), Utc::now()));

        let snap = snapshot_at(1, vec![cookie("auth", past), cookie("auth2", future)]);
        assert!(!snap.is_stale(Duration::hours(12), Utc::now()));

        // session cookies alone never age out before the capture window does
        let snap = snapshot_at(1, vec![cookie("sid", -1.0)]);
        assert!(!snap.is_stale(Duration::hours(12), Utc::now()));
    }

    #[test]
    fn test_empty_snapshot_freshness_is_age_based() {
        let snap = StorageSnapshot::empty_now();
        assert!(snap.is_empty());
        assert!(!snap.is_stale(Duration::hours(12), Utc::now()));
    }

    #[cfg(unix)]
    #[test]
    fn test_snapshot_file_permissions() {
        use std::os::unix::fs::PermissionsExt;

        let dir = tempfile::tempdir().unwrap();
        let store = SnapshotStore::new(dir.path());
        let path = store.save("immich", &StorageSnapshot::empty_now()).unwrap();

        let mode = std::fs::metadata(path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
