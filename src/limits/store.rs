use anyhow::{Context, Result};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use crate::limits::clock::Clock;
use crate::limits::crypto::Sealer;
use crate::limits::package::{PackageId, UNSET_LIMIT};
use crate::platform::common::atomic_write;

/// Current preference file version
const PREFERENCES_VERSION: &str = "1.0";

/// Durable key-value persistence shared by the monitor and the presentation side
///
/// Every write is visible to the next read from either side; nothing is buffered.
pub trait PreferenceStore: Send + Sync {
    fn load_restricted_apps(&self) -> Result<BTreeSet<PackageId>>;

    fn save_restricted_apps(&self, apps: &BTreeSet<PackageId>) -> Result<()>;

    /// Daily limit in minutes, or [`UNSET_LIMIT`]
    fn load_limit(&self, package: &PackageId) -> Result<i64>;

    fn save_limit(&self, package: &PackageId, minutes: i64) -> Result<()>;

    /// `None` when no passcode (or an empty one) is configured
    fn load_passcode(&self) -> Result<Option<String>>;

    fn save_passcode(&self, passcode: &str) -> Result<()>;

    /// Exempt `package` from enforcement for the next `minutes`
    fn set_temporary_unblock(&self, package: &PackageId, minutes: u32) -> Result<()>;

    fn is_temporarily_unblocked(&self, package: &PackageId) -> Result<bool>;

    fn clear_temporary_unblock(&self, package: &PackageId) -> Result<()>;
}

/// Everything the store persists
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Preferences {
    pub version: String,

    #[serde(default)]
    pub restricted_apps: BTreeSet<PackageId>,

    #[serde(default)]
    pub limits: BTreeMap<PackageId, i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub passcode: Option<String>,

    /// Temporary unblock expiry per package
    #[serde(default)]
    pub unblocked_until: BTreeMap<PackageId, DateTime<Utc>>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            version: PREFERENCES_VERSION.to_string(),
            restricted_apps: BTreeSet::new(),
            limits: BTreeMap::new(),
            passcode: None,
            unblocked_until: BTreeMap::new(),
        }
    }
}

enum Backend {
    Memory(Preferences),
    File {
        path: PathBuf,
        sealer: Option<Sealer>,
    },
}

impl Backend {
    /// File-backed stores re-read on every access so writes from another
    /// process (the CLI while the monitor runs) are picked up immediately
    fn load(&self) -> Result<Preferences> {
        match self {
            Backend::Memory(prefs) => Ok(prefs.clone()),
            Backend::File { path, sealer } => load_preferences(path, sealer.as_ref()),
        }
    }

    fn save(&mut self, prefs: Preferences) -> Result<()> {
        match self {
            Backend::Memory(current) => {
                *current = prefs;
                Ok(())
            }
            Backend::File { path, sealer } => save_preferences(path, sealer.as_ref(), &prefs),
        }
    }
}

/// Preference store backed by memory or by a (optionally encrypted) file
pub struct LocalStore {
    backend: Mutex<Backend>,
    clock: Arc<dyn Clock>,
}

impl LocalStore {
    pub fn in_memory(clock: Arc<dyn Clock>) -> Self {
        Self {
            backend: Mutex::new(Backend::Memory(Preferences::default())),
            clock,
        }
    }

    /// Open a file-backed store; `sealer` enables encryption at rest
    pub fn open(
        path: impl Into<PathBuf>,
        sealer: Option<Sealer>,
        clock: Arc<dyn Clock>,
    ) -> Result<Self> {
        let path = path.into();

        // Fail early on an unreadable file or a wrong key
        load_preferences(&path, sealer.as_ref())?;

        Ok(Self {
            backend: Mutex::new(Backend::File { path, sealer }),
            clock,
        })
    }

    /// Snapshot of everything stored
    pub fn preferences(&self) -> Result<Preferences> {
        self.read(Preferences::clone)
    }

    fn read<T>(&self, f: impl FnOnce(&Preferences) -> T) -> Result<T> {
        let backend = self.backend.lock().unwrap_or_else(PoisonError::into_inner);
        let prefs = backend.load()?;
        Ok(f(&prefs))
    }

    fn update(&self, f: impl FnOnce(&mut Preferences)) -> Result<()> {
        let mut backend = self.backend.lock().unwrap_or_else(PoisonError::into_inner);
        let mut prefs = backend.load()?;
        f(&mut prefs);
        backend.save(prefs)
    }
}

impl PreferenceStore for LocalStore {
    fn load_restricted_apps(&self) -> Result<BTreeSet<PackageId>> {
        self.read(|prefs| prefs.restricted_apps.clone())
    }

    fn save_restricted_apps(&self, apps: &BTreeSet<PackageId>) -> Result<()> {
        self.update(|prefs| prefs.restricted_apps = apps.clone())
    }

    fn load_limit(&self, package: &PackageId) -> Result<i64> {
        self.read(|prefs| prefs.limits.get(package).copied().unwrap_or(UNSET_LIMIT))
    }

    fn save_limit(&self, package: &PackageId, minutes: i64) -> Result<()> {
        self.update(|prefs| {
            if minutes < 0 {
                prefs.limits.remove(package);
            } else {
                prefs.limits.insert(package.clone(), minutes);
            }
        })
    }

    fn load_passcode(&self) -> Result<Option<String>> {
        self.read(|prefs| prefs.passcode.clone().filter(|code| !code.is_empty()))
    }

    fn save_passcode(&self, passcode: &str) -> Result<()> {
        self.update(|prefs| prefs.passcode = Some(passcode.to_string()))
    }

    fn set_temporary_unblock(&self, package: &PackageId, minutes: u32) -> Result<()> {
        let until = self.clock.now() + Duration::minutes(i64::from(minutes));
        self.update(|prefs| {
            prefs.unblocked_until.insert(package.clone(), until);
        })
    }

    fn is_temporarily_unblocked(&self, package: &PackageId) -> Result<bool> {
        let now = self.clock.now();
        self.read(|prefs| {
            prefs
                .unblocked_until
                .get(package)
                .is_some_and(|until| now < *until)
        })
    }

    fn clear_temporary_unblock(&self, package: &PackageId) -> Result<()> {
        self.update(|prefs| {
            prefs.unblocked_until.remove(package);
        })
    }
}

/// Load preferences from file, returning defaults if it doesn't exist yet
fn load_preferences(path: &Path, sealer: Option<&Sealer>) -> Result<Preferences> {
    if !path.exists() {
        return Ok(Preferences::default());
    }

    let raw = std::fs::read(path)
        .with_context(|| format!("Failed to read preferences: {}", path.display()))?;

    let content = match sealer {
        Some(sealer) => sealer
            .open(&raw)
            .with_context(|| format!("Failed to decrypt preferences: {}", path.display()))?,
        None => raw,
    };

    let prefs: Preferences = serde_json::from_slice(&content)
        .with_context(|| format!("Failed to parse preferences: {}", path.display()))?;

    if prefs.version != PREFERENCES_VERSION {
        anyhow::bail!(
            "Unsupported preferences version {} in {} (expected {})",
            prefs.version,
            path.display(),
            PREFERENCES_VERSION
        );
    }

    Ok(prefs)
}

/// Save preferences to file
fn save_preferences(path: &Path, sealer: Option<&Sealer>, prefs: &Preferences) -> Result<()> {
    let content = serde_json::to_vec_pretty(prefs)
        .context("Failed to serialize preferences")?;

    let bytes = match sealer {
        Some(sealer) => sealer.seal(&content)?,
        None => content,
    };

    atomic_write(path, &bytes)
        .with_context(|| format!("Failed to write preferences: {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::limits::clock::ManualClock;
    use crate::limits::crypto::KEY_LEN;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn make_clock() -> Arc<ManualClock> {
        Arc::new(ManualClock::new(
            Utc.with_ymd_and_hms(2025, 11, 16, 12, 0, 0).unwrap(),
        ))
    }

    fn pkg(id: &str) -> PackageId {
        PackageId::from(id)
    }

    #[test]
    fn test_limit_round_trip() {
        let store = LocalStore::in_memory(make_clock());
        let app = pkg("com.example.a");

        assert_eq!(store.load_limit(&app).unwrap(), UNSET_LIMIT);

        store.save_limit(&app, 45).unwrap();
        assert_eq!(store.load_limit(&app).unwrap(), 45);

        store.save_limit(&app, UNSET_LIMIT).unwrap();
        assert_eq!(store.load_limit(&app).unwrap(), UNSET_LIMIT);
    }

    #[test]
    fn test_restricted_apps_round_trip() {
        let store = LocalStore::in_memory(make_clock());
        let apps: BTreeSet<_> = [pkg("com.example.a"), pkg("com.example.b")].into();

        store.save_restricted_apps(&apps).unwrap();
        assert_eq!(store.load_restricted_apps().unwrap(), apps);
    }

    #[test]
    fn test_empty_passcode_reads_as_unset() {
        let store = LocalStore::in_memory(make_clock());
        assert_eq!(store.load_passcode().unwrap(), None);

        store.save_passcode("").unwrap();
        assert_eq!(store.load_passcode().unwrap(), None);

        store.save_passcode("1234").unwrap();
        assert_eq!(store.load_passcode().unwrap(), Some("1234".to_string()));
    }

    #[test]
    fn test_temporary_unblock_expires() {
        let clock = make_clock();
        let store = LocalStore::in_memory(clock.clone());
        let app = pkg("com.example.a");

        assert!(!store.is_temporarily_unblocked(&app).unwrap());

        store.set_temporary_unblock(&app, 1).unwrap();
        assert!(store.is_temporarily_unblocked(&app).unwrap());

        clock.advance(Duration::seconds(59));
        assert!(store.is_temporarily_unblocked(&app).unwrap());

        clock.advance(Duration::seconds(1));
        assert!(!store.is_temporarily_unblocked(&app).unwrap());
    }

    #[test]
    fn test_zero_minute_unblock_is_never_active() {
        let store = LocalStore::in_memory(make_clock());
        let app = pkg("com.example.a");

        store.set_temporary_unblock(&app, 0).unwrap();
        assert!(!store.is_temporarily_unblocked(&app).unwrap());
    }

    #[test]
    fn test_clear_temporary_unblock() {
        let store = LocalStore::in_memory(make_clock());
        let app = pkg("com.example.a");

        store.set_temporary_unblock(&app, 15).unwrap();
        store.clear_temporary_unblock(&app).unwrap();
        assert!(!store.is_temporarily_unblocked(&app).unwrap());
    }

    #[test]
    fn test_file_store_sees_writes_from_another_handle() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("preferences.json");
        let clock = make_clock();

        let monitor_side = LocalStore::open(&path, None, clock.clone()).unwrap();
        let cli_side = LocalStore::open(&path, None, clock).unwrap();

        cli_side.save_limit(&pkg("com.example.a"), 30).unwrap();
        assert_eq!(monitor_side.load_limit(&pkg("com.example.a")).unwrap(), 30);
    }

    #[test]
    fn test_encrypted_store_round_trip() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("preferences.bin");
        let clock = make_clock();

        let sealer = || Some(Sealer::from_key(&[9u8; KEY_LEN]));

        let store = LocalStore::open(&path, sealer(), clock.clone()).unwrap();
        store.save_passcode("4321").unwrap();

        let raw = std::fs::read(&path).unwrap();
        assert!(serde_json::from_slice::<Preferences>(&raw).is_err());

        let reopened = LocalStore::open(&path, sealer(), clock.clone()).unwrap();
        assert_eq!(reopened.load_passcode().unwrap(), Some("4321".to_string()));

        assert!(LocalStore::open(&path, Some(Sealer::from_key(&[8u8; KEY_LEN])), clock).is_err());
    }

    #[test]
    fn test_open_rejects_unknown_version() {
        let temp_dir = tempdir().unwrap();
        let path = temp_dir.path().join("preferences.json");
        std::fs::write(&path, r#"{"version":"9.9"}"#).unwrap();

        assert!(LocalStore::open(&path, None, make_clock()).is_err());
    }
}
