use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Key type tag. Persisted as the legacy wire strings `"standard"` and
/// `"global_<days>"` so existing datasets keep loading.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    /// Bound to a single device on first successful validation.
    Standard,
    /// Exempt from device binding; usable from any number of devices.
    Global { days: u32 },
}

impl KeyType {
    pub fn is_global(&self) -> bool {
        matches!(self, KeyType::Global { .. })
    }

    fn as_wire(&self) -> String {
        match self {
            KeyType::Standard => "standard".to_owned(),
            KeyType::Global { days } => format!("global_{days}"),
        }
    }

    fn from_wire(s: &str) -> Self {
        match s.strip_prefix("global_") {
            Some(rest) => KeyType::Global {
                days: rest.parse().unwrap_or(0),
            },
            None => KeyType::Standard,
        }
    }
}

impl Serialize for KeyType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.as_wire())
    }
}

impl<'de> Deserialize<'de> for KeyType {
    fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Ok(KeyType::from_wire(&s))
    }
}

/// Active/disabled flag. Records persisted without a `status` member read
/// back as `Active`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KeyStatus {
    #[default]
    Active,
    Disabled,
}

/// One issued license key. The token is immutable once minted; `hwid` is
/// assigned at most once (first successful validation) and never for
/// global keys.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LicenseRecord {
    pub key: String,
    pub expiry_date: DateTime<Utc>,
    #[serde(rename = "type")]
    pub key_type: KeyType,
    #[serde(default)]
    pub hwid: Option<String>,
    #[serde(default)]
    pub status: KeyStatus,
}

impl LicenseRecord {
    /// Expired strictly after the expiry instant.
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expiry_date
    }

    pub fn is_active(&self) -> bool {
        self.status == KeyStatus::Active
    }
}

/// Feature flags controlled from the admin panel. Missing members of old
/// documents default to enabled.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_true")]
    pub server_enabled: bool,
    #[serde(default = "default_true")]
    pub key_validation_enabled: bool,
    #[serde(default = "default_true")]
    pub key_creation_enabled: bool,
}

fn default_true() -> bool {
    true
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            server_enabled: true,
            key_validation_enabled: true,
            key_creation_enabled: true,
        }
    }
}

/// Named handle for one settings flag, decoded once from inbound toggle
/// callbacks and matched exhaustively.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flag {
    Server,
    Validation,
    Creation,
}

impl Flag {
    pub fn label(&self) -> &'static str {
        match self {
            Flag::Server => "Server",
            Flag::Validation => "Validation",
            Flag::Creation => "Creation",
        }
    }
}

/// The whole persisted document: every mutation is read-whole,
/// modify-in-memory, write-whole.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Dataset {
    #[serde(default)]
    pub licenses: Vec<LicenseRecord>,
    #[serde(default)]
    pub settings: Settings,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn make_record(key_type: KeyType) -> LicenseRecord {
        LicenseRecord {
            key: "AAAA-BBBB-CCCC-DDDD".into(),
            expiry_date: Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap(),
            key_type,
            hwid: None,
            status: KeyStatus::Active,
        }
    }

    #[test]
    fn expiry_is_strictly_after() {
        let r = make_record(KeyType::Standard);
        assert!(!r.is_expired(r.expiry_date));
        assert!(r.is_expired(r.expiry_date + chrono::Duration::seconds(1)));
        assert!(!r.is_expired(r.expiry_date - chrono::Duration::seconds(1)));
    }

    #[test]
    fn key_type_round_trips_legacy_wire_strings() {
        let json = serde_json::to_string(&KeyType::Global { days: 30 }).unwrap();
        assert_eq!(json, "\"global_30\"");
        let back: KeyType = serde_json::from_str("\"global_7\"").unwrap();
        assert_eq!(back, KeyType::Global { days: 7 });
        let std: KeyType = serde_json::from_str("\"standard\"").unwrap();
        assert_eq!(std, KeyType::Standard);
        assert!(!std.is_global());
    }

    #[test]
    fn record_without_status_or_hwid_reads_as_active_unbound() {
        let json = r#"{
            "key": "1111-2222-3333-4444",
            "expiry_date": "2026-06-01T00:00:00Z",
            "type": "standard"
        }"#;
        let r: LicenseRecord = serde_json::from_str(json).unwrap();
        assert!(r.is_active());
        assert!(r.hwid.is_none());
    }

    #[test]
    fn missing_settings_members_default_to_enabled() {
        let d: Dataset = serde_json::from_str(r#"{"licenses": []}"#).unwrap();
        assert!(d.settings.server_enabled);
        assert!(d.settings.key_validation_enabled);
        assert!(d.settings.key_creation_enabled);
    }
}
