use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::store::Store;

pub const MSG_SERVER_DISABLED: &str = "Server disabled";
pub const MSG_MAINTENANCE: &str = "Server maintenance";
pub const MSG_MISSING_INPUT: &str = "Missing input";
pub const MSG_INVALID_KEY: &str = "Invalid key";
pub const MSG_EXPIRED: &str = "Key expired";
pub const MSG_DISABLED_KEY: &str = "Key disabled";
pub const MSG_WRONG_DEVICE: &str = "Wrong device";
pub const MSG_ACTIVATED: &str = "Key activated!";

/// Outcome of one validation attempt. Rejections are ordinary values, not
/// errors; the reason only ever varies by message text.
#[derive(Debug, Clone, Serialize)]
pub struct Verdict {
    pub valid: bool,
    pub message: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expiry_date: Option<DateTime<Utc>>,
}

impl Verdict {
    fn reject(message: &'static str) -> Self {
        Self {
            valid: false,
            message,
            expiry_date: None,
        }
    }

    fn accept(expiry_date: DateTime<Utc>) -> Self {
        Self {
            valid: true,
            message: MSG_ACTIVATED,
            expiry_date: Some(expiry_date),
        }
    }

    /// The one rejection the HTTP layer maps to 503 instead of 200.
    pub fn server_disabled(&self) -> bool {
        !self.valid && self.message == MSG_SERVER_DISABLED
    }
}

/// What the rule chain decided; binding is deferred so read-only verdicts
/// never touch the store file.
enum Ruling {
    Reject(&'static str),
    Accept(DateTime<Utc>),
    NeedsBinding,
}

/// The rule chain, first match wins: server flag → maintenance flag →
/// input → existence → expiry → status → device binding.
fn apply_rules(
    data: &crate::store::Dataset,
    key: &str,
    hwid: &str,
    now: DateTime<Utc>,
) -> Ruling {
    if !data.settings.server_enabled {
        return Ruling::Reject(MSG_SERVER_DISABLED);
    }
    if !data.settings.key_validation_enabled {
        return Ruling::Reject(MSG_MAINTENANCE);
    }
    if key.is_empty() || hwid.is_empty() {
        return Ruling::Reject(MSG_MISSING_INPUT);
    }

    let Some(record) = data.licenses.iter().find(|r| r.key == key) else {
        return Ruling::Reject(MSG_INVALID_KEY);
    };
    if record.is_expired(now) {
        return Ruling::Reject(MSG_EXPIRED);
    }
    if !record.is_active() {
        return Ruling::Reject(MSG_DISABLED_KEY);
    }

    if !record.key_type.is_global() {
        match &record.hwid {
            Some(bound) if bound != hwid => return Ruling::Reject(MSG_WRONG_DEVICE),
            Some(_) => {}
            None => return Ruling::NeedsBinding,
        }
    }

    Ruling::Accept(record.expiry_date)
}

/// Apply the rule chain to (key, hwid). First use of a standard key binds
/// it to `hwid`; binding is the only path that writes the store — plain
/// accepts and rejections run read-only.
pub fn validate(store: &Store, key: &str, hwid: &str, now: DateTime<Utc>) -> Result<Verdict> {
    let key = key.trim().to_owned();
    let hwid = hwid.trim().to_owned();

    let ruling = store.read(|data| apply_rules(data, &key, &hwid, now))?;
    match ruling {
        Ruling::Reject(message) => Ok(Verdict::reject(message)),
        Ruling::Accept(expiry) => Ok(Verdict::accept(expiry)),
        Ruling::NeedsBinding => store.transact(move |data| {
            // Re-run under the write lock: a racing request from another
            // device may have bound the key since the read above.
            match apply_rules(data, &key, &hwid, now) {
                Ruling::Reject(message) => Verdict::reject(message),
                Ruling::Accept(expiry) => Verdict::accept(expiry),
                Ruling::NeedsBinding => {
                    let Some(record) = data.licenses.iter_mut().find(|r| r.key == key) else {
                        return Verdict::reject(MSG_INVALID_KEY);
                    };
                    // One-time, irreversible assignment.
                    record.hwid = Some(hwid.clone());
                    info!(key = %record.key, "device bound to key");
                    Verdict::accept(record.expiry_date)
                }
            }
        }),
    }
}
