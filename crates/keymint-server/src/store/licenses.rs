use anyhow::Result;
use chrono::{Duration, Utc};
use rand::Rng;
use tracing::info;

use super::model::{KeyStatus, KeyType, LicenseRecord};

/// Synthesize one token: four 16-bit groups as zero-padded uppercase hex.
/// Collisions are possible in principle and not retried.
pub fn generate_token(rng: &mut impl Rng) -> String {
    format!(
        "{:04X}-{:04X}-{:04X}-{:04X}",
        rng.gen::<u16>(),
        rng.gen::<u16>(),
        rng.gen::<u16>(),
        rng.gen::<u16>()
    )
}

impl super::file::Store {
    /// Mint `count` keys sharing one expiry of now + `validity_days`,
    /// appended unbound and active. The dataset is persisted once for the
    /// whole batch. Count/days sanity is the caller's concern.
    pub fn generate_keys(
        &self,
        count: u32,
        validity_days: i64,
        key_type: KeyType,
    ) -> Result<Vec<String>> {
        // Out-of-range validity saturates to the representable bound rather
        // than panicking in date arithmetic.
        let expiry = Duration::try_days(validity_days)
            .and_then(|d| Utc::now().checked_add_signed(d))
            .unwrap_or(chrono::DateTime::<Utc>::MAX_UTC);
        let minted = self.transact(|data| {
            let mut rng = rand::thread_rng();
            let mut minted = Vec::with_capacity(count as usize);
            for _ in 0..count {
                let token = generate_token(&mut rng);
                data.licenses.push(LicenseRecord {
                    key: token.clone(),
                    expiry_date: expiry,
                    key_type,
                    hwid: None,
                    status: KeyStatus::Active,
                });
                minted.push(token);
            }
            minted
        })?;
        info!(count, validity_days, global = key_type.is_global(), "keys generated");
        Ok(minted)
    }

    /// Look up one record by exact token match.
    pub fn find_key(&self, token: &str) -> Result<Option<LicenseRecord>> {
        self.read(|data| data.licenses.iter().find(|r| r.key == token).cloned())
    }

    /// The `n` most recently issued records, newest first.
    pub fn recent_keys(&self, n: usize) -> Result<Vec<LicenseRecord>> {
        self.read(|data| data.licenses.iter().rev().take(n).cloned().collect())
    }

    /// (total, bound) counts for the status panel.
    pub fn key_counts(&self) -> Result<(usize, usize)> {
        self.read(|data| {
            let total = data.licenses.len();
            let bound = data.licenses.iter().filter(|r| r.hwid.is_some()).count();
            (total, bound)
        })
    }
}
