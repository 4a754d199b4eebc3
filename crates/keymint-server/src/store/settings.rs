use anyhow::Result;
use tracing::info;

use super::model::Flag;

impl super::file::Store {
    pub fn get_flag(&self, flag: Flag) -> Result<bool> {
        self.read(|data| match flag {
            Flag::Server => data.settings.server_enabled,
            Flag::Validation => data.settings.key_validation_enabled,
            Flag::Creation => data.settings.key_creation_enabled,
        })
    }

    /// Flip the named flag and return the new value. An absent flag reads
    /// as true, so the first toggle turns it off.
    pub fn toggle_flag(&self, flag: Flag) -> Result<bool> {
        let new_value = self.transact(|data| {
            let slot = match flag {
                Flag::Server => &mut data.settings.server_enabled,
                Flag::Validation => &mut data.settings.key_validation_enabled,
                Flag::Creation => &mut data.settings.key_creation_enabled,
            };
            *slot = !*slot;
            *slot
        })?;
        info!(flag = flag.label(), enabled = new_value, "flag toggled");
        Ok(new_value)
    }
}
