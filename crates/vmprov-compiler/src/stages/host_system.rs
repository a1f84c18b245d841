use std::collections::HashSet;

use vmprov_core::config::HostSystemSettings;
use vmprov_core::descriptor::{
    BootOptions, CustomizationOptions, GuestFamily, HostSystemConfig, HostSystemDescriptor,
    LinuxOptions, WinOptions,
};
use vmprov_core::error::StageError;

/// Word size assumed when a request leaves `Bit` absent or zero.
pub const DEFAULT_WORD_SIZE: i64 = 64;

/// Resolves a distribution name to exactly one guest family. The known
/// distribution sets come from config, so adding one never touches this code.
#[derive(Debug, Clone)]
pub struct HostSystemCustomizer {
    linux: HashSet<String>,
    windows: HashSet<String>,
    word_sizes: Vec<i64>,
    boot: BootOptions,
}

impl HostSystemCustomizer {
    pub fn new(settings: &HostSystemSettings) -> Self {
        let normalize = |names: &[String]| -> HashSet<String> {
            names.iter().map(|n| n.trim().to_lowercase()).collect()
        };
        Self {
            linux: normalize(&settings.linux_distributions),
            windows: normalize(&settings.windows_distributions),
            word_sizes: settings.word_sizes.clone(),
            boot: settings.boot.options(),
        }
    }

    /// Guest family for a distribution name, matched case-insensitively.
    pub fn family_of(&self, distribution_name: &str) -> Option<GuestFamily> {
        let name = distribution_name.trim().to_lowercase();
        if self.linux.contains(&name) {
            Some(GuestFamily::Linux)
        } else if self.windows.contains(&name) {
            Some(GuestFamily::Windows)
        } else {
            None
        }
    }

    pub fn derive_options(
        &self,
        distribution_name: &str,
        word_size: Option<i64>,
    ) -> Result<HostSystemConfig, StageError> {
        let word_size = match word_size {
            None | Some(0) => DEFAULT_WORD_SIZE,
            Some(bits) => bits,
        };
        let descriptor = HostSystemDescriptor::new(distribution_name, word_size);
        let unsupported = || StageError::UnsupportedOs {
            name: descriptor.system_name.clone(),
            word_size,
        };

        if !self.word_sizes.contains(&word_size) {
            return Err(unsupported());
        }
        let options = match self.family_of(&descriptor.system_name) {
            Some(GuestFamily::Linux) => CustomizationOptions::Linux(LinuxOptions::default()),
            Some(GuestFamily::Windows) => CustomizationOptions::Windows(WinOptions::default()),
            None => return Err(unsupported()),
        };
        tracing::debug!(
            system = %descriptor.system_name,
            word_size,
            family = %options.family(),
            "derived guest options"
        );

        Ok(HostSystemConfig {
            descriptor,
            options,
            boot_options: self.boot,
        })
    }
}
