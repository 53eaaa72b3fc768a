use crate::api::ReleaseAsset;

/// Rules for picking the replacement binary out of a release's assets.
#[derive(Debug, Clone)]
pub struct AssetPolicy {
    pub tool_name: String,
    pub executable_suffix: String,
    /// Required in every first-pass match, regardless of architecture token.
    // NOTE: an `arm64` asset without `win` in its name is never picked.
    pub platform_marker: String,
    pub host_arch: String,
}

impl Default for AssetPolicy {
    fn default() -> Self {
        Self {
            tool_name: "spotdl".to_string(),
            executable_suffix: ".exe".to_string(),
            platform_marker: "win".to_string(),
            host_arch: std::env::consts::ARCH.to_string(),
        }
    }
}

/// Name fragments that identify a build for `arch`, best first.
pub fn preferred_tokens(arch: &str) -> &'static [&'static str] {
    let arch = arch.to_ascii_lowercase();
    if arch.contains("arm") || arch.contains("aarch64") {
        &["arm64", "aarch64"]
    } else if arch.contains("64") {
        &["x64", "amd64", "win64"]
    } else {
        &["win32", "x86"]
    }
}

impl AssetPolicy {
    pub fn with_host_arch(mut self, arch: impl Into<String>) -> Self {
        self.host_arch = arch.into();
        self
    }

    /// Asset name older releases used, e.g. `spotdl-4.2.5-win32.exe`
    pub fn legacy_name(&self, version: &str) -> String {
        format!("{}-{}-win32{}", self.tool_name, version, self.executable_suffix)
    }

    /// First asset matching the host architecture, else the legacy-named one.
    pub fn select<'a>(&self, assets: &'a [ReleaseAsset], version: &str) -> Option<&'a ReleaseAsset> {
        let tokens = preferred_tokens(&self.host_arch);
        let tool = self.tool_name.to_ascii_lowercase();
        let suffix = self.executable_suffix.to_ascii_lowercase();
        let marker = self.platform_marker.to_ascii_lowercase();

        let by_arch = assets.iter().find(|asset| {
            let name = asset.name.to_ascii_lowercase();
            name.ends_with(&suffix)
                && name.contains(&tool)
                && name.contains(&marker)
                && tokens.iter().any(|token| name.contains(token))
        });

        by_arch.or_else(|| {
            let legacy = self.legacy_name(version);
            assets.iter().find(|asset| asset.name == legacy)
        })
    }
}
