use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SchedulerSettings {
    /// Platform tag sent with every upstream call. The default denotes the
    /// current-generation console tier.
    pub platform: String,
    pub api_base_url: String,
    pub http_timeout_secs: u64,
    pub db_pool_size: u32,
    pub shutdown_grace_secs: u64,
    /// How many audit records a runs listing returns.
    pub runs_page_size: i64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            platform: "common-gen5".to_string(),
            api_base_url: proclubs::DEFAULT_BASE_URL.to_string(),
            http_timeout_secs: 15,
            db_pool_size: 10,
            shutdown_grace_secs: 30,
            runs_page_size: 50,
        }
    }
}

impl SchedulerSettings {
    pub fn figment() -> Figment {
        Figment::from(Serialized::defaults(Self::default()))
            .merge(Toml::file("Rinkdb.toml"))
            .merge(Env::prefixed("RINKDB_"))
    }

    pub fn config() -> figment::Result<Self> {
        Self::figment().extract()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_sane() {
        let settings = SchedulerSettings::default();
        assert_eq!(settings.platform, "common-gen5");
        assert!(settings.http_timeout_secs >= 10 && settings.http_timeout_secs <= 30);
        assert!(settings.shutdown_grace_secs > 0);
    }
}
