use std::path::PathBuf;
use std::time::Duration;

use ask_core::mega::{MEGA_API_URL, MEGA_HOST};
use ask_core::reconnect::ReconnectPolicy;
use ask_core::settings::{BotMode, BotSettings};
use ask_core::store::DEFAULT_SESSION_DIR;
use clap::Args;

/// Flags shared by every subcommand. Each one falls back to the environment
/// (and `.env`) so container deployments need no arguments.
#[derive(Args, Debug, Clone)]
pub struct SessionArgs {
    /// Session token from the pairing site
    #[arg(long, env = "SESSION_ID", hide_env_values = true)]
    pub session_id: Option<String>,
    /// Directory holding creds.json and key files
    #[arg(long, env = "SESSION_DIR", default_value = DEFAULT_SESSION_DIR)]
    pub session_dir: PathBuf,
    #[arg(long, env = "DOWNLOAD_TIMEOUT_SECS", default_value_t = 60)]
    pub download_timeout_secs: u64,
    #[arg(long, env = "MEGA_API_URL", default_value = MEGA_API_URL)]
    pub mega_api_url: String,
    #[arg(long, env = "MEGA_HOST", default_value = MEGA_HOST)]
    pub mega_host: String,
}

impl SessionArgs {
    pub fn download_timeout(&self) -> Duration {
        Duration::from_secs(self.download_timeout_secs)
    }
}

#[derive(Args, Debug, Clone)]
pub struct RunArgs {
    #[command(flatten)]
    pub session: SessionArgs,
    #[arg(long, env = "PORT", default_value_t = 3000)]
    pub port: u16,
    #[arg(long, env = "PREFIX", default_value = ".")]
    pub prefix: String,
    /// public | private
    #[arg(long, env = "MODE", default_value = "public")]
    pub mode: BotMode,
    #[arg(long, env = "GATEWAY_URL", default_value = "http://127.0.0.1:8085")]
    pub gateway_url: String,
    #[arg(long, env = "GATEWAY_API_KEY", hide_env_values = true, default_value = "")]
    pub gateway_api_key: String,
    #[arg(long, env = "GATEWAY_INSTANCE", default_value = "ask-xmd")]
    pub gateway_instance: String,
    #[arg(long, env = "RECONNECT_MAX_ATTEMPTS", default_value_t = 5)]
    pub reconnect_max_attempts: u32,
}

impl RunArgs {
    pub fn bot_settings(&self) -> BotSettings {
        BotSettings {
            prefix: self.prefix.clone(),
            mode: self.mode,
            ..BotSettings::default()
        }
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            max_attempts: self.reconnect_max_attempts,
            ..ReconnectPolicy::default()
        }
    }

    pub fn gateway(&self) -> GatewayConfig {
        GatewayConfig {
            base_url: self.gateway_url.trim_end_matches('/').to_string(),
            api_key: self.gateway_api_key.clone(),
            instance: self.gateway_instance.clone(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub base_url: String,
    pub api_key: String,
    pub instance: String,
}
