//! Backend Config

use clap::Args;

/// Hosted database settings. Only needed by commands that read or write orders.
#[derive(Debug, Args)]
pub struct BackendConfig {
    /// Supabase project URL
    #[arg(long, env = "SUPABASE_URL")]
    pub supabase_url: Option<String>,

    /// Supabase anonymous API key
    #[arg(long, env = "SUPABASE_ANON_KEY", hide_env_values = true)]
    pub supabase_anon_key: Option<String>,
}
