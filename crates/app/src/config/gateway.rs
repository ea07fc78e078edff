//! Gateway Config

use clap::Args;

/// Hosted payment gateway settings.
#[derive(Debug, Args)]
pub struct GatewayConfig {
    /// `MercadoPago` access token; gateway checkout is disabled without it
    #[arg(long, env = "MP_ACCESS_TOKEN", hide_env_values = true)]
    pub mp_access_token: Option<String>,

    /// `MercadoPago` API base URL
    #[arg(long, env = "MP_API_URL", default_value = "https://api.mercadopago.com")]
    pub mp_api_url: String,

    /// Public storefront URL the gateway redirects back to
    #[arg(long, env = "APP_URL", default_value = "http://localhost:5173")]
    pub app_url: String,

    /// Text shown on the customer's card statement
    #[arg(long, env = "MP_STATEMENT_DESCRIPTOR", default_value = "GRETTA")]
    pub statement_descriptor: String,

    /// Redirect to the gateway sandbox instead of the live checkout
    #[arg(long, env = "MP_SANDBOX", default_value_t = false)]
    pub gateway_sandbox: bool,
}
