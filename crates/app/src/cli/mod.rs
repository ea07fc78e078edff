use clap::{Parser, Subcommand};
use gretta_app::{
    config::{AppConfig, logging::LoggingConfig},
    context::AppContext,
};

mod callback;
mod cart;
mod checkout;
mod orders;

#[derive(Debug, Parser)]
#[command(name = "gretta", about = "Gretta storefront CLI", long_about = None)]
pub(crate) struct Cli {
    #[command(flatten)]
    config: AppConfig,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    Cart(cart::CartCommand),
    Checkout(checkout::CheckoutArgs),
    Callback(callback::CallbackCommand),
    Orders(orders::OrdersCommand),
}

impl Cli {
    pub(crate) fn logging(&self) -> &LoggingConfig {
        &self.config.logging
    }

    pub(crate) async fn run(self) -> Result<(), String> {
        let context = AppContext::open(&self.config)
            .map_err(|error| format!("failed to open local state: {error}"))?;

        match self.command {
            Commands::Cart(command) => cart::run(command, &context),
            Commands::Checkout(args) => checkout::run(args, &context).await,
            Commands::Callback(command) => callback::run(command, &context).await,
            Commands::Orders(command) => orders::run(command, &context).await,
        }
    }
}
