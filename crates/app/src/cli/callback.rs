use clap::{Args, Subcommand};
use gretta_app::{context::AppContext, payments::GatewayCallback};

#[derive(Debug, Args)]
pub(crate) struct CallbackCommand {
    #[command(subcommand)]
    command: CallbackSubcommand,
}

#[derive(Debug, Subcommand)]
enum CallbackSubcommand {
    /// Finalize an approved payment
    Success(ReturnArg),

    /// Report a rejected payment
    Failure(ReturnArg),

    /// Report a payment awaiting an offline step
    Pending(ReturnArg),

    /// Open a new payment for the staged order
    Retry,

    /// Abandon the staged order
    Cancel,
}

#[derive(Debug, Args)]
struct ReturnArg {
    /// Return URL or its query string
    url: String,
}

impl ReturnArg {
    fn parse(&self) -> Result<GatewayCallback, String> {
        let parsed = if self.url.contains("://") {
            GatewayCallback::from_url(&self.url)
        } else {
            GatewayCallback::from_query(&self.url)
        };

        parsed.map_err(|error| error.to_string())
    }
}

pub(crate) async fn run(command: CallbackCommand, context: &AppContext) -> Result<(), String> {
    let orchestrator = context.checkout().map_err(|error| error.to_string())?;

    match command.command {
        CallbackSubcommand::Success(arg) => {
            let created = orchestrator
                .complete_payment(&arg.parse()?)
                .await
                .map_err(|error| error.user_message())?;

            println!("payment approved");
            println!("order_number: {}", created.number);
            println!("order_id: {}", created.id);
        }
        CallbackSubcommand::Failure(arg) => {
            let failure = orchestrator
                .payment_failed(&arg.parse()?)
                .map_err(|error| error.user_message())?;

            println!("payment not approved: {}", failure.reason);

            if failure.can_retry {
                println!("run `gretta callback retry` to try again or `gretta callback cancel`");
            }
        }
        CallbackSubcommand::Pending(arg) => {
            let pending = orchestrator
                .payment_pending(&arg.parse()?)
                .map_err(|error| error.user_message())?;

            println!("payment pending");

            if let Some(reference) = pending.external_reference {
                println!("external_reference: {reference}");
            }

            if let Some(payment_id) = pending.payment_id {
                println!("payment_id: {payment_id}");
            }

            println!("your order will be confirmed once the payment clears");
        }
        CallbackSubcommand::Retry => {
            let redirect = orchestrator
                .retry_payment()
                .await
                .map_err(|error| error.user_message())?;

            println!("external_reference: {}", redirect.external_reference);
            println!("pay at: {}", redirect.url);
        }
        CallbackSubcommand::Cancel => {
            orchestrator
                .cancel_payment()
                .map_err(|error| error.user_message())?;

            println!("payment cancelled; your cart was kept");
        }
    }

    Ok(())
}
