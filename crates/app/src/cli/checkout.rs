use clap::{Args, ValueEnum};
use gretta::orders::{CheckoutForm, DeliveryType, PaymentMethod};
use gretta_app::{
    checkout::{CheckoutError, CheckoutOutcome},
    context::AppContext,
};

#[derive(Debug, Clone, Copy, ValueEnum)]
enum DeliveryArg {
    Pickup,
    Delivery,
}

impl From<DeliveryArg> for DeliveryType {
    fn from(value: DeliveryArg) -> Self {
        match value {
            DeliveryArg::Pickup => Self::Pickup,
            DeliveryArg::Delivery => Self::Delivery,
        }
    }
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum PaymentArg {
    Cash,
    Transfer,
    Mercadopago,
}

impl From<PaymentArg> for PaymentMethod {
    fn from(value: PaymentArg) -> Self {
        match value {
            PaymentArg::Cash => Self::Cash,
            PaymentArg::Transfer => Self::BankTransfer,
            PaymentArg::Mercadopago => Self::Gateway,
        }
    }
}

#[derive(Debug, Args)]
pub(crate) struct CheckoutArgs {
    /// Customer name
    #[arg(long)]
    name: String,

    /// Contact phone
    #[arg(long)]
    phone: String,

    /// Contact email
    #[arg(long, default_value = "")]
    email: String,

    /// Pickup at the shop or home delivery
    #[arg(long, value_enum, default_value_t = DeliveryArg::Pickup)]
    delivery: DeliveryArg,

    /// Delivery address
    #[arg(long, default_value = "")]
    address: String,

    /// Directions for the courier
    #[arg(long, default_value = "")]
    address_note: String,

    /// How the customer pays
    #[arg(long, value_enum)]
    payment: PaymentArg,

    /// Notes for the shop
    #[arg(long, default_value = "")]
    notes: String,
}

impl From<CheckoutArgs> for CheckoutForm {
    fn from(args: CheckoutArgs) -> Self {
        Self {
            name: args.name,
            phone: args.phone,
            email: args.email,
            delivery_type: args.delivery.into(),
            address: args.address,
            address_note: args.address_note,
            payment_method: args.payment.into(),
            notes: args.notes,
        }
    }
}

pub(crate) async fn run(args: CheckoutArgs, context: &AppContext) -> Result<(), String> {
    let orchestrator = context.checkout().map_err(|error| error.to_string())?;

    orchestrator.begin().map_err(|error| error.user_message())?;

    match orchestrator.submit(args.into()).await {
        Ok(CheckoutOutcome::Placed(created)) => {
            println!("order_number: {}", created.number);
            println!("order_id: {}", created.id);
            println!("thank you! we will contact you to confirm your order");
        }
        Ok(CheckoutOutcome::Redirect(redirect)) => {
            println!("external_reference: {}", redirect.external_reference);
            println!("pay at: {}", redirect.url);
            println!("then run `gretta callback success|failure|pending <return-url>`");
        }
        Err(CheckoutError::Validation(errors)) => {
            for error in errors.errors() {
                eprintln!("{error}");
            }

            return Err("please correct the form and try again".to_string());
        }
        Err(error) => return Err(error.user_message()),
    }

    Ok(())
}
