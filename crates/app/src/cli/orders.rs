use clap::{Args, Subcommand};
use gretta::{
    orders::{Order, OrderNumber, OrderStatus},
    pricing::format_price,
};
use gretta_app::{
    context::AppContext,
    orders::{advance_order, transition_order},
};
use tabled::{
    builder::Builder,
    settings::{Alignment, Style, object::Columns},
};

#[derive(Debug, Args)]
pub(crate) struct OrdersCommand {
    #[command(subcommand)]
    command: OrdersSubcommand,
}

#[derive(Debug, Subcommand)]
enum OrdersSubcommand {
    /// Show one order
    Get(NumberArg),

    /// List orders, newest first
    List(ListArgs),

    /// Move an order to its next status
    Advance(NumberArg),

    /// Cancel an order that is not yet delivered
    Cancel(NumberArg),
}

#[derive(Debug, Args)]
struct NumberArg {
    /// Order number
    number: u64,
}

#[derive(Debug, Args)]
struct ListArgs {
    /// Only orders in this status
    #[arg(long)]
    status: Option<OrderStatus>,
}

pub(crate) async fn run(command: OrdersCommand, context: &AppContext) -> Result<(), String> {
    let repository = context.orders().map_err(|error| error.to_string())?;

    match command.command {
        OrdersSubcommand::Get(arg) => {
            let order = repository
                .get_order_by_number(OrderNumber(arg.number))
                .await
                .map_err(|error| format!("failed to get order: {error}"))?;

            print_order(&order);
        }
        OrdersSubcommand::List(args) => {
            let orders = repository
                .list_orders(args.status)
                .await
                .map_err(|error| format!("failed to list orders: {error}"))?;

            if orders.is_empty() {
                println!("no orders found");
                return Ok(());
            }

            print_orders(&orders);
        }
        OrdersSubcommand::Advance(arg) => {
            let order = advance_order(repository.as_ref(), OrderNumber(arg.number))
                .await
                .map_err(|error| format!("failed to advance order: {error}"))?;

            println!("order {} is now {}", order.number, order.status);
        }
        OrdersSubcommand::Cancel(arg) => {
            let order = transition_order(
                repository.as_ref(),
                OrderNumber(arg.number),
                OrderStatus::Cancelled,
            )
            .await
            .map_err(|error| format!("failed to cancel order: {error}"))?;

            println!("order {} is now {}", order.number, order.status);
        }
    }

    Ok(())
}

fn placed_at(order: &Order) -> String {
    order.placed_at.map_or_else(
        || "-".to_string(),
        |timestamp| timestamp.strftime("%Y-%m-%d %H:%M UTC").to_string(),
    )
}

fn print_order(order: &Order) {
    let draft = &order.draft;
    let customer = draft.customer();

    println!("order_number: {}", order.number);
    println!("order_id: {}", order.id);
    println!("status: {}", order.status);
    println!("placed_at: {}", placed_at(order));
    println!("customer: {} ({})", customer.name, customer.phone);

    if let Some(email) = &customer.email {
        println!("email: {email}");
    }

    println!("delivery: {}", draft.delivery_type().as_str());

    if let Some(address) = draft.delivery().address() {
        println!("address: {address}");
    }

    if let Some(note) = draft.delivery().note() {
        println!("address_note: {note}");
    }

    println!("payment: {}", draft.payment_method().as_str());
    println!("paid: {}", draft.is_paid());

    if let Some(payment) = draft.gateway_payment() {
        println!("payment_id: {}", payment.payment_id);
    }

    if let Some(notes) = draft.notes() {
        println!("notes: {notes}");
    }

    let mut builder = Builder::default();

    builder.push_record(["Product", "Unit price", "Qty", "Line total"]);

    for item in draft.line_items() {
        builder.push_record([
            item.name.clone(),
            format_price(item.unit_price),
            item.quantity.to_string(),
            format_price(item.line_total()),
        ]);
    }

    let mut table = builder.build();

    table.with(Style::modern_rounded());
    table.modify(Columns::new(1..4), Alignment::right());

    println!("{table}");
    println!("subtotal: {}", format_price(draft.subtotal()));
    println!("shipping: {}", format_price(draft.shipping_cost()));
    println!("total: {}", format_price(draft.total()));
}

fn print_orders(orders: &[Order]) {
    let mut builder = Builder::default();

    builder.push_record([
        "Number", "Placed", "Status", "Customer", "Delivery", "Payment", "Total", "Paid",
    ]);

    for order in orders {
        let draft = &order.draft;

        builder.push_record([
            order.number.to_string(),
            placed_at(order),
            order.status.to_string(),
            draft.customer().name.clone(),
            draft.delivery_type().as_str().to_string(),
            draft.payment_method().as_str().to_string(),
            format_price(draft.total()),
            if draft.is_paid() { "yes" } else { "no" }.to_string(),
        ]);
    }

    let mut table = builder.build();

    table.with(Style::modern_rounded());
    table.modify(Columns::one(6), Alignment::right());

    println!("{table}");
}
