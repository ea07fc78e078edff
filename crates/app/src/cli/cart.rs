use std::sync::PoisonError;

use clap::{Args, Subcommand};
use gretta::{
    cart::CartState,
    pricing::{ShippingPolicy, format_price},
    products::{ProductId, ProductSnapshot},
};
use gretta_app::context::AppContext;
use tabled::{
    builder::Builder,
    settings::{Alignment, Style, object::Columns},
};
use uuid::Uuid;

#[derive(Debug, Args)]
pub(crate) struct CartCommand {
    #[command(subcommand)]
    command: CartSubcommand,
}

#[derive(Debug, Subcommand)]
enum CartSubcommand {
    /// Print the cart with totals
    Show,

    /// Add one unit of a product
    Add(AddArgs),

    /// Remove a product line
    Remove(ProductArg),

    /// Set the quantity of a product line; values below 1 are clamped to 1
    SetQuantity(SetQuantityArgs),

    /// Empty the cart
    Clear,

    /// Open or close the cart drawer
    Toggle,
}

#[derive(Debug, Args)]
struct AddArgs {
    /// Product name
    #[arg(long)]
    name: String,

    /// Unit price, in whole pesos
    #[arg(long)]
    price: u64,

    /// Product UUID; a line with the same name is reused when omitted
    #[arg(long)]
    id: Option<Uuid>,
}

#[derive(Debug, Args)]
struct ProductArg {
    /// Product UUID or name
    product: String,
}

#[derive(Debug, Args)]
struct SetQuantityArgs {
    /// Product UUID or name
    product: String,

    /// New quantity
    #[arg(allow_negative_numbers = true)]
    quantity: i64,
}

pub(crate) fn run(command: CartCommand, context: &AppContext) -> Result<(), String> {
    let mut cart = context.cart.lock().unwrap_or_else(PoisonError::into_inner);

    match command.command {
        CartSubcommand::Show => {}
        CartSubcommand::Add(args) => {
            let id = match args.id {
                Some(id) => ProductId::from(id),
                None => find_product(cart.get_state(), &args.name)
                    .unwrap_or_else(|_missing| ProductId::now_v7()),
            };

            cart.add_item(ProductSnapshot::new(id, args.name, args.price));
        }
        CartSubcommand::Remove(args) => {
            let id = find_product(cart.get_state(), &args.product)?;

            cart.remove_item(id);
        }
        CartSubcommand::SetQuantity(args) => {
            let id = find_product(cart.get_state(), &args.product)?;

            cart.update_quantity(id, args.quantity);
        }
        CartSubcommand::Clear => cart.clear_cart(),
        CartSubcommand::Toggle => {
            cart.toggle_cart();

            println!(
                "cart: {}",
                if cart.get_state().is_open() { "open" } else { "closed" }
            );

            return Ok(());
        }
    }

    print_cart(cart.get_state(), &context.policy());

    Ok(())
}

fn find_product(cart: &CartState, query: &str) -> Result<ProductId, String> {
    let by_id = query.parse::<ProductId>().ok();

    cart.lines()
        .iter()
        .find(|line| {
            Some(line.product.id) == by_id || line.product.name.eq_ignore_ascii_case(query.trim())
        })
        .map(|line| line.product.id)
        .ok_or_else(|| format!("no product matching {query:?} in the cart"))
}

fn print_cart(cart: &CartState, policy: &ShippingPolicy) {
    if cart.is_empty() {
        println!("cart is empty");
        return;
    }

    let mut builder = Builder::default();

    builder.push_record(["Product", "Unit price", "Qty", "Line total"]);

    for line in cart.lines() {
        builder.push_record([
            line.product.name.clone(),
            format_price(line.product.price),
            line.quantity.to_string(),
            format_price(line.line_total()),
        ]);
    }

    let mut table = builder.build();

    table.with(Style::modern_rounded());
    table.modify(Columns::new(1..4), Alignment::right());

    println!("{table}");
    println!("items: {}", cart.item_count());
    println!("subtotal: {}", format_price(cart.total()));

    match policy.remaining_for_free_shipping(cart.total()) {
        0 => println!("delivery: free"),
        remaining => println!(
            "delivery: {} (add {} more for free delivery)",
            format_price(policy.fee),
            format_price(remaining)
        ),
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;
    use testresult::TestResult;

    use super::*;
    use crate::cli::Cli;

    #[tokio::test]
    async fn set_quantity_below_one_keeps_a_single_unit() -> TestResult {
        let directory = tempfile::tempdir()?;
        let data_dir = directory.path().to_string_lossy().into_owned();

        let cli = |args: &[&str]| {
            Cli::try_parse_from(
                ["gretta", "--data-dir", data_dir.as_str()]
                    .into_iter()
                    .chain(args.iter().copied()),
            )
        };

        cli(&["cart", "add", "--name", "Alfajor", "--price", "900"])?
            .run()
            .await?;
        cli(&["cart", "set-quantity", "Alfajor", "3"])?.run().await?;
        cli(&["cart", "set-quantity", "alfajor", "-2"])?.run().await?;

        let context = AppContext::open(&cli(&["cart", "show"])?.config)?;
        let cart = context.cart.lock().map_err(|error| error.to_string())?;

        assert_eq!(cart.get_state().line_count(), 1);
        assert_eq!(cart.get_state().item_count(), 1);

        Ok(())
    }
}
