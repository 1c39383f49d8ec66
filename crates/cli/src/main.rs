use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use shelf_app::modules::catalog::query::CatalogQuery;
use shelf_app::modules::catalog::Book;
use shelf_app::modules::currency::ExchangeRate;
use shelf_app::AppServices;
use shelf_kernel::settings::Settings;

/// Operator tooling for the shelf storefront
#[derive(Debug, Parser)]
#[command(name = "shelf", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Run the storefront HTTP server
    Serve,
    /// Exchange rate maintenance
    #[command(subcommand)]
    Currency(CurrencyCommand),
    /// Query the configured catalog providers
    #[command(subcommand)]
    Catalog(CatalogCommand),
}

#[derive(Debug, Subcommand)]
enum CurrencyCommand {
    /// Drop the cached rates and fetch them again
    Refresh,
    /// Show the rates currently in effect
    Rates,
}

#[derive(Debug, Subcommand)]
enum CatalogCommand {
    /// Search the catalog through the provider chain
    Search(SearchArgs),
    /// Look up a single book by ISBN
    Isbn { isbn: String },
}

#[derive(Debug, Args)]
struct SearchArgs {
    query: String,
    #[arg(long, default_value_t = 0)]
    offset: u32,
    #[arg(long, default_value_t = 10)]
    limit: u32,
    /// One of text, isbn, subject, author, title
    #[arg(long)]
    field: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load().with_context(|| "failed to load shelf settings")?;
    shelf_telemetry::init(&settings.telemetry)?;

    match cli.command {
        Command::Serve => shelf_app::serve(&settings).await,
        Command::Currency(command) => run_currency(&settings, command).await,
        Command::Catalog(command) => run_catalog(&settings, command).await,
    }
}

async fn run_currency(settings: &Settings, command: CurrencyCommand) -> anyhow::Result<()> {
    let services = AppServices::from_settings(settings)?;
    let rate = match command {
        CurrencyCommand::Refresh => {
            tracing::info!("refreshing exchange rates");
            services.currency.refresh().await
        }
        CurrencyCommand::Rates => services.currency.rates().await,
    };
    print_rates(&rate);

    if rate.is_default() {
        tracing::warn!("rate provider unavailable, default rates in effect");
    }
    Ok(())
}

fn print_rates(rate: &ExchangeRate) {
    println!("{:<8} {:>8}", "Buy", format!("{:.3}", rate.buy_rate));
    println!("{:<8} {:>8}", "Sell", format!("{:.3}", rate.sell_rate));
    println!("{:<8} {:>8}", "Date", rate.as_of.to_string());
    println!("{:<8} {:>8}", "Source", format!("{:?}", rate.source).to_lowercase());
}

async fn run_catalog(settings: &Settings, command: CatalogCommand) -> anyhow::Result<()> {
    let services = AppServices::from_settings(settings)?;

    match command {
        CatalogCommand::Search(args) => {
            let query = CatalogQuery::from_field(args.field.as_deref(), args.query)
                .with_context(|| "unsupported search field")?;
            let page = services
                .catalog
                .search(&query.to_string(), args.offset, args.limit)
                .await;

            if page.is_empty() {
                println!("No books found");
                return Ok(());
            }
            println!("{} result(s), showing {}", page.total_items, page.items.len());
            for book in &page.items {
                print_book(book);
            }
        }
        CatalogCommand::Isbn { isbn } => match services.catalog.get_by_isbn(&isbn).await {
            Some(book) => print_book(&book),
            None => anyhow::bail!("book {} not found", isbn),
        },
    }

    Ok(())
}

fn print_book(book: &Book) {
    let price = book
        .sale_price()
        .map(|p| format!("{:.2} {}", p, book.currency))
        .unwrap_or_else(|| "not for sale".to_string());
    println!("{:<15} {:<40} {:<25} {}", book.isbn, book.title, book.author, price);
}
