use clap::{Parser, Subcommand};

mod commands;

/// MediFind: find medicines in stores near you
#[derive(Parser)]
#[command(name = "medifind", version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Log filter used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "medifind=warn")]
    log: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Sign in with email and password
    Login(commands::auth::LoginArgs),

    /// Create a customer or retailer account
    Register(commands::auth::RegisterArgs),

    /// Sign out and forget the saved session
    Logout,

    /// Show who is signed in
    Whoami,

    /// Search a medicine in nearby stores
    Search(commands::search::SearchArgs),

    /// Talk to the MedAssist assistant
    Chat(commands::chat::ChatArgs),

    /// Show the dashboard for the signed-in account
    Dashboard,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    medifind_core::logging::init_logging(Some(&cli.log));

    let result = match cli.command {
        Commands::Login(args) => commands::auth::login(args).await,
        Commands::Register(args) => commands::auth::register(args).await,
        Commands::Logout => commands::auth::logout().await,
        Commands::Whoami => commands::auth::whoami().await,
        Commands::Search(args) => commands::search::run(args).await,
        Commands::Chat(args) => commands::chat::run(args).await,
        Commands::Dashboard => commands::dashboard::run().await,
    };

    if let Err(e) = result {
        eprintln!("error: {e:#}");
        std::process::exit(1);
    }
}
