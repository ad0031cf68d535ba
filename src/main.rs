//! Account Service CLI
//!
//! Entry point for the REST service and the admin commands that operate on
//! the configured database.
//!
//! Run modes:
//!   account-service serve                                - Start REST and monitoring servers
//!   account-service accounts list --user <user>          - Print a user's accounts as JSON
//!   account-service accounts create --user <u> <name> <xpub> [--type <type>]
//!   account-service accounts delete --user <user> <name>
//!   account-service addresses add --user <u> <account> <address>...

use clap::{Parser, Subcommand};
use tokio::net::TcpListener;

use utxo_tracker::api::dto::{AccountResponse, AccountsResponse};
use utxo_tracker::api::validation::{
    validate_account_name, validate_address, validate_user_id, validate_xpub, ValidationResult,
};
use utxo_tracker::api::{api_router, monitoring_app, serve, shutdown_signal, MonitoringState};
use utxo_tracker::app::{
    Context, DeleteAccountCmd, GetAccountsQuery, Handlers, NewAccountCmd, Visit, VisitResult,
};
use utxo_tracker::config::ServiceConfig;
use utxo_tracker::domain::{
    Account, AccountAddresses, AccountName, AccountType, Address, ServiceInstance, UserName,
};
use utxo_tracker::error::{ServiceError, ServiceResult};
use utxo_tracker::logging::{init_from_config, log_system_event};
use utxo_tracker::storage::AccountStore;

const SERVICE_NAME: &str = "account-service";

#[derive(Parser)]
#[command(name = "account-service")]
#[command(about = "Tracks Bitcoin accounts and their known addresses", version)]
struct Cli {
    /// SQLite database path (overrides ACCOUNT_SERVICE_DB)
    #[arg(long, global = true)]
    database: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the REST API and monitoring servers
    Serve,

    /// Manage accounts
    #[command(subcommand)]
    Accounts(AccountCommands),

    /// Manage known addresses
    #[command(subcommand)]
    Addresses(AddressCommands),
}

#[derive(Subcommand)]
enum AccountCommands {
    /// List a user's accounts with their addresses
    List {
        #[arg(short, long, env = "ACCOUNT_SERVICE_USER")]
        user: String,
    },

    /// Create an account
    Create {
        #[arg(short, long, env = "ACCOUNT_SERVICE_USER")]
        user: String,

        /// Account name
        name: String,

        /// Extended public key
        xpub: String,

        /// legacy, segwit, native-segwit or taproot
        #[arg(short = 't', long = "type")]
        account_type: Option<String>,
    },

    /// Delete an account and its addresses
    Delete {
        #[arg(short, long, env = "ACCOUNT_SERVICE_USER")]
        user: String,

        /// Account name
        name: String,
    },
}

#[derive(Subcommand)]
enum AddressCommands {
    /// Attach addresses to an account, skipping ones already known
    Add {
        #[arg(short, long, env = "ACCOUNT_SERVICE_USER")]
        user: String,

        /// Account name
        account: String,

        #[arg(required = true)]
        addresses: Vec<String>,
    },
}

#[tokio::main]
async fn main() {
    // A missing .env file is fine
    dotenv::dotenv().ok();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("Error: {}", e);
        std::process::exit(e.exit_code());
    }
}

async fn run(cli: Cli) -> ServiceResult<()> {
    let mut config = ServiceConfig::from_env()?;
    if let Some(path) = cli.database {
        config.database.path = path;
    }

    match cli.command {
        Commands::Serve => run_server(config).await,
        Commands::Accounts(cmd) => run_accounts(&config, cmd).await,
        Commands::Addresses(cmd) => run_addresses(&config, cmd).await,
    }
}

fn open_store(config: &ServiceConfig) -> ServiceResult<AccountStore> {
    Ok(AccountStore::sqlite(&config.database.path, config.database.pool_size)?)
}

fn handlers(store: &AccountStore) -> Handlers {
    Handlers::new(store.write_store(), store.read_store())
}

/// Run the REST and monitoring servers until SIGINT or SIGTERM
async fn run_server(config: ServiceConfig) -> ServiceResult<()> {
    init_from_config(&config)?;
    config.log_summary();

    let instance = ServiceInstance::new(SERVICE_NAME, chrono::Utc::now());
    log_system_event(
        "starting",
        serde_json::to_value(&instance).unwrap_or(serde_json::Value::Null),
    );

    let store = open_store(&config)?;
    let api = api_router(handlers(&store), config.http.idle_timeout);
    let monitoring = monitoring_app(MonitoringState { store, instance });

    let api_listener = TcpListener::bind(("0.0.0.0", config.http.port)).await?;
    let monitoring_listener = TcpListener::bind(("0.0.0.0", config.http.monitoring_port)).await?;

    serve(
        (api_listener, api),
        (monitoring_listener, monitoring),
        config.http.shutdown_grace_period,
        shutdown_signal(),
    )
    .await?;

    log_system_event("stopped", serde_json::json!({ "name": SERVICE_NAME }));
    Ok(())
}

fn check(result: ValidationResult) -> ServiceResult<()> {
    result.into_result().map_err(ServiceError::validation)
}

fn print_json<T: serde::Serialize>(value: &T) -> ServiceResult<()> {
    let json = serde_json::to_string_pretty(value)
        .map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e))?;
    println!("{}", json);
    Ok(())
}

async fn run_accounts(config: &ServiceConfig, cmd: AccountCommands) -> ServiceResult<()> {
    let store = open_store(config)?;
    let handlers = handlers(&store);
    let ctx = Context::background();

    match cmd {
        AccountCommands::List { user } => {
            check(validate_user_id(&user))?;

            let mut accounts = Vec::new();
            let mut collect = |aa: AccountAddresses| -> VisitResult {
                accounts.push(AccountResponse::from(aa));
                Ok(Visit::Continue)
            };
            handlers
                .ask(&ctx, GetAccountsQuery { user: UserName::new(user) }.into(), &mut collect)
                .await?;

            print_json(&AccountsResponse { accounts })
        }
        AccountCommands::Create {
            user,
            name,
            xpub,
            account_type,
        } => {
            check(
                validate_user_id(&user)
                    .merge(validate_account_name(&name))
                    .merge(validate_xpub(&xpub)),
            )?;
            let account_type = match account_type {
                Some(raw) => raw
                    .parse::<AccountType>()
                    .map_err(|e| ServiceError::validation(e.to_string()))?,
                None => AccountType::Undefined,
            };

            let account = Account::new(user.as_str(), name.as_str(), xpub, account_type);
            handlers.execute(&ctx, NewAccountCmd { account }.into()).await?;
            println!("created account {} for user {}", name, user);
            Ok(())
        }
        AccountCommands::Delete { user, name } => {
            check(validate_user_id(&user).merge(validate_account_name(&name)))?;

            let cmd = DeleteAccountCmd {
                user: UserName::new(user.as_str()),
                account: AccountName::new(name.as_str()),
            };
            handlers.execute(&ctx, cmd.into()).await?;
            println!("deleted account {} for user {}", name, user);
            Ok(())
        }
    }
}

async fn run_addresses(config: &ServiceConfig, cmd: AddressCommands) -> ServiceResult<()> {
    let AddressCommands::Add {
        user,
        account,
        addresses,
    } = cmd;

    let checks = addresses
        .iter()
        .fold(validate_user_id(&user).merge(validate_account_name(&account)), |acc, a| {
            acc.merge(validate_address(a))
        });
    check(checks)?;

    let store = open_store(config)?;
    let addresses: Vec<Address> = addresses.into_iter().map(Address::new).collect();
    let added = store
        .add_addresses(
            &Context::background(),
            &UserName::new(user.as_str()),
            &AccountName::new(account.as_str()),
            &addresses,
        )
        .await?;

    println!("added {} of {} addresses to {}", added, addresses.len(), account);
    Ok(())
}
