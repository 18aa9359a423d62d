#![warn(clippy::pedantic)]

use std::{fs, path::PathBuf, time::Duration};

use anyhow::{Context, anyhow};
use clap::{Parser, Subcommand};
use clap_verbosity_flag::Verbosity;
use coderr_client::{
    activation::{self, ActivationReport, ActivationUi, ActivationView},
    api::{ApiClient, Outcome},
    auth::{self, AccountType, LoginReq, RegistrationReq},
    config::{self, ClientConfig},
    fields,
    form::{FormData, FormInput},
    password_reset::{self, PasswordResetReq},
    session::{FileStore, Session},
};
use url::Url;

#[derive(Parser)]
struct Args {
    /// The base URL of the Coderr API, including the trailing slash
    #[arg(long, default_value = config::API_BASE_URL)]
    api_base_url: String,

    /// The base URL of the Coderr frontend, used for redirect targets
    #[arg(long, default_value = config::FRONTEND_BASE_URL)]
    frontend_base_url: String,

    /// The file credentials are kept in between invocations. Defaults to
    /// the user's data directory.
    #[arg(long)]
    credentials: Option<PathBuf>,

    /// Abort requests after this many seconds. By default requests wait
    /// indefinitely.
    #[arg(long)]
    timeout_secs: Option<u64>,

    /// Connect directly, ignoring proxy settings from the environment
    #[arg(long)]
    no_proxy: bool,

    #[command(subcommand)]
    command: Command,

    #[command(flatten)]
    verbose: Verbosity,
}

#[derive(Subcommand)]
enum Command {
    /// Log in and store the returned token
    Login {
        /// The username to log in with
        #[arg(long, short)]
        username: Option<String>,

        /// The password. It is discouraged to provide the password through
        /// the command line - by omitting it, it will be requested on
        /// execution.
        #[arg(long, short)]
        password: Option<String>,

        /// Log in with one of the shared guest accounts instead
        #[arg(long, value_enum, conflicts_with_all = ["username", "password"])]
        guest: Option<AccountType>,
    },

    /// Create an account and store the returned token
    Register {
        #[arg(long, short)]
        username: String,

        #[arg(long, short)]
        email: String,

        /// Whether the account is a customer or a business
        #[arg(long = "type", value_enum)]
        account_type: AccountType,

        /// The password, requested on execution when omitted
        #[arg(long, short)]
        password: Option<String>,
    },

    /// Forget the stored credentials
    Logout,

    /// Show who is logged in
    Whoami,

    /// Activate an account from the link in the activation email
    Activate {
        /// The full activation link, carrying `uid` and `token` parameters
        #[arg(index = 1)]
        link: String,

        /// Write the final activation page to this HTML file
        #[arg(long, short)]
        output: Option<PathBuf>,
    },

    /// Request a password reset email
    ResetPassword {
        #[arg(index = 1)]
        email: String,
    },

    /// GET an endpoint, e.g. `offers/`
    Get {
        #[arg(index = 1)]
        endpoint: String,
    },

    /// POST form fields as JSON
    Post {
        #[arg(index = 1)]
        endpoint: String,

        /// Send the stored token with the request
        #[arg(long)]
        authenticated: bool,

        /// A field as key=value; nested keys use brackets, e.g.
        /// details[0][price]=100
        #[arg(long = "field", short = 'f')]
        fields: Vec<String>,
    },

    /// PATCH form fields as JSON, or as multipart form data
    Patch {
        #[arg(index = 1)]
        endpoint: String,

        /// Send as multipart form data. Required for file uploads, which
        /// are given as key=@path
        #[arg(long)]
        multipart: bool,

        /// A field as key=value; nested keys use brackets
        #[arg(long = "field", short = 'f')]
        fields: Vec<String>,
    },

    /// DELETE an endpoint
    Delete {
        #[arg(index = 1)]
        endpoint: String,
    },
}

/// Reports activation progress on the console and remembers the last state.
#[derive(Default)]
struct ConsoleUi {
    last_view: Option<ActivationView>,
}

impl ActivationUi for ConsoleUi {
    fn show(&mut self, view: &ActivationView) {
        tracing::info!("{} {}", view.title, view.text);
        self.last_view = Some(view.clone());
    }

    fn redirect(&mut self, url: &str) {
        tracing::info!("Redirecting to {url}");
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    tracing_subscriber::fmt()
        .with_max_level(args.verbose)
        .init();

    let credentials = match args.credentials {
        Some(path) => path,
        None => FileStore::default_path().context("Failed to determine a data directory")?,
    };
    let session = Session::new(FileStore::open(credentials).context("Failed to open credential store")?);

    let mut config = ClientConfig::default()
        .with_api_base_url(args.api_base_url)
        .with_frontend_base_url(args.frontend_base_url);
    config.timeout = args.timeout_secs.map(Duration::from_secs);
    config.no_proxy = args.no_proxy;
    let mut client = ApiClient::new(config, session).context("Failed to build HTTP client")?;

    let outcome = match args.command {
        Command::Login {
            username,
            password,
            guest,
        } => {
            if let Some(account_type) = guest {
                auth::guest_login(&mut client, account_type)?
            } else {
                let username = username.context("A username is required unless --guest is given")?;
                let password = get_password(password)?;
                auth::login(&mut client, &LoginReq { username, password })?
            }
        }
        Command::Register {
            username,
            email,
            account_type,
            password,
        } => {
            let password = get_password(password)?;
            let req = RegistrationReq {
                username,
                email,
                repeated_password: password.clone(),
                password,
                account_type,
            };
            auth::register(&mut client, &req)?
        }
        Command::Logout => {
            auth::logout(client.session_mut())?;
            println!("Logged out");
            return Ok(());
        }
        Command::Whoami => {
            match client.session().credentials() {
                Some(record) => println!("Logged in as {} (user ID {})", record.username, record.user_id),
                None => println!("Not logged in"),
            }
            return Ok(());
        }
        Command::Activate { link, output } => return activate(&client, &link, output),
        Command::ResetPassword { email } => {
            password_reset::request_reset(&client, &PasswordResetReq { email })
        }
        Command::Get { endpoint } => client.get(&endpoint),
        Command::Post {
            endpoint,
            authenticated,
            fields,
        } => {
            let body = parse_fields(&fields)?.to_json();
            if authenticated {
                client.post_authenticated(&endpoint, &body)
            } else {
                client.post(&endpoint, &body)
            }
        }
        Command::Patch {
            endpoint,
            multipart,
            fields,
        } => {
            let input = parse_fields(&fields)?;
            if multipart {
                client.patch_multipart(&endpoint, FormData::flatten(&input))
            } else {
                client.patch_json(&endpoint, &input.to_json())
            }
        }
        Command::Delete { endpoint } => client.delete(&endpoint),
    };

    report(&outcome)
}

fn get_password(password: Option<String>) -> anyhow::Result<String> {
    if password.is_some() {
        tracing::warn!(
            "The password has been provided on the command line. Note that this is less secure then providing it when requested."
        );
    }
    password
        .or_else(|| {
            tracing::debug!("Prompting for password...");
            rpassword::prompt_password("Enter Coderr Password: ").ok()
        })
        .context("Failed to get password")
}

fn parse_fields(raw: &[String]) -> anyhow::Result<FormInput> {
    let assignments = raw
        .iter()
        .map(fields::parse)
        .collect::<anyhow::Result<Vec<_>>>()
        .context("Failed to parse form fields")?;
    tracing::debug!("Fields: {assignments:?}");
    fields::assemble(assignments)
}

fn report(outcome: &Outcome) -> anyhow::Result<()> {
    println!("{}", serde_json::to_string_pretty(outcome)?);
    if outcome.ok() {
        Ok(())
    } else {
        Err(anyhow!("The request was not successful"))
    }
}

fn activate(client: &ApiClient, link: &str, output: Option<PathBuf>) -> anyhow::Result<()> {
    if let Some(output) = &output
        && fs::exists(output).context("Failed to check is output exists already")?
    {
        Err(anyhow!(
            "Cannot overwrite output file! Please delete it first or change output destination."
        ))?;
    }

    let link = Url::parse(link).context("Failed to parse activation link")?;
    let mut ui = ConsoleUi::default();
    let report = activation::activate_account(client, &link, &mut ui);
    println!("{}", report.redirect());

    if let (Some(output), Some(view)) = (output, &ui.last_view) {
        fs::write(output, activation::render_page(view)).context("Failed to write output")?;
    }

    match report {
        ActivationReport::Activated { .. } => Ok(()),
        ActivationReport::MissingParams { .. } => {
            Err(anyhow!("The activation link is missing its uid or token"))
        }
        ActivationReport::Failed { error, .. } => {
            Err(anyhow::Error::new(error).context("Failed to activate account"))
        }
    }
}
