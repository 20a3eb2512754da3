//! Beacon CLI
//!
//! Runs one storefront flow against an in-process recording SDK and prints
//! every payload the SDK received as a JSON line on stdout. Logs go to
//! stderr.
//!
//! ## Usage
//!
//! ```bash
//! # Anonymous visit with two client-side navigations
//! beacon visit --path / --path /products
//!
//! # Store a consent decision, then click a product card
//! beacon consent accept
//! beacon click --product PRD001
//!
//! # Simulate the SDK script never loading
//! BEACON_MAX_ATTEMPTS=5 beacon --sdk-missing click --product PRD002
//!
//! # Debug test event plus dispatch statistics
//! beacon debug
//!
//! # Payload for a single event
//! beacon normalize --event '{"intent":"contact_point_email","email":"a@b.co"}'
//! ```

use std::path::PathBuf;
use std::sync::Arc;

use beacon_core::auth::UserMetadata;
use beacon_core::{
    normalize, AuthError, AuthFlow, AuthMode, AuthProvider, ConsentStore, DelayedProbe, FileStorage,
    InMemoryAuthProvider, RecordingSdk, RegistrationForm, Tracker, TrackerConfig, TrackingEvent,
};
use clap::{ArgAction, Parser, Subcommand};
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

type CliResult<T> = Result<T, Box<dyn std::error::Error>>;

#[derive(Parser, Debug)]
#[command(name = "beacon")]
#[command(about = "Dry-run storefront tracking flows")]
#[command(version)]
struct Cli {
    /// Tracker configuration JSON file
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Directory holding persisted consent
    #[arg(long, global = true, default_value = ".beacon")]
    state_dir: PathBuf,

    /// Simulate the SDK script never loading
    #[arg(long, global = true)]
    sdk_missing: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Page load: anonymous identity, hero content and route changes
    Visit {
        /// Paths navigated to after the first render
        #[arg(long = "path")]
        paths: Vec<String>,
    },

    /// Log in; the account is created on the fly for the dry run
    Login {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        first_name: Option<String>,
        #[arg(long)]
        last_name: Option<String>,
    },

    /// Register a new account
    Register {
        #[arg(long)]
        email: String,
        #[arg(long)]
        password: String,
        #[arg(long)]
        first_name: String,
        #[arg(long)]
        last_name: String,
    },

    /// Record a consent decision
    Consent {
        #[command(subcommand)]
        action: ConsentAction,
    },

    /// Click a product card
    Click {
        /// Catalog id, e.g. PRD001
        #[arg(long)]
        product: String,
    },

    /// Send a debug test event and print dispatch statistics
    Debug {
        /// Number of test events to send
        #[arg(long, default_value_t = 1)]
        count: u32,
    },

    /// Print the payload for a JSON-encoded event
    Normalize {
        #[arg(long)]
        event: String,
    },
}

#[derive(Subcommand, Debug)]
enum ConsentAction {
    Accept,
    Reject,
    Custom {
        #[arg(long, action = ArgAction::Set)]
        tracking: bool,
        #[arg(long, action = ArgAction::Set)]
        analytics: bool,
    },
}

/// A bootstrapped page: tracker, its SDK and the stored consent
struct Page {
    tracker: Arc<Tracker>,
    sdk: Arc<RecordingSdk>,
    consent: ConsentStore,
}

impl Page {
    async fn load(cli: &Cli) -> CliResult<Self> {
        let config = match &cli.config {
            Some(path) => TrackerConfig::from_json_file(path)?,
            None => TrackerConfig::default().with_env_overrides()?,
        };

        let tracker = Arc::new(Tracker::new(config));
        let sdk = Arc::new(RecordingSdk::new());
        let probe = if cli.sdk_missing {
            DelayedProbe::never()
        } else {
            DelayedProbe::new(sdk.clone(), 0)
        };

        let consent = tracker.consent_store(Arc::new(FileStorage::new(&cli.state_dir)?));
        consent.restore();

        // Already logged; the page works without tracking.
        let _ = tracker.bootstrap(&probe).await;

        Ok(Self { tracker, sdk, consent })
    }

    fn print_sent(&self) -> CliResult<()> {
        for payload in self.sdk.sent() {
            println!("{}", serde_json::to_string(&payload)?);
        }
        let stats = self.tracker.stats();
        info!(sent = stats.sent, dropped = stats.dropped, failed = stats.failed, "Done");
        Ok(())
    }
}

#[tokio::main]
async fn main() -> CliResult<()> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "beacon=info,beacon_core=info".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    if let Command::Normalize { event } = &cli.command {
        let event: TrackingEvent = serde_json::from_str(event)?;
        println!("{}", serde_json::to_string(&normalize(&event))?);
        return Ok(());
    }

    let page = Page::load(&cli).await?;
    let provider = Arc::new(InMemoryAuthProvider::new());
    let auth = AuthFlow::new(provider.clone(), page.tracker.clone());

    match &cli.command {
        Command::Visit { paths } => {
            auth.start().await?;

            let hero = page.tracker.personalization().fetch_now().await;
            info!(cta = ?hero.cta_text, image = ?hero.image_url, "Hero content");

            let routes = page.tracker.route_reinitializer();
            routes.on_navigation("/");
            for path in paths {
                routes.on_navigation(path);
            }
        }
        Command::Login {
            email,
            password,
            first_name,
            last_name,
        } => {
            let metadata = UserMetadata {
                first_name: first_name.clone(),
                last_name: last_name.clone(),
            };
            match provider.sign_up(email, password, metadata).await {
                Ok(_) | Err(AuthError::AlreadyRegistered(_)) => {}
                Err(e) => return Err(e.into()),
            }

            let mut session = auth.watch_session();
            auth.open_auth(AuthMode::Login);
            auth.login(email, password).await?;
            if let Some(Some(user)) = session.next().await {
                info!(first_name = %user.first_name, "Signed in");
            }
        }
        Command::Register {
            email,
            password,
            first_name,
            last_name,
        } => {
            auth.open_auth(AuthMode::Register);
            let form = RegistrationForm {
                first_name: first_name.clone(),
                last_name: last_name.clone(),
                email: email.clone(),
                password: password.clone(),
            };
            let user = auth.register(&form).await?;
            info!(user_id = %user.id, "Check your email to confirm the account");
        }
        Command::Consent { action } => {
            match action {
                ConsentAction::Accept => page.consent.accept_all()?,
                ConsentAction::Reject => page.consent.reject_all()?,
                ConsentAction::Custom { tracking, analytics } => {
                    page.consent.customize(*tracking, *analytics)?
                }
            };
        }
        Command::Click { product } => {
            if page.tracker.track_product_click(product).is_none() {
                return Err(format!("Unknown product: {}", product).into());
            }
        }
        Command::Debug { count } => {
            for _ in 0..*count {
                page.tracker.send_test_event();
            }
            println!("{}", serde_json::to_string_pretty(&page.tracker.stats())?);
            return Ok(());
        }
        Command::Normalize { .. } => {}
    }

    page.print_sent()
}
