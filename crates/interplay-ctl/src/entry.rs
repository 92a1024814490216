use interplay::{
    host::InteractionEvent,
    http::ReqwestTransport,
    store::{CommandStore, JsonFileStore},
    Config, InteractionState,
};
use serenity::model::id::ApplicationId;
use tracing_subscriber::EnvFilter;

use crate::{commands::Command, prelude::*, util::DebugShim};

#[derive(Debug, clap::Parser)]
#[command(version, author, about)]
struct Opts {
    /// Log filter, using env_logger-like syntax
    #[arg(long, env = "RUST_LOG")]
    log_filter: Option<String>,

    /// The Discord API token to use
    #[arg(long, env)]
    discord_token: DebugShim<String>,

    /// The application ID to act as, if not already persisted
    #[arg(long, env = "DISCORD_APPLICATION_ID")]
    application_id: Option<NonZeroU64>,

    /// Path of the persisted command store
    #[arg(long, env = "INTERPLAY_STORE", default_value = "interplay.json")]
    store: PathBuf,

    /// Timeout for API requests, in seconds
    #[arg(long, env = "INTERPLAY_TIMEOUT")]
    timeout: Option<u64>,

    #[command(flatten)]
    config: Config,

    #[command(subcommand)]
    command: Command,
}

macro_rules! init_error {
    ($($args:tt)*) => ({
        ::tracing::error!($($args)*);
        ::std::process::exit(1);
    })
}

fn fmt_layer<S>() -> impl tracing_subscriber::Layer<S>
where S: tracing::Subscriber + for<'a> tracing_subscriber::registry::LookupSpan<'a> {
    // keep stdout free for command output
    tracing_subscriber::fmt::layer().with_writer(std::io::stderr)
}

#[instrument(name = "init_logger", skip(log_filter))]
fn init_subscriber(log_filter: impl AsRef<str>) {
    let log_filter = log_filter.as_ref();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_new(log_filter)
                .unwrap_or_else(|e| init_error!("Invalid log filter {log_filter:?}: {e}")),
        )
        .with(fmt_layer())
        .try_init()
        .unwrap_or_else(|e| init_error!("Error initializing logger: {e}"));
}

#[inline]
pub fn main() {
    let tmp_logger =
        tracing::subscriber::set_default(tracing_subscriber::registry().with(fmt_layer()));
    let span = error_span!("boot").entered();

    [
        ".env.local",
        if cfg!(debug_assertions) {
            ".env.dev"
        } else {
            ".env.prod"
        },
        ".env",
    ]
    .into_iter()
    .try_for_each(|p| match dotenvy::from_filename(p) {
        Ok(p) => {
            trace!("Loaded env from {p:?}");
            Ok(())
        },
        Err(dotenvy::Error::Io(e)) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e).with_context(|| format!("Error loading env from {p:?}")),
    })
    .unwrap_or_else(|e| init_error!("Error loading .env files: {e:?}"));

    let opts: Opts = clap::Parser::parse();
    drop(span);
    let span = error_span!("boot", ?opts).entered();

    init_subscriber(opts.log_filter.as_deref().unwrap_or("info"));

    drop((span, tmp_logger));

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap_or_else(|e| init_error!("Async runtime setup error: {e}"));

    std::process::exit(match rt.block_on(run(opts)) {
        Ok(()) => 0,
        Err(e) => {
            error!("{e:?}");
            1
        },
    });
}

#[inline]
#[instrument(level = "error", skip(opts))]
async fn run(opts: Opts) -> Result {
    let Opts {
        log_filter: _,
        discord_token,
        application_id,
        store,
        timeout,
        config,
        command,
    } = opts;

    let transport = ReqwestTransport::new(
        discord_token.0,
        config.api_base.clone(),
        timeout.map(std::time::Duration::from_secs),
    )
    .context("Error initializing HTTP client")?;

    let (tx, rx) = tokio::sync::mpsc::unbounded_channel::<InteractionEvent>();
    let mut builder = InteractionState::builder(Arc::new(transport))
        .store(Arc::new(JsonFileStore::new(store)) as Arc<dyn CommandStore>)
        .sink(Arc::new(tx))
        .config(config);

    if let Some(id) = application_id {
        builder = builder.application_id(ApplicationId::new(id.get()));
    }

    let state = builder
        .build()
        .await
        .context("Error initializing interaction state")?;

    let count = state
        .cache_commands()
        .await
        .context("Error loading persisted commands")?;
    debug!(count, "Loaded persisted commands");

    crate::commands::run(&state, command, rx).await
}
