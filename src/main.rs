use balbes_bot::config::{Settings, GRANT_TRIGGER};
use balbes_bot::gateway::Gateway;
use balbes_bot::llm::{GeminiClient, TextGenerator};
use balbes_bot::state::AppState;
use balbes_bot::{bot, bot::handlers::Command};
use dotenvy::dotenv;
use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use teloxide::dispatching::UpdateHandler;
use teloxide::prelude::*;
use teloxide::types::{CallbackQuery, InlineQuery};
use tracing::{error, info};
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting sensitive data
struct RedactionPatterns {
    token1: Regex,
    token2: Regex,
    token3: Regex,
    gemini1: Regex,
    gemini2: Regex,
    gemini3: Regex,
}

impl RedactionPatterns {
    /// Initialize all regex patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    fn new() -> Result<Self, regex::Error> {
        Ok(Self {
            token1: Regex::new(r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)")?,
            token2: Regex::new(r"([0-9]{8,10}:[A-Za-z0-9_-]{35})")?,
            token3: Regex::new(r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+")?,
            gemini1: Regex::new(r"AIza[0-9A-Za-z_-]{35}")?,
            gemini2: Regex::new(r"GEMINI_API_KEY=[^\s&]+")?,
            // The Gemini key travels as a URL query parameter
            gemini3: Regex::new(r"key=[A-Za-z0-9_-]{20,}")?,
        })
    }

    fn redact(&self, input: &str) -> String {
        let mut output = input.to_string();
        output = self
            .token1
            .replace_all(&output, "$1[TELEGRAM_TOKEN]$3")
            .to_string();
        output = self
            .token2
            .replace_all(&output, "[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .token3
            .replace_all(&output, "$1[TELEGRAM_TOKEN]")
            .to_string();
        output = self
            .gemini1
            .replace_all(&output, "[GEMINI_API_KEY]")
            .to_string();
        output = self
            .gemini2
            .replace_all(&output, "GEMINI_API_KEY=[MASKED]")
            .to_string();
        output = self.gemini3.replace_all(&output, "key=[MASKED]").to_string();
        output
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> RedactingWriter<W> {
    const fn new(inner: W, patterns: Arc<RedactionPatterns>) -> Self {
        Self { inner, patterns }
    }
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // We return the original buffer length to satisfy the contract,
        // even if the redacted string length differs.
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<F> RedactingMakeWriter<F> {
    const fn new(make_inner: F, patterns: Arc<RedactionPatterns>) -> Self {
        Self {
            make_inner,
            patterns,
        }
    }
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter::new((self.make_inner)(), self.patterns.clone())
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Load .env file
    dotenv().ok();

    // Initialize redaction patterns early (before logging)
    let patterns = Arc::new(RedactionPatterns::new().map_err(|e| {
        eprintln!("Failed to compile regex patterns: {e}");
        e
    })?);

    // Setup logging with redaction
    init_logging(patterns);

    info!("Starting MrBalbes bot...");

    // Load settings
    let settings = init_settings();

    // Shared state and the Gemini-backed gateway
    let state = Arc::new(AppState::new(settings.personality()));
    let generator: Arc<dyn TextGenerator> =
        Arc::new(GeminiClient::new(settings.gemini_api_key.clone()));
    let gateway = Arc::new(Gateway::new(generator, state.clone()));
    info!("Gemini client initialized.");

    // Initialize Bot
    let bot = Bot::new(settings.telegram_token.clone());

    // Setup handlers
    let handler = setup_handler();

    info!("Бот запущен...");

    Dispatcher::builder(bot, handler)
        .dependencies(dptree::deps![state, gateway])
        .enable_ctrlc_handler()
        .build()
        .dispatch()
        .await;

    Ok(())
}

fn init_logging(patterns: Arc<RedactionPatterns>) {
    let make_writer = RedactingMakeWriter::new(io::stderr, patterns);
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
}

fn init_settings() -> Settings {
    match Settings::new() {
        Ok(s) => {
            info!("Configuration loaded successfully.");
            s
        }
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    }
}

fn setup_handler() -> UpdateHandler<teloxide::RequestError> {
    dptree::entry()
        .branch(Update::filter_inline_query().endpoint(handle_inline_query))
        .branch(Update::filter_callback_query().endpoint(handle_callback))
        .branch(
            Update::filter_message()
                .branch(
                    dptree::entry()
                        .filter_command::<Command>()
                        .endpoint(handle_command),
                )
                .branch(
                    // Грант-команда — обычный текст, ловим по префиксу
                    dptree::filter(|msg: Message| {
                        msg.text()
                            .is_some_and(|t| t.to_lowercase().starts_with(GRANT_TRIGGER))
                    })
                    .endpoint(handle_grant),
                )
                .branch(
                    Update::filter_message()
                        .filter(|msg: Message| msg.text().is_some())
                        .endpoint(handle_text),
                )
                .branch(
                    Update::filter_message()
                        .filter(|msg: Message| msg.photo().is_some())
                        .endpoint(handle_photo),
                )
                .branch(
                    Update::filter_message()
                        .filter(|msg: Message| msg.sticker().is_some())
                        .endpoint(handle_sticker),
                ),
        )
}

async fn handle_command(
    bot: Bot,
    msg: Message,
    cmd: Command,
    state: Arc<AppState>,
) -> Result<(), teloxide::RequestError> {
    let res = match cmd {
        Command::Start => bot::handlers::start(bot, msg).await,
        Command::Clear => bot::handlers::clear(bot, msg, state).await,
        Command::Setstyle(style) => bot::handlers::set_style(bot, msg, state, style).await,
    };
    if let Err(e) = res {
        error!("Command error: {}", e);
    }
    respond(())
}

async fn handle_grant(
    bot: Bot,
    msg: Message,
    state: Arc<AppState>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::grant(bot, msg, state).await {
        error!("Grant handler error: {}", e);
    }
    respond(())
}

async fn handle_text(
    bot: Bot,
    msg: Message,
    state: Arc<AppState>,
    gateway: Arc<Gateway>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::handlers::handle_text(bot, msg, state, gateway).await {
        error!("Text handler error: {}", e);
    }
    respond(())
}

async fn handle_photo(
    bot: Bot,
    msg: Message,
    state: Arc<AppState>,
    gateway: Arc<Gateway>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::media::handle_photo(bot, msg, state, gateway).await {
        error!("Photo handler error: {}", e);
    }
    respond(())
}

async fn handle_sticker(
    bot: Bot,
    msg: Message,
    state: Arc<AppState>,
    gateway: Arc<Gateway>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::media::handle_sticker(bot, msg, state, gateway).await {
        error!("Sticker handler error: {}", e);
    }
    respond(())
}

async fn handle_inline_query(bot: Bot, q: InlineQuery) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::inline::handle_inline_query(bot, q).await {
        error!("Inline query handler error: {}", e);
    }
    respond(())
}

async fn handle_callback(
    bot: Bot,
    q: CallbackQuery,
    gateway: Arc<Gateway>,
) -> Result<(), teloxide::RequestError> {
    if let Err(e) = bot::inline::handle_callback(bot, q, gateway).await {
        error!("Callback handler error: {}", e);
    }
    respond(())
}
