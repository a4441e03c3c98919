use clap::{Parser, Subcommand};
use courier_core::config::{self, DeliveryMode};
use courier_core::events::Event;
use courier_telegram::Bot;
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Parser)]
#[command(name = "courier", version, about = "Telegram Bot API client")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to config file.
    #[arg(short, long, default_value = "config.toml")]
    config: String,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the configured update source and log what arrives.
    Listen {
        /// Reply to every text message with the same text.
        #[arg(long)]
        echo: bool,
    },
    /// Send a text message.
    Send {
        chat_id: i64,
        #[arg(trailing_var_arg = true)]
        text: Vec<String>,
    },
    /// Send a photo from a local path, one or more URLs, or base64 data.
    SendPhoto {
        chat_id: i64,
        /// Local path or URL. Several URLs are tried in order.
        #[arg(required = true)]
        photo: Vec<String>,
        /// Treat the single PHOTO argument as base64-encoded bytes.
        #[arg(long)]
        base64: bool,
        #[arg(long)]
        caption: Option<String>,
    },
    /// Print the bot's own account.
    Me,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cfg = config::load(&cli.config)?;

    match cli.command {
        Commands::Listen { echo } => {
            match cfg.mode() {
                DeliveryMode::Manual => anyhow::bail!(
                    "nothing to listen on: configure [polling] or [webhook] in {}",
                    cli.config
                ),
                DeliveryMode::Webhook(w) if w.port.is_none() => {
                    anyhow::bail!("webhook.port is required to listen")
                }
                _ => {}
            }

            let bot = Bot::new(cfg)?;
            log_updates(&bot, echo);

            let cancel = CancellationToken::new();
            let Some(task) = bot.start(cancel.clone()).await? else {
                anyhow::bail!("no update source was started");
            };

            tokio::signal::ctrl_c().await?;
            info!("Shutting down...");
            cancel.cancel();
            task.await?;
        }
        Commands::Send { chat_id, text } => {
            let text = text.join(" ");
            if text.trim().is_empty() {
                anyhow::bail!("message text is empty");
            }
            let bot = Bot::new(cfg)?;
            let sent = bot
                .api()
                .send_message(json!({ "chat_id": chat_id, "text": text }))
                .await?;
            println!("{}", serde_json::to_string_pretty(&sent)?);
        }
        Commands::SendPhoto {
            chat_id,
            photo,
            base64,
            caption,
        } => {
            if base64 && photo.len() != 1 {
                anyhow::bail!("--base64 takes exactly one PHOTO argument");
            }
            let photo = match photo.as_slice() {
                [single] => Value::String(single.clone()),
                many => json!(many),
            };
            let mut params = json!({ "chat_id": chat_id, "photo": photo });
            if base64 {
                params["base64"] = json!(true);
            }
            if let Some(caption) = caption {
                params["caption"] = json!(caption);
            }

            let bot = Bot::new(cfg)?;
            let sent = bot.api().send_photo(params).await?;
            println!("{}", serde_json::to_string_pretty(&sent)?);
        }
        Commands::Me => {
            let bot = Bot::new(cfg)?;
            let me = bot.api().get_me().await?;
            println!(
                "@{} (id {}, {})",
                me.username.as_deref().unwrap_or("?"),
                me.id,
                me.first_name
            );
        }
    }

    Ok(())
}

fn log_updates(bot: &Bot, echo: bool) {
    let api = bot.api().clone();
    bot.on_message(move |event| {
        let Event::Message(message) = event else {
            return;
        };
        let text = message.text.clone().unwrap_or_default();
        info!("message {} in chat {}: {text}", message.message_id, message.chat.id);

        if echo && !text.is_empty() {
            let api = api.clone();
            let chat_id = message.chat.id;
            tokio::spawn(async move {
                if let Err(e) = api
                    .send_message(json!({ "chat_id": chat_id, "text": text }))
                    .await
                {
                    warn!("echo to chat {chat_id} failed: {e}");
                }
            });
        }
    });

    bot.on_inline_query(|event| {
        if let Event::InlineQuery(query) = event {
            info!("inline query {} from {}: {}", query.id, query.from.id, query.query);
        }
    });
}
