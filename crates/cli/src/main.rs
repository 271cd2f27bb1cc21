use clap::{Parser, Subcommand};
use std::sync::Arc;
use std::time::Instant;

#[derive(Parser)]
#[command(name = "parley")]
#[command(about = "Parley CLI", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version
    Version,

    /// Run the gateway (HTTP health, WebSocket event stream, channel webhooks).
    Gateway {
        /// Config file path (default: PARLEY_CONFIG_PATH or ~/.parley/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// HTTP and WebSocket port (default from config or 16161)
        #[arg(long, short)]
        port: Option<u16>,
    },

    /// Chat as a widget visitor (interactive). Proactive greetings and the
    /// lead-capture prompt fire on their real timers while you idle.
    Chat {
        /// Config file path (default: PARLEY_CONFIG_PATH or ~/.parley/config.json)
        #[arg(long, short, value_name = "PATH")]
        config: Option<std::path::PathBuf>,

        /// Tenant id to chat against (default: "default")
        #[arg(long, value_name = "ID")]
        tenant: Option<String>,

        /// Simulated page URL for the engagement engine
        #[arg(long, value_name = "URL")]
        url: Option<String>,

        /// Simulated page title
        #[arg(long, value_name = "TITLE")]
        title: Option<String>,
    },
}

#[tokio::main]
async fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn")).init();

    let cli = Cli::parse();

    match cli.command {
        Some(Commands::Version) => {
            println!("parley {}", env!("CARGO_PKG_VERSION"));
        }
        Some(Commands::Gateway { config, port }) => {
            if let Err(e) = run_gateway(config, port).await {
                log::error!("gateway failed: {}", e);
                std::process::exit(1);
            }
        }
        Some(Commands::Chat {
            config,
            tenant,
            url,
            title,
        }) => {
            if let Err(e) = run_chat(config, tenant, url, title).await {
                log::error!("chat failed: {}", e);
                std::process::exit(1);
            }
        }
        None => {
            println!("Run with --help for usage");
        }
    }
}

async fn run_gateway(
    config_path: Option<std::path::PathBuf>,
    port: Option<u16>,
) -> anyhow::Result<()> {
    let (mut config, _path) = lib::config::load_config(config_path)?;
    if let Some(p) = port {
        config.gateway.port = p;
    }
    log::info!(
        "starting gateway on {}:{}",
        config.gateway.bind,
        config.gateway.port
    );
    lib::gateway::run_gateway(config).await
}

async fn run_chat(
    config_path: Option<std::path::PathBuf>,
    tenant: Option<String>,
    url: Option<String>,
    title: Option<String>,
) -> anyhow::Result<()> {
    use lib::config::{resolve_assistant_url, resolve_leads_url};
    use lib::engagement::PageContext;
    use lib::identity::{FileIdentityStore, WidgetIdentity};
    use lib::leads::{HttpLeadSink, LeadSink, LogLeadSink};
    use lib::reply::{HttpReplyBackend, ReplyBackend};
    use lib::session::{MemorySessionStore, SessionStore};
    use lib::widget::{WidgetController, WidgetSettings};
    use std::io::Write;
    use tokio::io::AsyncBufReadExt;

    let (config, _path) = lib::config::load_config(config_path)?;
    let tenant_id = tenant.unwrap_or_else(|| "default".to_string());
    let tenant_config = config.tenants.get(&tenant_id).cloned().unwrap_or_default();
    let settings = WidgetSettings::from_tenant(&tenant_config);

    let store: Arc<dyn SessionStore> = Arc::new(MemorySessionStore::new());
    let backend: Arc<dyn ReplyBackend> =
        Arc::new(HttpReplyBackend::new(resolve_assistant_url(&config)));
    let sink: Arc<dyn LeadSink> = match resolve_leads_url(&config) {
        Some(endpoint) => Arc::new(HttpLeadSink::new(endpoint)),
        None => Arc::new(LogLeadSink),
    };
    let identity = WidgetIdentity::new(Box::new(FileIdentityStore::new(
        FileIdentityStore::default_path(),
    )));

    let mut widget =
        WidgetController::new(&tenant_id, identity, store, backend, sink, settings).await;
    widget.mark_settings_ready(Instant::now());
    if let Some(url) = url {
        widget.set_page_context(
            Some(PageContext {
                url,
                title,
                description: None,
            }),
            Instant::now(),
        );
    }

    if let Some(welcome) = tenant_config.welcome_message.as_deref() {
        println!("< {}", welcome);
    }
    println!("(/clear resets the session, /exit quits)");

    let mut lines = tokio::io::BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let deadline = widget.next_deadline();
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                if input.eq_ignore_ascii_case("/exit") || input.eq_ignore_ascii_case("/quit") {
                    break;
                }
                if input.eq_ignore_ascii_case("/clear") {
                    widget.clear(Instant::now()).await;
                    println!("(session cleared)");
                    continue;
                }
                print!("< ");
                std::io::stdout().flush()?;
                widget
                    .send(input, &mut |chunk: &str| {
                        print!("{}", chunk);
                        let _ = std::io::stdout().flush();
                    })
                    .await;
                println!();
            }
            _ = wait_until(deadline) => {
                let before = widget.transcript().len();
                widget.tick(Instant::now()).await;
                for message in &widget.transcript()[before..] {
                    println!("\n< {}", message.content);
                }
            }
        }
    }

    Ok(())
}

async fn wait_until(deadline: Option<Instant>) {
    match deadline {
        Some(d) => tokio::time::sleep_until(tokio::time::Instant::from_std(d)).await,
        None => std::future::pending().await,
    }
}
