use anyhow::{Context, Result};
use opendoc_chat::api::ChatClient;
use opendoc_chat::config::Config;
use opendoc_chat::runtime::TurnController;
use opendoc_chat::state::TurnStatus;
use opendoc_chat::ui::terminal::terminal_width;
use opendoc_chat::ui::{AnsiMarkdownRenderer, MarkdownRenderer, PlainTextRenderer, TerminalSurface};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing_subscriber::EnvFilter;

const NEW_SESSION_COMMAND: &str = "/new";

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("opendoc_chat=warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let config = Config::load()?;
    config.validate()?;

    let controller = TurnController::new(ChatClient::new(&config), &config);

    let args: Vec<String> = std::env::args().skip(1).collect();
    if !args.is_empty() {
        let status = run_turn(&controller, &config, args.join(" ")).await?;
        if status == TurnStatus::Error {
            std::process::exit(1);
        }
        return Ok(());
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => break,
        };
        let Some(line) = line else {
            break;
        };

        let message = line.trim();
        if message.is_empty() {
            continue;
        }
        if message == NEW_SESSION_COMMAND {
            controller.reset_session();
            println!("(new session)");
            continue;
        }
        run_turn(&controller, &config, message.to_string()).await?;
    }

    Ok(())
}

async fn run_turn(
    controller: &TurnController<ChatClient>,
    config: &Config,
    message: String,
) -> Result<TurnStatus> {
    let mut handle = controller.submit(message)?;

    let renderer: Box<dyn MarkdownRenderer> = if config.color {
        Box::new(AnsiMarkdownRenderer::new())
    } else {
        Box::new(PlainTextRenderer)
    };
    let mut surface = TerminalSurface::new(std::io::stdout(), renderer, terminal_width(), config.color);

    let cancel = handle.cancel_token();
    let interrupt = tokio::signal::ctrl_c();
    tokio::pin!(interrupt);
    let mut cancel_requested = false;
    loop {
        tokio::select! {
            update = handle.next_update() => match update {
                Some(update) => surface.apply(&update)?,
                None => break,
            },
            _ = &mut interrupt, if !cancel_requested => {
                cancel_requested = true;
                cancel.cancel();
            }
        }
    }

    let turn = handle.wait().await.context("turn task failed")?;
    Ok(turn.status())
}
