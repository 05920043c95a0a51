//! CLI for ClearView - remove visual effects from photos.

use clap::{Args, Parser, Subcommand};
use clearview::download;
use clearview::ui::{self, Intent};
use clearview::{
    FailureKind, GeminiEditor, GeminiModel, ImageEditor, ImageSource, Message, Runtime, Status,
    DEFAULT_INSTRUCTION,
};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};

#[derive(Parser)]
#[command(name = "clearview")]
#[command(about = "Remove filters, overlays and artifacts from photos with Gemini")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,

    #[command(flatten)]
    editor: EditorArgs,

    /// Output as JSON
    #[arg(long, global = true)]
    json: bool,
}

#[derive(Args)]
struct EditorArgs {
    /// API key (falls back to API_KEY, then GOOGLE_API_KEY)
    #[arg(long, global = true, env = "API_KEY", hide_env_values = true)]
    api_key: Option<String>,

    /// Gemini model (gemini-2.5-flash-image or gemini-3-pro-image-preview)
    #[arg(
        long,
        global = true,
        env = "CLEARVIEW_MODEL",
        default_value = "gemini-2.5-flash-image"
    )]
    model: String,

    /// Override the API endpoint
    #[arg(long, global = true, env = "CLEARVIEW_BASE_URL", hide = true)]
    base_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Edit a single image and save the result
    Edit(EditArgs),

    /// Interactive session (default)
    Interactive,

    /// Check that the API key and model are usable
    Check,
}

#[derive(Args)]
struct EditArgs {
    /// Image to clean up
    input: PathBuf,

    /// Output file or directory (defaults to clearview-edited-<ms>.png)
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Instruction sent with the image
    #[arg(short, long, default_value = DEFAULT_INSTRUCTION)]
    prompt: String,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();
    let editor = build_editor(&cli.editor)?;

    match cli.command.unwrap_or(Commands::Interactive) {
        Commands::Edit(args) => edit_once(editor, args, cli.json).await?,
        Commands::Interactive => interactive(editor).await?,
        Commands::Check => check(editor.as_ref(), cli.json).await?,
    }

    Ok(())
}

fn init_tracing() {
    use tracing_subscriber::EnvFilter;
    let filter =
        EnvFilter::try_from_env("CLEARVIEW_LOG").unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn build_editor(args: &EditorArgs) -> anyhow::Result<Arc<dyn ImageEditor>> {
    let model: GeminiModel = args.model.parse()?;
    let mut builder = GeminiEditor::builder().model(model);
    if let Some(ref key) = args.api_key {
        builder = builder.api_key(key);
    }
    if let Some(ref url) = args.base_url {
        builder = builder.base_url(url);
    }
    Ok(Arc::new(builder.build()?))
}

async fn edit_once(
    editor: Arc<dyn ImageEditor>,
    args: EditArgs,
    json_output: bool,
) -> anyhow::Result<()> {
    let mut runtime = Runtime::new(editor);

    let source = ImageSource::from_path(&args.input).await?;
    runtime.dispatch(Message::FileSelected(source))?;
    runtime.settle().await;
    if let Some(error) = runtime.state().error() {
        anyhow::bail!("{error}");
    }

    let _ = runtime.dispatch(Message::InstructionChanged(args.prompt))?;
    runtime.dispatch(Message::ProcessRequested)?;
    runtime.settle().await;

    if runtime.state().status() != Status::Success {
        let message = runtime
            .state()
            .error()
            .unwrap_or(FailureKind::Generic.message());
        anyhow::bail!("{message}");
    }

    let path = download::download(runtime.state(), args.output.as_deref()).await?;

    if json_output {
        let result = serde_json::json!({
            "success": true,
            "input": args.input.display().to_string(),
            "output": path.display().to_string(),
            "provider": runtime.editor().kind().to_string(),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        println!(
            "Edited image: {} via {}",
            path.display(),
            runtime.editor().name()
        );
    }

    Ok(())
}

async fn check(editor: &dyn ImageEditor, json_output: bool) -> anyhow::Result<()> {
    let outcome = editor.health_check().await;

    if json_output {
        let result = serde_json::json!({
            "provider": editor.kind().to_string(),
            "ok": outcome.is_ok(),
            "error": outcome.as_ref().err().map(|e| e.to_string()),
        });
        println!("{}", serde_json::to_string_pretty(&result)?);
    } else {
        match &outcome {
            Ok(()) => println!("✓ {} is reachable", editor.name()),
            Err(e) => println!("✗ {}: {e}", editor.name()),
        }
    }

    outcome.map_err(Into::into)
}

async fn interactive(editor: Arc<dyn ImageEditor>) -> anyhow::Result<()> {
    let mut runtime = Runtime::new(editor);
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("{}", ui::render(runtime.state()));
    println!("\nType `help` for commands.");

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else { break };
                let Some(intent) = ui::parse_intent(&line) else { continue };
                if intent == Intent::Quit {
                    break;
                }
                if handle_intent(&mut runtime, intent).await {
                    println!("{}", ui::render(runtime.state()));
                }
            }
            Some(changed) = runtime.next_completion(), if runtime.is_busy() => {
                if changed {
                    println!("{}", ui::render(runtime.state()));
                }
            }
        }
    }

    Ok(())
}

/// Applies one intent. Returns whether the screen should be redrawn.
async fn handle_intent(runtime: &mut Runtime, intent: Intent) -> bool {
    let message = match intent {
        Intent::Open(path) => {
            if !runtime.state().can_select() {
                println!("Please wait for processing to finish.");
                return false;
            }
            match ImageSource::from_path(&path).await {
                Ok(source) => Message::FileSelected(source),
                Err(e) => {
                    tracing::warn!(error = %e, "could not open selection");
                    println!("Could not open {}.", path.display());
                    return false;
                }
            }
        }
        Intent::Prompt(text) => Message::InstructionChanged(text),
        Intent::Process => Message::ProcessRequested,
        Intent::Reset => Message::Reset,
        Intent::Save(target) => {
            match download::download(runtime.state(), target.as_deref()).await {
                Ok(path) => println!("Saved {}", path.display()),
                Err(e) => println!("Nothing saved: {e}"),
            }
            return false;
        }
        Intent::Status => return true,
        Intent::Help => {
            println!("{}", ui::render_help());
            return false;
        }
        Intent::Invalid(hint) => {
            println!("{hint}");
            return false;
        }
        Intent::Quit => return false,
    };

    match runtime.dispatch(message) {
        Ok(changed) => changed,
        Err(rejected) => {
            // Rejected selections leave the session untouched.
            println!("{rejected}");
            false
        }
    }
}
