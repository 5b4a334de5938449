use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use pdf_chat_core::{
    load_folder, ChatCompletionsClient, ConversationEngine, EngineOptions, HttpEmbedder,
    LopdfExtractor, Role, VectorIndex, DEFAULT_GENERATION_MODEL,
};
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[derive(Parser)]
#[command(name = "pdf-chat", version)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Base URL of an OpenAI-compatible embeddings endpoint
    #[arg(long, default_value = "http://localhost:8080/v1")]
    embeddings_url: String,

    /// Embedding model name
    #[arg(long, default_value = "sentence-transformers/all-MiniLM-L6-v2")]
    embeddings_model: String,

    /// Embedding vector dimensionality
    #[arg(long, default_value = "384")]
    embedding_dimensions: usize,

    /// API key for the embeddings endpoint
    #[arg(long, env = "EMBEDDINGS_API_KEY")]
    embeddings_api_key: Option<String>,

    /// Base URL of an OpenAI-compatible chat completions endpoint
    #[arg(long, default_value = "https://api.groq.com/openai/v1")]
    llm_url: String,

    /// Generation model name
    #[arg(long, default_value = DEFAULT_GENERATION_MODEL)]
    llm_model: String,

    /// API key for the generation endpoint
    #[arg(long, env = "GROQ_API_KEY")]
    llm_api_key: Option<String>,
}

#[derive(Subcommand)]
enum Command {
    /// Process a folder of PDFs and persist the resulting index.
    Index {
        /// Folder that contains PDFs recursively.
        #[arg(long)]
        folder: PathBuf,
        /// Where to write the index snapshot.
        #[arg(long, default_value = "pdf-chat-index.json")]
        out: PathBuf,
    },
    /// Chat with a document set over retrieval-augmented generation.
    Chat {
        /// Folder of PDFs to process before chatting.
        #[arg(long, conflicts_with = "index")]
        folder: Option<PathBuf>,
        /// Previously persisted index snapshot to chat against.
        #[arg(long)]
        index: Option<PathBuf>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env())
        .with(fmt::layer())
        .init();

    let cli = Cli::parse();

    let embedder = HttpEmbedder::new(
        &cli.embeddings_url,
        &cli.embeddings_model,
        cli.embeddings_api_key.clone(),
        cli.embedding_dimensions,
    );
    let generator =
        ChatCompletionsClient::new(&cli.llm_url, &cli.llm_model, cli.llm_api_key.clone());

    let mut engine = ConversationEngine::new(
        LopdfExtractor,
        embedder,
        generator,
        EngineOptions::default(),
    );

    info!(
        version = env!("CARGO_PKG_VERSION"),
        llm_model = %cli.llm_model,
        embeddings_model = %cli.embeddings_model,
        "pdf-chat boot"
    );

    match cli.command {
        Command::Index { folder, out } => {
            let entries = process_folder(&mut engine, &folder).await?;

            let index = engine
                .session()
                .index()
                .context("index missing after a successful build")?;
            index.persist(&out)?;

            println!(
                "{entries} entries indexed from {} and persisted to {}",
                folder.display(),
                out.display()
            );
        }
        Command::Chat { folder, index } => {
            match (folder, index) {
                (Some(folder), None) => {
                    let entries = process_folder(&mut engine, &folder).await?;
                    println!("{entries} entries indexed; ask away (/quit to leave)");
                }
                (None, Some(path)) => {
                    let index = VectorIndex::load(&path)
                        .with_context(|| format!("loading index from {}", path.display()))?;
                    println!(
                        "{} entries loaded from {}; ask away (/quit to leave)",
                        index.len(),
                        path.display()
                    );
                    engine.attach_index(index);
                }
                _ => bail!("pass exactly one of --folder or --index"),
            }

            chat_loop(&mut engine).await?;
        }
    }

    Ok(())
}

async fn process_folder(
    engine: &mut ConversationEngine<LopdfExtractor, HttpEmbedder, ChatCompletionsClient>,
    folder: &Path,
) -> anyhow::Result<usize> {
    let documents = load_folder(folder)?;
    info!(documents = documents.len(), folder = %folder.display(), "processing pdfs");

    let entries = engine.process(&documents).await?;
    Ok(entries)
}

async fn chat_loop(
    engine: &mut ConversationEngine<LopdfExtractor, HttpEmbedder, ChatCompletionsClient>,
) -> anyhow::Result<()> {
    let stdin = io::stdin();
    let mut input = String::new();

    loop {
        print!("you> ");
        io::stdout().flush()?;

        input.clear();
        if stdin.lock().read_line(&mut input)? == 0 {
            break;
        }

        let question = input.trim();
        if question.is_empty() {
            continue;
        }
        if question == "/quit" || question == "/exit" {
            break;
        }
        if question == "/history" {
            for message in engine.session().transcript() {
                match message.role {
                    Role::Assistant => render_assistant_message(&message.content),
                    _ => render_user_message(&message.content),
                }
            }
            continue;
        }

        match engine.ask(question).await {
            Ok(turn) => render_assistant_message(&turn.answer),
            Err(error) => eprintln!("error: {error}"),
        }
    }

    Ok(())
}

fn render_user_message(text: &str) {
    println!("you> {text}");
}

fn render_assistant_message(text: &str) {
    println!("assistant> {text}\n");
}
