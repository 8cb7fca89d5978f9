use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use mail_digest::auth::{TokenManager, token_store};
use mail_digest::config::{Config, load_config};
use mail_digest::digest::write_digest;
use mail_digest::gmail::GmailClient;
use mail_digest::pipeline::fetch_and_summarize;
use mail_digest::summarize::{DEFAULT_OLLAMA_URL, OllamaBackend, OpenAiBackend, SummaryBackend};

#[derive(Parser)]
#[command(name = "mail-digest")]
#[command(about = "Summarize Gmail messages into a Markdown digest", long_about = None)]
struct Cli {
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Fetch matching messages, summarize them, write the digest
    Run {
        #[arg(long, value_enum, default_value_t = Provider::Openai)]
        provider: Provider,

        /// Model name (defaults: gpt-4o-mini for openai, llama3.1 for ollama)
        #[arg(long)]
        model: Option<String>,

        /// Gmail search query, e.g. "is:unread category:primary"
        #[arg(long, default_value = "in:inbox newer_than:7d")]
        query: String,

        /// Max messages to summarize
        #[arg(long, default_value_t = 10)]
        max: u32,

        /// Output Markdown file
        #[arg(long, default_value = "summaries.md")]
        out: PathBuf,
    },

    /// Store the OAuth client secret in keyring
    SetClientSecret {
        #[arg(long)]
        client_id: String,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum Provider {
    Openai,
    Ollama,
}

impl Provider {
    fn default_model(self) -> &'static str {
        match self {
            Provider::Openai => "gpt-4o-mini",
            Provider::Ollama => "llama3.1",
        }
    }

    fn backend(self, model: String, cfg: &Config) -> Result<Box<dyn SummaryBackend>> {
        Ok(match self {
            Provider::Openai => Box::new(OpenAiBackend::from_env(model)?),
            Provider::Ollama => {
                let url = cfg
                    .ollama_url
                    .clone()
                    .unwrap_or_else(|| DEFAULT_OLLAMA_URL.to_string());
                Box::new(OllamaBackend::new(url, model)?)
            }
        })
    }
}

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    match cli.cmd {
        Command::SetClientSecret { client_id } => {
            eprintln!("Paste client secret (end with Ctrl-D):");
            let mut secret = String::new();
            std::io::Read::read_to_string(&mut std::io::stdin(), &mut secret)?;
            let secret = secret.trim();
            token_store::save_client_secret(&client_id, secret)?;
            println!("Saved client secret for client_id {client_id}");
            Ok(())
        }

        Command::Run {
            provider,
            model,
            query,
            max,
            out,
        } => {
            let cfg = load_config()?;
            let model = model.unwrap_or_else(|| provider.default_model().to_string());

            // fail on missing credentials before touching the network
            let backend = provider.backend(model, &cfg)?;

            let token_mgr = TokenManager::from_config(&cfg)?;
            let access_token = token_mgr.get_access_token()?;
            let gmail = GmailClient::new(access_token)?;

            let outcome = fetch_and_summarize(&gmail, backend.as_ref(), &query, max)?;
            write_digest(&out, &outcome.markdown)?;

            println!(
                "Summarized {} email(s). Saved to {}",
                outcome.summarized,
                out.display()
            );
            Ok(())
        }
    }
}
