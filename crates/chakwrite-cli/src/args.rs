use clap::{Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "chakwrite")]
#[command(about = "ChakWrite page-side client for the background broker", long_about = None)]
pub struct Args {
    /// Broker URL
    #[arg(
        long,
        env = "CHAKWRITE_BROKER_URL",
        default_value = "http://127.0.0.1:18470"
    )]
    pub broker_url: String,

    /// Print raw JSON replies
    #[arg(long)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run an AI action (prompt, writer, rewriter, summarizer, proofreader,
    /// autocomplete, paragraph)
    Ai {
        operation: String,
        /// Input text
        text: String,
        /// Rewrite tone, e.g. neutral, formal, casual
        #[arg(long)]
        tone: Option<String>,
        /// Rewrite length: same, shorter, longer
        #[arg(long)]
        length: Option<String>,
        /// Extra context placed before the instruction
        #[arg(long)]
        context: Option<String>,
    },
    /// Show the stored configuration
    State,
    /// Report a text selection to the broker
    Select { text: String },
    /// Push accessibility settings to the attached page
    Visuals {
        #[arg(long)]
        font: Option<String>,
        #[arg(long)]
        spacing: Option<f64>,
        #[arg(long)]
        enable_ocr: Option<bool>,
    },
    /// Trigger a keyboard shortcut (rewrite_selection, proofread_selection)
    Command { name: String },
    /// Follow page-bound events
    Watch,
    /// Fetch broker metrics
    Metrics,
}
