use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::Value;

#[derive(Parser)]
#[command(name = "resolver-cli")]
#[command(about = "Management CLI for the book resolver", long_about = None)]
struct Cli {
    /// Public API base URL.
    #[arg(short, long, default_value = "http://localhost:8080")]
    url: String,

    /// Admin API base URL.
    #[arg(short, long, default_value = "http://localhost:8081")]
    admin_url: String,

    #[arg(short, long, default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show version, uptime, index size and breaker state
    Status,
    /// Show the upstream circuit breaker
    Breaker,
    /// Force the upstream circuit breaker closed
    Reset,
    /// Resolve one book by id
    Book { id: String },
    /// Search for books
    Search {
        query: String,
        #[arg(long)]
        lang: Option<String>,
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let client = reqwest::Client::new();

    let mut headers = HeaderMap::new();
    headers.insert(
        AUTHORIZATION,
        HeaderValue::from_str(&format!("Bearer {}", cli.key))?,
    );

    let res = match cli.command {
        Commands::Status => {
            client
                .get(format!("{}/admin/status", cli.admin_url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Breaker => {
            client
                .get(format!("{}/admin/breaker", cli.admin_url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Reset => {
            client
                .post(format!("{}/admin/breaker/reset", cli.admin_url))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Book { id } => client.get(format!("{}/books/{}", cli.url, id)).send().await?,
        Commands::Search { query, lang, limit } => {
            let mut params = vec![("q", query)];
            if let Some(lang) = lang {
                params.push(("lang", lang));
            }
            if let Some(limit) = limit {
                params.push(("limit", limit.to_string()));
            }
            client
                .get(format!("{}/search", cli.url))
                .query(&params)
                .send()
                .await?
        }
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: resolver returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        return Ok(());
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
