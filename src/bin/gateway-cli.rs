use clap::{Parser, Subcommand};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION};
use serde_json::{json, Value};

#[derive(Parser)]
#[command(name = "gateway-cli")]
#[command(about = "Management CLI for the mesh gateway", long_about = None)]
struct Cli {
    /// Admin API base URL
    #[arg(short, long, default_value = "http://127.0.0.1:9091")]
    url: String,

    /// Public gateway base URL (for `health`)
    #[arg(short, long, default_value = "http://127.0.0.1:8090")]
    gateway: String,

    #[arg(short, long, env = "GATEWAY_ADMIN_KEY", default_value = "CHANGE_ME_IN_PRODUCTION")]
    key: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Gateway status and uptime
    Status,
    /// Aggregated health as reported by the gateway
    Health,
    /// List registered services and instances
    Services,
    /// Register an instance
    Register {
        name: String,
        id: String,
        address: String,
        port: u16,
        #[arg(long, value_delimiter = ',')]
        tags: Vec<String>,
    },
    /// Deregister an instance
    Deregister { service: String, id: String },
    /// Circuit breaker state per dependency
    Breakers,
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
    let admin = |path: &str| format!("{}/admin/{}", cli.url.trim_end_matches('/'), path);

    let res = match cli.command {
        Commands::Status => client.get(admin("status")).headers(headers).send().await?,
        Commands::Health => {
            client
                .get(format!("{}/health", cli.gateway.trim_end_matches('/')))
                .send()
                .await?
        }
        Commands::Services => client.get(admin("services")).headers(headers).send().await?,
        Commands::Register {
            name,
            id,
            address,
            port,
            tags,
        } => {
            let body = json!({
                "name": name,
                "id": id,
                "address": address,
                "port": port,
                "tags": tags,
            });
            client
                .post(admin("services"))
                .headers(headers)
                .json(&body)
                .send()
                .await?
        }
        Commands::Deregister { service, id } => {
            client
                .delete(admin(&format!("services/{}/{}", service, id)))
                .headers(headers)
                .send()
                .await?
        }
        Commands::Breakers => client.get(admin("breakers")).headers(headers).send().await?,
    };

    print_response(res).await
}

async fn print_response(res: reqwest::Response) -> Result<(), Box<dyn std::error::Error>> {
    let status = res.status();
    if !status.is_success() {
        eprintln!("Error: gateway returned status {}", status);
        if let Ok(text) = res.text().await {
            eprintln!("Response: {}", text);
        }
        std::process::exit(1);
    }

    let json: Value = res.json().await?;
    println!("{}", serde_json::to_string_pretty(&json)?);
    Ok(())
}
