use mock_server::ServerConfig;
use termrpc_core::Authentication;
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

fn env_or(name: &str, default: &str) -> String {
    std::env::var(name).unwrap_or_else(|_| default.to_string())
}

fn config_from_env() -> Result<ServerConfig, std::io::Error> {
    let authentication = match env_or("TERMRPC_AUTH", "basic").as_str() {
        "basic" => Authentication::Basic {
            username: env_or("TERMRPC_USERNAME", "user"),
            password: env_or("TERMRPC_PASSWORD", "pass"),
        },
        "signature" => Authentication::Signature {
            key: std::env::var("TERMRPC_SIGNATURE_KEY").map_err(|_| {
                std::io::Error::other("TERMRPC_SIGNATURE_KEY is required for signature auth")
            })?,
        },
        other => {
            return Err(std::io::Error::other(format!(
                "unknown TERMRPC_AUTH scheme {other:?}"
            )))
        }
    };
    let mut config = ServerConfig::new(authentication);
    config.decode_unsafe_terms = env_or("TERMRPC_DECODE_UNSAFE_TERMS", "false") == "true";
    Ok(config)
}

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = config_from_env()?;
    let port = env_or("PORT", "3000");
    let addr = format!("127.0.0.1:{port}");
    let listener = TcpListener::bind(&addr).await?;
    tracing::info!(%addr, auth = ?config.authentication, "listening");
    mock_server::run(listener, config).await
}
