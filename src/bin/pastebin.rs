use clap::Parser;
use env_logger::Env;

use pastebin::server::config::{ServerArgs, ServerConfig};

#[rocket::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(Env::default().default_filter_or("info")).init();

    let config = ServerConfig::try_from(ServerArgs::parse())?;
    pastebin::server::launch(config).await
}
