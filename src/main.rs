use color_eyre::eyre::{Result, eyre};
use ocsp_agent::{
    config::Config,
    telemetry,
    tls::{OcspConnector, client_connector},
};
use tokio::net::TcpStream;

#[tokio::main]
async fn main() -> Result<()> {
    color_eyre::install()?;
    telemetry::init_tracing();

    // Load configuration
    let config = Config::load()?;
    tracing::info!("Loaded configuration: {:?}", config);

    let (host, port) = match std::env::args().nth(1) {
        Some(target) => parse_target(&target, config.target.port)?,
        None => (config.target.host.clone(), config.target.port),
    };

    let client = config.ocsp.http_client()?;
    let connector = OcspConnector::new(
        client_connector(&[])?,
        config.ocsp.checker(client.clone()),
        config.ocsp.issuer_fetcher(client),
    )
    .with_clock_skew(config.ocsp.clock_skew());

    let tcp = TcpStream::connect((host.as_str(), port)).await?;
    match connector.connect(&host, tcp).await {
        Ok(_stream) => {
            println!("{host}:{port}: certificate is not revoked");
            Ok(())
        }
        Err(e) => Err(eyre!("{host}:{port}: {e}")),
    }
}

fn parse_target(target: &str, default_port: u16) -> Result<(String, u16)> {
    match target.rsplit_once(':') {
        Some((host, port)) => Ok((host.to_string(), port.parse()?)),
        None => Ok((target.to_string(), default_port)),
    }
}
