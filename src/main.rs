use pelagos::core::config::PelagosConfig;
use pelagos::{build_client, build_stream};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // verbosity comes from RUST_LOG
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    // Public market data works without credentials; set
    // PELAGOS_PRIVATE_KEY to enable signed operations.
    let config = PelagosConfig::from_env("PELAGOS").unwrap_or_else(|_| PelagosConfig::read_only());

    let client = build_client(&config)?;

    println!("Fetching markets...");
    match client.get_markets().await {
        Ok(markets) => {
            println!("Found {} markets", markets.len());
            for market in markets.iter().take(5) {
                println!(
                    "Market: {} (tick {}, lot {}, max leverage {}x)",
                    market.symbol, market.tick_size, market.lot_size, market.max_leverage
                );
            }
        }
        Err(e) => {
            println!("Error fetching markets: {}", e);
        }
    }

    println!("Streaming SOL ticker for a few updates...");
    let (handle, mut events) = build_stream(&config).await?;
    handle.subscribe("ticker.SOL").await?;

    for _ in 0..5 {
        match events.tickers.recv().await {
            Some(ticker) => println!("{}: mark {}", ticker.symbol, ticker.mark),
            None => break,
        }
    }

    handle.disconnect().await?;
    Ok(())
}
