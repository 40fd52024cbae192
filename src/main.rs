use hemmer_provider_aws::{default_level, init_logging_with_default, serve, AwsProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    init_logging_with_default(&default_level());
    tracing::info!(version = env!("CARGO_PKG_VERSION"), "starting hemmer-provider-aws");
    serve(AwsProvider::new()).await
}
