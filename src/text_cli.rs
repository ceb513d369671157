use faceless_shorts::generator::run_text_generation;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    if let Err(err) = run_text_generation().await {
        tracing::error!("{:#}", err);
        std::process::exit(1);
    }
}
