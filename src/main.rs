use faceless_shorts::generator::run_generation;

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let code = match run_generation().await {
        Ok(code) => code,
        Err(err) => {
            tracing::error!("{:#}", err);
            2
        }
    };
    std::process::exit(code);
}
