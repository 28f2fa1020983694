#[tokio::main]
async fn main() {
    bchat_lib::init_logging();
    if let Err(e) = bchat_lib::run().await {
        log::error!("{e}");
        std::process::exit(1);
    }
}
