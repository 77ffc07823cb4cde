//! `acp-serve`: run the HTTP server (address from `ACP_ADDR`, default 127.0.0.1:7777).

#[tokio::main]
async fn main() {
    config::load_and_apply("acp", None).ok();
    let _log_guard = match config::logging::init() {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("logging init failed: {}", e);
            None
        }
    };
    if let Err(e) = serve::run_serve(None).await {
        eprintln!("serve error: {}", e);
        std::process::exit(1);
    }
}
