//! A tool to rank contributors across repositories matching a GitHub search.

#[tokio::main]
async fn main() -> Result<(), ohno::AppError> {
    contrib_rank::run(std::env::args()).await
}
