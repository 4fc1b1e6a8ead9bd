#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    zeon_server::run().await
}
