#![allow(missing_docs)]

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    pricewatch_lib::run().await
}
