//! Example demonstrating form and multipart bodies.
//!
//! Run with: `cargo run --example form_uploads`

use courier::body::{FormBody, FormValue, MultipartFormBody};
use courier::{validate, Client, RequestDescriptor};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("courier=debug")
        .init();

    let client = Client::builder()
        .base_url("https://httpbin.org")?
        .basic_auth("demo", "secret")
        .validate(validate::success_status())
        .build()?;

    println!("=== URL-encoded Form ===");
    let request = RequestDescriptor::<serde_json::Value>::post()
        .with_path("/post")
        .with_body(FormBody::new([("q", "rust http"), ("page", "1")]));
    let echoed = client.send(&request).await?;
    println!("Server saw form: {}", echoed["form"]);
    println!();

    println!("=== Multipart Upload ===");
    let request = RequestDescriptor::<serde_json::Value>::post()
        .with_path("/post")
        .with_body(MultipartFormBody::new(vec![
            FormValue::text("title", "hello"),
            FormValue::file("file", "hello.txt", &b"Hello, world!"[..], "text/plain"),
        ]));
    let echoed = client.send(&request).await?;
    println!("Server saw files: {}", echoed["files"]);
    println!("Server saw auth: {}", echoed["headers"]["Authorization"]);

    Ok(())
}
