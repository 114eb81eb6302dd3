//! Basic example demonstrating simple GET and POST requests.
//!
//! This example shows how to:
//! - Create a client with basic configuration
//! - Make GET requests to fetch data
//! - Make POST requests with a JSON body
//! - Access response data and metadata
//!
//! Run with: `cargo run --example basic_call`

use courier::{body::JsonBody, validate, Client, RequestDescriptor};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    #[serde(rename = "userId")]
    user_id: u32,
    id: u32,
    title: String,
    body: String,
}

#[derive(Debug, Serialize)]
struct NewPost {
    title: String,
    body: String,
    #[serde(rename = "userId")]
    user_id: u32,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("courier=debug,basic_call=info")
        .init();

    // Create a client for the JSONPlaceholder API
    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .default_header("Accept", "application/json")
        .validate(validate::success_status())
        .build()?;

    println!("=== GET Request Example ===");
    let post: Post = client.get("/posts/1").await?;

    println!("Post ID: {}", post.id);
    println!("Title: {}", post.title);
    println!("Body: {}", post.body);
    println!();

    println!("=== POST Request Example ===");
    let request = RequestDescriptor::<Post>::post()
        .with_path("/posts")
        .with_body(JsonBody::new(NewPost {
            title: "My New Post".to_string(),
            body: "This is the content of my new post!".to_string(),
            user_id: 1,
        }));

    let response = client.call(&request).await?;

    println!("Created post ID: {}", response.data.id);
    println!("Title: {}", response.data.title);
    println!("Request latency: {:?}", response.latency);
    println!();

    println!("=== Accessing Response Metadata ===");
    println!("Status code: {}", response.status);
    println!("Raw response length: {} bytes", response.raw_body.len());
    println!("Content-Type: {:?}", response.header("content-type"));

    Ok(())
}
