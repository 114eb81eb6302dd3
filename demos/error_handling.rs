//! Example demonstrating error handling with a caller-defined validator.
//!
//! This example shows how to:
//! - Reject responses with your own error type
//! - Tell transport, validation and decoding failures apart
//! - Access raw response data on errors
//! - Check if errors are retryable
//!
//! Run with: `cargo run --example error_handling`

use courier::{Client, ClientError, RequestDescriptor, RequestError};
use serde::Deserialize;
use std::fmt;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Post {
    id: u32,
    title: String,
}

/// What this API's validator can reject.
#[derive(Debug)]
enum ApiError {
    NotFound,
    Server(u16),
    Unexpected(u16, String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::NotFound => write!(f, "resource not found"),
            ApiError::Server(status) => write!(f, "server error {status}"),
            ApiError::Unexpected(status, body) => write!(f, "unexpected {status}: {body}"),
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("courier=info")
        .init();

    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .validate(|body, parts| match parts.status.as_u16() {
            200..=299 => Ok(()),
            404 => Err(ApiError::NotFound),
            s @ 500..=599 => Err(ApiError::Server(s)),
            s => Err(ApiError::Unexpected(
                s,
                String::from_utf8_lossy(body).into_owned(),
            )),
        })
        .build()?;

    println!("=== Example 1: Handling Rejected Responses ===");
    match client.get::<Post>("/posts/999999").await {
        Ok(post) => println!("Success: {:?}", post),
        Err(ClientError::Response(ApiError::NotFound)) => {
            println!("Not found. No point retrying this one.");
        }
        Err(e) => println!("Other error: {}", e),
    }
    println!();

    println!("=== Example 2: Handling Decoding Errors ===");
    #[derive(Debug, Deserialize)]
    #[allow(dead_code)]
    struct WrongSchema {
        nonexistent_field: String,
    }

    match client.get::<WrongSchema>("/posts/1").await {
        Ok(_) => println!("Unexpected success"),
        Err(ClientError::Decoding {
            raw_response,
            source,
            status,
        }) => {
            println!("Decoding Failed!");
            println!("  Status: {}", status);
            println!("  Decoder error: {}", source);
            println!(
                "  Raw response (first 200 chars): {}",
                raw_response.chars().take(200).collect::<String>()
            );
        }
        Err(e) => println!("Other error: {}", e),
    }
    println!();

    println!("=== Example 3: Handling Network Errors ===");
    let unreachable = Client::builder()
        .base_url("http://localhost:1")?
        .validate(courier::validate::accept_all::<ApiError>())
        .build()?;

    let request = RequestDescriptor::<Post>::get().with_path("/posts/1");
    match unreachable.send(&request).await {
        Ok(_) => println!("Unexpected success"),
        Err(e @ ClientError::Request(RequestError::Transport(_))) => {
            println!("Transport error: {}", e);
            println!("  Retryable: {}", e.is_retryable());
        }
        Err(e) => println!("Other error: {}", e),
    }

    Ok(())
}
