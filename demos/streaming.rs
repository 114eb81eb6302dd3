//! Example demonstrating cold streams and cancellation.
//!
//! Run with: `cargo run --example streaming`

use courier::{validate, Client, RequestDescriptor};
use futures::StreamExt;
use serde::Deserialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Deserialize)]
#[allow(dead_code)]
struct Todo {
    id: u32,
    title: String,
    completed: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("courier=debug")
        .init();

    let client = Client::builder()
        .base_url("https://jsonplaceholder.typicode.com")?
        .validate(validate::success_status())
        .build()?;

    println!("=== Cold Publisher ===");
    let publisher = client.publisher(RequestDescriptor::<Todo>::get().with_path("/todos/1"));
    println!("Publisher created, nothing sent yet");

    // Each subscription performs the call once.
    for round in 1..=2 {
        let mut subscription = publisher.subscribe();
        while let Some(result) = subscription.next().await {
            println!("Subscription {round}: {:?}", result?);
        }
    }
    println!();

    println!("=== Cancellation ===");
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(1)).await;
        trigger.cancel();
    });

    let request = RequestDescriptor::<Vec<Todo>>::get().with_path("/todos");
    match client.send_with_cancel(&request, &cancel).await {
        Ok(todos) => println!("Finished before cancellation: {} todos", todos.len()),
        Err(e) => println!("Cancelled: {e}"),
    }

    Ok(())
}
