//! Basic example demonstrating plain and synced requests.
//!
//! This example shows how to:
//! - Create a client with basic configuration
//! - Make GET and POST requests
//! - Sync decoded posts into an in-memory store and read them back
//! - Dispatch a request in the background
//!
//! Run with: `cargo run --example basic_call`

use laze::hooks::{ChildContexts, LogUnauthorized};
use laze::store::{Context, IdentityAttribute, MemoryStore, Record, StoreError};
use laze::{pattern_to_path, Client, Entity, EntityMapping, Error};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

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

/// The locally stored form of a post.
#[derive(Debug, Deserialize)]
struct StoredPost {
    id: u32,
    title: String,
}

impl Entity for StoredPost {
    const NAME: &'static str = "Post";

    fn from_record(record: &Record) -> Result<Self, StoreError> {
        record.decode()
    }
}

impl EntityMapping for Post {
    type Entity = StoredPost;

    fn id_attributes(&self) -> Option<Vec<IdentityAttribute>> {
        Some(vec![IdentityAttribute::new("id", self.id)])
    }

    fn fill_record(&self, record: &mut Record) {
        record.set("id", self.id);
        record.set("title", self.title.clone());
    }
}

#[tokio::main]
async fn main() -> Result<(), Error> {
    tracing_subscriber::fmt()
        .with_env_filter("laze=debug,basic_call=info")
        .init();

    let store = Arc::new(MemoryStore::new());
    let client = Client::builder()
        .base_path("https://jsonplaceholder.typicode.com")
        .response_inspector(LogUnauthorized)
        .context_provider(ChildContexts(Context::new(store.clone())))
        .build()?;

    println!("=== GET Request Example ===");
    let path = pattern_to_path("/posts/:id", [("id", "1")]);
    let response = client.get(path).send::<Post>().await?;

    println!("Post ID: {}", response.data.id);
    println!("Title: {}", response.data.title);
    println!("Request latency: {:?}", response.latency);
    println!("Status code: {}", response.status);
    println!();

    println!("=== POST Request Example ===");
    let new_post = NewPost {
        title: "My New Post".to_string(),
        body: "This is the content of my new post!".to_string(),
        user_id: 1,
    };

    let response = client.post("/posts").json(&new_post).send::<Post>().await?;

    println!("Created post ID: {}", response.data.id);
    println!("Raw response length: {} bytes", response.body.len());
    println!("Content-Type: {:?}", response.header("content-type"));
    println!();

    println!("=== Synced Request Example ===");
    let response = client
        .get("/posts")
        .query("userId", "1")
        .send_synced::<Vec<Post>>()
        .await?;

    match &response.sync_error {
        Some(e) => println!("Decoded {} posts, sync failed: {}", response.data.len(), e),
        None => println!("Stored {} posts", store.count("Post")),
    }
    if let Some(context) = client.context() {
        if let Some(Ok(Some(first))) = response.data.first().map(|p| p.materialize(&context)) {
            println!("First stored post: #{} {}", first.id, first.title);
        }
    }
    println!();

    println!("=== Dispatch Example ===");
    let handle = client.get("/posts/2").dispatch::<Post, _>(|result| match result {
        Ok(response) => println!("Background fetch got: {}", response.data.title),
        Err(e) => println!("Background fetch failed: {}", e),
    });
    handle.join().await;

    Ok(())
}
