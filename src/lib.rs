//! # Laze - REST calls into typed models, and on into a local store
//!
//! Laze runs a REST request, decodes the JSON response into your types and,
//! if the types opt in, upserts the decoded values into a local object store
//! inside a unit of work. It is built on top of `reqwest` and `serde`.
//!
//! ## Quick Start
//!
//! ```no_run
//! use laze::{pattern_to_path, Client};
//! use serde::{Deserialize, Serialize};
//! use std::time::Duration;
//!
//! #[derive(Serialize)]
//! struct CreateUser {
//!     name: String,
//!     email: String,
//! }
//!
//! #[derive(Deserialize)]
//! struct User {
//!     id: u64,
//!     name: String,
//!     email: String,
//! }
//!
//! #[tokio::main]
//! async fn main() -> Result<(), laze::Error> {
//!     let client = Client::builder()
//!         .base_path("https://api.example.com")
//!         .timeout(Duration::from_secs(30))
//!         .build()?;
//!
//!     // Make a GET request
//!     let path = pattern_to_path("/users/:id", [("id", "123")]);
//!     let user = client.get(path).send::<User>().await?;
//!     println!("User: {}", user.data.name);
//!     println!("Request took {:?}", user.latency);
//!
//!     // Make a POST request
//!     let new_user = CreateUser {
//!         name: "Alice".to_string(),
//!         email: "alice@example.com".to_string(),
//!     };
//!     let created = client.post("/users").json(&new_user).send::<User>().await?;
//!     println!("Created user with ID: {}", created.data.id);
//!
//!     Ok(())
//! }
//! ```
//!
//! ## Features
//!
//! - **Typed requests and responses** - JSON bodies in, any `Deserialize` type out
//! - **Per-stage errors** - URL, encoding, veto, transport and decoding failures are distinct
//! - **Hooks** - adapt or veto outgoing requests, inspect every response
//! - **Persistence** - decoded values implementing [`EntityMapping`] are upserted by identity
//! - **Two call styles** - `async` futures, or background dispatch with a cancellable handle
//! - **Automatic logging** - structured logging with `tracing`
//!
//! ## Synced calls
//!
//! ```no_run
//! use laze::hooks::ChildContexts;
//! use laze::store::{Context, IdentityAttribute, MemoryStore, Record, StoreError};
//! use laze::{Client, Entity, EntityMapping};
//! use serde::Deserialize;
//! use std::sync::Arc;
//!
//! struct Model {
//!     id: String,
//! }
//!
//! impl Entity for Model {
//!     const NAME: &'static str = "Model";
//!
//!     fn from_record(record: &Record) -> Result<Self, StoreError> {
//!         let id = record.get("id").and_then(|v| v.as_str()).unwrap_or_default();
//!         Ok(Model { id: id.to_string() })
//!     }
//! }
//!
//! #[derive(Deserialize)]
//! struct ModelDto {
//!     id: String,
//! }
//!
//! impl EntityMapping for ModelDto {
//!     type Entity = Model;
//!
//!     fn id_attributes(&self) -> Option<Vec<IdentityAttribute>> {
//!         Some(vec![IdentityAttribute::new("id", self.id.clone())])
//!     }
//!
//!     fn fill_record(&self, record: &mut Record) {
//!         record.set("id", self.id.clone());
//!     }
//! }
//!
//! # async fn example() -> Result<(), laze::Error> {
//! let root = Context::new(Arc::new(MemoryStore::new()));
//! let client = Client::builder()
//!     .base_path("https://api.example.com")
//!     .context_provider(ChildContexts(root))
//!     .build()?;
//!
//! let response = client.get("/api/models").send_synced::<Vec<ModelDto>>().await?;
//! if let Some(e) = &response.sync_error {
//!     eprintln!("Decoded but not persisted: {}", e);
//! }
//!
//! if let Some(context) = client.context() {
//!     match laze::materialize_all(&response.data, &context) {
//!         Ok(models) => println!("{} models stored", models.len()),
//!         Err(e) => eprintln!("Failed to read back: {}", e),
//!     }
//! }
//! # Ok(())
//! # }
//! ```

mod client;
pub mod decode;
mod error;
pub mod hooks;
mod mapping;
pub mod metadata;
mod path;
mod request;
mod response;
pub mod store;

pub use client::{Client, ClientBuilder};
pub use error::{Error, Result};
pub use mapping::{materialize_all, Entity, EntityMapping, Synchronize};
pub use path::pattern_to_path;
pub use request::{RequestBuilder, RequestHandle};
pub use response::{Response, ResponseHead};
