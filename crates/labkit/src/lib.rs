//! # labkit
//!
//! GitLab REST client and resource mappings for the `reconcile` engine.
//!
//! This crate provides:
//! - A blocking GitLab v4 client with token auth, custom CA bundles and
//!   client certificates
//! - A [`Backend`](backend::Backend) seam with a scriptable
//!   [`MockBackend`] for tests
//! - [`reconcile::Resource`] implementations for groups, group memberships,
//!   project variables, deploy keys, pipeline schedule variables and project
//!   access tokens
//!
//! ## Example
//!
//! ```no_run
//! use labkit::{Config, GitLabProvider};
//! use reconcile::{AttributeBag, Context, Provider, orchestrator};
//!
//! let client = Config::default().with_env().client()?;
//! let provider = GitLabProvider::new();
//! let group = provider.resource("gitlab_group").unwrap();
//!
//! let mut bag = AttributeBag::from_state(group.schema(), "42", Default::default(), None)?;
//! orchestrator::read(group, &client, &Context::new(), &mut bag)?;
//! println!("{:?}", bag.redacted());
//! # Ok::<(), labkit::Error>(())
//! ```

pub mod backend;
pub mod client;
pub mod config;
pub mod drift;
pub mod error;
pub mod levels;
pub mod resources;
pub mod validation;

pub use backend::http::HttpBackend;
pub use backend::{ApiRequest, ApiResponse, Backend, Method, MockBackend};
pub use client::Client;
pub use config::Config;
pub use error::{Error, ErrorCategory, Result};
pub use resources::GitLabProvider;
