//! # Reconcile
//!
//! A resource reconciliation engine: the reusable mechanics behind mapping
//! declared resource attributes onto a remote CRUD API and reflecting the
//! remote state back.
//!
//! ## Core Concepts
//!
//! - **Identity codec** ([`identity`]): composite identities like `42:7` or
//!   `group/project:KEY:production`, decoded positionally with a free-form
//!   last part.
//! - **Pagination** ([`pagination`]): drains page-based listings, honoring both
//!   an explicit next-page cursor and an empty page as the end.
//! - **Attribute bag** ([`bag`]): typed attribute values with prior/planned
//!   tracking, schema defaults and sensitive-value redaction.
//! - **State mapper** ([`mapper`]): field-by-field conversion between bags and
//!   remote JSON documents, with an explicit always-send list for update.
//! - **Not-found classifier** ([`classify`]): a remote 404 means "gone".
//! - **Orchestrator** ([`orchestrator`]): create/read/update/delete cycles for a
//!   [`Resource`] implementation.
//! - **Poller** ([`poller`]): waits for work the remote finishes in the
//!   background.
//! - **Plan and executor** ([`plan`], [`executor`]): decide what each declared
//!   instance needs and apply the changes on a thread pool.
//!
//! ## Example
//!
//! ```ignore
//! use reconcile::{AttributeBag, Context, orchestrator};
//!
//! let mut bag = AttributeBag::for_create(resource.schema(), &declared)?;
//! orchestrator::create(&resource, &client, &Context::new(), &mut bag)?;
//! println!("created {}", bag.identity());
//! ```
//!
//! The engine knows nothing about any particular API. Remote calls live in
//! [`Resource`] implementations, which receive a shared client handle and a
//! [`Context`] for cancellation.

pub mod bag;
pub mod classify;
pub mod context;
pub mod error;
pub mod executor;
pub mod identity;
pub mod mapper;
pub mod orchestrator;
pub mod pagination;
pub mod plan;
pub mod poller;
pub mod types;

// Re-export main types at crate root
pub use bag::{Attribute, AttributeBag, Kind, Presence, Schema, Value};
pub use classify::{Classification, absorb_not_found, classify};
pub use context::{AutoConfirm, AutoDecline, CancelToken, ConfirmCallback, Context, NoProgress, ProgressCallback};
pub use error::{Error, ErrorCategory, RemoteError, Result};
pub use executor::{ChangeOutcome, ExecuteReport, Provider, execute};
pub use identity::CompositeId;
pub use mapper::{Codec, Document, FieldMap, Mapping, RequestMode, UpdatePolicy};
pub use orchestrator::{ReadOutcome, Resource};
pub use pagination::{NextPage, Page, PageRequest};
pub use plan::{Action, Change, Plan, PlanSummary};
pub use poller::{PollConfig, PollState};
pub use types::{ChangeResult, ExecuteOptions, ExecuteSummary};
