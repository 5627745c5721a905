//! # casestore
//!
//! Postgres store engine of the case-management backend.
//!
//! Every entity store is built from the same pieces:
//!
//! - **Sparse-field projection**: a static field table per entity turns the
//!   client's field mask into SELECT columns, joins and a scan plan
//! - **Filter compilation**: filter trees and flat `field=op=value` filters
//!   compile into parameterized predicates; dotted columns go through joins
//! - **Mutation as CTE**: INSERT/UPDATE/DELETE run as `WITH x AS (... RETURNING *)`
//!   and the requested fields are projected from `x` in the same statement
//! - **Paging**: `LIMIT size + 1` tells whether a next page exists; size `-1`
//!   returns everything
//! - **Row-level access**: an `EXISTS` subquery against an ACL table when the
//!   caller requires it
//! - **Error taxonomy**: driver errors are classified by SQLSTATE and
//!   reworded through a constraint message registry
//!
//! ```ignore
//! use casestore::{StoreConfig, StoreContext, ConstraintMessages, create_pool};
//! use casestore::options::SearchOptions;
//! use casestore::store::PriorityStore;
//!
//! let config = StoreConfig::load("casestore.toml")?;
//! let pool = create_pool(&config)?;
//! let ctx = StoreContext::from_config(&config, ConstraintMessages::default());
//! let priorities = PriorityStore::new(ctx);
//!
//! let client = pool.get().await?;
//! let page = priorities
//!     .list(&client, &SearchOptions::new(auth).fields(&["name", "color"]).page(1, 20))
//!     .await?;
//! ```

pub mod client;
pub mod config;
pub mod cte;
pub mod error;
pub mod filter;
pub mod ident;
pub mod monitor;
pub mod options;
pub mod paging;
pub mod projection;
pub mod qb;
pub mod rbac;
pub mod sql_text;
pub mod store;
pub mod transaction;

pub use client::GenericClient;
pub use config::StoreConfig;
pub use cte::{WithQb, WithSelectQb};
pub use error::{ConstraintMessages, ErrorKind, ErrorTranslator, StoreError, StoreResult};
pub use filter::{Comparison, FilterExpr, FilterValue, FlatFilter};
pub use monitor::{MonitorConfig, TracedClient};
pub use options::{CreateOptions, DeleteOptions, Etag, SearchOptions, UpdateOptions};
pub use paging::{ListResult, Paging, PagingLimits};
pub use projection::{Lookup, Projection, ScanPlan};
pub use rbac::{Access, AuthContext, Auther};
pub use store::StoreContext;

pub use qb::{DeleteQb, Expr, InsertQb, MutationQb, SelectQb, SqlQb, UpdateQb};

#[cfg(feature = "pool")]
pub mod pool;

#[cfg(feature = "pool")]
pub use pool::{create_pool, create_pool_with_tls};
