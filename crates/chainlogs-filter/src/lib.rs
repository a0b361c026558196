//! chainlogs-filter: log filters, push subscriptions and contract events.
//!
//! # Overview
//!
//! Three ways to receive logs, all over one [`RpcTransport`]:
//!
//! - **Polling** through [`FilterManager`]: install a filter on the node,
//!   fetch incremental changes, uninstall it.
//! - **Push** through [`SubscriptionEngine`]: `eth_subscribe("logs")` over a
//!   persistent transport, delivered as an [`EventStream`].
//! - **Per contract** through [`ContractEvents`]: name an event, filter on
//!   its indexed parameters, receive decoded [`EventLog`]s live or from
//!   history.
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chainlogs_core::RpcTransport;
//! use chainlogs_filter::{ContractEvents, EventOptions};
//! use futures::StreamExt;
//!
//! # async fn run(transport: Arc<dyn RpcTransport>, abi: &str) -> Result<(), chainlogs_filter::FilterError> {
//! let address = "0x5fbdb2315678afecb367f032d93f642f64180aa3".parse().unwrap();
//! let contract = ContractEvents::from_abi_json(address, abi, transport)?;
//!
//! let options = EventOptions::new().from_block(0u64).filter("val", 100u64);
//! let mut stream = contract.event("MultiValueIndexedEvent")?.live(&options).await?;
//! while let Some(event) = stream.next().await {
//!     let event = event?;
//!     println!("{} {:?}", event.event, event.return_values.get("val"));
//! }
//! # Ok(())
//! # }
//! ```
//!
//! [`RpcTransport`]: chainlogs_core::RpcTransport
//! [`EventLog`]: chainlogs_abi::EventLog

pub mod config;
pub mod contract;
pub mod error;
pub mod manager;
pub mod subscription;
pub mod telemetry;

pub use config::EventsConfig;
pub use contract::{AllEvents, ContractEvent, ContractEvents, ContractLog, EventOptions, ALL_EVENTS};
pub use error::FilterError;
pub use manager::{FilterChanges, FilterHandle, FilterManager};
pub use subscription::{EventStream, LogMapper, SubscriptionEngine};
pub use telemetry::{init_tracing, LogConfig};
