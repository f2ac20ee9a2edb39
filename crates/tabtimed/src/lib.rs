//! tabtime daemon - active-tab time accounting
//!
//! This crate provides the moving parts of the `tabtimed` daemon:
//! - `directory` - Mirror of the browser's tab table
//! - `tracker` - Actor owning the single timing slot
//! - `store` - Durable ledger and session files
//! - `backend` - HTTP client for `/login`, `/register` and `/track`
//! - `gateway` - Login/register/logout on behalf of the popup
//! - `scheduler` - Periodic ledger drain to the backend
//! - `server` - Unix socket server for the extension shim and popup
//! - `client` - Request/reply client for that socket
//! - `config` - File and environment configuration
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      tabtimed daemon                        │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  ┌─────────────────┐     ┌─────────────────────────────┐   │
//! │  │  DaemonServer   │────▶│       TrackerActor          │   │
//! │  │ (Unix Socket)   │     │   (timing slot owner)       │   │
//! │  └────────┬────────┘     └──────────────┬──────────────┘   │
//! │           │                             │ commit            │
//! │           │ auth                        ▼                   │
//! │  ┌────────▼────────┐     ┌─────────────────────────────┐   │
//! │  │   AuthGateway   │     │        LedgerStore          │   │
//! │  └────────┬────────┘     └──────────────▲──────────────┘   │
//! │           │ session                     │ snapshot/settle   │
//! │  ┌────────▼────────┐     ┌──────────────┴──────────────┐   │
//! │  │  SessionStore   │────▶│       SyncScheduler         │──▶ backend
//! │  └─────────────────┘     └─────────────────────────────┘   │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Channel operations handle closure gracefully

pub mod backend;
pub mod client;
pub mod config;
pub mod directory;
pub mod gateway;
pub mod scheduler;
pub mod server;
pub mod store;
pub mod tracker;
