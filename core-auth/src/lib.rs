//! # Authentication Module
//!
//! Credential lifecycle for the content mirror.
//!
//! ## Overview
//!
//! This module logs in with a password grant, caches the resulting
//! time-bounded credential in memory, persists it across runs and hands out a
//! valid credential to concurrent callers without ever running two logins at
//! once.
//!
//! ## Features
//!
//! - Password-grant login ([`PasswordGrant`])
//! - Expiry-aware in-memory cache with single-flight refresh ([`TokenManager`])
//! - JSON file persistence with corruption recovery ([`FileCredentialStore`])
//! - Auth state event emission

pub mod credential_store;
pub mod error;
pub mod manager;
pub mod password;
pub mod types;

pub use credential_store::{CredentialStore, FileCredentialStore, InMemoryCredentialStore};
pub use error::{AuthError, Result};
pub use manager::TokenManager;
pub use password::{GrantedToken, PasswordGrant};
pub use types::Credential;
