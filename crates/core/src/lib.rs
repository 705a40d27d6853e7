//! # Carebook Core
//!
//! Booking lifecycle logic for the Carebook healthcare marketplace.
//!
//! This crate owns the domain rules and their storage:
//! - Appointments with doctors and home-care providers, with slot conflict detection
//! - Consultations, home-care visits and the payments that settle them
//! - Reviews, doctor availability windows, notifications and consultation chat
//! - The [`repositories::Database`] seam and its embedded SQLite store
//!
//! **No API concerns**: HTTP servers, token handling and wire DTOs belong in `api-rest`
//! and `api-shared`. Callers identify themselves with an [`auth::Actor`] that those
//! layers build from verified credentials.

pub mod auth;
pub mod config;
pub mod constants;
pub mod error;
pub mod models;
pub mod repositories;
pub mod services;

pub use auth::{Action, Actor, Authorizer, Parties, Role, RolePolicy};
pub use config::CoreConfig;
pub use error::{CoreError, CoreResult};
pub use repositories::{Database, LocalDatabase, Page};
pub use services::CoreServices;
