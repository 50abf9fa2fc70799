// SPDX-License-Identifier: MIT
// SPDX-FileCopyrightText: 2025 Jonathan D. A. Jewell <hyperpolymath>

//! Vista: Local AI Image Sorter
//!
//! Pulls every image out of a directory tree, drops the ones that are too
//! small, and files the rest into category folders chosen by a local vision
//! model.

pub mod classify;
pub mod config;
pub mod detect;
pub mod error;
pub mod extract;
pub mod imaging;
pub mod janitor;
pub mod naming;
pub mod ollama;
pub mod sorter;

pub use config::AppConfig;
pub use error::{Result, VistaError};
