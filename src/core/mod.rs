//! Core modules for the scaffold pipeline.
//!
//! Leaf first: `error` and `config`, the catalog (`schemas`, `db`,
//! `catalog`, `broker`), resolution and planning (`resolver`, `plan`), and the
//! filesystem side (`fs_ops`, `scaffold`).

pub mod broker;
pub mod catalog;
pub mod config;
pub mod db;
pub mod error;
pub mod fs_ops;
pub mod output;
pub mod plan;
pub mod resolver;
pub mod scaffold;
pub mod schemas;
