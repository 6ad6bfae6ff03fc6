#![doc = "autopost-core: pipeline, ledger and service contracts for autopost."]

//! This crate holds everything that does not talk HTTP: the data model, the
//! service traits, the SQLite ledger, post classification and templating, and
//! the pipeline that ties them together.
//!
//! Concrete clients for Drive, exe.io, OpenRouter and WordPress live in the
//! `autopost` crate and implement the traits in [`contract`].

pub mod category;
pub mod config;
pub mod contract;
pub mod error;
pub mod ledger;
pub mod pipeline;
pub mod template;
