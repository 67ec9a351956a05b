//! # cardwall-entity
//!
//! Domain entities for Cardwall's asynchronous requests. The [`job::Job`]
//! record owns the rules for how progress, status, and errors may change;
//! every store applies [`job::JobMutation`]s through [`job::Job::apply`].

pub mod job;
