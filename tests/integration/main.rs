//! HTTP-level tests for the job API.

mod helpers;
mod job_test;
