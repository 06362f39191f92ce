//! musabi: infrastructure for a daily scraping job, declared in Rust.
//!
//! A stack declaration (`StackConfig`, YAML or built in) is synthesized into
//! a CloudFormation template: an ECR repository keeping one image, and an
//! EventBridge-scheduled Fargate task that runs it every day at 03:00 UTC
//! with credentials from the parameter store. Synth runs are locked and
//! traced with BLAKE3 hashes so hand edits to a written template are caught.

pub mod app;
pub mod cli;
pub mod core;
pub mod resources;
pub mod stacks;
pub mod tripwire;
