//! Resource handlers. Each declares one kind of construct into a stack.
//!
//! A handler takes its descriptor, adds the template resources it stands
//! for, and returns a handle whose accessors (`arn`, `name`) are the
//! intrinsic references the next construct is wired with.

pub mod ecr;
pub mod ecs;
pub mod events;
pub mod iam;
pub mod logs;
pub mod network;
pub mod ssm;
