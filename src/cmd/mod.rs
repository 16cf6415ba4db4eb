//! CLI command implementations.
//!
//! Each submodule owns one or more related `Commands` variants:
//!
//! | Module   | Commands handled            |
//! |----------|-----------------------------|
//! | `serve`  | `Serve`                     |
//! | `db`     | `InitDb`, `SeedTaskTypes`   |
//! | `config` | `Config`                    |

pub mod config;
pub mod db;
pub mod serve;

pub use config::cmd_config;
pub use db::{cmd_init_db, cmd_seed_task_types};
pub use serve::cmd_serve;
