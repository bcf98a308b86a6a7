//! Input helper functions for the CLI.

mod input;

// Re-export public API
pub use input::{
    prompt_new_password, prompt_password, system_key_from_env, NEW_SYSTEM_KEY_ENV, SYSTEM_KEY_ENV,
};
