//! HTTP request handlers.

mod keys;
mod roots;

pub use keys::{delete_private_key, health_check, sign_payload};
pub use roots::{
    add_offline_updates_role, add_remote_sessions_role, create_root, get_root, get_root_version,
    get_unsigned_root, put_signed_root, retry_key_generation, rotate_root,
};
