//! HTTP request handlers.

mod common;
mod offline;
mod repos;
mod targets;

pub use offline::{get_delegation, put_delegation, put_offline_targets};
pub use repos::{create_repo, get_role_file, health_check, set_expire_not_before};
pub use targets::{
    add_target, delete_target, edit_target, get_target_blob, list_target_items,
    patch_proprietary_custom, upload_target,
};
