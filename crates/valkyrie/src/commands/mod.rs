pub mod configure;
pub mod create;
pub mod create_env;
pub mod delete;
pub mod info;
pub mod local;
pub mod logs;
pub mod update;
pub mod variables;
