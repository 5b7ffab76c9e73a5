pub mod channel;
pub mod commands;
pub mod guild;
pub mod member;
pub mod permissions;
pub mod role;
pub mod snapshot;
pub mod validation;
