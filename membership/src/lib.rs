pub mod config;
pub mod engine;
pub mod error;
pub mod fixture;


pub use engine::commands::{CommandError, CommandExecutor, LocalExecutor, MemberRef, MemberRequest};
pub use engine::guild::{Guild, MemberLimits};
pub use engine::member::{BanOptions, GuildMember, RoleMap};
pub use engine::snapshot::{MemberSnapshot, User};
pub use error::MemberError;
