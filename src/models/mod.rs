pub mod action_type;
pub mod member;
pub mod organization;
pub mod overrides;
pub mod position;
pub mod summary;
pub mod team;
pub mod user;
pub mod wiki;
