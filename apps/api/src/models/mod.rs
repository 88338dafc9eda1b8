pub mod user;

pub use user::CallerIdentity;
