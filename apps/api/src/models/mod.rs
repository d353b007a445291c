pub mod media;
pub mod note;
pub mod post;
pub mod profile;
pub mod session;
pub mod user;
